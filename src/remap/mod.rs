//! Remapping between the flat native buffer layout and the (point, level)
//! field layout.
//!
//! The native layout convention is `buffer[permutation[i] + j * n_points]`:
//! horizontal points vary fastest, vertical levels are outer blocks. The
//! field side is a point-major two-dimensional view. Copies run in both
//! directions through a generic kernel; the tagged unions are dispatched with
//! one exhaustive match per operation.
//!
//! Vertical level counts on the two sides are not always equal — some file
//! variables are defined on "levels minus the surface" or "levels plus a
//! duplicated top". Which reconciliation applies is selected by
//! [`LevelPolicy`], supplied from variable metadata, never inferred from the
//! counts alone: a skip and a trim can produce the same difference.
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::store::values::{ElementType, ValueElement, Values};

/// How to reconcile the field's level count with the buffer's.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelPolicy {
    /// Level counts match; copy 1:1.
    #[default]
    Exact,
    /// The destination has one fewer level; level 0 of the source is
    /// dropped. Used when writing a surface-less file variable from a field
    /// that carries a surface level.
    SkipFirst,
    /// The destination has one more level; level 0 of the source lands in
    /// destination levels 0 and 1.
    DuplicateFirst,
}

impl LevelPolicy {
    fn name(self) -> &'static str {
        match self {
            LevelPolicy::Exact => "exact",
            LevelPolicy::SkipFirst => "skip-first",
            LevelPolicy::DuplicateFirst => "duplicate-first",
        }
    }

    /// Destination level count implied by a source with `source` levels.
    pub fn destination_levels(self, source: usize) -> usize {
        match self {
            LevelPolicy::Exact => source,
            LevelPolicy::SkipFirst => source.saturating_sub(1),
            LevelPolicy::DuplicateFirst => source + 1,
        }
    }
}

/// Point-major (point, level) storage: element `(i, j)` lives at
/// `data[i * levels + j]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldArray<T> {
    points: usize,
    levels: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> FieldArray<T> {
    /// Allocates a default-filled array of `points * levels` elements.
    pub fn new(points: usize, levels: usize) -> Self {
        Self {
            points,
            levels,
            data: vec![T::default(); points * levels],
        }
    }

    /// Number of horizontal points.
    #[inline]
    pub fn points(&self) -> usize {
        self.points
    }

    /// Number of vertical levels.
    #[inline]
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Element at point `i`, level `j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[i * self.levels + j]
    }

    /// Overwrites the element at point `i`, level `j`.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        self.data[i * self.levels + j] = value;
    }

    /// Flat view of the underlying storage.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Flat mutable view of the underlying storage.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

/// A type-tagged field view, mirroring [`Values`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValues {
    /// 64-bit floats.
    Double(FieldArray<f64>),
    /// 32-bit floats.
    Float(FieldArray<f32>),
    /// 32-bit signed integers.
    Int(FieldArray<i32>),
}

impl FieldValues {
    /// Allocates a zero-filled field of the given shape and element type.
    ///
    /// # Errors
    /// [`BridgeError::UnsupportedElementType`] for non-buffer types.
    pub fn with_shape(
        ty: ElementType,
        points: usize,
        levels: usize,
    ) -> Result<Self, BridgeError> {
        Ok(match ty {
            ElementType::Double => FieldValues::Double(FieldArray::new(points, levels)),
            ElementType::Float => FieldValues::Float(FieldArray::new(points, levels)),
            ElementType::Int => FieldValues::Int(FieldArray::new(points, levels)),
            other => {
                return Err(BridgeError::UnsupportedElementType {
                    context: "allocating a field",
                    found: other,
                });
            }
        })
    }

    /// The element type tag.
    pub fn element_type(&self) -> ElementType {
        match self {
            FieldValues::Double(_) => ElementType::Double,
            FieldValues::Float(_) => ElementType::Float,
            FieldValues::Int(_) => ElementType::Int,
        }
    }

    /// Number of horizontal points.
    pub fn points(&self) -> usize {
        match self {
            FieldValues::Double(f) => f.points(),
            FieldValues::Float(f) => f.points(),
            FieldValues::Int(f) => f.points(),
        }
    }

    /// Number of vertical levels.
    pub fn levels(&self) -> usize {
        match self {
            FieldValues::Double(f) => f.levels(),
            FieldValues::Float(f) => f.levels(),
            FieldValues::Int(f) => f.levels(),
        }
    }
}

fn check_geometry(
    perm: &[usize],
    buffer_len: usize,
    buffer_levels: usize,
    field_points: usize,
    field_levels: usize,
    policy: LevelPolicy,
    field_is_destination: bool,
) -> Result<(), BridgeError> {
    let n = perm.len();
    let expected = n * buffer_levels;
    if buffer_len != expected {
        return Err(BridgeError::SizeMismatch {
            expected,
            found: buffer_len,
        });
    }
    if field_points != n {
        return Err(BridgeError::SizeMismatch {
            expected: n,
            found: field_points,
        });
    }
    // The policy is phrased source -> destination.
    let (src_levels, dst_levels) = if field_is_destination {
        (buffer_levels, field_levels)
    } else {
        (field_levels, buffer_levels)
    };
    let compatible = match policy {
        LevelPolicy::Exact => dst_levels == src_levels,
        LevelPolicy::SkipFirst => src_levels >= 1 && dst_levels == src_levels - 1,
        LevelPolicy::DuplicateFirst => dst_levels == src_levels + 1,
    };
    if !compatible {
        return Err(BridgeError::LevelCountMismatch {
            field: field_levels,
            buffer: buffer_levels,
            policy: policy.name(),
        });
    }
    for &pi in perm {
        if pi >= n {
            return Err(BridgeError::IndexOutOfRange { index: pi, len: n });
        }
    }
    Ok(())
}

fn copy_buffer_to_field<T: Copy + Default>(
    field: &mut FieldArray<T>,
    buffer: &[T],
    perm: &[usize],
    buffer_levels: usize,
    policy: LevelPolicy,
) {
    let n = perm.len();
    match policy {
        LevelPolicy::Exact => {
            for (i, &pi) in perm.iter().enumerate() {
                for j in 0..buffer_levels {
                    field.set(i, j, buffer[pi + j * n]);
                }
            }
        }
        LevelPolicy::SkipFirst => {
            for (i, &pi) in perm.iter().enumerate() {
                for k in 0..buffer_levels - 1 {
                    field.set(i, k, buffer[pi + (k + 1) * n]);
                }
            }
        }
        LevelPolicy::DuplicateFirst => {
            for (i, &pi) in perm.iter().enumerate() {
                field.set(i, 0, buffer[pi]);
                for k in 1..=buffer_levels {
                    field.set(i, k, buffer[pi + (k - 1) * n]);
                }
            }
        }
    }
}

fn copy_field_to_buffer<T: Copy + Default>(
    buffer: &mut [T],
    field: &FieldArray<T>,
    perm: &[usize],
    buffer_levels: usize,
    policy: LevelPolicy,
) {
    let n = perm.len();
    match policy {
        LevelPolicy::Exact => {
            for (i, &pi) in perm.iter().enumerate() {
                for j in 0..buffer_levels {
                    buffer[pi + j * n] = field.get(i, j);
                }
            }
        }
        LevelPolicy::SkipFirst => {
            for (i, &pi) in perm.iter().enumerate() {
                for k in 0..buffer_levels {
                    buffer[pi + k * n] = field.get(i, k + 1);
                }
            }
        }
        LevelPolicy::DuplicateFirst => {
            for (i, &pi) in perm.iter().enumerate() {
                buffer[pi] = field.get(i, 0);
                for k in 1..buffer_levels {
                    buffer[pi + k * n] = field.get(i, k - 1);
                }
            }
        }
    }
}

fn dispatch_buffer_to_field<T: ValueElement>(
    field: &mut FieldArray<T>,
    buffer: &Values,
    perm: &[usize],
    buffer_levels: usize,
    policy: LevelPolicy,
) -> Result<(), BridgeError> {
    let src = buffer.as_slice::<T>()?;
    check_geometry(
        perm,
        src.len(),
        buffer_levels,
        field.points(),
        field.levels(),
        policy,
        true,
    )?;
    copy_buffer_to_field(field, src, perm, buffer_levels, policy);
    Ok(())
}

fn dispatch_field_to_buffer<T: ValueElement>(
    buffer: &mut Values,
    field: &FieldArray<T>,
    perm: &[usize],
    buffer_levels: usize,
    policy: LevelPolicy,
) -> Result<(), BridgeError> {
    let (points, levels) = (field.points(), field.levels());
    let dst = buffer.as_mut_slice::<T>()?;
    check_geometry(perm, dst.len(), buffer_levels, points, levels, policy, false)?;
    copy_field_to_buffer(dst, field, perm, buffer_levels, policy);
    Ok(())
}

/// Populates a field from a flat native-layout buffer.
///
/// For `LevelPolicy::Exact`, element `(i, j)` of the field receives
/// `buffer[permutation[i] + j * permutation.len()]` for every index `i` and
/// level `j` — points vary fastest in the buffer, levels are outer blocks.
/// The other policies shift or duplicate the source's level 0 as documented
/// on [`LevelPolicy`].
///
/// # Errors
/// - [`BridgeError::TypeMismatch`] if field and buffer element types differ.
/// - [`BridgeError::SizeMismatch`] if the buffer is not exactly
///   `permutation.len() * buffer_levels` elements, or the field's point
///   count differs from the permutation length.
/// - [`BridgeError::LevelCountMismatch`] if the level counts contradict the
///   policy.
/// - [`BridgeError::IndexOutOfRange`] if a permutation entry is out of
///   range — an upstream configuration bug, detected before any copy.
pub fn buffer_to_field(
    field: &mut FieldValues,
    buffer: &Values,
    perm: &[usize],
    buffer_levels: usize,
    policy: LevelPolicy,
) -> Result<(), BridgeError> {
    match field {
        FieldValues::Double(f) => dispatch_buffer_to_field(f, buffer, perm, buffer_levels, policy),
        FieldValues::Float(f) => dispatch_buffer_to_field(f, buffer, perm, buffer_levels, policy),
        FieldValues::Int(f) => dispatch_buffer_to_field(f, buffer, perm, buffer_levels, policy),
    }
}

/// Extracts a field into a flat native-layout buffer — the exact inverse
/// assignment of [`buffer_to_field`].
///
/// The destination must already be sized to
/// `permutation.len() * buffer_levels`; an undersized buffer is a
/// size-mismatch error, never an out-of-bounds access.
///
/// # Errors
/// As for [`buffer_to_field`].
pub fn field_to_buffer(
    buffer: &mut Values,
    field: &FieldValues,
    perm: &[usize],
    buffer_levels: usize,
    policy: LevelPolicy,
) -> Result<(), BridgeError> {
    match field {
        FieldValues::Double(f) => dispatch_field_to_buffer(buffer, f, perm, buffer_levels, policy),
        FieldValues::Float(f) => dispatch_field_to_buffer(buffer, f, perm, buffer_levels, policy),
        FieldValues::Int(f) => dispatch_field_to_buffer(buffer, f, perm, buffer_levels, policy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 3 points, reversed correspondence, 2 levels.
    fn setup() -> (Vec<usize>, Values) {
        let perm = vec![2, 1, 0];
        // Native layout: level 0 = [10, 11, 12], level 1 = [20, 21, 22].
        let buffer = Values::Double(vec![10.0, 11.0, 12.0, 20.0, 21.0, 22.0]);
        (perm, buffer)
    }

    #[test]
    fn exact_copy_applies_permutation() {
        let (perm, buffer) = setup();
        let mut field = FieldValues::with_shape(ElementType::Double, 3, 2).unwrap();
        buffer_to_field(&mut field, &buffer, &perm, 2, LevelPolicy::Exact).unwrap();
        let FieldValues::Double(f) = &field else { unreachable!() };
        // field(i, j) = buffer[perm[i] + j * 3]
        assert_eq!(f.get(0, 0), 12.0);
        assert_eq!(f.get(0, 1), 22.0);
        assert_eq!(f.get(1, 0), 11.0);
        assert_eq!(f.get(2, 0), 10.0);
        assert_eq!(f.get(2, 1), 20.0);
    }

    #[test]
    fn inverse_copy_reproduces_buffer() {
        let (perm, buffer) = setup();
        let mut field = FieldValues::with_shape(ElementType::Double, 3, 2).unwrap();
        buffer_to_field(&mut field, &buffer, &perm, 2, LevelPolicy::Exact).unwrap();
        let mut back = Values::with_len(ElementType::Double, 6).unwrap();
        field_to_buffer(&mut back, &field, &perm, 2, LevelPolicy::Exact).unwrap();
        assert_eq!(back, buffer);
    }

    #[test]
    fn skip_first_drops_source_surface() {
        // Buffer has 3 levels; field keeps only the upper two.
        let perm = vec![0, 1];
        let buffer = Values::Double(vec![1.0, 2.0, 10.0, 20.0, 100.0, 200.0]);
        let mut field = FieldValues::with_shape(ElementType::Double, 2, 2).unwrap();
        buffer_to_field(&mut field, &buffer, &perm, 3, LevelPolicy::SkipFirst).unwrap();
        let FieldValues::Double(f) = &field else { unreachable!() };
        for i in 0..2 {
            for k in 0..2 {
                // Destination level k equals source level k + 1.
                let src = buffer.get_f64(i + (k + 1) * 2).unwrap();
                assert_eq!(f.get(i, k), src);
            }
        }
    }

    #[test]
    fn duplicate_first_copies_surface_twice() {
        let perm = vec![0, 1];
        let buffer = Values::Double(vec![1.0, 2.0, 10.0, 20.0]);
        let mut field = FieldValues::with_shape(ElementType::Double, 2, 3).unwrap();
        buffer_to_field(&mut field, &buffer, &perm, 2, LevelPolicy::DuplicateFirst).unwrap();
        let FieldValues::Double(f) = &field else { unreachable!() };
        for i in 0..2 {
            // Destination levels 0 and 1 both equal source level 0.
            assert_eq!(f.get(i, 0), f.get(i, 1));
            assert_eq!(f.get(i, 0), buffer.get_f64(i).unwrap());
            // Destination level k (k >= 1) equals source level k - 1.
            assert_eq!(f.get(i, 2), buffer.get_f64(i + 2).unwrap());
        }
    }

    #[test]
    fn skip_first_on_write_path() {
        // Field with 3 levels written to a 2-level buffer: level 0 dropped.
        let perm = vec![1, 0];
        let mut field = FieldValues::with_shape(ElementType::Double, 2, 3).unwrap();
        {
            let FieldValues::Double(f) = &mut field else { unreachable!() };
            for i in 0..2 {
                for j in 0..3 {
                    f.set(i, j, (10 * (j + 1) + i) as f64);
                }
            }
        }
        let mut buffer = Values::with_len(ElementType::Double, 4).unwrap();
        field_to_buffer(&mut buffer, &field, &perm, 2, LevelPolicy::SkipFirst).unwrap();
        let FieldValues::Double(f) = &field else { unreachable!() };
        for (i, &pi) in perm.iter().enumerate() {
            for k in 0..2 {
                assert_eq!(buffer.get_f64(pi + k * 2).unwrap(), f.get(i, k + 1));
            }
        }
    }

    #[test]
    fn undersized_buffer_is_fatal() {
        let perm = vec![0, 1, 2];
        let buffer = Values::Double(vec![0.0; 3 * 2 - 1]);
        let mut field = FieldValues::with_shape(ElementType::Double, 3, 2).unwrap();
        let err =
            buffer_to_field(&mut field, &buffer, &perm, 2, LevelPolicy::Exact).unwrap_err();
        assert_eq!(err, BridgeError::SizeMismatch { expected: 6, found: 5 });

        let mut short = Values::with_len(ElementType::Double, 5).unwrap();
        let err =
            field_to_buffer(&mut short, &field, &perm, 2, LevelPolicy::Exact).unwrap_err();
        assert_eq!(err, BridgeError::SizeMismatch { expected: 6, found: 5 });
    }

    #[test]
    fn type_mismatch_is_fatal() {
        let perm = vec![0];
        let buffer = Values::Int(vec![1]);
        let mut field = FieldValues::with_shape(ElementType::Double, 1, 1).unwrap();
        let err =
            buffer_to_field(&mut field, &buffer, &perm, 1, LevelPolicy::Exact).unwrap_err();
        assert_eq!(
            err,
            BridgeError::TypeMismatch {
                expected: ElementType::Double,
                found: ElementType::Int,
            }
        );
    }

    #[test]
    fn level_mismatch_needs_the_right_policy() {
        let perm = vec![0, 1];
        let buffer = Values::Double(vec![0.0; 2 * 3]);
        // Field has 2 levels, buffer has 3: Exact must refuse.
        let mut field = FieldValues::with_shape(ElementType::Double, 2, 2).unwrap();
        let err =
            buffer_to_field(&mut field, &buffer, &perm, 3, LevelPolicy::Exact).unwrap_err();
        assert!(matches!(err, BridgeError::LevelCountMismatch { .. }));
        // SkipFirst accepts exactly this geometry.
        buffer_to_field(&mut field, &buffer, &perm, 3, LevelPolicy::SkipFirst).unwrap();
    }

    #[test]
    fn bad_permutation_entry_is_detected_before_copying() {
        let perm = vec![0, 7];
        let buffer = Values::Double(vec![0.0, 0.0]);
        let mut field = FieldValues::with_shape(ElementType::Double, 2, 1).unwrap();
        let err =
            buffer_to_field(&mut field, &buffer, &perm, 1, LevelPolicy::Exact).unwrap_err();
        assert_eq!(err, BridgeError::IndexOutOfRange { index: 7, len: 2 });
    }

    #[test]
    fn integer_fields_round_trip() {
        let perm = vec![1, 2, 0];
        let buffer = Values::Int(vec![1, 2, 3, -1, -2, -3]);
        let mut field = FieldValues::with_shape(ElementType::Int, 3, 2).unwrap();
        buffer_to_field(&mut field, &buffer, &perm, 2, LevelPolicy::Exact).unwrap();
        let mut back = Values::with_len(ElementType::Int, 6).unwrap();
        field_to_buffer(&mut back, &field, &perm, 2, LevelPolicy::Exact).unwrap();
        assert_eq!(back, buffer);
    }
}
