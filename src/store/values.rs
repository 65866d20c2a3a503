//! Typed value buffers and the name-keyed value store.
//!
//! `Values` is a closed tagged union over the numeric element types this
//! crate stages between files and fields. Each read/write boundary dispatches
//! it with a single exhaustive match; there is no trait-object hierarchy and
//! no downcasting.
//!
//! `ValueStore` keys buffers by name and preserves insertion order with a
//! side vector, so iteration (and therefore file writing) is deterministic.

use std::collections::HashMap;
use std::fmt;

use log::debug;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Element type tags understood at the file boundary.
///
/// `Byte`, `Short` and `Str` appear in file headers and attributes but have
/// no bulk-buffer representation here; a variable of such a type reaching a
/// buffer operation is an [`BridgeError::UnsupportedElementType`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// 8-bit signed integer.
    Byte,
    /// 16-bit signed integer.
    Short,
    /// 32-bit signed integer.
    Int,
    /// 32-bit IEEE float.
    Float,
    /// 64-bit IEEE float.
    Double,
    /// Text.
    Str,
}

impl ElementType {
    /// Stable one-byte code used when broadcasting scalar facts.
    pub fn code(self) -> u8 {
        match self {
            ElementType::Byte => 0,
            ElementType::Short => 1,
            ElementType::Int => 2,
            ElementType::Float => 3,
            ElementType::Double => 4,
            ElementType::Str => 5,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u8) -> Result<Self, BridgeError> {
        Ok(match code {
            0 => ElementType::Byte,
            1 => ElementType::Short,
            2 => ElementType::Int,
            3 => ElementType::Float,
            4 => ElementType::Double,
            5 => ElementType::Str,
            other => return Err(BridgeError::BadTypeCode(other)),
        })
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Byte => "byte",
            ElementType::Short => "short",
            ElementType::Int => "int",
            ElementType::Float => "float",
            ElementType::Double => "double",
            ElementType::Str => "string",
        };
        write!(f, "{name}")
    }
}

/// A flat, type-tagged numeric buffer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Values {
    /// 64-bit floats.
    Double(Vec<f64>),
    /// 32-bit floats.
    Float(Vec<f32>),
    /// 32-bit signed integers.
    Int(Vec<i32>),
}

impl Values {
    /// Allocates a zero-filled buffer of `len` elements of type `ty`.
    ///
    /// # Errors
    /// [`BridgeError::UnsupportedElementType`] for types with no buffer
    /// representation (byte, short, string).
    pub fn with_len(ty: ElementType, len: usize) -> Result<Self, BridgeError> {
        Ok(match ty {
            ElementType::Double => Values::Double(vec![0.0; len]),
            ElementType::Float => Values::Float(vec![0.0; len]),
            ElementType::Int => Values::Int(vec![0; len]),
            other => {
                return Err(BridgeError::UnsupportedElementType {
                    context: "allocating a value buffer",
                    found: other,
                });
            }
        })
    }

    /// The element type tag of this buffer.
    pub fn element_type(&self) -> ElementType {
        match self {
            Values::Double(_) => ElementType::Double,
            Values::Float(_) => ElementType::Float,
            Values::Int(_) => ElementType::Int,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Values::Double(v) => v.len(),
            Values::Float(v) => v.len(),
            Values::Int(v) => v.len(),
        }
    }

    /// Whether the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops all elements, keeping the type tag.
    pub fn clear(&mut self) {
        match self {
            Values::Double(v) => v.clear(),
            Values::Float(v) => v.clear(),
            Values::Int(v) => v.clear(),
        }
    }

    /// Typed view of the buffer.
    pub fn as_slice<T: ValueElement>(&self) -> Result<&[T], BridgeError> {
        T::slice(self)
    }

    /// Typed mutable view of the buffer.
    pub fn as_mut_slice<T: ValueElement>(&mut self) -> Result<&mut [T], BridgeError> {
        T::slice_mut(self)
    }

    /// Element at `index` widened to `f64`, regardless of the stored type.
    ///
    /// Used by the time-axis decoder, where the on-disk type of a time
    /// variable varies between producers.
    pub fn get_f64(&self, index: usize) -> Result<f64, BridgeError> {
        let len = self.len();
        let out = match self {
            Values::Double(v) => v.get(index).copied(),
            Values::Float(v) => v.get(index).and_then(|x| x.to_f64()),
            Values::Int(v) => v.get(index).and_then(|x| x.to_f64()),
        };
        out.ok_or(BridgeError::IndexOutOfRange { index, len })
    }

    /// Overwrites the element at `index`, narrowing from `f64`.
    pub fn set_f64(&mut self, index: usize, value: f64) -> Result<(), BridgeError> {
        let len = self.len();
        let oob = BridgeError::IndexOutOfRange { index, len };
        match self {
            Values::Double(v) => *v.get_mut(index).ok_or(oob)? = value,
            Values::Float(v) => *v.get_mut(index).ok_or(oob)? = value as f32,
            Values::Int(v) => *v.get_mut(index).ok_or(oob)? = value as i32,
        }
        Ok(())
    }
}

/// Marker trait tying a Rust scalar to its `Values` variant.
///
/// This is the seam that lets the remapper's copy kernels stay generic while
/// the tagged union is dispatched exactly once per operation.
pub trait ValueElement: Copy + PartialEq + Default + 'static {
    /// The tag this scalar corresponds to.
    const ELEMENT: ElementType;

    /// Extracts the matching typed slice, or fails with a type mismatch.
    fn slice(values: &Values) -> Result<&[Self], BridgeError>;
    /// Extracts the matching typed slice mutably, or fails with a type mismatch.
    fn slice_mut(values: &mut Values) -> Result<&mut [Self], BridgeError>;
    /// Wraps a vector of this scalar into a `Values`.
    fn wrap(data: Vec<Self>) -> Values;
}

macro_rules! impl_value_element {
    ($ty:ty, $variant:ident) => {
        impl ValueElement for $ty {
            const ELEMENT: ElementType = ElementType::$variant;

            fn slice(values: &Values) -> Result<&[Self], BridgeError> {
                match values {
                    Values::$variant(v) => Ok(v),
                    other => Err(BridgeError::TypeMismatch {
                        expected: Self::ELEMENT,
                        found: other.element_type(),
                    }),
                }
            }

            fn slice_mut(values: &mut Values) -> Result<&mut [Self], BridgeError> {
                match values {
                    Values::$variant(v) => Ok(v),
                    other => Err(BridgeError::TypeMismatch {
                        expected: Self::ELEMENT,
                        found: other.element_type(),
                    }),
                }
            }

            fn wrap(data: Vec<Self>) -> Values {
                Values::$variant(data)
            }
        }
    };
}

impl_value_element!(f64, Double);
impl_value_element!(f32, Float);
impl_value_element!(i32, Int);

/// Name-keyed collection of typed buffers with deterministic iteration order.
///
/// Adding a name that is already present is a silent no-op; repeated writes
/// into an already-open file are a supported use case and must not fail on
/// the second pass.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValueStore {
    map: HashMap<String, Values>,
    order: Vec<String>,
}

impl ValueStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named buffer. No-op if `name` is already present.
    pub fn add(&mut self, name: &str, values: Values) {
        if self.map.contains_key(name) {
            debug!("value store already holds `{name}`; keeping existing buffer");
            return;
        }
        self.map.insert(name.to_owned(), values);
        self.order.push(name.to_owned());
    }

    /// Adds or overwrites a named buffer, keeping the original insertion
    /// position when replacing.
    ///
    /// The write path uses this to re-stage a variable: a buffer left
    /// behind by an earlier read of the same name must not shadow freshly
    /// extracted data.
    pub fn replace(&mut self, name: &str, values: Values) {
        if self.map.insert(name.to_owned(), values).is_none() {
            self.order.push(name.to_owned());
        }
    }

    /// Looks up a buffer by name.
    ///
    /// # Errors
    /// [`BridgeError::UnknownVariable`] if absent.
    pub fn try_get(&self, name: &str) -> Result<&Values, BridgeError> {
        self.map
            .get(name)
            .ok_or_else(|| BridgeError::UnknownVariable(name.to_owned()))
    }

    /// Looks up a buffer by name, mutably.
    pub fn try_get_mut(&mut self, name: &str) -> Result<&mut Values, BridgeError> {
        self.map
            .get_mut(name)
            .ok_or_else(|| BridgeError::UnknownVariable(name.to_owned()))
    }

    /// Removes a named buffer.
    ///
    /// # Errors
    /// [`BridgeError::UnknownVariable`] if absent.
    pub fn remove(&mut self, name: &str) -> Result<Values, BridgeError> {
        let values = self
            .map
            .remove(name)
            .ok_or_else(|| BridgeError::UnknownVariable(name.to_owned()))?;
        self.order.retain(|n| n != name);
        Ok(values)
    }

    /// Whether a buffer of this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Buffer names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of buffers held.
    pub fn len(&self) -> usize {
        debug_assert_eq!(self.order.len(), self.map.len());
        self.order.len()
    }

    /// Whether the store holds no buffers.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Drops every buffer.
    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }
}

/// Equality is element-wise over matching key sets, regardless of insertion
/// order. Defined for round-trip testing only, never production logic.
impl PartialEq for ValueStore {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_lookup() {
        let mut store = ValueStore::new();
        store.add("temp", Values::Double(vec![1.0, 2.0]));
        store.add("count", Values::Int(vec![7]));
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.try_get("temp").unwrap(),
            &Values::Double(vec![1.0, 2.0])
        );
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["temp", "count"]);
    }

    #[test]
    fn duplicate_add_is_noop() {
        let mut store = ValueStore::new();
        store.add("temp", Values::Double(vec![1.0]));
        store.add("temp", Values::Double(vec![9.0, 9.0]));
        assert_eq!(store.try_get("temp").unwrap(), &Values::Double(vec![1.0]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn replace_overwrites_and_keeps_order() {
        let mut store = ValueStore::new();
        store.add("a", Values::Int(vec![1]));
        store.add("b", Values::Int(vec![2]));
        store.replace("a", Values::Int(vec![9]));
        assert_eq!(store.try_get("a").unwrap(), &Values::Int(vec![9]));
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["a", "b"]);
        store.replace("c", Values::Int(vec![3]));
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn missing_lookup_fails() {
        let store = ValueStore::new();
        assert_eq!(
            store.try_get("nope").unwrap_err(),
            BridgeError::UnknownVariable("nope".into())
        );
    }

    #[test]
    fn remove_drops_name_and_order() {
        let mut store = ValueStore::new();
        store.add("a", Values::Int(vec![1]));
        store.add("b", Values::Int(vec![2]));
        store.remove("a").unwrap();
        assert!(!store.contains("a"));
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["b"]);
        assert!(store.remove("a").is_err());
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let mut a = ValueStore::new();
        a.add("x", Values::Float(vec![1.5]));
        a.add("y", Values::Int(vec![2]));
        let mut b = ValueStore::new();
        b.add("y", Values::Int(vec![2]));
        b.add("x", Values::Float(vec![1.5]));
        assert_eq!(a, b);
        b.add("z", Values::Int(vec![3]));
        assert_ne!(a, b);
    }

    #[test]
    fn equality_is_elementwise() {
        let mut a = ValueStore::new();
        a.add("x", Values::Double(vec![1.0, 2.0]));
        let mut b = ValueStore::new();
        b.add("x", Values::Double(vec![1.0, 2.5]));
        assert_ne!(a, b);
        // Same name, same length, different type tag.
        let mut c = ValueStore::new();
        c.add("x", Values::Float(vec![1.0, 2.0]));
        assert_ne!(a, c);
    }

    #[test]
    fn typed_slices_and_mismatch() {
        let mut v = Values::Double(vec![1.0, 2.0]);
        assert_eq!(v.as_slice::<f64>().unwrap(), &[1.0, 2.0]);
        let err = v.as_mut_slice::<i32>().unwrap_err();
        assert_eq!(
            err,
            BridgeError::TypeMismatch {
                expected: ElementType::Int,
                found: ElementType::Double,
            }
        );
    }

    #[test]
    fn widening_access() {
        let v = Values::Int(vec![3, -4]);
        assert_eq!(v.get_f64(1).unwrap(), -4.0);
        assert!(v.get_f64(2).is_err());
    }

    #[test]
    fn with_len_rejects_unsupported() {
        let err = Values::with_len(ElementType::Str, 4).unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedElementType { .. }));
    }

    #[test]
    fn element_type_codes_roundtrip() {
        for ty in [
            ElementType::Byte,
            ElementType::Short,
            ElementType::Int,
            ElementType::Float,
            ElementType::Double,
            ElementType::Str,
        ] {
            assert_eq!(ElementType::from_code(ty.code()).unwrap(), ty);
        }
        assert!(ElementType::from_code(99).is_err());
    }
}
