//! Spatial correspondence between two orderings of the same physical grid.
//!
//! A structured-mesh model enumerates grid points in a flat, rank-major
//! "native" order; the distributed runtime enumerates the same points in its
//! own "field" order. [`build_permutation`] reconciles the two by
//! nearest-neighbour search: an R-tree is bulk-loaded over the native points
//! (each tagged with its original position) projected onto the unit sphere,
//! and every field point queries its single nearest match. The result
//! indexes the native buffer side, which is what the remapping kernels
//! consume directly.
//!
//! Build is O(N log N), each query O(log N) — for large meshes this, not the
//! file I/O, is the asymptotic bottleneck, which is why the orchestrator
//! caches the result per grid.

use log::debug;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::error::BridgeError;
use crate::geometry::point::LonLat;

/// A native-order point tagged with its original position.
#[derive(Clone, Debug)]
struct IndexedVertex {
    xyz: [f64; 3],
    index: usize,
}

impl RTreeObject for IndexedVertex {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.xyz)
    }
}

impl PointDistance for IndexedVertex {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        self.xyz
            .iter()
            .zip(point)
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

/// Builds the index permutation between the two coordinate orderings.
///
/// `permutation[i]` is the native-order index of the point nearest to
/// field-order point `i`, so `buffer[permutation[i]]` reads the native value
/// belonging at field position `i`. When the two lists are the same points
/// in the same order the result is the identity sequence.
///
/// Tie-breaking between equidistant native points follows the R-tree's own
/// traversal order. Ties are vanishingly rare here: both orderings describe
/// the same physical grid, so exact matches dominate.
///
/// # Errors
/// - [`BridgeError::EmptyPointList`] if either list is empty.
/// - [`BridgeError::PointCountMismatch`] if the lists differ in length —
///   the orderings describe grids of different size, almost always a wrong
///   resolution selected upstream. No silent truncation.
pub fn build_permutation(
    field_points: &[LonLat],
    native_points: &[LonLat],
) -> Result<Vec<usize>, BridgeError> {
    if field_points.is_empty() || native_points.is_empty() {
        return Err(BridgeError::EmptyPointList);
    }
    if field_points.len() != native_points.len() {
        return Err(BridgeError::PointCountMismatch {
            field: field_points.len(),
            native: native_points.len(),
        });
    }

    let vertices: Vec<IndexedVertex> = native_points
        .iter()
        .enumerate()
        .map(|(index, p)| IndexedVertex {
            xyz: p.to_unit_xyz(),
            index,
        })
        .collect();
    let tree = RTree::bulk_load(vertices);

    let mut permutation = Vec::with_capacity(field_points.len());
    for p in field_points {
        let query = p.to_unit_xyz();
        // Non-empty tree: nearest_neighbor always yields a vertex.
        let nearest = tree
            .nearest_neighbor(&query)
            .ok_or(BridgeError::EmptyPointList)?;
        permutation.push(nearest.index);
    }
    debug!(
        "built correspondence over {} point(s)",
        permutation.len()
    );
    Ok(permutation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(coords: &[(f64, f64)]) -> Vec<LonLat> {
        coords.iter().map(|&(lon, lat)| LonLat::new(lon, lat)).collect()
    }

    #[test]
    fn identical_orderings_give_identity() {
        let points = pts(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)]);
        let perm = build_permutation(&points, &points).unwrap();
        assert_eq!(perm, vec![0, 1, 2, 3]);
    }

    #[test]
    fn reversed_ordering_reverses_indices() {
        let native = pts(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)]);
        let field = pts(&[(10.0, 10.0), (0.0, 10.0), (10.0, 0.0), (0.0, 0.0)]);
        let perm = build_permutation(&field, &native).unwrap();
        assert_eq!(perm, vec![3, 2, 1, 0]);
    }

    #[test]
    fn unequal_lengths_fail() {
        let native = pts(&[(0.0, 0.0), (1.0, 1.0)]);
        let field = pts(&[(0.0, 0.0)]);
        let err = build_permutation(&field, &native).unwrap_err();
        assert_eq!(
            err,
            BridgeError::PointCountMismatch { field: 1, native: 2 }
        );
    }

    #[test]
    fn empty_lists_fail() {
        assert_eq!(
            build_permutation(&[], &[]).unwrap_err(),
            BridgeError::EmptyPointList
        );
    }

    #[test]
    fn shuffled_ring_is_recovered() {
        // A ring of points around the globe, field order rotated by three.
        let native: Vec<LonLat> =
            (0..12).map(|i| LonLat::new(-180.0 + 30.0 * i as f64, 15.0)).collect();
        let field: Vec<LonLat> = (0..12).map(|i| native[(i + 3) % 12]).collect();
        let perm = build_permutation(&field, &native).unwrap();
        for (i, &pi) in perm.iter().enumerate() {
            assert_eq!(native[pi], field[i]);
        }
        // Rotation by three maps field index i to native index (i + 3) mod 12.
        assert_eq!(perm[0], 3);
        assert_eq!(perm[11], 2);
    }

    #[test]
    fn permutation_pairs_same_physical_location() {
        let native = pts(&[(-75.0, 40.0), (0.0, 51.5), (139.7, 35.7), (151.2, -33.9)]);
        let field = pts(&[(139.7, 35.7), (151.2, -33.9), (-75.0, 40.0), (0.0, 51.5)]);
        let perm = build_permutation(&field, &native).unwrap();
        assert_eq!(perm, vec![2, 3, 0, 1]);
        for (i, &pi) in perm.iter().enumerate() {
            assert_eq!(native[pi], field[i]);
        }
    }
}
