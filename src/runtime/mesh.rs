//! The distributed mesh/field runtime interface, plus a serial test double.
//!
//! Mesh generation, partitioning and halo bookkeeping live in an external
//! runtime; this crate only needs the handful of operations below. Scatter,
//! gather and halo exchange are collectives — every rank must call them —
//! while global-field contents are only meaningful on the owning rank.

use crate::error::BridgeError;
use crate::geometry::point::LonLat;
use crate::remap::FieldValues;
use crate::store::values::ElementType;

/// The mesh/field operations the orchestrator drives.
pub trait FieldRuntime {
    /// Stable identifier of the grid this runtime was built over. Keys the
    /// orchestrator's staging cache.
    fn grid_id(&self) -> &str;

    /// Number of points in the global (gathered) representation.
    fn global_point_count(&self) -> usize;

    /// Number of locally owned (non-halo) points on this rank.
    fn owned_size(&self) -> usize;

    /// Field-order coordinates of the global representation. Only the
    /// owning rank consumes this, to build the correspondence.
    fn global_lonlat(&self) -> Vec<LonLat>;

    /// Allocates a global (gathered) field. Collective: every rank
    /// allocates, even though only the owner fills it.
    fn create_global(
        &self,
        ty: ElementType,
        levels: usize,
    ) -> Result<FieldValues, BridgeError>;

    /// Allocates a local field sized for this rank's partition plus halo.
    fn create_local(
        &self,
        ty: ElementType,
        levels: usize,
    ) -> Result<FieldValues, BridgeError>;

    /// Distributes a global field to local partitions. Collective.
    fn scatter(
        &self,
        global: &FieldValues,
        local: &mut FieldValues,
    ) -> Result<(), BridgeError>;

    /// Collects local partitions into a global field on the owner. Collective.
    fn gather(
        &self,
        local: &FieldValues,
        global: &mut FieldValues,
    ) -> Result<(), BridgeError>;

    /// Refreshes halo points from their owning ranks. Collective.
    fn halo_exchange(&self, local: &mut FieldValues) -> Result<(), BridgeError>;
}

/// Single-rank runtime: the whole grid is one partition with no halo.
///
/// Scatter and gather degenerate to copies and halo exchange to a no-op.
/// Backs the serial tests and any single-process deployment.
#[derive(Clone, Debug)]
pub struct SerialRuntime {
    grid: String,
    lonlat: Vec<LonLat>,
}

impl SerialRuntime {
    /// Creates a runtime over the given field-order coordinates.
    pub fn new(grid: impl Into<String>, lonlat: Vec<LonLat>) -> Self {
        Self {
            grid: grid.into(),
            lonlat,
        }
    }
}

fn check_shapes(a: &FieldValues, b: &FieldValues) -> Result<(), BridgeError> {
    if a.element_type() != b.element_type() {
        return Err(BridgeError::TypeMismatch {
            expected: a.element_type(),
            found: b.element_type(),
        });
    }
    if a.points() != b.points() || a.levels() != b.levels() {
        return Err(BridgeError::SizeMismatch {
            expected: a.points() * a.levels(),
            found: b.points() * b.levels(),
        });
    }
    Ok(())
}

impl FieldRuntime for SerialRuntime {
    fn grid_id(&self) -> &str {
        &self.grid
    }

    fn global_point_count(&self) -> usize {
        self.lonlat.len()
    }

    fn owned_size(&self) -> usize {
        self.lonlat.len()
    }

    fn global_lonlat(&self) -> Vec<LonLat> {
        self.lonlat.clone()
    }

    fn create_global(
        &self,
        ty: ElementType,
        levels: usize,
    ) -> Result<FieldValues, BridgeError> {
        FieldValues::with_shape(ty, self.lonlat.len(), levels)
    }

    fn create_local(
        &self,
        ty: ElementType,
        levels: usize,
    ) -> Result<FieldValues, BridgeError> {
        FieldValues::with_shape(ty, self.lonlat.len(), levels)
    }

    fn scatter(
        &self,
        global: &FieldValues,
        local: &mut FieldValues,
    ) -> Result<(), BridgeError> {
        check_shapes(global, local)?;
        *local = global.clone();
        Ok(())
    }

    fn gather(
        &self,
        local: &FieldValues,
        global: &mut FieldValues,
    ) -> Result<(), BridgeError> {
        check_shapes(local, global)?;
        *global = local.clone();
        Ok(())
    }

    fn halo_exchange(&self, _local: &mut FieldValues) -> Result<(), BridgeError> {
        Ok(())
    }
}
