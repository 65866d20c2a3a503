//! Per-grid staging for file contents in flight.
//!
//! A [`FileStagingArea`] bundles the schema, the staged value buffers, the
//! grid's correspondence permutation and (for time-varying files) the
//! decoded time axis. The orchestrator keys one per grid identifier in a
//! [`StagingCache`], so the expensive pieces — the permutation above all —
//! are built once and reused across every read against that grid.
#![warn(missing_docs)]

use std::collections::HashMap;

use log::debug;

use crate::error::BridgeError;
use crate::store::schema::Schema;
use crate::store::values::ValueStore;
use crate::time_axis::TimeAxis;

/// Staged state for one (grid, file family) pairing.
#[derive(Clone, Debug, Default)]
pub struct FileStagingArea {
    grid: String,
    schema: Schema,
    values: ValueStore,
    permutation: Option<Vec<usize>>,
    time_axis: Option<TimeAxis>,
}

impl FileStagingArea {
    /// Creates an empty staging area for the named grid.
    pub fn new(grid: impl Into<String>) -> Self {
        Self {
            grid: grid.into(),
            ..Self::default()
        }
    }

    /// The grid identifier this area is keyed by.
    #[inline]
    pub fn grid(&self) -> &str {
        &self.grid
    }

    /// The staged schema.
    #[inline]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The staged schema, mutably.
    #[inline]
    pub fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    /// The staged value buffers.
    #[inline]
    pub fn values(&self) -> &ValueStore {
        &self.values
    }

    /// The staged value buffers, mutably.
    #[inline]
    pub fn values_mut(&mut self) -> &mut ValueStore {
        &mut self.values
    }

    /// The cached permutation, if one has been built.
    pub fn permutation(&self) -> Option<&[usize]> {
        self.permutation.as_deref()
    }

    /// The cached permutation, or an error naming the grid.
    pub fn try_permutation(&self) -> Result<&[usize], BridgeError> {
        self.permutation
            .as_deref()
            .ok_or_else(|| BridgeError::MissingPermutation(self.grid.clone()))
    }

    /// Installs the permutation. Immutable thereafter: once built for a grid
    /// it is never recomputed, only [`clear_permutation`](Self::clear_permutation)
    /// makes room for a new one.
    pub fn set_permutation(&mut self, permutation: Vec<usize>) {
        if self.permutation.is_some() {
            debug!("grid `{}` already has a permutation; keeping it", self.grid);
            return;
        }
        self.permutation = Some(permutation);
    }

    /// Explicitly discards the cached permutation.
    pub fn clear_permutation(&mut self) {
        self.permutation = None;
    }

    /// The decoded time axis, if any.
    pub fn time_axis(&self) -> Option<&TimeAxis> {
        self.time_axis.as_ref()
    }

    /// The decoded time axis, or an error naming the grid.
    pub fn try_time_axis(&self) -> Result<&TimeAxis, BridgeError> {
        self.time_axis
            .as_ref()
            .ok_or_else(|| BridgeError::NoTimeAxis(self.grid.clone()))
    }

    /// Installs a decoded time axis. Like the permutation, computed once.
    pub fn set_time_axis(&mut self, axis: TimeAxis) {
        if self.time_axis.is_some() {
            debug!("grid `{}` already has a time axis; keeping it", self.grid);
            return;
        }
        self.time_axis = Some(axis);
    }

    /// Drops the bulk value buffers while keeping schema, permutation and
    /// time axis — called once a consumer is done, for memory economy.
    pub fn clear_bulk(&mut self) {
        self.values.clear();
    }
}

/// Grid-keyed collection of staging areas.
#[derive(Debug, Default)]
pub struct StagingCache {
    areas: HashMap<String, FileStagingArea>,
}

impl StagingCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The staging area for `grid`, created empty on first use.
    pub fn entry(&mut self, grid: &str) -> &mut FileStagingArea {
        self.areas
            .entry(grid.to_owned())
            .or_insert_with(|| FileStagingArea::new(grid))
    }

    /// Read-only lookup.
    pub fn get(&self, grid: &str) -> Option<&FileStagingArea> {
        self.areas.get(grid)
    }

    /// Whether a staging area exists for `grid`.
    pub fn contains_grid(&self, grid: &str) -> bool {
        self.areas.contains_key(grid)
    }

    /// Grid identifiers currently cached, in no particular order.
    pub fn grids(&self) -> impl Iterator<Item = &str> {
        self.areas.keys().map(String::as_str)
    }

    /// Drops every staging area.
    pub fn clear(&mut self) {
        self.areas.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::values::Values;

    #[test]
    fn permutation_is_write_once() {
        let mut area = FileStagingArea::new("c12");
        assert!(matches!(
            area.try_permutation(),
            Err(BridgeError::MissingPermutation(_))
        ));
        area.set_permutation(vec![1, 0]);
        area.set_permutation(vec![0, 1]);
        assert_eq!(area.try_permutation().unwrap(), &[1, 0]);
        area.clear_permutation();
        area.set_permutation(vec![0, 1]);
        assert_eq!(area.try_permutation().unwrap(), &[0, 1]);
    }

    #[test]
    fn clear_bulk_keeps_schema_and_permutation() {
        let mut area = FileStagingArea::new("c12");
        area.schema_mut().add_dimension("cell", 2);
        area.values_mut().add("temp", Values::Double(vec![1.0, 2.0]));
        area.set_permutation(vec![0, 1]);
        area.clear_bulk();
        assert!(area.values().is_empty());
        assert!(area.schema().has_dimension("cell"));
        assert!(area.permutation().is_some());
    }

    #[test]
    fn cache_creates_on_first_use_and_reuses() {
        let mut cache = StagingCache::new();
        assert!(!cache.contains_grid("c12"));
        cache.entry("c12").set_permutation(vec![0]);
        assert!(cache.contains_grid("c12"));
        // Same grid returns the same area, permutation intact.
        assert_eq!(cache.entry("c12").try_permutation().unwrap(), &[0]);
        cache.entry("c24");
        let mut grids: Vec<_> = cache.grids().collect();
        grids.sort_unstable();
        assert_eq!(grids, vec!["c12", "c24"]);
    }
}
