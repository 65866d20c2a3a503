//! The write path: gathered global field → staged buffer → file.

use log::debug;

use crate::error::BridgeError;
use crate::orchestrator::Orchestrator;
use crate::remap::{self, FieldValues, LevelPolicy};
use crate::runtime::comm::Collective;
use crate::runtime::format::FormatEngine;
use crate::runtime::mesh::FieldRuntime;
use crate::store::schema::Variable;
use crate::store::values::Values;

impl<E: FormatEngine, C: Collective> Orchestrator<E, C> {
    /// Extracts a local field into the grid's staged buffer for `name`.
    ///
    /// Every rank participates: the local field is halo-exchanged and
    /// gathered into a global field first, and only then does the owner
    /// remap the gathered data through the cached permutation into a flat
    /// native-layout buffer. Reversing that order silently produces
    /// spatially incoherent data, which is why the exchange and gather live
    /// inside this call rather than with the caller.
    ///
    /// If the staging schema does not yet describe `name`, a variable is
    /// registered over dimensions found by reverse size lookup — which
    /// fails loudly when two dimensions share a size, rather than guessing.
    pub fn write_field<R: FieldRuntime>(
        &mut self,
        runtime: &R,
        name: &str,
        policy: LevelPolicy,
        local: &mut FieldValues,
    ) -> Result<(), BridgeError> {
        let grid = runtime.grid_id().to_owned();
        runtime.halo_exchange(local)?;
        let mut global = runtime.create_global(local.element_type(), local.levels())?;
        runtime.gather(local, &mut global)?;
        if self.is_owner() {
            if let Err(err) = self.owner_extract(&grid, name, policy, &global) {
                return Err(self.fail(err));
            }
        }
        Ok(())
    }

    fn owner_extract(
        &mut self,
        grid: &str,
        name: &str,
        policy: LevelPolicy,
        global: &FieldValues,
    ) -> Result<(), BridgeError> {
        let buffer_levels = policy.destination_levels(global.levels());
        let area = self.cache.entry(grid);
        let points = area.try_permutation()?.len();
        let mut buffer = Values::with_len(global.element_type(), points * buffer_levels)?;
        remap::field_to_buffer(
            &mut buffer,
            global,
            area.try_permutation()?,
            buffer_levels,
            policy,
        )?;

        if !area.schema().has_variable(name) {
            let level_dim = if buffer_levels > 1 {
                Some(area.schema().find_dimension_for_size(buffer_levels)?.to_owned())
            } else {
                None
            };
            let horizontal_dim = area.schema().find_dimension_for_size(points)?.to_owned();
            let mut var = Variable::new(global.element_type());
            if let Some(level_dim) = level_dim {
                var.push_dim(&level_dim, buffer_levels);
            }
            // Innermost dimension: points vary fastest in the native layout.
            var.push_dim(&horizontal_dim, points);
            area.schema_mut().add_variable(name, var)?;
            debug!("registered variable `{name}` for grid `{grid}` by size lookup");
        }
        // A buffer staged by an earlier read of this name must not shadow
        // the freshly extracted data.
        area.values_mut().replace(name, buffer);
        Ok(())
    }

    /// Writes the grid's staged schema and buffers into the open file:
    /// dimension table, variable table with attributes, file-level
    /// attributes, then every staged buffer that matches a schema variable.
    ///
    /// Owner only; other ranks return immediately. The engine skips names
    /// already present, so repeated flushes into the same open file write
    /// incrementally.
    pub fn flush(&mut self, grid: &str) -> Result<(), BridgeError> {
        if !self.is_owner() {
            return Ok(());
        }
        match self.owner_flush(grid) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn owner_flush(&mut self, grid: &str) -> Result<(), BridgeError> {
        let area = self.cache.entry(grid);
        for (name, size) in area.schema().dimensions() {
            self.engine.add_dimension(name, size)?;
        }
        for (name, var) in area.schema().variables() {
            let dims: Vec<String> = var.dim_names().map(str::to_owned).collect();
            self.engine.add_variable(name, var.element_type(), &dims)?;
            for (attr, value) in var.attributes() {
                self.engine.add_attribute(Some(name), attr, value.clone())?;
            }
        }
        for (attr, value) in area.schema().global_attributes() {
            self.engine.add_attribute(None, attr, value.clone())?;
        }
        for name in area.values().names() {
            // Staged read slices (`var@step` keys) have no schema variable
            // and are not written.
            if area.schema().has_variable(name) {
                self.engine.write_full(name, area.values().try_get(name)?)?;
            }
        }
        Ok(())
    }
}
