//! The read path: file → staged buffers → global field → scattered local
//! fields.

use chrono::{DateTime, Utc};
use log::debug;

use crate::error::BridgeError;
use crate::geometry::correspondence::build_permutation;
use crate::geometry::point::LonLat;
use crate::orchestrator::{Orchestrator, ScalarFacts};
use crate::remap::{self, FieldValues, LevelPolicy};
use crate::runtime::comm::Collective;
use crate::runtime::format::FormatEngine;
use crate::runtime::mesh::FieldRuntime;
use crate::store::schema::Variable;
use crate::time_axis::TimeAxis;

impl<E: FormatEngine, C: Collective> Orchestrator<E, C> {
    /// Ingests the open file's header into the grid's staging schema:
    /// dimension table, variable table (all variables, or only those named
    /// in `subset`), and file-level attributes.
    ///
    /// Owner only; other ranks return immediately. Repeated ingests are
    /// no-ops thanks to the schema's duplicate-add policy.
    pub fn ingest_schema(
        &mut self,
        grid: &str,
        subset: Option<&[&str]>,
    ) -> Result<(), BridgeError> {
        if !self.is_owner() {
            return Ok(());
        }
        match self.owner_ingest_schema(grid, subset) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn owner_ingest_schema(
        &mut self,
        grid: &str,
        subset: Option<&[&str]>,
    ) -> Result<(), BridgeError> {
        let dims = self.engine.dimensions()?;
        let vars = self.engine.variables()?;
        let globals = self.engine.global_attributes()?;

        let schema = self.cache.entry(grid).schema_mut();
        for (name, size) in dims {
            schema.add_dimension(&name, size);
        }
        for info in vars {
            if let Some(wanted) = subset {
                if !wanted.contains(&info.name.as_str()) {
                    continue;
                }
            }
            let mut var = Variable::new(info.element_type);
            for dim in &info.dims {
                let size = schema.dimension_size(dim)?;
                var.push_dim(dim, size);
            }
            for (name, value) in info.attrs {
                var.add_attribute(&name, value);
            }
            schema.add_variable(&info.name, var)?;
        }
        for (name, value) in globals {
            schema.add_global_attribute(&name, value);
        }
        Ok(())
    }

    /// Builds the correspondence permutation for the runtime's grid, reading
    /// the native-order coordinates from the named file variables and the
    /// field-order coordinates from the runtime.
    ///
    /// Owner only. A cached permutation is reused, never recomputed — the
    /// spatial-index build is the most expensive step of the whole read
    /// path.
    pub fn build_correspondence<R: FieldRuntime>(
        &mut self,
        runtime: &R,
        lon_var: &str,
        lat_var: &str,
    ) -> Result<(), BridgeError> {
        if !self.is_owner() {
            return Ok(());
        }
        let grid = runtime.grid_id().to_owned();
        if self.cache.entry(&grid).permutation().is_some() {
            debug!("reusing cached permutation for grid `{grid}`");
            return Ok(());
        }
        match self.owner_build_correspondence(runtime, &grid, lon_var, lat_var) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn owner_build_correspondence<R: FieldRuntime>(
        &mut self,
        runtime: &R,
        grid: &str,
        lon_var: &str,
        lat_var: &str,
    ) -> Result<(), BridgeError> {
        let lons = self.engine.read_full(lon_var)?;
        let lats = self.engine.read_full(lat_var)?;
        if lons.len() != lats.len() {
            return Err(BridgeError::SizeMismatch {
                expected: lons.len(),
                found: lats.len(),
            });
        }
        let mut native = Vec::with_capacity(lons.len());
        for i in 0..lons.len() {
            native.push(LonLat::new(lons.get_f64(i)?, lats.get_f64(i)?));
        }
        let field = runtime.global_lonlat();
        let permutation = build_permutation(&field, &native)?;
        self.cache.entry(grid).set_permutation(permutation);
        Ok(())
    }

    /// Decodes the file's time axis from the named time variable, whose
    /// `origin_attr` attribute carries the `"<date> <time>"` origin.
    ///
    /// Owner only; an already-decoded axis is reused.
    pub fn decode_time_axis(
        &mut self,
        grid: &str,
        time_var: &str,
        origin_attr: &str,
    ) -> Result<(), BridgeError> {
        if !self.is_owner() {
            return Ok(());
        }
        if self.cache.entry(grid).time_axis().is_some() {
            debug!("reusing cached time axis for grid `{grid}`");
            return Ok(());
        }
        match self.owner_decode_time_axis(grid, time_var, origin_attr) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn owner_decode_time_axis(
        &mut self,
        grid: &str,
        time_var: &str,
        origin_attr: &str,
    ) -> Result<(), BridgeError> {
        let origin_text = {
            let var = self.cache.entry(grid).schema().try_variable(time_var)?;
            let attr = var.try_attribute(origin_attr)?;
            attr.as_str()
                .ok_or_else(|| BridgeError::TimeOriginUnparseable(format!("{attr:?}")))?
                .to_owned()
        };
        let seconds = self.engine.read_full(time_var)?;
        let axis = TimeAxis::decode(&origin_text, &seconds)?;
        self.cache.entry(grid).set_time_axis(axis);
        Ok(())
    }

    /// Stages a variable's contents into the grid's value store, reading
    /// either the full variable or — when `at` is given — the single time
    /// slice exactly matching that timestamp (first dimension is the time
    /// axis). Returns the staging key; an already-staged buffer is reused.
    ///
    /// Owner only; other ranks return the plain name without staging
    /// anything.
    pub fn stage_variable(
        &mut self,
        grid: &str,
        name: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<String, BridgeError> {
        if !self.is_owner() {
            return Ok(name.to_owned());
        }
        match self.owner_stage_variable(grid, name, at) {
            Ok(key) => Ok(key),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn owner_stage_variable(
        &mut self,
        grid: &str,
        name: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<String, BridgeError> {
        let key = match at {
            None => name.to_owned(),
            Some(stamp) => {
                let index = self.cache.entry(grid).try_time_axis()?.index_of(stamp)?;
                format!("{name}@{index}")
            }
        };
        if self.cache.entry(grid).values().contains(&key) {
            debug!("buffer `{key}` already staged for grid `{grid}`");
            return Ok(key);
        }
        let values = match at {
            None => self.engine.read_full(name)?,
            Some(stamp) => {
                let area = self.cache.entry(grid);
                let index = area.try_time_axis()?.index_of(stamp)?;
                let dims = area.schema().try_variable(name)?.dims();
                if dims.is_empty() {
                    return Err(BridgeError::ShapeMismatch {
                        variable: name.to_owned(),
                        total: 1,
                        points: 0,
                    });
                }
                let mut offsets = vec![0usize; dims.len()];
                offsets[0] = index;
                let mut counts: Vec<usize> = dims.iter().map(|&(_, s)| s).collect();
                counts[0] = 1;
                self.engine.read_slice(name, &offsets, &counts)?
            }
        };
        self.cache.entry(grid).values_mut().add(&key, values);
        Ok(key)
    }

    /// Reads a variable into a scattered, halo-exchanged local field.
    ///
    /// The owner stages the buffer, remaps it into the global field through
    /// the cached permutation and broadcasts the scalar facts; every rank
    /// participates in the broadcast, the scatter and the halo exchange.
    /// Requires [`ingest_schema`](Self::ingest_schema) and
    /// [`build_correspondence`](Self::build_correspondence) to have run.
    pub fn read_field<R: FieldRuntime>(
        &mut self,
        runtime: &R,
        name: &str,
        policy: LevelPolicy,
        at: Option<DateTime<Utc>>,
    ) -> Result<FieldValues, BridgeError> {
        let grid = runtime.grid_id().to_owned();
        let mut wire = [0u8; ScalarFacts::WIRE_LEN];
        if self.is_owner() {
            match self.owner_read_facts(&grid, name, at) {
                Ok(facts) => wire = facts.encode(),
                Err(err) => return Err(self.fail(err)),
            }
        }
        self.comm.broadcast_bytes(self.owner, &mut wire);
        let facts = match ScalarFacts::decode(&wire) {
            Ok(facts) => facts,
            Err(err) => return Err(self.fail(err)),
        };
        // Every rank checks the broadcast point count against its runtime,
        // catching an owner/runtime grid disagreement before any allocation.
        if facts.points != runtime.global_point_count() {
            return Err(self.fail(BridgeError::SizeMismatch {
                expected: facts.points,
                found: runtime.global_point_count(),
            }));
        }
        let field_levels = policy.destination_levels(facts.buffer_levels);

        let mut global = runtime.create_global(facts.element_type, field_levels)?;
        if self.is_owner() {
            if let Err(err) =
                self.owner_fill_global(&grid, name, at, facts, policy, &mut global)
            {
                return Err(self.fail(err));
            }
        }
        let mut local = runtime.create_local(facts.element_type, field_levels)?;
        runtime.scatter(&global, &mut local)?;
        runtime.halo_exchange(&mut local)?;
        Ok(local)
    }

    /// Scalar facts for one variable: element type, buffer level count, and
    /// horizontal point count. The level count divides the variable's flat
    /// size (time step excluded when slicing) by the permutation length.
    fn owner_read_facts(
        &mut self,
        grid: &str,
        name: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<ScalarFacts, BridgeError> {
        let area = self.cache.entry(grid);
        let points = area.try_permutation()?.len();
        let var = area.schema().try_variable(name)?;
        let total: usize = if at.is_some() {
            if var.dims().is_empty() {
                return Err(BridgeError::ShapeMismatch {
                    variable: name.to_owned(),
                    total: 1,
                    points,
                });
            }
            var.dims()[1..].iter().map(|&(_, s)| s).product()
        } else {
            var.total_size()
        };
        if points == 0 || total % points != 0 {
            return Err(BridgeError::ShapeMismatch {
                variable: name.to_owned(),
                total,
                points,
            });
        }
        Ok(ScalarFacts {
            element_type: var.element_type(),
            buffer_levels: total / points,
            points,
        })
    }

    fn owner_fill_global(
        &mut self,
        grid: &str,
        name: &str,
        at: Option<DateTime<Utc>>,
        facts: ScalarFacts,
        policy: LevelPolicy,
        global: &mut FieldValues,
    ) -> Result<(), BridgeError> {
        let key = self.owner_stage_variable(grid, name, at)?;
        let area = self.cache.entry(grid);
        let buffer = area.values().try_get(&key)?;
        let permutation = area.try_permutation()?;
        remap::buffer_to_field(global, buffer, permutation, facts.buffer_levels, policy)
    }
}
