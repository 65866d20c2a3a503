//! # grid-bridge
//!
//! grid-bridge reconciles two independent orderings of the same physical
//! grid — the flat native ordering a structured-output file uses and the
//! distributed, halo-padded field ordering an unstructured-mesh runtime
//! uses — and orchestrates file I/O so that a single owning process touches
//! disk while every process ends up with a consistent distributed copy of
//! the data.
//!
//! ## Subsystems
//! - [`geometry`]: geographic points and the nearest-neighbour
//!   correspondence builder (an R-tree over unit-sphere coordinates).
//! - [`store`]: type-tagged value buffers and a format-independent file
//!   schema model.
//! - [`remap`]: index remapping between the flat native layout and the
//!   (point, level) field layout, including vertical-level reconciliation.
//! - [`time_axis`]: decoding a file's time variable into UTC timestamps.
//! - [`staging`]: per-grid caching of schema, buffers, permutation and
//!   time axis.
//! - [`orchestrator`]: single-owner parallel read/write sequencing.
//! - [`runtime`]: interfaces of the two external collaborators — the file
//!   format engine and the mesh/field runtime — plus serial in-memory
//!   implementations used by tests and single-process runs.
//!
//! ## Concurrency model
//! One process per partition, MPI-style; nothing here spawns threads.
//! Collectives (broadcast, scatter, gather, halo exchange) block until
//! every rank arrives; everything else is local to the owning rank. Errors
//! are terminal: the detecting rank signals the whole group, then fails
//! locally.
//!
//! ## Usage
//! Construct an [`orchestrator::Orchestrator`] once over a format engine
//! and a collective backend, then reuse it across reads and writes; the
//! cached per-grid state (the correspondence permutation above all) makes
//! repeated operations against the same grid cheap.
//!
//! The `mpi-support` feature enables the MPI collective backend; the
//! default build is serial and links no system libraries.

pub mod error;
pub mod geometry;
pub mod orchestrator;
pub mod remap;
pub mod runtime;
pub mod staging;
pub mod store;
pub mod time_axis;

/// Convenience prelude re-exporting the crate's main surface.
pub mod prelude {
    pub use crate::error::BridgeError;
    pub use crate::geometry::correspondence::build_permutation;
    pub use crate::geometry::point::LonLat;
    pub use crate::orchestrator::Orchestrator;
    pub use crate::remap::{
        buffer_to_field, field_to_buffer, FieldArray, FieldValues, LevelPolicy,
    };
    #[cfg(feature = "mpi-support")]
    pub use crate::runtime::comm::MpiComm;
    pub use crate::runtime::comm::{Collective, NoComm};
    pub use crate::runtime::format::{
        FileMode, FormatEngine, MemoryEngine, MemoryStore, VariableInfo,
    };
    pub use crate::runtime::mesh::{FieldRuntime, SerialRuntime};
    pub use crate::staging::{FileStagingArea, StagingCache};
    pub use crate::store::schema::{AttrValue, Schema, Variable};
    pub use crate::store::values::{ElementType, ValueStore, Values};
    pub use crate::time_axis::TimeAxis;
}
