//! Runtime module: the external collaborators the core drives.
//!
//! The on-disk format engine and the distributed mesh/field runtime are
//! black boxes to this crate; they appear here only as the traits the
//! orchestrator needs, together with serial in-memory implementations used
//! by tests and single-process runs.
#![warn(missing_docs)]

pub mod comm;
pub mod format;
pub mod mesh;

pub use comm::{Collective, NoComm};
pub use format::{FileMode, FormatEngine, MemoryEngine, MemoryStore, VariableInfo};
pub use mesh::{FieldRuntime, SerialRuntime};

#[cfg(feature = "mpi-support")]
pub use comm::MpiComm;
