//! Store module: typed value buffers and the file schema model.
#![warn(missing_docs)]

pub mod schema;
pub mod values;

pub use schema::{AttrValue, Schema, Variable};
pub use values::{ElementType, ValueElement, ValueStore, Values};
