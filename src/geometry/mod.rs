//! Geometry module: geographic points and the spatial correspondence builder.
#![warn(missing_docs)]

pub mod correspondence;
pub mod point;

pub use correspondence::build_permutation;
pub use point::LonLat;
