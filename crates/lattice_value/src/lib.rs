//! # lattice_value - Value Tree & Path Operations
//!
//! This crate provides the structural foundation for Lattice:
//! a recursive tagged value type for hierarchical application state,
//! and pure path operations that read, write, and delete locations
//! inside it without mutating the original.
//!
//! ## Key Concepts
//!
//! - **Value**: dynamic tagged tree (object/array/scalar variants)
//! - **Path**: ordered string segments addressing a location
//! - **Path ops**: `get`/`set`/`delete` with structural sharing -
//!   writes shallow-copy the spine and reuse unrelated siblings

pub mod path;
pub mod value;

pub use path::{delete, get, set, InvalidPathError, Path};
pub use value::Value;
