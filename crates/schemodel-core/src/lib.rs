//! Core contracts shared by the schemodel crates.
//!
//! This crate defines the error types, the validation options passed through
//! to every engine call, and the traits a validation engine implements.

pub mod engine;
pub mod error;
pub mod options;

pub use engine::{CompiledSchema, ValidationEngine};
pub use error::{Error, Result, SchemaError, ValidationError, Violation};
pub use options::ValidationOptions;
