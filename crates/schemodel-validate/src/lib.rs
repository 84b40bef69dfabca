//! Default validation engine for schemodel, backed by the `jsonschema` crate.
//!
//! Adds the two behaviours the model layer asks of an engine on top of plain
//! JSON Schema checking: coercion of string inputs into their declared
//! primitive type and partial validation that tolerates missing required
//! fields.

mod coerce;
pub mod engine;
mod partial;

pub use engine::{JsonSchemaEngine, JsonSchemaValidator};
