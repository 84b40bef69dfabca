//! Seam between the model layer and the engine that checks values.

use std::fmt::Debug;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{SchemaError, ValidationError};
use crate::options::ValidationOptions;

/// Compiles schema nodes into reusable validators.
///
/// Compilation happens once per node while a model type is built, so an
/// engine that cannot understand a node reports it as a [`SchemaError`]
/// before any instance exists.
pub trait ValidationEngine: Send + Sync + Debug {
    fn compile(&self, node: &Value) -> Result<Arc<dyn CompiledSchema>, SchemaError>;
}

/// A schema node ready to check candidate values.
pub trait CompiledSchema: Send + Sync + Debug {
    /// Check `value` against the node.
    ///
    /// On success returns the canonical value, which differs from the input
    /// only when `options.coerce` allowed the engine to convert something.
    /// The input is never modified.
    fn validate(&self, value: &Value, options: &ValidationOptions)
    -> Result<Value, ValidationError>;
}
