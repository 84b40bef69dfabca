use std::fmt;
use std::sync::Arc;

use jsonschema::{Draft, JSONSchema};
use schemodel_core::{
    CompiledSchema, SchemaError, ValidationEngine, ValidationError, ValidationOptions, Violation,
};
use serde_json::Value;
use tracing::trace;

use crate::coerce::Coercer;
use crate::partial::strip_required;

/// Validation engine that compiles nodes with `jsonschema` (Draft 7).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaEngine;

impl JsonSchemaEngine {
    pub fn new() -> Self {
        Self
    }

    /// Compile `node` into a concrete validator.
    pub fn compile_node(&self, node: &Value) -> Result<JsonSchemaValidator, SchemaError> {
        let full = compile_draft7(node)?;
        let partial = compile_draft7(&strip_required(node))?;
        Ok(JsonSchemaValidator {
            schema: node.clone(),
            full,
            partial,
        })
    }
}

impl ValidationEngine for JsonSchemaEngine {
    fn compile(&self, node: &Value) -> Result<Arc<dyn CompiledSchema>, SchemaError> {
        Ok(Arc::new(self.compile_node(node)?))
    }
}

/// A compiled node. Holds one validator for full checks and one with every
/// `required` list removed for partial checks.
pub struct JsonSchemaValidator {
    schema: Value,
    full: JSONSchema,
    partial: JSONSchema,
}

impl JsonSchemaValidator {
    /// The schema document this validator was compiled from.
    pub fn schema(&self) -> &Value {
        &self.schema
    }
}

impl fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchemaValidator")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl CompiledSchema for JsonSchemaValidator {
    fn validate(
        &self,
        value: &Value,
        options: &ValidationOptions,
    ) -> Result<Value, ValidationError> {
        let candidate = if options.coerce {
            Coercer::new(&self.schema).coerce(value)
        } else {
            value.clone()
        };

        let compiled = if options.partial {
            &self.partial
        } else {
            &self.full
        };

        if let Err(errors) = compiled.validate(&candidate) {
            let violations: Vec<Violation> = errors
                .map(|error| {
                    let path = normalized_json_pointer(&error.instance_path.to_string());
                    let schema_path = error.schema_path.to_string();
                    let keyword = schema_path.rsplit('/').next().unwrap_or_default();
                    Violation::new(path, keyword, error.to_string())
                })
                .collect();
            return Err(ValidationError::new(violations));
        }

        if candidate != *value {
            trace!(coerced = %candidate, "value coerced during validation");
        }
        Ok(candidate)
    }
}

fn compile_draft7(node: &Value) -> Result<JSONSchema, SchemaError> {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(node)
        .map_err(|err| SchemaError::Engine {
            path: "#".to_string(),
            reason: err.to_string(),
        })
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}
