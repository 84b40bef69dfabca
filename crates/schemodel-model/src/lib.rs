//! Schema-bound models for JSON-like data.
//!
//! A [`ModelType`] is compiled once from a JSON Schema object. Its
//! [`Model`] instances only ever hold data that satisfies the schema: every
//! write is staged on a copy, checked as a whole by the validation engine and
//! committed only when the engine accepts it. Array-typed fields are held in
//! a [`Sequence`], whose mutators follow the same stage/check/commit rule for
//! the entire array.
//!
//! ```
//! use schemodel_core::ValidationOptions;
//! use schemodel_model::{ModelType, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::parse(json!({
//!     "a": {"type": "number", "minimum": 0, "maximum": 3},
//!     "b": {"enum": ["a", "b", "c"]}
//! }))?;
//! let ty = ModelType::compile(&schema, ValidationOptions::default())?;
//!
//! let mut model = ty.create(&json!({"a": 1, "b": "a"}))?;
//! assert!(model.set("b", json!(8)).is_err());
//! assert_eq!(model.to_string(), r#"{"a":1,"b":"a"}"#);
//! # Ok::<(), schemodel_core::Error>(())
//! ```

mod field;
mod model;
mod pointer;
mod resolver;
mod schema;
mod sequence;

pub use field::{FieldInput, FieldValue};
pub use model::{FieldDescriptor, FieldKind, Model, ModelType};
pub use resolver::NodeKind;
pub use schema::Schema;
pub use sequence::{Element, ElementInput, Sequence, SequenceType};

pub use schemodel_core::{Error, Result, SchemaError, ValidationError, ValidationOptions, Violation};
