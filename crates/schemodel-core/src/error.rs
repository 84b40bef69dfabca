use std::fmt;

use thiserror::Error;

/// Raised while a schema is compiled into a model type.
///
/// Every variant is fatal to that compilation; the schema has to be fixed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A rule is not something the resolver recognises as a schema node.
    #[error("not a schema at {path}: {reason}")]
    NotASchema { path: String, reason: String },
    /// A `type` names something outside the JSON Schema primitive set.
    #[error("unknown type '{type_name}' at {path}")]
    UnknownType { path: String, type_name: String },
    /// Model types compile from object schemas, sequence types from array
    /// schemas.
    #[error("root schema must describe an {expected}, found {found}")]
    UnexpectedRoot {
        expected: &'static str,
        found: String,
    },
    #[error("mixing object models with other types is not supported (array at {path})")]
    MixedArrayModels { path: String },
    #[error("only one object model per array is supported (array at {path})")]
    MultipleArrayModels { path: String },
    /// A `$ref` that does not point inside the root document.
    #[error("unresolved reference '{reference}' at {path}")]
    UnresolvedRef { path: String, reference: String },
    /// A node refers back to itself while it is being compiled.
    #[error("cyclic schema: {path} is reached again while it is being compiled")]
    Cyclic { path: String },
    /// The validation engine rejected the node.
    #[error("engine rejected schema at {path}: {reason}")]
    Engine { path: String, reason: String },
}

/// One broken rule inside a rejected value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON pointer to the offending value, `/` for the value itself.
    pub path: String,
    /// Schema keyword that failed (`type`, `maxItems`, `required`, ...).
    pub keyword: String,
    pub message: String,
}

impl Violation {
    pub fn new(
        path: impl Into<String>,
        keyword: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            keyword: keyword.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A candidate value did not satisfy its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn single(
        path: impl Into<String>,
        keyword: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(vec![Violation::new(path, keyword, message)])
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// True when some violation was raised by `keyword`.
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.violations.iter().any(|v| v.keyword == keyword)
    }

    /// True when some violation points at `path`.
    pub fn has_path(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }

    /// Re-anchor every violation under `prefix`.
    ///
    /// Used when a nested instance fails on its own and the error has to
    /// read as if the outer value had been checked.
    pub fn nested_under(mut self, prefix: &str) -> Self {
        for violation in &mut self.violations {
            violation.path = if violation.path == "/" {
                prefix.to_string()
            } else {
                format!("{prefix}{}", violation.path)
            };
        }
        self
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.violations.is_empty() {
            return write!(f, "validation failed");
        }
        for (idx, violation) in self.violations.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Error type shared by the model layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    /// The name is not declared by the schema.
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("field '{0}' does not hold a model instance")]
    NotAModel(String),
    #[error("field '{0}' does not hold a sequence")]
    NotASequence(String),
    /// Bulk data has to be a JSON object.
    #[error("expected an object, found {0}")]
    NotAnObject(String),
    /// A sequence cannot grow to hold the index.
    #[error("index {index} is out of range for a sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("invalid pointer '{pointer}': {reason}")]
    InvalidPointer { pointer: String, reason: String },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The validation failure behind this error, if that is what it is.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Error::Validation(err) => Some(err),
            _ => None,
        }
    }
}

/// Convenience alias for results returned by the schemodel crates.
pub type Result<T> = std::result::Result<T, Error>;
