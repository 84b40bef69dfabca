use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::model::Model;
use crate::sequence::Sequence;

/// Current value of a model field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Scalar, union, or any value stored as plain JSON.
    Value(Value),
    /// Instance of the field's nested model type.
    Model(Model),
    /// Validated sequence bound to the field's array schema.
    Sequence(Sequence),
}

impl FieldValue {
    /// Plain JSON snapshot of the value.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Value(value) => value.clone(),
            FieldValue::Model(model) => model.to_json(),
            FieldValue::Sequence(sequence) => sequence.to_json(),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            FieldValue::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&Model> {
        match self {
            FieldValue::Model(model) => Some(model),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            FieldValue::Sequence(sequence) => Some(sequence),
            _ => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Value(value) => value.serialize(serializer),
            FieldValue::Model(model) => model.serialize(serializer),
            FieldValue::Sequence(sequence) => sequence.serialize(serializer),
        }
    }
}

/// Candidate handed to a setter.
///
/// Plain JSON is coerced into a nested model or sequence when the target
/// field is object- or array-typed; instances of the right type are taken
/// as they are.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldInput {
    Value(Value),
    Model(Model),
    Sequence(Sequence),
}

impl FieldInput {
    pub(crate) fn into_json(self) -> Value {
        match self {
            FieldInput::Value(value) => value,
            FieldInput::Model(model) => model.to_json(),
            FieldInput::Sequence(sequence) => sequence.to_json(),
        }
    }
}

impl From<Value> for FieldInput {
    fn from(value: Value) -> Self {
        FieldInput::Value(value)
    }
}

impl From<Model> for FieldInput {
    fn from(model: Model) -> Self {
        FieldInput::Model(model)
    }
}

impl From<Sequence> for FieldInput {
    fn from(sequence: Sequence) -> Self {
        FieldInput::Sequence(sequence)
    }
}

impl From<FieldValue> for FieldInput {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Value(value) => FieldInput::Value(value),
            FieldValue::Model(model) => FieldInput::Model(model),
            FieldValue::Sequence(sequence) => FieldInput::Sequence(sequence),
        }
    }
}

impl From<&str> for FieldInput {
    fn from(text: &str) -> Self {
        FieldInput::Value(Value::String(text.to_string()))
    }
}

impl From<String> for FieldInput {
    fn from(text: String) -> Self {
        FieldInput::Value(Value::String(text))
    }
}

impl From<i64> for FieldInput {
    fn from(number: i64) -> Self {
        FieldInput::Value(Value::from(number))
    }
}

impl From<f64> for FieldInput {
    fn from(number: f64) -> Self {
        FieldInput::Value(Value::from(number))
    }
}

impl From<bool> for FieldInput {
    fn from(flag: bool) -> Self {
        FieldInput::Value(Value::Bool(flag))
    }
}
