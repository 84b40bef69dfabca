use schemars::JsonSchema;
use schemodel_core::SchemaError;
use serde_json::{Map, Value};

/// Keys whose presence marks a full schema document rather than a mapping
/// of field names to rules.
const DOCUMENT_MARKERS: &[&str] = &["$schema", "$id", "$ref", "definitions", "$defs"];

/// Keywords allowed next to `properties` in a document without `type`.
const OBJECT_KEYWORDS: &[&str] = &[
    "properties",
    "required",
    "additionalProperties",
    "patternProperties",
    "dependencies",
    "title",
    "description",
    "allOf",
    "anyOf",
    "oneOf",
    "if",
    "then",
    "else",
    "minProperties",
    "maxProperties",
];

/// A normalised JSON Schema document ready to be compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    document: Value,
}

impl Schema {
    /// Wrap a full schema document.
    pub fn new(document: Value) -> Result<Self, SchemaError> {
        let mut document = document;
        if !document.is_object() {
            return Err(SchemaError::NotASchema {
                path: "#".to_string(),
                reason: format!("expected a schema object, found {}", json_type(&document)),
            });
        }
        hoist_required(&mut document);
        Ok(Self { document })
    }

    /// Build an object schema from a mapping of field name to rule.
    pub fn from_fields(fields: Map<String, Value>) -> Result<Self, SchemaError> {
        let mut document = Map::new();
        document.insert("type".to_string(), Value::String("object".to_string()));
        document.insert("properties".to_string(), Value::Object(fields));
        Self::new(Value::Object(document))
    }

    /// Accept either a full schema document or a field mapping.
    pub fn parse(value: Value) -> Result<Self, SchemaError> {
        match value {
            Value::Object(map) if looks_like_document(&map) => Self::new(Value::Object(map)),
            Value::Object(map) => Self::from_fields(map),
            other => Err(SchemaError::NotASchema {
                path: "#".to_string(),
                reason: format!("expected a schema object, found {}", json_type(&other)),
            }),
        }
    }

    /// Derive the schema of a Rust type.
    pub fn for_type<T: JsonSchema>() -> Result<Self, SchemaError> {
        let root = schemars::schema_for!(T);
        let document = serde_json::to_value(&root).map_err(|err| SchemaError::NotASchema {
            path: "#".to_string(),
            reason: format!("cannot encode derived schema: {err}"),
        })?;
        Self::new(document)
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn into_document(self) -> Value {
        self.document
    }
}

impl TryFrom<Value> for Schema {
    type Error = SchemaError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

fn looks_like_document(map: &Map<String, Value>) -> bool {
    if matches!(map.get("type"), Some(Value::String(_)) | Some(Value::Array(_))) {
        return true;
    }
    if DOCUMENT_MARKERS
        .iter()
        .any(|key| map.get(*key).is_some_and(|value| is_marker_value(key, value)))
    {
        return true;
    }
    map.get("properties").is_some_and(Value::is_object)
        && map.keys().all(|key| OBJECT_KEYWORDS.contains(&key.as_str()))
}

/// A marker key only counts when its value has the document shape; a field
/// rule under the same name is an object of keywords instead.
fn is_marker_value(key: &str, value: &Value) -> bool {
    match key {
        "definitions" | "$defs" => value.as_object().is_some_and(|definitions| {
            definitions
                .values()
                .all(|definition| definition.is_object() || definition.is_boolean())
        }),
        _ => value.is_string(),
    }
}

/// Move field-level `"required": true` flags into the parent's `required`
/// list, at every level of the document.
fn hoist_required(node: &mut Value) {
    let Value::Object(map) = node else {
        return;
    };

    let mut hoisted = Vec::new();
    if let Some(Value::Object(properties)) = map.get_mut("properties") {
        for (name, rule) in properties.iter_mut() {
            let Value::Object(rule) = rule else {
                continue;
            };
            if let Some(Value::Bool(flag)) = rule.get("required") {
                if *flag {
                    hoisted.push(name.clone());
                }
                rule.remove("required");
            }
        }
    }
    if !hoisted.is_empty() {
        let required = map
            .entry("required")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = required {
            for name in hoisted {
                let name = Value::String(name);
                if !list.contains(&name) {
                    list.push(name);
                }
            }
        }
    }

    for (key, value) in map.iter_mut() {
        match key.as_str() {
            "properties" | "patternProperties" | "definitions" | "$defs" => {
                if let Value::Object(entries) = value {
                    entries.values_mut().for_each(hoist_required);
                }
            }
            "items" | "allOf" | "anyOf" | "oneOf" | "prefixItems" => match value {
                Value::Array(list) => list.iter_mut().for_each(hoist_required),
                other => hoist_required(other),
            },
            "additionalProperties" | "additionalItems" | "not" | "if" | "then" | "else"
            | "contains" => hoist_required(value),
            _ => {}
        }
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
