use serde_json::{Map, Value};

const SCHEMA_KEYWORDS: &[&str] = &[
    "additionalProperties",
    "additionalItems",
    "contains",
    "not",
    "if",
    "then",
    "else",
    "propertyNames",
];
const SCHEMA_LIST_KEYWORDS: &[&str] = &["allOf", "anyOf", "oneOf", "prefixItems"];
const SCHEMA_MAP_KEYWORDS: &[&str] = &["properties", "patternProperties", "definitions", "$defs"];

/// Copy of `schema` with every `required` list removed, so that missing
/// fields pass while present ones are still checked.
pub(crate) fn strip_required(schema: &Value) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };

    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        let key = key.as_str();
        let stripped = if key == "required" && value.is_array() {
            continue;
        } else if SCHEMA_KEYWORDS.contains(&key) {
            strip_required(value)
        } else if SCHEMA_LIST_KEYWORDS.contains(&key) || key == "items" {
            match value {
                Value::Array(list) => Value::Array(list.iter().map(strip_required).collect()),
                other => strip_required(other),
            }
        } else if SCHEMA_MAP_KEYWORDS.contains(&key) {
            strip_map(value)
        } else if key == "dependencies" {
            // Array-valued entries are property lists and are dropped like
            // `required`; schema-valued ones are walked.
            match value {
                Value::Object(deps) => Value::Object(
                    deps.iter()
                        .filter(|(_, dep)| !dep.is_array())
                        .map(|(name, dep)| (name.clone(), strip_required(dep)))
                        .collect(),
                ),
                other => other.clone(),
            }
        } else {
            value.clone()
        };
        out.insert(key.to_string(), stripped);
    }
    Value::Object(out)
}

fn strip_map(value: &Value) -> Value {
    match value {
        Value::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(name, sub)| (name.clone(), strip_required(sub)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn required_lists_are_removed_at_every_level() {
        let schema = json!({
            "type": "object",
            "required": ["name", "required"],
            "properties": {
                "name": {"type": "string"},
                "required": {"type": "boolean"},
                "child": {
                    "type": "object",
                    "required": ["age"],
                    "properties": {"age": {"type": "number"}}
                },
                "list": {
                    "type": "array",
                    "items": {"type": "object", "required": ["x"]}
                }
            }
        });
        let stripped = strip_required(&schema);
        assert_eq!(stripped.get("required"), None);
        assert!(stripped.pointer("/properties/required").is_some());
        assert_eq!(stripped.pointer("/properties/child/required"), None);
        assert_eq!(stripped.pointer("/properties/list/items/required"), None);
        assert_eq!(
            stripped.pointer("/properties/child/properties/age"),
            Some(&json!({"type": "number"}))
        );
    }
}
