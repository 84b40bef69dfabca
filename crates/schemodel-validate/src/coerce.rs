use serde_json::{Number, Value};

const MAX_DEPTH: usize = 64;

/// Walks a value alongside its schema and converts string inputs into the
/// primitive type the schema declares for them.
pub(crate) struct Coercer<'a> {
    root: &'a Value,
}

impl<'a> Coercer<'a> {
    pub(crate) fn new(root: &'a Value) -> Self {
        Self { root }
    }

    pub(crate) fn coerce(&self, value: &Value) -> Value {
        self.walk(value, self.root, 0)
    }

    fn walk(&self, value: &Value, schema: &'a Value, depth: usize) -> Value {
        if depth > MAX_DEPTH {
            return value.clone();
        }
        let Some(schema) = self.resolve(schema) else {
            return value.clone();
        };

        let mut out = coerce_primitive(value, schema);

        if let Some(all) = schema.get("allOf").and_then(Value::as_array) {
            for sub in all {
                out = self.walk(&out, sub, depth + 1);
            }
        }
        for keyword in ["anyOf", "oneOf"] {
            if let Some(alternatives) = schema.get(keyword).and_then(Value::as_array) {
                out = self.pick_alternative(&out, alternatives, depth + 1);
            }
        }

        match &mut out {
            Value::Object(map) => {
                for (key, field) in map.iter_mut() {
                    if let Some(sub) = property_schema(schema, key) {
                        *field = self.walk(field, sub, depth + 1);
                    }
                }
            }
            Value::Array(items) => {
                for (idx, item) in items.iter_mut().enumerate() {
                    if let Some(sub) = item_schema(schema, idx) {
                        *item = self.walk(item, sub, depth + 1);
                    }
                }
            }
            _ => {}
        }

        out
    }

    /// Prefer an alternative that already accepts the value's type; otherwise
    /// take the first one that accepts it after coercion.
    fn pick_alternative(&self, value: &Value, alternatives: &'a [Value], depth: usize) -> Value {
        for alternative in alternatives {
            if let Some(resolved) = self.resolve(alternative) {
                if accepts_type(resolved, value) {
                    return self.walk(value, resolved, depth);
                }
            }
        }
        for alternative in alternatives {
            if let Some(resolved) = self.resolve(alternative) {
                let candidate = self.walk(value, resolved, depth);
                if accepts_type(resolved, &candidate) {
                    return candidate;
                }
            }
        }
        value.clone()
    }

    /// Follow local `$ref`s. Boolean schemas carry nothing to coerce against.
    fn resolve(&self, mut schema: &'a Value) -> Option<&'a Value> {
        for _ in 0..MAX_DEPTH {
            match schema.get("$ref").and_then(Value::as_str) {
                Some(reference) => {
                    let pointer = reference.strip_prefix('#')?;
                    schema = self.root.pointer(pointer)?;
                }
                None => return schema.is_object().then_some(schema),
            }
        }
        None
    }
}

fn declared_types(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(name)) => vec![name.as_str()],
        Some(Value::Array(names)) => names.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn accepts_type(schema: &Value, value: &Value) -> bool {
    let types = declared_types(schema);
    if types.is_empty() {
        return true;
    }
    types.iter().any(|name| matches_type(name, value))
}

fn matches_type(name: &str, value: &Value) -> bool {
    match (name, value) {
        ("string", Value::String(_)) => true,
        ("number", Value::Number(_)) => true,
        ("integer", Value::Number(number)) => is_integral(number),
        ("boolean", Value::Bool(_)) => true,
        ("null", Value::Null) => true,
        ("object", Value::Object(_)) => true,
        ("array", Value::Array(_)) => true,
        _ => false,
    }
}

fn is_integral(number: &Number) -> bool {
    number.is_i64() || number.is_u64() || number.as_f64().is_some_and(|f| f.fract() == 0.0)
}

fn coerce_primitive(value: &Value, schema: &Value) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };
    let types = declared_types(schema);
    if types.is_empty() || types.contains(&"string") {
        return value.clone();
    }
    let trimmed = text.trim();
    for name in types {
        let converted = match name {
            "integer" => parse_integer(trimmed),
            "number" => parse_integer(trimmed).or_else(|| parse_float(trimmed)),
            "boolean" => match trimmed {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        };
        if let Some(converted) = converted {
            return converted;
        }
    }
    value.clone()
}

fn parse_integer(text: &str) -> Option<Value> {
    if let Ok(int) = text.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    text.parse::<u64>().ok().map(|int| Value::Number(int.into()))
}

fn parse_float(text: &str) -> Option<Value> {
    let float = text.parse::<f64>().ok()?;
    Number::from_f64(float).map(Value::Number)
}

fn property_schema<'s>(schema: &'s Value, key: &str) -> Option<&'s Value> {
    if let Some(sub) = schema.get("properties").and_then(|props| props.get(key)) {
        return Some(sub);
    }
    schema
        .get("additionalProperties")
        .filter(|sub| sub.is_object())
}

fn item_schema(schema: &Value, idx: usize) -> Option<&Value> {
    if let Some(prefix) = schema.get("prefixItems").and_then(Value::as_array) {
        if let Some(sub) = prefix.get(idx) {
            return Some(sub);
        }
    }
    match schema.get("items") {
        Some(Value::Array(tuple)) => tuple
            .get(idx)
            .or_else(|| schema.get("additionalItems").filter(|sub| sub.is_object())),
        Some(sub @ Value::Object(_)) => Some(sub),
        _ => None,
    }
}
