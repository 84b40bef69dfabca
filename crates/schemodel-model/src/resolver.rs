//! Turns a schema document into a graph of compiled model and sequence types.
//!
//! Nodes are identified by their canonical JSON pointer inside the root
//! document, after following `$ref`s. Each object node compiles to exactly one
//! [`ModelType`] and each array node to one [`SequenceType`]; the lookup table
//! lives for a single root compilation.

use std::collections::{HashMap, HashSet};

use schemodel_core::{CompiledSchema, SchemaError, ValidationEngine, ValidationOptions};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::model::{FieldDescriptor, FieldKind, ModelType};
use crate::pointer::escape;
use crate::schema::json_type;
use crate::sequence::SequenceType;

const MAX_REF_HOPS: usize = 32;
const MAX_UNION_DEPTH: usize = 32;

/// Shape of a schema node as far as the model layer cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Scalar,
    Object,
    Array,
    Union,
}

pub(crate) struct Resolver<'a> {
    root: &'a Value,
    engine: &'a dyn ValidationEngine,
    options: ValidationOptions,
    models: HashMap<String, ModelType>,
    sequences: HashMap<String, SequenceType>,
    in_progress: HashSet<String>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(
        root: &'a Value,
        engine: &'a dyn ValidationEngine,
        options: ValidationOptions,
    ) -> Self {
        Self {
            root,
            engine,
            options,
            models: HashMap::new(),
            sequences: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    pub(crate) fn compile_model_root(mut self) -> Result<ModelType, SchemaError> {
        let (pointer, node) = self.resolve("#".to_string(), self.root)?;
        match self.classify(&pointer, node, 0)? {
            NodeKind::Object => self.compile_model(&pointer, node),
            other => Err(SchemaError::UnexpectedRoot {
                expected: "object",
                found: kind_name(other).to_string(),
            }),
        }
    }

    pub(crate) fn compile_sequence_root(mut self) -> Result<SequenceType, SchemaError> {
        let (pointer, node) = self.resolve("#".to_string(), self.root)?;
        match self.classify(&pointer, node, 0)? {
            NodeKind::Array => self.compile_sequence(&pointer, node),
            other => Err(SchemaError::UnexpectedRoot {
                expected: "array",
                found: kind_name(other).to_string(),
            }),
        }
    }

    /// Follow `$ref`s until a concrete node is reached.
    fn resolve(&self, pointer: String, node: &'a Value) -> Result<(String, &'a Value), SchemaError> {
        let mut pointer = pointer;
        let mut node = node;
        for _ in 0..MAX_REF_HOPS {
            let Some(reference) = node.get("$ref") else {
                return Ok((pointer, node));
            };
            let Some(reference) = reference.as_str() else {
                return Err(SchemaError::NotASchema {
                    path: pointer,
                    reason: "$ref must be a string".to_string(),
                });
            };
            let target = reference
                .strip_prefix('#')
                .and_then(|fragment| self.root.pointer(fragment).map(|found| (fragment, found)));
            let Some((fragment, found)) = target else {
                return Err(SchemaError::UnresolvedRef {
                    path: pointer,
                    reference: reference.to_string(),
                });
            };
            pointer = format!("#{fragment}");
            node = found;
        }
        Err(SchemaError::Cyclic { path: pointer })
    }

    fn classify(&self, pointer: &str, node: &'a Value, depth: usize) -> Result<NodeKind, SchemaError> {
        if depth > MAX_UNION_DEPTH {
            return Err(SchemaError::Cyclic {
                path: pointer.to_string(),
            });
        }
        let map = match node {
            Value::Bool(_) => return Ok(NodeKind::Scalar),
            Value::Object(map) => map,
            other => {
                return Err(SchemaError::NotASchema {
                    path: pointer.to_string(),
                    reason: format!("expected a schema object, found {}", json_type(other)),
                });
            }
        };

        match map.get("type") {
            Some(Value::String(name)) => kind_for_type(pointer, name),
            Some(Value::Array(names)) => {
                let mut kinds = Vec::with_capacity(names.len());
                for name in names {
                    let Some(name) = name.as_str() else {
                        return Err(SchemaError::NotASchema {
                            path: pointer.to_string(),
                            reason: "type lists may only contain names".to_string(),
                        });
                    };
                    kinds.push(kind_for_type(pointer, name)?);
                }
                match kinds.as_slice() {
                    [single] => Ok(*single),
                    _ => Ok(NodeKind::Union),
                }
            }
            Some(other) => Err(SchemaError::NotASchema {
                path: pointer.to_string(),
                reason: format!("type must be a name or a list of names, found {}", json_type(other)),
            }),
            None => {
                for keyword in ["anyOf", "oneOf"] {
                    let Some(alternatives) = map.get(keyword) else {
                        continue;
                    };
                    let Some(alternatives) = alternatives.as_array() else {
                        return Err(SchemaError::NotASchema {
                            path: format!("{pointer}/{keyword}"),
                            reason: format!("{keyword} must be a list of schemas"),
                        });
                    };
                    for (idx, alternative) in alternatives.iter().enumerate() {
                        let (alt_pointer, alt_node) =
                            self.resolve(format!("{pointer}/{keyword}/{idx}"), alternative)?;
                        self.classify(&alt_pointer, alt_node, depth + 1)?;
                    }
                    return Ok(NodeKind::Union);
                }
                if map.contains_key("properties") {
                    Ok(NodeKind::Object)
                } else if map.contains_key("items") || map.contains_key("prefixItems") {
                    Ok(NodeKind::Array)
                } else {
                    Ok(NodeKind::Scalar)
                }
            }
        }
    }

    fn compile_model(&mut self, pointer: &str, node: &'a Value) -> Result<ModelType, SchemaError> {
        if let Some(existing) = self.models.get(pointer) {
            return Ok(existing.clone());
        }
        if !self.in_progress.insert(pointer.to_string()) {
            return Err(SchemaError::Cyclic {
                path: pointer.to_string(),
            });
        }
        let built = self.build_model(pointer, node);
        self.in_progress.remove(pointer);
        let model_type = built?;

        debug!(
            pointer,
            fields = model_type.fields().len(),
            "model type compiled"
        );
        self.models.insert(pointer.to_string(), model_type.clone());
        Ok(model_type)
    }

    fn build_model(&mut self, pointer: &str, node: &'a Value) -> Result<ModelType, SchemaError> {
        let mut fields = Vec::new();
        if let Some(properties) = node.get("properties") {
            let Some(properties) = properties.as_object() else {
                return Err(SchemaError::NotASchema {
                    path: format!("{pointer}/properties"),
                    reason: "properties must map field names to schemas".to_string(),
                });
            };
            for (name, rule) in properties {
                let field_pointer = format!("{pointer}/properties/{}", escape(name));
                let (canonical, target) = self.resolve(field_pointer, rule)?;
                let kind = match self.classify(&canonical, target, 0)? {
                    NodeKind::Object => FieldKind::Object(self.compile_model(&canonical, target)?),
                    NodeKind::Array => FieldKind::Array(self.compile_sequence(&canonical, target)?),
                    NodeKind::Union => FieldKind::Union,
                    NodeKind::Scalar => FieldKind::Scalar,
                };
                let slot = fields.len();
                fields.push(FieldDescriptor::new(name.clone(), slot, canonical, kind));
            }
        }

        let validator = self.compile_node(pointer, node)?;
        let title = node.get("title").and_then(Value::as_str).map(str::to_string);
        Ok(ModelType::new(
            pointer.to_string(),
            title,
            fields,
            validator,
            self.options,
        ))
    }

    fn compile_sequence(
        &mut self,
        pointer: &str,
        node: &'a Value,
    ) -> Result<SequenceType, SchemaError> {
        if let Some(existing) = self.sequences.get(pointer) {
            return Ok(existing.clone());
        }

        let mut objects: Vec<(String, &'a Value)> = Vec::new();
        let mut others = 0_usize;
        for (alt_pointer, alt_node) in self.element_alternatives(pointer, node)? {
            match self.classify(&alt_pointer, alt_node, 0)? {
                NodeKind::Object => {
                    if !objects.iter().any(|(seen, _)| *seen == alt_pointer) {
                        objects.push((alt_pointer, alt_node));
                    }
                }
                _ if is_null_only(alt_node) => {}
                _ => others += 1,
            }
        }
        if !objects.is_empty() && others > 0 {
            return Err(SchemaError::MixedArrayModels {
                path: pointer.to_string(),
            });
        }
        if objects.len() > 1 {
            return Err(SchemaError::MultipleArrayModels {
                path: pointer.to_string(),
            });
        }

        let element = match objects.into_iter().next() {
            Some((element_pointer, element_node)) => {
                Some(self.compile_model(&element_pointer, element_node)?)
            }
            None => None,
        };
        let validator = self.compile_node(pointer, node)?;
        let sequence_type = SequenceType::new(pointer.to_string(), element, validator, self.options);

        debug!(
            pointer,
            element_model = sequence_type.element_type().is_some(),
            "sequence type compiled"
        );
        self.sequences
            .insert(pointer.to_string(), sequence_type.clone());
        Ok(sequence_type)
    }

    /// Element shapes an array admits, with `anyOf`/`oneOf` expanded.
    fn element_alternatives(
        &self,
        pointer: &str,
        node: &'a Value,
    ) -> Result<Vec<(String, &'a Value)>, SchemaError> {
        let mut out = Vec::new();
        if let Some(prefix) = node.get("prefixItems").and_then(Value::as_array) {
            for (idx, item) in prefix.iter().enumerate() {
                self.push_alternatives(format!("{pointer}/prefixItems/{idx}"), item, &mut out)?;
            }
        }
        match node.get("items") {
            Some(Value::Array(tuple)) => {
                for (idx, item) in tuple.iter().enumerate() {
                    self.push_alternatives(format!("{pointer}/items/{idx}"), item, &mut out)?;
                }
            }
            Some(items) => self.push_alternatives(format!("{pointer}/items"), items, &mut out)?,
            None => {}
        }
        Ok(out)
    }

    fn push_alternatives(
        &self,
        pointer: String,
        node: &'a Value,
        out: &mut Vec<(String, &'a Value)>,
    ) -> Result<(), SchemaError> {
        let (canonical, target) = self.resolve(pointer, node)?;
        if target.get("type").is_none() {
            for keyword in ["anyOf", "oneOf"] {
                if let Some(alternatives) = target.get(keyword).and_then(Value::as_array) {
                    for (idx, alternative) in alternatives.iter().enumerate() {
                        self.push_alternatives(
                            format!("{canonical}/{keyword}/{idx}"),
                            alternative,
                            out,
                        )?;
                    }
                    return Ok(());
                }
            }
        }
        out.push((canonical, target));
        Ok(())
    }

    /// Hand a node to the engine. Sub-nodes carry the root definitions so
    /// their `$ref`s still resolve.
    fn compile_node(
        &self,
        pointer: &str,
        node: &Value,
    ) -> Result<Arc<dyn CompiledSchema>, SchemaError> {
        let mut standalone = node.clone();
        if pointer != "#" {
            if let Value::Object(map) = &mut standalone {
                attach_definitions(map, self.root);
            }
        }
        self.engine
            .compile(&standalone)
            .map_err(|err| match err {
                SchemaError::Engine { reason, .. } => SchemaError::Engine {
                    path: pointer.to_string(),
                    reason,
                },
                other => other,
            })
    }
}

fn attach_definitions(map: &mut Map<String, Value>, root: &Value) {
    for key in ["definitions", "$defs"] {
        if let Some(definitions) = root.get(key) {
            if !map.contains_key(key) {
                map.insert(key.to_string(), definitions.clone());
            }
        }
    }
}

fn kind_for_type(pointer: &str, name: &str) -> Result<NodeKind, SchemaError> {
    match name {
        "object" => Ok(NodeKind::Object),
        "array" => Ok(NodeKind::Array),
        "string" | "number" | "integer" | "boolean" | "null" => Ok(NodeKind::Scalar),
        other => Err(SchemaError::UnknownType {
            path: pointer.to_string(),
            type_name: other.to_string(),
        }),
    }
}

fn kind_name(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Scalar => "scalar",
        NodeKind::Object => "object",
        NodeKind::Array => "array",
        NodeKind::Union => "union",
    }
}

fn is_null_only(node: &Value) -> bool {
    match node.get("type") {
        Some(Value::String(name)) => name == "null",
        Some(Value::Array(names)) => names.iter().all(|name| name == "null") && !names.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use schemodel_validate::JsonSchemaEngine;
    use serde_json::json;

    use super::*;

    fn classify(node: Value) -> Result<NodeKind, SchemaError> {
        let engine = JsonSchemaEngine::new();
        let resolver = Resolver::new(&node, &engine, ValidationOptions::default());
        resolver.classify("#", &node, 0)
    }

    #[test]
    fn nodes_are_classified_by_type() {
        assert_eq!(classify(json!({"type": "string"})), Ok(NodeKind::Scalar));
        assert_eq!(classify(json!({"enum": [1, 2]})), Ok(NodeKind::Scalar));
        assert_eq!(classify(json!({"type": "object"})), Ok(NodeKind::Object));
        assert_eq!(classify(json!({"properties": {}})), Ok(NodeKind::Object));
        assert_eq!(classify(json!({"items": {}})), Ok(NodeKind::Array));
        assert_eq!(classify(json!({"type": ["integer"]})), Ok(NodeKind::Scalar));
        assert_eq!(classify(json!({"type": ["string", "number"]})), Ok(NodeKind::Union));
        assert_eq!(
            classify(json!({"anyOf": [{"type": "string"}, {"type": "number"}]})),
            Ok(NodeKind::Union)
        );
        assert_eq!(classify(json!(true)), Ok(NodeKind::Scalar));
    }

    #[test]
    fn unrecognised_nodes_are_rejected() {
        assert!(matches!(
            classify(json!("bad object")),
            Err(SchemaError::NotASchema { .. })
        ));
        assert!(matches!(
            classify(json!({"type": "strnig"})),
            Err(SchemaError::UnknownType { .. })
        ));
        assert!(matches!(
            classify(json!({"anyOf": [{"type": "string"}, 42]})),
            Err(SchemaError::NotASchema { .. })
        ));
    }

    #[test]
    fn references_resolve_to_canonical_pointers() {
        let root = json!({
            "properties": {"child": {"$ref": "#/definitions/Child"}},
            "definitions": {"Child": {"type": "object"}}
        });
        let engine = JsonSchemaEngine::new();
        let resolver = Resolver::new(&root, &engine, ValidationOptions::default());
        let (pointer, node) = resolver
            .resolve("#/properties/child".to_string(), &root["properties"]["child"])
            .expect("reference resolves");
        assert_eq!(pointer, "#/definitions/Child");
        assert_eq!(node, &json!({"type": "object"}));

        let missing = json!({"$ref": "other.json#/x"});
        let err = resolver
            .resolve("#/x".to_string(), &missing)
            .expect_err("remote references are not fetched");
        assert!(matches!(err, SchemaError::UnresolvedRef { .. }));
    }

    #[test]
    fn null_alternatives_are_recognised() {
        assert!(is_null_only(&json!({"type": "null"})));
        assert!(is_null_only(&json!({"type": ["null"]})));
        assert!(!is_null_only(&json!({"type": ["null", "string"]})));
        assert!(!is_null_only(&json!({})));
    }
}
