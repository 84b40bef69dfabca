use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use schemodel_core::{
    CompiledSchema, Error, Result, SchemaError, ValidationEngine, ValidationError,
    ValidationOptions,
};
use schemodel_validate::JsonSchemaEngine;

use crate::field::{FieldInput, FieldValue};
use crate::pointer::{self, Edit};
use crate::resolver::Resolver;
use crate::schema::{Schema, json_type};
use crate::sequence::{Sequence, SequenceType};

/// How a field's values are held.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar,
    /// Several alternative shapes; values are kept as plain JSON.
    Union,
    Object(ModelType),
    Array(SequenceType),
}

/// One declared field of a model type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    slot: usize,
    pointer: String,
    kind: FieldKind,
}

impl FieldDescriptor {
    pub(crate) fn new(name: String, slot: usize, pointer: String, kind: FieldKind) -> Self {
        Self {
            name,
            slot,
            pointer,
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of the field in declaration order.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Canonical pointer of the field's schema node.
    pub fn schema_pointer(&self) -> &str {
        &self.pointer
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }
}

/// A compiled object schema from which [`Model`] instances are created.
///
/// Cheap to clone; clones share the same compiled blueprint, which never
/// changes after compilation.
#[derive(Clone)]
pub struct ModelType {
    inner: Arc<ModelTypeInner>,
}

struct ModelTypeInner {
    pointer: String,
    title: Option<String>,
    fields: Vec<FieldDescriptor>,
    slots: HashMap<String, usize>,
    validator: Arc<dyn CompiledSchema>,
    options: ValidationOptions,
}

impl ModelType {
    pub(crate) fn new(
        pointer: String,
        title: Option<String>,
        fields: Vec<FieldDescriptor>,
        validator: Arc<dyn CompiledSchema>,
        options: ValidationOptions,
    ) -> Self {
        let slots = fields
            .iter()
            .map(|field| (field.name.clone(), field.slot))
            .collect();
        Self {
            inner: Arc::new(ModelTypeInner {
                pointer,
                title,
                fields,
                slots,
                validator,
                options,
            }),
        }
    }

    /// Compile `schema` with the default `jsonschema`-backed engine.
    pub fn compile(schema: &Schema, options: ValidationOptions) -> std::result::Result<Self, SchemaError> {
        Self::compile_with(schema, options, &JsonSchemaEngine::new())
    }

    pub fn compile_with(
        schema: &Schema,
        options: ValidationOptions,
        engine: &dyn ValidationEngine,
    ) -> std::result::Result<Self, SchemaError> {
        Resolver::new(schema.document(), engine, options).compile_model_root()
    }

    /// Parse and compile a schema given as JSON in one step.
    pub fn from_json(schema: Value, options: ValidationOptions) -> std::result::Result<Self, SchemaError> {
        Self::compile(&Schema::parse(schema)?, options)
    }

    /// Instance with no fields set. Not validated.
    pub fn empty(&self) -> Model {
        Model {
            ty: self.clone(),
            values: vec![None; self.inner.fields.len()],
        }
    }

    /// Instance seeded from `data`.
    ///
    /// An object is loaded through [`Model::set_data`] and must validate;
    /// anything else yields an empty instance.
    pub fn create(&self, data: &Value) -> Result<Model> {
        let mut model = self.empty();
        if let Value::Object(map) = data {
            model.load(map, false)?;
        }
        Ok(model)
    }

    pub(crate) fn create_from_map(&self, data: &Map<String, Value>) -> Result<Model> {
        let mut model = self.empty();
        model.load(data, false)?;
        Ok(model)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.inner
            .slots
            .get(name)
            .map(|slot| &self.inner.fields[*slot])
    }

    /// Declared fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.inner.fields
    }

    /// Canonical pointer of the compiled node (`#` for the root).
    pub fn pointer(&self) -> &str {
        &self.inner.pointer
    }

    pub fn title(&self) -> Option<&str> {
        self.inner.title.as_deref()
    }

    pub fn options(&self) -> ValidationOptions {
        self.inner.options
    }

    /// True when both handles refer to the same compiled type.
    pub fn same_type(&self, other: &ModelType) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn check(&self, candidate: &Value) -> std::result::Result<Value, ValidationError> {
        self.inner.validator.validate(candidate, &self.inner.options)
    }

    fn slot(&self, name: &str) -> Result<usize> {
        self.inner
            .slots
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }
}

impl PartialEq for ModelType {
    fn eq(&self, other: &Self) -> bool {
        self.same_type(other)
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelType")
            .field("pointer", &self.inner.pointer)
            .field(
                "fields",
                &self
                    .inner
                    .fields
                    .iter()
                    .map(FieldDescriptor::name)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// An instance of a [`ModelType`].
///
/// Holds one slot per declared field. Every write goes through a setter that
/// stages the change on a copy of the slots, validates the whole copy against
/// the model's schema and only then replaces the slots; a rejected write
/// leaves the instance exactly as it was.
#[derive(Clone, PartialEq)]
pub struct Model {
    ty: ModelType,
    values: Vec<Option<FieldValue>>,
}

impl Model {
    pub fn model_type(&self) -> &ModelType {
        &self.ty
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        let slot = *self.ty.inner.slots.get(name)?;
        self.values[slot].as_ref()
    }

    /// JSON snapshot of one field.
    pub fn value(&self, name: &str) -> Option<Value> {
        self.get(name).map(FieldValue::to_json)
    }

    pub fn model(&self, name: &str) -> Option<&Model> {
        self.get(name).and_then(FieldValue::as_model)
    }

    pub fn sequence(&self, name: &str) -> Option<&Sequence> {
        self.get(name).and_then(FieldValue::as_sequence)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Fields currently set, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> + '_ {
        self.ty
            .inner
            .fields
            .iter()
            .zip(&self.values)
            .filter_map(|(field, value)| value.as_ref().map(|value| (field.name(), value)))
    }

    pub fn len(&self) -> usize {
        self.values.iter().filter(|value| value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Assign a field.
    ///
    /// A JSON object assigned to an object field that already holds an
    /// instance is merged into a copy of that instance, so nested required
    /// fields need not be repeated. Use [`Model::replace`] to swap the
    /// nested instance out entirely.
    pub fn set(&mut self, name: &str, input: impl Into<FieldInput>) -> Result<()> {
        let slot = self.ty.slot(name)?;
        let staged = self.stage(slot, input.into(), true)?;
        let mut values = self.values.clone();
        values[slot] = Some(staged);
        self.commit(values)
    }

    /// Assign a field, building nested instances from scratch.
    pub fn replace(&mut self, name: &str, input: impl Into<FieldInput>) -> Result<()> {
        let slot = self.ty.slot(name)?;
        let staged = self.stage(slot, input.into(), false)?;
        let mut values = self.values.clone();
        values[slot] = Some(staged);
        self.commit(values)
    }

    /// Remove a field. Fails if the schema requires it.
    pub fn unset(&mut self, name: &str) -> Result<()> {
        let slot = self.ty.slot(name)?;
        let mut values = self.values.clone();
        values[slot] = None;
        self.commit(values)
    }

    /// Check `candidate`, or the current data when `None`, without changing
    /// anything.
    pub fn validate(&self, candidate: Option<&Value>) -> Result<&Self> {
        let checked = match candidate {
            Some(candidate) => self.ty.check(candidate),
            None => self.ty.check(&self.to_json()),
        };
        checked?;
        Ok(self)
    }

    /// Replace the whole field set with `data`. Declared fields missing from
    /// `data` are removed; undeclared keys are ignored.
    pub fn set_data(&mut self, data: &Value) -> Result<&mut Self> {
        self.load(expect_object(data)?, false)?;
        Ok(self)
    }

    /// Merge `data` into the current fields, touching only keys present in
    /// `data`.
    pub fn update_data(&mut self, data: &Value) -> Result<&mut Self> {
        self.load(expect_object(data)?, true)?;
        Ok(self)
    }

    /// Mutate a nested instance in place.
    ///
    /// `f` runs on a copy of the nested instance; the copy is then staged
    /// into this model and validated against this model's schema. If `f` or
    /// that validation fails, neither level changes.
    pub fn with_model<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Model) -> Result<R>,
    ) -> Result<R> {
        let slot = self.ty.slot(name)?;
        let Some(FieldValue::Model(nested)) = &self.values[slot] else {
            return Err(Error::NotAModel(name.to_string()));
        };
        let mut nested = nested.clone();
        let out = f(&mut nested).map_err(|err| nest(err, &pointer::child(name)))?;

        let mut values = self.values.clone();
        values[slot] = Some(FieldValue::Model(nested));
        self.commit(values)?;
        Ok(out)
    }

    /// Mutate a sequence field in place; see [`Model::with_model`].
    pub fn with_sequence<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Sequence) -> Result<R>,
    ) -> Result<R> {
        let slot = self.ty.slot(name)?;
        let Some(FieldValue::Sequence(nested)) = &self.values[slot] else {
            return Err(Error::NotASequence(name.to_string()));
        };
        let mut nested = nested.clone();
        let out = f(&mut nested).map_err(|err| nest(err, &pointer::child(name)))?;

        let mut values = self.values.clone();
        values[slot] = Some(FieldValue::Sequence(nested));
        self.commit(values)?;
        Ok(out)
    }

    /// Assign the value addressed by a JSON pointer, for example
    /// `/children/1/age`. Every level between the root and the target is
    /// re-validated before anything is committed.
    pub fn set_pointer(&mut self, pointer: &str, value: Value) -> Result<()> {
        let tokens = pointer::parse(pointer)?;
        self.apply_edit(pointer, &tokens, Edit::Set(value))
    }

    /// Remove the field addressed by a JSON pointer.
    pub fn unset_pointer(&mut self, pointer: &str) -> Result<()> {
        let tokens = pointer::parse(pointer)?;
        self.apply_edit(pointer, &tokens, Edit::Unset)
    }

    /// JSON snapshot of the value addressed by a pointer.
    pub fn get_pointer(&self, pointer: &str) -> Option<Value> {
        self.to_json().pointer(pointer).cloned()
    }

    pub(crate) fn apply_edit(&mut self, pointer: &str, tokens: &[String], edit: Edit) -> Result<()> {
        match tokens {
            [] => Err(pointer::invalid(pointer, "the pointer must name a field")),
            [name] => match edit {
                Edit::Set(value) => self.set(name, value),
                Edit::Unset => self.unset(name),
            },
            [name, rest @ ..] => match self.get(name) {
                Some(FieldValue::Model(_)) => {
                    self.with_model(name, |nested| nested.apply_edit(pointer, rest, edit))
                }
                Some(FieldValue::Sequence(_)) => {
                    self.with_sequence(name, |nested| nested.apply_edit(pointer, rest, edit))
                }
                _ if self.ty.field(name).is_none() => Err(Error::UnknownField(name.clone())),
                _ => Err(pointer::invalid(
                    pointer,
                    &format!("field '{name}' holds no nested value"),
                )),
            },
        }
    }

    /// Plain JSON snapshot of the current fields.
    pub fn to_json(&self) -> Value {
        Value::Object(snapshot(&self.ty, &self.values))
    }

    /// Deserialize the current fields into a Rust type.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }

    fn load(&mut self, data: &Map<String, Value>, update: bool) -> Result<()> {
        let mut values = if update {
            self.values.clone()
        } else {
            vec![None; self.values.len()]
        };
        for field in self.ty.fields() {
            match data.get(field.name()) {
                Some(value) => {
                    values[field.slot] =
                        Some(self.stage(field.slot, FieldInput::Value(value.clone()), update)?);
                }
                None if update => {}
                None => values[field.slot] = None,
            }
        }
        self.commit(values)
    }

    /// Turn `input` into the value a slot would hold, building nested
    /// instances where the field's kind calls for one. Inputs that cannot
    /// become a nested instance are kept as plain JSON and left for the
    /// schema check to judge.
    fn stage(&self, slot: usize, input: FieldInput, merge: bool) -> Result<FieldValue> {
        let field = &self.ty.inner.fields[slot];
        let prefix = pointer::child(field.name());
        let staged = match (&field.kind, input) {
            (FieldKind::Object(ty), FieldInput::Value(Value::Object(data))) => {
                let nested = match &self.values[slot] {
                    Some(FieldValue::Model(existing)) if merge => {
                        let mut nested = existing.clone();
                        nested.load(&data, true).map(|()| nested)
                    }
                    _ => ty.create_from_map(&data),
                };
                FieldValue::Model(nested.map_err(|err| nest(err, &prefix))?)
            }
            (FieldKind::Object(ty), FieldInput::Model(model)) => {
                if model.ty.same_type(ty) {
                    FieldValue::Model(model)
                } else {
                    FieldValue::Model(ty.create(&model.to_json()).map_err(|err| nest(err, &prefix))?)
                }
            }
            (FieldKind::Array(ty), FieldInput::Value(Value::Array(items))) => {
                FieldValue::Sequence(ty.create(items).map_err(|err| nest(err, &prefix))?)
            }
            (FieldKind::Array(ty), FieldInput::Sequence(sequence)) => {
                if sequence.sequence_type().same_type(ty) {
                    FieldValue::Sequence(sequence)
                } else {
                    let items = sequence.iter().map(|item| match item {
                        Some(element) => element.to_json(),
                        None => Value::Null,
                    });
                    FieldValue::Sequence(ty.create(items).map_err(|err| nest(err, &prefix))?)
                }
            }
            (_, input) => FieldValue::Value(input.into_json()),
        };
        Ok(staged)
    }

    /// Validate the staged slots as a whole and adopt them on success.
    fn commit(&mut self, staged: Vec<Option<FieldValue>>) -> Result<()> {
        let candidate = Value::Object(snapshot(&self.ty, &staged));
        let canonical = match self.ty.check(&candidate) {
            Ok(canonical) => canonical,
            Err(err) => {
                debug!(
                    model = %self.ty.pointer(),
                    violations = err.violations().len(),
                    "model mutation rejected"
                );
                return Err(err.into());
            }
        };

        self.values = staged
            .into_iter()
            .zip(self.ty.inner.fields.iter())
            .map(|(value, field)| match value {
                Some(FieldValue::Value(raw)) => Some(FieldValue::Value(
                    canonical.get(field.name()).cloned().unwrap_or(raw),
                )),
                other => other,
            })
            .collect();
        trace!(model = %self.ty.pointer(), fields = self.len(), "model mutation committed");
        Ok(())
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.fields() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.fields()).finish()
    }
}

fn snapshot(ty: &ModelType, values: &[Option<FieldValue>]) -> Map<String, Value> {
    ty.inner
        .fields
        .iter()
        .zip(values)
        .filter_map(|(field, value)| {
            value
                .as_ref()
                .map(|value| (field.name.clone(), value.to_json()))
        })
        .collect()
}

fn expect_object(data: &Value) -> Result<&Map<String, Value>> {
    data.as_object()
        .ok_or_else(|| Error::NotAnObject(json_type(data).to_string()))
}

/// Re-anchor a nested validation failure at the position it occupies in the
/// outer value.
pub(crate) fn nest(err: Error, prefix: &str) -> Error {
    match err {
        Error::Validation(err) => Error::Validation(err.nested_under(prefix)),
        other => other,
    }
}
