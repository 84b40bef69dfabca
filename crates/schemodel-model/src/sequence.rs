use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, trace};

use schemodel_core::{
    CompiledSchema, Error, Result, SchemaError, ValidationEngine, ValidationError,
    ValidationOptions,
};
use schemodel_validate::JsonSchemaEngine;

use crate::model::{Model, ModelType, nest};
use crate::pointer::{self, Edit};
use crate::resolver::Resolver;
use crate::schema::Schema;

/// One element of a [`Sequence`].
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Value(Value),
    /// Instance of the sequence's element model.
    Model(Model),
}

impl Element {
    pub fn to_json(&self) -> Value {
        match self {
            Element::Value(value) => value.clone(),
            Element::Model(model) => model.to_json(),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Element::Value(value) => Some(value),
            Element::Model(_) => None,
        }
    }

    pub fn as_model(&self) -> Option<&Model> {
        match self {
            Element::Model(model) => Some(model),
            Element::Value(_) => None,
        }
    }
}

impl Serialize for Element {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Element::Value(value) => value.serialize(serializer),
            Element::Model(model) => model.serialize(serializer),
        }
    }
}

/// A compiled array schema.
#[derive(Clone)]
pub struct SequenceType {
    inner: Arc<SequenceTypeInner>,
}

struct SequenceTypeInner {
    pointer: String,
    element: Option<ModelType>,
    validator: Arc<dyn CompiledSchema>,
    options: ValidationOptions,
}

impl SequenceType {
    pub(crate) fn new(
        pointer: String,
        element: Option<ModelType>,
        validator: Arc<dyn CompiledSchema>,
        options: ValidationOptions,
    ) -> Self {
        Self {
            inner: Arc::new(SequenceTypeInner {
                pointer,
                element,
                validator,
                options,
            }),
        }
    }

    /// Compile a standalone array schema.
    pub fn compile(schema: &Schema, options: ValidationOptions) -> std::result::Result<Self, SchemaError> {
        Self::compile_with(schema, options, &JsonSchemaEngine::new())
    }

    pub fn compile_with(
        schema: &Schema,
        options: ValidationOptions,
        engine: &dyn ValidationEngine,
    ) -> std::result::Result<Self, SchemaError> {
        Resolver::new(schema.document(), engine, options).compile_sequence_root()
    }

    /// Sequence with no elements. Not validated.
    pub fn empty(&self) -> Sequence {
        Sequence {
            ty: self.clone(),
            items: Vec::new(),
        }
    }

    /// Sequence holding `items`; the whole array must validate.
    pub fn create(&self, items: impl IntoIterator<Item = Value>) -> Result<Sequence> {
        let staged = items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| self.stage(idx, item.into()).map(Some))
            .collect::<Result<Vec<_>>>()?;
        let mut sequence = self.empty();
        sequence.commit(staged)?;
        Ok(sequence)
    }

    /// Model type of the elements, when the items schema is an object.
    pub fn element_type(&self) -> Option<&ModelType> {
        self.inner.element.as_ref()
    }

    pub fn pointer(&self) -> &str {
        &self.inner.pointer
    }

    pub fn options(&self) -> ValidationOptions {
        self.inner.options
    }

    pub fn same_type(&self, other: &SequenceType) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn check(&self, candidate: &Value) -> std::result::Result<Value, ValidationError> {
        self.inner.validator.validate(candidate, &self.inner.options)
    }

    /// Build the element stored at `idx`. Objects become instances of the
    /// element model when there is one.
    fn stage(&self, idx: usize, input: ElementInput) -> Result<Element> {
        let prefix = format!("/{idx}");
        let element = match (&self.inner.element, input) {
            (Some(ty), ElementInput::Model(model)) if model.model_type().same_type(ty) => {
                Element::Model(model)
            }
            (Some(ty), ElementInput::Model(model)) => Element::Model(
                ty.create(&model.to_json())
                    .map_err(|err| nest(err, &prefix))?,
            ),
            (Some(ty), ElementInput::Value(Value::Object(data))) => Element::Model(
                ty.create_from_map(&data)
                    .map_err(|err| nest(err, &prefix))?,
            ),
            (_, ElementInput::Model(model)) => Element::Value(model.to_json()),
            (_, ElementInput::Value(value)) => Element::Value(value),
        };
        Ok(element)
    }
}

impl PartialEq for SequenceType {
    fn eq(&self, other: &Self) -> bool {
        self.same_type(other)
    }
}

impl fmt::Debug for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceType")
            .field("pointer", &self.inner.pointer)
            .field(
                "element",
                &self.inner.element.as_ref().map(ModelType::pointer),
            )
            .finish()
    }
}

/// Candidate element handed to a sequence mutator.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementInput {
    Value(Value),
    Model(Model),
}

impl From<Value> for ElementInput {
    fn from(value: Value) -> Self {
        ElementInput::Value(value)
    }
}

impl From<Model> for ElementInput {
    fn from(model: Model) -> Self {
        ElementInput::Model(model)
    }
}

impl From<Element> for ElementInput {
    fn from(element: Element) -> Self {
        match element {
            Element::Value(value) => ElementInput::Value(value),
            Element::Model(model) => ElementInput::Model(model),
        }
    }
}

impl From<&str> for ElementInput {
    fn from(text: &str) -> Self {
        ElementInput::Value(Value::String(text.to_string()))
    }
}

impl From<i64> for ElementInput {
    fn from(number: i64) -> Self {
        ElementInput::Value(Value::from(number))
    }
}

/// An ordered collection bound to an array schema.
///
/// Every mutator computes the array the operation would produce, validates it
/// as a whole against the array schema and only then adopts it. Positions
/// skipped by [`Sequence::set_at`] are holes; they read back as `None` and
/// serialize as `null`.
#[derive(Clone, PartialEq)]
pub struct Sequence {
    ty: SequenceType,
    items: Vec<Option<Element>>,
}

impl Sequence {
    pub fn sequence_type(&self) -> &SequenceType {
        &self.ty
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Element at `idx`; `None` for holes and positions past the end.
    pub fn get(&self, idx: usize) -> Option<&Element> {
        self.items.get(idx).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&Element>> + '_ {
        self.items.iter().map(Option::as_ref)
    }

    /// Add one element at the end and return the new length.
    pub fn append(&mut self, item: impl Into<ElementInput>) -> Result<usize> {
        let staged = self.ty.stage(self.items.len(), item.into())?;
        let mut items = self.items.clone();
        items.push(Some(staged));
        self.commit(items)?;
        Ok(self.items.len())
    }

    /// Add several elements at the end as one change.
    pub fn push<I>(&mut self, items: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: Into<ElementInput>,
    {
        let mut staged = self.items.clone();
        for item in items {
            let element = self.ty.stage(staged.len(), item.into())?;
            staged.push(Some(element));
        }
        self.commit(staged)?;
        Ok(self.items.len())
    }

    /// Insert elements at the front, keeping their order.
    pub fn prepend<I>(&mut self, items: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: Into<ElementInput>,
    {
        let mut staged = Vec::with_capacity(self.items.len());
        for item in items {
            let element = self.ty.stage(staged.len(), item.into())?;
            staged.push(Some(element));
        }
        staged.extend(self.items.iter().cloned());
        self.commit(staged)?;
        Ok(self.items.len())
    }

    /// Remove the last element. An empty sequence stays empty and yields
    /// `None` without validation.
    pub fn remove_last(&mut self) -> Result<Option<Element>> {
        if self.items.is_empty() {
            return Ok(None);
        }
        let mut staged = self.items.clone();
        let removed = staged.pop().flatten();
        self.commit(staged)?;
        Ok(removed)
    }

    pub fn remove_first(&mut self) -> Result<Option<Element>> {
        if self.items.is_empty() {
            return Ok(None);
        }
        let mut staged = self.items.clone();
        let removed = staged.remove(0);
        self.commit(staged)?;
        Ok(removed)
    }

    /// Assign position `idx`, growing the sequence with holes when `idx` is
    /// past the end.
    ///
    /// Holes are validated as `null`, so assigning past the end only
    /// succeeds when the items schema admits `null` elements. An index whose
    /// holes cannot be allocated is [`Error::IndexOutOfRange`].
    pub fn set_at(&mut self, idx: usize, item: impl Into<ElementInput>) -> Result<()> {
        let len = self.items.len();
        let out_of_range = || Error::IndexOutOfRange { index: idx, len };
        let mut staged = self.items.clone();
        if idx >= len {
            let new_len = idx.checked_add(1).ok_or_else(out_of_range)?;
            staged
                .try_reserve_exact(new_len - len)
                .map_err(|_| out_of_range())?;
        }
        let element = self.ty.stage(idx, item.into())?;
        if idx >= staged.len() {
            staged.resize(idx + 1, None);
        }
        staged[idx] = Some(element);
        self.commit(staged)
    }

    /// Remove up to `delete` elements starting at `start` and insert `items`
    /// in their place. `start` is clamped to the length. Returns the removed
    /// elements.
    pub fn splice_at<I>(&mut self, start: usize, delete: usize, items: I) -> Result<Vec<Option<Element>>>
    where
        I: IntoIterator,
        I::Item: Into<ElementInput>,
    {
        let start = start.min(self.items.len());
        let end = start.saturating_add(delete).min(self.items.len());

        let mut inserted = Vec::new();
        for item in items {
            inserted.push(Some(self.ty.stage(start + inserted.len(), item.into())?));
        }
        let mut staged = self.items.clone();
        let removed: Vec<_> = staged.splice(start..end, inserted).collect();
        self.commit(staged)?;
        Ok(removed)
    }

    /// Mutate the model instance at `idx` in place.
    ///
    /// `f` runs on a copy; the result is validated as part of the whole
    /// sequence before anything changes.
    pub fn update_at<R>(&mut self, idx: usize, f: impl FnOnce(&mut Model) -> Result<R>) -> Result<R> {
        let Some(Some(Element::Model(nested))) = self.items.get(idx) else {
            return Err(Error::NotAModel(idx.to_string()));
        };
        let mut nested = nested.clone();
        let out = f(&mut nested).map_err(|err| nest(err, &format!("/{idx}")))?;

        let mut staged = self.items.clone();
        staged[idx] = Some(Element::Model(nested));
        self.commit(staged)?;
        Ok(out)
    }

    pub(crate) fn apply_edit(&mut self, pointer: &str, tokens: &[String], edit: Edit) -> Result<()> {
        match tokens {
            [] => Err(pointer::invalid(pointer, "the pointer must name an element")),
            [token] => {
                let idx = pointer::parse_index(pointer, token, self.items.len())?;
                match edit {
                    Edit::Set(value) => self.set_at(idx, value),
                    Edit::Unset if idx < self.items.len() => {
                        self.splice_at(idx, 1, std::iter::empty::<Value>()).map(|_| ())
                    }
                    Edit::Unset => Err(pointer::invalid(pointer, "no element at that index")),
                }
            }
            [token, rest @ ..] => {
                let idx = pointer::parse_index(pointer, token, self.items.len())?;
                if self.get(idx).and_then(Element::as_model).is_none() {
                    return Err(pointer::invalid(
                        pointer,
                        &format!("element {idx} is not a model instance"),
                    ));
                }
                self.update_at(idx, |nested| nested.apply_edit(pointer, rest, edit))
            }
        }
    }

    /// Plain JSON array; holes become `null`.
    pub fn to_json(&self) -> Value {
        Value::Array(snapshot(&self.items))
    }

    fn commit(&mut self, staged: Vec<Option<Element>>) -> Result<()> {
        let candidate = Value::Array(snapshot(&staged));
        let canonical = match self.ty.check(&candidate) {
            Ok(canonical) => canonical,
            Err(err) => {
                debug!(
                    sequence = %self.ty.pointer(),
                    violations = err.violations().len(),
                    "sequence mutation rejected"
                );
                return Err(err.into());
            }
        };

        self.items = staged
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Some(Element::Value(raw)) => Some(Element::Value(
                    canonical.get(idx).cloned().unwrap_or(raw),
                )),
                other => other,
            })
            .collect();
        trace!(sequence = %self.ty.pointer(), len = self.items.len(), "sequence mutation committed");
        Ok(())
    }
}

impl Index<usize> for Sequence {
    type Output = Option<Element>;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.items[idx]
    }
}

impl Serialize for Sequence {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.items.len()))?;
        for item in &self.items {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}

fn snapshot(items: &[Option<Element>]) -> Vec<Value> {
    items
        .iter()
        .map(|item| item.as_ref().map_or(Value::Null, Element::to_json))
        .collect()
}
