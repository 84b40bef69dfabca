use schemodel_model::{
    Error, FieldKind, FieldValue, Model, ModelType, Schema, SchemaError, ValidationOptions,
};
use serde::Deserialize;
use serde_json::{Value, json};

fn compile(schema: Value) -> ModelType {
    let schema = Schema::parse(schema).expect("parse schema");
    ModelType::compile(&schema, ValidationOptions::default()).expect("compile schema")
}

fn ab_type() -> ModelType {
    compile(json!({
        "a": {"type": "number", "minimum": 0, "maximum": 3},
        "b": {"enum": ["a", "b", "c"]}
    }))
}

fn nested_type() -> ModelType {
    compile(json!({
        "a": {"type": "number"},
        "b": {
            "type": "object",
            "properties": {
                "b1": {"type": "string", "required": true},
                "b2": {"type": "string", "format": "email"}
            }
        }
    }))
}

fn family_type(options: ValidationOptions) -> ModelType {
    let schema = Schema::new(json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "Family",
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": {"type": "string"},
            "parent": {"$ref": "#/definitions/Person"},
            "children": {
                "type": "array",
                "maxItems": 4,
                "items": {"$ref": "#/definitions/Person"}
            }
        },
        "definitions": {
            "Person": {
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": {"type": "string"},
                    "age": {"type": "integer", "minimum": 0}
                }
            }
        }
    }))
    .expect("family schema");
    ModelType::compile(&schema, options).expect("compile family")
}

fn validation(err: Error) -> schemodel_model::ValidationError {
    match err {
        Error::Validation(err) => err,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn valid_data_is_accepted_and_serialized_in_declaration_order() {
    let model = ab_type()
        .create(&json!({"b": "a", "a": 1}))
        .expect("valid data");
    assert_eq!(model.to_string(), r#"{"a":1,"b":"a"}"#);
    assert_eq!(model.value("a"), Some(json!(1)));
}

#[test]
fn rejected_set_leaves_the_model_unchanged() {
    let mut model = ab_type()
        .create(&json!({"a": 1, "b": "a"}))
        .expect("valid data");

    let err = validation(model.set("b", json!(8)).expect_err("8 is not in the enum"));
    assert!(err.has_path("/b"));
    assert!(err.has_keyword("enum"));
    assert_eq!(model.to_string(), r#"{"a":1,"b":"a"}"#);

    model.set("a", json!(3)).expect("within range");
    assert!(model.set("a", json!(4)).is_err());
    assert_eq!(model.value("a"), Some(json!(3)));
}

#[test]
fn wrong_enum_value_keeps_the_previous_one() {
    let ty = compile(json!({
        "a": {"type": "number", "minimum": 0, "maximum": 3},
        "b": {"enum": ["a", "b", "c"]},
        "c": {"type": "string", "format": "email"}
    }));
    let mut model = ty
        .create(&json!({"a": 1, "b": "a", "c": "joe@example.com"}))
        .expect("valid data");

    assert!(model.set("b", json!(8)).is_err());
    assert_eq!(model.value("b"), Some(json!("a")));
    assert!(model.set("c", json!("joe")).is_err());
    assert_eq!(
        model.to_string(),
        r#"{"a":1,"b":"a","c":"joe@example.com"}"#
    );
}

#[test]
fn unset_fields_are_left_out_of_the_string_form() {
    let ty = compile(json!({
        "a": {"type": "string"},
        "b": {"type": "string"},
        "c": {"type": "string"}
    }));
    let model = ty
        .create(&json!({"a": "aa", "c": "cc"}))
        .expect("valid data");
    assert!(!model.contains("b"));
    assert_eq!(model.to_string(), r#"{"a":"aa","c":"cc"}"#);
}

#[test]
fn invalid_creation_data_fails() {
    let err = ab_type()
        .create(&json!({"a": 5}))
        .expect_err("5 is above the maximum");
    assert!(validation(err).has_keyword("maximum"));
}

#[test]
fn non_object_creation_data_yields_an_empty_instance() {
    let model = ab_type().create(&json!(["ignored"])).expect("empty instance");
    assert!(model.is_empty());
    assert_eq!(model.to_json(), json!({}));
}

#[test]
fn undeclared_fields_are_rejected_by_setters() {
    let mut model = ab_type().empty();
    assert!(matches!(
        model.set("zzz", json!(1)),
        Err(Error::UnknownField(name)) if name == "zzz"
    ));
}

#[test]
fn nested_objects_become_model_instances() {
    let ty = nested_type();
    let model = ty
        .create(&json!({"a": 1, "b": {"b1": "x"}}))
        .expect("valid data");

    let nested = model.model("b").expect("b holds a model");
    assert_eq!(nested.value("b1"), Some(json!("x")));
    match ty.field("b").map(|field| field.kind()) {
        Some(FieldKind::Object(nested_ty)) => assert!(nested.model_type().same_type(nested_ty)),
        other => panic!("unexpected field kind {other:?}"),
    }
}

#[test]
fn nested_required_fields_are_enforced() {
    let err = nested_type()
        .create(&json!({"b": {"b2": "jim@example.com"}}))
        .expect_err("b1 is required");
    let err = validation(err);
    assert!(err.has_keyword("required"));
    assert!(err.has_path("/b"));
}

#[test]
fn nested_failures_report_the_outer_path() {
    let mut model = nested_type()
        .create(&json!({"b": {"b1": "x"}}))
        .expect("valid data");

    let err = validation(
        model
            .set("b", json!({"b2": "not an email"}))
            .expect_err("invalid email"),
    );
    assert!(err.has_path("/b/b2"));
    assert_eq!(model.to_json(), json!({"b": {"b1": "x"}}));

    model
        .set("b", json!({"b2": "jim@example.com"}))
        .expect("merges into the existing instance");
    assert_eq!(
        model.to_json(),
        json!({"b": {"b1": "x", "b2": "jim@example.com"}})
    );
}

#[test]
fn invalid_nested_email_keeps_the_previous_one() {
    let ty = compile(json!({
        "b": {
            "type": "object",
            "properties": {
                "b1": {"type": "string", "required": true},
                "b2": {"type": "string", "format": "email", "required": true}
            }
        }
    }));
    let mut model = ty.empty();
    model
        .set("b", json!({"b1": "x", "b2": "jim@example.com"}))
        .expect("valid nested object");

    let err = validation(
        model
            .with_model("b", |b| b.set("b2", json!("not an email")))
            .expect_err("invalid email"),
    );
    assert!(err.has_path("/b/b2"));
    assert_eq!(model.get_pointer("/b/b2"), Some(json!("jim@example.com")));

    assert!(model.set_pointer("/b/b2", json!("still not an email")).is_err());
    assert!(model.set("b", json!({"b2": "nope"})).is_err());
    assert_eq!(
        model.to_json(),
        json!({"b": {"b1": "x", "b2": "jim@example.com"}})
    );
}

#[test]
fn replace_builds_nested_instances_from_scratch() {
    let mut model = nested_type()
        .create(&json!({"b": {"b1": "x", "b2": "jim@example.com"}}))
        .expect("valid data");

    assert!(model.replace("b", json!({"b2": "ann@example.com"})).is_err());
    model
        .replace("b", json!({"b1": "y"}))
        .expect("complete replacement");
    assert_eq!(model.to_json(), json!({"b": {"b1": "y"}}));
}

#[test]
fn with_model_commits_both_levels_or_neither() {
    let mut model = nested_type()
        .create(&json!({"b": {"b1": "x"}}))
        .expect("valid data");

    model
        .with_model("b", |b| b.set("b2", json!("jim@example.com")))
        .expect("valid nested edit");
    assert_eq!(model.value("b"), Some(json!({"b1": "x", "b2": "jim@example.com"})));

    let err = model
        .with_model("b", |b| b.unset("b1"))
        .expect_err("b1 is required");
    assert!(validation(err).has_path("/b"));
    assert_eq!(model.value("b"), Some(json!({"b1": "x", "b2": "jim@example.com"})));

    assert!(matches!(
        model.with_model("a", |_| Ok(())),
        Err(Error::NotAModel(name)) if name == "a"
    ));
}

#[test]
fn update_data_merges_and_set_data_replaces() {
    let ty = compile(json!({
        "name": {"type": "string", "required": true},
        "age": {"type": "number"},
        "nick": {"type": "string"}
    }));
    let mut model = ty
        .create(&json!({"name": "Jimmy", "age": 3, "nick": "jj"}))
        .expect("valid data");

    model.update_data(&json!({"age": 4})).expect("merge");
    assert_eq!(model.to_json(), json!({"name": "Jimmy", "age": 4, "nick": "jj"}));

    model
        .set_data(&json!({"name": "Ann", "ignored": true}))
        .expect("replace");
    assert_eq!(model.to_json(), json!({"name": "Ann"}));

    assert!(model.set_data(&json!({"age": 2})).is_err());
    assert_eq!(model.to_json(), json!({"name": "Ann"}));

    assert!(matches!(
        model.set_data(&json!([1, 2])),
        Err(Error::NotAnObject(found)) if found == "array"
    ));
}

#[test]
fn unset_removes_optional_fields_only() {
    let ty = compile(json!({
        "name": {"type": "string", "required": true},
        "nick": {"type": "string"}
    }));
    let mut model = ty
        .create(&json!({"name": "Jimmy", "nick": "jj"}))
        .expect("valid data");

    model.unset("nick").expect("optional field");
    assert!(!model.contains("nick"));
    assert!(model.unset("name").is_err());
    assert_eq!(model.value("name"), Some(json!("Jimmy")));
}

#[test]
fn null_is_an_ordinary_value() {
    let ty = compile(json!({
        "maybe": {"type": ["string", "null"]},
        "text": {"type": "string"}
    }));
    let mut model = ty.empty();
    model.set("maybe", Value::Null).expect("null allowed");
    assert_eq!(model.to_json(), json!({"maybe": null}));
    assert!(model.set("text", Value::Null).is_err());
}

#[test]
fn validate_checks_without_mutating() {
    let model = ab_type().create(&json!({"a": 1})).expect("valid data");
    assert!(model.validate(None).is_ok());
    assert!(model.validate(Some(&json!({"a": 9}))).is_err());
    assert_eq!(model.to_json(), json!({"a": 1}));
}

#[test]
fn array_limits_hold_across_mutations() {
    let ty = family_type(ValidationOptions::default());
    let mut family = ty
        .create(&json!({
            "name": "Smith",
            "children": [{"name": "a"}, {"name": "b"}, {"name": "c"}, {"name": "d"}]
        }))
        .expect("four children are allowed");

    let err = family
        .with_sequence("children", |children| children.append(json!({"name": "e"})))
        .expect_err("a fifth child exceeds maxItems");
    assert!(validation(err).has_keyword("maxItems"));
    assert_eq!(family.sequence("children").map(|c| c.len()), Some(4));

    let err = ty
        .create(&json!({
            "name": "Jones",
            "children": [{"name": "a"}, {"name": "b"}, {"name": "c"}, {"name": "d"}, {"name": "e"}]
        }))
        .expect_err("five children at creation");
    assert!(validation(err).has_path("/children"));
}

#[test]
fn pointer_edits_reach_nested_elements() {
    let mut family = family_type(ValidationOptions::default())
        .create(&json!({
            "name": "Smith",
            "children": [{"name": "Ann"}, {"name": "Bob", "age": 4}]
        }))
        .expect("valid data");

    family
        .set_pointer("/children/1/age", json!(5))
        .expect("valid age");
    assert_eq!(family.get_pointer("/children/1/age"), Some(json!(5)));

    let err = family
        .set_pointer("/children/1/age", json!(-1))
        .expect_err("negative age");
    assert!(validation(err).has_path("/children/1/age"));
    assert_eq!(family.get_pointer("/children/1/age"), Some(json!(5)));

    family.unset_pointer("/children/1/age").expect("age is optional");
    assert_eq!(family.get_pointer("/children/1"), Some(json!({"name": "Bob"})));

    assert!(family.unset_pointer("/children/0/name").is_err());
    assert!(matches!(
        family.set_pointer("children/0/name", json!("x")),
        Err(Error::InvalidPointer { .. })
    ));
    assert!(matches!(
        family.set_pointer("/name/first", json!("x")),
        Err(Error::InvalidPointer { .. })
    ));
}

#[test]
fn pointer_indexes_past_any_allocation_are_errors() {
    let mut family = family_type(ValidationOptions::default())
        .create(&json!({"name": "Smith", "children": [{"name": "Ann"}]}))
        .expect("valid data");

    let err = family
        .set_pointer("/children/18446744073709551615", json!({"name": "Bob"}))
        .expect_err("index cannot be reached");
    assert!(matches!(err, Error::IndexOutOfRange { .. }));
    assert_eq!(family.get_pointer("/children"), Some(json!([{"name": "Ann"}])));
}

#[test]
fn shared_references_compile_to_one_model_type() {
    let ty = family_type(ValidationOptions::default());
    let parent = match ty.field("parent").map(|f| f.kind()) {
        Some(FieldKind::Object(parent)) => parent.clone(),
        other => panic!("unexpected field kind {other:?}"),
    };
    let children = match ty.field("children").map(|f| f.kind()) {
        Some(FieldKind::Array(children)) => children.clone(),
        other => panic!("unexpected field kind {other:?}"),
    };

    let element = children.element_type().expect("children hold models");
    assert!(parent.same_type(element));
    assert_eq!(parent.pointer(), "#/definitions/Person");
    assert_eq!(ty.title(), Some("Family"));
}

#[test]
fn instances_of_the_right_type_are_taken_as_given() {
    let ty = family_type(ValidationOptions::default());
    let person = match ty.field("parent").map(|f| f.kind()) {
        Some(FieldKind::Object(person)) => person.clone(),
        other => panic!("unexpected field kind {other:?}"),
    };
    let dad = person
        .create(&json!({"name": "Dad", "age": 40}))
        .expect("valid person");

    let mut family = ty.create(&json!({"name": "Smith"})).expect("valid data");
    family.set("parent", dad.clone()).expect("model input");
    assert_eq!(family.model("parent"), Some(&dad));
}

#[test]
fn coercion_stores_canonical_values() {
    let mut family = family_type(ValidationOptions::coercing())
        .create(&json!({"name": "Smith", "children": [{"name": "Ann", "age": "3"}]}))
        .expect("coercible data");
    assert_eq!(family.get_pointer("/children/0/age"), Some(json!(3)));

    family
        .set_pointer("/children/0/age", json!("7"))
        .expect("coercible age");
    assert_eq!(family.get_pointer("/children/0/age"), Some(json!(7)));
    assert!(family.set_pointer("/children/0/age", json!("seven")).is_err());
}

#[test]
fn partial_mode_allows_missing_required_fields() {
    let options = ValidationOptions::default().with_partial(true);
    let family = family_type(options)
        .create(&json!({"children": [{"age": 3}]}))
        .expect("required fields may be absent");
    assert_eq!(family.to_json(), json!({"children": [{"age": 3}]}));

    assert!(
        family_type(ValidationOptions::default())
            .create(&json!({"children": [{"age": 3}]}))
            .is_err()
    );
}

#[test]
fn serialization_matches_the_json_snapshot() {
    let family = family_type(ValidationOptions::default())
        .create(&json!({"name": "Smith", "children": [{"name": "Ann"}]}))
        .expect("valid data");
    let encoded = serde_json::to_string(&family).expect("serialize model");
    assert_eq!(encoded, family.to_string());
    assert_eq!(encoded, r#"{"name":"Smith","children":[{"name":"Ann"}]}"#);

    let fields: Vec<&str> = family.fields().map(|(name, _)| name).collect();
    assert_eq!(fields, vec!["name", "children"]);
    assert!(matches!(family.get("children"), Some(FieldValue::Sequence(_))));
}

#[derive(Debug, Deserialize, PartialEq, schemars::JsonSchema)]
struct Pet {
    name: String,
    indoor: bool,
    tags: Vec<String>,
}

#[test]
fn rust_types_round_trip_through_models() {
    let schema = Schema::for_type::<Pet>().expect("derived schema");
    let ty = ModelType::compile(&schema, ValidationOptions::default()).expect("compile");
    let mut names: Vec<&str> = ty.fields().iter().map(|f| f.name()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["indoor", "name", "tags"]);

    let mut model: Model = ty
        .create(&json!({"name": "Rex", "indoor": false, "tags": ["good"]}))
        .expect("valid pet");
    assert!(model.set("indoor", json!("no")).is_err());
    model.set("indoor", true).expect("bool input");

    let pet: Pet = model.to_typed().expect("deserialize pet");
    assert_eq!(
        pet,
        Pet {
            name: "Rex".to_string(),
            indoor: true,
            tags: vec!["good".to_string()],
        }
    );
}

#[test]
fn non_object_roots_are_rejected() {
    let schema = Schema::new(json!({"type": "array", "items": {"type": "string"}}))
        .expect("array schema");
    let err = ModelType::compile(&schema, ValidationOptions::default())
        .expect_err("model types need an object root");
    assert!(matches!(
        err,
        SchemaError::UnexpectedRoot { expected: "object", .. }
    ));
}

#[test]
fn self_referencing_schemas_are_cyclic() {
    let schema = Schema::new(json!({
        "$ref": "#/definitions/Node",
        "definitions": {
            "Node": {
                "type": "object",
                "properties": {"next": {"$ref": "#/definitions/Node"}}
            }
        }
    }))
    .expect("schema");
    let err = ModelType::compile(&schema, ValidationOptions::default())
        .expect_err("recursive models are not supported");
    assert!(matches!(err, SchemaError::Cyclic { .. }));
}

#[test]
fn fields_may_share_names_with_schema_keywords() {
    let ty = ModelType::from_json(
        json!({"definitions": {"type": "string"}, "$defs": {"type": "number"}}),
        ValidationOptions::default(),
    )
    .expect("compile");
    assert_eq!(ty.fields().len(), 2);

    let mut model = ty.empty();
    model
        .set_data(&json!({"definitions": "terms", "$defs": 7}))
        .expect("valid data");
    assert_eq!(model.to_json(), json!({"definitions": "terms", "$defs": 7}));
    assert!(model.set("$defs", json!("seven")).is_err());
}

#[test]
fn bad_rules_fail_compilation() {
    let err = ModelType::from_json(
        json!({"a": {"type": "strnig"}}),
        ValidationOptions::default(),
    )
    .expect_err("unknown type");
    assert!(matches!(err, SchemaError::UnknownType { .. }));

    let err = ModelType::from_json(json!({"a": "bad object"}), ValidationOptions::default())
        .expect_err("rule is not a schema");
    assert!(matches!(err, SchemaError::NotASchema { .. }));
}
