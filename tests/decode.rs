use std::cell::Cell;
use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::thread;

use structscan::{
    decode, parse_tags, Converter, DecodeError, Decoded, FieldInfo, FuncSource, MapSource, MapValue,
    Record, Reflect, Registry, TagError, TargetError, TypeDesc, Value,
};

#[derive(Debug, Clone, PartialEq, Record)]
pub struct Address {
    #[tag = r#"map:"street""#]
    pub street: String,
}

#[derive(Debug, Clone, PartialEq, Record)]
pub struct Customer {
    #[tag = r#"map:"id""#]
    pub id: i32,
    #[tag = r#"map:"address""#]
    pub address: Address,
    #[tag = r#"map:"labels""#]
    pub labels: HashMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Record)]
pub struct Env {
    #[tag = r#"env:"HOME""#]
    pub home: String,
    #[tag = r#"env:"RETRIES""#]
    pub retries: i64,
    #[tag = r#"env:"WEIGHTS""#]
    pub weights: Vec<f64>,
}

fn document(value: Value) -> MapValue {
    match value {
        Value::Map(map) => map,
        other => panic!("not a map: {other}"),
    }
}

#[test]
fn test_tag_scenarios() {
    let tags = parse_tags(r#"env:"HOME""#).unwrap();
    assert_eq!(tags.get("env"), Some("HOME"));
    assert_eq!(tags.len(), 1);

    let err = parse_tags(r#"bad :"x""#).unwrap_err();
    assert!(err.to_string().contains(r#"bad :"x""#));

    let err = parse_tags(r#"env:"HOME"#).unwrap_err();
    assert!(matches!(err, TagError::MissingEndQuote { .. }));
    assert!(err.to_string().contains(r#"env:"HOME"#));
}

#[test]
fn test_tags_round_trip() {
    let raw = r#"env:"HOME" map:"a \"quoted\" key" json:"x,omitempty""#;
    let tags = parse_tags(raw).unwrap();
    let again = parse_tags(&tags.to_string()).unwrap();
    assert_eq!(tags, again);
}

#[test]
fn test_u64_to_int() {
    let converted = Converter::new(Value::U64(10)).convert(&TypeDesc::Isize).unwrap();
    assert_eq!(converted, Value::Isize(10));
}

#[test]
fn test_pointer_round_trip() {
    let ptr = TypeDesc::Pointer(Box::new(TypeDesc::U32));

    let boxed = Converter::new(Value::U32(7)).convert(&ptr).unwrap();
    assert_eq!(boxed, Value::Ptr(Some(Box::new(Value::U32(7)))));
    assert_eq!(Converter::new(boxed).convert(&TypeDesc::U32).unwrap(), Value::U32(7));

    assert_eq!(Converter::new(Value::Ptr(None)).convert(&ptr).unwrap(), Value::Ptr(None));
    assert_eq!(
        Converter::new(Value::Ptr(None)).convert(&TypeDesc::String).unwrap(),
        Value::from("")
    );
}

#[test]
fn test_nested_map_scenario() {
    let map = document(Value::map([
        ("id", Value::I64(42)),
        ("address", Value::map([("street", Value::from("X"))])),
        ("labels", Value::map([("vip", Value::I8(1))])),
    ]));

    let mut customer = Customer::zero();
    decode(&mut customer, &MapSource::new("map", &map)).unwrap();

    assert_eq!(customer.id, 42);
    assert_eq!(customer.address.street, "X");
    assert_eq!(customer.labels.get("vip"), Some(&1));
}

#[test]
fn test_nested_map_scenario_with_wrong_shape() {
    let map = document(Value::map([("address", Value::I64(5))]));

    let mut customer = Customer::zero();
    let err = decode(&mut customer, &MapSource::new("map", &map)).unwrap_err();

    let message = err.to_string();
    assert!(message.contains("address"), "{message}");
    assert!(message.contains("i64"), "{message}");
    assert!(message.contains("Address"), "{message}");
}

#[test]
fn test_map_value_error_names_key() {
    let map = document(Value::map([(
        "labels",
        Value::map([("vip", Value::from("yes"))]),
    )]));

    let mut customer = Customer::zero();
    let err = decode(&mut customer, &MapSource::new("map", &map)).unwrap_err();

    let message = err.to_string();
    assert!(message.contains("vip"), "{message}");
    assert!(message.contains("i64"), "{message}");
}

#[test]
fn test_dynamic_sequence_into_floats() {
    let source = FuncSource::new(|field: &FieldInfo| {
        Ok(match field.tag("env") {
            Some("HOME") => Decoded::value("/home/gopher"),
            Some("RETRIES") => Decoded::value(Value::U64(3)),
            Some("WEIGHTS") => {
                Decoded::value(Value::list([Value::I64(1), Value::I64(2), Value::I64(3)]))
            }
            _ => Decoded::Absent,
        })
    });

    let mut env = Env::zero();
    decode(&mut env, &source).unwrap();

    assert_eq!(env.home, "/home/gopher");
    assert_eq!(env.retries, 3);
    assert_eq!(env.weights, [1.0, 2.0, 3.0]);
}

#[test]
fn test_invalid_target_before_any_field() {
    let calls = Cell::new(0);
    let source = FuncSource::new(|_: &FieldInfo| {
        calls.set(calls.get() + 1);
        Ok(Decoded::Absent)
    });

    let mut missing: Option<Env> = None;
    let err = decode(&mut missing, &source).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidTarget(TargetError::Null(_))));

    let mut scalar = String::new();
    let err = decode(&mut scalar, &source).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidTarget(TargetError::NotARecord(_))));

    assert_eq!(calls.get(), 0);
}

#[test]
fn test_repeated_decode_is_stable() {
    let map = document(Value::map([
        ("id", Value::U8(1)),
        ("address", Value::map([("street", Value::from("Z"))])),
    ]));
    let source = MapSource::new("map", &map);

    let mut first = Customer::zero();
    decode(&mut first, &source).unwrap();
    let snapshot = first.clone();
    decode(&mut first, &source).unwrap();

    assert_eq!(first, snapshot);
}

#[test]
fn test_concurrent_introspection() {
    let registry = Arc::new(Registry::new());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.fields(&Customer::type_desc()).unwrap()
            })
        })
        .collect();

    let lists: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for list in &lists {
        assert!(Arc::ptr_eq(list, &lists[0]));
        let names: Vec<_> = list.iter().map(FieldInfo::name).collect();
        assert_eq!(names, ["id", "address", "labels"]);
    }
    assert_eq!(registry.len(), 1);
}
