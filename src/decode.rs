//! The decode driver: walks a record's fields and fills them from a source.

use crate::convert::{ConvertError, Converter};
use crate::error::{DecodeError, SourceError};
use crate::reflect::{DynRecord, Reflect, Slot};
use crate::registry::{FieldInfo, Registry};
use crate::types::TypeDesc;
use crate::value::{SeqValue, Value};

/// What a [`ValueSource`] has for one field.
pub enum Decoded<'s> {
    /// Leave the field untouched.
    Absent,
    /// A raw value, converted to the field's declared type before assignment.
    Value(Value),
    /// Descend into the field, filling it from another source.
    Nested(Box<dyn ValueSource + 's>),
}

impl<'s> Decoded<'s> {
    pub fn value(value: impl Into<Value>) -> Self {
        Decoded::Value(value.into())
    }

    pub fn nested(source: impl ValueSource + 's) -> Self {
        Decoded::Nested(Box::new(source))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Decoded::Absent)
    }
}

impl From<Value> for Decoded<'_> {
    fn from(value: Value) -> Self {
        Decoded::Value(value)
    }
}

impl<'s> From<Option<Value>> for Decoded<'s> {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Decoded::Absent, Decoded::Value)
    }
}

impl std::fmt::Debug for Decoded<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decoded::Absent => f.write_str("Absent"),
            Decoded::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Decoded::Nested(_) => f.write_str("Nested(..)"),
        }
    }
}

/// Supplies raw values for the fields of a record, one field at a time.
pub trait ValueSource {
    fn decode_field(&self, field: &FieldInfo) -> Result<Decoded<'_>, SourceError>;
}

impl<S: ValueSource + ?Sized> ValueSource for &S {
    fn decode_field(&self, field: &FieldInfo) -> Result<Decoded<'_>, SourceError> {
        (**self).decode_field(field)
    }
}

impl<S: ValueSource + ?Sized> ValueSource for Box<S> {
    fn decode_field(&self, field: &FieldInfo) -> Result<Decoded<'_>, SourceError> {
        (**self).decode_field(field)
    }
}

impl Registry {
    /// Fills the record behind `target` from `source`.
    ///
    /// `target` is either a record or a non-null `Option` of one; anything
    /// else fails with [`DecodeError::InvalidTarget`] before a field is read.
    /// Decoding stops at the first failing field, leaving earlier fields
    /// assigned.
    pub fn decode(&self, target: &mut dyn Slot, source: &dyn ValueSource) -> Result<(), DecodeError> {
        let record = target.target_record(false)?;
        self.decode_record(record, source)
    }

    /// Fills an already resolved record from `source`.
    pub fn decode_record(
        &self,
        record: &mut dyn DynRecord,
        source: &dyn ValueSource,
    ) -> Result<(), DecodeError> {
        let record_type = record.record_type();
        let name = record_type.name();
        let fields = self.record_fields(&record_type)?;

        for field in fields.iter() {
            let decoded = source
                .decode_field(field)
                .map_err(|source| DecodeError::Source {
                    record: name,
                    field: field.name(),
                    source,
                })?;

            let value = match decoded {
                Decoded::Absent | Decoded::Value(Value::Null) => {
                    tracing::trace!(record = name, field = field.name(), "no value, skipping");
                    continue;
                }
                Decoded::Nested(nested) => {
                    tracing::trace!(record = name, field = field.name(), "descending");
                    let nest = |source: DecodeError| DecodeError::Nested {
                        record: name,
                        field: field.name(),
                        source: Box::new(source),
                    };
                    let target = slot(record, name, field)?
                        .target_record(true)
                        .map_err(|e| nest(DecodeError::InvalidTarget(e)))?;
                    self.decode_record(target, nested.as_ref()).map_err(nest)?;
                    continue;
                }
                Decoded::Value(value) => value,
            };

            let converted = match field.ty().element() {
                Some(elem) => convert_seq(name, field, elem, value)?,
                None => Converter::new(value)
                    .convert(field.ty())
                    .map_err(|source| DecodeError::Conversion {
                        record: name,
                        field: field.name(),
                        source,
                    })?,
            };

            tracing::trace!(record = name, field = field.name(), value = %converted, "assigning");
            slot(record, name, field)?
                .assign(converted)
                .map_err(|rejected| DecodeError::Conversion {
                    record: name,
                    field: field.name(),
                    source: ConvertError::Mismatch {
                        expected: field.ty().clone(),
                        found: rejected.type_desc(),
                    },
                })?;
        }

        Ok(())
    }
}

fn slot<'r>(
    record: &'r mut dyn DynRecord,
    name: &'static str,
    field: &FieldInfo,
) -> Result<&'r mut dyn Slot, DecodeError> {
    record
        .field_slot(field.index())
        .ok_or(DecodeError::MissingField {
            record: name,
            field: field.name(),
        })
}

/// Builds a sequence of the field's element type, converting item by item.
fn convert_seq(
    record: &'static str,
    field: &FieldInfo,
    elem: &TypeDesc,
    value: Value,
) -> Result<Value, DecodeError> {
    let value = match value {
        Value::Ptr(Some(inner)) => *inner,
        other => other,
    };
    let seq = match value {
        Value::Seq(seq) => seq,
        other => {
            return Err(DecodeError::SequenceShape {
                record,
                field: field.name(),
                expected: field.ty().clone(),
                found: other.type_desc(),
                value: other.to_string(),
            })
        }
    };

    let mut items = Vec::with_capacity(seq.items.len());
    for (index, item) in seq.items.into_iter().enumerate() {
        let item = Converter::new(item)
            .convert(elem)
            .map_err(|source| DecodeError::Element {
                record,
                field: field.name(),
                index,
                source,
            })?;
        items.push(item);
    }

    Ok(Value::Seq(SeqValue {
        elem: elem.clone(),
        items,
    }))
}

/// Decodes `source` into `target` using the process-wide [`Registry`].
pub fn decode<T: Reflect>(target: &mut T, source: &dyn ValueSource) -> Result<(), DecodeError> {
    Registry::global().decode(target, source)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::reflect::TargetError;
    use crate::value::MapValue;

    #[derive(Debug, Clone, PartialEq, crate::Record)]
    pub struct Address {
        #[tag = r#"key:"street""#]
        pub street: String,
        #[tag = r#"key:"zip""#]
        pub zip: Option<u32>,
    }

    #[derive(Debug, Clone, PartialEq, crate::Record)]
    pub struct Person {
        #[tag = r#"key:"id""#]
        pub id: i64,
        #[tag = r#"key:"name""#]
        pub name: String,
        #[tag = r#"key:"scores""#]
        pub scores: Vec<f64>,
        #[tag = r#"key:"nickname""#]
        pub nickname: Option<String>,
        #[tag = r#"key:"extra""#]
        pub extra: Value,
        #[tag = r#"key:"address""#]
        pub address: Option<Address>,
        notes: String,
    }

    impl Person {
        fn empty() -> Self {
            Person::zero()
        }
    }

    /// Serves top-level values from a map and nests into sub-maps for record fields.
    struct Lookup(MapValue);

    impl ValueSource for Lookup {
        fn decode_field(&self, field: &FieldInfo) -> Result<Decoded<'_>, SourceError> {
            let Some(key) = field.tag("key") else {
                return Ok(Decoded::Absent);
            };
            Ok(match self.0.get(key) {
                None => Decoded::Absent,
                Some(Value::Map(map)) if field.ty().record().is_some() => {
                    Decoded::nested(Lookup(map.clone()))
                }
                Some(value) => Decoded::Value(value.clone()),
            })
        }
    }

    fn lookup(entries: Vec<(&str, Value)>) -> Lookup {
        match Value::map(entries) {
            Value::Map(map) => Lookup(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_visits_public_fields_once_in_order() {
        let seen = RefCell::new(Vec::new());
        let source = crate::FuncSource::new(|field: &FieldInfo| {
            seen.borrow_mut().push(field.name());
            Ok(Decoded::Absent)
        });

        let mut person = Person::empty();
        Registry::new().decode(&mut person, &source).unwrap();

        assert_eq!(
            seen.into_inner(),
            ["id", "name", "scores", "nickname", "extra", "address"]
        );
        assert_eq!(person, Person::empty());
    }

    #[test]
    fn test_converts_and_assigns() {
        let source = lookup(vec![
            ("id", Value::U64(10)),
            ("name", Value::from("ada")),
            ("scores", Value::list([Value::I64(1), Value::I64(2), Value::I64(3)])),
            ("nickname", Value::from("a")),
            ("extra", Value::Bool(true)),
        ]);

        let mut person = Person::empty();
        Registry::new().decode(&mut person, &source).unwrap();

        assert_eq!(person.id, 10);
        assert_eq!(person.name, "ada");
        assert_eq!(person.scores, [1.0, 2.0, 3.0]);
        assert_eq!(person.nickname.as_deref(), Some("a"));
        assert_eq!(person.extra, Value::Bool(true));
        assert_eq!(person.address, None);
    }

    #[test]
    fn test_absent_and_null_leave_fields_untouched() {
        let source = lookup(vec![("name", Value::Null)]);

        let mut person = Person::empty();
        person.id = 7;
        person.name = "kept".into();
        Registry::new().decode(&mut person, &source).unwrap();

        assert_eq!(person.id, 7);
        assert_eq!(person.name, "kept");
    }

    #[test]
    fn test_null_pointer_resets_field() {
        let source = lookup(vec![("nickname", Value::Ptr(None)), ("id", Value::Ptr(None))]);

        let mut person = Person::empty();
        person.id = 3;
        person.nickname = Some("old".into());
        Registry::new().decode(&mut person, &source).unwrap();

        assert_eq!(person.id, 0);
        assert_eq!(person.nickname, None);
    }

    #[test]
    fn test_pointer_source_into_plain_field() {
        let source = lookup(vec![("id", Value::Ptr(Some(Box::new(Value::I32(5)))))]);

        let mut person = Person::empty();
        Registry::new().decode(&mut person, &source).unwrap();
        assert_eq!(person.id, 5);
    }

    #[test]
    fn test_nested_record_is_allocated() {
        let source = lookup(vec![
            ("id", Value::I64(42)),
            (
                "address",
                Value::map([("street", Value::from("X")), ("zip", Value::U16(1234))]),
            ),
        ]);

        let mut person = Person::empty();
        Registry::new().decode(&mut person, &source).unwrap();

        assert_eq!(
            person.address,
            Some(Address {
                street: "X".into(),
                zip: Some(1234),
            })
        );
    }

    #[test]
    fn test_nested_decode_keeps_existing_record() {
        let source = lookup(vec![("address", Value::map([("zip", Value::U32(9))]))]);

        let mut person = Person::empty();
        person.address = Some(Address {
            street: "Main".into(),
            zip: None,
        });
        Registry::new().decode(&mut person, &source).unwrap();

        let address = person.address.unwrap();
        assert_eq!(address.street, "Main");
        assert_eq!(address.zip, Some(9));
    }

    #[test]
    fn test_decode_is_idempotent() {
        let source = lookup(vec![
            ("id", Value::I8(1)),
            ("scores", Value::list([Value::F32(0.5)])),
            ("address", Value::map([("street", Value::from("Y"))])),
        ]);
        let registry = Registry::new();

        let mut once = Person::empty();
        registry.decode(&mut once, &source).unwrap();
        let mut twice = once.clone();
        registry.decode(&mut twice, &source).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_sequence_shape_error() {
        let source = lookup(vec![("scores", Value::from("1,2,3"))]);

        let mut person = Person::empty();
        let err = Registry::new().decode(&mut person, &source).unwrap_err();
        match err {
            DecodeError::SequenceShape {
                field,
                found,
                value,
                ..
            } => {
                assert_eq!(field, "scores");
                assert_eq!(found, TypeDesc::String);
                assert_eq!(value, "\"1,2,3\"");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_element_error_names_index() {
        let source = lookup(vec![(
            "scores",
            Value::list([Value::I64(1), Value::from("two")]),
        )]);

        let mut person = Person::empty();
        let err = Registry::new().decode(&mut person, &source).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Element {
                field: "scores",
                index: 1,
                ..
            }
        ));
        assert!(person.scores.is_empty());
    }

    #[test]
    fn test_fail_fast_keeps_earlier_fields() {
        let source = lookup(vec![("id", Value::I64(1)), ("name", Value::Bool(true))]);

        let mut person = Person::empty();
        let err = Registry::new().decode(&mut person, &source).unwrap_err();

        assert!(matches!(err, DecodeError::Conversion { field: "name", .. }));
        assert_eq!(person.id, 1);
    }

    #[test]
    fn test_nested_errors_are_wrapped() {
        let source = lookup(vec![(
            "address",
            Value::map([("street", Value::list([Value::I32(1)]))]),
        )]);

        let mut person = Person::empty();
        let err = Registry::new().decode(&mut person, &source).unwrap_err();
        match &err {
            DecodeError::Nested { record, field, .. } => {
                assert_eq!(*record, "Person");
                assert_eq!(*field, "address");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            err.innermost(),
            DecodeError::Conversion { field: "street", .. }
        ));
    }

    #[test]
    fn test_source_errors_are_wrapped() {
        let source = crate::FuncSource::new(|field: &FieldInfo| {
            if field.name() == "name" {
                Err("lookup failed".into())
            } else {
                Ok(Decoded::Absent)
            }
        });

        let mut person = Person::empty();
        let err = Registry::new().decode(&mut person, &source).unwrap_err();
        assert_eq!(
            err.to_string(),
            "error decoding field Person.name: lookup failed"
        );
    }

    #[test]
    fn test_invalid_targets() {
        let source = lookup(vec![("id", Value::I64(1))]);
        let registry = Registry::new();

        let mut missing: Option<Person> = None;
        let err = registry.decode(&mut missing, &source).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidTarget(TargetError::Null(_))));
        assert_eq!(missing, None);

        let mut number = 0i64;
        let err = registry.decode(&mut number, &source).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidTarget(TargetError::NotARecord(TypeDesc::I64))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_decode_through_some() {
        let source = lookup(vec![("id", Value::I64(11))]);

        let mut person = Some(Person::empty());
        decode(&mut person, &source).unwrap();
        assert_eq!(person.map(|p| p.id), Some(11));
    }

    #[test]
    fn test_nested_into_non_record_field() {
        let source = crate::FuncSource::new(|field: &FieldInfo| {
            if field.name() == "nickname" {
                Ok(Decoded::nested(lookup(vec![])))
            } else {
                Ok(Decoded::Absent)
            }
        });

        let mut person = Person::empty();
        let err = Registry::new().decode(&mut person, &source).unwrap_err();
        assert!(matches!(
            err.innermost(),
            DecodeError::InvalidTarget(TargetError::NotARecord(_))
        ));
        assert_eq!(person.nickname, None);
    }
}
