use crate::decode::{Decoded, ValueSource};
use crate::error::SourceError;
use crate::registry::FieldInfo;
use crate::types::TypeDesc;
use crate::value::{MapValue, Value};

use super::FieldError;

/// Fills a record from a [`MapValue`], using one tag of each field as the key.
///
/// Fields whose type is a record, or an `Option` of one, descend into the
/// nested map under their key. An embedded record without the tag is read
/// from the same map as its parent.
#[derive(Debug, Clone, Copy)]
pub struct MapSource<'a> {
    tag: &'a str,
    map: &'a MapValue,
}

impl<'a> MapSource<'a> {
    pub fn new(tag: &'a str, map: &'a MapValue) -> Self {
        Self { tag, map }
    }

    pub fn tag(&self) -> &'a str {
        self.tag
    }

    pub fn map(&self) -> &'a MapValue {
        self.map
    }

    /// Like [`ValueSource::decode_field`], but the result borrows the map
    /// rather than this adapter.
    pub fn lookup(&self, field: &FieldInfo) -> Result<Decoded<'a>, SourceError> {
        let key = field.tag(self.tag);

        if field.ty().record().is_some() {
            let nested = match key {
                Some(key) => self.map.get(key),
                None if field.is_embedded() => return Ok(Decoded::nested(*self)),
                None => None,
            };
            return match nested {
                None | Some(Value::Null) => Ok(Decoded::Absent),
                Some(Value::Map(map)) => Ok(Decoded::nested(MapSource::new(self.tag, map))),
                Some(other) => Err(FieldError::NotAMap {
                    field: field.name(),
                    ty: field.ty().clone(),
                    found: other.type_desc(),
                }
                .into()),
            };
        }

        Ok(key
            .and_then(|key| self.map.get(key))
            .cloned()
            .map_or(Decoded::Absent, Decoded::Value))
    }
}

impl ValueSource for MapSource<'_> {
    fn decode_field(&self, field: &FieldInfo) -> Result<Decoded<'_>, SourceError> {
        self.lookup(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DecodeError, Record, Registry};

    #[derive(Debug, Clone, PartialEq, Default, Record)]
    pub struct Address {
        #[tag = r#"map:"street""#]
        pub street: String,
    }

    #[derive(Debug, Clone, PartialEq, Default, Record)]
    pub struct Audit {
        #[tag = r#"map:"created_by""#]
        pub created_by: String,
    }

    #[derive(Debug, Clone, PartialEq, Default, Record)]
    pub struct User {
        #[tag = r#"map:"id""#]
        pub id: i32,
        #[tag = r#"map:"address""#]
        pub address: Address,
        #[tag = r#"map:"billing""#]
        pub billing: Option<Address>,
        #[embedded]
        pub audit: Audit,
        pub untagged: String,
    }

    fn document(entries: Vec<(&str, Value)>) -> MapValue {
        let mut map = MapValue::new();
        for (key, value) in entries {
            map.insert(Value::from(key), value);
        }
        map
    }

    #[test]
    fn test_map_source_fills_nested_records() {
        let map = document(vec![
            ("id", Value::I64(42)),
            ("address", Value::map([("street", Value::from("X"))])),
            ("billing", Value::map([("street", Value::from("Y"))])),
            ("created_by", Value::from("root")),
            ("untagged", Value::from("ignored")),
        ]);

        let mut user = User::default();
        Registry::new()
            .decode(&mut user, &MapSource::new("map", &map))
            .unwrap();

        assert_eq!(user.id, 42);
        assert_eq!(user.address.street, "X");
        assert_eq!(user.billing.map(|a| a.street).as_deref(), Some("Y"));
        assert_eq!(user.audit.created_by, "root");
        assert_eq!(user.untagged, "");
    }

    #[test]
    fn test_map_source_missing_keys_are_absent() {
        let map = MapValue::new();

        let mut user = User {
            id: 9,
            ..User::default()
        };
        Registry::new()
            .decode(&mut user, &MapSource::new("map", &map))
            .unwrap();

        assert_eq!(user.id, 9);
        assert_eq!(user.billing, None);
    }

    #[test]
    fn test_map_source_rejects_non_map_for_record() {
        let map = document(vec![("address", Value::from("X"))]);

        let mut user = User::default();
        let err = Registry::new()
            .decode(&mut user, &MapSource::new("map", &map))
            .unwrap_err();

        match &err {
            DecodeError::Source { field, source, .. } => {
                assert_eq!(*field, "address");
                assert_eq!(
                    source.to_string(),
                    "can't map String into nested record address of type Address"
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
