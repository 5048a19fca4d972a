//! Dynamic values handed over by value sources.

use std::fmt;

use serde::de::{Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};

use crate::reflect::{DynRecord, Record, Reflect};
use crate::types::TypeDesc;

/// A self-describing runtime value.
///
/// This is what a [`ValueSource`](crate::ValueSource) produces and what the
/// converter reconciles with a field's declared type.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value at all.
    #[default]
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Isize(isize),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Usize(usize),
    F32(f32),
    F64(f64),
    Char(char),
    String(String),
    /// A nullable indirection; `Ptr(None)` is a null pointer.
    Ptr(Option<Box<Value>>),
    Seq(SeqValue),
    Map(MapValue),
    Record(Box<dyn DynRecord>),
}

/// A sequence together with its declared element type.
#[derive(Debug, Clone, PartialEq)]
pub struct SeqValue {
    pub elem: TypeDesc,
    pub items: Vec<Value>,
}

/// An insertion-ordered map together with its declared key and value types.
#[derive(Debug, Clone, PartialEq)]
pub struct MapValue {
    pub key: TypeDesc,
    pub value: TypeDesc,
    pub entries: Vec<(Value, Value)>,
}

impl MapValue {
    /// An empty map whose keys and values are dynamic.
    pub fn new() -> Self {
        Self::typed(TypeDesc::Any, TypeDesc::Any)
    }

    pub fn typed(key: TypeDesc, value: TypeDesc) -> Self {
        Self {
            key,
            value,
            entries: Vec::new(),
        }
    }

    /// Looks up the entry whose key is the string `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, Value::String(s) if s == key))
            .map(|(_, v)| v)
    }

    /// Inserts an entry, replacing the value of an equal key.
    pub fn insert(&mut self, key: Value, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MapValue {
    fn default() -> Self {
        Self::new()
    }
}

impl Value {
    /// Builds a dynamic map from `(key, value)` pairs.
    pub fn map<K: Into<Value>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let mut map = MapValue::new();
        for (key, value) in entries {
            map.insert(key.into(), value);
        }
        Value::Map(map)
    }

    /// Builds a sequence of dynamic elements.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Seq(SeqValue {
            elem: TypeDesc::Any,
            items: items.into_iter().collect(),
        })
    }

    /// The zero value of `ty`.
    pub fn zero(ty: &TypeDesc) -> Self {
        match ty {
            TypeDesc::Bool => Value::Bool(false),
            TypeDesc::I8 => Value::I8(0),
            TypeDesc::I16 => Value::I16(0),
            TypeDesc::I32 => Value::I32(0),
            TypeDesc::I64 => Value::I64(0),
            TypeDesc::Isize => Value::Isize(0),
            TypeDesc::U8 => Value::U8(0),
            TypeDesc::U16 => Value::U16(0),
            TypeDesc::U32 => Value::U32(0),
            TypeDesc::U64 => Value::U64(0),
            TypeDesc::Usize => Value::Usize(0),
            TypeDesc::F32 => Value::F32(0.0),
            TypeDesc::F64 => Value::F64(0.0),
            TypeDesc::Char => Value::Char('\0'),
            TypeDesc::String => Value::String(String::new()),
            TypeDesc::Any | TypeDesc::Opaque(_) => Value::Null,
            TypeDesc::Pointer(_) => Value::Ptr(None),
            TypeDesc::Seq(elem) => Value::Seq(SeqValue {
                elem: elem.as_ref().clone(),
                items: Vec::new(),
            }),
            TypeDesc::Map(key, value) => {
                Value::Map(MapValue::typed(key.as_ref().clone(), value.as_ref().clone()))
            }
            TypeDesc::Record(record) => Value::Record(record.zero()),
        }
    }

    /// The dynamic type of this value.
    ///
    /// `Null` reports [`TypeDesc::Any`] and a null pointer reports a
    /// pointer to `Any`, since neither carries a concrete type.
    pub fn type_desc(&self) -> TypeDesc {
        match self {
            Value::Null => TypeDesc::Any,
            Value::Bool(_) => TypeDesc::Bool,
            Value::I8(_) => TypeDesc::I8,
            Value::I16(_) => TypeDesc::I16,
            Value::I32(_) => TypeDesc::I32,
            Value::I64(_) => TypeDesc::I64,
            Value::Isize(_) => TypeDesc::Isize,
            Value::U8(_) => TypeDesc::U8,
            Value::U16(_) => TypeDesc::U16,
            Value::U32(_) => TypeDesc::U32,
            Value::U64(_) => TypeDesc::U64,
            Value::Usize(_) => TypeDesc::Usize,
            Value::F32(_) => TypeDesc::F32,
            Value::F64(_) => TypeDesc::F64,
            Value::Char(_) => TypeDesc::Char,
            Value::String(_) => TypeDesc::String,
            Value::Ptr(None) => TypeDesc::Pointer(Box::new(TypeDesc::Any)),
            Value::Ptr(Some(inner)) => TypeDesc::Pointer(Box::new(inner.type_desc())),
            Value::Seq(seq) => TypeDesc::Seq(Box::new(seq.elem.clone())),
            Value::Map(map) => {
                TypeDesc::Map(Box::new(map.key.clone()), Box::new(map.value.clone()))
            }
            Value::Record(record) => TypeDesc::Record(record.record_type()),
        }
    }

    /// True for `Null` and for a null pointer.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Ptr(None))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&SeqValue> {
        match self {
            Value::Seq(seq) => Some(seq),
            _ => None,
        }
    }

    /// Extracts a record of type `R`, handing the value back on a type mismatch.
    pub fn into_record<R: Record>(self) -> Result<R, Value> {
        match self {
            Value::Record(record) if record.as_any().is::<R>() => record
                .into_any()
                .downcast::<R>()
                .map(|record| *record)
                .map_err(|_| Value::Null),
            other => Err(other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::Isize(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::Usize(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "{v:?}"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::Ptr(None) => f.write_str("None"),
            Value::Ptr(Some(inner)) => write!(f, "Some({inner})"),
            Value::Seq(seq) => {
                f.write_str("[")?;
                for (i, item) in seq.items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Value::Record(record) => write!(f, "{record:?}"),
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => Usize,
    f32 => F32,
    f64 => F64,
    char => Char,
    String => String,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<MapValue> for Value {
    fn from(v: MapValue) -> Self {
        Value::Map(v)
    }
}

impl<T: Reflect> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        v.to_value()
    }
}

impl<T: Reflect> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.to_value()
    }
}

/// Any self-describing serde format can produce a [`Value`] document.
///
/// Sequences and maps come out with dynamic element types.
impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
        Ok(Value::I64(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Value, E> {
        Ok(Value::U64(v))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
        Ok(Value::F64(v))
    }

    fn visit_char<E>(self, v: char) -> Result<Value, E> {
        Ok(Value::Char(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<Value>()? {
            items.push(item);
        }
        Ok(Value::list(items))
    }

    fn visit_map<A>(self, mut access: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut map = MapValue::new();
        while let Some((key, value)) = access.next_entry::<Value, Value>()? {
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }
}
