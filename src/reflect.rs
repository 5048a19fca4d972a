//! The reflection surface the decoder works against.
//!
//! Rust has no runtime reflection, so records describe themselves through
//! [`Record`], normally generated by `#[derive(Record)]`. Field types
//! implement [`Reflect`], which tells the decoder their [`TypeDesc`] and how
//! to move between the typed field and a dynamic [`Value`].

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

use thiserror::Error;

use crate::types::{Kind, RecordType, TypeDesc};
use crate::value::{MapValue, SeqValue, Value};

/// Why a value cannot be decoded into.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TargetError {
    #[error("expected non-null pointer to record, but got a null {0}")]
    Null(TypeDesc),

    #[error("can only decode into records, but got: {0}")]
    NotARecord(TypeDesc),
}

/// A type that can be the declared type of a record field.
pub trait Reflect: Sized + 'static {
    /// The descriptor of this type.
    fn type_desc() -> TypeDesc;

    /// The zero value: numbers are 0, strings empty, pointers null.
    fn zero() -> Self;

    fn to_value(&self) -> Value;

    /// Takes a value whose dynamic type matches [`Reflect::type_desc`],
    /// handing it back unchanged if it does not.
    fn from_value(value: Value) -> Result<Self, Value>;

    /// Borrows this value as a record to decode into.
    ///
    /// With `allocate` set, a null pointer to a record is first replaced by a
    /// zero-valued record.
    fn record_mut(&mut self, allocate: bool) -> Result<&mut dyn DynRecord, TargetError> {
        let _ = allocate;
        Err(TargetError::NotARecord(Self::type_desc()))
    }
}

/// A record type: named fields in a fixed declaration order.
///
/// Implement it with `#[derive(Record)]`:
///
/// ```
/// use structscan::Record;
///
/// #[derive(Debug, Clone, PartialEq, Record)]
/// pub struct Server {
///     #[tag = r#"env:"HOST""#]
///     pub host: String,
///     #[tag = r#"env:"PORT""#]
///     pub port: u16,
/// }
/// ```
pub trait Record: Reflect + Clone + fmt::Debug + PartialEq {
    fn record_type() -> RecordType;

    /// The field declared at position `index`, if it is public.
    fn field_mut(&mut self, index: usize) -> Option<&mut dyn Slot>;
}

/// Object-safe view of a [`Record`].
pub trait DynRecord: Any + fmt::Debug {
    fn descriptor(&self) -> RecordType;

    fn field_slot(&mut self, index: usize) -> Option<&mut dyn Slot>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    fn clone_record(&self) -> Box<dyn DynRecord>;

    fn eq_record(&self, other: &dyn DynRecord) -> bool;
}

impl<R: Record> DynRecord for R {
    fn descriptor(&self) -> RecordType {
        <R as Record>::record_type()
    }

    fn field_slot(&mut self, index: usize) -> Option<&mut dyn Slot> {
        <R as Record>::field_mut(self, index)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn clone_record(&self) -> Box<dyn DynRecord> {
        Box::new(self.clone())
    }

    fn eq_record(&self, other: &dyn DynRecord) -> bool {
        other
            .as_any()
            .downcast_ref::<R>()
            .is_some_and(|other| self == other)
    }
}

impl<'a> dyn DynRecord + 'a {
    /// The descriptor of the concrete record type.
    pub fn record_type(&self) -> RecordType {
        self.descriptor()
    }
}

impl PartialEq for dyn DynRecord {
    fn eq(&self, other: &Self) -> bool {
        self.eq_record(other)
    }
}

impl Clone for Box<dyn DynRecord> {
    fn clone(&self) -> Self {
        self.clone_record()
    }
}

/// A typed storage location the decoder can assign a [`Value`] to.
pub trait Slot {
    fn slot_type(&self) -> TypeDesc;

    /// Stores `value`, handing it back if its type does not match the slot.
    fn assign(&mut self, value: Value) -> Result<(), Value>;

    fn target_record(&mut self, allocate: bool) -> Result<&mut dyn DynRecord, TargetError>;
}

impl<T: Reflect> Slot for T {
    fn slot_type(&self) -> TypeDesc {
        T::type_desc()
    }

    fn assign(&mut self, value: Value) -> Result<(), Value> {
        *self = T::from_value(value)?;
        Ok(())
    }

    fn target_record(&mut self, allocate: bool) -> Result<&mut dyn DynRecord, TargetError> {
        self.record_mut(allocate)
    }
}

macro_rules! impl_reflect_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Reflect for $ty {
                fn type_desc() -> TypeDesc {
                    TypeDesc::$variant
                }

                fn zero() -> Self {
                    <$ty>::default()
                }

                fn to_value(&self) -> Value {
                    Value::$variant(self.clone())
                }

                fn from_value(value: Value) -> Result<Self, Value> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

impl_reflect_primitive! {
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

impl Reflect for Value {
    fn type_desc() -> TypeDesc {
        TypeDesc::Any
    }

    fn zero() -> Self {
        Value::Null
    }

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        Ok(value)
    }

    fn record_mut(&mut self, _allocate: bool) -> Result<&mut dyn DynRecord, TargetError> {
        match self {
            Value::Record(record) => Ok(record.as_mut()),
            other => Err(TargetError::NotARecord(other.type_desc())),
        }
    }
}

impl<T: Reflect> Reflect for Option<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::Pointer(Box::new(T::type_desc()))
    }

    fn zero() -> Self {
        None
    }

    fn to_value(&self) -> Value {
        Value::Ptr(self.as_ref().map(|v| Box::new(v.to_value())))
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Null | Value::Ptr(None) => Ok(None),
            Value::Ptr(Some(inner)) => T::from_value(*inner)
                .map(Some)
                .map_err(|v| Value::Ptr(Some(Box::new(v)))),
            other => Err(other),
        }
    }

    fn record_mut(&mut self, allocate: bool) -> Result<&mut dyn DynRecord, TargetError> {
        if self.is_none() {
            if !allocate {
                return Err(TargetError::Null(Self::type_desc()));
            }
            if T::type_desc().kind() != Kind::Record {
                return Err(TargetError::NotARecord(Self::type_desc()));
            }
            *self = Some(T::zero());
        }
        match self {
            Some(inner) => inner.record_mut(allocate),
            None => Err(TargetError::Null(Self::type_desc())),
        }
    }
}

/// Boxes are transparent: a `Box<T>` field is described exactly like `T`.
impl<T: Reflect> Reflect for Box<T> {
    fn type_desc() -> TypeDesc {
        T::type_desc()
    }

    fn zero() -> Self {
        Box::new(T::zero())
    }

    fn to_value(&self) -> Value {
        self.as_ref().to_value()
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        T::from_value(value).map(Box::new)
    }

    fn record_mut(&mut self, allocate: bool) -> Result<&mut dyn DynRecord, TargetError> {
        self.as_mut().record_mut(allocate)
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::Seq(Box::new(T::type_desc()))
    }

    fn zero() -> Self {
        Vec::new()
    }

    fn to_value(&self) -> Value {
        Value::Seq(SeqValue {
            elem: T::type_desc(),
            items: self.iter().map(Reflect::to_value).collect(),
        })
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Seq(seq) => seq.items.into_iter().map(T::from_value).collect(),
            other => Err(other),
        }
    }
}

impl<K, V> Reflect for HashMap<K, V>
where
    K: Reflect + Eq + Hash,
    V: Reflect,
{
    fn type_desc() -> TypeDesc {
        TypeDesc::Map(Box::new(K::type_desc()), Box::new(V::type_desc()))
    }

    fn zero() -> Self {
        HashMap::new()
    }

    fn to_value(&self) -> Value {
        Value::Map(MapValue {
            key: K::type_desc(),
            value: V::type_desc(),
            entries: self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect(),
        })
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Map(map) => map
                .entries
                .into_iter()
                .map(|(k, v)| -> Result<(K, V), Value> { Ok((K::from_value(k)?, V::from_value(v)?)) })
                .collect(),
            other => Err(other),
        }
    }
}

impl<K, V> Reflect for BTreeMap<K, V>
where
    K: Reflect + Ord,
    V: Reflect,
{
    fn type_desc() -> TypeDesc {
        TypeDesc::Map(Box::new(K::type_desc()), Box::new(V::type_desc()))
    }

    fn zero() -> Self {
        BTreeMap::new()
    }

    fn to_value(&self) -> Value {
        Value::Map(MapValue {
            key: K::type_desc(),
            value: V::type_desc(),
            entries: self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect(),
        })
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Map(map) => map
                .entries
                .into_iter()
                .map(|(k, v)| -> Result<(K, V), Value> { Ok((K::from_value(k)?, V::from_value(v)?)) })
                .collect(),
            other => Err(other),
        }
    }
}
