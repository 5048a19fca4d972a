//! Reconciles dynamic values with declared field types.
//!
//! The rules mirror Rust's own: identical types pass through, anything goes
//! into a dynamic [`Value`], and primitives convert wherever an `as` cast
//! would compile (numbers among themselves, `bool` and `char` to integers,
//! `u8` to `char`). Maps of differing types are rebuilt entry by entry.

use thiserror::Error;

use crate::types::TypeDesc;
use crate::value::{MapValue, Value};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConvertError {
    #[error("cannot convert from type {from} to type {to}, received value was: {value}")]
    Incompatible {
        from: TypeDesc,
        to: TypeDesc,
        value: String,
    },

    #[error("cannot convert map key '{key}' of type {key_type} to target map key of type: {to}")]
    MapKey {
        key: String,
        key_type: TypeDesc,
        to: TypeDesc,
    },

    #[error("cannot convert map value: '{value}' of type: {value_type}, on key: '{key}', to type: {to}")]
    MapValue {
        value: String,
        value_type: TypeDesc,
        key: String,
        to: TypeDesc,
    },

    #[error("value of type {found} does not fit a field of type {expected}")]
    Mismatch { expected: TypeDesc, found: TypeDesc },
}

/// A single conversion of one source value.
///
/// Handles the pointer combinations uniformly: `T -> T`, `T -> Option<T>`,
/// `Option<T> -> T` and `Option<T> -> Option<T>`.
#[derive(Debug, Clone)]
pub struct Converter {
    base_type: TypeDesc,
    null: bool,
    elem: Value,
}

impl Converter {
    /// Wraps `value`, looking through one level of pointer.
    pub fn new(value: Value) -> Self {
        let base_type = value.type_desc();
        let null = value.is_null();
        let elem = match value {
            Value::Ptr(Some(inner)) => *inner,
            other => other,
        };
        Self {
            base_type,
            null,
            elem,
        }
    }

    /// The type of the value as it was handed in.
    pub fn base_type(&self) -> &TypeDesc {
        &self.base_type
    }

    /// The value after unwrapping one pointer level.
    pub fn elem(&self) -> &Value {
        &self.elem
    }

    /// Converts the wrapped value into `dest`.
    ///
    /// A null source becomes a null pointer when `dest` is a pointer and the
    /// zero value of `dest` otherwise.
    pub fn convert(self, dest: &TypeDesc) -> Result<Value, ConvertError> {
        if self.null {
            return Ok(Value::zero(dest));
        }

        let dest_elem = dest.pointee().unwrap_or(dest);
        let converted = convert_value(self.elem, dest_elem)?;

        Ok(match dest {
            TypeDesc::Pointer(_) => Value::Ptr(Some(Box::new(converted))),
            _ => converted,
        })
    }
}

/// Converts `value` into exactly `dest`, without any pointer wrapping.
pub(crate) fn convert_value(value: Value, dest: &TypeDesc) -> Result<Value, ConvertError> {
    if *dest == TypeDesc::Any {
        return Ok(value);
    }

    match (value, dest) {
        (Value::Map(map), TypeDesc::Map(key, val)) if map.key != **key || map.value != **val => {
            convert_map(map, key, val)
        }
        (Value::Null | Value::Ptr(None), TypeDesc::Pointer(_)) => Ok(Value::Ptr(None)),
        (value, dest) => {
            let from = value.type_desc();
            if from == *dest {
                return Ok(value);
            }
            cast(&value, dest).ok_or_else(|| ConvertError::Incompatible {
                from,
                to: dest.clone(),
                value: value.to_string(),
            })
        }
    }
}

fn can_convert(value: &Value, dest: &TypeDesc) -> bool {
    match (value, dest) {
        (_, TypeDesc::Any) => true,
        (Value::Map(_), TypeDesc::Map(..)) => true,
        (Value::Null | Value::Ptr(None), TypeDesc::Pointer(_)) => true,
        (value, dest) => value.type_desc() == *dest || cast(value, dest).is_some(),
    }
}

fn convert_map(map: MapValue, key_type: &TypeDesc, value_type: &TypeDesc) -> Result<Value, ConvertError> {
    let mut target = MapValue::typed(key_type.clone(), value_type.clone());

    for (key, value) in map.entries {
        if !can_convert(&key, key_type) {
            return Err(ConvertError::MapKey {
                key: key.to_string(),
                key_type: key.type_desc(),
                to: key_type.clone(),
            });
        }
        if !can_convert(&value, value_type) {
            return Err(ConvertError::MapValue {
                value: value.to_string(),
                value_type: value.type_desc(),
                key: key.to_string(),
                to: value_type.clone(),
            });
        }

        let key = convert_value(key, key_type)?;
        let value = convert_value(value, value_type)?;
        target.insert(key, value);
    }

    Ok(Value::Map(target))
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

fn number(value: &Value) -> Option<Number> {
    Some(match *value {
        Value::I8(v) => Number::Signed(v.into()),
        Value::I16(v) => Number::Signed(v.into()),
        Value::I32(v) => Number::Signed(v.into()),
        Value::I64(v) => Number::Signed(v),
        Value::Isize(v) => Number::Signed(v as i64),
        Value::U8(v) => Number::Unsigned(v.into()),
        Value::U16(v) => Number::Unsigned(v.into()),
        Value::U32(v) => Number::Unsigned(v.into()),
        Value::U64(v) => Number::Unsigned(v),
        Value::Usize(v) => Number::Unsigned(v as u64),
        Value::F32(v) => Number::Float(v.into()),
        Value::F64(v) => Number::Float(v),
        _ => return None,
    })
}

/// Primitive conversion with `as` semantics, or `None` where Rust has no cast.
fn cast(value: &Value, dest: &TypeDesc) -> Option<Value> {
    match *value {
        Value::Bool(v) if dest.is_integer() => cast_number(Number::Unsigned(v.into()), dest),
        Value::Char(v) if dest.is_integer() => cast_number(Number::Unsigned(v.into()), dest),
        Value::U8(v) if *dest == TypeDesc::Char => Some(Value::Char(v.into())),
        _ => cast_number(number(value)?, dest),
    }
}

fn cast_number(n: Number, dest: &TypeDesc) -> Option<Value> {
    macro_rules! to {
        ($ty:ty) => {
            match n {
                Number::Signed(v) => v as $ty,
                Number::Unsigned(v) => v as $ty,
                Number::Float(v) => v as $ty,
            }
        };
    }

    Some(match dest {
        TypeDesc::I8 => Value::I8(to!(i8)),
        TypeDesc::I16 => Value::I16(to!(i16)),
        TypeDesc::I32 => Value::I32(to!(i32)),
        TypeDesc::I64 => Value::I64(to!(i64)),
        TypeDesc::Isize => Value::Isize(to!(isize)),
        TypeDesc::U8 => Value::U8(to!(u8)),
        TypeDesc::U16 => Value::U16(to!(u16)),
        TypeDesc::U32 => Value::U32(to!(u32)),
        TypeDesc::U64 => Value::U64(to!(u64)),
        TypeDesc::Usize => Value::Usize(to!(usize)),
        TypeDesc::F32 => Value::F32(to!(f32)),
        TypeDesc::F64 => Value::F64(to!(f64)),
        _ => return None,
    })
}
