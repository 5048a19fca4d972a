//! Runtime type descriptors for record fields and dynamic values.

use std::any::TypeId;
use std::fmt;

use crate::reflect::DynRecord;

/// Coarse classification of a type, used to pick a decoding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Booleans, numbers, characters and strings.
    Primitive,
    /// A nullable indirection (`Option<T>`).
    Pointer,
    Record,
    Seq,
    Map,
    /// A [`Value`](crate::Value) that can hold anything.
    Dynamic,
    /// A type without a descriptor of its own.
    Other,
}

/// Describes the declared type of a field or the dynamic type of a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDesc {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    Char,
    String,
    /// The dynamic [`Value`](crate::Value) type.
    Any,
    Pointer(Box<TypeDesc>),
    Seq(Box<TypeDesc>),
    Map(Box<TypeDesc>, Box<TypeDesc>),
    Record(RecordType),
    /// A type the crate cannot look into, identified by its Rust name.
    Opaque(&'static str),
}

impl TypeDesc {
    pub fn kind(&self) -> Kind {
        match self {
            TypeDesc::Any => Kind::Dynamic,
            TypeDesc::Pointer(_) => Kind::Pointer,
            TypeDesc::Seq(_) => Kind::Seq,
            TypeDesc::Map(..) => Kind::Map,
            TypeDesc::Record(_) => Kind::Record,
            TypeDesc::Opaque(_) => Kind::Other,
            _ => Kind::Primitive,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, TypeDesc::F32 | TypeDesc::F64)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            TypeDesc::I8
                | TypeDesc::I16
                | TypeDesc::I32
                | TypeDesc::I64
                | TypeDesc::Isize
                | TypeDesc::U8
                | TypeDesc::U16
                | TypeDesc::U32
                | TypeDesc::U64
                | TypeDesc::Usize
        )
    }

    /// The pointee of a pointer type.
    pub fn pointee(&self) -> Option<&TypeDesc> {
        match self {
            TypeDesc::Pointer(inner) => Some(inner),
            _ => None,
        }
    }

    /// The element type of a sequence type.
    pub fn element(&self) -> Option<&TypeDesc> {
        match self {
            TypeDesc::Seq(elem) => Some(elem),
            _ => None,
        }
    }

    /// The record type, looking through one level of pointer.
    pub fn record(&self) -> Option<&RecordType> {
        match self {
            TypeDesc::Record(record) => Some(record),
            TypeDesc::Pointer(inner) => match inner.as_ref() {
                TypeDesc::Record(record) => Some(record),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Bool => f.write_str("bool"),
            TypeDesc::I8 => f.write_str("i8"),
            TypeDesc::I16 => f.write_str("i16"),
            TypeDesc::I32 => f.write_str("i32"),
            TypeDesc::I64 => f.write_str("i64"),
            TypeDesc::Isize => f.write_str("isize"),
            TypeDesc::U8 => f.write_str("u8"),
            TypeDesc::U16 => f.write_str("u16"),
            TypeDesc::U32 => f.write_str("u32"),
            TypeDesc::U64 => f.write_str("u64"),
            TypeDesc::Usize => f.write_str("usize"),
            TypeDesc::F32 => f.write_str("f32"),
            TypeDesc::F64 => f.write_str("f64"),
            TypeDesc::Char => f.write_str("char"),
            TypeDesc::String => f.write_str("String"),
            TypeDesc::Any => f.write_str("Value"),
            TypeDesc::Pointer(inner) => write!(f, "Option<{inner}>"),
            TypeDesc::Seq(elem) => write!(f, "Vec<{elem}>"),
            TypeDesc::Map(key, value) => write!(f, "Map<{key}, {value}>"),
            TypeDesc::Record(record) => f.write_str(record.name()),
            TypeDesc::Opaque(name) => f.write_str(name),
        }
    }
}

/// Identity and layout of a record type.
///
/// Two descriptors are equal when they describe the same Rust type.
#[derive(Clone, Copy)]
pub struct RecordType {
    id: TypeId,
    name: &'static str,
    fields: fn() -> Vec<RawField>,
    zero: fn() -> Box<dyn DynRecord>,
}

impl RecordType {
    /// Builds the descriptor for `T`. Called by derived [`Record`](crate::Record) impls.
    pub fn of<T: 'static>(
        name: &'static str,
        fields: fn() -> Vec<RawField>,
        zero: fn() -> Box<dyn DynRecord>,
    ) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name,
            fields,
            zero,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Every declared field, public or not, in declaration order.
    pub fn raw_fields(&self) -> Vec<RawField> {
        (self.fields)()
    }

    /// A fresh zero-valued instance of the record.
    pub fn zero(&self) -> Box<dyn DynRecord> {
        (self.zero)()
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RecordType {}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordType").field(&self.name).finish()
    }
}

/// One declared field as seen by the derive macro, before tag parsing.
#[derive(Debug, Clone, Copy)]
pub struct RawField {
    pub name: &'static str,
    /// The raw, unparsed tag string.
    pub tag: &'static str,
    pub public: bool,
    pub embedded: bool,
    pub ty: fn() -> TypeDesc,
}
