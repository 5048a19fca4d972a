//! Fill the fields of a record from tagged value sources.
//!
//! Each public field of a record carries a metadata string of `name:"value"`
//! pairs. A [`ValueSource`] reads those tags and hands back a value for the
//! field, nothing, or another source to descend into a nested record; the
//! decoder converts what it gets to the field's declared type.

extern crate self as structscan;

pub mod convert;
mod decode;
mod error;
pub mod reflect;
mod registry;
pub mod source;
pub mod tags;
pub mod types;
mod value;

pub use convert::{ConvertError, Converter};
pub use decode::{decode, Decoded, ValueSource};
pub use error::{DecodeError, SourceError};
pub use reflect::{DynRecord, Record, Reflect, Slot, TargetError};
pub use registry::{FieldInfo, Registry};
pub use source::{EnvSource, FieldError, FileSource, FuncSource, LoadError, Loader, MapSource};
pub use tags::{parse_tags, TagError, Tags};
pub use types::{Kind, RawField, RecordType, TypeDesc};
pub use value::{MapValue, SeqValue, Value};

pub use structscan_derive::Record;
