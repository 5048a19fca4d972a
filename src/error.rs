use thiserror::Error;

use crate::convert::ConvertError;
use crate::reflect::TargetError;
use crate::tags::TagError;
use crate::types::TypeDesc;

/// Error type returned by value sources.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error type for decoding a record.
///
/// Field-level variants name the record and the field so a failure can be
/// located without a stack trace.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("invalid tag on field {record}.{field}: {source}")]
    Tag {
        record: &'static str,
        field: &'static str,
        source: TagError,
    },

    #[error("can only get field info from records, but got: {0}")]
    NotARecord(TypeDesc),

    #[error("invalid decode target: {0}")]
    InvalidTarget(#[from] TargetError),

    #[error("record {record} does not expose field {field}")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },

    #[error("error decoding field {record}.{field}: {source}")]
    Source {
        record: &'static str,
        field: &'static str,
        source: SourceError,
    },

    #[error("error converting field {record}.{field}: {source}")]
    Conversion {
        record: &'static str,
        field: &'static str,
        source: ConvertError,
    },

    #[error("field {record}.{field} of type {expected} needs a sequence, but got {found}: {value}")]
    SequenceShape {
        record: &'static str,
        field: &'static str,
        expected: TypeDesc,
        found: TypeDesc,
        value: String,
    },

    #[error("error converting element {index} of field {record}.{field}: {source}")]
    Element {
        record: &'static str,
        field: &'static str,
        index: usize,
        source: ConvertError,
    },

    #[error("error decoding nested field '{field}' of {record}: {source}")]
    Nested {
        record: &'static str,
        field: &'static str,
        source: Box<DecodeError>,
    },
}

impl DecodeError {
    /// The innermost error, following nested-field wrappers.
    pub fn innermost(&self) -> &DecodeError {
        match self {
            DecodeError::Nested { source, .. } => source.innermost(),
            other => other,
        }
    }
}
