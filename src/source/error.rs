use std::path::PathBuf;

use thiserror::Error;

use crate::error::DecodeError;
use crate::types::TypeDesc;

/// Field-level failures reported by the built-in sources.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum FieldError {
    #[error("can't map {found} into nested record {field} of type {ty}")]
    NotAMap {
        field: &'static str,
        ty: TypeDesc,
        found: TypeDesc,
    },

    #[error("environment variable {var}={value:?} is not a valid {ty}")]
    Parse {
        var: String,
        value: String,
        ty: TypeDesc,
    },

    #[error("environment variable {var} cannot be parsed into {ty}")]
    Unsupported { var: String, ty: TypeDesc },
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("required config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to decode config: {0}")]
    Decode(#[from] DecodeError),
}
