//! TOML file source.

use std::path::{Path, PathBuf};

use crate::decode::{Decoded, ValueSource};
use crate::error::SourceError;
use crate::registry::FieldInfo;
use crate::value::{MapValue, Value};

use super::{LoadError, MapSource};

/// The tag naming a field's key in a TOML document.
pub const FILE_TAG: &str = "toml";

/// A source backed by a TOML file, keyed by each field's `toml` tag.
///
/// Files can be marked as required or optional. Required files that don't exist
/// cause an error; optional files that don't exist leave every field untouched.
/// Tables fill nested records the way [`MapSource`] does.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    tag: String,
    document: Option<MapValue>,
}

impl FileSource {
    /// Reads and parses the file at `path`.
    pub fn load(path: impl AsRef<Path>, required: bool) -> Result<Self, LoadError> {
        let path = path.as_ref().to_path_buf();
        let document = load_config_file(&path, required)?;
        Ok(Self {
            path,
            tag: FILE_TAG.to_string(),
            document,
        })
    }

    /// Keys fields by `tag` instead of `toml`.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The parsed document, or `None` for a missing optional file.
    pub fn document(&self) -> Option<&MapValue> {
        self.document.as_ref()
    }
}

impl ValueSource for FileSource {
    fn decode_field(&self, field: &FieldInfo) -> Result<Decoded<'_>, SourceError> {
        match &self.document {
            Some(document) => MapSource::new(&self.tag, document).lookup(field),
            None => Ok(Decoded::Absent),
        }
    }
}

/// Loads and parses a TOML config file.
///
/// Returns `Ok(None)` if the file doesn't exist and `required` is false.
fn load_config_file(path: &Path, required: bool) -> Result<Option<MapValue>, LoadError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let document = toml::from_str(&contents).map_err(|e| LoadError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
            // A TOML document is always a table
            match document {
                Value::Map(map) => Ok(Some(map)),
                _ => Ok(Some(MapValue::new())),
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if required {
                Err(LoadError::FileNotFound(path.to_path_buf()))
            } else {
                Ok(None)
            }
        }
        Err(e) => Err(LoadError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
