//! Field introspection and the per-type cache.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::error::DecodeError;
use crate::tags::{parse_tags, TagError, Tags};
use crate::types::{Kind, RecordType, TypeDesc};

/// Everything the decoder, and a value source, knows about one field.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    index: usize,
    name: &'static str,
    ty: TypeDesc,
    kind: Kind,
    tags: Tags,
    embedded: bool,
}

impl FieldInfo {
    /// Position of the field in its record's declaration, private fields included.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The declared type.
    pub fn ty(&self) -> &TypeDesc {
        &self.ty
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Shorthand for `self.tags().get(name)`.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name)
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }
}

type Entry = Arc<OnceLock<Result<Arc<[FieldInfo]>, (&'static str, TagError)>>>;

/// Caches the public field list of every record type it has seen.
///
/// Entries are computed at most once per type and never evicted: the set of
/// record types in a program is fixed. Parsing happens outside the map lock,
/// and a type's list becomes visible only once complete.
#[derive(Debug, Default)]
pub struct Registry {
    cache: RwLock<HashMap<TypeId, Entry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by [`decode()`](crate::decode()).
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    /// Returns the public fields of a record type in declaration order.
    pub fn fields(&self, ty: &TypeDesc) -> Result<Arc<[FieldInfo]>, DecodeError> {
        match ty {
            TypeDesc::Record(record) => self.record_fields(record),
            other => Err(DecodeError::NotARecord(other.clone())),
        }
    }

    pub fn record_fields(&self, record: &RecordType) -> Result<Arc<[FieldInfo]>, DecodeError> {
        let entry = self.entry(record.id());
        entry
            .get_or_init(|| introspect(record))
            .clone()
            .map_err(|(field, source)| DecodeError::Tag {
                record: record.name(),
                field,
                source,
            })
    }

    /// Number of record types cached so far.
    pub fn len(&self) -> usize {
        let guard = match self.cache.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("record cache read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, id: TypeId) -> Entry {
        {
            let guard = match self.cache.read() {
                Ok(g) => g,
                Err(poisoned) => {
                    tracing::warn!("record cache read lock was poisoned, recovering");
                    poisoned.into_inner()
                }
            };
            if let Some(entry) = guard.get(&id) {
                return Arc::clone(entry);
            }
        }

        let mut guard = match self.cache.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("record cache write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        Arc::clone(guard.entry(id).or_default())
    }
}

fn introspect(record: &RecordType) -> Result<Arc<[FieldInfo]>, (&'static str, TagError)> {
    let mut fields = Vec::new();

    for (index, raw) in record.raw_fields().into_iter().enumerate() {
        if !raw.public {
            continue;
        }

        let tags = parse_tags(raw.tag).map_err(|source| (raw.name, source))?;
        let ty = (raw.ty)();

        fields.push(FieldInfo {
            index,
            name: raw.name,
            kind: ty.kind(),
            ty,
            tags,
            embedded: raw.embedded,
        });
    }

    tracing::debug!(
        record = record.name(),
        fields = fields.len(),
        "introspected record type"
    );
    Ok(fields.into())
}
