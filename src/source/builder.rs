use std::fmt;
use std::path::{Path, PathBuf};

use crate::decode::ValueSource;
use crate::reflect::Record;
use crate::registry::Registry;

use super::{EnvSource, FileSource, LoadError};

/// A source in the loading pipeline.
enum Layer {
    File { path: PathBuf, required: bool },
    Env { prefix: String, separator: String },
    Source(Box<dyn ValueSource>),
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::File { path, required } => f
                .debug_struct("File")
                .field("path", path)
                .field("required", required)
                .finish(),
            Layer::Env { prefix, separator } => f
                .debug_struct("Env")
                .field("prefix", prefix)
                .field("separator", separator)
                .finish(),
            Layer::Source(_) => f.write_str("Source(..)"),
        }
    }
}

/// Builder for filling a record from several sources.
///
/// Sources are decoded in registration order onto the same record, so later
/// sources override the fields earlier ones set. Fields a source has no
/// value for keep whatever the previous layers left.
///
/// ## Example
///
/// ```no_run
/// use structscan::{Loader, Record};
///
/// #[derive(Debug, Clone, PartialEq, Record)]
/// pub struct MyConfig {
///     #[tag = r#"toml:"name" env:"NAME""#]
///     pub name: String,
///     #[tag = r#"toml:"port" env:"PORT""#]
///     pub port: u16,
/// }
///
/// // defaults -> env overrides -> local file overrides env
/// let config: MyConfig = Loader::new()
///     .with_file("config/default.toml", true)
///     .with_env("MYAPP", "__")
///     .with_file("config/local.toml", false)
///     .load()?;
/// # Ok::<(), structscan::LoadError>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "loaders do nothing until .load() is called"]
pub struct Loader<'r> {
    layers: Vec<Layer>,
    registry: Option<&'r Registry>,
}

impl<'r> Loader<'r> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `registry` instead of the process-wide one.
    pub fn with_registry(mut self, registry: &'r Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Adds a TOML file to be loaded.
    ///
    /// If `required` is `true`, loading fails if the file doesn't exist.
    /// Optional files that are missing are silently skipped.
    pub fn with_file(mut self, path: impl AsRef<Path>, required: bool) -> Self {
        self.layers.push(Layer::File {
            path: path.as_ref().to_path_buf(),
            required,
        });
        self
    }

    /// Adds the process environment, read through [`EnvSource`].
    ///
    /// The environment is captured when [`load`](Self::load) runs.
    pub fn with_env(mut self, prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        self.layers.push(Layer::Env {
            prefix: prefix.into(),
            separator: separator.into(),
        });
        self
    }

    /// Adds an arbitrary source.
    pub fn with_source(mut self, source: impl ValueSource + 'static) -> Self {
        self.layers.push(Layer::Source(Box::new(source)));
        self
    }

    /// Decodes every layer onto a zero-valued `R`.
    pub fn load<R: Record>(self) -> Result<R, LoadError> {
        let mut target = R::zero();
        self.load_into(&mut target)?;
        Ok(target)
    }

    /// Decodes every layer onto an existing record.
    pub fn load_into<R: Record>(self, target: &mut R) -> Result<(), LoadError> {
        let registry = match self.registry {
            Some(registry) => registry,
            None => Registry::global(),
        };

        for layer in self.layers {
            tracing::debug!(record = R::record_type().name(), layer = ?layer, "applying layer");
            match layer {
                Layer::File { path, required } => {
                    let source = FileSource::load(&path, required)?;
                    registry.decode(target, &source)?;
                }
                Layer::Env { prefix, separator } => {
                    registry.decode(target, &EnvSource::new(prefix, separator))?;
                }
                Layer::Source(source) => {
                    registry.decode(target, source.as_ref())?;
                }
            }
        }

        Ok(())
    }
}
