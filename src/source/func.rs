use std::fmt;

use crate::decode::{Decoded, ValueSource};
use crate::error::SourceError;
use crate::registry::FieldInfo;

/// Adapts a closure into a [`ValueSource`], for sources without state of
/// their own.
///
/// ```
/// use structscan::{decode, Decoded, FieldInfo, FuncSource, Record};
///
/// #[derive(Debug, Clone, PartialEq, Record)]
/// pub struct Paths {
///     #[tag = r#"env:"HOME""#]
///     pub home: String,
/// }
///
/// let source = FuncSource::new(|field: &FieldInfo| {
///     Ok(match field.tag("env") {
///         Some("HOME") => Decoded::value("/home/gopher"),
///         _ => Decoded::Absent,
///     })
/// });
///
/// let mut paths = Paths { home: String::new() };
/// decode(&mut paths, &source)?;
/// assert_eq!(paths.home, "/home/gopher");
/// # Ok::<(), structscan::DecodeError>(())
/// ```
pub struct FuncSource<F> {
    func: F,
}

impl<F> FuncSource<F>
where
    F: Fn(&FieldInfo) -> Result<Decoded<'static>, SourceError>,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> ValueSource for FuncSource<F>
where
    F: Fn(&FieldInfo) -> Result<Decoded<'static>, SourceError>,
{
    fn decode_field(&self, field: &FieldInfo) -> Result<Decoded<'_>, SourceError> {
        (self.func)(field)
    }
}

impl<F> fmt::Debug for FuncSource<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncSource").finish_non_exhaustive()
    }
}
