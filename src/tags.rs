//! Field tag parsing.
//!
//! A tag is the raw metadata string attached to a record field: a run of
//! space separated `name:"value"` pairs such as `env:"HOME" map:"home"`.
//! Values are double-quoted literals using the usual backslash escapes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::Chars;

use thiserror::Error;

/// A grammar violation found while parsing a tag string.
///
/// Every variant keeps the complete raw tag so the offending field can be
/// found without a stack trace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TagError {
    #[error("malformed tag: missing tag name on tag string: '{tag}'")]
    MissingName { tag: String },

    #[error("malformed tag: expected tag value but got empty string on tag string: '{tag}'")]
    MissingValue { tag: String },

    #[error("malformed tag: invalid character detected: '{byte}' on tag string: '{tag}'")]
    InvalidCharacter { byte: u8, tag: String },

    #[error("malformed tag: missing quotes right after tag name in tag string: '{tag}'")]
    MissingQuotes { tag: String },

    #[error("malformed tag: missing end quote on a tag value in tag string: '{tag}'")]
    MissingEndQuote { tag: String },
}

impl TagError {
    /// The raw tag string that failed to parse.
    pub fn tag(&self) -> &str {
        match self {
            TagError::MissingName { tag }
            | TagError::MissingValue { tag }
            | TagError::InvalidCharacter { tag, .. }
            | TagError::MissingQuotes { tag }
            | TagError::MissingEndQuote { tag } => tag,
        }
    }
}

/// Parsed tags of a single field, keyed by tag name.
///
/// When a name appears more than once in the raw string the last
/// occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    entries: BTreeMap<String, String>,
}

impl Tags {
    /// Returns the value of the tag called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert(&mut self, name: &str, value: String) {
        self.entries.insert(name.to_string(), value);
    }
}

/// Renders the tags back into tag-string form, e.g. `env:"HOME" map:"home"`.
impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{name}:{}", quote(value))?;
        }
        Ok(())
    }
}

/// Parses a raw tag string into its `name -> value` pairs.
///
/// This is a single left-to-right scan with no backtracking. A value whose
/// quoted literal cannot be unescaped is dropped silently and scanning
/// continues after its closing quote.
pub fn parse_tags(raw: &str) -> Result<Tags, TagError> {
    let mut tags = Tags::default();
    let mut rest = raw;

    while !rest.is_empty() {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }

        // Scan to colon. A space, a quote or a control character ends the name.
        let bytes = rest.as_bytes();
        let mut i = 0;
        while i < bytes.len()
            && bytes[i] > b' '
            && bytes[i] != b':'
            && bytes[i] != b'"'
            && bytes[i] != 0x7f
        {
            i += 1;
        }
        if i == 0 {
            return Err(TagError::MissingName {
                tag: raw.to_string(),
            });
        }
        if i + 1 >= bytes.len() {
            return Err(TagError::MissingValue {
                tag: raw.to_string(),
            });
        }
        if bytes[i] != b':' {
            return Err(TagError::InvalidCharacter {
                byte: bytes[i],
                tag: raw.to_string(),
            });
        }
        if bytes[i + 1] != b'"' {
            return Err(TagError::MissingQuotes {
                tag: raw.to_string(),
            });
        }
        let name = &rest[..i];
        rest = &rest[i + 1..];

        // Scan the quoted value; a backslash skips the byte after it.
        let bytes = rest.as_bytes();
        let mut i = 1;
        while i < bytes.len() && bytes[i] != b'"' {
            if bytes[i] == b'\\' {
                i += 1;
            }
            i += 1;
        }
        if i >= bytes.len() {
            return Err(TagError::MissingEndQuote {
                tag: raw.to_string(),
            });
        }
        let quoted = &rest[..=i];
        rest = &rest[i + 1..];

        if let Some(value) = unquote(quoted) {
            tags.insert(name, value);
        }
    }

    Ok(tags)
}

/// Decodes a double-quoted literal, returning `None` if it is not valid.
fn unquote(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        match c {
            '\n' | '"' => return None,
            '\\' => match chars.next()? {
                'a' => out.push(0x07),
                'b' => out.push(0x08),
                'f' => out.push(0x0c),
                'n' => out.push(b'\n'),
                'r' => out.push(b'\r'),
                't' => out.push(b'\t'),
                'v' => out.push(0x0b),
                '\\' => out.push(b'\\'),
                '"' => out.push(b'"'),
                'x' => out.push(u8::try_from(digits(&mut chars, 2, 16)?).ok()?),
                'u' => push_char(&mut out, char::from_u32(digits(&mut chars, 4, 16)?)?),
                'U' => push_char(&mut out, char::from_u32(digits(&mut chars, 8, 16)?)?),
                first @ '0'..='7' => {
                    let high = first.to_digit(8)?;
                    let low = digits(&mut chars, 2, 8)?;
                    out.push(u8::try_from(high * 64 + low).ok()?);
                }
                _ => return None,
            },
            c => push_char(&mut out, c),
        }
    }

    String::from_utf8(out).ok()
}

fn digits(chars: &mut Chars<'_>, count: usize, radix: u32) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..count {
        value = value * radix + chars.next()?.to_digit(radix)?;
    }
    Some(value)
}

fn push_char(out: &mut Vec<u8>, c: char) {
    let mut buf = [0; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() && (c as u32) < 0x80 => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
