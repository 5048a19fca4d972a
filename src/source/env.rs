//! Environment variable source.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::decode::{Decoded, ValueSource};
use crate::error::SourceError;
use crate::registry::FieldInfo;
use crate::types::TypeDesc;
use crate::value::{SeqValue, Value};

use super::FieldError;

/// The tag naming a field's environment variable.
pub const ENV_TAG: &str = "env";

/// Reads fields from environment variables named by their `env` tag.
///
/// With a prefix, the variable for `env:"PORT"` is `<prefix><separator>PORT`.
/// Record fields descend with the prefix extended by their own tag, so
/// `APP__DB__HOST` fills `db.host` for prefix `APP` and separator `__`.
///
/// Values are parsed according to the field's declared type. Fields of the
/// dynamic [`Value`] type are coerced to the most specific type: boolean,
/// integer, float, or string (fallback). Sequences are comma separated.
///
/// The environment is captured once, when the source is created.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
    separator: String,
    vars: Arc<HashMap<String, String>>,
}

impl EnvSource {
    /// Captures the current process environment.
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self::from_vars(prefix, separator, std::env::vars())
    }

    /// Uses the given variables instead of the process environment.
    pub fn from_vars<K, V>(
        prefix: impl Into<String>,
        separator: impl Into<String>,
        vars: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let separator = separator.into();
        assert!(!separator.is_empty(), "separator must not be empty");
        Self {
            prefix: prefix.into(),
            separator,
            vars: Arc::new(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn var_name(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}{}", self.prefix, self.separator, key)
        }
    }

    fn nested(&self, prefix: String) -> Self {
        Self {
            prefix,
            separator: self.separator.clone(),
            vars: Arc::clone(&self.vars),
        }
    }

    /// Whether any captured variable lives under this source's prefix.
    fn has_vars(&self) -> bool {
        if self.prefix.is_empty() {
            return !self.vars.is_empty();
        }
        let scope = format!("{}{}", self.prefix, self.separator);
        self.vars.keys().any(|key| key.starts_with(&scope))
    }
}

impl ValueSource for EnvSource {
    fn decode_field(&self, field: &FieldInfo) -> Result<Decoded<'_>, SourceError> {
        let key = field.tag(ENV_TAG);

        if field.ty().record().is_some() {
            let nested = match key {
                Some(key) => self.nested(self.var_name(key)),
                None if field.is_embedded() => self.clone(),
                None => return Ok(Decoded::Absent),
            };
            if !nested.has_vars() {
                return Ok(Decoded::Absent);
            }
            return Ok(Decoded::nested(nested));
        }

        let Some(key) = key else {
            return Ok(Decoded::Absent);
        };
        let var = self.var_name(key);
        match self.vars.get(&var) {
            Some(raw) => Ok(Decoded::Value(parse_var(&var, raw, field.ty())?)),
            None => Ok(Decoded::Absent),
        }
    }
}

fn parse_var(var: &str, raw: &str, ty: &TypeDesc) -> Result<Value, FieldError> {
    let invalid = || FieldError::Parse {
        var: var.to_string(),
        value: raw.to_string(),
        ty: ty.clone(),
    };

    Ok(match ty {
        TypeDesc::Bool => parse_bool(raw).map(Value::Bool).ok_or_else(invalid)?,
        TypeDesc::I8 => Value::I8(parse_num(raw).ok_or_else(invalid)?),
        TypeDesc::I16 => Value::I16(parse_num(raw).ok_or_else(invalid)?),
        TypeDesc::I32 => Value::I32(parse_num(raw).ok_or_else(invalid)?),
        TypeDesc::I64 => Value::I64(parse_num(raw).ok_or_else(invalid)?),
        TypeDesc::Isize => Value::Isize(parse_num(raw).ok_or_else(invalid)?),
        TypeDesc::U8 => Value::U8(parse_num(raw).ok_or_else(invalid)?),
        TypeDesc::U16 => Value::U16(parse_num(raw).ok_or_else(invalid)?),
        TypeDesc::U32 => Value::U32(parse_num(raw).ok_or_else(invalid)?),
        TypeDesc::U64 => Value::U64(parse_num(raw).ok_or_else(invalid)?),
        TypeDesc::Usize => Value::Usize(parse_num(raw).ok_or_else(invalid)?),
        TypeDesc::F32 => Value::F32(parse_num(raw).ok_or_else(invalid)?),
        TypeDesc::F64 => Value::F64(parse_num(raw).ok_or_else(invalid)?),
        TypeDesc::Char => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Value::Char(c),
                _ => return Err(invalid()),
            }
        }
        TypeDesc::String => Value::String(raw.to_string()),
        TypeDesc::Any => coerce_value(raw),
        TypeDesc::Pointer(inner) => parse_var(var, raw, inner)?,
        TypeDesc::Seq(elem) => {
            let items = if raw.trim().is_empty() {
                Vec::new()
            } else {
                raw.split(',')
                    .map(|item| parse_var(var, item.trim(), elem))
                    .collect::<Result<Vec<_>, _>>()?
            };
            Value::Seq(SeqValue {
                elem: elem.as_ref().clone(),
                items,
            })
        }
        TypeDesc::Map(..) | TypeDesc::Record(_) | TypeDesc::Opaque(_) => {
            return Err(FieldError::Unsupported {
                var: var.to_string(),
                ty: ty.clone(),
            })
        }
    })
}

fn parse_num<T: FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse().ok()
}

fn parse_bool(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn coerce_value(s: &str) -> Value {
    if let Some(b) = parse_bool(s) {
        return Value::Bool(b);
    }

    // Only plain integers: optional minus, then digits
    if looks_like_integer(s) {
        if let Ok(i) = s.parse::<i64>() {
            return Value::I64(i);
        }
    }

    if s.contains('.') {
        if let Ok(f) = s.parse::<f64>() {
            return Value::F64(f);
        }
    }

    Value::String(s.to_string())
}

fn looks_like_integer(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
