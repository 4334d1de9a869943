//! Host-side dynamic values.

use bytes::Bytes;

use crate::error::TypeError;

/// A value in the host language's dynamic value model.
///
/// Column values and output parameters are produced in this form, and
/// bound parameter values are read from it.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// Absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Native integer.
    Int(i64),
    /// Double-precision float.
    Double(f64),
    /// Binary-safe byte string.
    Str(Bytes),
    /// Ordered list.
    List(Vec<HostValue>),
    /// Keyed map, in insertion order.
    Map(Vec<(String, HostValue)>),
}

impl HostValue {
    /// Build a string value from anything byte-like.
    pub fn string(bytes: impl Into<Bytes>) -> Self {
        Self::Str(bytes.into())
    }

    /// Check if the value is absent.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the host type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::Str(_) => "string",
            Self::List(_) => "array",
            Self::Map(_) => "map",
        }
    }

    /// True for lists and maps.
    #[must_use]
    pub fn is_compound(&self) -> bool {
        matches!(self, Self::List(_) | Self::Map(_))
    }

    /// Get the value as an i64, if it is an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as an f64, if it is a double.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the raw bytes of a string value.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Get a string value as UTF-8 text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Host truthiness.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(v) => *v,
            Self::Int(v) => *v != 0,
            Self::Double(v) => *v != 0.0,
            Self::Str(v) => !(v.is_empty() || v.as_ref() == b"0"),
            Self::List(v) => !v.is_empty(),
            Self::Map(v) => !v.is_empty(),
        }
    }

    /// Coerce to an integer the way the host does for integer-hinted
    /// parameters.
    ///
    /// Doubles truncate toward zero (saturating), strings yield their
    /// leading numeric prefix, compound values yield 0 or 1 by emptiness.
    #[must_use]
    pub fn coerce_to_int(&self) -> i64 {
        match self {
            Self::Null => 0,
            Self::Bool(v) => i64::from(*v),
            Self::Int(v) => *v,
            Self::Double(v) => truncate_double(*v),
            Self::Str(v) => parse_leading_number(v),
            Self::List(_) | Self::Map(_) => i64::from(self.is_truthy()),
        }
    }

    /// Coerce to a byte string.
    ///
    /// `true` becomes `"1"` and `false` the empty string; doubles use the
    /// shortest representation that round-trips.
    pub fn coerce_to_string(&self) -> Result<Bytes, TypeError> {
        let text = match self {
            Self::Null => return Ok(Bytes::new()),
            Self::Bool(true) => return Ok(Bytes::from_static(b"1")),
            Self::Bool(false) => return Ok(Bytes::new()),
            Self::Str(v) => return Ok(v.clone()),
            Self::Int(v) => v.to_string(),
            Self::Double(v) => format_double(*v),
            Self::List(_) | Self::Map(_) => {
                return Err(TypeError::UnsupportedConversion {
                    from: self.type_name(),
                    to: "string",
                });
            }
        };
        Ok(Bytes::from(text))
    }
}

fn truncate_double(v: f64) -> i64 {
    if v.is_nan() { 0 } else { v as i64 }
}

fn format_double(v: f64) -> String {
    if v.is_nan() {
        "NAN".to_string()
    } else if v.is_infinite() {
        let text = if v > 0.0 { "INF" } else { "-INF" };
        text.to_string()
    } else {
        v.to_string()
    }
}

fn parse_leading_number(bytes: &[u8]) -> i64 {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim_start();

    let end = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(trimmed.len(), |(i, _)| i);
    let int_part = &trimmed[..end];

    // "1.5e3" and friends go through the float parser
    if let Ok(v) = trimmed.trim_end().parse::<f64>() {
        if trimmed[end..].starts_with(['.', 'e', 'E']) {
            return truncate_double(v);
        }
    }

    match int_part.parse::<i64>() {
        Ok(v) => v,
        Err(_) if int_part.len() > 1 => {
            // out of range, saturate like the float path
            int_part.parse::<f64>().map_or(0, truncate_double)
        }
        Err(_) => 0,
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for HostValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        Self::Str(Bytes::copy_from_slice(v.as_bytes()))
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        Self::Str(Bytes::from(v))
    }
}

impl From<Bytes> for HostValue {
    fn from(v: Bytes) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<u8>> for HostValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Str(Bytes::from(v))
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Declared host type of a bound parameter.
///
/// `Variant` lets the value's own type decide how it is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamType {
    /// Explicit null.
    Null,
    /// Boolean.
    Bool,
    /// Integer.
    Int,
    /// String; the host's default hint.
    #[default]
    Str,
    /// Large object.
    Lob,
    /// A statement handle; never bindable.
    Stmt,
    /// No declared type.
    Variant,
}
