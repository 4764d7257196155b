//! Dynamic attribute value type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A destination-shaped attribute tree keyed by destination field names.
///
/// `BTreeMap` keeps field order stable, so diffs and payloads are
/// reproducible across runs.
pub type Attributes = BTreeMap<String, AttrValue>;

/// A dynamic attribute value.
///
/// This mirrors the JSON data model used by the destination API. Numbers
/// keep their integer/float distinction so byte counts stay exact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (full i64 range).
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Text string.
    Text(String),
    /// Ordered array of values.
    Array(Vec<AttrValue>),
    /// Nested object.
    Map(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    /// Returns true if the value carries no information.
    ///
    /// Null, blank text and empty containers are all empty. The diff engine
    /// reports a field as `new` when the destination holds an empty value.
    pub fn is_empty(&self) -> bool {
        match self {
            AttrValue::Null => true,
            AttrValue::Text(s) => s.trim().is_empty(),
            AttrValue::Array(items) => items.is_empty(),
            AttrValue::Map(fields) => fields.is_empty(),
            AttrValue::Bool(_) | AttrValue::Integer(_) | AttrValue::Float(_) => false,
        }
    }

    /// Returns the text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the map content, if this is a map value.
    pub fn as_map(&self) -> Option<&BTreeMap<String, AttrValue>> {
        match self {
            AttrValue::Map(fields) => Some(fields),
            _ => None,
        }
    }

    /// Interprets the value as an integer.
    ///
    /// Numeric text (as some APIs return byte counts) is parsed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Integer(n) => Some(*n),
            AttrValue::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                // Whole floats within range compare equal to integers.
                if *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            AttrValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interprets the value as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Integer(n) => Some(*n as f64),
            AttrValue::Float(f) => Some(*f),
            AttrValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interprets the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            AttrValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, AttrValue::Integer(_) | AttrValue::Float(_))
    }

    /// Type-aware comparison of a desired value against a current one.
    ///
    /// - numbers compare numerically, even when one side is numeric text
    /// - booleans accept `"true"`/`"false"` text
    /// - text compares trimmed and case-insensitively
    /// - arrays compare element-for-element
    /// - maps compare only the keys present on `self`; extra keys on the
    ///   current side (server-assigned ids and the like) are ignored
    pub fn matches(&self, current: &AttrValue) -> bool {
        match (self, current) {
            (AttrValue::Map(desired), AttrValue::Map(actual)) => {
                desired.iter().all(|(key, value)| match actual.get(key) {
                    Some(existing) => value.matches(existing),
                    None => value.is_empty(),
                })
            }
            (AttrValue::Array(desired), AttrValue::Array(actual)) => {
                desired.len() == actual.len()
                    && desired.iter().zip(actual).all(|(d, a)| d.matches(a))
            }
            (AttrValue::Bool(b), other) | (other, AttrValue::Bool(b)) => {
                other.as_bool() == Some(*b)
            }
            (a, b) if a.is_numeric() || b.is_numeric() => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => x == y,
                _ => match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => x == y,
                    _ => false,
                },
            },
            (AttrValue::Text(a), AttrValue::Text(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
            (a, b) => a.is_empty() && b.is_empty(),
        }
    }
}

/// Looks up a dotted path (`operating_system.os`) in an attribute tree.
pub fn lookup_path<'a>(attrs: &'a Attributes, path: &str) -> Option<&'a AttrValue> {
    let mut segments = path.split('.');
    let mut current = attrs.get(segments.next()?)?;
    for segment in segments {
        current = current.as_map()?.get(segment)?;
    }
    Some(current)
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Null => write!(f, "null"),
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::Integer(n) => write!(f, "{n}"),
            AttrValue::Float(x) => write!(f, "{x}"),
            AttrValue::Text(s) => write!(f, "{s}"),
            AttrValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            AttrValue::Map(fields) => {
                write!(f, "{{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        AttrValue::Integer(n)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<f64> for AttrValue {
    fn from(x: f64) -> Self {
        AttrValue::Float(x)
    }
}

impl From<Attributes> for AttrValue {
    fn from(fields: Attributes) -> Self {
        AttrValue::Map(fields)
    }
}

impl From<Vec<AttrValue>> for AttrValue {
    fn from(items: Vec<AttrValue>) -> Self {
        AttrValue::Array(items)
    }
}
