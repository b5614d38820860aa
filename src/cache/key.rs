//! Cache keys
//!
//! A query key is an ordered sequence of parts: a resource name followed by
//! its parameters, e.g. `["course", 42]`. Two keys are equal iff their
//! canonical serializations are equal; structured parts are rendered with
//! stable field ordering so `{page, limit}` and `{limit, page}` collide.

use serde_json::Value;
use std::fmt;

/// One segment of a [`QueryKey`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    /// Text part, typically the resource name
    Text(String),
    /// Integer part, typically an id
    Int(i64),
    /// Boolean part
    Bool(bool),
    /// Structured part, stored as its canonical JSON rendering
    Json(String),
}

impl KeyPart {
    /// Build a structured part from a JSON value.
    ///
    /// serde_json's default map is ordered, so serializing yields a canonical
    /// rendering with stable field order.
    pub fn json(value: &Value) -> Self {
        KeyPart::Json(value.to_string())
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::Text(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::Text(s)
    }
}

impl From<i64> for KeyPart {
    fn from(n: i64) -> Self {
        KeyPart::Int(n)
    }
}

impl From<i32> for KeyPart {
    fn from(n: i32) -> Self {
        KeyPart::Int(n as i64)
    }
}

impl From<u32> for KeyPart {
    fn from(n: u32) -> Self {
        KeyPart::Int(n as i64)
    }
}

impl From<bool> for KeyPart {
    fn from(b: bool) -> Self {
        KeyPart::Bool(b)
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Text(s) => write!(f, "{:?}", s),
            KeyPart::Int(n) => write!(f, "{}", n),
            KeyPart::Bool(b) => write!(f, "{}", b),
            KeyPart::Json(j) => write!(f, "{}", j),
        }
    }
}

/// Canonical identifier for a cached resource instance
///
/// Immutable once constructed. A key is a prefix of another when its parts
/// form a leading subsequence, which is what `invalidate_prefix` matches on:
/// `["courses"]` covers every paginated course-list key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QueryKey {
    parts: Vec<KeyPart>,
}

impl QueryKey {
    /// Create an empty key; chain [`QueryKey::part`] to build it up
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// Create a key from a list of parts
    pub fn from_parts(parts: impl IntoIterator<Item = KeyPart>) -> Self {
        Self {
            parts: parts.into_iter().collect(),
        }
    }

    /// Append a part
    pub fn part(mut self, part: impl Into<KeyPart>) -> Self {
        self.parts.push(part.into());
        self
    }

    /// The key's parts, in order
    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    /// True when `prefix`'s parts are a leading subsequence of this key's
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.parts.len() >= prefix.parts.len()
            && self.parts[..prefix.parts.len()] == prefix.parts[..]
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", part)?;
        }
        write!(f, "]")
    }
}
