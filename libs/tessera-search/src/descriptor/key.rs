use std::fmt;

use serde_json::Value as JsonValue;
use uuid::Uuid;

/// One component of a document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Int(i64),
    Uuid(Uuid),
    Text(String),
}

impl KeyValue {
    /// Key component from a serialized document value. Null yields `None`.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Null => None,
            JsonValue::Number(n) => Some(match n.as_i64() {
                Some(i) => KeyValue::Int(i),
                None => KeyValue::Text(n.to_string()),
            }),
            JsonValue::String(s) => Some(KeyValue::Text(s.clone())),
            JsonValue::Bool(b) => Some(KeyValue::Text(b.to_string())),
            other => Some(KeyValue::Text(other.to_string())),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Int(i) => write!(f, "{}", i),
            KeyValue::Uuid(u) => write!(f, "{}", u),
            KeyValue::Text(s) => f.write_str(s),
        }
    }
}

macro_rules! key_value_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for KeyValue {
                fn from(value: $ty) -> Self {
                    KeyValue::Int(i64::from(value))
                }
            }
        )*
    };
}

key_value_from_int!(i64, i32, i16, u32, u16);

impl From<Uuid> for KeyValue {
    fn from(value: Uuid) -> Self {
        KeyValue::Uuid(value)
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        KeyValue::Text(value)
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Text(value.to_string())
    }
}

impl From<&String> for KeyValue {
    fn from(value: &String) -> Self {
        KeyValue::Text(value.clone())
    }
}

/// Identifier of a document as handed to the index facade and loaders.
///
/// Composite identifiers are positional: the n-th value belongs to the key
/// field with key order `n + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentId {
    Single(KeyValue),
    Composite(Vec<Option<KeyValue>>),
}

impl DocumentId {
    pub fn as_single(&self) -> Option<&KeyValue> {
        match self {
            DocumentId::Single(v) => Some(v),
            DocumentId::Composite(_) => None,
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Single(v) => write!(f, "{}", v),
            DocumentId::Composite(values) => {
                f.write_str("(")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match v {
                        Some(v) => write!(f, "{}", v)?,
                        None => f.write_str("null")?,
                    }
                }
                f.write_str(")")
            }
        }
    }
}

macro_rules! document_id_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for DocumentId {
                fn from(value: $ty) -> Self {
                    DocumentId::Single(KeyValue::from(value))
                }
            }
        )*
    };
}

document_id_from_scalar!(i64, i32, i16, u32, u16, Uuid, String, &str, &String);

impl From<KeyValue> for DocumentId {
    fn from(value: KeyValue) -> Self {
        DocumentId::Single(value)
    }
}

impl<A: Into<KeyValue>, B: Into<KeyValue>> From<(A, B)> for DocumentId {
    fn from((a, b): (A, B)) -> Self {
        DocumentId::Composite(vec![Some(a.into()), Some(b.into())])
    }
}

impl<A: Into<KeyValue>, B: Into<KeyValue>, C: Into<KeyValue>> From<(A, B, C)> for DocumentId {
    fn from((a, b, c): (A, B, C)) -> Self {
        DocumentId::Composite(vec![Some(a.into()), Some(b.into()), Some(c.into())])
    }
}
