//! Value and result item types
//!
//! A query or lookup yields a stream of [`Item`]s. An item is either a whole
//! [`Document`] (content plus metadata) or an atomic [`Value`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Namespace URI under which every document carries its built-in `name`
/// metadata entry.
pub const NAME_METADATA_URI: &str = "http://docshell.dev/metadata";

/// Name of the built-in metadata entry holding the document name.
pub const NAME_METADATA_NODE: &str = "name";

/// Atomic value produced by expressions or stored as metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// UTF-8 string
    String(String),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// Boolean
    Bool(bool),
}

impl Value {
    /// Name of the value's type, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Int(_) => "integer",
            Value::Float(_) => "double",
            Value::Bool(_) => "boolean",
        }
    }

    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

/// Qualified metadata key: namespace URI plus local name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetadataKey {
    /// Namespace URI (may be empty)
    pub uri: String,
    /// Local name
    pub name: String,
}

impl MetadataKey {
    /// Build a key from its parts
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
        }
    }
}

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document name, unique within its container
    pub name: String,
    /// Raw document text
    pub content: String,
    /// User metadata (the built-in name entry is not stored here)
    #[serde(default, with = "metadata_list")]
    pub metadata: BTreeMap<MetadataKey, Value>,
}

impl Document {
    /// Create a document without metadata
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Look up a metadata value, including the built-in name entry
    pub fn metadata_value(&self, uri: &str, name: &str) -> Option<Value> {
        if uri == NAME_METADATA_URI && name == NAME_METADATA_NODE {
            return Some(Value::String(self.name.clone()));
        }
        self.metadata.get(&MetadataKey::new(uri, name)).cloned()
    }

    /// All metadata entries, built-in name first
    pub fn metadata_entries(&self) -> Vec<(MetadataKey, Value)> {
        let mut entries = vec![(
            MetadataKey::new(NAME_METADATA_URI, NAME_METADATA_NODE),
            Value::String(self.name.clone()),
        )];
        entries.extend(self.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        entries
    }
}

/// Metadata maps serialize as a list of entries since their keys are not strings
mod metadata_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{MetadataKey, Value};

    #[derive(Serialize, Deserialize)]
    struct Entry {
        uri: String,
        name: String,
        value: Value,
    }

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<MetadataKey, Value>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let entries: Vec<Entry> = map
            .iter()
            .map(|(k, v)| Entry {
                uri: k.uri.clone(),
                name: k.name.clone(),
                value: v.clone(),
            })
            .collect();
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<MetadataKey, Value>, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        Ok(entries
            .into_iter()
            .map(|e| (MetadataKey::new(e.uri, e.name), e.value))
            .collect())
    }
}

/// One element of a result stream
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// A whole document
    Document(Document),
    /// An atomic value
    Value(Value),
}

impl Item {
    /// String value of the item: document content or the value's text
    pub fn string_value(&self) -> String {
        match self {
            Item::Document(doc) => doc.content.clone(),
            Item::Value(v) => v.to_string(),
        }
    }

    /// The document, when the item is one
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Item::Document(doc) => Some(doc),
            Item::Value(_) => None,
        }
    }
}
