//! Index descriptor grammar
//!
//! An index descriptor is a single hyphen-separated token:
//!
//! ```text
//! [unique-]{path}-{node}-{key}-{syntax}
//! ```
//!
//! | Part | Values |
//! |------|--------|
//! | path | `node`, `edge` |
//! | node | `element`, `attribute`, `metadata` |
//! | key | `presence`, `equality`, `substring` |
//! | syntax | `none`, `string`, `anyURI`, `boolean`, `date`, `dateTime`, `decimal`, `double`, `float`, `integer`, `time`, `untypedAtomic` |
//!
//! Rules: `presence` pairs only with `none`; `equality` and `substring` need a
//! real syntax; `substring` needs `string`. Parsing is case-insensitive and
//! [`IndexDescriptor`]'s `Display` prints the canonical spelling.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Whether an index enforces one document per key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Uniqueness {
    /// Keys may repeat
    NonUnique,
    /// Each key maps to at most one document
    Unique,
}

/// How the indexed node is located
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathType {
    /// The node alone
    Node,
    /// The node together with its parent
    Edge,
}

/// Kind of node being indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// Element text
    Element,
    /// Attribute value
    Attribute,
    /// Document metadata
    Metadata,
}

/// What the index records for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// Only that the node exists
    Presence,
    /// The full value
    Equality,
    /// Substrings of the value
    Substring,
}

/// Value syntax keys are compared in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyntaxType {
    /// No value (presence indexes)
    None,
    /// Plain string
    String,
    /// URI
    AnyUri,
    /// true/false
    Boolean,
    /// Calendar date
    Date,
    /// Date and time
    DateTime,
    /// Exact decimal
    Decimal,
    /// Double precision
    Double,
    /// Single precision
    Float,
    /// Integer
    Integer,
    /// Time of day
    Time,
    /// Untyped text
    UntypedAtomic,
}

impl SyntaxType {
    const ALL: [SyntaxType; 12] = [
        SyntaxType::None,
        SyntaxType::String,
        SyntaxType::AnyUri,
        SyntaxType::Boolean,
        SyntaxType::Date,
        SyntaxType::DateTime,
        SyntaxType::Decimal,
        SyntaxType::Double,
        SyntaxType::Float,
        SyntaxType::Integer,
        SyntaxType::Time,
        SyntaxType::UntypedAtomic,
    ];

    /// Canonical spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            SyntaxType::None => "none",
            SyntaxType::String => "string",
            SyntaxType::AnyUri => "anyURI",
            SyntaxType::Boolean => "boolean",
            SyntaxType::Date => "date",
            SyntaxType::DateTime => "dateTime",
            SyntaxType::Decimal => "decimal",
            SyntaxType::Double => "double",
            SyntaxType::Float => "float",
            SyntaxType::Integer => "integer",
            SyntaxType::Time => "time",
            SyntaxType::UntypedAtomic => "untypedAtomic",
        }
    }

    /// Keys of this syntax compare as numbers
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SyntaxType::Decimal | SyntaxType::Double | SyntaxType::Float | SyntaxType::Integer
        )
    }
}

impl fmt::Display for Uniqueness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Uniqueness::NonUnique => "non-unique",
            Uniqueness::Unique => "unique",
        })
    }
}

impl fmt::Display for PathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PathType::Node => "node",
            PathType::Edge => "edge",
        })
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeType::Element => "element",
            NodeType::Attribute => "attribute",
            NodeType::Metadata => "metadata",
        })
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyType::Presence => "presence",
            KeyType::Equality => "equality",
            KeyType::Substring => "substring",
        })
    }
}

impl fmt::Display for SyntaxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed index descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Uniqueness constraint
    pub uniqueness: Uniqueness,
    /// Path type
    pub path: PathType,
    /// Node type
    pub node: NodeType,
    /// Key type
    pub key: KeyType,
    /// Value syntax
    pub syntax: SyntaxType,
}

impl IndexDescriptor {
    /// Parse a descriptor, returning `None` when it does not follow the grammar
    pub fn parse(text: &str) -> Option<Self> {
        let lower = text.trim().to_ascii_lowercase();
        let mut parts: Vec<&str> = lower.split('-').collect();

        let uniqueness = if parts.first() == Some(&"unique") {
            parts.remove(0);
            Uniqueness::Unique
        } else {
            Uniqueness::NonUnique
        };
        if parts.len() != 4 {
            return None;
        }

        let path = match parts[0] {
            "node" => PathType::Node,
            "edge" => PathType::Edge,
            _ => return None,
        };
        let node = match parts[1] {
            "element" => NodeType::Element,
            "attribute" => NodeType::Attribute,
            "metadata" => NodeType::Metadata,
            _ => return None,
        };
        let key = match parts[2] {
            "presence" => KeyType::Presence,
            "equality" => KeyType::Equality,
            "substring" => KeyType::Substring,
            _ => return None,
        };
        let syntax = SyntaxType::ALL
            .iter()
            .copied()
            .find(|s| s.as_str().eq_ignore_ascii_case(parts[3]))?;

        match (key, syntax) {
            (KeyType::Presence, SyntaxType::None) => {}
            (KeyType::Presence, _) | (_, SyntaxType::None) => return None,
            (KeyType::Substring, SyntaxType::String) => {}
            (KeyType::Substring, _) => return None,
            _ => {}
        }

        Some(Self {
            uniqueness,
            path,
            node,
            key,
            syntax,
        })
    }

    /// True when `text` is a well-formed descriptor
    pub fn is_valid(text: &str) -> bool {
        Self::parse(text).is_some()
    }

    /// Whether the index is unique
    pub fn is_unique(&self) -> bool {
        self.uniqueness == Uniqueness::Unique
    }
}

impl FromStr for IndexDescriptor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::InvalidIndex {
            descriptor: s.to_string(),
        })
    }
}

impl fmt::Display for IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unique() {
            f.write_str("unique-")?;
        }
        write!(f, "{}-{}-{}-{}", self.path, self.node, self.key, self.syntax)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_descriptor() {
        let d = IndexDescriptor::parse("unique-node-metadata-equality-string").unwrap();
        assert_eq!(d.uniqueness, Uniqueness::Unique);
        assert_eq!(d.path, PathType::Node);
        assert_eq!(d.node, NodeType::Metadata);
        assert_eq!(d.key, KeyType::Equality);
        assert_eq!(d.syntax, SyntaxType::String);
    }

    #[test]
    fn test_parse_is_case_insensitive_and_canonicalises() {
        let d = IndexDescriptor::parse("Edge-Element-Equality-AnyUri").unwrap();
        assert_eq!(d.to_string(), "edge-element-equality-anyURI");
    }

    #[test]
    fn test_presence_requires_none() {
        assert!(IndexDescriptor::is_valid("node-element-presence-none"));
        assert!(!IndexDescriptor::is_valid("node-element-presence-string"));
        assert!(!IndexDescriptor::is_valid("node-element-equality-none"));
    }

    #[test]
    fn test_substring_requires_string() {
        assert!(IndexDescriptor::is_valid("node-attribute-substring-string"));
        assert!(!IndexDescriptor::is_valid("node-attribute-substring-double"));
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            "",
            "node",
            "node-element-equality",
            "unique-unique-node-element-equality-string",
            "tree-element-equality-string",
            "node-comment-equality-string",
            "node-element-range-string",
            "node-element-equality-blob",
            "node-element-equality-string-extra",
        ] {
            assert!(!IndexDescriptor::is_valid(bad), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_from_str_error() {
        let err = "bogus".parse::<IndexDescriptor>().unwrap_err();
        assert!(matches!(err, Error::InvalidIndex { .. }));
    }

    #[test]
    fn test_numeric_syntax() {
        assert!(SyntaxType::Decimal.is_numeric());
        assert!(!SyntaxType::String.is_numeric());
    }
}
