//! Handles, configuration and query option types shared by engine and shell

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::index::IndexDescriptor;
use crate::value::Value;

// ============================================================================
// Handles
// ============================================================================

/// Reference to an opened container
///
/// The shell only holds and orders these; all state lives in the engine.
/// An unnamed container has an empty name and exists only in memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle {
    /// Engine-assigned identifier, unique per open
    pub id: u64,
    /// Container name (empty for in-memory containers)
    pub name: String,
}

impl ContainerHandle {
    /// True for an unnamed, memory-only container
    pub fn is_in_memory(&self) -> bool {
        self.name.is_empty()
    }

    /// Name for display, substituting a placeholder for unnamed containers
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "(in-memory)"
        } else {
            &self.name
        }
    }
}

/// Identifier of an engine transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxnId(pub u64);

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// Optional engine features, fixed at construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Transactions may be begun, committed and aborted
    pub transactions: bool,
    /// Containers may be encrypted with a password
    pub encryption: bool,
}

// ============================================================================
// Containers
// ============================================================================

/// Physical storage layout of a container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerKind {
    /// Documents split into individually stored nodes
    #[default]
    NodeStorage,
    /// Documents stored whole
    WholeDocStorage,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContainerKind::NodeStorage => "node storage",
            ContainerKind::WholeDocStorage => "whole document storage",
        })
    }
}

/// Settings supplied when a container is created or opened
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Storage layout
    pub kind: ContainerKind,
    /// Index individual nodes rather than whole documents
    pub index_nodes: bool,
    /// Validate documents on insertion
    pub validate: bool,
}

impl ContainerConfig {
    /// Build a config from the shell's type letter: `n`, `in`, `d` or `id`
    ///
    /// The leading `i` switches node indexing on. Unknown letters yield
    /// `None`.
    pub fn from_type_flag(flag: &str, validate: bool) -> Option<Self> {
        let (kind, index_nodes) = match flag.to_ascii_lowercase().as_str() {
            "n" => (ContainerKind::NodeStorage, false),
            "in" => (ContainerKind::NodeStorage, true),
            "d" => (ContainerKind::WholeDocStorage, false),
            "id" => (ContainerKind::WholeDocStorage, true),
            _ => return None,
        };
        Some(Self {
            kind,
            index_nodes,
            validate,
        })
    }
}

/// Descriptive information about an open container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Container name
    pub name: String,
    /// Storage layout
    pub kind: ContainerKind,
    /// Node indexing on or off
    pub index_nodes: bool,
    /// Validation on insert
    pub validate: bool,
    /// Auto-indexing flag
    pub auto_indexing: bool,
    /// Attached aliases
    pub aliases: Vec<String>,
    /// Number of stored documents
    pub document_count: usize,
    /// Number of defined index descriptors
    pub index_count: usize,
    /// Whether the container was opened with transactions enabled
    pub transactional: bool,
}

/// One index declared on a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Namespace URI of the indexed node (may be empty)
    pub uri: String,
    /// Node name (may be empty for a default index)
    pub node: String,
    /// Parsed descriptor
    pub descriptor: IndexDescriptor,
}

/// Index statistics for a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyStatistics {
    /// Number of keys recorded
    pub indexed_keys: u64,
    /// Number of distinct keys
    pub unique_keys: u64,
    /// Total byte size of key values
    pub sum_key_value_size: u64,
}

// ============================================================================
// Query options
// ============================================================================

/// How query results are produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvaluationMode {
    /// Compute every result up front; the size is known
    #[default]
    Eager,
    /// Produce results on demand; the size is unknown until scanned
    Lazy,
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EvaluationMode::Eager => "Eager",
            EvaluationMode::Lazy => "Lazy",
        })
    }
}

/// Settings that shape query evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryContext {
    /// Evaluation mode
    pub mode: EvaluationMode,
    /// Document projection optimisation
    pub projection: bool,
    /// Timeout in seconds, 0 for none
    pub timeout_secs: u32,
    /// Namespace prefix bindings
    pub namespaces: BTreeMap<String, String>,
    /// External variable bindings
    pub variables: BTreeMap<String, Value>,
    /// Base URI for relative references
    pub base_uri: String,
    /// Container used by `collection()` without an argument
    pub default_collection: Option<ContainerHandle>,
}

// ============================================================================
// Index lookup
// ============================================================================

/// Comparison applied by an index lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOperation {
    /// `=`
    Equal,
    /// `<`
    LessThan,
    /// `<=` or `=<`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=` or `=>`
    GreaterThanOrEqual,
}

impl FromStr for LookupOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" | "==" => Ok(LookupOperation::Equal),
            "<" => Ok(LookupOperation::LessThan),
            "<=" | "=<" => Ok(LookupOperation::LessThanOrEqual),
            ">" => Ok(LookupOperation::GreaterThan),
            ">=" | "=>" => Ok(LookupOperation::GreaterThanOrEqual),
            other => Err(Error::InvalidInput {
                reason: format!("unknown lookup operation '{}'", other),
            }),
        }
    }
}

impl fmt::Display for LookupOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LookupOperation::Equal => "=",
            LookupOperation::LessThan => "<",
            LookupOperation::LessThanOrEqual => "<=",
            LookupOperation::GreaterThan => ">",
            LookupOperation::GreaterThanOrEqual => ">=",
        })
    }
}

/// A fully described index lookup
#[derive(Debug, Clone, PartialEq)]
pub struct IndexLookup {
    /// Index to consult
    pub descriptor: IndexDescriptor,
    /// Namespace URI of the node
    pub uri: String,
    /// Node name
    pub node: String,
    /// Parent `(uri, node)` for edge lookups
    pub parent: Option<(String, String)>,
    /// Comparison and operand; `None` returns every indexed document
    pub condition: Option<(LookupOperation, Value)>,
}

impl IndexLookup {
    /// Lookup of every document carrying the node
    pub fn new(descriptor: IndexDescriptor, uri: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            descriptor,
            uri: uri.into(),
            node: node.into(),
            parent: None,
            condition: None,
        }
    }

    /// Restrict to documents whose key satisfies `op value`
    pub fn with_condition(mut self, op: LookupOperation, value: Value) -> Self {
        self.condition = Some((op, value));
        self
    }

    /// Require the given parent element
    pub fn with_parent(mut self, uri: impl Into<String>, node: impl Into<String>) -> Self {
        self.parent = Some((uri.into(), node.into()));
        self
    }
}

/// Re-index mode for `reindex_container`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexMode {
    /// Index individual nodes
    IndexNodes,
    /// Index whole documents
    NoIndexNodes,
}
