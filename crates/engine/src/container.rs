//! In-memory container state and its JSON file format
//!
//! A named container lives in `<home>/<name>` as a single JSON document.
//! Unnamed containers never touch disk.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use docshell_core::{
    ContainerConfig, ContainerKind, Document, Error, IndexDescriptor, IndexEntry, KeyType,
    NodeType, PathType, Result, SyntaxType, NAME_METADATA_NODE, NAME_METADATA_URI,
};

use crate::keys;

/// Version written into every container file
pub const FORMAT_VERSION: u32 = 1;

/// Identity of a loaded container
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ContainerKey {
    /// Backed by `<home>/<name>`
    Named(String),
    /// Memory-only, identified by the handle that created it
    Memory(u64),
}

/// Everything stored in one container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerData {
    /// File format version
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    /// Container name
    pub name: String,
    /// Storage layout
    pub kind: ContainerKind,
    /// Node indexing
    pub index_nodes: bool,
    /// Validate documents on insert
    pub validate: bool,
    /// Auto-indexing flag
    #[serde(default)]
    pub auto_indexing: bool,
    /// Aliases usable in `collection()`
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Declared indexes
    #[serde(default)]
    pub indexes: Vec<IndexEntry>,
    /// Documents by name
    #[serde(default)]
    pub documents: BTreeMap<String, Document>,
}

fn default_format_version() -> u32 {
    FORMAT_VERSION
}

impl ContainerData {
    /// Empty container with the given settings
    pub fn new(name: &str, config: &ContainerConfig) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            name: name.to_string(),
            kind: config.kind,
            index_nodes: config.index_nodes,
            validate: config.validate,
            auto_indexing: false,
            aliases: Vec::new(),
            indexes: Vec::new(),
            documents: BTreeMap::new(),
        }
    }

    /// Read a container file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let data: ContainerData =
            serde_json::from_str(&content).map_err(|e| Error::Serialization {
                reason: format!("'{}': {}", path.display(), e),
            })?;
        debug!(target: "docshell::engine", path = %path.display(), documents = data.documents.len(), "Container loaded");
        Ok(data)
    }

    /// Write the container file, replacing any previous content
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(|e| Error::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(path, content)?;
        debug!(target: "docshell::engine", path = %path.display(), documents = self.documents.len(), "Container saved");
        Ok(())
    }

    /// True when the name or one of the aliases equals `name`
    pub fn answers_to(&self, name: &str) -> bool {
        (!self.name.is_empty() && self.name == name) || self.aliases.iter().any(|a| a == name)
    }

    /// Whether an index is declared, counting the built-in name index
    pub fn has_index(&self, uri: &str, node: &str, descriptor: &IndexDescriptor) -> bool {
        is_builtin_name_index(uri, node, descriptor)
            || self
                .indexes
                .iter()
                .any(|e| e.uri == uri && e.node == node && &e.descriptor == descriptor)
    }

    /// Reject `doc` if it would break a unique index
    ///
    /// `replacing` names a document being overwritten, whose keys do not count.
    pub fn check_unique(&self, doc: &Document, replacing: Option<&str>) -> Result<()> {
        for entry in self.indexes.iter().filter(|e| e.descriptor.is_unique()) {
            let new_keys = keys::extract(doc, &entry.descriptor, &entry.uri, &entry.node, None);
            if new_keys.is_empty() {
                continue;
            }
            for other in self.documents.values() {
                if Some(other.name.as_str()) == replacing || other.name == doc.name {
                    continue;
                }
                let existing = keys::extract(other, &entry.descriptor, &entry.uri, &entry.node, None);
                if let Some(dup) = new_keys.iter().find(|k| existing.contains(k)) {
                    return Err(Error::UniqueConstraint {
                        descriptor: entry.descriptor.to_string(),
                        key: dup.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Reject a new unique index that existing documents already violate
    pub fn check_new_unique_index(&self, entry: &IndexEntry) -> Result<()> {
        if !entry.descriptor.is_unique() {
            return Ok(());
        }
        let mut seen = std::collections::HashSet::new();
        for doc in self.documents.values() {
            for key in keys::extract(doc, &entry.descriptor, &entry.uri, &entry.node, None) {
                if !seen.insert(key.clone()) {
                    return Err(Error::UniqueConstraint {
                        descriptor: entry.descriptor.to_string(),
                        key,
                    });
                }
            }
        }
        Ok(())
    }
}

fn is_builtin_name_index(uri: &str, node: &str, descriptor: &IndexDescriptor) -> bool {
    uri == NAME_METADATA_URI
        && node == NAME_METADATA_NODE
        && descriptor.path == PathType::Node
        && descriptor.node == NodeType::Metadata
        && descriptor.key == KeyType::Equality
        && descriptor.syntax == SyntaxType::String
}

/// Reject names that cannot be used as a file in the home directory
pub fn validate_container_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidName {
            reason: "container name is empty".to_string(),
        });
    }
    if name.contains('\0') || name == "." || name == ".." {
        return Err(Error::InvalidName {
            reason: format!("'{}' is not a usable container name", name),
        });
    }
    Ok(())
}
