//! Database struct and container lifecycle
//!
//! [`Database`] is the reference [`DocumentStore`]. It is rooted at a home
//! directory holding `docshell.toml` and one JSON file per named container.
//!
//! ## Persistence
//!
//! Named containers are read from `<home>/<name>` when opened and written
//! back on `sync_container` and, when `sync_on_close` is set, when their last
//! handle closes. Unnamed containers live only in memory.
//!
//! ## Transactions
//!
//! Available when opened with `transactional: true`. See [`crate::state`] for
//! the snapshot model.

pub mod config;

pub use config::{StoreConfig, CONFIG_FILE_NAME};

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use docshell_core::{
    BufferedResults, Capabilities, ContainerConfig, ContainerHandle, ContainerInfo, Document,
    DocumentStore, Error, EvaluationMode, Expression, IndexDescriptor, IndexEntry, IndexLookup,
    Item, KeyStatistics, LookupOperation, QueryContext, ReindexMode, Result, ResultStream, TxnId,
};

use crate::container::{validate_container_name, ContainerData, ContainerKey};
use crate::keys;
use crate::query::{evaluate, parse, PreparedQuery};
use crate::state::StoreState;

// ============================================================================
// Open Options
// ============================================================================

/// Settings supplied by the caller when opening a [`Database`]
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Enable transactions
    pub transactional: bool,
    /// Override `cache_size_mb` from `docshell.toml`
    pub cache_size_mb: Option<u64>,
}

// ============================================================================
// Database Struct
// ============================================================================

/// Reference document store rooted at a home directory
///
/// # Example
///
/// ```text
/// use docshell_engine::{Database, OpenOptions};
///
/// let db = Database::open("/tmp/home", OpenOptions::default())?;
/// let handle = db.create_container(None, "books.dbxml", &ContainerConfig::default())?;
/// ```
pub struct Database {
    home: PathBuf,
    config: StoreConfig,
    capabilities: Capabilities,
    state: Arc<RwLock<StoreState>>,
}

impl Database {
    /// Open a store rooted at `home`
    ///
    /// Writes a default `docshell.toml` when none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if `home` is not a directory or the config file cannot
    /// be read or parsed.
    pub fn open(home: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let home = home.as_ref().to_path_buf();
        if !home.is_dir() {
            return Err(Error::Io {
                reason: format!("home directory '{}' does not exist", home.display()),
            });
        }
        let mut config = StoreConfig::load_or_create(&home)?;
        if let Some(size) = options.cache_size_mb {
            if size == 0 {
                return Err(Error::InvalidInput {
                    reason: "cache size must be greater than zero".to_string(),
                });
            }
            config.cache_size_mb = size;
        }

        info!(
            target: "docshell::db",
            home = %home.display(),
            cache_size_mb = config.cache_size_mb,
            transactional = options.transactional,
            "Database opened"
        );

        Ok(Self {
            home,
            config,
            capabilities: Capabilities {
                transactions: options.transactional,
                encryption: false,
            },
            state: Arc::new(RwLock::new(StoreState::default())),
        })
    }

    /// Home directory
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Effective configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn container_path(&self, name: &str) -> PathBuf {
        self.home.join(name)
    }

    fn check_txn(&self, txn: Option<TxnId>) -> Result<()> {
        if txn.is_some() && !self.capabilities.transactions {
            return Err(Error::TransactionsUnsupported);
        }
        self.state.read().check_txn(txn)
    }

    /// Load a closed container's file, apply `f` and write it back
    fn rewrite_closed(&self, name: &str, f: impl FnOnce(&mut ContainerData)) -> Result<()> {
        validate_container_name(name)?;
        if self.state.read().is_loaded(name) {
            return Err(Error::ContainerOpen {
                name: name.to_string(),
            });
        }
        let path = self.container_path(name);
        if !path.is_file() {
            return Err(Error::ContainerNotFound {
                name: name.to_string(),
            });
        }
        let mut data = ContainerData::load(&path)?;
        f(&mut data);
        data.save(&path)
    }

    fn wrap(&self, items: Vec<Item>, query: &QueryContext) -> Box<dyn ResultStream> {
        match query.mode {
            EvaluationMode::Eager => Box::new(BufferedResults::eager(items)),
            EvaluationMode::Lazy => Box::new(BufferedResults::lazy(items)),
        }
    }
}

impl DocumentStore for Database {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    // ========================================================================
    // Container lifecycle
    // ========================================================================

    fn create_container(
        &self,
        txn: Option<TxnId>,
        name: &str,
        config: &ContainerConfig,
    ) -> Result<ContainerHandle> {
        self.check_txn(txn)?;
        let mut state = self.state.write();
        let id = state.next_handle_id();

        if name.is_empty() {
            let data = ContainerData::new("", config);
            match txn {
                Some(txn) => state.stage(txn, id, ContainerKey::Memory(id), data)?,
                None => state.attach(id, ContainerKey::Memory(id), Some(data)),
            }
            debug!(target: "docshell::db", handle = id, "In-memory container created");
            return Ok(ContainerHandle {
                id,
                name: String::new(),
            });
        }

        validate_container_name(name)?;
        let path = self.container_path(name);
        if state.is_loaded(name) || path.exists() {
            return Err(Error::ContainerExists {
                name: name.to_string(),
            });
        }
        let data = ContainerData::new(name, config);
        // Write immediately so a second create in another process collides
        data.save(&path)?;
        let key = ContainerKey::Named(name.to_string());
        match txn {
            Some(txn) => state.stage(txn, id, key, data)?,
            None => state.attach(id, key, Some(data)),
        }
        info!(target: "docshell::db", container = name, handle = id, "Container created");
        Ok(ContainerHandle {
            id,
            name: name.to_string(),
        })
    }

    fn open_container(
        &self,
        txn: Option<TxnId>,
        name: &str,
        config: &ContainerConfig,
    ) -> Result<ContainerHandle> {
        if name.is_empty() {
            return self.create_container(txn, name, config);
        }
        self.check_txn(txn)?;
        validate_container_name(name)?;
        let mut state = self.state.write();
        let id = state.next_handle_id();
        let key = ContainerKey::Named(name.to_string());

        let data = if state.is_loaded(name) {
            None
        } else {
            let path = self.container_path(name);
            if !path.is_file() {
                return Err(Error::ContainerNotFound {
                    name: name.to_string(),
                });
            }
            let mut data = ContainerData::load(&path)?;
            data.validate = config.validate;
            Some(data)
        };
        state.attach(id, key, data);
        info!(target: "docshell::db", container = name, handle = id, "Container opened");
        Ok(ContainerHandle {
            id,
            name: name.to_string(),
        })
    }

    fn close_container(&self, handle: &ContainerHandle) -> Result<()> {
        let (key, data) = self.state.write().detach(handle)?;
        if let (ContainerKey::Named(name), Some(data)) = (&key, data) {
            if self.config.sync_on_close {
                data.save(&self.container_path(name))?;
            }
        }
        debug!(target: "docshell::db", container = %handle.display_name(), handle = handle.id, "Container closed");
        Ok(())
    }

    fn remove_container(&self, txn: Option<TxnId>, name: &str) -> Result<()> {
        self.check_txn(txn)?;
        validate_container_name(name)?;
        if self.state.read().is_loaded(name) {
            return Err(Error::ContainerOpen {
                name: name.to_string(),
            });
        }
        let path = self.container_path(name);
        if !path.is_file() {
            return Err(Error::ContainerNotFound {
                name: name.to_string(),
            });
        }
        std::fs::remove_file(&path)?;
        info!(target: "docshell::db", container = name, "Container removed");
        Ok(())
    }

    fn compact_container(&self, txn: Option<TxnId>, name: &str) -> Result<()> {
        self.check_txn(txn)?;
        // Saving re-serializes without any stale content
        self.rewrite_closed(name, |_| {})
    }

    fn reindex_container(&self, txn: Option<TxnId>, name: &str, mode: ReindexMode) -> Result<()> {
        self.check_txn(txn)?;
        self.rewrite_closed(name, |data| {
            data.index_nodes = mode == ReindexMode::IndexNodes;
        })
    }

    fn upgrade_container(&self, name: &str) -> Result<()> {
        self.rewrite_closed(name, |data| {
            if data.format_version < crate::container::FORMAT_VERSION {
                data.format_version = crate::container::FORMAT_VERSION;
            }
        })
    }

    fn sync_container(&self, handle: &ContainerHandle) -> Result<()> {
        let state = self.state.read();
        let key = state.key_of(handle)?;
        if let (ContainerKey::Named(name), Some(data)) = (&key, state.committed(&key)) {
            data.save(&self.container_path(name))?;
        }
        Ok(())
    }

    fn container_info(&self, handle: &ContainerHandle) -> Result<ContainerInfo> {
        let state = self.state.read();
        let data = state.latest(handle)?;
        Ok(ContainerInfo {
            name: data.name.clone(),
            kind: data.kind,
            index_nodes: data.index_nodes,
            validate: data.validate,
            auto_indexing: data.auto_indexing,
            aliases: data.aliases.clone(),
            document_count: data.documents.len(),
            index_count: data.indexes.len(),
            transactional: self.capabilities.transactions,
        })
    }

    fn add_alias(&self, handle: &ContainerHandle, alias: &str) -> Result<()> {
        if alias.trim().is_empty() {
            return Err(Error::InvalidName {
                reason: "alias is empty".to_string(),
            });
        }
        let mut state = self.state.write();
        let data = state.latest_mut(handle)?;
        if !data.aliases.iter().any(|a| a == alias) {
            data.aliases.push(alias.to_string());
        }
        Ok(())
    }

    fn remove_alias(&self, handle: &ContainerHandle, alias: &str) -> Result<bool> {
        let mut state = self.state.write();
        let data = state.latest_mut(handle)?;
        let before = data.aliases.len();
        data.aliases.retain(|a| a != alias);
        Ok(data.aliases.len() != before)
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    fn begin_transaction(&self) -> Result<TxnId> {
        if !self.capabilities.transactions {
            return Err(Error::TransactionsUnsupported);
        }
        let txn = self.state.write().begin();
        debug!(target: "docshell::txn", txn = %txn, "Transaction started");
        Ok(txn)
    }

    fn commit_transaction(&self, txn: TxnId) -> Result<()> {
        if !self.capabilities.transactions {
            return Err(Error::TransactionsUnsupported);
        }
        match self.state.write().commit(txn) {
            Ok(()) => {
                info!(target: "docshell::txn", txn = %txn, "Transaction committed");
                Ok(())
            }
            Err(e) => {
                warn!(target: "docshell::txn", txn = %txn, error = %e, "Commit failed");
                Err(e)
            }
        }
    }

    fn abort_transaction(&self, txn: TxnId) -> Result<()> {
        if !self.capabilities.transactions {
            return Err(Error::TransactionsUnsupported);
        }
        let dropped = self.state.write().abort(txn)?;
        for key in dropped {
            if let ContainerKey::Named(name) = key {
                let path = self.container_path(&name);
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(target: "docshell::txn", container = %name, error = %e, "Cannot remove container created by aborted transaction");
                }
            }
        }
        info!(target: "docshell::txn", txn = %txn, "Transaction aborted");
        Ok(())
    }

    // ========================================================================
    // Indexes
    // ========================================================================

    fn add_index(
        &self,
        txn: Option<TxnId>,
        handle: &ContainerHandle,
        uri: &str,
        node: &str,
        descriptor: &IndexDescriptor,
    ) -> Result<()> {
        self.check_txn(txn)?;
        let mut state = self.state.write();
        let data = state.container_mut(txn, handle)?;
        let entry = IndexEntry {
            uri: uri.to_string(),
            node: node.to_string(),
            descriptor: *descriptor,
        };
        if data.indexes.contains(&entry) {
            return Ok(());
        }
        data.check_new_unique_index(&entry)?;
        data.indexes.push(entry);
        Ok(())
    }

    fn delete_index(
        &self,
        txn: Option<TxnId>,
        handle: &ContainerHandle,
        uri: &str,
        node: &str,
        descriptor: &IndexDescriptor,
    ) -> Result<()> {
        self.check_txn(txn)?;
        let mut state = self.state.write();
        let data = state.container_mut(txn, handle)?;
        let before = data.indexes.len();
        data.indexes
            .retain(|e| !(e.uri == uri && e.node == node && &e.descriptor == descriptor));
        if data.indexes.len() == before {
            return Err(Error::IndexNotFound {
                descriptor: descriptor.to_string(),
                uri: uri.to_string(),
                node: node.to_string(),
            });
        }
        Ok(())
    }

    fn list_indexes(&self, txn: Option<TxnId>, handle: &ContainerHandle) -> Result<Vec<IndexEntry>> {
        self.check_txn(txn)?;
        let state = self.state.read();
        Ok(state.container(txn, handle)?.indexes.clone())
    }

    fn auto_indexing(&self, txn: Option<TxnId>, handle: &ContainerHandle) -> Result<bool> {
        self.check_txn(txn)?;
        let state = self.state.read();
        Ok(state.container(txn, handle)?.auto_indexing)
    }

    fn set_auto_indexing(
        &self,
        txn: Option<TxnId>,
        handle: &ContainerHandle,
        enabled: bool,
    ) -> Result<()> {
        self.check_txn(txn)?;
        let mut state = self.state.write();
        state.container_mut(txn, handle)?.auto_indexing = enabled;
        Ok(())
    }

    // ========================================================================
    // Documents
    // ========================================================================

    fn put_document(
        &self,
        txn: Option<TxnId>,
        handle: &ContainerHandle,
        mut doc: Document,
        generate_name: bool,
    ) -> Result<String> {
        self.check_txn(txn)?;
        if generate_name {
            doc.name = format!("dbxml_{}", uuid::Uuid::new_v4().simple());
        }
        if doc.name.trim().is_empty() {
            return Err(Error::InvalidName {
                reason: "document name is empty".to_string(),
            });
        }
        let mut state = self.state.write();
        let data = state.container_mut(txn, handle)?;
        if data.validate && !is_well_formed(&doc.content) {
            return Err(Error::InvalidInput {
                reason: format!("document '{}' is not well-formed", doc.name),
            });
        }
        if data.documents.contains_key(&doc.name) {
            return Err(Error::DocumentExists {
                container: data.name.clone(),
                name: doc.name,
            });
        }
        data.check_unique(&doc, None)?;
        let name = doc.name.clone();
        data.documents.insert(name.clone(), doc);
        Ok(name)
    }

    fn get_document(
        &self,
        txn: Option<TxnId>,
        handle: &ContainerHandle,
        name: &str,
    ) -> Result<Document> {
        self.check_txn(txn)?;
        let state = self.state.read();
        let data = state.container(txn, handle)?;
        data.documents
            .get(name)
            .cloned()
            .ok_or_else(|| Error::DocumentNotFound {
                container: data.name.clone(),
                name: name.to_string(),
            })
    }

    fn delete_document(&self, txn: Option<TxnId>, handle: &ContainerHandle, name: &str) -> Result<()> {
        self.check_txn(txn)?;
        let mut state = self.state.write();
        let data = state.container_mut(txn, handle)?;
        match data.documents.remove(name) {
            Some(_) => Ok(()),
            None => Err(Error::DocumentNotFound {
                container: data.name.clone(),
                name: name.to_string(),
            }),
        }
    }

    fn update_document(&self, txn: Option<TxnId>, handle: &ContainerHandle, doc: Document) -> Result<()> {
        self.check_txn(txn)?;
        let mut state = self.state.write();
        let data = state.container_mut(txn, handle)?;
        if !data.documents.contains_key(&doc.name) {
            return Err(Error::DocumentNotFound {
                container: data.name.clone(),
                name: doc.name,
            });
        }
        data.check_unique(&doc, Some(&doc.name))?;
        data.documents.insert(doc.name.clone(), doc);
        Ok(())
    }

    fn all_documents(
        &self,
        txn: Option<TxnId>,
        handle: &ContainerHandle,
        query: &QueryContext,
    ) -> Result<Box<dyn ResultStream>> {
        self.check_txn(txn)?;
        let state = self.state.read();
        let items = state
            .container(txn, handle)?
            .documents
            .values()
            .cloned()
            .map(Item::Document)
            .collect();
        Ok(self.wrap(items, query))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    fn query(
        &self,
        txn: Option<TxnId>,
        text: &str,
        query: &QueryContext,
    ) -> Result<Box<dyn ResultStream>> {
        self.check_txn(txn)?;
        let expr = parse(text)?;
        let state = self.state.read();
        evaluate(&state, txn, &expr, None, query)
    }

    fn prepare(
        &self,
        txn: Option<TxnId>,
        text: &str,
        _query: &QueryContext,
    ) -> Result<Box<dyn Expression>> {
        self.check_txn(txn)?;
        Ok(Box::new(PreparedQuery::new(text, Arc::clone(&self.state))?))
    }

    fn lookup_index(
        &self,
        txn: Option<TxnId>,
        handle: &ContainerHandle,
        lookup: &IndexLookup,
        query: &QueryContext,
    ) -> Result<Box<dyn ResultStream>> {
        self.check_txn(txn)?;
        let state = self.state.read();
        let data = state.container(txn, handle)?;
        require_index(data, lookup)?;

        let parent = lookup.parent.as_ref().map(|(u, n)| (u.as_str(), n.as_str()));
        let items = data
            .documents
            .values()
            .filter(|doc| {
                let keys = keys::extract(doc, &lookup.descriptor, &lookup.uri, &lookup.node, parent);
                match &lookup.condition {
                    None => !keys.is_empty(),
                    Some((op, operand)) => keys
                        .iter()
                        .any(|k| keys::satisfies(k, *op, operand, &lookup.descriptor)),
                }
            })
            .cloned()
            .map(Item::Document)
            .collect();
        Ok(self.wrap(items, query))
    }

    fn lookup_statistics(
        &self,
        txn: Option<TxnId>,
        handle: &ContainerHandle,
        lookup: &IndexLookup,
    ) -> Result<KeyStatistics> {
        self.check_txn(txn)?;
        let state = self.state.read();
        let data = state.container(txn, handle)?;
        require_index(data, lookup)?;

        let parent = lookup.parent.as_ref().map(|(u, n)| (u.as_str(), n.as_str()));
        let mut stats = KeyStatistics::default();
        let mut distinct = BTreeSet::new();
        for doc in data.documents.values() {
            for key in keys::extract(doc, &lookup.descriptor, &lookup.uri, &lookup.node, parent) {
                if let Some((_, operand)) = &lookup.condition {
                    if !keys::satisfies(&key, LookupOperation::Equal, operand, &lookup.descriptor) {
                        continue;
                    }
                }
                stats.indexed_keys += 1;
                stats.sum_key_value_size += key.len() as u64;
                distinct.insert(key);
            }
        }
        stats.unique_keys = distinct.len() as u64;
        Ok(stats)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if !self.config.sync_on_close {
            return;
        }
        // Persist whatever callers left open
        let state = self.state.read();
        let mut seen = HashSet::new();
        for key in state.handles().values() {
            if let ContainerKey::Named(name) = key {
                if !seen.insert(name.as_str()) {
                    continue;
                }
                if let Some(data) = state.committed(key) {
                    if let Err(e) = data.save(&self.container_path(name)) {
                        warn!(target: "docshell::db", container = %name, error = %e, "Failed to persist container on drop");
                    }
                }
            }
        }
    }
}

fn require_index(data: &ContainerData, lookup: &IndexLookup) -> Result<()> {
    if data.has_index(&lookup.uri, &lookup.node, &lookup.descriptor) {
        Ok(())
    } else {
        Err(Error::IndexNotFound {
            descriptor: lookup.descriptor.to_string(),
            uri: lookup.uri.clone(),
            node: lookup.node.clone(),
        })
    }
}

/// Cheap structural check applied to validating containers
fn is_well_formed(content: &str) -> bool {
    let trimmed = content.trim();
    trimmed.starts_with('<') && trimmed.ends_with('>')
}
