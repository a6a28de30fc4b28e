//! Engine-facing traits
//!
//! The shell reaches the document store only through [`DocumentStore`].
//! Results come back as [`ResultStream`]s and prepared queries as
//! [`Expression`]s. Implementations use interior mutability so a store can be
//! shared as `Arc<dyn DocumentStore>`.

use crate::error::Result;
use crate::index::IndexDescriptor;
use crate::types::{
    Capabilities, ContainerConfig, ContainerHandle, ContainerInfo, IndexEntry, IndexLookup,
    KeyStatistics, QueryContext, ReindexMode, TxnId,
};
use crate::value::{Document, Item};

/// A forward cursor over query or lookup results
pub trait ResultStream: Send {
    /// Number of items, when known without scanning
    ///
    /// Eager results always know their size. Lazy results return `None`.
    fn size(&self) -> Option<usize>;

    /// Advance and return the next item, `None` at the end
    ///
    /// # Errors
    ///
    /// Returns an error if producing the item fails.
    fn next_item(&mut self) -> Result<Option<Item>>;

    /// Rewind to the first item
    fn reset(&mut self);
}

/// A compiled, reusable query
pub trait Expression: Send {
    /// Source text the expression was prepared from
    fn text(&self) -> &str;

    /// Rendered evaluation plan
    fn plan(&self) -> String;

    /// True when evaluating the expression modifies data
    fn is_update(&self) -> bool;

    /// Evaluate the expression
    ///
    /// `context` supplies the item bound to `.`; without one, `.` is an
    /// evaluation error.
    ///
    /// # Errors
    ///
    /// Returns an error if evaluation fails or exceeds the timeout.
    fn execute(
        &self,
        txn: Option<TxnId>,
        context: Option<&Item>,
        query: &QueryContext,
    ) -> Result<Box<dyn ResultStream>>;
}

/// Operations the shell performs against a document store
///
/// Every method taking `txn` runs inside that transaction when it is
/// `Some`. Container-scoped operations take the handle returned by
/// [`create_container`](DocumentStore::create_container) or
/// [`open_container`](DocumentStore::open_container).
pub trait DocumentStore: Send + Sync {
    /// Features this store supports
    fn capabilities(&self) -> Capabilities;

    // ========================================================================
    // Container lifecycle
    // ========================================================================

    /// Create and open a new container; an empty name creates an in-memory one
    ///
    /// Under `txn` the container exists only once the transaction commits.
    fn create_container(
        &self,
        txn: Option<TxnId>,
        name: &str,
        config: &ContainerConfig,
    ) -> Result<ContainerHandle>;

    /// Open an existing container
    fn open_container(
        &self,
        txn: Option<TxnId>,
        name: &str,
        config: &ContainerConfig,
    ) -> Result<ContainerHandle>;

    /// Close a handle, persisting the container when configured to
    fn close_container(&self, handle: &ContainerHandle) -> Result<()>;

    /// Delete a container that is not open
    fn remove_container(&self, txn: Option<TxnId>, name: &str) -> Result<()>;

    /// Compact a container's storage
    fn compact_container(&self, txn: Option<TxnId>, name: &str) -> Result<()>;

    /// Rebuild a container's indexes
    fn reindex_container(&self, txn: Option<TxnId>, name: &str, mode: ReindexMode) -> Result<()>;

    /// Upgrade a container's on-disk format
    fn upgrade_container(&self, name: &str) -> Result<()>;

    /// Flush a container to durable storage
    fn sync_container(&self, handle: &ContainerHandle) -> Result<()>;

    /// Describe an open container
    fn container_info(&self, handle: &ContainerHandle) -> Result<ContainerInfo>;

    /// Attach an alias usable in `collection()`
    fn add_alias(&self, handle: &ContainerHandle, alias: &str) -> Result<()>;

    /// Detach an alias; returns whether it was attached
    fn remove_alias(&self, handle: &ContainerHandle, alias: &str) -> Result<bool>;

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begin a transaction
    ///
    /// # Errors
    ///
    /// [`Error::TransactionsUnsupported`](crate::Error::TransactionsUnsupported)
    /// when the capability is absent.
    fn begin_transaction(&self) -> Result<TxnId>;

    /// Commit a transaction
    fn commit_transaction(&self, txn: TxnId) -> Result<()>;

    /// Abort a transaction, discarding its writes
    fn abort_transaction(&self, txn: TxnId) -> Result<()>;

    // ========================================================================
    // Indexes
    // ========================================================================

    /// Declare an index for a node
    fn add_index(
        &self,
        txn: Option<TxnId>,
        handle: &ContainerHandle,
        uri: &str,
        node: &str,
        descriptor: &IndexDescriptor,
    ) -> Result<()>;

    /// Remove an index declaration
    fn delete_index(
        &self,
        txn: Option<TxnId>,
        handle: &ContainerHandle,
        uri: &str,
        node: &str,
        descriptor: &IndexDescriptor,
    ) -> Result<()>;

    /// All declared indexes
    fn list_indexes(&self, txn: Option<TxnId>, handle: &ContainerHandle) -> Result<Vec<IndexEntry>>;

    /// Current auto-indexing flag
    fn auto_indexing(&self, txn: Option<TxnId>, handle: &ContainerHandle) -> Result<bool>;

    /// Set the auto-indexing flag
    fn set_auto_indexing(
        &self,
        txn: Option<TxnId>,
        handle: &ContainerHandle,
        enabled: bool,
    ) -> Result<()>;

    // ========================================================================
    // Documents
    // ========================================================================

    /// Store a new document and return its name
    ///
    /// With `generate_name` a fresh unique name replaces `doc.name`.
    fn put_document(
        &self,
        txn: Option<TxnId>,
        handle: &ContainerHandle,
        doc: Document,
        generate_name: bool,
    ) -> Result<String>;

    /// Fetch a document by name
    fn get_document(
        &self,
        txn: Option<TxnId>,
        handle: &ContainerHandle,
        name: &str,
    ) -> Result<Document>;

    /// Delete a document by name
    fn delete_document(&self, txn: Option<TxnId>, handle: &ContainerHandle, name: &str)
        -> Result<()>;

    /// Replace an existing document (content and metadata)
    fn update_document(&self, txn: Option<TxnId>, handle: &ContainerHandle, doc: Document)
        -> Result<()>;

    /// Every document in the container
    fn all_documents(
        &self,
        txn: Option<TxnId>,
        handle: &ContainerHandle,
        query: &QueryContext,
    ) -> Result<Box<dyn ResultStream>>;

    // ========================================================================
    // Queries
    // ========================================================================

    /// Parse and evaluate an expression in one step
    fn query(
        &self,
        txn: Option<TxnId>,
        text: &str,
        query: &QueryContext,
    ) -> Result<Box<dyn ResultStream>>;

    /// Compile an expression for repeated evaluation
    fn prepare(
        &self,
        txn: Option<TxnId>,
        text: &str,
        query: &QueryContext,
    ) -> Result<Box<dyn Expression>>;

    /// Documents matched by an index
    fn lookup_index(
        &self,
        txn: Option<TxnId>,
        handle: &ContainerHandle,
        lookup: &IndexLookup,
        query: &QueryContext,
    ) -> Result<Box<dyn ResultStream>>;

    /// Key statistics for an index
    ///
    /// An `Equal` condition on the lookup restricts the statistics to that key.
    fn lookup_statistics(
        &self,
        txn: Option<TxnId>,
        handle: &ContainerHandle,
        lookup: &IndexLookup,
    ) -> Result<KeyStatistics>;
}

// ============================================================================
// Buffered results
// ============================================================================

/// A [`ResultStream`] over items already held in memory
///
/// Used for eager engine results and for accumulating context-query output.
#[derive(Debug, Clone, Default)]
pub struct BufferedResults {
    items: Vec<Item>,
    position: usize,
    size_known: bool,
}

impl BufferedResults {
    /// Stream with a known size
    pub fn eager(items: Vec<Item>) -> Self {
        Self {
            items,
            position: 0,
            size_known: true,
        }
    }

    /// Stream that hides its size until scanned
    pub fn lazy(items: Vec<Item>) -> Self {
        Self {
            items,
            position: 0,
            size_known: false,
        }
    }

    /// Append an item
    pub fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    /// Number of buffered items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ResultStream for BufferedResults {
    fn size(&self) -> Option<usize> {
        self.size_known.then_some(self.items.len())
    }

    fn next_item(&mut self) -> Result<Option<Item>> {
        let item = self.items.get(self.position).cloned();
        if item.is_some() {
            self.position += 1;
        }
        Ok(item)
    }

    fn reset(&mut self) {
        self.position = 0;
    }
}
