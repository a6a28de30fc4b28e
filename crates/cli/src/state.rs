//! Session state: open containers, transaction, query settings, results.
//!
//! The session owns everything a command may leave behind:
//! - a stack of container handles; the top is the active container
//! - at most one transaction
//! - at most one prepared expression
//! - the query context (mode, timeout, namespaces, variables, base URI)
//! - the result cursor of the last query or lookup
//!
//! All of it is released by [`Session::teardown`], which also runs on drop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use docshell_core::{
    BufferedResults, Capabilities, ContainerConfig, ContainerHandle, DocumentStore,
    EvaluationMode, Expression, Item, QueryContext, ResultStream, TxnId,
};

use crate::cursor::ResultCursor;
use crate::error::{Result, ShellError};
use crate::format::{error_records, Level, Record, Reporter};

/// Message shown when a command needs an active container
pub const NO_CONTAINER: &str = "You must create and/or open a container first!";

/// Mutable state shared by every command of one shell run
pub struct Session {
    store: Arc<dyn DocumentStore>,
    capabilities: Capabilities,
    containers: Vec<ContainerHandle>,
    txn: Option<TxnId>,
    expression: Option<Box<dyn Expression>>,
    query: QueryContext,
    cursor: Option<ResultCursor>,
    verbose: bool,
    home: PathBuf,
    reporter: Box<dyn Reporter>,
}

impl Session {
    /// New session over `store`, rooted at `home`
    pub fn new(
        store: Arc<dyn DocumentStore>,
        home: impl Into<PathBuf>,
        reporter: Box<dyn Reporter>,
    ) -> Self {
        let capabilities = store.capabilities();
        Self {
            store,
            capabilities,
            containers: Vec::new(),
            txn: None,
            expression: None,
            query: QueryContext::default(),
            cursor: None,
            verbose: false,
            home: home.into(),
            reporter,
        }
    }

    // =====================================================================
    // Accessors
    // =====================================================================

    /// The engine
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Engine features
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// The active transaction, if any
    pub fn txn(&self) -> Option<TxnId> {
        self.txn
    }

    /// Resolve `path` against the home directory
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.home.join(p)
        }
    }

    /// Current query settings
    pub fn query(&self) -> &QueryContext {
        &self.query
    }

    /// Mutable query settings
    pub fn query_mut(&mut self) -> &mut QueryContext {
        &mut self.query
    }

    /// Whether verbose output is on
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Switch verbose output
    pub fn set_verbose(&mut self, on: bool) {
        self.verbose = on;
    }

    /// Open containers, bottom to top
    pub fn containers(&self) -> &[ContainerHandle] {
        &self.containers
    }

    /// The active (top) container
    pub fn active(&self) -> Result<ContainerHandle> {
        self.containers
            .last()
            .cloned()
            .ok_or_else(|| ShellError::StateConflict(NO_CONTAINER.to_string()))
    }

    /// Topmost open container answering to `name`
    pub fn find_open(&self, name: &str) -> Option<ContainerHandle> {
        self.containers.iter().rev().find(|h| h.name == name).cloned()
    }

    // =====================================================================
    // Reporting
    // =====================================================================

    /// Normal output
    pub fn message(&mut self, text: impl Into<String>) {
        self.reporter.report(Record::new(Level::Message, text));
    }

    /// Output shown only in verbose mode
    pub fn detail(&mut self, text: impl Into<String>) {
        if self.verbose {
            self.reporter.report(Record::new(Level::Verbose, text));
        }
    }

    /// Recoverable problem
    pub fn warn(&mut self, text: impl Into<String>) {
        self.reporter.report(Record::new(Level::Warning, text));
    }

    /// Report a failed command
    pub fn report_error(&mut self, err: &ShellError) {
        for record in error_records(err) {
            self.reporter.report(record);
        }
    }

    // =====================================================================
    // Containers
    // =====================================================================

    fn push(&mut self, handle: ContainerHandle) {
        self.containers.push(handle);
        self.sync_default_collection();
    }

    fn sync_default_collection(&mut self) {
        self.query.default_collection = self.containers.last().cloned();
    }

    /// Create a container and make it active
    pub fn create_container(
        &mut self,
        name: &str,
        config: &ContainerConfig,
    ) -> Result<ContainerHandle> {
        let handle = self.store.create_container(self.txn, name, config)?;
        debug!(target: "docshell::session", id = handle.id, name = %handle.name, "Container created");
        self.push(handle.clone());
        Ok(handle)
    }

    /// Open a container and make it active
    pub fn open_container(
        &mut self,
        name: &str,
        config: &ContainerConfig,
    ) -> Result<ContainerHandle> {
        let handle = self.store.open_container(self.txn, name, config)?;
        debug!(target: "docshell::session", id = handle.id, name = %handle.name, "Container opened");
        self.push(handle.clone());
        Ok(handle)
    }

    /// Open a container directly beneath the active one
    pub fn preload(&mut self, name: &str) -> Result<ContainerHandle> {
        let top = self.containers.pop();
        let opened = self
            .store
            .open_container(self.txn, name, &ContainerConfig::default());
        if let Ok(handle) = &opened {
            self.containers.push(handle.clone());
        }
        if let Some(top) = top {
            self.containers.push(top);
        }
        self.sync_default_collection();
        opened.map_err(ShellError::from)
    }

    /// Close every container, or every container named `name`
    ///
    /// The remaining containers keep their relative order.
    pub fn close(&mut self, name: Option<&str>) -> Result<()> {
        if self.containers.is_empty() {
            self.message("no containers to close.");
            return Ok(());
        }

        match name {
            None => {
                let mut first_err = None;
                let mut closed = 0;
                while let Some(handle) = self.containers.pop() {
                    self.detail(format!("closing container {}...", handle.display_name()));
                    match self.store.close_container(&handle) {
                        Ok(()) => closed += 1,
                        Err(e) => {
                            first_err.get_or_insert(e);
                        }
                    }
                }
                self.sync_default_collection();
                self.message(format!("closed {} containers.", closed));
                match first_err {
                    Some(e) => Err(e.into()),
                    None => Ok(()),
                }
            }
            Some(name) => {
                let mut side = Vec::with_capacity(self.containers.len());
                let mut first_err = None;
                let mut found = false;
                while let Some(handle) = self.containers.pop() {
                    if handle.name != name {
                        side.push(handle);
                        continue;
                    }
                    found = true;
                    match self.store.close_container(&handle) {
                        Ok(()) => self.message(format!("container {} closed.", name)),
                        Err(e) => {
                            first_err.get_or_insert(e);
                            side.push(handle);
                        }
                    }
                }
                side.reverse();
                self.containers = side;
                self.sync_default_collection();

                if let Some(e) = first_err {
                    return Err(e.into());
                }
                if !found {
                    self.warn(format!("container {} is not open.", name));
                }
                let open = self.containers.len();
                self.message(format!("You have {} containers open.", open));
                Ok(())
            }
        }
    }

    /// Close any open handle named `name` without reporting
    pub fn close_quietly(&mut self, name: &str) -> Result<()> {
        let mut kept = Vec::with_capacity(self.containers.len());
        let mut first_err = None;
        for handle in std::mem::take(&mut self.containers) {
            if handle.name == name {
                if let Err(e) = self.store.close_container(&handle) {
                    first_err.get_or_insert(e);
                }
            } else {
                kept.push(handle);
            }
        }
        self.containers = kept;
        self.sync_default_collection();
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    // =====================================================================
    // Transactions
    // =====================================================================

    fn require_transactions(&self) -> Result<()> {
        if self.capabilities.transactions {
            Ok(())
        } else {
            Err(ShellError::StateConflict(
                "Transactions are not enabled; restart with --transactional.".to_string(),
            ))
        }
    }

    /// Begin a transaction, committing any active one first
    ///
    /// The active transaction stays in place when its commit fails.
    pub fn begin(&mut self) -> Result<TxnId> {
        self.require_transactions()?;
        if let Some(old) = self.txn {
            self.detail("Committing transaction before beginning new one...");
            self.store.commit_transaction(old)?;
            self.txn = None;
            debug!(target: "docshell::session", txn = %old, "Transaction committed");
        }
        let txn = self.store.begin_transaction()?;
        self.txn = Some(txn);
        debug!(target: "docshell::session", txn = %txn, "Transaction begun");
        self.detail("Transaction created successfully.");
        Ok(txn)
    }

    /// Commit the active transaction
    pub fn commit(&mut self) -> Result<()> {
        self.require_transactions()?;
        let txn = self
            .txn
            .take()
            .ok_or_else(|| ShellError::StateConflict("No transaction exists!".to_string()))?;
        self.store.commit_transaction(txn)?;
        debug!(target: "docshell::session", txn = %txn, "Transaction committed");
        self.detail("Transaction committed.");
        Ok(())
    }

    /// Abort the active transaction
    pub fn abort(&mut self) -> Result<()> {
        self.require_transactions()?;
        let txn = self
            .txn
            .take()
            .ok_or_else(|| ShellError::StateConflict("No transaction exists!".to_string()))?;
        self.store.abort_transaction(txn)?;
        debug!(target: "docshell::session", txn = %txn, "Transaction aborted");

        // Containers created under the transaction went with it
        let store = &self.store;
        let before = self.containers.len();
        self.containers.retain(|handle| {
            !matches!(
                store.container_info(handle),
                Err(docshell_core::Error::ContainerNotFound { .. })
            )
        });
        if self.containers.len() != before {
            self.sync_default_collection();
        }
        self.message("Transaction aborted.");
        Ok(())
    }

    // =====================================================================
    // Queries and results
    // =====================================================================

    /// Prepare `text`, replacing any previously prepared expression
    pub fn prepare(&mut self, text: &str) -> Result<()> {
        let expr = self.store.prepare(self.txn, text, &self.query)?;
        self.expression = Some(expr);
        Ok(())
    }

    /// The prepared expression
    pub fn expression(&self) -> Option<&dyn Expression> {
        self.expression.as_deref()
    }

    /// Run the prepared expression without a context item
    pub fn execute_prepared(&self) -> Result<Option<Box<dyn ResultStream>>> {
        match &self.expression {
            Some(expr) => Ok(Some(expr.execute(self.txn, None, &self.query)?)),
            None => Ok(None),
        }
    }

    /// Replace the current result cursor
    pub fn install_results(&mut self, stream: Box<dyn ResultStream>) -> &mut ResultCursor {
        self.cursor.insert(ResultCursor::new(stream))
    }

    /// The current result cursor
    pub fn cursor_mut(&mut self) -> Option<&mut ResultCursor> {
        self.cursor.as_mut()
    }

    /// Evaluate `text` once per item of the current results
    ///
    /// The new results replace the current ones only when every evaluation
    /// succeeded; on failure the current results are kept, rewound.
    pub fn context_query(&mut self, text: &str) -> Result<usize> {
        if self.cursor.is_none() {
            return Err(ShellError::StateConflict(
                "No results exist to run a context query against.".to_string(),
            ));
        }
        let expr = self.store.prepare(self.txn, text, &self.query)?;
        self.detail(format!("query: {}", expr.text()));
        self.detail(format!("query plan: {}", expr.plan()));

        let Some(source) = self.cursor.as_mut() else {
            return Ok(0);
        };
        source.reset();
        let outcome = evaluate_per_item(source, expr.as_ref(), self.txn, &self.query);
        source.reset();
        let items = outcome?;

        let count = items.len();
        let buffered = match self.query.mode {
            EvaluationMode::Eager => BufferedResults::eager(items),
            EvaluationMode::Lazy => BufferedResults::lazy(items),
        };
        self.install_results(Box::new(buffered));
        Ok(count)
    }

    // =====================================================================
    // Teardown
    // =====================================================================

    /// Release the cursor, expression, transaction and containers
    pub fn teardown(&mut self) {
        self.cursor = None;
        self.expression = None;
        if let Some(txn) = self.txn.take() {
            if let Err(e) = self.store.abort_transaction(txn) {
                warn!(target: "docshell::session", txn = %txn, error = %e, "Abort on teardown failed");
            }
        }
        while let Some(handle) = self.containers.pop() {
            if let Err(e) = self.store.close_container(&handle) {
                warn!(target: "docshell::session", name = %handle.name, error = %e, "Close on teardown failed");
            }
        }
        self.query.default_collection = None;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn evaluate_per_item(
    source: &mut ResultCursor,
    expr: &dyn Expression,
    txn: Option<TxnId>,
    query: &QueryContext,
) -> docshell_core::Result<Vec<Item>> {
    let mut items = Vec::new();
    while let Some(item) = source.next_item()? {
        let mut results = expr.execute(txn, Some(&item), query)?;
        while let Some(result) = results.next_item()? {
            items.push(result);
        }
    }
    Ok(items)
}
