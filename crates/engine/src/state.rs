//! Shared engine state: loaded containers, open handles, live transactions
//!
//! Transactions use snapshot-and-swap. Beginning one clones the committed
//! container map; reads and writes under the transaction see only the clone;
//! commit copies the clone's containers back over the committed ones and
//! abort drops it.
//!
//! A container created under a transaction is staged: its data lives only in
//! that transaction's snapshot until commit, and abort forgets it.

use std::collections::HashMap;

use docshell_core::{ContainerHandle, Error, Result, TxnId};

use crate::container::{ContainerData, ContainerKey};

/// Loaded containers by key
pub(crate) type Containers = HashMap<ContainerKey, ContainerData>;

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    committed: Containers,
    transactions: HashMap<TxnId, Containers>,
    staged: HashMap<ContainerKey, TxnId>,
    handles: HashMap<u64, ContainerKey>,
    open_counts: HashMap<ContainerKey, usize>,
    next_handle: u64,
    next_txn: u64,
}

impl StoreState {
    // ========================================================================
    // Handles
    // ========================================================================

    /// Key a handle refers to
    pub fn key_of(&self, handle: &ContainerHandle) -> Result<ContainerKey> {
        self.handles
            .get(&handle.id)
            .cloned()
            .ok_or_else(|| Error::ContainerNotFound {
                name: handle.display_name().to_string(),
            })
    }

    /// Whether a named container is loaded
    pub fn is_loaded(&self, name: &str) -> bool {
        let key = ContainerKey::Named(name.to_string());
        self.committed.contains_key(&key) || self.staged.contains_key(&key)
    }

    /// Reserve the next handle id
    pub fn next_handle_id(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Register a handle for a container, loading the data if needed
    ///
    /// Newly loaded data is made visible to every live transaction too.
    pub fn attach(&mut self, id: u64, key: ContainerKey, data: Option<ContainerData>) {
        if let Some(data) = data {
            for snapshot in self.transactions.values_mut() {
                snapshot.insert(key.clone(), data.clone());
            }
            self.committed.insert(key.clone(), data);
        }
        *self.open_counts.entry(key.clone()).or_insert(0) += 1;
        self.handles.insert(id, key);
    }

    /// Register a handle for a container created under `txn`
    pub fn stage(&mut self, txn: TxnId, id: u64, key: ContainerKey, data: ContainerData) -> Result<()> {
        self.view_mut(Some(txn))?.insert(key.clone(), data);
        self.staged.insert(key.clone(), txn);
        *self.open_counts.entry(key.clone()).or_insert(0) += 1;
        self.handles.insert(id, key);
        Ok(())
    }

    /// Drop a handle; returns the container data when it was the last one
    ///
    /// Closing a staged container takes it out of its transaction.
    pub fn detach(&mut self, handle: &ContainerHandle) -> Result<(ContainerKey, Option<ContainerData>)> {
        let key = self.key_of(handle)?;
        self.handles.remove(&handle.id);
        let remaining = match self.open_counts.get_mut(&key) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };
        if remaining > 0 {
            return Ok((key, None));
        }
        self.open_counts.remove(&key);
        if let Some(txn) = self.staged.remove(&key) {
            let data = self
                .transactions
                .get_mut(&txn)
                .and_then(|snapshot| snapshot.remove(&key));
            return Ok((key, data));
        }
        for snapshot in self.transactions.values_mut() {
            snapshot.remove(&key);
        }
        let data = self.committed.remove(&key);
        Ok((key, data))
    }

    /// Committed data of a loaded container
    pub fn committed(&self, key: &ContainerKey) -> Option<&ContainerData> {
        self.committed.get(key)
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Containers as seen by `txn`, or the committed state without one
    pub fn view(&self, txn: Option<TxnId>) -> Result<&Containers> {
        match txn {
            None => Ok(&self.committed),
            Some(id) => self
                .transactions
                .get(&id)
                .ok_or(Error::TransactionNotActive),
        }
    }

    /// Mutable counterpart of [`view`](Self::view)
    pub fn view_mut(&mut self, txn: Option<TxnId>) -> Result<&mut Containers> {
        match txn {
            None => Ok(&mut self.committed),
            Some(id) => self
                .transactions
                .get_mut(&id)
                .ok_or(Error::TransactionNotActive),
        }
    }

    /// Handle lookup, borrowing the handle table alongside a view
    pub fn handles(&self) -> &HashMap<u64, ContainerKey> {
        &self.handles
    }

    /// Container behind `handle` as seen by `txn`
    pub fn container(&self, txn: Option<TxnId>, handle: &ContainerHandle) -> Result<&ContainerData> {
        let key = self.key_of(handle)?;
        self.view(txn)?
            .get(&key)
            .ok_or_else(|| Error::ContainerNotFound {
                name: handle.display_name().to_string(),
            })
    }

    /// Container behind `handle` in the committed state, or in the
    /// transaction that staged it
    pub fn latest(&self, handle: &ContainerHandle) -> Result<&ContainerData> {
        let txn = self.staged.get(&self.key_of(handle)?).copied();
        self.container(txn, handle)
    }

    /// Mutable counterpart of [`latest`](Self::latest)
    pub fn latest_mut(&mut self, handle: &ContainerHandle) -> Result<&mut ContainerData> {
        let txn = self.staged.get(&self.key_of(handle)?).copied();
        self.container_mut(txn, handle)
    }

    /// Mutable counterpart of [`container`](Self::container)
    pub fn container_mut(
        &mut self,
        txn: Option<TxnId>,
        handle: &ContainerHandle,
    ) -> Result<&mut ContainerData> {
        let key = self.key_of(handle)?;
        self.view_mut(txn)?
            .get_mut(&key)
            .ok_or_else(|| Error::ContainerNotFound {
                name: handle.display_name().to_string(),
            })
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Start a transaction over a snapshot of the committed state
    pub fn begin(&mut self) -> TxnId {
        self.next_txn += 1;
        let id = TxnId(self.next_txn);
        self.transactions.insert(id, self.committed.clone());
        id
    }

    /// Publish a transaction's snapshot
    pub fn commit(&mut self, txn: TxnId) -> Result<()> {
        let snapshot = self
            .transactions
            .remove(&txn)
            .ok_or(Error::TransactionNotActive)?;
        for (key, data) in snapshot {
            // Containers closed during the transaction stay closed
            if let Some(slot) = self.committed.get_mut(&key) {
                *slot = data;
            } else if self.staged.get(&key) == Some(&txn) {
                self.staged.remove(&key);
                for other in self.transactions.values_mut() {
                    other.insert(key.clone(), data.clone());
                }
                self.committed.insert(key, data);
            }
        }
        Ok(())
    }

    /// Discard a transaction's snapshot
    ///
    /// Containers it staged are forgotten along with their handles; their
    /// keys are returned.
    pub fn abort(&mut self, txn: TxnId) -> Result<Vec<ContainerKey>> {
        self.transactions
            .remove(&txn)
            .ok_or(Error::TransactionNotActive)?;
        let dropped: Vec<ContainerKey> = self
            .staged
            .iter()
            .filter(|(_, owner)| **owner == txn)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &dropped {
            self.staged.remove(key);
            self.open_counts.remove(key);
        }
        self.handles.retain(|_, key| !dropped.contains(key));
        Ok(dropped)
    }

    /// Fail unless `txn` is absent or live
    pub fn check_txn(&self, txn: Option<TxnId>) -> Result<()> {
        self.view(txn).map(|_| ())
    }
}
