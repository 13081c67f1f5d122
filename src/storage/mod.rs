//! Record store.
//!
//! # Data Flow
//! ```text
//! Store::transact(|tx| ...)
//!     → lock committed state
//!     → Transaction over it: reads fall through, writes collect in Changes
//!     → closure stages the business write + paired audit append
//!     → backend.commit(changes)        ← durable before success is returned
//!     → tables.apply(changes)
//! Any Err along the way drops the changes: nothing is applied.
//! ```
//!
//! # Design Decisions
//! - Writers are serialized by one lock; the workload is small records at
//!   human request rates
//! - A commit costs the size of its own changes. Nothing is cloned and the
//!   file backend only ever appends
//! - A panicking closure never reaches `apply`, so a poisoned lock is
//!   recovered rather than propagated

pub mod backend;
pub mod error;
pub mod tables;
pub mod transaction;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use backend::{Backend, JsonLinesBackend, MemoryBackend};
pub use error::{StoreError, StoreResult};
pub use tables::{Changes, DecisionRecord, PrincipalRecord, Tables};
pub use transaction::Transaction;

/// Transactional record store over a durability [`Backend`].
pub struct Store {
    committed: Mutex<Tables>,
    backend: Box<dyn Backend>,
}

impl Store {
    /// Open a store, loading any state the backend already holds.
    pub fn open(backend: impl Backend + 'static) -> StoreResult<Self> {
        let tables = backend.load()?.unwrap_or_default();
        Ok(Self {
            committed: Mutex::new(tables),
            backend: Box::new(backend),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            committed: Mutex::new(Tables::default()),
            backend: Box::new(MemoryBackend),
        }
    }

    /// Run `f` as one unit of work. Its writes become visible and durable
    /// together, or not at all.
    pub fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut committed = self.lock();
        let mut tx = Transaction::new(&committed);
        let output = f(&mut tx)?;
        let changes = tx.into_changes();
        if changes.is_empty() {
            return Ok(output);
        }

        if let Err(e) = self.backend.commit(&changes) {
            tracing::error!(error = %e, "Commit failed, rolling back unit of work");
            return Err(e.into());
        }
        committed.apply(changes);
        Ok(output)
    }

    /// Read committed state.
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        f(&self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.committed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
