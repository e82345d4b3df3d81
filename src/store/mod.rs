//! Transaction persistence ports.
//!
//! The dispatcher treats persistence as an opaque key/value-by-id store with
//! atomic save. One store per SEP family; the repository facade routes
//! between them.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::transaction::{Sep, SepTransaction};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("transaction[{0}] was modified concurrently")]
    Conflict(String),

    #[error("store failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn find(&self, id: &str) -> StoreResult<Option<SepTransaction>>;

    /// Create a row. Used by ingress, which is outside the dispatcher.
    async fn insert(&self, txn: SepTransaction) -> StoreResult<()>;

    /// Atomically replace a row, guarded by the `updated_at` value observed
    /// at lookup. A mismatch means another mutation won the race.
    async fn save(
        &self,
        txn: SepTransaction,
        seen_updated_at: DateTime<Utc>,
    ) -> StoreResult<SepTransaction>;
}

/// Lookup and save across the SEP-24 and SEP-31 stores.
#[derive(Clone)]
pub struct TransactionRepository {
    sep24: Arc<dyn TransactionStore>,
    sep31: Arc<dyn TransactionStore>,
}

impl TransactionRepository {
    pub fn new(sep24: Arc<dyn TransactionStore>, sep31: Arc<dyn TransactionStore>) -> Self {
        Self { sep24, sep31 }
    }

    /// Consult both stores; the id spaces are disjoint by construction, and
    /// SEP-24 wins if they ever were not.
    pub async fn lookup(&self, id: &str) -> StoreResult<Option<SepTransaction>> {
        if let Some(txn) = self.sep24.find(id).await? {
            return Ok(Some(txn));
        }
        self.sep31.find(id).await
    }

    /// Stamp `updated_at` and persist. This must be the last side effect of
    /// a handler invocation.
    pub async fn save(
        &self,
        mut txn: SepTransaction,
        seen_updated_at: DateTime<Utc>,
    ) -> StoreResult<SepTransaction> {
        txn.updated_at = Utc::now();
        self.store_for(txn.sep).save(txn, seen_updated_at).await
    }

    pub async fn insert(&self, txn: SepTransaction) -> StoreResult<()> {
        self.store_for(txn.sep).insert(txn).await
    }

    fn store_for(&self, sep: Sep) -> &Arc<dyn TransactionStore> {
        match sep {
            Sep::Sep24 => &self.sep24,
            Sep::Sep31 => &self.sep31,
        }
    }
}
