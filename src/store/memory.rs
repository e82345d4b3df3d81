//! In-memory transaction store with optimistic concurrency.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{StoreError, StoreResult, TransactionStore};
use crate::domain::transaction::SepTransaction;

#[derive(Default)]
pub struct InMemoryTransactionStore {
    rows: RwLock<HashMap<String, SepTransaction>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn find(&self, id: &str) -> StoreResult<Option<SepTransaction>> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn insert(&self, txn: SepTransaction) -> StoreResult<()> {
        self.rows.write().await.insert(txn.id.clone(), txn);
        Ok(())
    }

    async fn save(
        &self,
        txn: SepTransaction,
        seen_updated_at: DateTime<Utc>,
    ) -> StoreResult<SepTransaction> {
        let mut rows = self.rows.write().await;
        match rows.get(&txn.id) {
            Some(current) if current.updated_at == seen_updated_at => {
                rows.insert(txn.id.clone(), txn.clone());
                Ok(txn)
            }
            // A missing row at save time also means we lost the race.
            _ => Err(StoreError::Conflict(txn.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::{Kind, Sep, SepTransactionStatus};

    fn txn(id: &str) -> SepTransaction {
        SepTransaction::new(
            id,
            Sep::Sep24,
            Kind::Deposit,
            SepTransactionStatus::PendingAnchor,
        )
    }

    #[tokio::test]
    async fn find_returns_inserted_row() {
        let store = InMemoryTransactionStore::new();
        store.insert(txn("t1")).await.unwrap();
        assert!(store.find("t1").await.unwrap().is_some());
        assert!(store.find("t2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_succeeds_when_version_matches() {
        let store = InMemoryTransactionStore::new();
        let original = txn("t1");
        let seen = original.updated_at;
        store.insert(original.clone()).await.unwrap();

        let mut updated = original;
        updated.status = SepTransactionStatus::PendingExternal;
        updated.updated_at = Utc::now();
        let saved = store.save(updated, seen).await.unwrap();
        assert_eq!(saved.status, SepTransactionStatus::PendingExternal);
    }

    #[tokio::test]
    async fn save_conflicts_on_stale_version() {
        let store = InMemoryTransactionStore::new();
        let original = txn("t1");
        store.insert(original.clone()).await.unwrap();

        let stale = original.updated_at - chrono::Duration::seconds(1);
        let result = store.save(original, stale).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn save_conflicts_on_missing_row() {
        let store = InMemoryTransactionStore::new();
        let row = txn("t1");
        let seen = row.updated_at;
        let result = store.save(row, seen).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }
}
