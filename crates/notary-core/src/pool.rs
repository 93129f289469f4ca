//! The pending-transaction pool: admission, snapshots, removal.

use crate::{now_millis, Transaction};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tracing::debug;

/// A pending transaction plus its admission timestamp. This is the stable
/// external form of a pool entry.
///
/// Unlike [`Transaction`], absent optionals serialize as explicit nulls;
/// records also pass through bincode, which cannot skip fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRecord {
    pub id: String,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    pub timestamp: u64,
    pub data: String,
    pub admitted_at: u64,
}

impl PendingRecord {
    pub fn new(tx: Transaction, admitted_at: u64) -> Self {
        Self {
            id: tx.id,
            public_key: tx.public_key,
            signature: tx.signature,
            timestamp: tx.timestamp,
            data: tx.data,
            admitted_at,
        }
    }

    /// The packaged form, without the pool bookkeeping.
    pub fn transaction(&self) -> Transaction {
        Transaction {
            id: self.id.clone(),
            public_key: self.public_key.clone(),
            signature: self.signature.clone(),
            timestamp: self.timestamp,
            data: self.data.clone(),
        }
    }
}

/// Admission-ordered queue of transactions waiting to be packaged.
///
/// Lives in `notary-core` so storage backends can implement it without a
/// circular dependency. Admission is idempotent by id: the first admission
/// wins and later ones report `Ok(false)` without touching the stored entry.
pub trait TransactionPool: Send + Sync {
    /// Admit `tx`. `Ok(false)` when the id is empty or already pooled.
    fn admit(&self, tx: Transaction) -> Result<bool>;

    /// Point-in-time copy of the pending transactions, oldest admission
    /// first. Later pool churn never changes a snapshot already taken.
    fn snapshot(&self) -> Result<Vec<Transaction>>;

    /// The pending records with their admission timestamps, oldest first.
    fn records(&self) -> Result<Vec<PendingRecord>>;

    /// Delete the records with the given ids. Unknown ids are skipped.
    /// Returns how many records were actually removed.
    fn remove(&self, ids: &[String]) -> Result<usize>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[derive(Default)]
struct MemoryPoolInner {
    next_seq: u64,
    records: BTreeMap<u64, PendingRecord>,
    ids: HashMap<String, u64>,
}

/// In-memory pool for tests and ephemeral nodes. Same contract as the
/// sled-backed pool, minus durability.
#[derive(Default)]
pub struct MemoryPool {
    inner: Mutex<MemoryPoolInner>,
}

impl MemoryPool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionPool for MemoryPool {
    fn admit(&self, tx: Transaction) -> Result<bool> {
        if tx.id.is_empty() {
            debug!("dropping transaction with an empty id");
            return Ok(false);
        }
        let mut inner = self.inner.lock().expect("pool lock");
        if inner.ids.contains_key(&tx.id) {
            debug!(id = %tx.id, "transaction already pooled, ignoring");
            return Ok(false);
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.ids.insert(tx.id.clone(), seq);
        inner.records.insert(seq, PendingRecord::new(tx, now_millis()));
        Ok(true)
    }

    fn snapshot(&self) -> Result<Vec<Transaction>> {
        let inner = self.inner.lock().expect("pool lock");
        Ok(inner.records.values().map(PendingRecord::transaction).collect())
    }

    fn records(&self) -> Result<Vec<PendingRecord>> {
        let inner = self.inner.lock().expect("pool lock");
        Ok(inner.records.values().cloned().collect())
    }

    fn remove(&self, ids: &[String]) -> Result<usize> {
        let mut inner = self.inner.lock().expect("pool lock");
        let mut removed = 0;
        for id in ids {
            if let Some(seq) = inner.ids.remove(id) {
                inner.records.remove(&seq);
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "dropped packaged transactions from the pool");
        }
        Ok(removed)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.inner.lock().expect("pool lock").records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: &str, data: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            public_key: None,
            signature: None,
            timestamp: 1_600_000_000_000,
            data: data.to_string(),
        }
    }

    #[test]
    fn snapshot_preserves_admission_order() {
        let pool = MemoryPool::new();
        for id in ["c", "a", "b"] {
            assert!(pool.admit(tx(id, "payload")).unwrap());
        }
        let ids: Vec<String> = pool.snapshot().unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn duplicate_admission_keeps_the_first_entry() {
        let pool = MemoryPool::new();
        assert!(pool.admit(tx("a", "first")).unwrap());
        assert!(!pool.admit(tx("a", "second")).unwrap());
        let snapshot = pool.snapshot().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].data, "first");
    }

    #[test]
    fn empty_id_is_rejected() {
        let pool = MemoryPool::new();
        assert!(!pool.admit(tx("", "x")).unwrap());
        assert!(pool.is_empty().unwrap());
    }

    #[test]
    fn remove_skips_unknown_ids() {
        let pool = MemoryPool::new();
        for id in ["a", "b", "c"] {
            pool.admit(tx(id, "payload")).unwrap();
        }
        let removed = pool
            .remove(&["b".to_string(), "nope".to_string()])
            .unwrap();
        assert_eq!(removed, 1);
        let ids: Vec<String> = pool.snapshot().unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn removed_id_can_be_admitted_again() {
        let pool = MemoryPool::new();
        pool.admit(tx("a", "first")).unwrap();
        pool.remove(&["a".to_string()]).unwrap();
        assert!(pool.admit(tx("a", "again")).unwrap());
        assert_eq!(pool.snapshot().unwrap()[0].data, "again");
    }

    #[test]
    fn records_carry_admission_time() {
        let pool = MemoryPool::new();
        let before = crate::now_millis();
        pool.admit(tx("a", "x")).unwrap();
        let records = pool.records().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].admitted_at >= before);
        assert_eq!(records[0].transaction(), tx("a", "x"));
    }

    #[test]
    fn snapshot_is_a_point_in_time_copy() {
        let pool = MemoryPool::new();
        pool.admit(tx("a", "x")).unwrap();
        let snapshot = pool.snapshot().unwrap();
        pool.admit(tx("b", "y")).unwrap();
        pool.remove(&["a".to_string()]).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, "a");
    }
}
