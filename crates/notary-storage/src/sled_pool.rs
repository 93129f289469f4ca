use anyhow::{anyhow, Context, Result};
use notary_core::{now_millis, PendingRecord, Transaction, TransactionPool};
use sled::transaction::{TransactionResult, Transactional};
use sled::Db;
use std::path::Path;
use tracing::{debug, info};

const TREE_RECORDS: &str = "pending";
const TREE_IDS: &str = "pending_ids";

/// Durable pending-transaction pool.
///
/// Records live in one tree under a monotonic admission sequence, so plain
/// iteration is admission order. A second tree maps transaction id to that
/// sequence for dedup and removal. The two trees only change together,
/// inside one sled transaction.
#[derive(Clone)]
pub struct SledPool {
  db: Db,
  records: sled::Tree,
  ids: sled::Tree,
}

impl SledPool {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let db = sled::open(path)?;
    let records = db.open_tree(TREE_RECORDS)?;
    let ids = db.open_tree(TREE_IDS)?;
    info!("pending pool opened");
    Ok(Self { db, records, ids })
  }

  /// Drop every pending record. Operator escape hatch.
  pub fn clear(&self) -> Result<()> {
    self.records.clear()?;
    self.ids.clear()?;
    self.db.flush()?;
    Ok(())
  }

  pub fn close(&self) -> Result<()> {
    self.db.flush()?;
    Ok(())
  }

  fn load_records(&self) -> Result<Vec<PendingRecord>> {
    let mut out = Vec::new();
    for item in self.records.iter() {
      let (_, value) = item?;
      let record: PendingRecord =
        bincode::deserialize(&value).context("corrupt pending record")?;
      out.push(record);
    }
    Ok(out)
  }
}

impl TransactionPool for SledPool {
  fn admit(&self, tx: Transaction) -> Result<bool> {
    if tx.id.is_empty() {
      debug!("dropping transaction with an empty id");
      return Ok(false);
    }
    if self.ids.contains_key(tx.id.as_bytes())? {
      debug!(id = %tx.id, "transaction already pooled, ignoring");
      return Ok(false);
    }

    let seq = self.db.generate_id()?;
    let record = PendingRecord::new(tx, now_millis());
    let bytes = bincode::serialize(&record)?;
    let seq_key = seq.to_be_bytes();
    let id_key = record.id.as_bytes();

    // The id is re-checked inside the transaction so concurrent admitters
    // of the same id cannot both insert.
    let res: TransactionResult<bool, sled::Error> =
      (&self.records, &self.ids).transaction(|(records, ids)| {
        if ids.get(id_key)?.is_some() {
          return Ok(false);
        }
        records.insert(&seq_key[..], bytes.as_slice())?;
        ids.insert(id_key, &seq_key[..])?;
        Ok(true)
      });
    let admitted = res.map_err(|e| anyhow!("pending pool admission failed: {e}"))?;
    if !admitted {
      debug!(id = %record.id, "transaction already pooled, ignoring");
      return Ok(false);
    }

    self.db.flush()?;
    info!(id = %record.id, "transaction admitted to the pending pool");
    Ok(true)
  }

  fn snapshot(&self) -> Result<Vec<Transaction>> {
    Ok(
      self
        .load_records()?
        .iter()
        .map(PendingRecord::transaction)
        .collect(),
    )
  }

  fn records(&self) -> Result<Vec<PendingRecord>> {
    self.load_records()
  }

  fn remove(&self, ids: &[String]) -> Result<usize> {
    let mut removed = 0;
    for id in ids {
      let id_key = id.as_bytes();
      // The seq lookup runs inside the transaction so a concurrent
      // remove-and-readmit of the same id cannot orphan the new record.
      let res: TransactionResult<bool, sled::Error> =
        (&self.records, &self.ids).transaction(|(records, ids)| {
          let Some(seq_key) = ids.get(id_key)? else {
            return Ok(false);
          };
          records.remove(&seq_key[..])?;
          ids.remove(id_key)?;
          Ok(true)
        });
      if res.map_err(|e| anyhow!("pending pool removal failed: {e}"))? {
        removed += 1;
      }
    }
    if removed > 0 {
      self.db.flush()?;
      debug!(removed, "dropped packaged transactions from the pool");
    }
    Ok(removed)
  }

  fn len(&self) -> Result<usize> {
    Ok(self.records.len())
  }
}
