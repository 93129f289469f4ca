//! The authoritative block sequence and the fork-choice rule.

use crate::pool::TransactionPool;
use crate::validate::{validate_block, validate_chain};
use crate::{Block, Transaction};
use std::sync::Mutex;
use tracing::{info, warn};

#[derive(Default)]
struct LedgerInner {
    blocks: Vec<Block>,
    packaged: Vec<Transaction>,
}

/// In-process ledger: the accepted block sequence plus a derived index of
/// every packaged transaction, in chain order. One instance per node,
/// shared by `Arc`. Appends and whole-chain swaps take the same lock, so a
/// read-validate-append sequence never interleaves with a replacement.
pub struct LedgerStore {
    inner: Mutex<LedgerInner>,
    difficulty: usize,
}

impl LedgerStore {
    /// An empty store accepting blocks whose hashes carry `difficulty`
    /// leading zero hex characters. Fixed for the life of the instance.
    pub fn new(difficulty: usize) -> Self {
        Self {
            inner: Mutex::new(LedgerInner::default()),
            difficulty,
        }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// The most recently accepted block, if any.
    pub fn latest(&self) -> Option<Block> {
        self.inner.lock().expect("ledger lock").blocks.last().cloned()
    }

    /// The genesis block, if the chain is initialized.
    pub fn first(&self) -> Option<Block> {
        self.inner.lock().expect("ledger lock").blocks.first().cloned()
    }

    /// Block count. Indexes are 1-based, so this equals the tip index.
    pub fn height(&self) -> u64 {
        self.inner.lock().expect("ledger lock").blocks.len() as u64
    }

    /// Hash of the current tip. Cheap staleness probe for the miner.
    pub fn tip_hash(&self) -> Option<String> {
        self.inner
            .lock()
            .expect("ledger lock")
            .blocks
            .last()
            .map(|b| b.hash.clone())
    }

    /// A copy of the full chain, oldest first.
    pub fn current_chain(&self) -> Vec<Block> {
        self.inner.lock().expect("ledger lock").blocks.clone()
    }

    /// Every transaction packaged into an accepted block, in chain order.
    pub fn packaged_transactions(&self) -> Vec<Transaction> {
        self.inner.lock().expect("ledger lock").packaged.clone()
    }

    /// Validate `candidate` against the current tip and append it. Returns
    /// false when the candidate no longer fits; the store is unchanged.
    pub fn append(&self, candidate: &Block) -> bool {
        let mut inner = self.inner.lock().expect("ledger lock");
        if !validate_block(candidate, inner.blocks.last(), self.difficulty) {
            warn!(index = candidate.index, "rejecting block");
            return false;
        }
        inner.packaged.extend(candidate.transactions.iter().cloned());
        inner.blocks.push(candidate.clone());
        info!(index = candidate.index, hash = %candidate.hash, "block accepted");
        true
    }

    /// Fork-choice: adopt `candidate` iff it is valid in full and strictly
    /// longer than the local chain. On adoption the packaged index is
    /// rebuilt and `pool` is reconciled, dropping pending entries the new
    /// chain already packages. Anything else leaves the store untouched.
    pub fn replace_chain<P: TransactionPool + ?Sized>(&self, candidate: Vec<Block>, pool: &P) -> bool {
        let packaged_ids: Vec<String>;
        {
            let mut inner = self.inner.lock().expect("ledger lock");
            if !validate_chain(&candidate, self.difficulty) {
                warn!(received = candidate.len(), "ignoring invalid candidate chain");
                return false;
            }
            if candidate.len() <= inner.blocks.len() {
                info!(
                    local = inner.blocks.len(),
                    received = candidate.len(),
                    "ignoring candidate chain that is not longer"
                );
                return false;
            }
            info!(
                local = inner.blocks.len(),
                received = candidate.len(),
                "adopting longer valid chain"
            );
            inner.packaged = candidate
                .iter()
                .flat_map(|b| b.transactions.iter().cloned())
                .collect();
            packaged_ids = inner.packaged.iter().map(|tx| tx.id.clone()).collect();
            inner.blocks = candidate;
        }
        // Reconcile outside the ledger lock; the pool has its own.
        match pool.remove(&packaged_ids) {
            Ok(removed) if removed > 0 => {
                info!(removed, "dropped pool entries packaged by the adopted chain");
            }
            Ok(_) => {}
            Err(err) => warn!(%err, "pool reconciliation failed after adopting chain"),
        }
        true
    }

    /// Scan packaged transactions for a payload accepted by `matches`,
    /// preferring the match in the block with the highest timestamp. Within
    /// one block the earliest matching transaction wins. Payload
    /// interpretation stays with the caller.
    pub fn find_anchor<F>(&self, matches: F) -> Option<String>
    where
        F: Fn(&str) -> bool,
    {
        let inner = self.inner.lock().expect("ledger lock");
        let mut best: Option<(u64, &str)> = None;
        for block in inner.blocks.iter().rev() {
            for tx in &block.transactions {
                if matches(&tx.data) && best.is_none_or(|(ts, _)| block.timestamp > ts) {
                    best = Some((block.timestamp, &tx.data));
                }
            }
        }
        best.map(|(_, data)| data.to_string())
    }
}
