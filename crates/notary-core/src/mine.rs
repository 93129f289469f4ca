//! The proof-of-work search and the commit path around it.

use crate::chain::LedgerStore;
use crate::constants::{
    GENESIS_INDEX, GENESIS_PREVIOUS_HASH, PROGRESS_LOG_INTERVAL, STALE_CHECK_INTERVAL,
};
use crate::error::MineError;
use crate::pool::TransactionPool;
use crate::validate::{canonical_hash, meets_difficulty};
use crate::{now_millis, Block, Transaction};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Receives each block the miner commits. The transport owns delivery; the
/// miner fires and forgets.
pub trait Broadcaster: Send + Sync {
    fn broadcast_block(&self, block: &Block);
}

/// For nodes without peers, and for tests.
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn broadcast_block(&self, _block: &Block) {}
}

/// Drives the proof-of-work search against a store and a pool.
///
/// The search is a tight synchronous loop; run it on a dedicated worker
/// (the node uses `spawn_blocking`) so it never stalls request handling.
pub struct Miner<P: TransactionPool> {
    store: Arc<LedgerStore>,
    pool: Arc<P>,
    broadcaster: Arc<dyn Broadcaster>,
    node_id: String,
}

impl<P: TransactionPool> Miner<P> {
    pub fn new(
        store: Arc<LedgerStore>,
        pool: Arc<P>,
        broadcaster: Arc<dyn Broadcaster>,
        node_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            pool,
            broadcaster,
            node_id: node_id.into(),
        }
    }

    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    pub fn pool(&self) -> &Arc<P> {
        &self.pool
    }

    /// Create the genesis block if the chain is empty, otherwise return the
    /// existing first block unchanged. Idempotent.
    pub fn create_genesis(&self) -> Block {
        if let Some(existing) = self.store.first() {
            info!("genesis block already exists, leaving the chain untouched");
            return existing;
        }
        let timestamp = now_millis();
        let transactions = vec![
            Transaction {
                id: "1".to_string(),
                public_key: None,
                signature: None,
                timestamp,
                data: "genesis block".to_string(),
            },
            Transaction {
                id: "2".to_string(),
                public_key: None,
                signature: None,
                timestamp,
                data: "chain height: 1".to_string(),
            },
        ];
        info!(difficulty = self.store.difficulty(), "mining the genesis block");
        let started = Instant::now();
        let (nonce, hash) = search(GENESIS_PREVIOUS_HASH, &transactions, self.store.difficulty());
        info!(
            nonce,
            %hash,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "genesis block mined"
        );
        let genesis = Block {
            index: GENESIS_INDEX,
            timestamp,
            transactions,
            nonce,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            hash,
        };
        if self.store.append(&genesis) {
            genesis
        } else {
            // Lost a race with another initializer; the stored block wins.
            self.store.first().unwrap_or(genesis)
        }
    }

    /// Package the pending transactions into the next block.
    ///
    /// Fails with [`MineError::ChainNotInitialized`] before genesis, and
    /// with the retryable [`MineError::StaleTip`] when the chain advances
    /// under the search or under the final commit. In both stale cases the
    /// candidate is discarded and the pool stays untouched.
    pub fn mine(&self) -> Result<Block, MineError> {
        let latest = self.store.latest().ok_or(MineError::ChainNotInitialized)?;

        let mut transactions = self.pool.snapshot()?;
        if transactions.is_empty() {
            info!("pool is empty, packaging node-info filler transactions");
            transactions = self.filler_transactions(latest.index + 1);
        } else {
            info!(count = transactions.len(), "packaging pending transactions");
        }

        let difficulty = self.store.difficulty();
        let started = Instant::now();
        let mut nonce = 0u64;
        let hash = loop {
            let hash = canonical_hash(&latest.hash, &transactions, nonce);
            if meets_difficulty(&hash, difficulty) {
                break hash;
            }
            nonce += 1;
            if nonce % STALE_CHECK_INTERVAL == 0 {
                if self.store.tip_hash().as_deref() != Some(latest.hash.as_str()) {
                    warn!(nonce, "tip moved mid-search, abandoning candidate");
                    return Err(MineError::StaleTip);
                }
                if nonce % PROGRESS_LOG_INTERVAL == 0 {
                    debug!(nonce, "still searching");
                }
            }
        };
        info!(
            nonce,
            %hash,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "found block hash"
        );

        let candidate = Block {
            index: latest.index + 1,
            timestamp: now_millis(),
            transactions,
            nonce,
            previous_hash: latest.hash.clone(),
            hash,
        };

        if !self.store.append(&candidate) {
            warn!(index = candidate.index, "tip moved before commit, abandoning candidate");
            return Err(MineError::StaleTip);
        }

        let packaged: Vec<String> = candidate.transactions.iter().map(|tx| tx.id.clone()).collect();
        if let Err(err) = self.pool.remove(&packaged) {
            // The block is committed either way; the pool catches up on the
            // next reconciliation.
            warn!(%err, "failed to drop packaged transactions from the pool");
        }
        self.broadcaster.broadcast_block(&candidate);
        Ok(candidate)
    }

    /// Two deterministic transactions describing this node and the target
    /// height, so a mined block is never empty.
    fn filler_transactions(&self, height: u64) -> Vec<Transaction> {
        let timestamp = now_millis();
        vec![
            Transaction {
                id: filler_id(&self.node_id, height, 0),
                public_key: None,
                signature: None,
                timestamp,
                data: format!("mined by node {} with no pending transactions", self.node_id),
            },
            Transaction {
                id: filler_id(&self.node_id, height, 1),
                public_key: None,
                signature: None,
                timestamp,
                data: format!("block height: {height}"),
            },
        ]
    }
}

/// Tight nonce search: hash with increasing nonces until `difficulty` is
/// met. Used for genesis, where there is no tip to go stale.
fn search(previous_hash: &str, transactions: &[Transaction], difficulty: usize) -> (u64, String) {
    let mut nonce = 0u64;
    loop {
        let hash = canonical_hash(previous_hash, transactions, nonce);
        if meets_difficulty(&hash, difficulty) {
            return (nonce, hash);
        }
        nonce += 1;
        if nonce % PROGRESS_LOG_INTERVAL == 0 {
            debug!(nonce, "still searching");
        }
    }
}

/// Stable id for a filler transaction: re-mining the same height on the
/// same node reproduces it, so peers deduplicate instead of double-pooling.
fn filler_id(node_id: &str, height: u64, position: u8) -> String {
    let mut hasher = Sha256::new();
    hasher.update(node_id.as_bytes());
    hasher.update(height.to_be_bytes());
    hasher.update([position]);
    hex::encode(&hasher.finalize()[..16])
}
