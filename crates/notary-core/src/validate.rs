//! Canonical hashing and the block/chain validity rules.
//!
//! Everything here is pure and returns `bool`. Invalid blocks and stale
//! forks arrive routinely over the network, so a failed check logs the
//! reason at `warn` and the caller moves on.

use crate::constants::{GENESIS_INDEX, GENESIS_PREVIOUS_HASH};
use crate::{Block, Transaction};
use sha2::{Digest, Sha256};
use tracing::warn;

/// Hash binding a block to its predecessor and contents:
/// `sha256(previous_hash || json(transactions) || decimal nonce)`, lowercase
/// hex. Transaction order is part of the input.
pub fn canonical_hash(previous_hash: &str, transactions: &[Transaction], nonce: u64) -> String {
    let serialized = serde_json::to_string(transactions).expect("transactions serialize");
    let mut hasher = Sha256::new();
    hasher.update(previous_hash.as_bytes());
    hasher.update(serialized.as_bytes());
    hasher.update(nonce.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// True iff `hash` starts with `difficulty` `'0'` hex characters.
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

/// Validate `candidate` against its predecessor, or against the genesis
/// rules when `previous` is `None`. Checks difficulty first, then that the
/// recorded hash matches the contents, then the linkage.
pub fn validate_block(candidate: &Block, previous: Option<&Block>, difficulty: usize) -> bool {
    if !meets_difficulty(&candidate.hash, difficulty) {
        warn!(
            index = candidate.index,
            hash = %candidate.hash,
            difficulty,
            "block hash misses the difficulty target"
        );
        return false;
    }
    let computed = canonical_hash(&candidate.previous_hash, &candidate.transactions, candidate.nonce);
    if computed != candidate.hash {
        warn!(
            index = candidate.index,
            recorded = %candidate.hash,
            %computed,
            "block hash does not match its contents"
        );
        return false;
    }
    match previous {
        Some(prev) => {
            if candidate.index != prev.index + 1 {
                warn!(
                    expected = prev.index + 1,
                    actual = candidate.index,
                    "block index out of sequence"
                );
                return false;
            }
            if candidate.previous_hash != prev.hash {
                warn!(
                    index = candidate.index,
                    expected = %prev.hash,
                    actual = %candidate.previous_hash,
                    "previous-hash link broken"
                );
                return false;
            }
        }
        None => {
            if candidate.index != GENESIS_INDEX {
                warn!(index = candidate.index, "first block must carry index 1");
                return false;
            }
            if candidate.previous_hash != GENESIS_PREVIOUS_HASH {
                warn!(
                    previous_hash = %candidate.previous_hash,
                    "first block must link to the genesis sentinel"
                );
                return false;
            }
        }
    }
    true
}

/// Validate a whole chain oldest-first. Empty chains are invalid.
pub fn validate_chain(chain: &[Block], difficulty: usize) -> bool {
    let Some(first) = chain.first() else {
        warn!("rejecting empty candidate chain");
        return false;
    };
    if !validate_block(first, None, difficulty) {
        return false;
    }
    chain
        .windows(2)
        .all(|pair| validate_block(&pair[1], Some(&pair[0]), difficulty))
}
