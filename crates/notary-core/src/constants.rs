pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

pub const GENESIS_INDEX: u64 = 1;
pub const GENESIS_PREVIOUS_HASH: &str = "0";

pub const DEFAULT_DIFFICULTY: usize = 4;

/// Nonces between tip-staleness probes during a search.
pub const STALE_CHECK_INTERVAL: u64 = 10_000;

/// Nonces between progress log lines during a search.
pub const PROGRESS_LOG_INTERVAL: u64 = 500_000;
