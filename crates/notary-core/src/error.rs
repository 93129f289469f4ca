use thiserror::Error;

/// Failures surfaced by the mining path. An invalid block or a rejected
/// candidate chain is not an error (validation returns `false`); these are
/// the cases a caller has to react to.
#[derive(Debug, Error)]
pub enum MineError {
    /// `mine` was called on an empty chain. Create the genesis block first.
    #[error("chain not initialized: create the genesis block first")]
    ChainNotInitialized,

    /// The tip advanced while searching or committing. The candidate was
    /// discarded and the pool left untouched.
    #[error("chain advanced during mining, candidate discarded")]
    StaleTip,

    /// The pending pool failed underneath the miner.
    #[error("transaction pool failure: {0}")]
    Pool(#[from] anyhow::Error),
}

impl MineError {
    /// True when re-reading the tip, re-snapshotting the pool and searching
    /// again is expected to succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MineError::StaleTip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_tip_is_retryable() {
        assert!(MineError::StaleTip.is_retryable());
        assert!(!MineError::ChainNotInitialized.is_retryable());
        assert!(!MineError::Pool(anyhow::anyhow!("disk full")).is_retryable());
    }

    #[test]
    fn error_messages_name_the_remedy() {
        let msg = MineError::ChainNotInitialized.to_string();
        assert!(msg.contains("genesis"));
    }
}
