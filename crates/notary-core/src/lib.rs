use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod chain;
pub mod constants;
pub mod error;
pub mod mine;
pub mod pool;
pub mod validate;

pub use chain::LedgerStore;
pub use error::MineError;
pub use mine::{Broadcaster, Miner, NoopBroadcaster};
pub use pool::{MemoryPool, PendingRecord, TransactionPool};

/// A transaction as packaged into blocks. The `data` payload is opaque to
/// the ledger; collaborating services put document anchors or plain notes in
/// it and interpret it on the way out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub timestamp: u64,
    pub data: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub nonce: u64,
    pub previous_hash: String,
    pub hash: String,
}

/// Milliseconds since the unix epoch. Block and transaction timestamps.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_serialization_example() {
        let tx = Transaction {
            id: "tx-1".to_string(),
            public_key: Some("02a1b2".to_string()),
            signature: Some("3045aa".to_string()),
            timestamp: 1_600_000_000_000,
            data: "hello".to_string(),
        };
        let json = serde_json::to_string(&tx).unwrap();
        let expected_json = r#"{"id":"tx-1","publicKey":"02a1b2","signature":"3045aa","timestamp":1600000000000,"data":"hello"}"#;
        assert_eq!(json, expected_json);
        let deserialized: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, deserialized);
    }

    #[test]
    fn transaction_serialization_omits_absent_fields() {
        let tx = Transaction {
            id: "tx-2".to_string(),
            public_key: None,
            signature: None,
            timestamp: 1_600_000_000_000,
            data: "x".to_string(),
        };
        let json = serde_json::to_string(&tx).unwrap();
        let expected_json = r#"{"id":"tx-2","timestamp":1600000000000,"data":"x"}"#;
        assert_eq!(json, expected_json);
        let deserialized: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, deserialized);
    }

    #[test]
    fn block_serialization_example() {
        let block = Block {
            index: 1,
            timestamp: 1_600_000_000_000,
            transactions: vec![Transaction {
                id: "tx-1".to_string(),
                public_key: None,
                signature: None,
                timestamp: 1_600_000_000_000,
                data: "hello".to_string(),
            }],
            nonce: 42,
            previous_hash: "0".to_string(),
            hash: "00abcd".to_string(),
        };
        let json = serde_json::to_string(&block).unwrap();
        assert!(json.contains(r#""previousHash":"0""#));
        assert!(json.contains(r#""nonce":42"#));
        let deserialized: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(block, deserialized);
    }

    #[test]
    fn transaction_equality_example() {
        let tx1 = Transaction {
            id: "tx-1".to_string(),
            public_key: None,
            signature: None,
            timestamp: 1_600_000_000_000,
            data: "hello".to_string(),
        };
        let tx2 = tx1.clone();
        let tx3 = Transaction {
            data: "goodbye".to_string(),
            ..tx1.clone()
        };
        assert_eq!(tx1, tx2);
        assert_ne!(tx1, tx3);
    }

    #[test]
    fn now_millis_is_plausible() {
        // 2020-01-01 in millis; anything earlier means the clock source broke.
        assert!(now_millis() > 1_577_836_800_000);
    }
}
