//! Notification and block payloads.
//!
//! Hashes are pseudo-hashes: SHA-256 of `"{chain}-{height}-{field}"`. They
//! are stable across runs so fixtures can be compared, and carry no
//! cryptographic meaning.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::chain::solana::ROOT_DISTANCE;

const ZERO_HASH: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";
const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";
const BLOOM_BYTES: usize = 256;
const GAS_LIMIT: u64 = 30_000_000;

fn digest(chain_key: &str, height: u64, field: &str) -> [u8; 32] {
    Sha256::digest(format!("{chain_key}-{height}-{field}").as_bytes()).into()
}

/// `0x`-prefixed SHA-256 of `"{chain_key}-{height}-{field}"`.
pub fn pseudo_hash(chain_key: &str, height: u64, field: &str) -> String {
    format!("0x{}", hex::encode(digest(chain_key, height, field)))
}

/// Hash of the block at `height`.
pub fn block_hash(chain_key: &str, height: u64) -> String {
    pseudo_hash(chain_key, height, "block")
}

/// Hash of the parent of `height`; the zero hash for genesis.
pub fn parent_hash(chain_key: &str, height: u64) -> String {
    match height {
        0 => ZERO_HASH.to_string(),
        h => block_hash(chain_key, h - 1),
    }
}

/// Hex quantity encoding without leading zeros.
pub fn quantity(n: u64) -> String {
    format!("{n:#x}")
}

fn hex_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// EVM block header as delivered by `newHeads` and `eth_getBlockByNumber`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub number: String,
    pub hash: String,
    pub parent_hash: String,
    pub timestamp: String,
    pub gas_limit: String,
    pub gas_used: String,
    pub miner: String,
    pub difficulty: String,
    pub total_difficulty: String,
    pub size: String,
    pub nonce: String,
    pub extra_data: String,
    pub base_fee_per_gas: String,
    pub sha3_uncles: String,
    pub logs_bloom: String,
    pub transactions_root: String,
    pub state_root: String,
    pub receipts_root: String,
    pub uncles: Vec<String>,
    pub transactions: Vec<Transaction>,
}

impl BlockHeader {
    /// Header of block `height` on `chain_key`, without transactions.
    pub fn new(chain_key: &str, height: u64) -> Self {
        let seed = digest(chain_key, height, "header");
        let word = |i: usize| u64::from_be_bytes(seed[i * 8..i * 8 + 8].try_into().unwrap_or_default());

        let bloom_seed = digest(chain_key, height, "logsBloom");
        let logs_bloom: Vec<u8> = bloom_seed.iter().copied().cycle().take(BLOOM_BYTES).collect();

        Self {
            number: quantity(height),
            hash: block_hash(chain_key, height),
            parent_hash: parent_hash(chain_key, height),
            timestamp: quantity(unix_now()),
            gas_limit: quantity(GAS_LIMIT),
            gas_used: quantity(word(0) % GAS_LIMIT),
            miner: ZERO_ADDRESS.to_string(),
            difficulty: quantity(0),
            total_difficulty: quantity(word(1) >> 8),
            size: quantity(512 + word(2) % 100_000),
            nonce: "0x0000000000000000".to_string(),
            extra_data: "0x".to_string(),
            base_fee_per_gas: quantity(1_000_000_000 + word(3) % 50_000_000_000),
            sha3_uncles: pseudo_hash(chain_key, height, "sha3Uncles"),
            logs_bloom: hex_bytes(&logs_bloom),
            transactions_root: pseudo_hash(chain_key, height, "transactionsRoot"),
            state_root: pseudo_hash(chain_key, height, "stateRoot"),
            receipts_root: pseudo_hash(chain_key, height, "receiptsRoot"),
            uncles: Vec::new(),
            transactions: Vec::new(),
        }
    }

    /// Header with 1 to 5 transactions derived from the block hash, so the
    /// same height always yields the same transactions.
    pub fn with_transactions(chain_key: &str, height: u64) -> Self {
        let mut header = Self::new(chain_key, height);
        let mut rng = StdRng::from_seed(digest(chain_key, height, "block"));
        let count = rng.gen_range(1..=5);
        header.transactions = (0..count)
            .map(|index| Transaction::generate(chain_key, height, &header.hash, index, &mut rng))
            .collect();
        header
    }
}

/// A synthetic transaction embedded in `newHeadsWithTx` headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    pub nonce: String,
    pub block_hash: String,
    pub block_number: String,
    pub transaction_index: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub gas: String,
    pub gas_price: String,
    pub input: String,
    pub v: String,
    pub r: String,
    pub s: String,
}

impl Transaction {
    fn generate(chain_key: &str, height: u64, block_hash: &str, index: u64, rng: &mut StdRng) -> Self {
        let mut address = || {
            let bytes: [u8; 20] = rng.gen();
            hex_bytes(&bytes)
        };
        let from = address();
        let to = address();
        Self {
            hash: pseudo_hash(chain_key, height, &format!("tx-{index}")),
            nonce: quantity(rng.gen_range(0..100_000)),
            block_hash: block_hash.to_string(),
            block_number: quantity(height),
            transaction_index: quantity(index),
            from,
            to,
            value: quantity(rng.gen_range(0..1_000_000_000_000_000_000)),
            gas: quantity(21_000),
            gas_price: quantity(rng.gen_range(1_000_000_000..100_000_000_000)),
            input: "0x".to_string(),
            v: quantity(27 + rng.gen_range(0..2)),
            r: pseudo_hash(chain_key, height, &format!("tx-{index}-r")),
            s: pseudo_hash(chain_key, height, &format!("tx-{index}-s")),
        }
    }
}

/// A synthetic log delivered to `logs` subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: String,
    pub transaction_hash: String,
    pub transaction_index: String,
    pub block_hash: String,
    pub log_index: String,
    pub removed: bool,
}

impl LogEvent {
    /// The `position`-th log of block `height`, stamped with the chain-wide
    /// `log_index`.
    pub fn new(chain_key: &str, height: u64, position: u64, log_index: u64) -> Self {
        let tag = format!("log-{position}");
        Self {
            address: hex_bytes(&digest(chain_key, height, &format!("{tag}-address"))[..20]),
            topics: vec![pseudo_hash(chain_key, height, &format!("{tag}-topic"))],
            data: pseudo_hash(chain_key, height, &format!("{tag}-data")),
            block_number: quantity(height),
            transaction_hash: pseudo_hash(chain_key, height, &format!("tx-{position}")),
            transaction_index: quantity(position),
            block_hash: block_hash(chain_key, height),
            log_index: quantity(log_index),
            removed: false,
        }
    }
}

/// Solana `slotNotification` result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub parent: u64,
    pub root: u64,
    pub slot: u64,
}

impl SlotInfo {
    pub fn at(slot: u64) -> Self {
        Self {
            parent: slot.saturating_sub(1),
            root: root_of(slot),
            slot,
        }
    }
}

/// Root slot trailing `slot`, zero while the chain is too short.
pub fn root_of(slot: u64) -> u64 {
    slot.saturating_sub(ROOT_DISTANCE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pseudo_hash_is_stable_and_distinct() {
        let a = pseudo_hash("1", 100, "block");
        assert_eq!(a, pseudo_hash("1", 100, "block"));
        assert_ne!(a, pseudo_hash("10", 100, "block"));
        assert_ne!(a, pseudo_hash("1", 101, "block"));
        assert_eq!(a.len(), 66);
        assert!(a.starts_with("0x"));
    }

    #[test]
    fn genesis_parent_is_zero_hash() {
        assert_eq!(parent_hash("1", 0), ZERO_HASH);
        assert_eq!(parent_hash("1", 5), block_hash("1", 4));
    }

    #[test]
    fn header_fields() {
        let header = BlockHeader::new("1", 255);
        assert_eq!(header.number, "0xff");
        assert_eq!(header.logs_bloom.len(), 2 + BLOOM_BYTES * 2);
        assert!(header.transactions.is_empty());

        let json = serde_json::to_value(&header).unwrap();
        for field in ["parentHash", "sha3Uncles", "logsBloom", "transactionsRoot", "stateRoot", "receiptsRoot"] {
            assert!(json.get(field).is_some(), "{field}");
        }
    }

    #[test]
    fn transactions_are_deterministic_per_height() {
        let a = BlockHeader::with_transactions("1", 42);
        let b = BlockHeader::with_transactions("1", 42);
        assert_eq!(a.transactions, b.transactions);
        assert!((1..=5).contains(&a.transactions.len()));
        assert!(a.transactions.iter().all(|tx| tx.block_hash == a.hash));
    }

    #[test]
    fn slot_info_trails() {
        assert_eq!(SlotInfo::at(2), SlotInfo { parent: 1, root: 0, slot: 2 });
        assert_eq!(SlotInfo::at(10), SlotInfo { parent: 9, root: 7, slot: 10 });
        assert_eq!(SlotInfo::at(0).parent, 0);
    }

    #[test]
    fn log_event_uses_block_hash() {
        let log = LogEvent::new("1", 7, 2, 40);
        assert_eq!(log.block_hash, block_hash("1", 7));
        assert_eq!(log.log_index, "0x28");
        assert_eq!(log.transaction_index, "0x2");
    }
}
