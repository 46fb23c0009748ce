use blake2::{Blake2b512, Digest};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

pub mod assemble;
pub mod config;
pub mod constants;
pub mod difficulty;
mod error;
pub mod headers;
pub mod merkle;
pub mod mine;
pub mod pow;
pub mod work;

pub use config::NetworkConfig;
pub use error::{Error, Result};
pub use headers::HeaderSet;

/// BLAKE2b-512 of `input`, keeping the low 32 bytes as 64 lowercase hex chars.
pub fn blake2bl(input: &str) -> String {
    let mut hasher = Blake2b512::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[32..])
}

/// A block observed on a rovered chain, normalized by its rover.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoveredBlock {
    pub chain_id: String,
    pub hash: String,
    pub previous_hash: String,
    pub timestamp: u64,
    pub height: u64,
    pub merkle_root: String,
    #[serde(default)]
    pub tx_ids: Vec<String>,
}

impl RoveredBlock {
    pub fn to_header(&self, confirmations_in_parent: u64) -> ExternalHeader {
        ExternalHeader {
            chain_id: self.chain_id.clone(),
            hash: self.hash.clone(),
            previous_hash: self.previous_hash.clone(),
            timestamp: self.timestamp,
            height: self.height,
            merkle_root: self.merkle_root.clone(),
            confirmations_in_parent,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalHeader {
    pub chain_id: String,
    pub hash: String,
    pub previous_hash: String,
    pub timestamp: u64,
    pub height: u64,
    pub merkle_root: String,
    pub confirmations_in_parent: u64,
}

impl ExternalHeader {
    /// `blake2bl(hash + merkle_root)`, the header's contribution to a block.
    pub fn fingerprint(&self) -> String {
        blake2bl(&format!("{}{}", self.hash, self.merkle_root))
    }

    /// Same header, different confirmation count.
    pub fn with_confirmations(&self, confirmations_in_parent: u64) -> Self {
        Self {
            confirmations_in_parent,
            ..self.clone()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub from: String,
    pub to: String,
    pub amount: u64,
    pub timestamp: u64,
}

impl Transaction {
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: u64, timestamp: u64) -> Self {
        let from = from.into();
        let to = to.into();
        let body = serde_json::json!({
            "from": from,
            "to": to,
            "amount": amount,
            "timestamp": timestamp,
        });
        Self {
            id: blake2bl(&body.to_string()),
            from,
            to,
            amount,
            timestamp,
        }
    }
}

/// The unified block assembled from every rovered chain.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BcBlock {
    pub hash: String,
    pub previous_hash: String,
    pub version: u32,
    pub schema_version: u32,
    pub height: u64,
    pub miner: String,
    #[serde(with = "decimal")]
    pub difficulty: BigUint,
    pub timestamp: u64,
    pub merkle_root: String,
    pub chain_root: String,
    #[serde(with = "decimal")]
    pub distance: BigUint,
    #[serde(with = "decimal")]
    pub total_distance: BigUint,
    #[serde(default)]
    pub nonce: Option<String>,
    pub nrg_grant: u64,
    pub target_hash: String,
    pub target_height: u64,
    pub target_miner: String,
    pub target_signature: String,
    pub twn: u64,
    pub tws: Vec<String>,
    pub emblem_weight: u64,
    pub emblem_chain_block_hash: String,
    pub emblem_chain_fingerprint_root: String,
    pub emblem_chain_address: String,
    pub tx_count: u64,
    pub txs: Vec<Transaction>,
    pub blockchain_headers_count: u64,
    pub blockchain_fingerprints_root: String,
    pub tx_fee_base: u64,
    pub tx_distance_sum_limit: u64,
    pub blockchain_headers: HeaderSet,
}

impl BcBlock {
    /// Merge a successful search into this unmined block.
    pub fn apply_mining_result(&mut self, result: &MiningResult) {
        self.nonce = Some(result.nonce.clone());
        self.distance = result.distance.clone();
        self.total_distance += &result.distance;
        self.timestamp = result.timestamp;
        self.difficulty = result.difficulty.clone();
    }

    pub fn is_mined(&self) -> bool {
        self.nonce.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningResult {
    pub nonce: String,
    #[serde(with = "decimal")]
    pub distance: BigUint,
    pub timestamp: u64,
    #[serde(with = "decimal")]
    pub difficulty: BigUint,
    pub iterations: u64,
    pub elapsed_ms: u64,
}

/// Serde adapter writing big integers as decimal strings.
pub mod decimal {
    use num_bigint::BigUint;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let raw = String::deserialize(deserializer)?;
        BigUint::parse_bytes(raw.as_bytes(), 10)
            .ok_or_else(|| D::Error::custom(format!("invalid decimal integer {raw:?}")))
    }
}
