//! Network genesis parameters. The core only consumes this; loading it from
//! disk is the caller's business.

use crate::constants::{BASE_MINIMUM_DIFFICULTY, MAX_TIMEOUT_SECONDS};
use crate::{blake2bl, BcBlock, HeaderSet};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub genesis_height: u64,
    pub genesis_hash: String,
    pub genesis_timestamp: u64,
    #[serde(with = "crate::decimal")]
    pub genesis_difficulty: BigUint,
    #[serde(with = "crate::decimal")]
    pub base_minimum_difficulty: BigUint,
    pub version: u32,
    pub schema_version: u32,
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
    pub blockchain_fingerprints_root: String,
    pub tx_fee_base: u64,
    pub tx_distance_sum_limit: u64,
    /// Rovered chain ids every block must track.
    pub chains: Vec<String>,
    pub mining_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            genesis_height: 1,
            genesis_hash: blake2bl("collider genesis"),
            genesis_timestamp: 1_537_000_000,
            genesis_difficulty: BigUint::from(BASE_MINIMUM_DIFFICULTY),
            base_minimum_difficulty: BigUint::from(BASE_MINIMUM_DIFFICULTY),
            version: 1,
            schema_version: 1,
            nrg_grant: 1_600_000_000,
            target_hash: String::new(),
            target_height: 1,
            target_miner: String::new(),
            target_signature: String::new(),
            twn: 0,
            tws: vec![],
            emblem_weight: 0,
            emblem_chain_block_hash: String::new(),
            emblem_chain_fingerprint_root: String::new(),
            emblem_chain_address: String::new(),
            blockchain_fingerprints_root: blake2bl("btc eth lsk neo wav"),
            tx_fee_base: 0,
            tx_distance_sum_limit: 0,
            chains: ["btc", "eth", "lsk", "neo", "wav"]
                .into_iter()
                .map(String::from)
                .collect(),
            mining_timeout_secs: MAX_TIMEOUT_SECONDS,
        }
    }
}

impl NetworkConfig {
    pub fn is_genesis_height(&self, height: u64) -> bool {
        height == self.genesis_height
    }

    pub fn mining_timeout(&self) -> Duration {
        Duration::from_secs(self.mining_timeout_secs)
    }

    /// Copies the network constant fields onto `block`.
    pub fn stamp(&self, block: &mut BcBlock) {
        block.version = self.version;
        block.schema_version = self.schema_version;
        block.nrg_grant = self.nrg_grant;
        block.target_hash = self.target_hash.clone();
        block.target_height = self.target_height;
        block.target_miner = self.target_miner.clone();
        block.target_signature = self.target_signature.clone();
        block.twn = self.twn;
        block.tws = self.tws.clone();
        block.emblem_weight = self.emblem_weight;
        block.emblem_chain_block_hash = self.emblem_chain_block_hash.clone();
        block.emblem_chain_fingerprint_root = self.emblem_chain_fingerprint_root.clone();
        block.emblem_chain_address = self.emblem_chain_address.clone();
        block.blockchain_fingerprints_root = self.blockchain_fingerprints_root.clone();
        block.tx_fee_base = self.tx_fee_base;
        block.tx_distance_sum_limit = self.tx_distance_sum_limit;
    }

    /// The genesis block: no rovered headers, no transactions, zero distance.
    pub fn genesis_block(&self) -> BcBlock {
        let mut block = BcBlock {
            hash: self.genesis_hash.clone(),
            previous_hash: "0".repeat(crate::constants::HASH_HEX_SIZE),
            height: self.genesis_height,
            difficulty: self.genesis_difficulty.clone(),
            timestamp: self.genesis_timestamp,
            merkle_root: blake2bl(&self.genesis_hash),
            chain_root: blake2bl("0"),
            blockchain_headers: HeaderSet::default(),
            ..Default::default()
        };
        self.stamp(&mut block);
        block
    }
}
