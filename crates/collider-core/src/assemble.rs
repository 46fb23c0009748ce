//! Builds the next, not yet mined, block from the previous block and the
//! rovered blocks observed since.

use crate::constants::{CHAIN_WEIGHT_DIVISOR, CHAIN_WEIGHT_MIN_HEIGHT};
use crate::difficulty::{difficulty_bomb, difficulty_retarget, div_round, minimum_difficulty, DifficultyContext};
use crate::headers::{reconcile, reconcile_genesis};
use crate::merkle::HashChain;
use crate::mine::MiningJob;
use crate::work::{chain_root, work_from_root};
use crate::{blake2bl, BcBlock, Error, NetworkConfig, Result, RoveredBlock, Transaction};
use num_bigint::BigUint;
use num_traits::CheckedSub;
use tracing::{debug, info};

/// Inputs of one block proposal.
#[derive(Clone, Copy, Debug)]
pub struct Proposal<'a> {
    /// Seconds.
    pub timestamp: u64,
    pub previous: &'a BcBlock,
    pub new_blocks: &'a [RoveredBlock],
    /// The rovered block that triggered this proposal.
    pub trigger: &'a RoveredBlock,
    pub transactions: &'a [Transaction],
    pub miner_address: &'a str,
    /// The block currently being mined, if any. It replaces `previous` as the
    /// confirmation baseline.
    pub in_progress: Option<&'a BcBlock>,
}

/// An unmined block plus what the caller needs to mine it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assembled {
    pub block: BcBlock,
    pub timestamp: u64,
    pub work: String,
    pub difficulty: DifficultyContext,
}

impl Assembled {
    pub fn job(&self) -> MiningJob<'_> {
        MiningJob {
            timestamp: self.timestamp,
            work: &self.work,
            miner_address: &self.block.miner,
            merkle_root: &self.block.merkle_root,
            threshold: self.block.difficulty.clone(),
        }
    }
}

/// Provisional distance of a new block: `round((distance - difficulty) / 4)`
/// of its parent once the parent is past height 2, otherwise zero. A parent
/// whose distance is below its difficulty weighs zero.
pub fn chain_weight(previous: &BcBlock) -> BigUint {
    if previous.height <= CHAIN_WEIGHT_MIN_HEIGHT {
        return BigUint::default();
    }
    previous
        .distance
        .checked_sub(&previous.difficulty)
        .map(|surplus| div_round(&surplus, CHAIN_WEIGHT_DIVISOR))
        .unwrap_or_default()
}

pub fn assemble(proposal: &Proposal<'_>, config: &NetworkConfig) -> Result<Assembled> {
    let previous = proposal.previous;

    let header_set = if config.is_genesis_height(previous.height) {
        reconcile_genesis(proposal.trigger, proposal.new_blocks, config)?
    } else {
        let baseline = proposal.in_progress.unwrap_or(previous);
        reconcile(baseline, proposal.trigger, proposal.new_blocks, config)?
    };
    if header_set.is_empty() {
        return Err(Error::NoRoveredChains);
    }

    let fingerprints = header_set.fingerprints();
    let root = chain_root(&fingerprints)?;
    let new_block_count = header_set.new_block_count(&previous.blockchain_headers);

    let difficulty = DifficultyContext {
        previous_timestamp: previous.timestamp,
        previous_difficulty: previous.difficulty.clone(),
        previous_height: previous.height,
        minimum_difficulty: minimum_difficulty(&config.base_minimum_difficulty, header_set.chain_count()),
        new_block_count,
    };
    let pre_exp_difficulty = difficulty_retarget(
        proposal.timestamp,
        difficulty.previous_timestamp,
        &difficulty.previous_difficulty,
        &difficulty.minimum_difficulty,
        difficulty.new_block_count,
    );
    let final_difficulty = difficulty_bomb(pre_exp_difficulty, previous.height);
    let height = previous.height + 1;

    let (first, rest) = fingerprints.split_first().ok_or(Error::NoRoveredChains)?;
    let mut merkle = HashChain::new(first);
    merkle.extend(rest);
    merkle.extend(proposal.transactions.iter().map(|tx| tx.id.as_str()));
    merkle.extend([
        final_difficulty.to_string(),
        proposal.miner_address.to_string(),
        height.to_string(),
        config.version.to_string(),
        config.schema_version.to_string(),
        config.nrg_grant.to_string(),
        config.blockchain_fingerprints_root.clone(),
    ]);
    let merkle_root = merkle.finish();

    debug!(
        height,
        new_block_count,
        chains = header_set.chain_count(),
        %final_difficulty,
        "assembled block"
    );

    let mut block = BcBlock {
        hash: blake2bl(&format!("{}{}", previous.hash, merkle_root)),
        previous_hash: previous.hash.clone(),
        height,
        miner: proposal.miner_address.to_string(),
        difficulty: final_difficulty,
        timestamp: proposal.timestamp,
        merkle_root,
        chain_root: blake2bl(&root.to_string()),
        distance: chain_weight(previous),
        total_distance: previous.total_distance.clone(),
        nonce: None,
        tx_count: proposal.transactions.len() as u64,
        txs: proposal.transactions.to_vec(),
        blockchain_headers_count: proposal.new_blocks.len() as u64,
        blockchain_headers: header_set,
        ..Default::default()
    };
    config.stamp(&mut block);

    let work = work_from_root(&previous.hash, &root)?;
    info!(height, work = %work, "prepared block for mining");

    Ok(Assembled {
        block,
        timestamp: proposal.timestamp,
        work,
        difficulty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::fold_hash;
    use crate::work::work;
    use crate::{ExternalHeader, HeaderSet};

    fn rovered(chain: &str, n: u64) -> RoveredBlock {
        RoveredBlock {
            chain_id: chain.to_string(),
            hash: blake2bl(&format!("{chain}{n}")),
            previous_hash: blake2bl(&format!("{chain}{}", n.saturating_sub(1))),
            timestamp: 1_600_000_000_000 + n,
            height: n,
            merkle_root: blake2bl(&format!("{chain}{n}root")),
            tx_ids: vec![],
        }
    }

    fn previous_block(height: u64, chains: &[&str]) -> BcBlock {
        let headers: HeaderSet = chains
            .iter()
            .map(|c| (c.to_string(), vec![rovered(c, 1).to_header(1)]))
            .collect();
        BcBlock {
            hash: blake2bl("previous"),
            height,
            timestamp: 1_600_000_000,
            difficulty: BigUint::from(400_000_000_000_000u64),
            distance: BigUint::from(400_000_000_000_010u64),
            total_distance: BigUint::from(9_000u32),
            blockchain_headers: headers,
            ..Default::default()
        }
    }

    fn config_for(chains: &[&str]) -> NetworkConfig {
        NetworkConfig {
            chains: chains.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn chain_weight_examples() {
        let mut block = previous_block(3, &["a"]);
        assert_eq!(chain_weight(&block), BigUint::from(3u32)); // 10 / 4 = 2.5 -> 3
        block.height = 2;
        assert_eq!(chain_weight(&block), BigUint::default());
        block.height = 3;
        block.distance = BigUint::from(1u32);
        assert_eq!(chain_weight(&block), BigUint::default());
    }

    #[test]
    fn assemble_steady_state() {
        let config = config_for(&["a", "b"]);
        let previous = previous_block(10, &["a", "b"]);
        let new_blocks = vec![rovered("a", 2), rovered("a", 3)];
        let txs = vec![Transaction::new("Alice", "Bob", 10, 1_600_000_000)];
        let proposal = Proposal {
            timestamp: 1_600_000_004,
            previous: &previous,
            new_blocks: &new_blocks,
            trigger: &new_blocks[1],
            transactions: &txs,
            miner_address: "miner",
            in_progress: None,
        };

        let assembled = assemble(&proposal, &config).unwrap();
        let block = &assembled.block;

        assert_eq!(block.height, 11);
        assert_eq!(block.previous_hash, previous.hash);
        assert_eq!(block.timestamp, 1_600_000_004);
        assert_eq!(block.miner, "miner");
        assert_eq!(block.tx_count, 1);
        assert_eq!(block.blockchain_headers_count, 2);
        assert_eq!(block.total_distance, previous.total_distance);
        assert_eq!(block.distance, BigUint::from(3u32));
        assert!(!block.is_mined());

        let headers = &block.blockchain_headers;
        assert_eq!(headers.get("a").len(), 2);
        assert_eq!(headers.get("b")[0].confirmations_in_parent, 2);

        assert_eq!(assembled.difficulty.new_block_count, 2);
        let expected_difficulty = difficulty_retarget(
            1_600_000_004,
            1_600_000_000,
            &previous.difficulty,
            &minimum_difficulty(&config.base_minimum_difficulty, 2),
            2,
        );
        assert_eq!(block.difficulty, expected_difficulty);
        assert_eq!(assembled.difficulty.difficulty_at(1_600_000_004), block.difficulty);

        let mut leaves = headers.fingerprints();
        leaves.push(txs[0].id.clone());
        leaves.extend([
            block.difficulty.to_string(),
            "miner".to_string(),
            "11".to_string(),
            config.version.to_string(),
            config.schema_version.to_string(),
            config.nrg_grant.to_string(),
            config.blockchain_fingerprints_root.clone(),
        ]);
        assert_eq!(Some(block.merkle_root.clone()), fold_hash(&leaves));
        assert_eq!(block.hash, blake2bl(&format!("{}{}", previous.hash, block.merkle_root)));

        let root = chain_root(&headers.fingerprints()).unwrap();
        assert_eq!(block.chain_root, blake2bl(&root.to_string()));
        assert_eq!(assembled.work, work(&previous.hash, headers).unwrap());

        let job = assembled.job();
        assert_eq!(job.threshold, block.difficulty);
        assert_eq!(job.merkle_root, block.merkle_root);
        assert_eq!(job.timestamp, 1_600_000_004);
    }

    #[test]
    fn assemble_uses_in_progress_block_as_baseline() {
        let config = config_for(&["a", "b"]);
        let previous = previous_block(10, &["a", "b"]);
        let mut in_progress = previous.clone();
        in_progress.blockchain_headers.insert(
            "b",
            vec![ExternalHeader {
                confirmations_in_parent: 4,
                ..rovered("b", 1).to_header(1)
            }],
        );
        let new_blocks = vec![rovered("a", 2)];
        let proposal = Proposal {
            timestamp: 1_600_000_004,
            previous: &previous,
            new_blocks: &new_blocks,
            trigger: &new_blocks[0],
            transactions: &[],
            miner_address: "miner",
            in_progress: Some(&in_progress),
        };

        let assembled = assemble(&proposal, &config).unwrap();
        assert_eq!(assembled.block.blockchain_headers.get("b")[0].confirmations_in_parent, 5);
        // new block count is still measured against the finalized previous block
        assert_eq!(assembled.difficulty.new_block_count, 1);
    }

    #[test]
    fn assemble_applies_difficulty_bomb() {
        let config = config_for(&["a"]);
        let previous = previous_block(197_999_999, &["a"]);
        let new_blocks = vec![rovered("a", 2)];
        let proposal = Proposal {
            timestamp: 1_600_000_008,
            previous: &previous,
            new_blocks: &new_blocks,
            trigger: &new_blocks[0],
            transactions: &[],
            miner_address: "miner",
            in_progress: None,
        };

        let assembled = assemble(&proposal, &config).unwrap();
        let pre = difficulty_retarget(
            1_600_000_008,
            1_600_000_000,
            &previous.difficulty,
            &minimum_difficulty(&config.base_minimum_difficulty, 1),
            1,
        );
        assert_eq!(assembled.block.difficulty, pre + 2u32);
    }

    #[test]
    fn assemble_propagates_missing_header() {
        let config = config_for(&["a", "b"]);
        let mut previous = previous_block(10, &["a"]);
        previous.blockchain_headers.insert("b", vec![]);
        let new_blocks = vec![rovered("a", 2)];
        let proposal = Proposal {
            timestamp: 1_600_000_004,
            previous: &previous,
            new_blocks: &new_blocks,
            trigger: &new_blocks[0],
            transactions: &[],
            miner_address: "miner",
            in_progress: None,
        };

        let err = assemble(&proposal, &config).unwrap_err();
        assert!(matches!(err, Error::MissingPreviousChainHeader { .. }));
    }

    #[test]
    fn assemble_genesis_without_chains_fails() {
        let config = config_for(&[]);
        let genesis = config.genesis_block();
        let trigger = rovered("btc", 1);
        let proposal = Proposal {
            timestamp: 1_600_000_004,
            previous: &genesis,
            new_blocks: &[],
            trigger: &trigger,
            transactions: &[],
            miner_address: "miner",
            in_progress: None,
        };

        let err = assemble(&proposal, &config).unwrap_err();
        assert!(matches!(err, Error::NoRoveredChains));
    }
}
