//! Header sets and their reconciliation between consecutive proposals.

use crate::{BcBlock, Error, ExternalHeader, NetworkConfig, Result, RoveredBlock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Rovered headers per chain. Chains iterate in chain id order; headers within
/// a chain keep discovery order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderSet {
    chains: BTreeMap<String, Vec<ExternalHeader>>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the header list of `chain`.
    pub fn insert(&mut self, chain: impl Into<String>, headers: Vec<ExternalHeader>) {
        self.chains.insert(chain.into(), headers);
    }

    pub fn get(&self, chain: &str) -> &[ExternalHeader] {
        self.chains.get(chain).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn latest(&self, chain: &str) -> Option<&ExternalHeader> {
        self.get(chain).last()
    }

    pub fn contains_chain(&self, chain: &str) -> bool {
        self.chains.contains_key(chain)
    }

    pub fn chains(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// All headers, chain by chain.
    pub fn headers(&self) -> impl Iterator<Item = &ExternalHeader> {
        self.chains.values().flatten()
    }

    pub fn fingerprints(&self) -> Vec<String> {
        self.headers().map(ExternalHeader::fingerprint).collect()
    }

    /// Headers whose fingerprint does not appear under the same chain in
    /// `previous`. Duplicates are counted once per occurrence.
    pub fn fresh_headers(&self, previous: &HeaderSet) -> Vec<&ExternalHeader> {
        let mut fresh = Vec::new();
        for (chain, headers) in &self.chains {
            let seen: BTreeSet<String> = previous
                .get(chain)
                .iter()
                .map(ExternalHeader::fingerprint)
                .collect();
            fresh.extend(headers.iter().filter(|h| !seen.contains(&h.fingerprint())));
        }
        fresh
    }

    pub fn new_block_count(&self, previous: &HeaderSet) -> u64 {
        self.fresh_headers(previous).len() as u64
    }
}

impl FromIterator<(String, Vec<ExternalHeader>)> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = (String, Vec<ExternalHeader>)>>(iter: I) -> Self {
        Self {
            chains: iter.into_iter().collect(),
        }
    }
}

/// Groups blocks by chain, dropping repeated deliveries of the same hash.
fn group_by_chain<'a>(
    blocks: impl IntoIterator<Item = &'a RoveredBlock>,
) -> BTreeMap<&'a str, Vec<&'a RoveredBlock>> {
    let mut groups: BTreeMap<&str, Vec<&RoveredBlock>> = BTreeMap::new();
    for block in blocks {
        let group = groups.entry(block.chain_id.as_str()).or_default();
        if !group.iter().any(|seen| seen.hash == block.hash) {
            group.push(block);
        }
    }
    groups
}

/// Groups `new_blocks` by chain, appending `trigger` to its chain's group
/// when the caller left it out.
fn group_with_trigger<'a>(
    trigger: &'a RoveredBlock,
    new_blocks: &'a [RoveredBlock],
) -> BTreeMap<&'a str, Vec<&'a RoveredBlock>> {
    let mut groups = group_by_chain(new_blocks);
    let trigger_group = groups.entry(trigger.chain_id.as_str()).or_default();
    if !trigger_group.iter().any(|seen| seen.hash == trigger.hash) {
        trigger_group.push(trigger);
    }
    groups
}

/// Header set for the first block after genesis: the latest observed header
/// of each configured chain, with one confirmation. The trigger counts as an
/// observed block, as it does in [`reconcile`].
///
/// Every configured chain must have been observed. A set missing one would be
/// a dead end, since later blocks have nothing to carry forward for it.
pub fn reconcile_genesis(
    trigger: &RoveredBlock,
    new_blocks: &[RoveredBlock],
    config: &NetworkConfig,
) -> Result<HeaderSet> {
    let groups = group_with_trigger(trigger, new_blocks);
    for chain in groups.keys().filter(|chain| !config.chains.iter().any(|c| c.as_str() == **chain)) {
        warn!(chain, "ignoring blocks from unconfigured chain at genesis");
    }

    let mut set = HeaderSet::new();
    for chain in &config.chains {
        let latest = groups
            .get(chain.as_str())
            .and_then(|blocks| blocks.last())
            .ok_or_else(|| Error::MissingGenesisChainBlock { chain: chain.clone() })?;
        set.insert(chain.as_str(), vec![latest.to_header(1)]);
    }
    debug!(chains = set.chain_count(), "reconciled genesis headers");
    Ok(set)
}

/// Header set for a block following `baseline`.
///
/// Chains with fresh blocks restart at one confirmation. Every other tracked
/// chain carries its latest header from `baseline` forward with one more
/// confirmation. Tracked chains are those of `baseline` plus the configured
/// ones.
pub fn reconcile(
    baseline: &BcBlock,
    trigger: &RoveredBlock,
    new_blocks: &[RoveredBlock],
    config: &NetworkConfig,
) -> Result<HeaderSet> {
    let groups = group_with_trigger(trigger, new_blocks);

    let previous = &baseline.blockchain_headers;
    let tracked: BTreeSet<&str> = previous
        .chains()
        .chain(config.chains.iter().map(String::as_str))
        .collect();

    for chain in groups.keys().filter(|chain| !tracked.contains(*chain)) {
        warn!(chain, height = baseline.height, "dropping blocks from untracked chain");
    }

    let mut set = HeaderSet::new();
    for chain in tracked {
        match groups.get(chain) {
            Some(blocks) => {
                set.insert(chain, blocks.iter().map(|b| b.to_header(1)).collect());
            }
            None => {
                let last = previous
                    .latest(chain)
                    .ok_or_else(|| Error::MissingPreviousChainHeader {
                        chain: chain.to_string(),
                        height: baseline.height,
                    })?;
                let carried = last.with_confirmations(last.confirmations_in_parent + 1);
                debug!(
                    chain,
                    confirmations = carried.confirmations_in_parent,
                    "carrying header forward"
                );
                set.insert(chain, vec![carried]);
            }
        }
    }
    Ok(set)
}
