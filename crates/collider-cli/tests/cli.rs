use assert_cmd::Command;
use collider_core::{blake2bl, NetworkConfig, RoveredBlock};
use num_bigint::BigUint;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn collider() -> Command {
    Command::cargo_bin("collider").unwrap()
}

fn write_json<T: serde::Serialize>(dir: &Path, name: &str, value: &T) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
    path
}

fn rovered(chain: &str, n: u64) -> RoveredBlock {
    RoveredBlock {
        chain_id: chain.to_string(),
        hash: blake2bl(&format!("{chain}-{n}")),
        previous_hash: blake2bl(&format!("{chain}-{}", n - 1)),
        timestamp: 1_537_000_000_000 + n * 1_000,
        height: n,
        merkle_root: blake2bl(&format!("{chain}-{n}-root")),
        tx_ids: vec![],
    }
}

/// Genesis block and one rovered block per configured chain, on disk.
fn genesis_fixture(config: &NetworkConfig) -> (TempDir, PathBuf, PathBuf, PathBuf) {
    let dir = tempdir().unwrap();
    let network = write_json(dir.path(), "network.json", config);
    let previous = write_json(dir.path(), "genesis.json", &config.genesis_block());
    let blocks: Vec<RoveredBlock> = config.chains.iter().map(|c| rovered(c, 1)).collect();
    let blocks = write_json(dir.path(), "blocks.json", &blocks);
    (dir, network, previous, blocks)
}

#[test]
fn retarget_prints_decimal_difficulty() {
    collider()
        .args([
            "retarget",
            "--current",
            "1000",
            "--previous",
            "1000",
            "--difficulty",
            "1000000000000000000",
            "--minimum",
            "1",
        ])
        .assert()
        .success()
        .stdout("1001879699248120300\n");
}

#[test]
fn retarget_applies_bomb_for_parent_height() {
    collider()
        .args([
            "retarget",
            "--current",
            "1000",
            "--previous",
            "992",
            "--difficulty",
            "1000",
            "--minimum",
            "1",
            "--parent-height",
            "197999999",
        ])
        .assert()
        .success()
        .stdout("1002\n");
}

#[test]
fn retarget_rejects_non_decimal_difficulty() {
    collider()
        .args(["retarget", "--current", "1", "--previous", "0", "--difficulty", "0xff"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a decimal integer"));
}

#[test]
fn distance_of_known_candidate() {
    collider()
        .args([
            "distance",
            "db3508d13992f9f017b209504d5d02351aaca7ca48846d6ddcb66c4afd0bb4f8",
            "d9c87c12d51564bf64a3c11f38813939e477c973baf8ffacd33740f6aaa6d085",
        ])
        .assert()
        .success()
        .stdout("188264064043359\n");
}

#[test]
fn work_reads_header_set() {
    let dir = tempdir().unwrap();
    let headers = serde_json::json!({
        "btc": [rovered("btc", 1).to_header(1)],
        "eth": [rovered("eth", 1).to_header(2)],
    });
    let path = write_json(dir.path(), "headers.json", &headers);

    let output = collider()
        .args(["work", "--previous-hash", &blake2bl("parent"), "--headers"])
        .arg(&path)
        .output()
        .unwrap();

    assert!(output.status.success());
    let work = String::from_utf8(output.stdout).unwrap();
    assert_eq!(work.trim().len(), 64);
    assert!(work.trim().chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn genesis_uses_network_file() {
    let config = NetworkConfig {
        genesis_height: 7,
        ..Default::default()
    };
    let dir = tempdir().unwrap();
    let network = write_json(dir.path(), "network.json", &config);

    let output = collider().arg("genesis").arg("--network").arg(&network).output().unwrap();

    assert!(output.status.success());
    let block: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(block["height"], 7);
    assert_eq!(block["hash"], config.genesis_hash.as_str());
    assert_eq!(block["total_distance"], "0");
}

#[test]
fn propose_assembles_first_block_after_genesis() {
    let config = NetworkConfig::default();
    let (_dir, network, previous, blocks) = genesis_fixture(&config);

    let output = collider()
        .arg("propose")
        .arg("--network")
        .arg(&network)
        .arg("--previous")
        .arg(&previous)
        .arg("--blocks")
        .arg(&blocks)
        .args(["--miner", "miner", "--now", "1537000005"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let block: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(block["height"], 2);
    assert_eq!(block["miner"], "miner");
    assert_eq!(block["blockchain_headers_count"], 5);
    assert!(block["nonce"].is_null());
    for chain in &config.chains {
        assert_eq!(block["blockchain_headers"][chain].as_array().unwrap().len(), 1);
    }
}

#[test]
fn propose_rejects_out_of_range_trigger() {
    let config = NetworkConfig::default();
    let (_dir, network, previous, blocks) = genesis_fixture(&config);

    collider()
        .arg("propose")
        .arg("--network")
        .arg(&network)
        .arg("--previous")
        .arg(&previous)
        .arg("--blocks")
        .arg(&blocks)
        .args(["--miner", "miner", "--trigger", "9", "--now", "1537000005"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no rovered block at index 9"));
}

#[test]
fn propose_reports_unreadable_input() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.json");

    collider()
        .arg("propose")
        .arg("--previous")
        .arg(&missing)
        .arg("--blocks")
        .arg(&missing)
        .args(["--miner", "miner"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading"));
}

#[test]
fn propose_and_mine_on_an_easy_network() {
    let config = NetworkConfig {
        genesis_difficulty: BigUint::from(1u32),
        base_minimum_difficulty: BigUint::from(1u32),
        mining_timeout_secs: 60,
        ..Default::default()
    };
    let (_dir, network, previous, blocks) = genesis_fixture(&config);

    let output = collider()
        .arg("propose")
        .arg("--network")
        .arg(&network)
        .arg("--previous")
        .arg(&previous)
        .arg("--blocks")
        .arg(&blocks)
        .args(["--miner", "miner", "--mine"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let block: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(block["nonce"].is_string());
    let distance: BigUint = block["distance"].as_str().unwrap().parse().unwrap();
    let difficulty: BigUint = block["difficulty"].as_str().unwrap().parse().unwrap();
    assert!(distance > difficulty);
}
