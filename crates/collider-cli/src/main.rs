use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use collider_core::assemble::{assemble, Proposal};
use collider_core::difficulty::{difficulty_bomb, difficulty_retarget};
use collider_core::mine::{Clock, Miner, RandomNonces, SystemClock};
use collider_core::{pow, work, BcBlock, HeaderSet, NetworkConfig, RoveredBlock, Transaction};
use num_bigint::BigUint;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "collider")]
#[command(about = "Block assembly and proof-of-distance mining over rovered chains")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Retargeted difficulty for a new block
    Retarget {
        /// Current time (seconds)
        #[arg(long)]
        current: u64,
        /// Previous block time (seconds)
        #[arg(long)]
        previous: u64,
        /// Previous block difficulty
        #[arg(long, value_parser = parse_big)]
        difficulty: BigUint,
        /// Difficulty floor, defaults to the network minimum
        #[arg(long, value_parser = parse_big)]
        minimum: Option<BigUint>,
        /// Rovered blocks observed since the previous block
        #[arg(long, default_value_t = 0)]
        new_blocks: u64,
        /// Apply the difficulty bomb for this parent height
        #[arg(long)]
        parent_height: Option<u64>,
    },
    /// Work string for a previous block hash and a header set
    Work {
        #[arg(long)]
        previous_hash: String,
        /// JSON header set, keyed by chain id
        #[arg(long)]
        headers: PathBuf,
    },
    /// Distance between a work string and a candidate hash
    Distance { work: String, candidate: String },
    /// Print the genesis block
    Genesis {
        /// Network config (JSON)
        #[arg(long)]
        network: Option<PathBuf>,
    },
    /// Assemble the next block, optionally mining it
    Propose {
        /// Previous block (JSON)
        #[arg(long)]
        previous: PathBuf,
        /// Rovered blocks observed since the previous block (JSON array)
        #[arg(long)]
        blocks: PathBuf,
        /// Miner address
        #[arg(long)]
        miner: String,
        /// Index of the triggering block in `blocks`, defaults to the last
        #[arg(long)]
        trigger: Option<usize>,
        /// Transactions to include (JSON array)
        #[arg(long)]
        txs: Option<PathBuf>,
        /// Block currently being mined (JSON)
        #[arg(long)]
        in_progress: Option<PathBuf>,
        /// Network config (JSON)
        #[arg(long)]
        network: Option<PathBuf>,
        /// Proposal time in seconds, defaults to now
        #[arg(long)]
        now: Option<u64>,
        /// Search for a nonce and print the mined block
        #[arg(long)]
        mine: bool,
    },
}

fn parse_big(value: &str) -> std::result::Result<BigUint, String> {
    BigUint::parse_bytes(value.as_bytes(), 10).ok_or_else(|| format!("not a decimal integer: {value}"))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn load_network(path: Option<&Path>) -> Result<NetworkConfig> {
    match path {
        Some(path) => read_json(path),
        None => Ok(NetworkConfig::default()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Retarget {
            current,
            previous,
            difficulty,
            minimum,
            new_blocks,
            parent_height,
        } => {
            let minimum = minimum.unwrap_or_else(|| NetworkConfig::default().base_minimum_difficulty);
            let mut value = difficulty_retarget(current, previous, &difficulty, &minimum, new_blocks);
            if let Some(height) = parent_height {
                value = difficulty_bomb(value, height);
            }
            println!("{value}");
        }
        Command::Work {
            previous_hash,
            headers,
        } => {
            let headers: HeaderSet = read_json(&headers)?;
            println!("{}", work::work(&previous_hash, &headers)?);
        }
        Command::Distance { work, candidate } => {
            println!("{}", pow::distance(&work, &candidate)?);
        }
        Command::Genesis { network } => {
            let config = load_network(network.as_deref())?;
            print_json(&config.genesis_block())?;
        }
        Command::Propose {
            previous,
            blocks,
            miner,
            trigger,
            txs,
            in_progress,
            network,
            now,
            mine,
        } => {
            let config = load_network(network.as_deref())?;
            let previous: BcBlock = read_json(&previous)?;
            let blocks: Vec<RoveredBlock> = read_json(&blocks)?;
            let txs: Vec<Transaction> = match txs {
                Some(path) => read_json(&path)?,
                None => vec![],
            };
            let in_progress: Option<BcBlock> = in_progress.as_deref().map(read_json::<BcBlock>).transpose()?;

            let trigger_index = trigger.unwrap_or(blocks.len().saturating_sub(1));
            let Some(trigger) = blocks.get(trigger_index) else {
                bail!("no rovered block at index {trigger_index}");
            };
            let timestamp = now.unwrap_or_else(|| SystemClock.now_ms() / 1000);

            let assembled = assemble(
                &Proposal {
                    timestamp,
                    previous: &previous,
                    new_blocks: &blocks,
                    trigger,
                    transactions: &txs,
                    miner_address: &miner,
                    in_progress: in_progress.as_ref(),
                },
                &config,
            )?;

            if !mine {
                print_json(&assembled.block)?;
                return Ok(());
            }

            let timeout = config.mining_timeout();
            let block = tokio::task::spawn_blocking(move || -> Result<BcBlock> {
                let mut recalculate = assembled.difficulty.recalculator();
                let result = Miner::new(timeout).mine(
                    &assembled.job(),
                    &mut RandomNonces::thread(),
                    Some(&mut recalculate),
                )?;
                let mut block = assembled.block.clone();
                block.apply_mining_result(&result);
                Ok(block)
            })
            .await??;

            info!(height = block.height, hash = %block.hash, "mined block");
            print_json(&block)?;
        }
    }
    Ok(())
}
