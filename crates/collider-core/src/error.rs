use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The baseline block tracks a chain but holds no header for it, and no
    /// fresh block arrived to replace it. The baseline block is malformed.
    #[error("previous block {height} does not have any \"{chain}\" headers")]
    MissingPreviousChainHeader { chain: String, height: u64 },

    /// A configured chain has no observed block yet, so the first block after
    /// genesis cannot track it. Retry once that chain delivers.
    #[error("no block observed yet on configured chain \"{chain}\"")]
    MissingGenesisChainBlock { chain: String },

    /// No nonce beat the difficulty before the wall-clock bound.
    #[error("mining timed out after {iterations} iterations in {elapsed_ms} ms")]
    MiningTimeout { iterations: u64, elapsed_ms: u64 },

    /// Cosine similarity is undefined for this chunk pair (zero magnitude or
    /// mismatched lengths).
    #[error("distance undefined at chunk {chunk}")]
    UndefinedDistance { chunk: usize },

    #[error("no rovered chains to build a header set from")]
    NoRoveredChains,

    #[error("invalid hex value {value:?}")]
    InvalidHex {
        value: String,
        #[source]
        source: hex::FromHexError,
    },
}

impl Error {
    /// Worth retrying with a fresh proposal: a timeout, or a genesis proposal
    /// made before every configured chain delivered a block.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::MiningTimeout { .. } | Error::MissingGenesisChainBlock { .. })
    }
}
