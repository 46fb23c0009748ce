use crate::{blake2bl, Error, HeaderSet, Result};
use num_bigint::BigUint;

/// Hex string to big integer. An empty string is zero.
pub fn parse_hex(value: &str) -> Result<BigUint> {
    let bytes = hex::decode(value).map_err(|source| Error::InvalidHex {
        value: value.to_string(),
        source,
    })?;
    Ok(BigUint::from_bytes_be(&bytes))
}

/// XOR of every fingerprint read as a big integer. Order does not matter.
pub fn chain_root<S: AsRef<str>>(fingerprints: &[S]) -> Result<BigUint> {
    fingerprints
        .iter()
        .try_fold(BigUint::default(), |acc, fingerprint| -> Result<BigUint> {
            Ok(acc ^ parse_hex(fingerprint.as_ref())?)
        })
}

/// The string a mining search measures distance against:
/// `blake2bl(decimal(chain_root(headers) xor previous_block_hash))`.
pub fn work(previous_block_hash: &str, header_set: &HeaderSet) -> Result<String> {
    let root = chain_root(&header_set.fingerprints())?;
    work_from_root(previous_block_hash, &root)
}

pub fn work_from_root(previous_block_hash: &str, chain_root: &BigUint) -> Result<String> {
    let previous = parse_hex(previous_block_hash)?;
    Ok(blake2bl(&(chain_root ^ previous).to_string()))
}
