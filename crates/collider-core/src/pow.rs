//! Proof of distance: a candidate hash qualifies when its summed cosine
//! distance from the work string exceeds the difficulty.

use crate::constants::{CHUNK_SIZE, DISTANCE_SCALE};
use crate::{Error, Result};
use num_bigint::BigUint;
use num_traits::FromPrimitive;

fn char_codes(value: &str) -> Vec<f64> {
    value.encode_utf16().map(f64::from).collect()
}

/// `None` when the chunks differ in length or either has zero magnitude.
///
/// Each norm is the plain `sqrt` of the sum of squares. A scaled L2 norm
/// (dividing by the largest component first) can round differently in the
/// last bit, which on rare candidates flips the floored distance by one. The
/// distances this crate produces are defined by the plain form.
fn cosine_similarity(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.is_empty() || x.len() != y.len() {
        return None;
    }
    let (dot, xx, yy) = x
        .iter()
        .zip(y)
        .fold((0.0f64, 0.0f64, 0.0f64), |(dot, xx, yy), (a, b)| {
            (dot + a * b, xx + a * a, yy + b * b)
        });
    if xx == 0.0 || yy == 0.0 {
        return None;
    }
    Some(dot / (xx.sqrt() * yy.sqrt()))
}

/// Chunked character codes of a work string, stored in reverse chunk order
/// so a mining session splits the work only once.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkChunks {
    chunks: Vec<Vec<f64>>,
}

impl WorkChunks {
    pub fn new(work: &str) -> Self {
        let mut chunks: Vec<Vec<f64>> = char_codes(work)
            .chunks(CHUNK_SIZE)
            .map(<[f64]>::to_vec)
            .collect();
        chunks.reverse();
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Sum of `1 - cos` over the overlapping chunk pairs, scaled by 10^15 and
    /// floored.
    pub fn distance(&self, candidate: &str) -> Result<BigUint> {
        let codes = char_codes(candidate);
        let mut value = 0.0f64;
        for (chunk, (ours, theirs)) in self.chunks.iter().zip(codes.chunks(CHUNK_SIZE)).enumerate() {
            let similarity =
                cosine_similarity(theirs, ours).ok_or(Error::UndefinedDistance { chunk })?;
            value += 1.0 - similarity;
        }
        // rounding can leave 1 - cos a hair below zero for identical chunks
        let scaled = (value * DISTANCE_SCALE).floor().max(0.0);
        BigUint::from_f64(scaled).ok_or(Error::UndefinedDistance { chunk: 0 })
    }
}

/// Distance between a work string and a candidate hash.
pub fn distance(work: &str, candidate: &str) -> Result<BigUint> {
    WorkChunks::new(work).distance(candidate)
}
