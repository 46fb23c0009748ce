//! Left-fold hash chain. Historically called a merkle root, but there is no
//! tree: every value is folded into a single accumulator in order.

use crate::blake2bl;

/// Running accumulator of a hash chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashChain {
    acc: String,
}

impl HashChain {
    pub fn new(first: &str) -> Self {
        Self {
            acc: blake2bl(first),
        }
    }

    /// `acc = blake2bl(acc + value)`
    pub fn push(&mut self, value: &str) {
        let mut input = String::with_capacity(self.acc.len() + value.len());
        input.push_str(&self.acc);
        input.push_str(value);
        self.acc = blake2bl(&input);
    }

    pub fn extend<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for value in values {
            self.push(value.as_ref());
        }
    }

    pub fn finish(self) -> String {
        self.acc
    }
}

/// Folds `values` into one hash. `None` for an empty slice.
pub fn fold_hash<S: AsRef<str>>(values: &[S]) -> Option<String> {
    let (first, rest) = values.split_first()?;
    let mut chain = HashChain::new(first.as_ref());
    chain.extend(rest);
    Some(chain.finish())
}
