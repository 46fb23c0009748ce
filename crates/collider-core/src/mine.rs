use crate::pow::WorkChunks;
use crate::{blake2bl, Error, MiningResult, Result};
use num_bigint::BigUint;
use rand::{rngs::ThreadRng, Rng};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, trace, warn};

/// Supplies candidate nonces to the search.
pub trait NonceSource {
    fn next_nonce(&mut self) -> String;
}

/// Random nonces: a uniform `f64` in `[0, 1)` rendered as a decimal string.
#[derive(Debug)]
pub struct RandomNonces<R> {
    rng: R,
}

impl<R: Rng> RandomNonces<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomNonces<ThreadRng> {
    pub fn thread() -> Self {
        Self::new(rand::thread_rng())
    }
}

impl<R: Rng> NonceSource for RandomNonces<R> {
    fn next_nonce(&mut self) -> String {
        self.rng.gen::<f64>().to_string()
    }
}

/// Wall clock in milliseconds since the unix epoch.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }
}

/// What to mine against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MiningJob<'a> {
    /// Seconds; folded into every candidate until the first recalculation.
    pub timestamp: u64,
    pub work: &'a str,
    pub miner_address: &'a str,
    pub merkle_root: &'a str,
    pub threshold: BigUint,
}

/// Re-evaluates the threshold for a new second while mining continues.
pub type Recalculator<'r> = &'r mut (dyn FnMut(u64) -> BigUint + Send);

/// `blake2bl(miner + merkle_root + blake2bl(nonce) + timestamp)`
pub fn candidate_hash(miner_address: &str, merkle_root: &str, nonce: &str, timestamp: u64) -> String {
    let nonce_hash = blake2bl(nonce);
    blake2bl(&format!("{miner_address}{merkle_root}{nonce_hash}{timestamp}"))
}

#[derive(Clone, Debug)]
pub struct Miner<C = SystemClock> {
    clock: C,
    timeout: Duration,
}

impl Default for Miner<SystemClock> {
    fn default() -> Self {
        Self::new(Duration::from_secs(crate::constants::MAX_TIMEOUT_SECONDS))
    }
}

impl Miner<SystemClock> {
    pub fn new(timeout: Duration) -> Self {
        Self::with_clock(SystemClock, timeout)
    }
}

impl<C: Clock> Miner<C> {
    pub fn with_clock(clock: C, timeout: Duration) -> Self {
        Self { clock, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Searches nonces until one lands further than the current threshold
    /// from the work, or the timeout passes.
    ///
    /// With a recalculator the threshold is re-evaluated at most once per
    /// new second, and the candidate timestamp moves to that second. The work
    /// itself never changes during a session.
    pub fn mine<N: NonceSource + ?Sized>(
        &self,
        job: &MiningJob<'_>,
        nonces: &mut N,
        mut recalculator: Option<Recalculator<'_>>,
    ) -> Result<MiningResult> {
        let work_chunks = WorkChunks::new(job.work);
        let started = self.clock.now_ms();
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let deadline = started.saturating_add(timeout_ms);

        let mut loop_timestamp = job.timestamp;
        let mut difficulty = job.threshold.clone();
        let mut iterations = 0u64;

        loop {
            let now_ms = self.clock.now_ms();
            if now_ms > deadline {
                let elapsed_ms = now_ms.saturating_sub(started);
                warn!(iterations, elapsed_ms, "mining timed out");
                return Err(Error::MiningTimeout {
                    iterations,
                    elapsed_ms,
                });
            }
            iterations += 1;

            let now = now_ms / 1000;
            if let Some(recalculate) = recalculator.as_mut() {
                if loop_timestamp < now {
                    loop_timestamp = now;
                    difficulty = recalculate(now);
                    debug!(timestamp = now, %difficulty, "recalculated difficulty");
                }
            }

            let nonce = nonces.next_nonce();
            let candidate = candidate_hash(job.miner_address, job.merkle_root, &nonce, loop_timestamp);
            match work_chunks.distance(&candidate) {
                Ok(distance) if distance > difficulty => {
                    let elapsed_ms = self.clock.now_ms().saturating_sub(started);
                    info!("mining took {iterations} iterations in {elapsed_ms} ms");
                    return Ok(MiningResult {
                        nonce,
                        distance,
                        timestamp: loop_timestamp,
                        difficulty,
                        iterations,
                        elapsed_ms,
                    });
                }
                Ok(_) => {}
                Err(err) => trace!(%err, nonce = %nonce, "skipping candidate"),
            }
        }
    }
}

/// Mines on the system clock with thread-local random nonces.
pub fn mine(job: &MiningJob<'_>, timeout: Duration, recalculator: Option<Recalculator<'_>>) -> Result<MiningResult> {
    Miner::new(timeout).mine(job, &mut RandomNonces::thread(), recalculator)
}
