/// Common utilities shared across services: identifier generation and
/// injectable sources of randomness for the simulated collaborators.
use std::fmt;
use std::sync::Mutex;

use chrono::Utc;
use rand::{distributions::Uniform, rngs::StdRng, Rng, SeedableRng};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Returns `len` random lowercase base36 characters.
pub fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let dist = Uniform::from(0..BASE36.len());
    (0..len)
        .map(|_| BASE36[rng.sample(dist)] as char)
        .collect()
}

/// Builds `{prefix}_{unix_millis}_{9 random chars}`.
pub fn timestamped_id(prefix: &str) -> String {
    format!(
        "{}_{}_{}",
        prefix,
        Utc::now().timestamp_millis(),
        random_suffix(9)
    )
}

/// A source of uniformly distributed samples in `[0, 1)`.
///
/// Simulated outcomes (card approvals, email delivery) draw from this instead
/// of global randomness so tests can pin them.
pub trait DecisionSource: Send + Sync + fmt::Debug {
    fn sample(&self) -> f64;

    /// True when the draw clears the given failure rate.
    fn passes(&self, failure_rate: f64) -> bool {
        self.sample() >= failure_rate
    }
}

/// Stream index for card decline draws.
pub const PAYMENT_DECISIONS: u64 = 0;
/// Stream index for email failure draws.
pub const EMAIL_DECISIONS: u64 = 1;

/// Thread-local RNG backed source used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngSource;

impl DecisionSource for ThreadRngSource {
    fn sample(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Deterministic, seeded source for reproducible runs.
#[derive(Debug)]
pub struct SeededSource {
    rng: Mutex<StdRng>,
}

impl SeededSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl DecisionSource for SeededSource {
    fn sample(&self) -> f64 {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen::<f64>(),
            Err(poisoned) => poisoned.into_inner().gen::<f64>(),
        }
    }
}

/// Always returns the same sample.
#[derive(Debug, Clone, Copy)]
pub struct FixedSource(pub f64);

impl FixedSource {
    /// A source that clears any failure rate below 1.0.
    pub fn always_pass() -> Self {
        FixedSource(0.999_999)
    }

    /// A source that fails any positive failure rate.
    pub fn always_fail() -> Self {
        FixedSource(0.0)
    }
}

impl DecisionSource for FixedSource {
    fn sample(&self) -> f64 {
        self.0
    }
}
