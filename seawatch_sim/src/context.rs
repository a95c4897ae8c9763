//! Simulation context implementing CorrelationContext for deterministic testing.

use chrono::{DateTime, TimeZone, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use seawatch_env::CorrelationContext;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// 2024-01-01 00:00:00 UTC
const SIM_EPOCH_SECS: i64 = 1_704_067_200;

/// Simulation context backed by deterministic time, sequence and RNG.
///
/// This implements `CorrelationContext` using:
/// - A virtual clock that can be advanced manually
/// - A seeded ChaCha8 RNG for point-id entropy
/// - A sequence counter that starts at zero for every run
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<AtomicU64>,

    /// Last sequence value handed out
    sequence: Arc<AtomicU64>,

    /// Deterministic RNG for entropy
    rng: Arc<Mutex<ChaCha8Rng>>,

    /// Epoch offset (virtual time 0 maps to this wall-clock time)
    epoch: DateTime<Utc>,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(AtomicU64::new(0)),
            sequence: Arc::new(AtomicU64::new(0)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            epoch: Utc
                .timestamp_opt(SIM_EPOCH_SECS, 0)
                .single()
                .unwrap_or_default(),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        self.virtual_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        self.virtual_time_ns.load(Ordering::SeqCst)
    }

    /// Wall-clock time of virtual time zero.
    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            sequence: Arc::clone(&self.sequence),
            rng: Arc::clone(&self.rng),
            epoch: self.epoch,
        }
    }
}

impl CorrelationContext for SimContext {
    fn now(&self) -> DateTime<Utc> {
        self.epoch + chrono::Duration::nanoseconds(self.time_ns() as i64)
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn entropy(&self) -> u32 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen()
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_context_time() {
        let ctx = SimContext::new(42);
        assert_eq!(ctx.now(), ctx.epoch());
        assert_eq!(ctx.epoch().timestamp(), SIM_EPOCH_SECS);

        ctx.advance_time(Duration::from_secs(1));
        ctx.advance_time(Duration::from_millis(500));
        assert_eq!((ctx.now() - ctx.epoch()).num_milliseconds(), 1500);
    }

    #[test]
    fn test_sim_context_deterministic_entropy() {
        let ctx1 = SimContext::new(42);
        let ctx2 = SimContext::new(42);
        let a: Vec<u32> = (0..4).map(|_| ctx1.entropy()).collect();
        let b: Vec<u32> = (0..4).map(|_| ctx2.entropy()).collect();

        // Same seed = same bits
        assert_eq!(a, b);
        assert_ne!(a, (0..4).map(|_| SimContext::new(43).entropy()).collect::<Vec<_>>());
    }

    #[test]
    fn test_sim_context_sequence() {
        let ctx = SimContext::new(7);
        assert_eq!(ctx.next_sequence(), 1);
        assert_eq!(ctx.next_sequence(), 2);
        assert_eq!(ctx.seed(), 7);
    }

    #[test]
    fn test_sim_context_clone_shares_state() {
        let ctx1 = SimContext::new(42);
        let ctx2 = ctx1.clone();

        ctx1.advance_time(Duration::from_secs(5));
        ctx1.next_sequence();

        // Both should see the same time and sequence
        assert_eq!(ctx1.now(), ctx2.now());
        assert_eq!(ctx2.next_sequence(), 2);
    }
}
