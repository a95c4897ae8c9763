//! Production implementation of CorrelationContext using the system clock.

use crate::CorrelationContext;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Production context backed by the system clock and OS-seeded entropy.
///
/// This is the "real" implementation used by the dashboard. Time comes from
/// the system clock, randomness from the thread RNG.
pub struct SystemContext {
    /// Last sequence value handed out
    sequence: AtomicU64,
}

impl SystemContext {
    /// Default starting point of the mission sequence.
    ///
    /// The dashboard ships three built-in demo missions, so the first minted
    /// identifier is `MISSION-4`.
    pub const DEFAULT_SEQUENCE_START: u64 = 3;

    /// Creates a new SystemContext.
    pub fn new() -> Self {
        Self::starting_at(Self::DEFAULT_SEQUENCE_START)
    }

    /// Creates a context whose first `next_sequence()` returns `start + 1`.
    pub fn starting_at(start: u64) -> Self {
        Self {
            sequence: AtomicU64::new(start),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for SystemContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationContext for SystemContext {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn entropy(&self) -> u32 {
        rand::thread_rng().gen()
    }

    fn seed(&self) -> u64 {
        // Production is not seeded
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_context_sequence_is_monotonic() {
        let ctx = SystemContext::new();
        let first = ctx.next_sequence();
        let second = ctx.next_sequence();

        assert_eq!(first, SystemContext::DEFAULT_SEQUENCE_START + 1);
        assert!(second > first);
    }

    #[test]
    fn test_system_context_starting_at() {
        let ctx = SystemContext::starting_at(100);
        assert_eq!(ctx.next_sequence(), 101);
    }

    #[test]
    fn test_system_context_time_advances() {
        let ctx = SystemContext::new();
        let t1 = ctx.now();
        let t2 = ctx.now();
        assert!(t2 >= t1);
    }

    #[test]
    fn test_system_context_seed() {
        let ctx = SystemContext::new();
        assert_eq!(ctx.seed(), 0);
    }
}
