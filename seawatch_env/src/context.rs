//! Core environment context trait for the correlation engine.

use chrono::{DateTime, Utc};

/// The central interface for environment interaction.
///
/// This trait abstracts the "real world" so that the correlation engine can
/// run in both production and deterministic simulation.
///
/// # Implementations
///
/// - **Production**: `SystemContext` - wraps `chrono::Utc::now`, thread RNG
/// - **Simulation**: `SimContext` - virtual clock, `ChaCha8Rng(seed)`
///
/// # Determinism
///
/// All methods that would normally introduce non-determinism (time,
/// identifiers, randomness) are controlled by the implementation. The engine
/// never reads the system clock or a global counter directly.
pub trait CorrelationContext: Send + Sync + 'static {
    /// Returns the wall-clock time.
    ///
    /// Used for link record timestamps and time-based point identifiers.
    /// In simulation, this is derived from virtual clock + epoch offset.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the next value of a strictly increasing sequence.
    ///
    /// Minted mission identifiers are drawn from here, so two calls never
    /// return the same value within a context's lifetime.
    fn next_sequence(&self) -> u64;

    /// Returns 32 random bits.
    ///
    /// Only used to make minted point identifiers collision-resistant within
    /// a session; callers must not rely on its distribution.
    fn entropy(&self) -> u32;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    /// In simulation, returns the master seed.
    fn seed(&self) -> u64;
}
