//! SeaWatch Environment Abstraction Layer
//!
//! This crate provides the seams through which the correlation engine
//! observes the outside world, so the same engine runs unchanged in
//! **Production** (system clock, OS entropy) and **Simulation** (virtual
//! clock, seeded RNG).
//!
//! # Core Concept
//!
//! Every source of non-determinism the engine needs is injected:
//! - Time (`now()`) for link timestamps and point-id minting
//! - Identity (`next_sequence()`) for mission identifiers
//! - Randomness (`entropy()`) for point-id suffixes
//!
//! By deriving all of them from a single context, a simulated run is
//! reproducible from its seed number.
//!
//! # Example
//!
//! ```ignore
//! use seawatch_env::{CorrelationContext, SystemContext};
//!
//! let ctx = SystemContext::shared();
//! let first = ctx.next_sequence();
//! assert!(ctx.next_sequence() > first);
//! ```

mod context;
mod types;
mod system_impl;

pub use context::CorrelationContext;
pub use types::{MissionId, PointId, VesselId, UNKNOWN_VESSEL};
pub use system_impl::SystemContext;
