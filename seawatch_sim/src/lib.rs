//! SeaWatch Deterministic Simulation Testing (DST) Harness
//!
//! This crate provides a controlled environment in which the correlation
//! engine runs deterministically against a synthetic maritime workload.
//!
//! # Core Principle: One Seed, One Run
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: Virtual clock advances only when a scenario steps it
//! - **Identity**: Mission sequence restarts at zero for every run
//! - **Randomness**: Point-id entropy and the workload both derive from one 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                         │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimContext (Virtual Clock + Sequence + ChaCha8)      │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │                                                     │
//! │  ┌────▼──────────────┐   payloads   ┌──────────────────┐    │
//! │  │ CorrelationEngine │◄─────────────│      Oracle      │    │
//! │  │                   │              │ (vessels, points,│    │
//! │  └────┬──────────────┘              │   missions)      │    │
//! │       │ after every step            └──────────────────┘    │
//! │  ┌────▼──────────────┐                                      │
//! │  │ consistency check │──► StepFrame ──► SimExport (JSON)    │
//! │  └───────────────────┘                                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use seawatch_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).with_steps(500).run(ScenarioId::Interleaved);
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod exporter;
mod oracle;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use error::SimError;
pub use exporter::{SimExport, StepFrame};
pub use oracle::{Oracle, PointShape, SimVessel, TargetStyle, ACTION_KINDS};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
