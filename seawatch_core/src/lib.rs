//! SeaWatch Core - Mission / Track Point Correlation
//!
//! This library keeps dispatched missions and sampled vessel positions paired
//! under a strict one-to-one binding, solving three problems of the
//! dashboard's earlier ad-hoc linking:
//! 1. **Duplicate Mission Problem**: re-submitting the same action for the
//!    same source point returns the existing mission instead of a copy
//! 2. **Orphaned Binding Problem**: every binding is mirrored on both sides
//!    and stale partners are unbound before a new pair is committed
//! 3. **Shape Drift Problem**: legacy and canonical point records are
//!    resolved through one injected [`IdentityResolver`]

pub mod metrics;
pub mod seawatch_correlation;
pub mod seawatch_identity;
pub mod seawatch_ledger;
pub mod seawatch_registry;
pub mod validation;

// Re-export key types for convenience
pub use metrics::{link_score, CorrelationStats, LinkMetrics, MAX_LINK_SCORE};
pub use seawatch_correlation::{CorrelationConfig, CorrelationEngine, CorrelationError};
pub use seawatch_identity::{CanonicalPoint, IdentityResolver, LegacyFieldResolver, ResolveError};
pub use seawatch_ledger::{LinkLedger, LinkReason, LinkRecord};
pub use seawatch_registry::{
    ActionKind, Mission, MissionInput, MissionStatus, PointKind, ScanOrder, TrackPoint,
};
pub use validation::{ConsistencyReport, Violation};
