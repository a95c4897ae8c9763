//! SeaWatch Metrics Module
//! ========================
//!
//! Link strength scoring and engine counters.
//!
//! The link score is surfaced to the presentation layer as "how convincing is
//! this pairing". It never influences which pair the engine chooses:
//! selection is first-match-wins under the qualification predicate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::seawatch_ledger::LinkReason;
use crate::seawatch_registry::{Mission, PointKind, TrackPoint};

// =============================================================================
// LINK SCORE
// =============================================================================

/// Weight of the time-proximity component
pub const TIME_WEIGHT: f64 = 0.5;

/// Flat bonus for points that expect a downstream task
pub const TASK_BONUS: f64 = 0.3;

/// Weight of the point-kind component
pub const KIND_WEIGHT: f64 = 0.2;

/// Kind score of a `Current` point
pub const CURRENT_KIND_SCORE: f64 = 0.8;

/// Kind score of a `Future` point paired with a scheduled mission
pub const SCHEDULED_FUTURE_KIND_SCORE: f64 = 0.5;

/// Kind score of everything else
pub const OTHER_KIND_SCORE: f64 = 0.2;

/// Upper bound of [`link_score`]: `0.5 + 0.3 + 0.2 * 0.8`
pub const MAX_LINK_SCORE: f64 = TIME_WEIGHT + TASK_BONUS + KIND_WEIGHT * CURRENT_KIND_SCORE;

/// Score a candidate pairing.
///
/// # Formula
/// ```text
/// time  = max(0, 1 - Δt / window)
/// task  = 0.3 if point.has_task else 0
/// kind  = 0.8 current | 0.5 future ∧ scheduled | 0.2 otherwise
/// score = 0.5 * time + task + 0.2 * kind        ∈ [0, 0.96]
/// ```
pub fn link_score(
    time_delta: Duration,
    window: Duration,
    point_kind: PointKind,
    has_task: bool,
    mission_scheduled: bool,
) -> f64 {
    let time_score = if window.is_zero() {
        0.0
    } else {
        (1.0 - time_delta.as_secs_f64() / window.as_secs_f64()).max(0.0)
    };

    let task_bonus = if has_task { TASK_BONUS } else { 0.0 };

    let kind_score = match point_kind {
        PointKind::Current => CURRENT_KIND_SCORE,
        PointKind::Future if mission_scheduled => SCHEDULED_FUTURE_KIND_SCORE,
        _ => OTHER_KIND_SCORE,
    };

    TIME_WEIGHT * time_score + task_bonus + KIND_WEIGHT * kind_score
}

/// Time delta, window and score of one pairing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkMetrics {
    /// |point.timestamp - mission.timestamp|
    #[serde(with = "millis")]
    pub time_delta: Duration,

    /// Window selected by the mission's action kind
    #[serde(with = "millis")]
    pub window: Duration,

    pub score: f64,
}

impl LinkMetrics {
    /// Computes metrics for a pair; `None` if either side lacks a timestamp.
    pub fn compute(mission: &Mission, point: &TrackPoint, window: Duration) -> Option<Self> {
        let time_delta = time_delta(mission, point)?;
        Some(Self {
            time_delta,
            window,
            score: link_score(
                time_delta,
                window,
                point.kind,
                point.has_task,
                mission.is_scheduled,
            ),
        })
    }

    /// True when the delta lies within the window (inclusive).
    pub fn within_window(&self) -> bool {
        self.time_delta <= self.window
    }
}

/// Absolute time between a mission and a point.
pub fn time_delta(mission: &Mission, point: &TrackPoint) -> Option<Duration> {
    let mission_time = mission.timestamp?;
    let point_time = point.timestamp?;
    let delta = point_time - mission_time;
    let delta = if delta < chrono::Duration::zero() { -delta } else { delta };
    delta.to_std().ok()
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

// =============================================================================
// ENGINE COUNTERS
// =============================================================================

/// Running counters of what the correlation engine has done.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorrelationStats {
    pub missions_registered: u64,
    pub missions_minted: u64,
    pub missions_reused: u64,
    pub points_registered: u64,
    /// Points registered through the degraded canonicalization path
    pub points_degraded: u64,

    pub explicit_binds: u64,
    pub explicit_source_matches: u64,
    pub auto_links: u64,
    pub unbinds: u64,

    /// Qualifying candidates passed over because one side was taken
    pub skipped_conflicts: u64,
    pub rejected_window: u64,
    pub rejected_vessel: u64,
    pub rejected_missing_timestamp: u64,
}

impl CorrelationStats {
    pub(crate) fn record_commit(&mut self, reason: LinkReason) {
        match reason {
            LinkReason::ExplicitBind => self.explicit_binds += 1,
            LinkReason::ExplicitSourceMatch => self.explicit_source_matches += 1,
            LinkReason::AutoTimeVessel => self.auto_links += 1,
        }
    }

    /// Total bindings committed, by any path.
    pub fn total_links(&self) -> u64 {
        self.explicit_binds + self.explicit_source_matches + self.auto_links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_max_link_score() {
        assert_relative_eq!(MAX_LINK_SCORE, 0.96, epsilon = 1e-12);
        let best = link_score(Duration::ZERO, HOUR, PointKind::Current, true, false);
        assert_relative_eq!(best, MAX_LINK_SCORE, epsilon = 1e-12);
    }

    #[test]
    fn test_time_component_clamps_at_zero() {
        let far = link_score(HOUR * 10, HOUR, PointKind::History, false, false);
        assert_relative_eq!(far, KIND_WEIGHT * OTHER_KIND_SCORE, epsilon = 1e-12);
    }

    #[test]
    fn test_future_point_needs_scheduled_mission() {
        let scheduled = link_score(HOUR, HOUR, PointKind::Future, false, true);
        let immediate = link_score(HOUR, HOUR, PointKind::Future, false, false);

        assert_relative_eq!(scheduled, 0.2 * 0.5, epsilon = 1e-12);
        assert_relative_eq!(immediate, 0.2 * 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_ten_minutes_into_track_window() {
        let score = link_score(
            Duration::from_secs(600),
            HOUR * 4,
            PointKind::Current,
            true,
            false,
        );
        let expected = 0.5 * (1.0 - 600_000.0 / 14_400_000.0) + 0.3 + 0.2 * 0.8;
        assert_relative_eq!(score, expected, epsilon = 1e-12);
        assert_relative_eq!(score, 0.939, epsilon = 1e-3);
    }

    #[test]
    fn test_link_metrics_serialize_as_millis() {
        let metrics = LinkMetrics {
            time_delta: Duration::from_secs(600),
            window: HOUR,
            score: 0.5,
        };
        let json = serde_json::to_value(metrics).unwrap();
        assert_eq!(json["timeDelta"], 600_000);
        assert_eq!(json["window"], 3_600_000);
    }

    #[test]
    fn test_stats_total_links() {
        let mut stats = CorrelationStats::default();
        stats.record_commit(LinkReason::AutoTimeVessel);
        stats.record_commit(LinkReason::ExplicitBind);
        stats.record_commit(LinkReason::ExplicitSourceMatch);
        assert_eq!(stats.total_links(), 3);
        assert_eq!(stats.auto_links, 1);
    }
}
