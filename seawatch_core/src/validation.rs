//! Validation Module - Binding Consistency Checks
//! ===============================================
//!
//! Audits a correlation engine's registries against the one-to-one binding
//! invariant and the link ledger against the registries.
//!
//! Checks performed:
//! - Every binding points at a registered record (no dangling references)
//! - Every binding is mirrored on the other side (bidirectional)
//! - Recorded link scores lie in `[0, MAX_LINK_SCORE]`
//! - Auto links were inside their window when committed
//!
//! Ledger records for pairs that are no longer bound are reported as stale;
//! they are diagnostic noise, not invariant violations.
//!
//! Usage:
//! ```ignore
//! let report = engine.validate();
//! if !report.is_consistent() {
//!     report.print();
//! }
//! ```

use seawatch_env::{CorrelationContext, MissionId, PointId};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::metrics::MAX_LINK_SCORE;
use crate::seawatch_correlation::CorrelationEngine;
use crate::seawatch_ledger::{LinkLedger, LinkReason};
use crate::seawatch_registry::{Mission, TrackPoint};

// =============================================================================
// VIOLATIONS
// =============================================================================

/// A single broken invariant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// Mission bound to a point that is not registered
    DanglingMissionBinding { mission: MissionId, point: PointId },

    /// Point bound to a mission that is not registered
    DanglingPointBinding { point: PointId, mission: MissionId },

    /// One side names the other, the other names someone else (or nobody)
    AsymmetricBinding {
        mission: MissionId,
        point: PointId,
        point_bound_to: Option<MissionId>,
    },

    ScoreOutOfBounds {
        mission: MissionId,
        point: PointId,
        score: f64,
    },

    /// Auto link whose recorded delta exceeds its window
    AutoLinkOutsideWindow { mission: MissionId, point: PointId },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DanglingMissionBinding { mission, point } => {
                write!(f, "mission {} bound to unregistered point {}", mission, point)
            }
            Violation::DanglingPointBinding { point, mission } => {
                write!(f, "point {} bound to unregistered mission {}", point, mission)
            }
            Violation::AsymmetricBinding {
                mission,
                point,
                point_bound_to,
            } => write!(
                f,
                "mission {} -> point {} but point -> {}",
                mission,
                point,
                point_bound_to
                    .as_ref()
                    .map(|m| m.as_str())
                    .unwrap_or("nothing")
            ),
            Violation::ScoreOutOfBounds {
                mission,
                point,
                score,
            } => write!(f, "link {} <-> {} has score {:.4}", mission, point, score),
            Violation::AutoLinkOutsideWindow { mission, point } => {
                write!(f, "auto link {} <-> {} outside its window", mission, point)
            }
        }
    }
}

// =============================================================================
// CONSISTENCY REPORT
// =============================================================================

/// Result of a consistency audit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsistencyReport {
    pub missions_checked: usize,
    pub points_checked: usize,

    /// Number of mutually bound pairs
    pub bound_pairs: usize,

    pub violations: Vec<Violation>,

    /// Ledger records for pairs that are not currently bound
    pub stale_links: Vec<(MissionId, PointId)>,
}

impl ConsistencyReport {
    /// True when no invariant is violated.
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }

    /// Print formatted report to console
    pub fn print(&self) {
        println!();
        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║               SEAWATCH CONSISTENCY REPORT                    ║");
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║ Missions Checked:      {:>10}                            ║", self.missions_checked);
        println!("║ Points Checked:        {:>10}                            ║", self.points_checked);
        println!("║ Bound Pairs:           {:>10}                            ║", self.bound_pairs);
        println!("║ Stale Ledger Records:  {:>10}                            ║", self.stale_links.len());
        println!("║ Violations:            {:>10}                            ║", self.violations.len());
        println!("╚══════════════════════════════════════════════════════════════╝");

        for violation in self.violations.iter().take(10) {
            println!("  ✗ {}", violation);
        }
    }
}

// =============================================================================
// CHECKS
// =============================================================================

/// Audits an engine's current state.
pub fn check_consistency<Ctx: CorrelationContext>(
    engine: &CorrelationEngine<Ctx>,
) -> ConsistencyReport {
    let missions: Vec<&Mission> = engine.missions().collect();
    let points: Vec<&TrackPoint> = engine.track_points().collect();
    check_records(&missions, &points, engine.ledger())
}

/// Audits a set of records and the ledger describing them.
pub fn check_records(
    missions: &[&Mission],
    points: &[&TrackPoint],
    ledger: &LinkLedger,
) -> ConsistencyReport {
    let mission_index: HashMap<&MissionId, &Mission> =
        missions.iter().map(|m| (&m.id, *m)).collect();
    let point_index: HashMap<&PointId, &TrackPoint> =
        points.iter().map(|p| (&p.id, *p)).collect();

    let mut report = ConsistencyReport {
        missions_checked: missions.len(),
        points_checked: points.len(),
        ..Default::default()
    };

    for mission in missions {
        let Some(point_id) = mission.bound_point_id() else {
            continue;
        };
        match point_index.get(point_id) {
            None => report.violations.push(Violation::DanglingMissionBinding {
                mission: mission.id.clone(),
                point: point_id.clone(),
            }),
            Some(point) if point.bound_mission_id() == Some(&mission.id) => {
                report.bound_pairs += 1;
            }
            Some(point) => report.violations.push(Violation::AsymmetricBinding {
                mission: mission.id.clone(),
                point: point_id.clone(),
                point_bound_to: point.bound_mission_id().cloned(),
            }),
        }
    }

    for point in points {
        let Some(mission_id) = point.bound_mission_id() else {
            continue;
        };
        match mission_index.get(mission_id) {
            None => report.violations.push(Violation::DanglingPointBinding {
                point: point.id.clone(),
                mission: mission_id.clone(),
            }),
            // Pairs where the mission side disagrees were reported above
            Some(mission) if mission.bound_point_id().is_none() => {
                report.violations.push(Violation::AsymmetricBinding {
                    mission: mission_id.clone(),
                    point: point.id.clone(),
                    point_bound_to: Some(mission_id.clone()),
                })
            }
            Some(_) => {}
        }
    }

    for record in ledger.iter() {
        let bound = mission_index
            .get(&record.mission_id)
            .is_some_and(|m| m.bound_point_id() == Some(&record.point_id));
        if !bound {
            report
                .stale_links
                .push((record.mission_id.clone(), record.point_id.clone()));
            continue;
        }

        let Some(metrics) = record.metrics else {
            continue;
        };
        if !(0.0..=MAX_LINK_SCORE + f64::EPSILON).contains(&metrics.score) {
            report.violations.push(Violation::ScoreOutOfBounds {
                mission: record.mission_id.clone(),
                point: record.point_id.clone(),
                score: metrics.score,
            });
        }
        if record.link_reason == LinkReason::AutoTimeVessel && !metrics.within_window() {
            report.violations.push(Violation::AutoLinkOutsideWindow {
                mission: record.mission_id.clone(),
                point: record.point_id.clone(),
            });
        }
    }

    report.stale_links.sort();
    report
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::LinkMetrics;
    use crate::seawatch_identity::CanonicalPoint;
    use crate::seawatch_ledger::LinkRecord;
    use crate::seawatch_registry::MissionInput;
    use chrono::{TimeZone, Utc};
    use seawatch_env::VesselId;
    use serde_json::Value;
    use std::time::Duration;

    fn mission(id: &str, bound: Option<&str>) -> Mission {
        let mut m = Mission::from_input(MissionId::from(id), MissionInput::default(), None, 0);
        m.bound_point_id = bound.map(PointId::from);
        m
    }

    fn point(id: &str, bound: Option<&str>) -> TrackPoint {
        let canonical = CanonicalPoint {
            id: None,
            vessel_id: VesselId::unknown(),
            timestamp: None,
            kind: Default::default(),
            has_task: false,
            status: None,
        };
        TrackPoint::from_canonical(
            PointId::from(id),
            canonical,
            Value::Null,
            0,
            bound.map(MissionId::from),
        )
    }

    fn record(mission: &str, point: &str, reason: LinkReason, delta_secs: u64, score: f64) -> LinkRecord {
        LinkRecord {
            mission_id: MissionId::from(mission),
            point_id: PointId::from(point),
            link_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            link_reason: reason,
            metrics: Some(LinkMetrics {
                time_delta: Duration::from_secs(delta_secs),
                window: Duration::from_secs(3600),
                score,
            }),
        }
    }

    #[test]
    fn test_consistent_pair() {
        let m = mission("M1", Some("P1"));
        let p = point("P1", Some("M1"));
        let mut ledger = LinkLedger::new();
        ledger.record(record("M1", "P1", LinkReason::AutoTimeVessel, 60, 0.5));

        let report = check_records(&[&m], &[&p], &ledger);
        assert!(report.is_consistent());
        assert_eq!(report.bound_pairs, 1);
        assert!(report.stale_links.is_empty());
    }

    #[test]
    fn test_dangling_bindings() {
        let m = mission("M1", Some("ghost"));
        let p = point("P1", Some("M-ghost"));

        let report = check_records(&[&m], &[&p], &LinkLedger::new());
        assert_eq!(report.violations.len(), 2);
        assert!(matches!(report.violations[0], Violation::DanglingMissionBinding { .. }));
        assert!(matches!(report.violations[1], Violation::DanglingPointBinding { .. }));
    }

    #[test]
    fn test_asymmetric_binding_both_directions() {
        let m1 = mission("M1", Some("P1"));
        let p1 = point("P1", None);
        let m2 = mission("M2", None);
        let p2 = point("P2", Some("M2"));

        let report = check_records(&[&m1, &m2], &[&p1, &p2], &LinkLedger::new());
        assert_eq!(report.violations.len(), 2);
        assert!(report
            .violations
            .iter()
            .all(|v| matches!(v, Violation::AsymmetricBinding { .. })));
        assert_eq!(report.bound_pairs, 0);
    }

    #[test]
    fn test_ledger_checks() {
        let m = mission("M1", Some("P1"));
        let p = point("P1", Some("M1"));
        let mut ledger = LinkLedger::new();
        ledger.record(record("M1", "P1", LinkReason::AutoTimeVessel, 7200, 1.5));
        ledger.record(record("M9", "P9", LinkReason::ExplicitBind, 0, 0.5));

        let report = check_records(&[&m], &[&p], &ledger);
        assert_eq!(report.violations.len(), 2);
        assert!(matches!(report.violations[0], Violation::ScoreOutOfBounds { .. }));
        assert!(matches!(report.violations[1], Violation::AutoLinkOutsideWindow { .. }));
        assert_eq!(
            report.stale_links,
            vec![(MissionId::from("M9"), PointId::from("P9"))]
        );
    }

    #[test]
    fn test_explicit_link_may_exceed_window() {
        let m = mission("M1", Some("P1"));
        let p = point("P1", Some("M1"));
        let mut ledger = LinkLedger::new();
        ledger.record(record("M1", "P1", LinkReason::ExplicitBind, 7200, 0.2));

        assert!(check_records(&[&m], &[&p], &ledger).is_consistent());
    }

    #[test]
    fn test_violation_display() {
        let v = Violation::AsymmetricBinding {
            mission: MissionId::from("M1"),
            point: PointId::from("P1"),
            point_bound_to: None,
        };
        assert_eq!(v.to_string(), "mission M1 -> point P1 but point -> nothing");
    }
}
