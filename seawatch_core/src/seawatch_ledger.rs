//! The Link Ledger - diagnostic record of why each binding exists.
//!
//! The ledger is explanation text for the presentation layer, nothing more.
//! Whether a mission is bound to a point is answered by the registries'
//! binding fields alone; the ledger may be consulted to say *why*.

use chrono::{DateTime, Utc};
use seawatch_env::{MissionId, PointId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::metrics::LinkMetrics;

/// Why a binding was committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkReason {
    /// Caller asked for this pair
    ExplicitBind,
    /// The mission names this point as its source
    ExplicitSourceMatch,
    /// Time window and vessel identity both matched
    AutoTimeVessel,
}

impl LinkReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkReason::ExplicitBind => "explicit_bind",
            LinkReason::ExplicitSourceMatch => "explicit_source_match",
            LinkReason::AutoTimeVessel => "auto_time_vessel",
        }
    }
}

impl fmt::Display for LinkReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic metadata for one mission/point pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    pub mission_id: MissionId,
    pub point_id: PointId,
    pub link_time: DateTime<Utc>,
    pub link_reason: LinkReason,

    /// Absent when either side lacks a timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<LinkMetrics>,
}

/// Overwrite-only store of link records keyed by pair.
#[derive(Debug, Clone, Default)]
pub struct LinkLedger {
    links: HashMap<(MissionId, PointId), LinkRecord>,
}

impl LinkLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record, replacing any previous record for the same pair.
    pub fn record(&mut self, record: LinkRecord) -> Option<LinkRecord> {
        let key = (record.mission_id.clone(), record.point_id.clone());
        self.links.insert(key, record)
    }

    /// Removes the record for a pair.
    pub fn remove(&mut self, mission_id: &MissionId, point_id: &PointId) -> Option<LinkRecord> {
        self.links.remove(&(mission_id.clone(), point_id.clone()))
    }

    pub fn get(&self, mission_id: &MissionId, point_id: &PointId) -> Option<&LinkRecord> {
        self.links.get(&(mission_id.clone(), point_id.clone()))
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkRecord> {
        self.links.values()
    }

    /// All records naming `mission_id`.
    pub fn records_for_mission<'a>(
        &'a self,
        mission_id: &'a MissionId,
    ) -> impl Iterator<Item = &'a LinkRecord> + 'a {
        self.links.values().filter(move |r| &r.mission_id == mission_id)
    }

    /// All records naming `point_id`.
    pub fn records_for_point<'a>(
        &'a self,
        point_id: &'a PointId,
    ) -> impl Iterator<Item = &'a LinkRecord> + 'a {
        self.links.values().filter(move |r| &r.point_id == point_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(mission: &str, point: &str, reason: LinkReason) -> LinkRecord {
        LinkRecord {
            mission_id: MissionId::from(mission),
            point_id: PointId::from(point),
            link_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            link_reason: reason,
            metrics: None,
        }
    }

    #[test]
    fn test_record_overwrites_pair() {
        let mut ledger = LinkLedger::new();
        assert!(ledger.record(record("M1", "P1", LinkReason::AutoTimeVessel)).is_none());

        let previous = ledger.record(record("M1", "P1", LinkReason::ExplicitBind));
        assert_eq!(previous.map(|r| r.link_reason), Some(LinkReason::AutoTimeVessel));
        assert_eq!(ledger.len(), 1);

        let current = ledger.get(&MissionId::from("M1"), &PointId::from("P1")).unwrap();
        assert_eq!(current.link_reason, LinkReason::ExplicitBind);
    }

    #[test]
    fn test_remove_and_filters() {
        let mut ledger = LinkLedger::new();
        ledger.record(record("M1", "P1", LinkReason::AutoTimeVessel));
        ledger.record(record("M2", "P2", LinkReason::ExplicitSourceMatch));

        let m1 = MissionId::from("M1");
        let p2 = PointId::from("P2");
        assert_eq!(ledger.records_for_mission(&m1).count(), 1);
        assert_eq!(ledger.records_for_point(&p2).count(), 1);

        assert!(ledger.remove(&m1, &PointId::from("P1")).is_some());
        assert!(ledger.remove(&m1, &PointId::from("P1")).is_none());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_reason_serializes_snake_case() {
        let json = serde_json::to_string(&LinkReason::ExplicitSourceMatch).unwrap();
        assert_eq!(json, "\"explicit_source_match\"");
        assert_eq!(LinkReason::AutoTimeVessel.to_string(), "auto_time_vessel");
    }
}
