//! Mission and TrackPoint records, and the registries that own them.
//!
//! Both registries are instances of one generic [`Registry`]: a hash map
//! keyed by identifier plus an ordering index on registration sequence. The
//! ordering index is what makes the correlation scan deterministic; scans
//! walk it in the direction chosen by [`ScanOrder`] instead of relying on
//! hash-map iteration order.

use chrono::{DateTime, Utc};
use seawatch_env::{MissionId, PointId, VesselId};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

use crate::seawatch_identity::CanonicalPoint;

// ============================================================================
// ACTION KIND
// ============================================================================

/// The kind of response action a mission dispatches.
///
/// Kinds are case-insensitive; unrecognized kinds are kept lowercased in
/// `Other`, so `"Patrol"` and `"patrol"` are the same kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    /// Continuous tracking
    Track,
    /// UAV dispatch
    Uav,
    /// Satellite tasking
    Satellite,
    /// Notification only
    Notify,
    /// Anything else
    Other(String),
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Track => "track",
            ActionKind::Uav => "uav",
            ActionKind::Satellite => "satellite",
            ActionKind::Notify => "notify",
            ActionKind::Other(raw) => raw,
        }
    }
}

impl Default for ActionKind {
    fn default() -> Self {
        ActionKind::Other("other".to_string())
    }
}

impl From<String> for ActionKind {
    fn from(value: String) -> Self {
        let value = value.trim().to_lowercase();
        match value.as_str() {
            "track" => ActionKind::Track,
            "uav" => ActionKind::Uav,
            "satellite" => ActionKind::Satellite,
            "notify" => ActionKind::Notify,
            "" => ActionKind::default(),
            _ => ActionKind::Other(value),
        }
    }
}

impl From<&str> for ActionKind {
    fn from(value: &str) -> Self {
        ActionKind::from(value.to_string())
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// MISSION
// ============================================================================

/// Dispatch status of a mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Scheduled,
    Dispatched,
}

impl MissionStatus {
    pub fn for_schedule(is_scheduled: bool) -> Self {
        if is_scheduled {
            MissionStatus::Scheduled
        } else {
            MissionStatus::Dispatched
        }
    }
}

/// Caller-supplied description of a mission.
///
/// Field names follow the dashboard payloads (`action`, `targetInfo`,
/// `missionId` are accepted as aliases). Empty strings and `null` count as
/// absent; an absent action kind or schedule flag leaves an existing
/// mission's value alone on merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionInput {
    #[serde(default, alias = "missionId")]
    pub id: Option<MissionId>,

    #[serde(default, alias = "action")]
    pub action_kind: Option<ActionKind>,

    #[serde(default)]
    pub action_name: Option<String>,

    #[serde(default)]
    pub is_scheduled: Option<bool>,

    #[serde(default)]
    pub status: Option<MissionStatus>,

    #[serde(default)]
    pub target_vessel_id: Option<VesselId>,

    #[serde(default, alias = "targetInfo")]
    pub target_info_text: Option<String>,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub source_track_point_id: Option<PointId>,

    /// Inline reference to the originating point, in any accepted shape
    #[serde(default)]
    pub source_track_point: Option<Value>,

    /// Requested binding; legacy payloads send a one-element array
    #[serde(default, deserialize_with = "collapse_legacy_array")]
    pub bound_point_id: Option<PointId>,
}

impl MissionInput {
    /// Action kind, falling back to the default kind when absent.
    pub fn action_kind_or_default(&self) -> ActionKind {
        self.action_kind.clone().unwrap_or_default()
    }

    /// Schedule flag, treating an absent flag as immediate dispatch.
    pub fn is_scheduled_or_default(&self) -> bool {
        self.is_scheduled.unwrap_or(false)
    }
}

/// A requested or in-progress response action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub id: MissionId,
    pub action_kind: ActionKind,
    pub action_name: Option<String>,
    pub is_scheduled: bool,
    pub status: MissionStatus,
    pub target_vessel_id: Option<VesselId>,
    pub target_info_text: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub source_track_point_id: Option<PointId>,
    pub registered_seq: u64,
    pub(crate) bound_point_id: Option<PointId>,
}

impl Mission {
    /// Builds an unbound mission from its input.
    pub(crate) fn from_input(
        id: MissionId,
        input: MissionInput,
        source_track_point_id: Option<PointId>,
        registered_seq: u64,
    ) -> Self {
        let is_scheduled = input.is_scheduled_or_default();
        Self {
            id,
            status: input
                .status
                .unwrap_or_else(|| MissionStatus::for_schedule(is_scheduled)),
            action_kind: input.action_kind.unwrap_or_default(),
            action_name: non_empty(input.action_name),
            is_scheduled,
            target_vessel_id: input.target_vessel_id.filter(|v| !v.as_str().is_empty()),
            target_info_text: non_empty(input.target_info_text),
            timestamp: input.timestamp,
            source_track_point_id,
            registered_seq,
            bound_point_id: None,
        }
    }

    /// Overwrites fields with the non-empty values of `input`.
    ///
    /// Identity, registration order and binding are never touched.
    pub(crate) fn merge(&mut self, input: MissionInput) {
        if let Some(kind) = input.action_kind {
            self.action_kind = kind;
        }
        if let Some(is_scheduled) = input.is_scheduled {
            self.is_scheduled = is_scheduled;
        }
        // Status follows the schedule flag only when the caller sent one
        match (input.status, input.is_scheduled) {
            (Some(status), _) => self.status = status,
            (None, Some(is_scheduled)) => self.status = MissionStatus::for_schedule(is_scheduled),
            (None, None) => {}
        }
        if let Some(name) = non_empty(input.action_name) {
            self.action_name = Some(name);
        }
        if let Some(target) = input.target_vessel_id.filter(|v| !v.as_str().is_empty()) {
            self.target_vessel_id = Some(target);
        }
        if let Some(info) = non_empty(input.target_info_text) {
            self.target_info_text = Some(info);
        }
        if let Some(ts) = input.timestamp {
            self.timestamp = Some(ts);
        }
    }

    /// The point currently bound to this mission.
    pub fn bound_point_id(&self) -> Option<&PointId> {
        self.bound_point_id.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.bound_point_id.is_some()
    }
}

// ============================================================================
// TRACK POINT
// ============================================================================

/// Where a sample sits on a vessel's track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointKind {
    #[default]
    History,
    Current,
    Future,
}

impl PointKind {
    /// Parses `History` / `Current` / `Future`, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "history" => Some(PointKind::History),
            "current" => Some(PointKind::Current),
            "future" => Some(PointKind::Future),
            _ => None,
        }
    }
}

/// A sampled vessel position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPoint {
    pub id: PointId,
    pub vessel_id: VesselId,
    pub timestamp: Option<DateTime<Utc>>,
    pub kind: PointKind,
    pub has_task: bool,
    pub status: Option<String>,
    pub registered_seq: u64,

    /// The input exactly as registered (coordinates, display hints, ...)
    pub attributes: Value,

    pub(crate) bound_mission_id: Option<MissionId>,
}

impl TrackPoint {
    pub(crate) fn from_canonical(
        id: PointId,
        canonical: CanonicalPoint,
        attributes: Value,
        registered_seq: u64,
        bound_mission_id: Option<MissionId>,
    ) -> Self {
        Self {
            id,
            vessel_id: canonical.vessel_id,
            timestamp: canonical.timestamp,
            kind: canonical.kind,
            has_task: canonical.has_task,
            status: canonical.status,
            registered_seq,
            attributes,
            bound_mission_id,
        }
    }

    /// The mission currently bound to this point.
    pub fn bound_mission_id(&self) -> Option<&MissionId> {
        self.bound_mission_id.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.bound_mission_id.is_some()
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Direction in which scans walk a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanOrder {
    /// Oldest registration first
    #[default]
    Registration,
    /// Newest registration first
    ReverseRegistration,
}

/// Records keyed by identifier, iterable in registration order.
#[derive(Debug, Clone)]
pub struct Registry<K, R> {
    records: HashMap<K, R>,
    sequences: HashMap<K, u64>,
    order: BTreeMap<u64, K>,
}

impl<K, R> Registry<K, R>
where
    K: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            sequences: HashMap::new(),
            order: BTreeMap::new(),
        }
    }

    /// Stores `record` under `key` at position `seq`.
    ///
    /// Replacing an existing key moves it to `seq`; pass the key's current
    /// sequence to keep its position.
    pub fn insert(&mut self, key: K, seq: u64, record: R) {
        if let Some(old_seq) = self.sequences.insert(key.clone(), seq) {
            self.order.remove(&old_seq);
        }
        self.order.insert(seq, key.clone());
        self.records.insert(key, record);
    }

    pub fn get(&self, key: &K) -> Option<&R> {
        self.records.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut R> {
        self.records.get_mut(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.records.contains_key(key)
    }

    /// Registration sequence of `key`, if present.
    pub fn sequence_of(&self, key: &K) -> Option<u64> {
        self.sequences.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates records in the requested order.
    pub fn iter_ordered(&self, order: ScanOrder) -> Box<dyn Iterator<Item = &R> + '_> {
        let keys = self.order.values();
        match order {
            ScanOrder::Registration => Box::new(keys.filter_map(move |k| self.records.get(k))),
            ScanOrder::ReverseRegistration => {
                Box::new(keys.rev().filter_map(move |k| self.records.get(k)))
            }
        }
    }
}

impl<K, R> Default for Registry<K, R>
where
    K: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Accepts `"P1"`, `["P1"]`, `[]` or `null` and keeps at most one id.
fn collapse_legacy_array<'de, D>(deserializer: D) -> Result<Option<PointId>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(PointId),
        Many(Vec<PointId>),
    }

    let id = match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(id)) => Some(id),
        Some(OneOrMany::Many(ids)) => ids.into_iter().next(),
        None => None,
    };
    Ok(id.filter(|id| !id.as_str().is_empty()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_kind_parsing() {
        assert_eq!(ActionKind::from("track"), ActionKind::Track);
        assert_eq!(ActionKind::from("UAV"), ActionKind::Uav);
        assert_eq!(ActionKind::from("satellite"), ActionKind::Satellite);
        assert_eq!(ActionKind::from("notify"), ActionKind::Notify);
        assert_eq!(ActionKind::from("patrol"), ActionKind::Other("patrol".to_string()));
        assert_eq!(ActionKind::from("Patrol"), ActionKind::from("patrol"));
        assert_eq!(ActionKind::from("Patrol").as_str(), "patrol");
        assert_eq!(ActionKind::from(""), ActionKind::default());
    }

    #[test]
    fn test_mission_input_accepts_dashboard_payload() {
        let input: MissionInput = serde_json::from_value(json!({
            "action": "uav",
            "targetInfo": "MMSI 416123456 near Penghu",
            "targetVesselId": "416123456",
            "isScheduled": true,
            "timestamp": "2024-01-01T03:00:00Z",
            "boundPointId": ["P7"],
        }))
        .unwrap();

        assert_eq!(input.action_kind, Some(ActionKind::Uav));
        assert_eq!(input.target_info_text.as_deref(), Some("MMSI 416123456 near Penghu"));
        assert_eq!(input.is_scheduled, Some(true));
        assert_eq!(input.bound_point_id, Some(PointId::from("P7")));
    }

    #[test]
    fn test_mission_input_null_action_is_absent() {
        let input: MissionInput =
            serde_json::from_value(json!({ "action": null, "isScheduled": null })).unwrap();
        assert_eq!(input.action_kind, None);
        assert_eq!(input.is_scheduled, None);
        assert_eq!(input.action_kind_or_default(), ActionKind::default());
        assert!(!input.is_scheduled_or_default());
    }

    #[test]
    fn test_legacy_bound_array_shapes() {
        let empty: MissionInput = serde_json::from_value(json!({ "boundPointId": [] })).unwrap();
        assert_eq!(empty.bound_point_id, None);

        let null: MissionInput = serde_json::from_value(json!({ "boundPointId": null })).unwrap();
        assert_eq!(null.bound_point_id, None);

        let single: MissionInput = serde_json::from_value(json!({ "boundPointId": "P1" })).unwrap();
        assert_eq!(single.bound_point_id, Some(PointId::from("P1")));
    }

    #[test]
    fn test_mission_status_defaults_from_schedule() {
        let input = MissionInput {
            is_scheduled: Some(true),
            ..Default::default()
        };
        let mission = Mission::from_input(MissionId::from("M1"), input, None, 0);
        assert_eq!(mission.status, MissionStatus::Scheduled);
        assert_eq!(mission.action_kind, ActionKind::default());
        assert!(!mission.is_bound());
    }

    #[test]
    fn test_mission_merge_keeps_existing_on_empty() {
        let input = MissionInput {
            action_kind: Some(ActionKind::Track),
            target_info_text: Some("first".to_string()),
            action_name: Some("Track".to_string()),
            ..Default::default()
        };
        let mut mission = Mission::from_input(MissionId::from("M1"), input, None, 0);
        mission.bound_point_id = Some(PointId::from("P1"));

        mission.merge(MissionInput {
            action_kind: Some(ActionKind::Track),
            target_info_text: Some(String::new()),
            action_name: Some("Continuous track".to_string()),
            ..Default::default()
        });

        assert_eq!(mission.target_info_text.as_deref(), Some("first"));
        assert_eq!(mission.action_name.as_deref(), Some("Continuous track"));
        assert_eq!(mission.bound_point_id(), Some(&PointId::from("P1")));
    }

    #[test]
    fn test_mission_merge_leaves_unsent_kind_and_schedule() {
        let input = MissionInput {
            action_kind: Some(ActionKind::Track),
            is_scheduled: Some(true),
            ..Default::default()
        };
        let mut mission = Mission::from_input(MissionId::from("M1"), input, None, 0);

        mission.merge(MissionInput {
            action_name: Some("renamed".to_string()),
            ..Default::default()
        });
        assert_eq!(mission.action_kind, ActionKind::Track);
        assert!(mission.is_scheduled);
        assert_eq!(mission.status, MissionStatus::Scheduled);

        mission.merge(MissionInput {
            is_scheduled: Some(false),
            ..Default::default()
        });
        assert!(!mission.is_scheduled);
        assert_eq!(mission.status, MissionStatus::Dispatched);
        assert_eq!(mission.action_kind, ActionKind::Track);

        mission.merge(MissionInput {
            status: Some(MissionStatus::Scheduled),
            ..Default::default()
        });
        assert!(!mission.is_scheduled);
        assert_eq!(mission.status, MissionStatus::Scheduled);
    }

    #[test]
    fn test_point_kind_parse() {
        assert_eq!(PointKind::parse("Future"), Some(PointKind::Future));
        assert_eq!(PointKind::parse("CURRENT"), Some(PointKind::Current));
        assert_eq!(PointKind::parse("bogus"), None);
    }

    #[test]
    fn test_registry_orders_by_sequence() {
        let mut registry: Registry<String, u32> = Registry::new();
        registry.insert("b".to_string(), 2, 20);
        registry.insert("a".to_string(), 1, 10);
        registry.insert("c".to_string(), 3, 30);

        let forward: Vec<u32> = registry.iter_ordered(ScanOrder::Registration).copied().collect();
        assert_eq!(forward, vec![10, 20, 30]);

        let backward: Vec<u32> = registry
            .iter_ordered(ScanOrder::ReverseRegistration)
            .copied()
            .collect();
        assert_eq!(backward, vec![30, 20, 10]);
    }

    #[test]
    fn test_registry_replace_keeps_single_entry() {
        let mut registry: Registry<String, u32> = Registry::new();
        registry.insert("a".to_string(), 1, 10);
        registry.insert("b".to_string(), 2, 20);
        registry.insert("a".to_string(), 1, 11);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(&"a".to_string()), Some(&11));
        assert_eq!(registry.sequence_of(&"a".to_string()), Some(1));

        let forward: Vec<u32> = registry.iter_ordered(ScanOrder::Registration).copied().collect();
        assert_eq!(forward, vec![11, 20]);
    }
}
