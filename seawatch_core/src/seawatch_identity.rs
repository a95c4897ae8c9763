//! The "IDENTITY" Engine - Point Shape Canonicalization
//!
//! Track points reach the engine in several shapes: flat legacy records
//! (`vesselId`, `mmsi`, `imo`, ...), records wrapped in a `data` envelope,
//! and canonical records carrying a nested `display` sub-record. This module
//! defines the contract the correlation engine needs from a resolver and a
//! default implementation that understands all of the above.
//!
//! Resolution never fails for identifiers: a point without any vessel field
//! resolves to the `UNKNOWN` sentinel, a point without an id is assigned one
//! by the engine. Only full canonicalization may fail, and the engine
//! degrades to [`IdentityResolver::degrade`] when it does.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use seawatch_env::{PointId, VesselId};
use serde_json::Value;

use crate::seawatch_registry::{MissionInput, PointKind};

/// Sub-records searched, in order, after the top level of a point.
const NESTED_RECORDS: [&str; 2] = ["data", "display"];

const POINT_ID_FIELDS: [&str; 2] = ["pointId", "id"];
const VESSEL_ID_FIELDS: [&str; 4] = ["vesselId", "vessel_id", "mmsi", "imo"];
const KIND_FIELDS: [&str; 3] = ["type", "kind", "pointType"];
const HAS_TASK_FIELDS: [&str; 2] = ["hasTask", "has_task"];

// ============================================================================
// CANONICAL POINT
// ============================================================================

/// A track point reduced to the fields the correlation engine reads.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalPoint {
    /// Stable point identifier, if the input carried one
    pub id: Option<PointId>,

    /// Resolved vessel identity (`UNKNOWN` when absent)
    pub vessel_id: VesselId,

    /// Sample time; `None` never matches any window
    pub timestamp: Option<DateTime<Utc>>,

    /// History / Current / Future
    pub kind: PointKind,

    /// Whether a downstream action is expected to attach here
    pub has_task: bool,

    /// Free-form status text carried for the presentation layer
    pub status: Option<String>,
}

// ============================================================================
// ERRORS
// ============================================================================

/// Errors raised by strict canonicalization.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("Track point is not a JSON object")]
    NotAnObject,

    #[error("Unparseable timestamp: {0}")]
    InvalidTimestamp(String),
}

// ============================================================================
// RESOLVER CONTRACT
// ============================================================================

/// Resolves identities of heterogeneous point representations.
///
/// Implementations are injected into the engine once at construction.
/// `resolve_point_id` and `resolve_vessel_id` must never panic; they degrade
/// to `None` and `UNKNOWN` respectively.
pub trait IdentityResolver: Send + Sync {
    /// Converts a raw point into its canonical shape.
    fn canonicalize(&self, raw: &Value) -> Result<CanonicalPoint, ResolveError>;

    /// Returns the stable identifier of a raw point, if it has one.
    fn resolve_point_id(&self, raw: &Value) -> Option<PointId>;

    /// Returns the vessel identity of a raw point.
    fn resolve_vessel_id(&self, raw: &Value) -> VesselId;

    /// Returns the point a mission input declares as its origin.
    ///
    /// An explicit `sourceTrackPointId` wins over an inline point reference.
    fn resolve_source_point_id(&self, input: &MissionInput) -> Option<PointId> {
        input
            .source_track_point_id
            .clone()
            .filter(|id| !id.as_str().is_empty())
            .or_else(|| {
                input
                    .source_track_point
                    .as_ref()
                    .and_then(|point| self.resolve_point_id(point))
            })
    }

    /// Best-effort canonical form used when `canonicalize` fails.
    ///
    /// Keeps whatever identity can be recovered and drops the timestamp, so
    /// the point is registered but never auto-linked by time.
    fn degrade(&self, raw: &Value) -> CanonicalPoint {
        CanonicalPoint {
            id: self.resolve_point_id(raw),
            vessel_id: self.resolve_vessel_id(raw),
            timestamp: None,
            kind: PointKind::default(),
            has_task: lookup_any(raw, &HAS_TASK_FIELDS)
                .and_then(Value::as_bool)
                .unwrap_or(false),
            status: None,
        }
    }
}

// ============================================================================
// DEFAULT RESOLVER
// ============================================================================

/// Resolver for the dashboard's legacy and canonical point shapes.
///
/// Every field is looked up on the record itself first, then inside the
/// `data` envelope, then inside the `display` sub-record.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyFieldResolver;

impl LegacyFieldResolver {
    pub fn new() -> Self {
        Self
    }
}

impl IdentityResolver for LegacyFieldResolver {
    fn canonicalize(&self, raw: &Value) -> Result<CanonicalPoint, ResolveError> {
        if !raw.is_object() {
            return Err(ResolveError::NotAnObject);
        }

        let timestamp = match lookup(raw, "timestamp") {
            Some(value) => Some(parse_timestamp(value)?),
            None => None,
        };

        let kind = lookup_any(raw, &KIND_FIELDS)
            .and_then(Value::as_str)
            .and_then(PointKind::parse)
            .unwrap_or_default();

        Ok(CanonicalPoint {
            id: self.resolve_point_id(raw),
            vessel_id: self.resolve_vessel_id(raw),
            timestamp,
            kind,
            has_task: lookup_any(raw, &HAS_TASK_FIELDS)
                .and_then(Value::as_bool)
                .unwrap_or(false),
            status: lookup(raw, "status").and_then(value_to_string),
        })
    }

    fn resolve_point_id(&self, raw: &Value) -> Option<PointId> {
        lookup_any(raw, &POINT_ID_FIELDS)
            .and_then(value_to_string)
            .map(PointId::from)
    }

    fn resolve_vessel_id(&self, raw: &Value) -> VesselId {
        lookup_any(raw, &VESSEL_ID_FIELDS)
            .and_then(value_to_string)
            .map(VesselId::from)
            .unwrap_or_else(VesselId::unknown)
    }
}

// ============================================================================
// FIELD HELPERS
// ============================================================================

/// Finds a non-null field on the record or one of its nested sub-records.
fn lookup<'a>(raw: &'a Value, key: &str) -> Option<&'a Value> {
    let direct = raw.get(key).filter(|v| !v.is_null());
    direct.or_else(|| {
        NESTED_RECORDS
            .iter()
            .filter_map(|nested| raw.get(*nested))
            .find_map(|sub| sub.get(key).filter(|v| !v.is_null()))
    })
}

/// Finds the first of several candidate keys, honouring key priority.
fn lookup_any<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| lookup(raw, key).filter(|v| value_to_string(v).is_some() || v.is_boolean()))
}

/// Identifier text of a scalar; empty strings count as absent.
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parses RFC 3339, naive ISO-8601 (taken as UTC) or epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, ResolveError> {
    match value {
        Value::Number(n) => {
            let millis = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or_else(|| ResolveError::InvalidTimestamp(n.to_string()))?;
            Utc.timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| ResolveError::InvalidTimestamp(n.to_string()))
        }
        Value::String(s) => parse_timestamp_str(s),
        other => Err(ResolveError::InvalidTimestamp(other.to_string())),
    }
}

fn parse_timestamp_str(s: &str) -> Result<DateTime<Utc>, ResolveError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(ResolveError::InvalidTimestamp(s.to_string()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_legacy_point() {
        let resolver = LegacyFieldResolver::new();
        let raw = json!({
            "pointId": "P1",
            "mmsi": 416123456,
            "timestamp": "2024-01-01T00:00:00Z",
            "type": "Current",
            "hasTask": true,
        });

        let point = resolver.canonicalize(&raw).unwrap();
        assert_eq!(point.id, Some(PointId::from("P1")));
        assert_eq!(point.vessel_id, VesselId::from("416123456"));
        assert_eq!(point.kind, PointKind::Current);
        assert!(point.has_task);
        assert_eq!(
            point.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_vessel_field_priority() {
        let resolver = LegacyFieldResolver::new();
        let raw = json!({ "imo": "IMO9", "vessel_id": "V2", "vesselId": "V1" });
        assert_eq!(resolver.resolve_vessel_id(&raw), VesselId::from("V1"));

        let raw = json!({ "imo": "IMO9", "mmsi": "" });
        assert_eq!(resolver.resolve_vessel_id(&raw), VesselId::from("IMO9"));
    }

    #[test]
    fn test_missing_vessel_is_unknown() {
        let resolver = LegacyFieldResolver::new();
        assert!(resolver.resolve_vessel_id(&json!({ "id": "x" })).is_unknown());
        assert!(resolver.resolve_vessel_id(&json!(null)).is_unknown());
        assert!(resolver.resolve_vessel_id(&json!("not a record")).is_unknown());
    }

    #[test]
    fn test_nested_data_and_display_records() {
        let resolver = LegacyFieldResolver::new();
        let raw = json!({
            "id": "P9",
            "data": { "vesselId": "vessel-003" },
            "display": { "type": "future", "status": "planned" },
            "timestamp": 1_704_067_200_000_i64,
        });

        let point = resolver.canonicalize(&raw).unwrap();
        assert_eq!(point.id, Some(PointId::from("P9")));
        assert_eq!(point.vessel_id, VesselId::from("vessel-003"));
        assert_eq!(point.kind, PointKind::Future);
        assert_eq!(point.status.as_deref(), Some("planned"));
        assert_eq!(
            point.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_point_id_prefers_point_id_field() {
        let resolver = LegacyFieldResolver::new();
        let raw = json!({ "pointId": "canonical", "id": "legacy" });
        assert_eq!(resolver.resolve_point_id(&raw), Some(PointId::from("canonical")));
        assert_eq!(resolver.resolve_point_id(&json!({})), None);
    }

    #[test]
    fn test_canonicalize_rejects_non_object() {
        let resolver = LegacyFieldResolver::new();
        assert_eq!(resolver.canonicalize(&json!([1, 2])), Err(ResolveError::NotAnObject));
    }

    #[test]
    fn test_bad_timestamp_fails_but_degrades() {
        let resolver = LegacyFieldResolver::new();
        let raw = json!({ "id": "P2", "vesselId": "V", "timestamp": "yesterday", "hasTask": true });

        assert!(matches!(
            resolver.canonicalize(&raw),
            Err(ResolveError::InvalidTimestamp(_))
        ));

        let degraded = resolver.degrade(&raw);
        assert_eq!(degraded.id, Some(PointId::from("P2")));
        assert_eq!(degraded.vessel_id, VesselId::from("V"));
        assert!(degraded.timestamp.is_none());
        assert!(degraded.has_task);
    }

    #[test]
    fn test_naive_timestamp_is_utc() {
        let ts = parse_timestamp(&json!("2024-03-05T10:20:30.500")).unwrap();
        assert_eq!(ts.timestamp_millis(), Utc.with_ymd_and_hms(2024, 3, 5, 10, 20, 30).unwrap().timestamp_millis() + 500);
    }

    #[test]
    fn test_source_point_id_resolution() {
        let resolver = LegacyFieldResolver::new();

        let explicit = MissionInput {
            source_track_point_id: Some(PointId::from("P1")),
            source_track_point: Some(json!({ "pointId": "P2" })),
            ..Default::default()
        };
        assert_eq!(resolver.resolve_source_point_id(&explicit), Some(PointId::from("P1")));

        let inline = MissionInput {
            source_track_point: Some(json!({ "id": "P2" })),
            ..Default::default()
        };
        assert_eq!(resolver.resolve_source_point_id(&inline), Some(PointId::from("P2")));

        assert_eq!(resolver.resolve_source_point_id(&MissionInput::default()), None);
    }
}
