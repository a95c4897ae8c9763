//! Identifier types shared by the registries and the link ledger.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Vessel identity used when no identifying field is present on a point.
pub const UNKNOWN_VESSEL: &str = "UNKNOWN";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from any string-like value.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier text.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a dispatched mission.
    ///
    /// Minted identifiers look like `MISSION-7`; caller-supplied ones are
    /// kept verbatim.
    MissionId
);

string_id!(
    /// Identifier of a sampled track point.
    PointId
);

string_id!(
    /// Identifier of a vessel (MMSI, IMO or a free-form tag).
    VesselId
);

impl MissionId {
    /// Mints a mission identifier from a sequence number.
    pub fn from_sequence(seq: u64) -> Self {
        Self(format!("MISSION-{}", seq))
    }
}

impl PointId {
    /// Mints a time-based point identifier: `TRACK-<epoch_ms>-<6 hex digits>`.
    pub fn from_time_and_entropy(epoch_ms: i64, entropy: u32) -> Self {
        Self(format!("TRACK-{}-{:06x}", epoch_ms, entropy & 0x00ff_ffff))
    }
}

impl VesselId {
    /// The `UNKNOWN` sentinel.
    pub fn unknown() -> Self {
        Self(UNKNOWN_VESSEL.to_string())
    }

    /// Returns true if this is the `UNKNOWN` sentinel.
    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_VESSEL
    }
}

impl Default for VesselId {
    fn default() -> Self {
        Self::unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mission_id_from_sequence() {
        assert_eq!(MissionId::from_sequence(4).as_str(), "MISSION-4");
    }

    #[test]
    fn test_point_id_suffix_is_six_hex_digits() {
        let id = PointId::from_time_and_entropy(1_700_000_000_000, 0xdead_beef);
        assert_eq!(id.as_str(), "TRACK-1700000000000-adbeef");

        let small = PointId::from_time_and_entropy(5, 0x1);
        assert_eq!(small.as_str(), "TRACK-5-000001");
    }

    #[test]
    fn test_vessel_unknown_sentinel() {
        assert!(VesselId::unknown().is_unknown());
        assert!(VesselId::default().is_unknown());
        assert!(!VesselId::from("416123456").is_unknown());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&PointId::from("P1")).unwrap();
        assert_eq!(json, "\"P1\"");
    }
}
