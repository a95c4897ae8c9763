//! Chaos scenarios for the correlation engine.

use crate::error::SimError;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SW-001: Random mix of registrations, binds and unbinds
    Interleaved,

    /// SW-002: Identical missions re-submitted over and over
    ReRegistration,

    /// SW-003: Points placed on both sides of every window boundary
    WindowEdge,

    /// SW-004: Wildcard targets and target-info fallbacks
    Wildcard,

    /// SW-005: Explicit binds over existing auto bindings
    OverrideStorm,

    /// SW-006: Points without vessel ids or timestamps
    SparseIdentity,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Interleaved,
            ScenarioId::ReRegistration,
            ScenarioId::WindowEdge,
            ScenarioId::Wildcard,
            ScenarioId::OverrideStorm,
            ScenarioId::SparseIdentity,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Interleaved => "interleaved",
            ScenarioId::ReRegistration => "re_registration",
            ScenarioId::WindowEdge => "window_edge",
            ScenarioId::Wildcard => "wildcard",
            ScenarioId::OverrideStorm => "override_storm",
            ScenarioId::SparseIdentity => "sparse_identity",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Interleaved => "Random registrations, binds and unbinds; invariant after every step",
            ScenarioId::ReRegistration => "Repeated identical missions must resolve to one identifier",
            ScenarioId::WindowEdge => "Points exactly on and just past each action-kind window",
            ScenarioId::Wildcard => "\"all\" targets and MMSI-in-target-info matches",
            ScenarioId::OverrideStorm => "Explicit binds stealing points from auto-linked missions",
            ScenarioId::SparseIdentity => "Anonymous and untimed points never auto-link by time",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "interleaved" | "sw-001" => Ok(ScenarioId::Interleaved),
            "re_registration" | "reregistration" | "sw-002" => Ok(ScenarioId::ReRegistration),
            "window_edge" | "windowedge" | "sw-003" => Ok(ScenarioId::WindowEdge),
            "wildcard" | "sw-004" => Ok(ScenarioId::Wildcard),
            "override_storm" | "overridestorm" | "sw-005" => Ok(ScenarioId::OverrideStorm),
            "sparse_identity" | "sparseidentity" | "sw-006" => Ok(ScenarioId::SparseIdentity),
            _ => Err(SimError::UnknownScenario(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>().unwrap(), scenario);
        }
        assert_eq!("SW-003".parse::<ScenarioId>().unwrap(), ScenarioId::WindowEdge);
    }

    #[test]
    fn test_unknown_scenario() {
        let err = "time_warp".parse::<ScenarioId>().unwrap_err();
        assert!(matches!(err, SimError::UnknownScenario(ref s) if s == "time_warp"));
    }
}
