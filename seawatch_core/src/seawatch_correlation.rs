//! The "CORRELATION" Engine - Mission / Track Point Association Layer
//!
//! Pairs dispatched missions with sampled vessel positions under a strict
//! one-to-one invariant:
//!
//! > for every mission M and point P,
//! > `M.bound_point_id == P.id` ⇔ `P.bound_mission_id == M.id`
//!
//! Bindings are produced three ways:
//! 1. **Explicit bind** - the caller names the pair; stale partners on either
//!    side are unbound first.
//! 2. **Explicit source match** - a mission names the point that caused it
//!    (`sourceTrackPointId`); that point wins over any window scan.
//! 3. **Auto link** - registering either side scans the other registry for
//!    the first candidate that is in the action-kind time window, matches the
//!    vessel, and is not already taken.
//!
//! The auto scan is a greedy matcher: it commits the first qualifying
//! candidate in registry order and stops. It does not look for the
//! best-scoring pair. The order is explicit ([`ScanOrder`]), so outcomes are
//! reproducible for a given registration sequence.

use seawatch_env::{CorrelationContext, MissionId, PointId, VesselId};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::metrics::{CorrelationStats, LinkMetrics};
use crate::seawatch_identity::{IdentityResolver, LegacyFieldResolver};
use crate::seawatch_ledger::{LinkLedger, LinkReason, LinkRecord};
use crate::seawatch_registry::{
    ActionKind, Mission, MissionInput, Registry, ScanOrder, TrackPoint,
};
use crate::validation::{check_consistency, ConsistencyReport};

const HOUR: Duration = Duration::from_secs(60 * 60);

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the CorrelationEngine
#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    /// Window for `track` missions (default: 4h)
    pub track_window: Duration,

    /// Window for `uav` and `satellite` missions (default: 1h)
    pub aerial_window: Duration,

    /// Window for every other action kind (default: 2h)
    pub default_window: Duration,

    /// Target vessel value that matches any vessel (default: "all")
    pub wildcard_vessel: String,

    /// Order in which scans walk the other registry
    pub scan_order: ScanOrder,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            track_window: HOUR * 4,
            aerial_window: HOUR,
            default_window: HOUR * 2,
            wildcard_vessel: "all".to_string(),
            scan_order: ScanOrder::Registration,
        }
    }
}

impl CorrelationConfig {
    /// Time window selected by a mission's action kind.
    pub fn window_for(&self, kind: &ActionKind) -> Duration {
        match kind {
            ActionKind::Track => self.track_window,
            ActionKind::Uav | ActionKind::Satellite => self.aerial_window,
            _ => self.default_window,
        }
    }

    /// Vessel identity match: exact target, wildcard, or target-info substring.
    ///
    /// An `UNKNOWN` vessel only ever matches the wildcard.
    pub fn vessel_matches(&self, mission: &Mission, vessel: &VesselId) -> bool {
        let wildcard = mission
            .target_vessel_id
            .as_ref()
            .is_some_and(|target| target.as_str() == self.wildcard_vessel);
        if wildcard {
            return true;
        }
        if vessel.is_unknown() {
            return false;
        }

        let exact = mission.target_vessel_id.as_ref() == Some(vessel);
        let mentioned = mission
            .target_info_text
            .as_ref()
            .is_some_and(|info| info.contains(vessel.as_str()));
        exact || mentioned
    }
}

// ============================================================================
// QUALIFICATION
// ============================================================================

/// Outcome of testing one mission/point pair against the auto-link predicate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Assessment {
    /// In window and vessel matches
    Qualified(LinkMetrics),
    /// Either side has no timestamp; never matches
    MissingTimestamp,
    OutsideWindow,
    VesselMismatch,
}

/// Tests a pair against the window and vessel rules.
///
/// Availability (one-to-one) is not considered here.
pub fn assess(config: &CorrelationConfig, mission: &Mission, point: &TrackPoint) -> Assessment {
    let window = config.window_for(&mission.action_kind);
    let Some(metrics) = LinkMetrics::compute(mission, point, window) else {
        return Assessment::MissingTimestamp;
    };
    if !metrics.within_window() {
        return Assessment::OutsideWindow;
    }
    if !config.vessel_matches(mission, &point.vessel_id) {
        return Assessment::VesselMismatch;
    }
    Assessment::Qualified(metrics)
}

// ============================================================================
// CORRELATION ENGINE
// ============================================================================

/// Owns both registries and the link ledger, and keeps them consistent.
///
/// Generic over the environment context so the same engine runs against the
/// system clock or a simulated one.
pub struct CorrelationEngine<Ctx: CorrelationContext> {
    /// Clock, mission sequence and entropy
    context: Arc<Ctx>,

    /// Point shape canonicalization
    resolver: Box<dyn IdentityResolver>,

    config: CorrelationConfig,

    missions: Registry<MissionId, Mission>,
    points: Registry<PointId, TrackPoint>,

    /// Diagnostic only; never consulted for binding state
    ledger: LinkLedger,

    stats: CorrelationStats,

    /// Last registration sequence handed out (orders both registries)
    registration_seq: u64,
}

impl<Ctx: CorrelationContext> CorrelationEngine<Ctx> {
    /// Create a new engine with an explicit resolver and configuration.
    pub fn new(
        context: Arc<Ctx>,
        resolver: Box<dyn IdentityResolver>,
        config: CorrelationConfig,
    ) -> Self {
        Self {
            context,
            resolver,
            config,
            missions: Registry::new(),
            points: Registry::new(),
            ledger: LinkLedger::new(),
            stats: CorrelationStats::default(),
            registration_seq: 0,
        }
    }

    /// Create an engine with the legacy-field resolver and default windows.
    pub fn with_defaults(context: Arc<Ctx>) -> Self {
        Self::new(
            context,
            Box::new(LegacyFieldResolver::new()),
            CorrelationConfig::default(),
        )
    }

    fn next_registration(&mut self) -> u64 {
        self.registration_seq += 1;
        self.registration_seq
    }

    // ========================================================================
    // MISSION REGISTRATION
    // ========================================================================

    /// Register (or re-register) a mission and return its identifier.
    ///
    /// A mission with the same source point, action kind and schedule flag
    /// is reused: incoming non-empty fields are merged into it, its binding
    /// is left as is, and its identifier is returned.
    ///
    /// A new mission is bound, in priority order, to the point requested in
    /// `bound_point_id`, to its source point, or to the first point found by
    /// the window scan.
    pub fn register_mission(&mut self, input: MissionInput) -> MissionId {
        self.stats.missions_registered += 1;
        let source = self.resolver.resolve_source_point_id(&input);

        if let Some(source_id) = &source {
            if let Some(existing) = self.find_reusable_mission(source_id, &input) {
                if let Some(mission) = self.missions.get_mut(&existing) {
                    mission.merge(input);
                }
                self.stats.missions_reused += 1;
                info!(
                    "Reused existing mission {} for source point {}",
                    existing, source_id
                );
                return existing;
            }
        }

        let supplied = input.id.clone().filter(|id| !id.as_str().is_empty());
        if let Some(id) = &supplied {
            if self.missions.contains(id) {
                debug!("Mission {} already registered, merging update", id);
                self.update_mission(id, input);
                return id.clone();
            }
        }

        let id = match supplied {
            Some(id) => id,
            None => self.mint_mission_id(),
        };
        let requested_point = input.bound_point_id.clone();
        let seq = self.next_registration();
        let mission = Mission::from_input(id.clone(), input, source.clone(), seq);
        self.missions.insert(id.clone(), seq, mission);
        debug!("Mission {} registered (seq={})", id, seq);

        if let Some(point_id) = requested_point {
            if self.bind(&id, &point_id) {
                return id;
            }
        }
        if let Some(source_id) = source {
            if self.bind_source(&id, &source_id) {
                return id;
            }
        }
        self.link_mission(&id);
        id
    }

    /// Merge non-empty fields of `input` into an existing mission.
    ///
    /// Bindings are preserved as they are, even if the new action kind would
    /// select a narrower window. Returns false for unknown missions.
    pub fn update_mission(&mut self, mission_id: &MissionId, input: MissionInput) -> bool {
        match self.missions.get_mut(mission_id) {
            Some(mission) => {
                mission.merge(input);
                true
            }
            None => false,
        }
    }

    fn mint_mission_id(&mut self) -> MissionId {
        loop {
            let id = MissionId::from_sequence(self.context.next_sequence());
            if !self.missions.contains(&id) {
                self.stats.missions_minted += 1;
                return id;
            }
        }
    }

    /// First mission (in registration order) sharing source point, kind and schedule.
    fn find_reusable_mission(&self, source_id: &PointId, input: &MissionInput) -> Option<MissionId> {
        let kind = input.action_kind_or_default();
        let is_scheduled = input.is_scheduled_or_default();
        self.missions
            .iter_ordered(ScanOrder::Registration)
            .find(|m| {
                m.source_track_point_id.as_ref() == Some(source_id)
                    && m.action_kind == kind
                    && m.is_scheduled == is_scheduled
            })
            .map(|m| m.id.clone())
    }

    /// Bind a new mission to the point it was created from.
    fn bind_source(&mut self, mission_id: &MissionId, point_id: &PointId) -> bool {
        let Some(point) = self.points.get(point_id) else {
            debug!(
                "Source point {} of mission {} not registered yet",
                point_id, mission_id
            );
            return false;
        };
        let Some(mission) = self.missions.get(mission_id) else {
            return false;
        };

        if let Some(owner) = point.bound_mission_id.as_ref().filter(|m| *m != mission_id) {
            warn!(
                "Explicit source bind skipped: point {} already bound to mission {}",
                point_id, owner
            );
            self.stats.skipped_conflicts += 1;
            return false;
        }
        if mission.bound_point_id.as_ref().is_some_and(|p| p != point_id) {
            self.stats.skipped_conflicts += 1;
            return false;
        }

        let metrics = LinkMetrics::compute(
            mission,
            point,
            self.config.window_for(&mission.action_kind),
        );
        self.commit(
            mission_id.clone(),
            point_id.clone(),
            LinkReason::ExplicitSourceMatch,
            metrics,
        );
        true
    }

    /// Window scan from the mission side.
    ///
    /// Returns the point that was bound, if any.
    fn link_mission(&mut self, mission_id: &MissionId) -> Option<PointId> {
        let mission = self.missions.get(mission_id)?;
        if mission.is_bound() {
            return None;
        }
        if mission.timestamp.is_none() {
            debug!("Mission {} has no timestamp, skipping window scan", mission_id);
            self.stats.rejected_missing_timestamp += 1;
            return None;
        }

        let mut chosen = None;
        for point in self.points.iter_ordered(self.config.scan_order) {
            match assess(&self.config, mission, point) {
                Assessment::Qualified(metrics) => {
                    if point.bound_mission_id.as_ref().is_some_and(|m| m != mission_id) {
                        debug!("Point {} already owned, skipping", point.id);
                        self.stats.skipped_conflicts += 1;
                        continue;
                    }
                    chosen = Some((point.id.clone(), metrics));
                    break;
                }
                Assessment::MissingTimestamp => self.stats.rejected_missing_timestamp += 1,
                Assessment::OutsideWindow => self.stats.rejected_window += 1,
                Assessment::VesselMismatch => self.stats.rejected_vessel += 1,
            }
        }

        let (point_id, metrics) = chosen?;
        self.commit(
            mission_id.clone(),
            point_id.clone(),
            LinkReason::AutoTimeVessel,
            Some(metrics),
        );
        Some(point_id)
    }

    // ========================================================================
    // TRACK POINT REGISTRATION
    // ========================================================================

    /// Register (or re-register) a track point in any accepted shape.
    ///
    /// Canonicalization failures are logged and the point is registered from
    /// whatever identity can be recovered. Re-registering a known id replaces
    /// the record but keeps its position in scan order and its binding.
    pub fn register_track_point(&mut self, raw: &Value) -> PointId {
        self.stats.points_registered += 1;

        let canonical = match self.resolver.canonicalize(raw) {
            Ok(canonical) => canonical,
            Err(e) => {
                warn!("Normalization failed ({}), using original point data", e);
                self.stats.points_degraded += 1;
                self.resolver.degrade(raw)
            }
        };

        let id = match canonical.id.clone() {
            Some(id) => id,
            None => self.mint_point_id(),
        };

        // Re-registration keeps the original order and binding
        let (seq, bound) = match self.points.sequence_of(&id) {
            Some(seq) => (
                seq,
                self.points.get(&id).and_then(|p| p.bound_mission_id.clone()),
            ),
            None => (self.next_registration(), None),
        };

        let point = TrackPoint::from_canonical(id.clone(), canonical, raw.clone(), seq, bound);
        self.points.insert(id.clone(), seq, point);
        debug!("Track point {} registered (seq={})", id, seq);

        self.link_point(&id);
        id
    }

    fn mint_point_id(&self) -> PointId {
        loop {
            let id = PointId::from_time_and_entropy(
                self.context.now().timestamp_millis(),
                self.context.entropy(),
            );
            if !self.points.contains(&id) {
                return id;
            }
        }
    }

    /// Reciprocal scan from the point side.
    ///
    /// Missions naming this point as their source are served first; then the
    /// window scan runs. Returns the mission that was bound, if any.
    fn link_point(&mut self, point_id: &PointId) -> Option<MissionId> {
        let point = self.points.get(point_id)?;
        if point.is_bound() {
            return None;
        }

        let source_match = self
            .missions
            .iter_ordered(self.config.scan_order)
            .find(|m| !m.is_bound() && m.source_track_point_id.as_ref() == Some(point_id))
            .map(|m| {
                let window = self.config.window_for(&m.action_kind);
                (m.id.clone(), LinkMetrics::compute(m, point, window))
            });
        if let Some((mission_id, metrics)) = source_match {
            self.commit(
                mission_id.clone(),
                point_id.clone(),
                LinkReason::ExplicitSourceMatch,
                metrics,
            );
            return Some(mission_id);
        }

        if point.timestamp.is_none() {
            debug!("Track point {} has no timestamp, skipping window scan", point_id);
            self.stats.rejected_missing_timestamp += 1;
            return None;
        }

        let mut chosen = None;
        for mission in self.missions.iter_ordered(self.config.scan_order) {
            match assess(&self.config, mission, point) {
                Assessment::Qualified(metrics) => {
                    if mission.bound_point_id.as_ref().is_some_and(|p| p != point_id) {
                        debug!("Mission {} already has a point, skipping", mission.id);
                        self.stats.skipped_conflicts += 1;
                        continue;
                    }
                    chosen = Some((mission.id.clone(), metrics));
                    break;
                }
                Assessment::MissingTimestamp => self.stats.rejected_missing_timestamp += 1,
                Assessment::OutsideWindow => self.stats.rejected_window += 1,
                Assessment::VesselMismatch => self.stats.rejected_vessel += 1,
            }
        }

        let (mission_id, metrics) = chosen?;
        self.commit(
            mission_id.clone(),
            point_id.clone(),
            LinkReason::AutoTimeVessel,
            Some(metrics),
        );
        Some(mission_id)
    }

    // ========================================================================
    // BINDING PRIMITIVES
    // ========================================================================

    /// Point both sides at each other and write the ledger record.
    ///
    /// Callers must have cleared any other partner on either side.
    fn commit(
        &mut self,
        mission_id: MissionId,
        point_id: PointId,
        reason: LinkReason,
        metrics: Option<LinkMetrics>,
    ) {
        if let Some(mission) = self.missions.get_mut(&mission_id) {
            mission.bound_point_id = Some(point_id.clone());
        }
        if let Some(point) = self.points.get_mut(&point_id) {
            point.bound_mission_id = Some(mission_id.clone());
        }

        debug!(
            "Linked mission {} <-> point {} ({}, score={:?})",
            mission_id,
            point_id,
            reason,
            metrics.map(|m| m.score)
        );
        self.stats.record_commit(reason);
        self.ledger.record(LinkRecord {
            mission_id,
            point_id,
            link_time: self.context.now(),
            link_reason: reason,
            metrics,
        });
    }

    /// Clear whichever side of the pair refers to the other, and its record.
    fn detach(&mut self, mission_id: &MissionId, point_id: &PointId) -> bool {
        let mut cleared = false;
        if let Some(mission) = self.missions.get_mut(mission_id) {
            if mission.bound_point_id.as_ref() == Some(point_id) {
                mission.bound_point_id = None;
                cleared = true;
            }
        }
        if let Some(point) = self.points.get_mut(point_id) {
            if point.bound_mission_id.as_ref() == Some(mission_id) {
                point.bound_mission_id = None;
                cleared = true;
            }
        }
        self.ledger.remove(mission_id, point_id);
        cleared
    }

    // ========================================================================
    // EXPLICIT BINDING
    // ========================================================================

    /// Force a one-to-one binding, unbinding stale partners first.
    pub fn try_bind(
        &mut self,
        mission_id: &MissionId,
        point_id: &PointId,
    ) -> Result<(), CorrelationError> {
        let mission = self
            .missions
            .get(mission_id)
            .ok_or_else(|| CorrelationError::MissionNotFound(mission_id.clone()))?;
        let point = self
            .points
            .get(point_id)
            .ok_or_else(|| CorrelationError::PointNotFound(point_id.clone()))?;

        let stale_point = mission.bound_point_id.clone().filter(|p| p != point_id);
        let stale_mission = point.bound_mission_id.clone().filter(|m| m != mission_id);
        let metrics = LinkMetrics::compute(
            mission,
            point,
            self.config.window_for(&mission.action_kind),
        );

        if let Some(previous) = stale_point {
            debug!("Unbinding mission {} from previous point {}", mission_id, previous);
            self.detach(mission_id, &previous);
        }
        if let Some(previous) = stale_mission {
            debug!("Unbinding point {} from previous mission {}", point_id, previous);
            self.detach(&previous, point_id);
        }

        self.commit(
            mission_id.clone(),
            point_id.clone(),
            LinkReason::ExplicitBind,
            metrics,
        );
        Ok(())
    }

    /// Boolean form of [`Self::try_bind`]; false if either id is unknown.
    pub fn bind(&mut self, mission_id: &MissionId, point_id: &PointId) -> bool {
        match self.try_bind(mission_id, point_id) {
            Ok(()) => true,
            Err(e) => {
                debug!("Bind refused: {}", e);
                false
            }
        }
    }

    /// Remove the binding between a pair.
    ///
    /// Returns whether a binding was actually cleared; unbinding a pair that
    /// is not bound is a successful no-op.
    pub fn try_unbind(
        &mut self,
        mission_id: &MissionId,
        point_id: &PointId,
    ) -> Result<bool, CorrelationError> {
        if !self.missions.contains(mission_id) {
            return Err(CorrelationError::MissionNotFound(mission_id.clone()));
        }
        if !self.points.contains(point_id) {
            return Err(CorrelationError::PointNotFound(point_id.clone()));
        }

        let cleared = self.detach(mission_id, point_id);
        if cleared {
            self.stats.unbinds += 1;
            debug!("Unbound mission {} from point {}", mission_id, point_id);
        }
        Ok(cleared)
    }

    /// Boolean form of [`Self::try_unbind`]; false only if either id is unknown.
    pub fn unbind(&mut self, mission_id: &MissionId, point_id: &PointId) -> bool {
        match self.try_unbind(mission_id, point_id) {
            Ok(_) => true,
            Err(e) => {
                debug!("Unbind refused: {}", e);
                false
            }
        }
    }

    /// Unbind a mission from whatever point it holds.
    ///
    /// False if the mission is unknown or unbound.
    pub fn unbind_mission(&mut self, mission_id: &MissionId) -> bool {
        let Some(point_id) = self.missions.get(mission_id).and_then(|m| m.bound_point_id.clone())
        else {
            return false;
        };
        self.unbind(mission_id, &point_id)
    }

    /// Unbind a point from whatever mission holds it.
    ///
    /// False if the point is unknown or unbound.
    pub fn unbind_point(&mut self, point_id: &PointId) -> bool {
        let Some(mission_id) = self.points.get(point_id).and_then(|p| p.bound_mission_id.clone())
        else {
            return false;
        };
        self.unbind(&mission_id, point_id)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// The bound point as a zero- or one-element collection.
    pub fn linked_track_points(&self, mission_id: &MissionId) -> Vec<&TrackPoint> {
        self.missions
            .get(mission_id)
            .and_then(|m| m.bound_point_id.as_ref())
            .and_then(|p| self.points.get(p))
            .into_iter()
            .collect()
    }

    /// The bound mission as a zero- or one-element collection.
    pub fn linked_missions(&self, point_id: &PointId) -> Vec<&Mission> {
        self.points
            .get(point_id)
            .and_then(|p| p.bound_mission_id.as_ref())
            .and_then(|m| self.missions.get(m))
            .into_iter()
            .collect()
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn mission(&self, id: &MissionId) -> Option<&Mission> {
        self.missions.get(id)
    }

    pub fn track_point(&self, id: &PointId) -> Option<&TrackPoint> {
        self.points.get(id)
    }

    /// All missions in registration order.
    pub fn missions(&self) -> impl Iterator<Item = &Mission> {
        self.missions.iter_ordered(ScanOrder::Registration)
    }

    /// All track points in registration order.
    pub fn track_points(&self) -> impl Iterator<Item = &TrackPoint> {
        self.points.iter_ordered(ScanOrder::Registration)
    }

    pub fn mission_count(&self) -> usize {
        self.missions.len()
    }

    pub fn track_point_count(&self) -> usize {
        self.points.len()
    }

    /// Link record for a pair, if one exists.
    pub fn link(&self, mission_id: &MissionId, point_id: &PointId) -> Option<&LinkRecord> {
        self.ledger.get(mission_id, point_id)
    }

    pub fn ledger(&self) -> &LinkLedger {
        &self.ledger
    }

    pub fn stats(&self) -> &CorrelationStats {
        &self.stats
    }

    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<Ctx> {
        &self.context
    }

    /// Check the bidirectional binding invariant across both registries.
    pub fn validate(&self) -> ConsistencyReport {
        check_consistency(self)
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Errors that can occur during binding operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorrelationError {
    #[error("Mission not found: {0}")]
    MissionNotFound(MissionId),

    #[error("Track point not found: {0}")]
    PointNotFound(PointId),
}

// ============================================================================
// TESTS
// ============================================================================
