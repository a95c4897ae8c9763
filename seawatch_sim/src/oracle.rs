//! Workload oracle for simulation.
//!
//! The Oracle maintains the "God's eye view" of the simulated sea:
//! - True positions of all vessels
//! - Kinematics (constant course and speed)
//! - Track point and mission payload generation (with noise)

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use seawatch_core::{ActionKind, MissionInput, PointKind};
use seawatch_env::{PointId, VesselId};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Action kinds drawn by random missions (the last one exercises `Other`).
pub const ACTION_KINDS: [&str; 5] = ["track", "uav", "satellite", "notify", "patrol"];

/// First MMSI handed out; vessels are spaced 1000 apart.
const MMSI_BASE: u64 = 416_000_000;

/// A ground truth vessel in the simulation.
#[derive(Debug, Clone, Serialize)]
pub struct SimVessel {
    pub id: VesselId,
    pub mmsi: u64,

    /// Position in degrees
    pub lat: f64,
    pub lon: f64,

    /// Course over ground in degrees
    pub course_deg: f64,

    /// Speed over ground in knots
    pub speed_kn: f64,
}

/// Encodings in which generated points reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointShape {
    /// Legacy flat record
    Flat,
    /// Legacy record wrapped in a `data` envelope, epoch-millis timestamp
    Envelope,
    /// Canonical record with a nested `display` sub-record
    Display,
    /// No vessel identity at all
    Anonymous,
    /// No timestamp at all
    Untimed,
}

/// How a generated mission names its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStyle {
    /// `targetVesselId` is the vessel's MMSI
    Exact,
    /// `targetVesselId` is the wildcard
    Wildcard,
    /// Unrelated `targetVesselId`, MMSI only inside the target info text
    InfoText,
}

/// The Oracle - maintains ground truth and generates engine inputs.
pub struct Oracle {
    /// Workload seed (separate from the context so id entropy doesn't shift inputs)
    workload_seed: u64,

    /// RNG for workload generation
    rng: ChaCha8Rng,

    vessels: Vec<SimVessel>,

    /// Next point serial
    next_point: u64,

    /// Wall-clock time of simulation start
    epoch: DateTime<Utc>,

    /// Simulated time since `epoch`
    elapsed: Duration,

    /// Position noise standard deviation (degrees)
    position_noise_deg: f64,

    /// Timestamp jitter standard deviation (minutes)
    time_jitter_min: f64,
}

impl Oracle {
    /// Creates a new Oracle with the given workload seed.
    pub fn new(workload_seed: u64, epoch: DateTime<Utc>) -> Self {
        Self {
            workload_seed,
            rng: ChaCha8Rng::seed_from_u64(workload_seed),
            vessels: Vec::new(),
            next_point: 0,
            epoch,
            elapsed: Duration::ZERO,
            position_noise_deg: 0.001,
            time_jitter_min: 45.0,
        }
    }

    pub fn seed(&self) -> u64 {
        self.workload_seed
    }

    /// Sets the timestamp jitter standard deviation in minutes.
    pub fn set_time_jitter(&mut self, minutes: f64) {
        self.time_jitter_min = minutes;
    }

    /// Spawns a vessel somewhere in the Taiwan Strait and returns its index.
    pub fn spawn_vessel(&mut self) -> usize {
        let index = self.vessels.len();
        let mmsi = MMSI_BASE + index as u64 * 1000 + self.rng.gen_range(0..1000);
        self.vessels.push(SimVessel {
            id: VesselId::from(mmsi.to_string()),
            mmsi,
            lat: self.rng.gen_range(22.0..25.5),
            lon: self.rng.gen_range(118.5..121.0),
            course_deg: self.rng.gen_range(0.0..360.0),
            speed_kn: self.rng.gen_range(2.0..18.0),
        });
        index
    }

    /// Spawns `count` vessels.
    pub fn spawn_vessels(&mut self, count: usize) {
        for _ in 0..count {
            self.spawn_vessel();
        }
    }

    pub fn vessels(&self) -> &[SimVessel] {
        &self.vessels
    }

    pub fn vessel(&self, index: usize) -> Option<&SimVessel> {
        self.vessels.get(index)
    }

    /// Advances kinematics by `dt`.
    pub fn step(&mut self, dt: Duration) {
        self.elapsed += dt;
        let hours = dt.as_secs_f64() / 3600.0;

        // Constant course and speed, one nautical mile per arc-minute
        for vessel in &mut self.vessels {
            let distance_deg = vessel.speed_kn * hours / 60.0;
            let course = vessel.course_deg.to_radians();
            vessel.lat += distance_deg * course.cos();
            vessel.lon += distance_deg * course.sin() / vessel.lat.to_radians().cos();
        }
    }

    /// Current simulated wall-clock time.
    pub fn now(&self) -> DateTime<Utc> {
        self.epoch + chrono::Duration::milliseconds(self.elapsed.as_millis() as i64)
    }

    /// Returns true with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Uniform index in `0..len`, or `None` for an empty range.
    pub fn pick_index(&mut self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.rng.gen_range(0..len))
    }

    /// Picks a random element.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }

    /// Zero-mean Gaussian sample.
    fn gaussian(&mut self, std_dev: f64) -> f64 {
        Normal::new(0.0, std_dev)
            .map(|normal| normal.sample(&mut self.rng))
            .unwrap_or(0.0)
    }

    /// Random offset from "now" drawn from the timestamp jitter.
    pub fn jitter(&mut self) -> chrono::Duration {
        let minutes = self.gaussian(self.time_jitter_min);
        chrono::Duration::milliseconds((minutes * 60_000.0) as i64)
    }

    fn random_kind(&mut self) -> PointKind {
        match self.rng.gen_range(0..3) {
            0 => PointKind::History,
            1 => PointKind::Current,
            _ => PointKind::Future,
        }
    }

    fn next_point_id(&mut self) -> PointId {
        self.next_point += 1;
        PointId::from(format!("P-{:05}", self.next_point))
    }

    // ========================================================================
    // TRACK POINTS
    // ========================================================================

    /// Builds a point payload for a vessel at `now + offset`.
    pub fn point_payload(
        &mut self,
        vessel_index: usize,
        offset: chrono::Duration,
        kind: PointKind,
        has_task: bool,
        shape: PointShape,
    ) -> (PointId, Value) {
        let id = self.next_point_id();
        let timestamp = self.now() + offset;
        let (vessel_id, lat, lon) = match self.vessels.get(vessel_index) {
            Some(v) => (v.id.to_string(), v.lat, v.lon),
            None => (String::new(), 0.0, 0.0),
        };
        let lat = lat + self.gaussian(self.position_noise_deg);
        let lon = lon + self.gaussian(self.position_noise_deg);
        let kind_text = match kind {
            PointKind::History => "History",
            PointKind::Current => "Current",
            PointKind::Future => "Future",
        };

        let payload = match shape {
            PointShape::Flat => json!({
                "pointId": id,
                "vesselId": vessel_id,
                "timestamp": timestamp.to_rfc3339(),
                "type": kind_text,
                "hasTask": has_task,
                "position": [lon, lat],
            }),
            PointShape::Envelope => json!({
                "id": id,
                "data": {
                    "mmsi": vessel_id,
                    "timestamp": timestamp.timestamp_millis(),
                    "type": kind_text,
                    "hasTask": has_task,
                },
                "position": [lon, lat],
            }),
            PointShape::Display => json!({
                "pointId": id,
                "vessel_id": vessel_id,
                "display": {
                    "type": kind_text,
                    "hasTask": has_task,
                    "timestamp": timestamp.to_rfc3339(),
                    "status": if has_task { "tasked" } else { "normal" },
                },
                "lat": lat,
                "lng": lon,
            }),
            PointShape::Anonymous => json!({
                "pointId": id,
                "timestamp": timestamp.to_rfc3339(),
                "type": kind_text,
                "hasTask": has_task,
            }),
            PointShape::Untimed => json!({
                "pointId": id,
                "vesselId": vessel_id,
                "type": kind_text,
                "hasTask": has_task,
            }),
        };
        (id, payload)
    }

    /// Random point for a random vessel in one of the well-formed shapes.
    pub fn random_point(&mut self) -> Option<(PointId, Value)> {
        let vessel = self.pick_index(self.vessels.len())?;
        let offset = self.jitter();
        let kind = self.random_kind();
        let has_task = self.chance(0.3);
        let shape = match self.rng.gen_range(0..4) {
            0 | 1 => PointShape::Flat,
            2 => PointShape::Envelope,
            _ => PointShape::Display,
        };
        Some(self.point_payload(vessel, offset, kind, has_task, shape))
    }

    // ========================================================================
    // MISSIONS
    // ========================================================================

    /// Builds a mission against a vessel at `now + offset`.
    pub fn mission_input(
        &mut self,
        vessel_index: usize,
        kind: ActionKind,
        offset: chrono::Duration,
        target: TargetStyle,
    ) -> MissionInput {
        let vessel_id = self
            .vessels
            .get(vessel_index)
            .map(|v| v.id.clone())
            .unwrap_or_else(VesselId::unknown);

        let (target_vessel_id, target_info_text) = match target {
            TargetStyle::Exact => (Some(vessel_id.clone()), Some(format!("Vessel {}", vessel_id))),
            TargetStyle::Wildcard => (Some(VesselId::from("all")), Some("All vessels in sector".to_string())),
            TargetStyle::InfoText => (
                Some(VesselId::from("fleet-contact")),
                Some(format!("Suspicious loitering, MMSI {} reported by patrol", vessel_id)),
            ),
        };

        MissionInput {
            action_name: Some(format!("{} {}", kind, vessel_id)),
            action_kind: Some(kind),
            target_vessel_id,
            target_info_text,
            timestamp: Some(self.now() + offset),
            ..Default::default()
        }
    }

    /// Random mission; sometimes names one of `known_points` as its source.
    pub fn random_mission(&mut self, known_points: &[PointId]) -> Option<MissionInput> {
        let vessel = self.pick_index(self.vessels.len())?;
        let kind = ActionKind::from(*self.pick(&ACTION_KINDS)?);
        let offset = self.jitter();
        let target = match self.rng.gen_range(0..20) {
            0..=13 => TargetStyle::Exact,
            14..=16 => TargetStyle::Wildcard,
            _ => TargetStyle::InfoText,
        };

        let mut input = self.mission_input(vessel, kind, offset, target);
        input.is_scheduled = Some(self.chance(0.3));
        if self.chance(0.25) {
            input.source_track_point_id = self.pick(known_points).cloned();
        }
        Some(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use seawatch_core::{IdentityResolver, LegacyFieldResolver};

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_oracle_spawn_vessels_unique() {
        let mut oracle = Oracle::new(42, epoch());
        oracle.spawn_vessels(20);

        let mut ids: Vec<&str> = oracle.vessels().iter().map(|v| v.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 20);
    }

    #[test]
    fn test_oracle_step_moves_clock_and_vessels() {
        let mut oracle = Oracle::new(42, epoch());
        let index = oracle.spawn_vessel();
        let before = oracle.vessel(index).unwrap().clone();

        oracle.step(Duration::from_secs(3600));

        let after = oracle.vessel(index).unwrap();
        assert_eq!(oracle.now(), epoch() + chrono::Duration::hours(1));
        assert!((after.lat - before.lat).abs() + (after.lon - before.lon).abs() > 0.0);
    }

    #[test]
    fn test_every_shape_resolves() {
        let resolver = LegacyFieldResolver::new();
        let mut oracle = Oracle::new(7, epoch());
        let vessel = oracle.spawn_vessel();
        let expected = oracle.vessel(vessel).unwrap().id.clone();

        for shape in [PointShape::Flat, PointShape::Envelope, PointShape::Display] {
            let (id, payload) =
                oracle.point_payload(vessel, chrono::Duration::zero(), PointKind::Current, true, shape);
            let point = resolver.canonicalize(&payload).unwrap();
            assert_eq!(point.id, Some(id));
            assert_eq!(point.vessel_id, expected);
            assert_eq!(point.kind, PointKind::Current);
            assert!(point.has_task);
            assert_eq!(point.timestamp.map(|t| t.timestamp()), Some(epoch().timestamp()));
        }

        let (_, anonymous) =
            oracle.point_payload(vessel, chrono::Duration::zero(), PointKind::History, false, PointShape::Anonymous);
        assert!(resolver.resolve_vessel_id(&anonymous).is_unknown());

        let (_, untimed) =
            oracle.point_payload(vessel, chrono::Duration::zero(), PointKind::History, false, PointShape::Untimed);
        assert!(resolver.canonicalize(&untimed).unwrap().timestamp.is_none());
    }

    #[test]
    fn test_oracle_deterministic_workload() {
        let mut a = Oracle::new(42, epoch());
        let mut b = Oracle::new(42, epoch());
        a.spawn_vessels(5);
        b.spawn_vessels(5);

        assert_eq!(a.random_point().map(|p| p.1), b.random_point().map(|p| p.1));
        let ma = a.random_mission(&[]).unwrap();
        let mb = b.random_mission(&[]).unwrap();
        assert_eq!(ma.target_vessel_id, mb.target_vessel_id);
        assert_eq!(ma.timestamp, mb.timestamp);
    }

    #[test]
    fn test_info_text_target_mentions_mmsi() {
        let mut oracle = Oracle::new(3, epoch());
        let vessel = oracle.spawn_vessel();
        let mmsi = oracle.vessel(vessel).unwrap().mmsi.to_string();

        let input = oracle.mission_input(vessel, ActionKind::Uav, chrono::Duration::zero(), TargetStyle::InfoText);
        assert_ne!(input.target_vessel_id.as_ref().map(|v| v.as_str()), Some(mmsi.as_str()));
        assert!(input.target_info_text.unwrap().contains(&mmsi));
    }
}
