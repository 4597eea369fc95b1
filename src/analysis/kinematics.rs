// src/analysis/kinematics.rs
//
// Per-point smoothing and differentiation engine.
//
// Owns every piece of cross-frame numeric state in a session: one slot per
// PointId in a fixed arena. Each slot carries its filter, the last reported
// values, a staleness counter and the peak speed since the last reset.
//
// Per frame, for each point:
//   present, confidence ≥ threshold → feed the filter, report Tracking/Warming
//   absent or weak, staleness ≤ tol → hold last values, report Held(n)
//   absent or weak, staleness > tol → reset slot, report nothing
//
// All values leave the engine in pixel units; `Kinematics::scaled` converts
// them with the session calibration.

use super::calibration::Calibration;
use super::filters::PointFilter;
use crate::types::{FrameRecord, KinematicsConfig, PointId, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointStatus {
    /// Fresh sample this frame with derivatives available.
    Tracking,
    /// Fresh sample but the filter has not seen enough samples yet.
    Warming,
    /// No usable sample for `n` consecutive frames; values are held.
    Held(u32),
}

impl PointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tracking => "tracking",
            Self::Warming => "warming",
            Self::Held(_) => "held",
        }
    }

    pub fn is_fresh(&self) -> bool {
        !matches!(self, Self::Held(_))
    }
}

/// Snapshot entry for one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointKinematics {
    /// Observation this frame; `None` while held without any observation.
    pub raw: Option<Vec2>,
    pub z: Option<f64>,
    pub smoothed: Option<Vec2>,
    pub velocity: Option<Vec2>,
    pub acceleration: Option<Vec2>,
    pub confidence: f64,
    pub status: PointStatus,
    /// Largest |velocity| since the last reset.
    pub peak_speed: f64,
}

impl PointKinematics {
    pub fn speed(&self) -> Option<f64> {
        self.velocity.map(|v| v.norm())
    }

    /// Best position to draw at: smoothed when available, raw otherwise.
    pub fn position(&self) -> Option<Vec2> {
        self.smoothed.or(self.raw)
    }

    fn scaled(&self, scale: f64) -> Self {
        Self {
            raw: self.raw.map(|p| p * scale),
            z: self.z,
            smoothed: self.smoothed.map(|p| p * scale),
            velocity: self.velocity.map(|v| v * scale),
            acceleration: self.acceleration.map(|a| a * scale),
            confidence: self.confidence,
            status: self.status,
            peak_speed: self.peak_speed * scale,
        }
    }
}

/// Per-frame engine output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Kinematics {
    pub frame_index: u64,
    pub timestamp: f64,
    pub points: BTreeMap<PointId, PointKinematics>,
    /// Points whose state was dropped this frame.
    pub resets: Vec<PointId>,
}

impl Kinematics {
    pub fn get(&self, id: PointId) -> Option<&PointKinematics> {
        self.points.get(&id)
    }

    /// Same snapshot in physical units (positions, velocities,
    /// accelerations and peak speed multiplied by the scale).
    pub fn scaled(&self, calibration: &Calibration) -> Kinematics {
        let scale = calibration.scale();
        Kinematics {
            frame_index: self.frame_index,
            timestamp: self.timestamp,
            points: self
                .points
                .iter()
                .map(|(id, pk)| (*id, pk.scaled(scale)))
                .collect(),
            resets: self.resets.clone(),
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

#[derive(Debug, Clone)]
struct PointSlot {
    filter: PointFilter,
    /// Frame of the last accepted sample; `None` = empty slot.
    last_frame: Option<u64>,
    samples_since_reset: usize,
    staleness: u32,
    last: Option<PointKinematics>,
    peak_speed: f64,
}

impl PointSlot {
    fn new(filter: PointFilter) -> Self {
        Self {
            filter,
            last_frame: None,
            samples_since_reset: 0,
            staleness: 0,
            last: None,
            peak_speed: 0.0,
        }
    }

    fn is_active(&self) -> bool {
        self.last_frame.is_some()
    }

    fn reset(&mut self) {
        self.filter.reset();
        self.last_frame = None;
        self.samples_since_reset = 0;
        self.staleness = 0;
        self.last = None;
        self.peak_speed = 0.0;
    }
}

pub struct KinematicsEngine {
    fps: f64,
    confidence_threshold: f64,
    gap_tolerance: u32,
    slots: Vec<PointSlot>,
    total_resets: u64,
}

impl KinematicsEngine {
    /// Parameters are expected to be validated by `Config::validate`.
    pub fn new(config: &KinematicsConfig) -> Self {
        let filter = PointFilter::from_config(&config.filter);
        Self {
            fps: config.fps,
            confidence_threshold: config.confidence_threshold,
            gap_tolerance: config.gap_tolerance_frames,
            slots: (0..PointId::COUNT)
                .map(|_| PointSlot::new(filter.clone()))
                .collect(),
            total_resets: 0,
        }
    }

    pub fn update(&mut self, record: &FrameRecord) -> Kinematics {
        let mut out = Kinematics {
            frame_index: record.index,
            timestamp: record.timestamp,
            points: BTreeMap::new(),
            resets: Vec::new(),
        };

        for id in PointId::ALL {
            let observed = record.get(id);
            let usable = observed.filter(|p| {
                p.confidence >= self.confidence_threshold && p.position.is_finite()
            });
            let slot = &mut self.slots[id.index()];

            if let Some(point) = usable {
                if let Some(last_frame) = slot.last_frame {
                    if record.index <= last_frame {
                        debug!(
                            "{}: ignoring out-of-order sample (frame {} <= {})",
                            id.as_str(),
                            record.index,
                            last_frame
                        );
                        if let Some(prev) = slot.last {
                            out.points.insert(id, prev);
                        }
                        continue;
                    }
                }

                let sample = slot.filter.push(record.index, point.position, self.fps);
                slot.last_frame = Some(record.index);
                slot.samples_since_reset += 1;
                slot.staleness = 0;

                if let Some(speed) = sample.velocity.map(|v| v.norm()) {
                    if speed.is_finite() && speed > slot.peak_speed {
                        slot.peak_speed = speed;
                    }
                }

                let status = if sample.velocity.is_some() {
                    PointStatus::Tracking
                } else {
                    PointStatus::Warming
                };

                let pk = PointKinematics {
                    raw: Some(point.position),
                    z: point.z,
                    smoothed: Some(sample.smoothed),
                    velocity: sample.velocity,
                    acceleration: sample.acceleration,
                    confidence: point.confidence,
                    status,
                    peak_speed: slot.peak_speed,
                };
                slot.last = Some(pk);
                out.points.insert(id, pk);
                continue;
            }

            if !slot.is_active() {
                continue;
            }

            slot.staleness += 1;
            if slot.staleness > self.gap_tolerance {
                trace!(
                    "{}: missing {} frames, resetting",
                    id.as_str(),
                    slot.staleness
                );
                slot.reset();
                self.total_resets += 1;
                out.resets.push(id);
                continue;
            }

            if let Some(prev) = slot.last {
                out.points.insert(
                    id,
                    PointKinematics {
                        raw: observed.map(|p| p.position),
                        z: observed.and_then(|p| p.z),
                        confidence: observed.map(|p| p.confidence).unwrap_or(0.0),
                        status: PointStatus::Held(slot.staleness),
                        ..prev
                    },
                );
            }
        }

        out
    }

    /// Drop every point's state.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.reset();
        }
    }

    pub fn total_resets(&self) -> u64 {
        self.total_resets
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FilterConfig;

    fn config(filter: FilterConfig) -> KinematicsConfig {
        KinematicsConfig {
            fps: 30.0,
            confidence_threshold: 0.5,
            gap_tolerance_frames: 5,
            filter,
        }
    }

    fn wrist(frame: u64, x: f64, y: f64) -> FrameRecord {
        FrameRecord::new(frame, frame as f64 / 30.0).with_point(PointId::RightWrist, x, y, 0.9)
    }

    #[test]
    fn test_constant_position_zero_derivatives() {
        let mut engine = KinematicsEngine::new(&config(FilterConfig::Ema { alpha: 0.3 }));
        for i in 0..20 {
            let k = engine.update(&wrist(i, 100.0, 200.0));
            let pk = k.get(PointId::RightWrist).unwrap();
            assert_eq!(pk.velocity, Some(Vec2::ZERO));
            assert_eq!(pk.acceleration, Some(Vec2::ZERO));
        }
    }

    #[test]
    fn test_low_confidence_treated_as_missing() {
        let mut engine = KinematicsEngine::new(&config(FilterConfig::default()));
        engine.update(&wrist(0, 0.0, 0.0));
        let weak = FrameRecord::new(1, 1.0 / 30.0).with_point(PointId::RightWrist, 50.0, 0.0, 0.2);
        let k = engine.update(&weak);
        let pk = k.get(PointId::RightWrist).unwrap();
        assert_eq!(pk.status, PointStatus::Held(1));
        assert_eq!(pk.raw, Some(Vec2::new(50.0, 0.0)));
        assert_eq!(pk.smoothed, Some(Vec2::ZERO));
    }

    #[test]
    fn test_hold_within_tolerance_then_reset() {
        let mut engine = KinematicsEngine::new(&config(FilterConfig::Ema { alpha: 1.0 }));
        engine.update(&wrist(0, 0.0, 0.0));
        let k = engine.update(&wrist(1, 10.0, 0.0));
        let v = k.get(PointId::RightWrist).unwrap().velocity.unwrap();
        assert!((v.x - 300.0).abs() < 1e-9);

        for gap in 1..=5u32 {
            let k = engine.update(&FrameRecord::new(1 + gap as u64, 0.0));
            let pk = k.get(PointId::RightWrist).unwrap();
            assert_eq!(pk.status, PointStatus::Held(gap));
            assert!((pk.velocity.unwrap().x - 300.0).abs() < 1e-9);
            assert!(pk.raw.is_none());
        }

        // sixth missing frame exceeds tolerance 5
        let k = engine.update(&FrameRecord::new(7, 0.0));
        assert!(k.get(PointId::RightWrist).is_none());
        assert_eq!(k.resets, vec![PointId::RightWrist]);
        assert_eq!(engine.total_resets(), 1);

        // fresh start: zero derivatives, peak speed cleared
        let k = engine.update(&wrist(8, 500.0, 0.0));
        let pk = k.get(PointId::RightWrist).unwrap();
        assert_eq!(pk.velocity, Some(Vec2::ZERO));
        assert_eq!(pk.acceleration, Some(Vec2::ZERO));
        assert_eq!(pk.peak_speed, 0.0);
    }

    #[test]
    fn test_resume_within_tolerance_uses_real_time_delta() {
        let mut engine = KinematicsEngine::new(&config(FilterConfig::Ema { alpha: 1.0 }));
        engine.update(&wrist(0, 0.0, 0.0));
        engine.update(&FrameRecord::new(1, 0.0));
        engine.update(&FrameRecord::new(2, 0.0));
        let k = engine.update(&wrist(3, 30.0, 0.0));
        let pk = k.get(PointId::RightWrist).unwrap();
        assert_eq!(pk.status, PointStatus::Tracking);
        // 30 px over 3 frames at 30 fps → 300 px/s
        assert!((pk.velocity.unwrap().x - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_tolerance_resets_on_first_gap() {
        let mut cfg = config(FilterConfig::default());
        cfg.gap_tolerance_frames = 0;
        let mut engine = KinematicsEngine::new(&cfg);
        engine.update(&wrist(0, 0.0, 0.0));
        let k = engine.update(&FrameRecord::new(1, 0.0));
        assert!(k.points.is_empty());
        assert_eq!(k.resets.len(), 1);
    }

    #[test]
    fn test_window_filter_warming_status() {
        let mut engine = KinematicsEngine::new(&config(FilterConfig::SavitzkyGolay {
            window: 5,
            degree: 2,
        }));
        for i in 0..4 {
            let k = engine.update(&wrist(i, i as f64, 0.0));
            let pk = k.get(PointId::RightWrist).unwrap();
            assert_eq!(pk.status, PointStatus::Warming);
            assert!(pk.velocity.is_none());
        }
        let k = engine.update(&wrist(4, 4.0, 0.0));
        assert_eq!(k.get(PointId::RightWrist).unwrap().status, PointStatus::Tracking);
    }

    #[test]
    fn test_peak_speed_tracks_maximum() {
        let mut engine = KinematicsEngine::new(&config(FilterConfig::Ema { alpha: 1.0 }));
        let xs = [0.0, 1.0, 5.0, 6.0];
        let mut last = None;
        for (i, x) in xs.iter().enumerate() {
            last = Some(engine.update(&wrist(i as u64, *x, 0.0)));
        }
        let pk = *last.unwrap().get(PointId::RightWrist).unwrap();
        assert!((pk.peak_speed - 120.0).abs() < 1e-9);
        assert!((pk.speed().unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_scaled_snapshot() {
        let mut engine = KinematicsEngine::new(&config(FilterConfig::Ema { alpha: 1.0 }));
        engine.update(&wrist(0, 0.0, 0.0));
        let k = engine.update(&wrist(1, 10.0, 0.0));
        let cal = Calibration::from_pixel_height(1.8, 200.0);
        let scaled = k.scaled(&cal);
        let pk = scaled.get(PointId::RightWrist).unwrap();
        assert!((pk.velocity.unwrap().x - 2.7).abs() < 1e-9);
        assert!((pk.raw.unwrap().x - 0.09).abs() < 1e-12);
    }

    #[test]
    fn test_points_are_independent() {
        let mut engine = KinematicsEngine::new(&config(FilterConfig::Ema { alpha: 1.0 }));
        let r0 = FrameRecord::new(0, 0.0)
            .with_point(PointId::LeftWrist, 0.0, 0.0, 1.0)
            .with_point(PointId::RightWrist, 0.0, 0.0, 1.0);
        engine.update(&r0);
        let r1 = FrameRecord::new(1, 0.0).with_point(PointId::LeftWrist, 3.0, 0.0, 1.0);
        let k = engine.update(&r1);
        assert_eq!(k.get(PointId::LeftWrist).unwrap().status, PointStatus::Tracking);
        assert_eq!(k.get(PointId::RightWrist).unwrap().status, PointStatus::Held(1));
    }
}
