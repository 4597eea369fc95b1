// src/pipeline/frame_context.rs
//
// Read-only view of everything known about one frame. Every pass reads the
// same context, so all passes on a frame agree on the kinematic state.
//
// The kinematics snapshot is in pixel units (positions are where things are
// drawn). The physical accessors apply the session calibration.

use crate::analysis::{Calibration, Kinematics, PointKinematics, TrailBuffer};
use crate::types::{FrameRecord, PointId, Vec2};

#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub frame_id: u64,
    pub timestamp: f64,
    pub fps: f64,
    pub record: &'a FrameRecord,
    pub kinematics: &'a Kinematics,
    pub calibration: &'a Calibration,
    pub trails: &'a TrailBuffer,
}

impl<'a> FrameContext<'a> {
    pub fn new(
        record: &'a FrameRecord,
        kinematics: &'a Kinematics,
        calibration: &'a Calibration,
        trails: &'a TrailBuffer,
        fps: f64,
    ) -> Self {
        Self {
            frame_id: record.index,
            timestamp: record.timestamp,
            fps,
            record,
            kinematics,
            calibration,
            trails,
        }
    }

    pub fn point(&self, id: PointId) -> Option<&'a PointKinematics> {
        self.kinematics.get(id)
    }

    /// Pixel position to draw at.
    pub fn position(&self, id: PointId) -> Option<Vec2> {
        self.point(id).and_then(|pk| pk.position())
    }

    /// Velocity in session units (m/s when calibrated, px/s otherwise).
    pub fn velocity(&self, id: PointId) -> Option<Vec2> {
        self.point(id)
            .and_then(|pk| pk.velocity)
            .map(|v| v * self.calibration.scale())
    }

    pub fn acceleration(&self, id: PointId) -> Option<Vec2> {
        self.point(id)
            .and_then(|pk| pk.acceleration)
            .map(|a| a * self.calibration.scale())
    }

    pub fn speed(&self, id: PointId) -> Option<f64> {
        self.velocity(id).map(|v| v.norm())
    }

    pub fn peak_speed(&self, id: PointId) -> Option<f64> {
        self.point(id)
            .map(|pk| self.calibration.to_physical(pk.peak_speed))
    }

    pub fn speed_unit(&self) -> &'static str {
        self.calibration.speed_unit()
    }

    pub fn acceleration_unit(&self) -> &'static str {
        self.calibration.acceleration_unit()
    }
}
