// src/analysis/body.rs
//
// Whole-body quantities derived from one kinematics snapshot. Only fresh
// points contribute; a held point is a stale estimate and never feeds a
// readout. Angles are scale-free, so these work on the pixel snapshot
// whether or not the session is calibrated.

use super::kinematics::{Kinematics, PointKinematics};
use crate::types::{PointId, Vec2};

fn fresh(k: &Kinematics, id: PointId) -> Option<&PointKinematics> {
    k.get(id).filter(|pk| pk.status.is_fresh())
}

fn cross(a: Vec2, b: Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Rotation rate of the segment `from → to`, rad/s, positive clockwise in
/// image space (y down).
///
/// This is the relative rate: the velocity of `to` with respect to `from`,
/// projected perpendicular to the segment and divided by its length, so a
/// body translating as a whole reads zero.
pub fn segment_angular_velocity(k: &Kinematics, from: PointId, to: PointId) -> Option<f64> {
    let a = fresh(k, from)?;
    let b = fresh(k, to)?;
    let r = b.position()? - a.position()?;
    let len2 = r.x * r.x + r.y * r.y;
    if len2 < f64::EPSILON {
        return None;
    }
    let relative = b.velocity? - a.velocity?;
    let omega = cross(r, relative) / len2;
    omega.is_finite().then_some(omega)
}

/// Angle of the line from the left to the right shoulder against the image
/// x axis, degrees in (-180, 180].
pub fn shoulder_line_angle(k: &Kinematics) -> Option<f64> {
    let left = fresh(k, PointId::LeftShoulder)?.position()?;
    let right = fresh(k, PointId::RightShoulder)?.position()?;
    let d = right - left;
    if d.x == 0.0 && d.y == 0.0 {
        return None;
    }
    Some(d.y.atan2(d.x).to_degrees())
}
