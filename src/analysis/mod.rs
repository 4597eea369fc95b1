// src/analysis/mod.rs
//
// Numeric core. Everything here is frame-sequential and owns the only
// cross-frame state of a session.
//
// Signal flow:
//   FrameRecord → kinematics (filters) → Kinematics snapshot ─┬→ passes
//                                                             └→ export
//   FrameRecord → trail_buffer (tracked points only) ─────────→ trail passes
//   leading FrameRecords → calibration (once, before the run)
//   Kinematics snapshot → body (segment rotation, shoulder line) → HUD

pub mod body;
pub mod calibration;
pub mod filters;
pub mod kinematics;
pub mod trail_buffer;

pub use calibration::{Calibration, CalibrationStatus};
pub use filters::{FilterSample, PointFilter};
pub use kinematics::{Kinematics, KinematicsEngine, PointKinematics, PointStatus};
pub use trail_buffer::{TrailBuffer, TrailEntry};
