// src/export.rs
//
// Landmark timeline export for external consumers (3D compositing etc.).
//
// Frames are appended in memory during the run and written once at the end.
// Positions, velocities and accelerations are stored in the session's
// physical units (meters when calibrated), so replaying the raw positions
// through a fresh engine with scale 1 reproduces the stored derivatives.

use crate::analysis::{Calibration, Kinematics, KinematicsEngine, PointStatus};
use crate::types::{FilterConfig, FrameRecord, KinematicsConfig, LandmarkPoint, PointId, Vec2};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

pub const TIMELINE_FORMAT: &str = "jva_landmark_timeline";
pub const TIMELINE_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    Tracking,
    Warming,
    Held,
}

impl From<PointStatus> for ExportStatus {
    fn from(status: PointStatus) -> Self {
        match status {
            PointStatus::Tracking => Self::Tracking,
            PointStatus::Warming => Self::Warming,
            PointStatus::Held(_) => Self::Held,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub raw: Option<Vec2>,
    pub z: Option<f64>,
    pub smoothed: Option<Vec2>,
    pub velocity: Option<Vec2>,
    pub acceleration: Option<Vec2>,
    pub confidence: f64,
    pub status: ExportStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineFrame {
    pub frame: u64,
    pub timestamp: f64,
    pub points: BTreeMap<PointId, TimelinePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub format: String,
    pub version: String,
    pub fps: f64,
    pub scale: f64,
    pub calibrated: bool,
    pub units: String,
    pub filter: FilterConfig,
    pub confidence_threshold: f64,
    pub gap_tolerance_frames: u32,
    pub frame_count: usize,
    pub frames: Vec<TimelineFrame>,
}

impl Timeline {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading timeline {}", path.display()))?;
        let timeline: Timeline = serde_json::from_str(&contents)
            .with_context(|| format!("parsing timeline {}", path.display()))?;
        if timeline.format != TIMELINE_FORMAT {
            anyhow::bail!(
                "{} is not a landmark timeline (format `{}`)",
                path.display(),
                timeline.format
            );
        }
        Ok(timeline)
    }

    pub fn kinematics_config(&self) -> KinematicsConfig {
        KinematicsConfig {
            fps: self.fps,
            confidence_threshold: self.confidence_threshold,
            gap_tolerance_frames: self.gap_tolerance_frames,
            filter: self.filter,
        }
    }

    /// Re-run a fresh engine over the stored raw positions. The stored
    /// values are already in physical units, so no scaling is applied.
    pub fn replay(&self) -> Vec<Kinematics> {
        let mut engine = KinematicsEngine::new(&self.kinematics_config());
        self.frames
            .iter()
            .map(|frame| {
                let mut record = FrameRecord::new(frame.frame, frame.timestamp);
                for (id, point) in &frame.points {
                    if let Some(raw) = point.raw {
                        record.insert(LandmarkPoint {
                            id: *id,
                            position: raw,
                            z: point.z,
                            confidence: point.confidence,
                        });
                    }
                }
                engine.update(&record)
            })
            .collect()
    }

    /// Largest absolute difference between stored and replayed velocity /
    /// acceleration components. `None` if a derivative is present on one
    /// side only.
    pub fn replay_error(&self) -> Option<f64> {
        let replayed = self.replay();
        let mut worst = 0.0f64;
        for (frame, k) in self.frames.iter().zip(&replayed) {
            for (id, stored) in &frame.points {
                let again = k.get(*id)?;
                for (a, b) in [
                    (stored.velocity, again.velocity),
                    (stored.acceleration, again.acceleration),
                ] {
                    match (a, b) {
                        (Some(a), Some(b)) => {
                            worst = worst.max((a.x - b.x).abs()).max((a.y - b.y).abs());
                        }
                        (None, None) => {}
                        _ => return None,
                    }
                }
            }
        }
        Some(worst)
    }
}

// ============================================================================
// EXPORTER
// ============================================================================

pub struct TimelineExporter {
    kinematics: KinematicsConfig,
    calibration: Calibration,
    frames: Vec<TimelineFrame>,
}

impl TimelineExporter {
    pub fn new(kinematics: &KinematicsConfig, calibration: Calibration) -> Self {
        Self {
            kinematics: kinematics.clone(),
            calibration,
            frames: Vec::new(),
        }
    }

    /// Append one frame. `kinematics` is the engine's pixel-unit snapshot.
    pub fn record(&mut self, record: &FrameRecord, kinematics: &Kinematics) {
        let physical = kinematics.scaled(&self.calibration);
        let points = physical
            .points
            .iter()
            .map(|(id, pk)| {
                (
                    *id,
                    TimelinePoint {
                        raw: pk.raw,
                        z: pk.z,
                        smoothed: pk.smoothed,
                        velocity: pk.velocity,
                        acceleration: pk.acceleration,
                        confidence: pk.confidence,
                        status: pk.status.into(),
                    },
                )
            })
            .collect();

        self.frames.push(TimelineFrame {
            frame: record.index,
            timestamp: record.timestamp,
            points,
        });
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn timeline(&self) -> Timeline {
        Timeline {
            format: TIMELINE_FORMAT.to_string(),
            version: TIMELINE_VERSION.to_string(),
            fps: self.kinematics.fps,
            scale: self.calibration.scale(),
            calibrated: self.calibration.is_calibrated(),
            units: self.calibration.length_units().to_string(),
            filter: self.kinematics.filter,
            confidence_threshold: self.kinematics.confidence_threshold,
            gap_tolerance_frames: self.kinematics.gap_tolerance_frames,
            frame_count: self.frames.len(),
            frames: self.frames.clone(),
        }
    }

    /// Serialize everything recorded so far. The in-memory frames are kept,
    /// so a failed flush can be retried.
    pub fn flush(&self, destination: impl AsRef<Path>) -> Result<()> {
        let destination = destination.as_ref();
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating export directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.timeline())
            .context("serializing landmark timeline")?;
        fs::write(destination, json)
            .with_context(|| format!("writing landmark timeline {}", destination.display()))?;
        info!(
            "Exported {} frames of landmarks to {}",
            self.frames.len(),
            destination.display()
        );
        Ok(())
    }
}
