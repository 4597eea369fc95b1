// src/landmarks.rs
//
// Detector output → canonical FrameRecord.
//
// The pose detector is an external black box. Its JSON carries one entry per
// frame with indexed points in normalized [0, 1] coordinates (or pixels when
// `input.normalized` is off). Points keep whatever confidence the detector
// reported; deciding what is "too weak" is the engine's job.

use crate::types::{FrameRecord, LandmarkPoint, PointId, Vec2};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// DETECTOR WIRE FORMAT
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorOutput {
    #[serde(default)]
    pub landmarks: Vec<DetectorFrame>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorFrame {
    pub frame: u64,
    /// Seconds. Derived from the frame index when absent.
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub landmarks: Vec<DetectorLandmark>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectorLandmark {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: Option<f64>,
    #[serde(default = "default_visibility")]
    pub visibility: f64,
}

fn default_visibility() -> f64 {
    1.0
}

impl DetectorOutput {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading landmark file {}", path.display()))?;
        let mut output: DetectorOutput = serde_json::from_str(&contents)
            .with_context(|| format!("parsing landmark file {}", path.display()))?;
        output.landmarks.sort_by_key(|f| f.frame);
        info!(
            "Loaded {} landmark frames from {}",
            output.landmarks.len(),
            path.display()
        );
        Ok(output)
    }

    /// Frame entry for a given index, if the detector produced one.
    pub fn frame(&self, index: u64) -> Option<&DetectorFrame> {
        self.landmarks
            .binary_search_by_key(&index, |f| f.frame)
            .ok()
            .map(|i| &self.landmarks[i])
    }
}

// ============================================================================
// ADAPTER
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct LandmarkAdapter {
    width: f64,
    height: f64,
    normalized: bool,
    fps: f64,
}

impl LandmarkAdapter {
    pub fn new(width: u32, height: u32, normalized: bool, fps: f64) -> Self {
        Self {
            width: width as f64,
            height: height as f64,
            normalized,
            fps,
        }
    }

    pub fn adapt(&self, frame: &DetectorFrame) -> FrameRecord {
        let timestamp = frame
            .timestamp
            .filter(|t| t.is_finite())
            .unwrap_or_else(|| frame.frame as f64 / self.fps);
        let mut record = FrameRecord::new(frame.frame, timestamp);

        for lm in &frame.landmarks {
            let Some(id) = PointId::from_index(lm.id) else {
                debug!("frame {}: dropping unknown landmark index {}", frame.frame, lm.id);
                continue;
            };

            let position = if self.normalized {
                Vec2::new(lm.x * self.width, lm.y * self.height)
            } else {
                Vec2::new(lm.x, lm.y)
            };
            if !position.is_finite() {
                debug!("frame {}: dropping non-finite {}", frame.frame, id.as_str());
                continue;
            }

            let confidence = if lm.visibility.is_finite() {
                lm.visibility.clamp(0.0, 1.0)
            } else {
                0.0
            };

            record.insert(LandmarkPoint {
                id,
                position,
                z: lm.z.filter(|z| z.is_finite()),
                confidence,
            });
        }

        record
    }

    /// Record for a frame index with no detector entry at all.
    pub fn empty(&self, index: u64) -> FrameRecord {
        FrameRecord::new(index, index as f64 / self.fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lm(id: usize, x: f64, y: f64, visibility: f64) -> DetectorLandmark {
        DetectorLandmark {
            id,
            x,
            y,
            z: None,
            visibility,
        }
    }

    #[test]
    fn test_normalized_coordinates_scaled_to_pixels() {
        let adapter = LandmarkAdapter::new(1920, 1080, true, 30.0);
        let frame = DetectorFrame {
            frame: 4,
            timestamp: Some(0.133),
            landmarks: vec![lm(16, 0.5, 0.25, 0.9)],
        };
        let record = adapter.adapt(&frame);
        let wrist = record.get(PointId::RightWrist).unwrap();
        assert_eq!(wrist.position, Vec2::new(960.0, 270.0));
        assert_eq!(record.index, 4);
        assert!((record.timestamp - 0.133).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_and_non_finite_points_dropped() {
        let adapter = LandmarkAdapter::new(100, 100, false, 30.0);
        let frame = DetectorFrame {
            frame: 0,
            timestamp: None,
            landmarks: vec![lm(40, 1.0, 1.0, 1.0), lm(0, f64::NAN, 1.0, 1.0), lm(1, 3.0, 4.0, 1.0)],
        };
        let record = adapter.adapt(&frame);
        assert_eq!(record.points.len(), 1);
        assert!(record.get(PointId::LeftEyeInner).is_some());
    }

    #[test]
    fn test_confidence_clamped() {
        let adapter = LandmarkAdapter::new(100, 100, false, 30.0);
        let frame = DetectorFrame {
            frame: 0,
            timestamp: None,
            landmarks: vec![lm(0, 1.0, 1.0, 1.7), lm(1, 1.0, 1.0, -0.2)],
        };
        let record = adapter.adapt(&frame);
        assert_eq!(record.get(PointId::Nose).unwrap().confidence, 1.0);
        assert_eq!(record.get(PointId::LeftEyeInner).unwrap().confidence, 0.0);
    }

    #[test]
    fn test_empty_frame_and_timestamp_fallback() {
        let adapter = LandmarkAdapter::new(100, 100, true, 25.0);
        let frame = DetectorFrame {
            frame: 50,
            timestamp: None,
            landmarks: vec![],
        };
        let record = adapter.adapt(&frame);
        assert!(record.is_empty());
        assert!((record.timestamp - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_detector_json_parsing() {
        let json = r#"{
            "format": "mediapipe_pose_landmarks",
            "frame_count": 2,
            "landmarks": [
                {"frame": 1, "timestamp": 0.0333, "landmarks": [{"id": 16, "x": 0.1, "y": 0.2, "visibility": 0.8}]},
                {"frame": 0, "landmarks": []}
            ]
        }"#;
        let mut output: DetectorOutput = serde_json::from_str(json).unwrap();
        output.landmarks.sort_by_key(|f| f.frame);
        assert_eq!(output.landmarks.len(), 2);
        assert!(output.frame(1).is_some());
        assert!(output.frame(7).is_none());
        assert_eq!(output.frame(1).unwrap().landmarks[0].id, 16);
    }
}
