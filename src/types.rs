// src/types.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Add, Div, Mul, Sub};
use std::path::PathBuf;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Full session configuration.
///
/// Every section carries `#[serde(default)]` so a YAML document only needs
/// the keys it wants to change. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub subject: SubjectConfig,
    pub kinematics: KinematicsConfig,
    pub trail: TrailConfig,
    pub visuals: VisualsConfig,
    pub export: ExportConfig,
    pub input: InputConfig,
    pub logging: LoggingConfig,
    /// Named overlays applied on top of this config to produce independent
    /// output variants (one annotated sequence per entry).
    pub variants: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectConfig {
    /// Subject height in meters. `None` leaves the scale unset (pixel units).
    pub height_m: Option<f64>,
    /// Skip measurement and use this on-screen height directly.
    pub reference_pixel_height: Option<f64>,
    /// How many leading frames may be searched for a measurable pose.
    pub calibration_search_frames: usize,
}

impl Default for SubjectConfig {
    fn default() -> Self {
        Self {
            height_m: None,
            reference_pixel_height: None,
            calibration_search_frames: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicsConfig {
    pub fps: f64,
    /// Samples below this confidence are treated as missing.
    pub confidence_threshold: f64,
    /// Frames a point may be missing while its derivatives are held.
    /// One more missing frame resets the point.
    pub gap_tolerance_frames: u32,
    pub filter: FilterConfig,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            confidence_threshold: 0.5,
            gap_tolerance_frames: 5,
            filter: FilterConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterConfig {
    /// Exponential moving average on positions.
    Ema {
        #[serde(default = "default_ema_alpha")]
        alpha: f64,
    },
    /// Least-squares polynomial over a sliding window of raw samples.
    SavitzkyGolay {
        #[serde(default = "default_window")]
        window: usize,
        #[serde(default = "default_degree")]
        degree: usize,
    },
}

fn default_ema_alpha() -> f64 {
    0.3
}

fn default_window() -> usize {
    7
}

fn default_degree() -> usize {
    2
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::Ema {
            alpha: default_ema_alpha(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailConfig {
    /// Points whose positions feed the trail buffer.
    pub points: Vec<PointId>,
    pub capacity: usize,
    pub max_age_frames: u32,
    /// Per-point overrides of capacity / max age.
    pub per_point: BTreeMap<PointId, TrailLimits>,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            points: vec![PointId::RightWrist],
            capacity: 200,
            max_age_frames: 200,
            per_point: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailLimits {
    pub capacity: Option<usize>,
    pub max_age_frames: Option<u32>,
}

impl TrailConfig {
    /// Effective (capacity, max_age) for a point after per-point overrides.
    pub fn limits_for(&self, id: PointId) -> (usize, u32) {
        let limits = self.per_point.get(&id).copied().unwrap_or_default();
        (
            limits.capacity.unwrap_or(self.capacity),
            limits.max_age_frames.unwrap_or(self.max_age_frames),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualsConfig {
    /// Stacking order of passes, first drawn first. Enabled passes missing
    /// from this list are appended in the default order.
    pub order: Vec<String>,
    pub trail: TrailPassConfig,
    pub glow_trail: GlowTrailPassConfig,
    pub vectors: VectorPassConfig,
    pub heatmap: HeatmapPassConfig,
    pub hud: HudPassConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailPassConfig {
    pub enabled: bool,
    pub thickness: u32,
    pub color: [u8; 3],
    /// Older segments get thinner and fainter.
    pub fade: bool,
    pub opacity: f32,
}

impl Default for TrailPassConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            thickness: 2,
            color: [255, 255, 255],
            fade: true,
            opacity: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlowTrailPassConfig {
    pub enabled: bool,
    pub thickness: u32,
    pub color: [u8; 3],
    pub glow_color: [u8; 3],
    pub glow_radius: f32,
    pub glow_intensity: f32,
    /// No glow below this speed (velocity units of the session).
    pub min_speed: f64,
    /// Speed at which the glow reaches full strength.
    pub full_intensity_speed: f64,
    /// Number of most recent trail segments that glow.
    pub recent_segments: usize,
}

impl Default for GlowTrailPassConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            thickness: 2,
            color: [255, 255, 255],
            glow_color: [0, 255, 255],
            glow_radius: 15.0,
            glow_intensity: 0.8,
            min_speed: 5.0,
            full_intensity_speed: 50.0,
            recent_segments: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorPassConfig {
    pub enabled: bool,
    pub points: Vec<PointId>,
    /// Arrow pixels per velocity unit.
    pub scale: f64,
    pub show_velocity: bool,
    pub show_acceleration: bool,
    pub velocity_color: [u8; 3],
    pub acceleration_color: [u8; 3],
    pub min_length: f64,
    pub max_length: f64,
    pub thickness: u32,
    /// Label each arrow with its magnitude. Needs `font_path`.
    pub show_values: bool,
    pub font_path: Option<PathBuf>,
}

impl Default for VectorPassConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            points: vec![
                PointId::LeftShoulder,
                PointId::RightShoulder,
                PointId::LeftElbow,
                PointId::RightElbow,
                PointId::LeftWrist,
                PointId::RightWrist,
                PointId::LeftHip,
                PointId::RightHip,
            ],
            scale: 0.6,
            show_velocity: true,
            show_acceleration: true,
            velocity_color: [0, 255, 0],
            acceleration_color: [255, 0, 0],
            min_length: 10.0,
            max_length: 100.0,
            thickness: 2,
            show_values: false,
            font_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Colormap {
    #[default]
    Jet,
    Turbo,
    Hot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapPassConfig {
    pub enabled: bool,
    pub points: Vec<PointId>,
    pub radius: u32,
    pub alpha: f32,
    pub min_speed: f64,
    pub max_speed: f64,
    pub colormap: Colormap,
    /// Colorbar in the bottom-right corner. Its range labels need
    /// `font_path`.
    pub show_legend: bool,
    pub font_path: Option<PathBuf>,
}

impl Default for HeatmapPassConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            points: vec![
                PointId::LeftShoulder,
                PointId::RightShoulder,
                PointId::LeftElbow,
                PointId::RightElbow,
                PointId::LeftWrist,
                PointId::RightWrist,
                PointId::LeftHip,
                PointId::RightHip,
                PointId::LeftKnee,
                PointId::RightKnee,
                PointId::LeftAnkle,
                PointId::RightAnkle,
            ],
            radius: 24,
            alpha: 0.35,
            min_speed: 2.0,
            max_speed: 50.0,
            colormap: Colormap::Jet,
            show_legend: false,
            font_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HudPassConfig {
    pub enabled: bool,
    /// Point whose speed drives the panel and gauge.
    pub point: PointId,
    pub alpha: f32,
    /// Speed at or above which the release flash is shown.
    pub release_speed_threshold: f64,
    pub gauge_max_speed: f64,
    /// Upper-arm segment whose rotation rate feeds the angular gauge.
    pub shoulder: PointId,
    pub elbow: PointId,
    pub show_angular_gauge: bool,
    /// Full scale of the angular gauge, deg/s.
    pub angular_gauge_max: f64,
    /// TrueType font for panel text. Without it only shapes are drawn.
    pub font_path: Option<PathBuf>,
    pub panel_color: [u8; 3],
    pub text_color: [u8; 3],
    pub accent_color: [u8; 3],
    pub warning_color: [u8; 3],
}

impl Default for HudPassConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            point: PointId::RightWrist,
            alpha: 0.8,
            release_speed_threshold: 22.0,
            gauge_max_speed: 30.0,
            shoulder: PointId::RightShoulder,
            elbow: PointId::RightElbow,
            show_angular_gauge: true,
            angular_gauge_max: 360.0,
            font_path: None,
            panel_color: [0, 0, 0],
            text_color: [255, 255, 255],
            accent_color: [0, 255, 255],
            warning_color: [255, 0, 0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("landmarks.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Detector coordinates are in [0, 1] and must be scaled by frame size.
    pub normalized: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { normalized: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// LANDMARKS
// ============================================================================

/// Body-point roles emitted by the pose detector, in detector index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointId {
    Nose,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl PointId {
    pub const COUNT: usize = 33;

    pub const ALL: [PointId; Self::COUNT] = [
        Self::Nose,
        Self::LeftEyeInner,
        Self::LeftEye,
        Self::LeftEyeOuter,
        Self::RightEyeInner,
        Self::RightEye,
        Self::RightEyeOuter,
        Self::LeftEar,
        Self::RightEar,
        Self::MouthLeft,
        Self::MouthRight,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftPinky,
        Self::RightPinky,
        Self::LeftIndex,
        Self::RightIndex,
        Self::LeftThumb,
        Self::RightThumb,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::LeftHeel,
        Self::RightHeel,
        Self::LeftFootIndex,
        Self::RightFootIndex,
    ];

    /// Landmarks usable as the top of the subject's vertical extent.
    pub const HEAD: [PointId; 7] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEyeInner,
        Self::RightEyeInner,
        Self::LeftEar,
        Self::RightEar,
    ];

    /// Landmarks usable as the bottom of the subject's vertical extent.
    pub const FEET: [PointId; 6] = [
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::LeftHeel,
        Self::RightHeel,
        Self::LeftFootIndex,
        Self::RightFootIndex,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEyeInner => "left_eye_inner",
            Self::LeftEye => "left_eye",
            Self::LeftEyeOuter => "left_eye_outer",
            Self::RightEyeInner => "right_eye_inner",
            Self::RightEye => "right_eye",
            Self::RightEyeOuter => "right_eye_outer",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::MouthLeft => "mouth_left",
            Self::MouthRight => "mouth_right",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftPinky => "left_pinky",
            Self::RightPinky => "right_pinky",
            Self::LeftIndex => "left_index",
            Self::RightIndex => "right_index",
            Self::LeftThumb => "left_thumb",
            Self::RightThumb => "right_thumb",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
            Self::LeftHeel => "left_heel",
            Self::RightHeel => "right_heel",
            Self::LeftFootIndex => "left_foot_index",
            Self::RightFootIndex => "right_foot_index",
        }
    }
}

/// Planar vector in image coordinates (x right, y down).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Vec2 {
    type Output = Vec2;

    fn div(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x / rhs, self.y / rhs)
    }
}

/// One detected body point, already in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub id: PointId,
    pub position: Vec2,
    pub z: Option<f64>,
    pub confidence: f64,
}

/// Canonical per-frame landmark set. Missing identifiers mean occlusion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameRecord {
    pub index: u64,
    /// Seconds from the start of the sequence.
    pub timestamp: f64,
    pub points: BTreeMap<PointId, LandmarkPoint>,
}

impl FrameRecord {
    pub fn new(index: u64, timestamp: f64) -> Self {
        Self {
            index,
            timestamp,
            points: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, point: LandmarkPoint) {
        self.points.insert(point.id, point);
    }

    /// Builder-style insert, handy when assembling records by hand.
    pub fn with_point(mut self, id: PointId, x: f64, y: f64, confidence: f64) -> Self {
        self.insert(LandmarkPoint {
            id,
            position: Vec2::new(x, y),
            z: None,
            confidence,
        });
        self
    }

    pub fn get(&self, id: PointId) -> Option<&LandmarkPoint> {
        self.points.get(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_index_roundtrip() {
        for (i, id) in PointId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
            assert_eq!(PointId::from_index(i), Some(*id));
        }
        assert_eq!(PointId::from_index(33), None);
        assert_eq!(PointId::RightWrist.index(), 16);
    }

    #[test]
    fn test_point_id_serde_name_matches_as_str() {
        for id in PointId::ALL {
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id.as_str()));
        }
    }

    #[test]
    fn test_trail_limits_override() {
        let mut trail = TrailConfig::default();
        trail.per_point.insert(
            PointId::LeftWrist,
            TrailLimits {
                capacity: Some(10),
                max_age_frames: None,
            },
        );
        assert_eq!(trail.limits_for(PointId::LeftWrist), (10, 200));
        assert_eq!(trail.limits_for(PointId::RightWrist), (200, 200));
    }
}
