// src/analysis/calibration.rs
//
// Pixel → meter scale from the subject's known height.
//
// The on-screen height is the vertical distance from the highest visible
// head landmark to the lowest visible foot landmark (image y grows down).
// Computed once before frame processing and never changed during a run.

use crate::types::{FrameRecord, PointId, SubjectConfig};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStatus {
    Calibrated,
    Unset,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub subject_height_m: Option<f64>,
    pub pixel_height: Option<f64>,
    scale: f64,
    status: CalibrationStatus,
}

impl Default for Calibration {
    fn default() -> Self {
        Self::unset()
    }
}

impl Calibration {
    /// Scale 1.0, everything stays in pixels.
    pub fn unset() -> Self {
        Self {
            subject_height_m: None,
            pixel_height: None,
            scale: 1.0,
            status: CalibrationStatus::Unset,
        }
    }

    /// Scale from an already-known on-screen height.
    pub fn from_pixel_height(height_m: f64, pixel_height: f64) -> Self {
        let valid = height_m.is_finite()
            && height_m > 0.0
            && pixel_height.is_finite()
            && pixel_height > 0.0;
        if !valid {
            return Self::unset();
        }
        Self {
            subject_height_m: Some(height_m),
            pixel_height: Some(pixel_height),
            scale: height_m / pixel_height,
            status: CalibrationStatus::Calibrated,
        }
    }

    /// Measure the subject in `reference` and derive the scale. Landmarks
    /// below `min_confidence` are not considered visible.
    pub fn calibrate(height_m: f64, reference: &FrameRecord, min_confidence: f64) -> Self {
        match measure_pixel_height(reference, min_confidence) {
            Some(px) => Self::from_pixel_height(height_m, px),
            None => Self::unset(),
        }
    }

    /// Resolve the session calibration from config: an explicit reference
    /// height wins; otherwise the first measurable record among the leading
    /// `calibration_search_frames` is used.
    pub fn from_first_measurable<'a, I>(
        subject: &SubjectConfig,
        records: I,
        min_confidence: f64,
    ) -> Self
    where
        I: IntoIterator<Item = &'a FrameRecord>,
    {
        let Some(height_m) = subject.height_m else {
            return Self::unset();
        };

        if let Some(px) = subject.reference_pixel_height {
            let cal = Self::from_pixel_height(height_m, px);
            info!(
                "Calibration from reference height: {:.1}px → {:.5} m/px",
                px,
                cal.scale()
            );
            return cal;
        }

        for record in records.into_iter().take(subject.calibration_search_frames) {
            let cal = Self::calibrate(height_m, record, min_confidence);
            if cal.is_calibrated() {
                info!(
                    "Calibration from frame {}: {:.1}px → {:.5} m/px",
                    record.index,
                    cal.pixel_height.unwrap_or_default(),
                    cal.scale()
                );
                return cal;
            }
        }

        warn!(
            "No measurable pose in the first {} frames, staying in pixel units",
            subject.calibration_search_frames
        );
        Self::unset()
    }

    /// Meters per pixel (1.0 when unset).
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn status(&self) -> CalibrationStatus {
        self.status
    }

    pub fn is_calibrated(&self) -> bool {
        self.status == CalibrationStatus::Calibrated
    }

    /// Speeds are per second in both modes; only the length unit changes.
    pub fn speed_unit(&self) -> &'static str {
        if self.is_calibrated() {
            "m/s"
        } else {
            "px/s"
        }
    }

    pub fn acceleration_unit(&self) -> &'static str {
        if self.is_calibrated() {
            "m/s²"
        } else {
            "px/s²"
        }
    }

    pub fn length_units(&self) -> &'static str {
        if self.is_calibrated() {
            "meters"
        } else {
            "pixels"
        }
    }

    pub fn to_physical(&self, value: f64) -> f64 {
        value * self.scale
    }
}

/// Vertical pixel extent head → feet, if both ends are visible.
pub fn measure_pixel_height(record: &FrameRecord, min_confidence: f64) -> Option<f64> {
    let visible_y = |ids: &[PointId]| -> Vec<f64> {
        ids.iter()
            .filter_map(|id| record.get(*id))
            .filter(|p| p.confidence >= min_confidence && p.position.y.is_finite())
            .map(|p| p.position.y)
            .collect()
    };

    let top = visible_y(&PointId::HEAD).into_iter().reduce(f64::min)?;
    let bottom = visible_y(&PointId::FEET).into_iter().reduce(f64::max)?;

    let extent = bottom - top;
    (extent.is_finite() && extent > 0.0).then_some(extent)
}
