// src/overlay/vectors.rs
//
// Velocity (solid) and acceleration (dashed) arrows anchored at each target
// joint. Arrow length is |v| × scale in pixels, clamped to
// [min_length, max_length]; anything that would be shorter than
// `STATIONARY_PX` is not drawn at all. With `show_values` and a font, each
// drawn arrow is labelled with its magnitude in session units.

use super::draw::{arrow, fill_circle, Point};
use super::text::{boxed_label, load_font};
use super::{alpha, colors, rgb};
use crate::pipeline::frame_context::FrameContext;
use crate::pipeline::registry::VisualPass;
use crate::types::{Vec2, VectorPassConfig};
use ab_glyph::FontVec;
use anyhow::Result;
use image::RgbImage;

const STATIONARY_PX: f64 = 5.0;
const VALUE_TEXT_SCALE: f32 = 14.0;

pub struct VectorPass {
    config: VectorPassConfig,
    font: Option<FontVec>,
}

/// Magnitude label drawn next to an arrow head.
pub fn value_label(magnitude: f64, unit: &str) -> String {
    format!("{:.1} {}", magnitude, unit)
}

impl VectorPass {
    pub fn new(config: VectorPassConfig) -> Result<Self> {
        let font = if config.show_values {
            load_font(config.font_path.as_deref(), "vector")?
        } else {
            None
        };
        Ok(Self { config, font })
    }

    /// On-screen arrow length for a vector magnitude, or `None` when too
    /// small to draw.
    pub fn arrow_length(&self, magnitude: f64) -> Option<f64> {
        let scaled = magnitude * self.config.scale;
        if !scaled.is_finite() || scaled <= STATIONARY_PX {
            return None;
        }
        Some(scaled.clamp(self.config.min_length, self.config.max_length))
    }

    /// Draw one arrow; returns its head position when something was drawn.
    fn draw_vector(
        &self,
        img: &mut RgbImage,
        origin: Point,
        v: Vec2,
        color: [u8; 3],
        dashed: bool,
    ) -> Option<Point> {
        let magnitude = v.norm();
        let length = self.arrow_length(magnitude)?;
        let dir = v / magnitude;
        let end = (
            origin.0 + (dir.x * length) as f32,
            origin.1 + (dir.y * length) as f32,
        );
        arrow(
            img,
            origin,
            end,
            self.config.thickness as f32,
            rgb(color),
            alpha::ARROW,
            dashed,
        );
        Some(end)
    }

    fn draw_value(&self, img: &mut RgbImage, head: Point, magnitude: f64, unit: &str, color: [u8; 3]) {
        boxed_label(
            img,
            self.font.as_ref(),
            head.0 as i32 + 5,
            head.1 as i32 - 5 - VALUE_TEXT_SCALE as i32,
            VALUE_TEXT_SCALE,
            rgb(color),
            &value_label(magnitude, unit),
        );
    }
}

impl VisualPass for VectorPass {
    fn apply(&self, frame: &RgbImage, ctx: &FrameContext) -> Result<RgbImage> {
        let c = &self.config;
        let mut out = frame.clone();

        for id in &c.points {
            let Some(pk) = ctx.point(*id) else {
                continue;
            };
            if !pk.status.is_fresh() {
                continue;
            }
            let Some(pos) = pk.position() else {
                continue;
            };
            let origin = (pos.x as f32, pos.y as f32);

            let mut drew = false;
            let mut labels = Vec::new();
            if c.show_velocity {
                if let Some(v) = ctx.velocity(*id) {
                    if let Some(head) = self.draw_vector(&mut out, origin, v, c.velocity_color, false) {
                        labels.push((head, v.norm(), ctx.speed_unit(), c.velocity_color));
                    }
                    drew = true;
                }
            }
            if c.show_acceleration {
                if let Some(a) = ctx.acceleration(*id) {
                    if let Some(head) =
                        self.draw_vector(&mut out, origin, a, c.acceleration_color, true)
                    {
                        labels.push((head, a.norm(), ctx.acceleration_unit(), c.acceleration_color));
                    }
                    drew = true;
                }
            }
            if c.show_values {
                for (head, magnitude, unit, color) in labels {
                    self.draw_value(&mut out, head, magnitude, unit, color);
                }
            }
            if drew {
                fill_circle(&mut out, origin, 3.0, colors::MARKER, alpha::MARKER);
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Calibration, Kinematics, PointKinematics, PointStatus, TrailBuffer};
    use crate::types::{FrameRecord, PointId};
    use image::Rgb;

    fn config() -> VectorPassConfig {
        VectorPassConfig {
            enabled: true,
            points: vec![PointId::RightWrist],
            show_acceleration: false,
            ..VectorPassConfig::default()
        }
    }

    #[test]
    fn test_arrow_length_clamping() {
        let pass = VectorPass::new(config()).unwrap();
        // 0.6 px per unit
        assert_eq!(pass.arrow_length(5.0), None);
        assert_eq!(pass.arrow_length(10.0), Some(10.0));
        assert_eq!(pass.arrow_length(50.0), Some(30.0));
        assert_eq!(pass.arrow_length(1000.0), Some(100.0));
    }

    fn ctx_run(velocity: Option<Vec2>, status: PointStatus) -> RgbImage {
        let mut k = Kinematics::default();
        k.points.insert(
            PointId::RightWrist,
            PointKinematics {
                raw: Some(Vec2::new(20.0, 50.0)),
                z: None,
                smoothed: Some(Vec2::new(20.0, 50.0)),
                velocity,
                acceleration: None,
                confidence: 1.0,
                status,
                peak_speed: 0.0,
            },
        );
        let record = FrameRecord::new(0, 0.0);
        let cal = Calibration::unset();
        let trails = TrailBuffer::new();
        let ctx = FrameContext::new(&record, &k, &cal, &trails, 30.0);
        VectorPass::new(config())
            .unwrap()
            .apply(&RgbImage::new(120, 100), &ctx)
            .unwrap()
    }

    #[test]
    fn test_velocity_arrow_drawn_along_direction() {
        let out = ctx_run(Some(Vec2::new(100.0, 0.0)), PointStatus::Tracking);
        // 100 × 0.6 = 60 px to the right
        assert_ne!(*out.get_pixel(60, 50), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(20, 80), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_nothing_drawn_without_derivative_or_when_held() {
        let blank = RgbImage::new(120, 100);
        let out = ctx_run(None, PointStatus::Warming);
        assert_eq!(out.as_raw(), blank.as_raw());
        let out = ctx_run(Some(Vec2::new(100.0, 0.0)), PointStatus::Held(2));
        assert_eq!(out.as_raw(), blank.as_raw());
    }

    #[test]
    fn test_value_label_format() {
        assert_eq!(value_label(12.345, "m/s"), "12.3 m/s");
        assert_eq!(value_label(1500.0, "px/s²"), "1500.0 px/s²");
    }

    #[test]
    fn test_values_need_a_readable_font() {
        let missing = VectorPass::new(VectorPassConfig {
            show_values: true,
            font_path: Some("/nonexistent/font.ttf".into()),
            ..config()
        });
        assert!(missing.is_err());

        // the font is only loaded when values are shown
        let hidden = VectorPass::new(VectorPassConfig {
            show_values: false,
            font_path: Some("/nonexistent/font.ttf".into()),
            ..config()
        });
        assert!(hidden.is_ok());
    }
}
