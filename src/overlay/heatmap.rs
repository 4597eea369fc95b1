// src/overlay/heatmap.rs
//
// Speed heatmap: a Gaussian hot spot (σ = radius / 3) at each target joint,
// weighted by the joint's speed normalized into [min_speed, max_speed].
// Overlapping spots take the max. The field is colormapped and
// alpha-blended only where it is non-zero.
//
// The optional legend is a vertical colorbar in the bottom-right corner,
// max_speed at the top, with range labels when a font is configured.

use super::colors;
use super::draw::{blend_layer, fill_rect};
use super::text::{label, load_font};
use crate::pipeline::frame_context::FrameContext;
use crate::pipeline::registry::VisualPass;
use crate::types::HeatmapPassConfig;
use ab_glyph::FontVec;
use anyhow::Result;
use image::RgbImage;

/// Field values below this are treated as empty.
const FIELD_FLOOR: f32 = 0.01;

const LEGEND_W: u32 = 20;
const LEGEND_H: u32 = 100;
const LEGEND_MARGIN: u32 = 10;
const LEGEND_TEXT_SCALE: f32 = 14.0;
/// Labels start this far left of the bar.
const LEGEND_LABEL_OFFSET: i32 = 64;

pub struct HeatmapPass {
    config: HeatmapPassConfig,
    font: Option<FontVec>,
}

impl HeatmapPass {
    pub fn new(config: HeatmapPassConfig) -> Result<Self> {
        let font = if config.show_legend {
            load_font(config.font_path.as_deref(), "heatmap")?
        } else {
            None
        };
        Ok(Self { config, font })
    }

    /// Speed → weight in [0, 1].
    pub fn weight(&self, speed: f64) -> f32 {
        let c = &self.config;
        if !speed.is_finite() || speed <= c.min_speed {
            return 0.0;
        }
        let span = c.max_speed - c.min_speed;
        if span <= 0.0 {
            return 1.0;
        }
        ((speed - c.min_speed) / span).clamp(0.0, 1.0) as f32
    }

    fn splat(&self, field: &mut [f32], width: u32, height: u32, cx: f32, cy: f32, weight: f32) {
        let radius = self.config.radius.max(1) as f32;
        let sigma = radius / 3.0;
        let inv_two_sigma2 = 1.0 / (2.0 * sigma * sigma);

        let x0 = (cx - radius).floor().max(0.0) as u32;
        let y0 = (cy - radius).floor().max(0.0) as u32;
        let x1 = ((cx + radius).ceil().max(0.0) as u32).min(width.saturating_sub(1));
        let y1 = ((cy + radius).ceil().max(0.0) as u32).min(height.saturating_sub(1));
        if x0 > x1 || y0 > y1 {
            return;
        }

        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                let d2 = dx * dx + dy * dy;
                if d2 > radius * radius {
                    continue;
                }
                let v = weight * (-d2 * inv_two_sigma2).exp();
                let cell = &mut field[(y * width + x) as usize];
                if v > *cell {
                    *cell = v;
                }
            }
        }
    }

    /// Top-left corner of the colorbar, or `None` when the frame is too
    /// small to hold it.
    pub fn legend_origin(width: u32, height: u32) -> Option<(i32, i32)> {
        if width < LEGEND_W + 2 * LEGEND_MARGIN || height < LEGEND_H + 2 * LEGEND_MARGIN {
            return None;
        }
        Some((
            (width - LEGEND_W - LEGEND_MARGIN) as i32,
            (height - LEGEND_H - LEGEND_MARGIN) as i32,
        ))
    }

    fn draw_legend(&self, img: &mut RgbImage, ctx: &FrameContext) {
        let (width, height) = img.dimensions();
        let Some((x, y)) = Self::legend_origin(width, height) else {
            return;
        };

        fill_rect(img, x - 1, y - 1, LEGEND_W + 2, LEGEND_H + 2, colors::WHITE, 1.0);
        let colormap = self.config.colormap;
        for row in 0..LEGEND_H {
            let t = 1.0 - row as f32 / (LEGEND_H - 1) as f32;
            fill_rect(img, x, y + row as i32, LEGEND_W, 1, colormap.sample(t), 1.0);
        }

        let unit = ctx.speed_unit();
        let c = &self.config;
        label(
            img,
            self.font.as_ref(),
            x - LEGEND_LABEL_OFFSET,
            y,
            LEGEND_TEXT_SCALE,
            colors::WHITE,
            &format!("{:.1} {}", c.max_speed, unit),
        );
        label(
            img,
            self.font.as_ref(),
            x - LEGEND_LABEL_OFFSET,
            y + LEGEND_H as i32 - LEGEND_TEXT_SCALE as i32,
            LEGEND_TEXT_SCALE,
            colors::WHITE,
            &format!("{:.1} {}", c.min_speed, unit),
        );
    }
}

impl VisualPass for HeatmapPass {
    fn apply(&self, frame: &RgbImage, ctx: &FrameContext) -> Result<RgbImage> {
        let (width, height) = frame.dimensions();
        let mut field = vec![0.0f32; (width as usize) * (height as usize)];
        let mut any = false;

        for id in &self.config.points {
            let Some(pk) = ctx.point(*id) else {
                continue;
            };
            if !pk.status.is_fresh() {
                continue;
            }
            let (Some(pos), Some(speed)) = (pk.position(), ctx.speed(*id)) else {
                continue;
            };
            let w = self.weight(speed);
            if w <= 0.0 {
                continue;
            }
            self.splat(&mut field, width, height, pos.x as f32, pos.y as f32, w);
            any = true;
        }

        let mut out = frame.clone();
        if any {
            let colormap = self.config.colormap;
            let layer = RgbImage::from_fn(width, height, |x, y| {
                colormap.sample(field[(y * width + x) as usize])
            });
            let mask: Vec<f32> = field
                .iter()
                .map(|v| if *v > FIELD_FLOOR { 1.0 } else { 0.0 })
                .collect();
            blend_layer(&mut out, &layer, &mask, self.config.alpha);
        }

        if self.config.show_legend {
            self.draw_legend(&mut out, ctx);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Calibration, Kinematics, PointKinematics, PointStatus, TrailBuffer};
    use crate::types::{Colormap, FrameRecord, PointId, Vec2};
    use image::Rgb;

    #[test]
    fn test_weight_normalization() {
        let pass = HeatmapPass::new(HeatmapPassConfig::default()).unwrap();
        assert_eq!(pass.weight(1.0), 0.0);
        assert_eq!(pass.weight(2.0), 0.0);
        assert!((pass.weight(26.0) - 0.5).abs() < 1e-6);
        assert_eq!(pass.weight(80.0), 1.0);
    }

    fn run(speed: f64) -> (RgbImage, RgbImage) {
        run_with(speed, 100, 100, HeatmapPassConfig::default())
    }

    fn run_with(
        speed: f64,
        width: u32,
        height: u32,
        config: HeatmapPassConfig,
    ) -> (RgbImage, RgbImage) {
        let frame = RgbImage::from_pixel(width, height, Rgb([10, 10, 10]));
        let mut k = Kinematics::default();
        k.points.insert(
            PointId::RightWrist,
            PointKinematics {
                raw: Some(Vec2::new(50.0, 50.0)),
                z: None,
                smoothed: Some(Vec2::new(50.0, 50.0)),
                velocity: Some(Vec2::new(speed, 0.0)),
                acceleration: None,
                confidence: 1.0,
                status: PointStatus::Tracking,
                peak_speed: speed,
            },
        );
        let record = FrameRecord::new(0, 0.0);
        let cal = Calibration::unset();
        let trails = TrailBuffer::new();
        let ctx = FrameContext::new(&record, &k, &cal, &trails, 30.0);
        let pass = HeatmapPass::new(HeatmapPassConfig {
            enabled: true,
            ..config
        })
        .unwrap();
        let out = pass.apply(&frame, &ctx).unwrap();
        (frame, out)
    }

    #[test]
    fn test_hot_spot_only_near_fast_joint() {
        let (frame, out) = run(40.0);
        assert_ne!(out.get_pixel(50, 50), frame.get_pixel(50, 50));
        // outside the radius nothing changes
        assert_eq!(out.get_pixel(5, 5), frame.get_pixel(5, 5));
    }

    #[test]
    fn test_slow_joint_leaves_frame_untouched() {
        let (frame, out) = run(1.0);
        assert_eq!(out.as_raw(), frame.as_raw());
    }

    #[test]
    fn test_legend_colorbar_runs_max_to_min() {
        let config = HeatmapPassConfig {
            show_legend: true,
            ..HeatmapPassConfig::default()
        };
        // no hot spot, the legend is still drawn
        let (_, out) = run_with(1.0, 120, 150, config);
        let (x, y) = HeatmapPass::legend_origin(120, 150).unwrap();
        assert_eq!((x, y), (90, 40));
        assert_eq!(*out.get_pixel(95, 40), Colormap::Jet.sample(1.0));
        assert_eq!(*out.get_pixel(95, 139), Colormap::Jet.sample(0.0));
        assert_eq!(*out.get_pixel(89, 39), colors::WHITE);
        assert_eq!(*out.get_pixel(20, 20), Rgb([10, 10, 10]));
    }

    #[test]
    fn test_legend_skipped_on_small_frames() {
        assert!(HeatmapPass::legend_origin(100, 100).is_none());
        let config = HeatmapPassConfig {
            show_legend: true,
            ..HeatmapPassConfig::default()
        };
        let (frame, out) = run_with(1.0, 100, 100, config);
        assert_eq!(out.as_raw(), frame.as_raw());
    }
}
