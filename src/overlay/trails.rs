// src/overlay/trails.rs
//
// Trail-family passes. Both read the per-point position history from the
// context's TrailBuffer; neither keeps state of its own.
//
//   trail       polyline, thinner and fainter with age
//   glow_trail  same polyline plus an additive blurred glow over the most
//               recent segments, scaled by the point's current speed

use super::draw::{add_pixel, thick_line};
use super::{alpha, rgb};
use crate::analysis::TrailEntry;
use crate::pipeline::frame_context::FrameContext;
use crate::pipeline::registry::VisualPass;
use crate::types::{GlowTrailPassConfig, TrailPassConfig};
use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::filter::gaussian_blur_f32;

/// Fraction of life left for an entry of `age` frames, in [0, 1].
fn freshness(age: u32, max_age: u32) -> f32 {
    if max_age == 0 {
        return 1.0;
    }
    (1.0 - age as f32 / max_age as f32).clamp(0.0, 1.0)
}

fn to_point(e: &TrailEntry) -> (f32, f32) {
    (e.position.x as f32, e.position.y as f32)
}

fn draw_polyline(
    img: &mut RgbImage,
    entries: &[TrailEntry],
    max_age: u32,
    thickness: u32,
    color: Rgb<u8>,
    opacity: f32,
    fade: bool,
) {
    for pair in entries.windows(2) {
        let (older, newer) = (&pair[0], &pair[1]);
        let (width, alpha) = if fade {
            let f = freshness(newer.age, max_age);
            (
                (thickness as f32 * f).max(1.0),
                (opacity * f).max(alpha::TRAIL_MIN),
            )
        } else {
            (thickness as f32, opacity)
        };
        thick_line(img, to_point(older), to_point(newer), width, color, alpha);
    }
}

// ============================================================================
// PLAIN TRAIL
// ============================================================================

pub struct TrailPass {
    config: TrailPassConfig,
}

impl TrailPass {
    pub fn new(config: TrailPassConfig) -> Self {
        Self { config }
    }
}

impl VisualPass for TrailPass {
    fn apply(&self, frame: &RgbImage, ctx: &FrameContext) -> Result<RgbImage> {
        let mut out = frame.clone();
        for id in ctx.trails.tracked_points() {
            let entries = ctx.trails.snapshot(id);
            draw_polyline(
                &mut out,
                &entries,
                ctx.trails.max_age(id),
                self.config.thickness,
                rgb(self.config.color),
                self.config.opacity,
                self.config.fade,
            );
        }
        Ok(out)
    }
}

// ============================================================================
// GLOW TRAIL
// ============================================================================

pub struct GlowTrailPass {
    config: GlowTrailPassConfig,
}

impl GlowTrailPass {
    pub fn new(config: GlowTrailPassConfig) -> Self {
        Self { config }
    }

    /// Glow strength for a speed in session units; 0 below `min_speed`.
    pub fn intensity_for(&self, speed: f64) -> f32 {
        let c = &self.config;
        if !speed.is_finite() || speed < c.min_speed {
            return 0.0;
        }
        let span = c.full_intensity_speed - c.min_speed;
        let t = if span > 0.0 {
            ((speed - c.min_speed) / span).clamp(0.0, 1.0)
        } else {
            1.0
        };
        c.glow_intensity * t as f32
    }

    fn draw_glow(&self, out: &mut RgbImage, recent: &[TrailEntry], intensity: f32) {
        let c = &self.config;
        let pad = (c.glow_radius * 2.0 + c.thickness as f32 * 2.0).ceil();

        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for e in recent {
            let (x, y) = to_point(e);
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        let x0 = (min_x - pad).floor().max(0.0) as u32;
        let y0 = (min_y - pad).floor().max(0.0) as u32;
        let x1 = ((max_x + pad).ceil().max(0.0) as u32).min(out.width());
        let y1 = ((max_y + pad).ceil().max(0.0) as u32).min(out.height());
        if x1 <= x0 || y1 <= y0 {
            return;
        }

        let mut layer = RgbImage::new(x1 - x0, y1 - y0);
        let glow_width = (c.thickness as f32 * 3.0).max(2.0);
        for pair in recent.windows(2) {
            let (ax, ay) = to_point(&pair[0]);
            let (bx, by) = to_point(&pair[1]);
            thick_line(
                &mut layer,
                (ax - x0 as f32, ay - y0 as f32),
                (bx - x0 as f32, by - y0 as f32),
                glow_width,
                rgb(c.glow_color),
                1.0,
            );
        }

        let sigma = (c.glow_radius / 3.0).max(0.5);
        let blurred = gaussian_blur_f32(&layer, sigma);

        for (x, y, px) in blurred.enumerate_pixels() {
            if px.0 == [0, 0, 0] {
                continue;
            }
            add_pixel(out, x0 + x, y0 + y, *px, intensity);
        }
    }
}

impl VisualPass for GlowTrailPass {
    fn apply(&self, frame: &RgbImage, ctx: &FrameContext) -> Result<RgbImage> {
        let c = &self.config;
        let mut out = frame.clone();

        for id in ctx.trails.tracked_points() {
            let entries = ctx.trails.snapshot(id);
            if entries.len() < 2 {
                continue;
            }

            let intensity = ctx
                .speed(id)
                .map(|s| self.intensity_for(s))
                .unwrap_or(0.0);
            if intensity > 0.0 {
                let start = entries.len().saturating_sub(c.recent_segments + 1);
                self.draw_glow(&mut out, &entries[start..], intensity);
            }

            draw_polyline(
                &mut out,
                &entries,
                ctx.trails.max_age(id),
                c.thickness,
                rgb(c.color),
                1.0,
                true,
            );
        }

        Ok(out)
    }
}
