// src/overlay/hud.rs
//
// Heads-up display for one tracked point (the throwing wrist by default):
//
//   ┌──────────────────────────────┐                     ╭───╮
//   │ right_wrist  18.4 m/s        │                    │ ◜  │  speed
//   │ Peak  23.1 m/s               │                     ╰───╯
//   │ Arm ω  612 deg/s             │                     ╭─╮
//   │ Shoulders  -12.5°            │                     │◜│    arm rotation
//   │ Frame 412  t 13.73 s  30 fps │                     ╰─╯
//   └──────────────────────────────┘
//
// plus a full-frame flash while the point's speed is at or above the
// release threshold. The pass is stateless: the peak comes from the engine
// and the arm rotation from the current snapshot. Text needs a TrueType
// font; without one, the panel and gauges are drawn without labels.

use super::draw::{arc, fill_circle, fill_rect, thick_line, Point};
use super::text::{label, load_font};
use super::{alpha, colors, rgb};
use crate::analysis::body::{segment_angular_velocity, shoulder_line_angle};
use crate::pipeline::frame_context::FrameContext;
use crate::pipeline::registry::VisualPass;
use crate::types::HudPassConfig;
use ab_glyph::FontVec;
use anyhow::Result;
use image::{Rgb, RgbImage};
use std::f32::consts::{FRAC_PI_2, PI};

const PANEL_X: i32 = 10;
const PANEL_Y: i32 = 10;
const PANEL_W: u32 = 300;
const PANEL_H: u32 = 124;
const BORDER: u32 = 2;
const LINE_SPACING: i32 = 22;
const TEXT_SCALE: f32 = 18.0;
const GAUGE_TEXT_SCALE: f32 = 15.0;

const SPEED_GAUGE_Y: f32 = 80.0;
const SPEED_GAUGE_RADIUS: f32 = 50.0;
const ANGULAR_GAUGE_Y: f32 = 215.0;
const ANGULAR_GAUGE_RADIUS: f32 = 40.0;
/// Gauge centers sit this far in from the right edge.
const GAUGE_INSET: f32 = 80.0;
const GAUGE_THICKNESS: f32 = 6.0;
/// Gauge sweep: from 12 o'clock, clockwise, three quarters of a turn.
const GAUGE_START: f32 = -FRAC_PI_2;
const GAUGE_SWEEP: f32 = 1.5 * PI;

/// One dial: a track, a filled sector up to `fraction`, a needle, and the
/// value and caption underneath.
struct Gauge<'a> {
    center: Point,
    radius: f32,
    fraction: f32,
    fill: Rgb<u8>,
    value: Option<String>,
    caption: &'a str,
}

/// Values shown on the panel, all in display units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HudReadout {
    pub speed: Option<f64>,
    pub peak: Option<f64>,
    /// Upper-arm rotation rate, deg/s.
    pub arm_rate: Option<f64>,
    /// Shoulder line against the horizontal, degrees.
    pub shoulder_angle: Option<f64>,
}

pub struct HudPass {
    config: HudPassConfig,
    font: Option<FontVec>,
}

impl HudPass {
    pub fn new(config: HudPassConfig) -> Result<Self> {
        let font = load_font(config.font_path.as_deref(), "HUD")?;
        Ok(Self { config, font })
    }

    pub fn is_release(&self, speed: f64) -> bool {
        speed.is_finite() && speed >= self.config.release_speed_threshold
    }

    /// Fraction of the speed gauge filled for `speed`.
    pub fn gauge_fraction(&self, speed: f64) -> f32 {
        fraction(speed, self.config.gauge_max_speed)
    }

    /// Fraction of the angular gauge filled for a rotation rate in deg/s.
    /// Direction is ignored.
    pub fn angular_fraction(&self, deg_per_s: f64) -> f32 {
        fraction(deg_per_s.abs(), self.config.angular_gauge_max)
    }

    pub fn readout(&self, ctx: &FrameContext) -> HudReadout {
        let c = &self.config;
        HudReadout {
            speed: ctx.speed(c.point),
            peak: ctx.peak_speed(c.point),
            arm_rate: segment_angular_velocity(ctx.kinematics, c.shoulder, c.elbow)
                .map(|w| w.abs().to_degrees()),
            shoulder_angle: shoulder_line_angle(ctx.kinematics),
        }
    }

    fn text(&self, img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>, text: &str) {
        label(img, self.font.as_ref(), x, y, TEXT_SCALE, color, text);
    }

    fn draw_panel(&self, img: &mut RgbImage, ctx: &FrameContext, r: &HudReadout) {
        let c = &self.config;
        fill_rect(img, PANEL_X, PANEL_Y, PANEL_W, PANEL_H, rgb(c.panel_color), c.alpha);

        let accent = rgb(c.accent_color);
        fill_rect(img, PANEL_X, PANEL_Y, PANEL_W, BORDER, accent, 1.0);
        fill_rect(img, PANEL_X, PANEL_Y + (PANEL_H - BORDER) as i32, PANEL_W, BORDER, accent, 1.0);
        fill_rect(img, PANEL_X, PANEL_Y, BORDER, PANEL_H, accent, 1.0);
        fill_rect(img, PANEL_X + (PANEL_W - BORDER) as i32, PANEL_Y, BORDER, PANEL_H, accent, 1.0);

        if self.font.is_none() {
            return;
        }

        let unit = ctx.speed_unit();
        let fmt = |v: Option<f64>| match v {
            Some(v) => format!("{:.1} {}", v, unit),
            None => "--".to_string(),
        };

        let speed_color = match r.speed {
            Some(s) if s > c.release_speed_threshold * 0.8 => rgb(c.warning_color),
            _ => rgb(c.text_color),
        };
        let text_color = rgb(c.text_color);

        let lines = [
            (speed_color, format!("{}  {}", c.point.as_str(), fmt(r.speed))),
            (accent, format!("Peak  {}", fmt(r.peak))),
            (
                text_color,
                match r.arm_rate {
                    Some(w) => format!("Arm ω  {:.0} deg/s", w),
                    None => "Arm ω  --".to_string(),
                },
            ),
            (
                text_color,
                match r.shoulder_angle {
                    Some(a) => format!("Shoulders  {:.1}°", a),
                    None => "Shoulders  --".to_string(),
                },
            ),
            (
                text_color,
                format!("Frame {}  t {:.2} s  {:.0} fps", ctx.frame_id, ctx.timestamp, ctx.fps),
            ),
        ];

        let x = PANEL_X + 12;
        let mut y = PANEL_Y + 8;
        for (color, line) in &lines {
            self.text(img, x, y, *color, line);
            y += LINE_SPACING;
        }
    }

    fn draw_gauge(&self, img: &mut RgbImage, gauge: Gauge) {
        let Gauge {
            center,
            radius,
            fraction,
            fill,
            value,
            caption,
        } = gauge;
        arc(
            img,
            center,
            radius,
            GAUGE_THICKNESS,
            GAUGE_START,
            GAUGE_START + GAUGE_SWEEP,
            colors::GAUGE_TRACK,
            alpha::GAUGE_TRACK,
        );

        let end = GAUGE_START + GAUGE_SWEEP * fraction;
        if fraction > 0.0 {
            arc(img, center, radius, GAUGE_THICKNESS, GAUGE_START, end, fill, 1.0);
        }

        let accent = rgb(self.config.accent_color);
        let needle = radius - 10.0;
        let tip = (center.0 + needle * end.cos(), center.1 + needle * end.sin());
        thick_line(img, center, tip, 2.0, accent, 1.0);
        fill_circle(img, center, 3.0, accent, 1.0);

        let x = (center.0 - radius) as i32;
        let y = (center.1 + radius + 6.0) as i32;
        let text_color = rgb(self.config.text_color);
        if let Some(value) = value {
            label(img, self.font.as_ref(), x, y, GAUGE_TEXT_SCALE, text_color, &value);
        }
        label(
            img,
            self.font.as_ref(),
            x,
            y + GAUGE_TEXT_SCALE as i32 + 2,
            GAUGE_TEXT_SCALE,
            text_color,
            caption,
        );
    }

    fn draw_gauges(&self, img: &mut RgbImage, ctx: &FrameContext, r: &HudReadout) {
        let x = img.width() as f32 - GAUGE_INSET;

        let fraction = r.speed.map(|s| self.gauge_fraction(s)).unwrap_or(0.0);
        let fill = if fraction < 0.5 {
            colors::GAUGE_LOW
        } else if fraction < 0.8 {
            colors::GAUGE_MID
        } else {
            colors::GAUGE_HIGH
        };
        self.draw_gauge(
            img,
            Gauge {
                center: (x, SPEED_GAUGE_Y),
                radius: SPEED_GAUGE_RADIUS,
                fraction,
                fill,
                value: r.speed.map(|s| format!("{:.1} {}", s, ctx.speed_unit())),
                caption: "SPEED",
            },
        );

        if self.config.show_angular_gauge {
            self.draw_gauge(
                img,
                Gauge {
                    center: (x, ANGULAR_GAUGE_Y),
                    radius: ANGULAR_GAUGE_RADIUS,
                    fraction: r.arm_rate.map(|w| self.angular_fraction(w)).unwrap_or(0.0),
                    fill: colors::GAUGE_ANGULAR,
                    value: r.arm_rate.map(|w| format!("{:.0} deg/s", w)),
                    caption: "ARM ROTATION",
                },
            );
        }
    }

    fn draw_release_flash(&self, img: &mut RgbImage) {
        let warning = rgb(self.config.warning_color);
        let (w, h) = img.dimensions();
        fill_rect(img, 0, 0, w, h, warning, alpha::RELEASE_FLASH);
        self.text(
            img,
            (w / 2) as i32 - 50,
            (h / 2) as i32,
            colors::WHITE,
            "RELEASE",
        );
    }
}

fn fraction(value: f64, full_scale: f64) -> f32 {
    if full_scale <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    (value / full_scale).clamp(0.0, 1.0) as f32
}

impl VisualPass for HudPass {
    fn apply(&self, frame: &RgbImage, ctx: &FrameContext) -> Result<RgbImage> {
        let mut out = frame.clone();
        let readout = self.readout(ctx);

        if readout.speed.map_or(false, |s| self.is_release(s)) {
            self.draw_release_flash(&mut out);
        }
        self.draw_panel(&mut out, ctx, &readout);
        self.draw_gauges(&mut out, ctx, &readout);
        Ok(out)
    }
}
