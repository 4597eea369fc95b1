// src/overlay/mod.rs
//
// Built-in visual passes and the raster helpers they share.
//
//   trails   plain trail polyline with age fade, and the glow variant
//   vectors  velocity / acceleration arrows per joint, optional values
//   heatmap  speed-weighted Gaussian hot spots, colormapped, with legend
//   hud      metrics panel, speed and arm-rotation gauges, release flash
//
// All drawing is on 8-bit RGB frames. Every pass clones its input, draws on
// the copy and returns it; the input is never touched.

pub mod colormap;
pub mod draw;
pub mod heatmap;
pub mod hud;
pub mod text;
pub mod trails;
pub mod vectors;

pub use heatmap::HeatmapPass;
pub use hud::HudPass;
pub use trails::{GlowTrailPass, TrailPass};
pub use vectors::VectorPass;

use image::Rgb;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Fixed colors not exposed through configuration.
pub mod colors {
    use image::Rgb;

    pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
    pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    pub const GAUGE_TRACK: Rgb<u8> = Rgb([70, 70, 70]);
    pub const GAUGE_LOW: Rgb<u8> = Rgb([0, 200, 80]);
    pub const GAUGE_MID: Rgb<u8> = Rgb([255, 200, 0]);
    pub const GAUGE_HIGH: Rgb<u8> = Rgb([255, 60, 0]);
    pub const GAUGE_ANGULAR: Rgb<u8> = Rgb([0, 128, 255]);
    pub const MARKER: Rgb<u8> = Rgb([255, 255, 255]);
}

/// Alpha values for overlay layers.
pub mod alpha {
    pub const ARROW: f32 = 0.9;
    pub const MARKER: f32 = 1.0;
    pub const GAUGE_TRACK: f32 = 0.6;
    pub const RELEASE_FLASH: f32 = 0.35;
    pub const LABEL_BOX: f32 = 0.7;
    /// Faintest an aged trail segment may get.
    pub const TRAIL_MIN: f32 = 0.08;
}

pub(crate) fn rgb(c: [u8; 3]) -> Rgb<u8> {
    Rgb(c)
}
