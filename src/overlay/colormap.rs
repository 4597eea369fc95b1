// src/overlay/colormap.rs

use crate::types::Colormap;
use image::Rgb;

impl Colormap {
    /// Map `t` ∈ [0, 1] to a color. Values outside are clamped.
    pub fn sample(self, t: f32) -> Rgb<u8> {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let (r, g, b) = match self {
            Colormap::Jet => jet(t),
            Colormap::Turbo => turbo(t),
            Colormap::Hot => hot(t),
        };
        Rgb([to_u8(r), to_u8(g), to_u8(b)])
    }
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

// Piecewise-linear jet: blue → cyan → yellow → red.
fn jet(t: f32) -> (f32, f32, f32) {
    let channel = |offset: f32| (1.5 - (4.0 * t - offset).abs()).clamp(0.0, 1.0);
    (channel(3.0), channel(2.0), channel(1.0))
}

// Polynomial fit of Google's Turbo colormap.
fn turbo(t: f32) -> (f32, f32, f32) {
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    let t5 = t4 * t;
    let r = 0.13572138 + 4.6153926 * t - 42.66032258 * t2 + 132.13108234 * t3
        - 152.94239396 * t4
        + 59.28637943 * t5;
    let g = 0.09140261 + 2.19418839 * t + 4.84296658 * t2 - 14.18503333 * t3
        + 4.27729857 * t4
        + 2.82956604 * t5;
    let b = 0.1066733 + 12.64194608 * t - 60.58204836 * t2 + 110.36276771 * t3
        - 89.90310912 * t4
        + 27.34824973 * t5;
    (r, g, b)
}

// Black → red → yellow → white.
fn hot(t: f32) -> (f32, f32, f32) {
    let r = (t * 3.0).min(1.0);
    let g = (t * 3.0 - 1.0).clamp(0.0, 1.0);
    let b = (t * 3.0 - 2.0).clamp(0.0, 1.0);
    (r, g, b)
}
