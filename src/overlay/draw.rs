// src/overlay/draw.rs
//
// Alpha-aware raster primitives. imageproc draws opaque shapes; everything
// translucent or thick goes through these so each pixel is blended exactly
// once per shape.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

pub type Point = (f32, f32);

/// Blend `color` over pixel (x, y) with opacity `alpha`. Out-of-bounds and
/// non-positive alpha are no-ops.
#[inline]
pub fn blend_pixel(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>, alpha: f32) {
    if x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 || alpha <= 0.0 {
        return;
    }
    let a = alpha.min(1.0);
    let px = img.get_pixel_mut(x as u32, y as u32);
    for c in 0..3 {
        let base = px.0[c] as f32;
        px.0[c] = (base + (color.0[c] as f32 - base) * a).round().clamp(0.0, 255.0) as u8;
    }
}

/// Add `color * gain` to pixel (x, y), saturating.
#[inline]
pub fn add_pixel(img: &mut RgbImage, x: u32, y: u32, color: Rgb<u8>, gain: f32) {
    let px = img.get_pixel_mut(x, y);
    for c in 0..3 {
        let v = px.0[c] as f32 + color.0[c] as f32 * gain;
        px.0[c] = v.round().clamp(0.0, 255.0) as u8;
    }
}

/// Clamped bounding box of a shape, in pixel indices.
fn bbox(img: &RgbImage, min: Point, max: Point) -> Option<(i32, i32, i32, i32)> {
    let x0 = min.0.floor().max(0.0) as i32;
    let y0 = min.1.floor().max(0.0) as i32;
    let x1 = (max.0.ceil() as i32).min(img.width() as i32 - 1);
    let y1 = (max.1.ceil() as i32).min(img.height() as i32 - 1);
    (x0 <= x1 && y0 <= y1).then_some((x0, y0, x1, y1))
}

pub fn fill_circle(img: &mut RgbImage, center: Point, radius: f32, color: Rgb<u8>, alpha: f32) {
    if alpha >= 1.0 {
        draw_filled_circle_mut(
            img,
            (center.0.round() as i32, center.1.round() as i32),
            radius.round().max(1.0) as i32,
            color,
        );
        return;
    }
    let r = radius.max(0.5);
    let Some((x0, y0, x1, y1)) = bbox(img, (center.0 - r, center.1 - r), (center.0 + r, center.1 + r))
    else {
        return;
    };
    let r2 = r * r;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f32 - center.0;
            let dy = y as f32 - center.1;
            if dx * dx + dy * dy <= r2 {
                blend_pixel(img, x, y, color, alpha);
            }
        }
    }
}

fn dist_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let (apx, apy) = (p.0 - a.0, p.1 - a.1);
    let len2 = abx * abx + aby * aby;
    let t = if len2 > 0.0 {
        ((apx * abx + apy * aby) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a.0 + abx * t - p.0, a.1 + aby * t - p.1);
    (cx * cx + cy * cy).sqrt()
}

/// Segment with round caps. One-pixel opaque lines use imageproc directly.
pub fn thick_line(img: &mut RgbImage, a: Point, b: Point, thickness: f32, color: Rgb<u8>, alpha: f32) {
    if thickness <= 1.0 && alpha >= 1.0 {
        draw_line_segment_mut(img, a, b, color);
        return;
    }
    let half = (thickness / 2.0).max(0.5);
    let min = (a.0.min(b.0) - half, a.1.min(b.1) - half);
    let max = (a.0.max(b.0) + half, a.1.max(b.1) + half);
    let Some((x0, y0, x1, y1)) = bbox(img, min, max) else {
        return;
    };
    for y in y0..=y1 {
        for x in x0..=x1 {
            if dist_to_segment((x as f32, y as f32), a, b) <= half {
                blend_pixel(img, x, y, color, alpha);
            }
        }
    }
}

pub fn dashed_line(
    img: &mut RgbImage,
    a: Point,
    b: Point,
    thickness: f32,
    color: Rgb<u8>,
    alpha: f32,
    dash: f32,
    gap: f32,
) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len = (dx * dx + dy * dy).sqrt();
    if len <= 0.0 || dash <= 0.0 {
        return;
    }
    let (ux, uy) = (dx / len, dy / len);
    let mut s = 0.0;
    while s < len {
        let e = (s + dash).min(len);
        thick_line(
            img,
            (a.0 + ux * s, a.1 + uy * s),
            (a.0 + ux * e, a.1 + uy * e),
            thickness,
            color,
            alpha,
        );
        s = e + gap;
    }
}

/// Shaft plus a two-stroke head at `to`.
pub fn arrow(
    img: &mut RgbImage,
    from: Point,
    to: Point,
    thickness: f32,
    color: Rgb<u8>,
    alpha: f32,
    dashed: bool,
) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1.0 {
        return;
    }
    if dashed {
        dashed_line(img, from, to, thickness, color, alpha, 6.0, 4.0);
    } else {
        thick_line(img, from, to, thickness, color, alpha);
    }

    let head = (len * 0.3).min(15.0);
    let angle = dy.atan2(dx);
    for side in [-1.0f32, 1.0] {
        let a = angle + std::f32::consts::PI + side * 0.45;
        let tip = (to.0 + head * a.cos(), to.1 + head * a.sin());
        thick_line(img, to, tip, thickness, color, alpha);
    }
}

pub fn fill_rect(img: &mut RgbImage, x: i32, y: i32, w: u32, h: u32, color: Rgb<u8>, alpha: f32) {
    for yy in y..y + h as i32 {
        for xx in x..x + w as i32 {
            blend_pixel(img, xx, yy, color, alpha);
        }
    }
}

/// Ring sector between `start` and `end` radians (clockwise in image
/// space, 0 = +x axis).
pub fn arc(
    img: &mut RgbImage,
    center: Point,
    radius: f32,
    thickness: f32,
    start: f32,
    end: f32,
    color: Rgb<u8>,
    alpha: f32,
) {
    if end <= start {
        return;
    }
    let outer = radius + thickness / 2.0;
    let inner = (radius - thickness / 2.0).max(0.0);
    let Some((x0, y0, x1, y1)) = bbox(
        img,
        (center.0 - outer, center.1 - outer),
        (center.0 + outer, center.1 + outer),
    ) else {
        return;
    };
    let tau = std::f32::consts::TAU;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f32 - center.0;
            let dy = y as f32 - center.1;
            let d = (dx * dx + dy * dy).sqrt();
            if d < inner || d > outer {
                continue;
            }
            let mut theta = dy.atan2(dx);
            while theta < start {
                theta += tau;
            }
            if theta <= end {
                blend_pixel(img, x, y, color, alpha);
            }
        }
    }
}

/// `output = output * (1 - alpha) + layer * alpha`, only where the layer
/// was drawn (`mask` non-zero).
pub fn blend_layer(output: &mut RgbImage, layer: &RgbImage, mask: &[f32], alpha: f32) {
    for (i, (px, lp)) in output.pixels_mut().zip(layer.pixels()).enumerate() {
        let m = mask.get(i).copied().unwrap_or(0.0);
        if m <= 0.0 {
            continue;
        }
        let a = (alpha * m).min(1.0);
        for c in 0..3 {
            let base = px.0[c] as f32;
            px.0[c] = (base + (lp.0[c] as f32 - base) * a).round().clamp(0.0, 255.0) as u8;
        }
    }
}
