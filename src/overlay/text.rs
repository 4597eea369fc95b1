// src/overlay/text.rs
//
// Font loading and label drawing shared by the passes. A pass without a
// font draws its shapes and silently skips every label.

use super::draw::fill_rect;
use super::{alpha, colors};
use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::fs;
use std::path::Path;
use tracing::info;

/// Padding around a boxed label, px.
const BOX_PAD: i32 = 3;

/// Load the TrueType font at `path`, if one is configured. `owner` names
/// the pass in errors and logs.
pub fn load_font(path: Option<&Path>, owner: &str) -> Result<Option<FontVec>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let bytes =
        fs::read(path).with_context(|| format!("reading {} font {}", owner, path.display()))?;
    let font = FontVec::try_from_vec(bytes)
        .map_err(|e| anyhow::anyhow!("invalid {} font {}: {}", owner, path.display(), e))?;
    info!("{} font loaded from {}", owner, path.display());
    Ok(Some(font))
}

pub fn label(
    img: &mut RgbImage,
    font: Option<&FontVec>,
    x: i32,
    y: i32,
    size: f32,
    color: Rgb<u8>,
    text: &str,
) {
    if let Some(font) = font {
        draw_text_mut(img, color, x, y, PxScale::from(size), font, text);
    }
}

/// Label on a translucent black box, for text drawn over the scene.
pub fn boxed_label(
    img: &mut RgbImage,
    font: Option<&FontVec>,
    x: i32,
    y: i32,
    size: f32,
    color: Rgb<u8>,
    text: &str,
) {
    let Some(font) = font else {
        return;
    };
    let (w, h) = text_size(PxScale::from(size), font, text);
    fill_rect(
        img,
        x - BOX_PAD,
        y - BOX_PAD,
        w + 2 * BOX_PAD as u32,
        h + 2 * BOX_PAD as u32,
        colors::BLACK,
        alpha::LABEL_BOX,
    );
    draw_text_mut(img, color, x, y, PxScale::from(size), font, text);
}
