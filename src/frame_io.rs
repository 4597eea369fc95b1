// src/frame_io.rs
//
// Frame sequence I/O for the driver. Video decode/encode happens outside
// this crate; frames arrive as a directory of still images and leave as
// one annotated PNG per input frame.

use anyhow::{Context, Result};
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Image files directly under `dir` (no recursion), in file-name order.
/// The position in this list is the frame index.
pub fn find_frame_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("frame directory {} does not exist", dir.display());
    }

    let mut frames: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    frames.sort();

    info!("Found {} frame images in {}", frames.len(), dir.display());
    Ok(frames)
}

pub fn read_frame(path: &Path) -> Result<RgbImage> {
    let img = image::open(path).with_context(|| format!("decoding frame {}", path.display()))?;
    Ok(img.to_rgb8())
}

pub fn frame_dimensions(path: &Path) -> Result<(u32, u32)> {
    image::image_dimensions(path)
        .with_context(|| format!("reading frame header {}", path.display()))
}

pub fn output_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("frame_{:06}.png", index))
}

pub fn write_frame(dir: &Path, index: u64, frame: &RgbImage) -> Result<PathBuf> {
    let path = output_path(dir, index);
    frame
        .save(&path)
        .with_context(|| format!("writing annotated frame {}", path.display()))?;
    Ok(path)
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating output directory {}", dir.display()))
}
