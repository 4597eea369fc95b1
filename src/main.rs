// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use javelin_analysis::config::read_yaml;
use javelin_analysis::frame_io;
use javelin_analysis::landmarks::DetectorOutput;
use javelin_analysis::pipeline::{run_variants, SessionReport, VariantJob};
use javelin_analysis::{Config, ConfigOverrides};
use serde_yaml::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const BASE_VARIANT: &str = "base";

/// Annotate a javelin throw with kinematics overlays.
#[derive(Debug, Parser)]
#[command(name = "javelin-analysis", version)]
struct Args {
    /// Directory of input frames (png/jpg/bmp), in file-name order.
    #[arg(long)]
    frames: PathBuf,

    /// Pose landmark JSON produced by the detector.
    #[arg(long)]
    landmarks: PathBuf,

    /// Output root. Each variant writes to <output>/<variant>/.
    #[arg(long, default_value = "output")]
    output: PathBuf,

    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Athlete height in meters; enables physical units.
    #[arg(long)]
    height: Option<f64>,

    #[arg(long)]
    fps: Option<f64>,

    #[arg(long)]
    vectors: bool,

    #[arg(long)]
    heatmap: bool,

    #[arg(long)]
    hud: bool,

    #[arg(long)]
    trail: bool,

    #[arg(long)]
    glow_trail: bool,

    /// Write the landmark timeline (relative paths resolve per variant).
    #[arg(long)]
    export: bool,

    #[arg(long)]
    export_path: Option<PathBuf>,

    /// Run a named variant from the config. Repeatable.
    #[arg(long = "variant")]
    variants: Vec<String>,

    /// Run the base config plus every configured variant.
    #[arg(long)]
    all_variants: bool,

    /// Override any config key, e.g. `--set kinematics.filter.alpha=0.5`.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    assignments: Vec<String>,

    /// Frames decoded ahead of the renderer, per variant.
    #[arg(long, default_value_t = 4)]
    lookahead: usize,
}

impl Args {
    fn overrides(&self) -> Result<ConfigOverrides> {
        let mut overrides = ConfigOverrides::new();
        if let Some(h) = self.height {
            overrides.set("subject.height_m", Value::from(h));
        }
        if let Some(fps) = self.fps {
            overrides.set("kinematics.fps", Value::from(fps));
        }
        for (flag, key) in [
            (self.trail, "visuals.trail.enabled"),
            (self.glow_trail, "visuals.glow_trail.enabled"),
            (self.vectors, "visuals.vectors.enabled"),
            (self.heatmap, "visuals.heatmap.enabled"),
            (self.hud, "visuals.hud.enabled"),
            (self.export, "export.enabled"),
        ] {
            if flag {
                overrides.set(key, Value::from(true));
            }
        }
        if let Some(path) = &self.export_path {
            overrides.set("export.path", Value::from(path.display().to_string()));
        }
        for assignment in &self.assignments {
            overrides.set_assignment(assignment)?;
        }
        Ok(overrides)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let file = args.config.as_deref().map(read_yaml).transpose()?;
    let config = Config::layered(file, args.overrides()?.into_value())
        .context("loading configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("javelin_analysis={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🎯 Javelin Analysis Starting");
    info!("✓ Configuration loaded");
    info!(
        "Kinematics: fps={:.1}, confidence≥{:.2}, gap tolerance={} frames, filter={:?}",
        config.kinematics.fps,
        config.kinematics.confidence_threshold,
        config.kinematics.gap_tolerance_frames,
        config.kinematics.filter
    );

    let frames = frame_io::find_frame_files(&args.frames)?;
    if frames.is_empty() {
        error!("No frames found in {}", args.frames.display());
        return Ok(());
    }

    let detections = DetectorOutput::load(&args.landmarks)?;
    info!("✓ Landmarks loaded: {} detector frames", detections.landmarks.len());

    let jobs = build_jobs(&config, &args)?;
    info!(
        "Running {} variant(s): [{}]",
        jobs.len(),
        jobs.iter().map(|j| j.name.as_str()).collect::<Vec<_>>().join(", ")
    );

    // Set by an embedding caller to stop all variants at the next frame.
    let cancel = Arc::new(AtomicBool::new(false));
    let results = run_variants(jobs, &frames, &detections, args.lookahead, cancel);

    let mut failed = 0;
    for (name, result) in &results {
        match result {
            Ok(report) => print_report(report),
            Err(e) => {
                failed += 1;
                error!("❌ Variant `{}` failed: {:#}", name, e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} variant(s) failed", failed, results.len());
    }
    Ok(())
}

fn build_jobs(config: &Config, args: &Args) -> Result<Vec<VariantJob>> {
    let mut names: Vec<String> = Vec::new();
    if args.all_variants {
        names.push(BASE_VARIANT.to_string());
        names.extend(config.variants.keys().cloned());
    } else if args.variants.is_empty() {
        names.push(BASE_VARIANT.to_string());
    } else {
        names.extend(args.variants.iter().cloned());
    }
    // keep the first occurrence of each name, in the order given
    let mut seen = BTreeSet::new();
    names.retain(|name| seen.insert(name.clone()));

    names
        .into_iter()
        .map(|name| {
            let mut variant = if name == BASE_VARIANT {
                let mut base = config.clone();
                base.variants.clear();
                base
            } else {
                config.variant(&name)?
            };
            let output_dir = args.output.join(&name);
            variant.export.path = resolve_export_path(&output_dir, &variant.export.path);
            Ok(VariantJob {
                name,
                config: variant,
                output_dir: Some(output_dir),
            })
        })
        .collect()
}

fn resolve_export_path(output_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        output_dir.join(path)
    }
}

fn print_report(report: &SessionReport) {
    let m = &report.metrics;
    info!("\n📊 Variant `{}`:", report.name);
    info!("  Total frames: {}", m.total_frames);
    info!(
        "  Frames with landmarks: {} ({:.1}%)",
        m.frames_with_landmarks,
        100.0 * m.frames_with_landmarks as f64 / m.total_frames.max(1) as f64
    );
    if report.calibrated {
        info!("  📏 Scale: {:.5} m/px", report.scale);
    } else {
        warn!("  📏 Uncalibrated: values in pixels");
    }
    info!("  🔄 Point resets: {}", m.points_reset);
    if m.pass_failures > 0 {
        warn!("  ⚠️  Pass failures: {}", m.pass_failures);
    }
    if m.frame_errors > 0 {
        warn!("  ⚠️  Unreadable or unwritten frames: {}", m.frame_errors);
    }
    if let Some(path) = &report.export_path {
        info!("  💾 Timeline: {} ({} frames)", path.display(), m.timeline_entries);
    }
    info!("  Avg frame time: {} µs", m.avg_render_us);
    info!("  Processing Speed: {:.1} FPS", m.fps);
}
