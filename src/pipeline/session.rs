// src/pipeline/session.rs
//
// One output variant, end to end. Per frame, strictly in this order:
//
//   detector frame → adapter → engine → trail buffer → passes → exporter
//
// A session owns all of its mutable state. Variants run side by side on
// scoped threads, each with its own session, sharing only the read-only
// frame list and detector output.

use super::frame_context::FrameContext;
use super::lookahead::LookaheadSource;
use super::metrics::{MetricsSummary, SessionMetrics};
use super::registry::{AnnotatedFrame, PassRegistry, VisualPass};
use crate::analysis::{Calibration, Kinematics, KinematicsEngine, TrailBuffer};
use crate::export::TimelineExporter;
use crate::frame_io;
use crate::landmarks::{DetectorFrame, DetectorOutput, LandmarkAdapter};
use crate::types::{Config, FrameRecord};
use anyhow::{Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub struct Session {
    name: String,
    config: Config,
    engine: KinematicsEngine,
    calibration: Calibration,
    trails: TrailBuffer,
    registry: PassRegistry,
    exporter: Option<TimelineExporter>,
    metrics: SessionMetrics,
    frame_size: Option<(u32, u32)>,
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub name: String,
    pub metrics: MetricsSummary,
    pub calibrated: bool,
    pub scale: f64,
    pub export_path: Option<PathBuf>,
}

impl Session {
    /// Validate `config` and build every component. Fails before any frame
    /// is processed.
    pub fn new(name: impl Into<String>, config: Config, calibration: Calibration) -> Result<Self> {
        let name = name.into();
        config
            .validate()
            .with_context(|| format!("invalid configuration for `{}`", name))?;

        let engine = KinematicsEngine::new(&config.kinematics);
        let trails = TrailBuffer::from_config(&config.trail);
        let registry = PassRegistry::from_config(&config.visuals)
            .with_context(|| format!("building visual passes for `{}`", name))?;
        let exporter = config
            .export
            .enabled
            .then(|| TimelineExporter::new(&config.kinematics, calibration));

        info!(
            "[{}] session ready: {} pass(es), scale {:.5} ({}), export {}",
            name,
            registry.len(),
            calibration.scale(),
            calibration.speed_unit(),
            if exporter.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            name,
            config,
            engine,
            calibration,
            trails,
            registry,
            exporter,
            metrics: SessionMetrics::new(),
            frame_size: None,
        })
    }

    /// Resolve calibration from the leading detector frames, adapted at the
    /// given frame size.
    pub fn calibrate(config: &Config, detections: &DetectorOutput, width: u32, height: u32) -> Calibration {
        let adapter = LandmarkAdapter::new(width, height, config.input.normalized, config.kinematics.fps);
        let leading: Vec<FrameRecord> = detections
            .landmarks
            .iter()
            .take(config.subject.calibration_search_frames)
            .map(|f| adapter.adapt(f))
            .collect();
        Calibration::from_first_measurable(
            &config.subject,
            &leading,
            config.kinematics.confidence_threshold,
        )
    }

    /// Register an extra pass after the configured ones. Configuration time
    /// only.
    pub fn register_pass(&mut self, name: impl Into<String>, pass: Box<dyn VisualPass>) {
        self.registry.register(name, pass);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn process_frame(
        &mut self,
        index: u64,
        image: &RgbImage,
        detections: Option<&DetectorFrame>,
    ) -> AnnotatedFrame {
        self.frame_size = Some(image.dimensions());
        let record = self.adapt(index, detections);
        self.process_record(image, &record)
    }

    /// Run one already-adapted record through the engine, trails, passes
    /// and exporter.
    pub fn process_record(&mut self, image: &RgbImage, record: &FrameRecord) -> AnnotatedFrame {
        let started = Instant::now();
        self.metrics.inc(&self.metrics.total_frames);
        if !record.is_empty() {
            self.metrics.inc(&self.metrics.frames_with_landmarks);
        }

        let kinematics = self.track(record);

        let ctx = FrameContext::new(
            record,
            &kinematics,
            &self.calibration,
            &self.trails,
            self.config.kinematics.fps,
        );
        let annotated = self.registry.apply_all(image, &ctx);

        let failures = annotated.failures().count() as u64;
        if failures > 0 {
            self.metrics.add(&self.metrics.pass_failures, failures);
        }

        self.export(record, &kinematics);
        self.metrics.record_render(started.elapsed());
        annotated
    }

    /// Account for a frame whose image is unavailable. The engine, trails
    /// and timeline still advance so later derivatives keep a uniform time
    /// base; no passes run and nothing is rendered.
    pub fn skip_frame(&mut self, index: u64, detections: Option<&DetectorFrame>) {
        self.metrics.inc(&self.metrics.frame_errors);
        let record = self.adapt(index, detections);
        let kinematics = self.track(&record);
        self.export(&record, &kinematics);
    }

    /// Detector frame → record at the last seen image size. Normalized
    /// landmarks cannot be placed before any image has been seen.
    fn adapt(&self, index: u64, detections: Option<&DetectorFrame>) -> FrameRecord {
        let (width, height) = self.frame_size.unwrap_or((0, 0));
        let adapter = LandmarkAdapter::new(
            width,
            height,
            self.config.input.normalized,
            self.config.kinematics.fps,
        );
        match detections {
            Some(frame) if self.frame_size.is_some() || !self.config.input.normalized => {
                adapter.adapt(frame)
            }
            _ => adapter.empty(index),
        }
    }

    fn track(&mut self, record: &FrameRecord) -> Kinematics {
        let kinematics = self.engine.update(record);
        if !kinematics.resets.is_empty() {
            debug!(
                "[{}] frame {}: reset {:?}",
                self.name, record.index, kinematics.resets
            );
            self.metrics
                .add(&self.metrics.points_reset, kinematics.resets.len() as u64);
        }

        let tracked: Vec<_> = self.trails.tracked_points().collect();
        for id in tracked {
            match kinematics.get(id) {
                Some(pk) if pk.status.is_fresh() => match pk.position() {
                    Some(pos) => self.trails.push(id, pos),
                    None => self.trails.age_only(id),
                },
                _ => self.trails.age_only(id),
            }
        }
        kinematics
    }

    fn export(&mut self, record: &FrameRecord, kinematics: &Kinematics) {
        if let Some(exporter) = self.exporter.as_mut() {
            exporter.record(record, kinematics);
            self.metrics.inc(&self.metrics.timeline_entries);
        }
    }

    /// Drive the session over `frames` until exhausted or cancelled. Each
    /// annotated frame is handed to `sink` before the next one is pulled.
    ///
    /// A frame that cannot be read, or that `sink` rejects, is logged and
    /// counted in `frame_errors`; the run carries on with the next one.
    /// Returns the number of frames rendered.
    pub fn run<I, F>(
        &mut self,
        frames: I,
        detections: &DetectorOutput,
        cancel: &AtomicBool,
        mut sink: F,
    ) -> u64
    where
        I: IntoIterator<Item = (u64, Result<RgbImage>)>,
        F: FnMut(&AnnotatedFrame) -> Result<()>,
    {
        let mut processed = 0u64;
        for (index, item) in frames {
            if cancel.load(Ordering::Relaxed) {
                warn!("[{}] cancelled after {} frames", self.name, processed);
                break;
            }
            let image = match item {
                Ok(image) => image,
                Err(e) => {
                    warn!("[{}] frame {}: skipped, {:#}", self.name, index, e);
                    self.skip_frame(index, detections.frame(index));
                    continue;
                }
            };
            let annotated = self.process_frame(index, &image, detections.frame(index));
            if let Err(e) = sink(&annotated) {
                warn!("[{}] frame {}: output not written, {:#}", self.name, index, e);
                self.metrics.inc(&self.metrics.frame_errors);
            }
            processed += 1;

            if processed % 100 == 0 {
                info!(
                    "[{}] {} frames ({:.1} fps)",
                    self.name,
                    processed,
                    self.metrics.fps()
                );
            }
        }
        processed
    }

    /// Flush the timeline (if enabled) and report. On a failed flush the
    /// error is returned and nothing recorded is lost from the exporter;
    /// call `flush_export` again to retry.
    pub fn finish(&self) -> Result<SessionReport> {
        let export_path = self.flush_export()?;
        let summary = self.metrics.summary();
        info!(
            "[{}] done: {} frames, {} with landmarks, {} point resets, {} pass failures, {} frame errors",
            self.name,
            summary.total_frames,
            summary.frames_with_landmarks,
            summary.points_reset,
            summary.pass_failures,
            summary.frame_errors
        );
        Ok(SessionReport {
            name: self.name.clone(),
            metrics: summary,
            calibrated: self.calibration.is_calibrated(),
            scale: self.calibration.scale(),
            export_path,
        })
    }

    pub fn flush_export(&self) -> Result<Option<PathBuf>> {
        match &self.exporter {
            Some(exporter) => {
                let path = self.config.export.path.clone();
                exporter.flush(&path)?;
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }
}

// ============================================================================
// VARIANTS
// ============================================================================

/// One independent output: its own config and output directory.
#[derive(Debug, Clone)]
pub struct VariantJob {
    pub name: String,
    pub config: Config,
    /// Annotated frames are written here when set.
    pub output_dir: Option<PathBuf>,
}

/// Run every job concurrently over the same frames. Jobs share only the
/// read-only inputs; each result is reported separately so one failing
/// variant does not hide the others.
pub fn run_variants(
    jobs: Vec<VariantJob>,
    frames: &[PathBuf],
    detections: &DetectorOutput,
    lookahead: usize,
    cancel: Arc<AtomicBool>,
) -> Vec<(String, Result<SessionReport>)> {
    thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let cancel = Arc::clone(&cancel);
                let name = job.name.clone();
                let handle = scope.spawn(move || run_job(job, frames, detections, lookahead, cancel));
                (name, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(name, handle)| {
                let result = handle
                    .join()
                    .unwrap_or_else(|_| Err(anyhow::anyhow!("variant `{}` panicked", name)));
                if let Err(e) = &result {
                    error!("[{}] failed: {:#}", name, e);
                }
                (name, result)
            })
            .collect()
    })
}

fn run_job(
    job: VariantJob,
    frames: &[PathBuf],
    detections: &DetectorOutput,
    lookahead: usize,
    cancel: Arc<AtomicBool>,
) -> Result<SessionReport> {
    if frames.is_empty() {
        anyhow::bail!("no frames to process");
    }
    let (width, height) = frames
        .iter()
        .find_map(|p| match frame_io::frame_dimensions(p) {
            Ok(dims) => Some(dims),
            Err(e) => {
                warn!("[{}] {:#}", job.name, e);
                None
            }
        })
        .context("no readable frames")?;

    let calibration = Session::calibrate(&job.config, detections, width, height);
    let mut session = Session::new(job.name.clone(), job.config, calibration)?;

    if let Some(dir) = &job.output_dir {
        frame_io::ensure_dir(dir)?;
    }

    let paths: Vec<PathBuf> = frames.to_vec();
    let source = LookaheadSource::spawn(
        paths
            .into_iter()
            .enumerate()
            .map(|(i, p)| (i as u64, frame_io::read_frame(&p))),
        lookahead,
        Arc::clone(&cancel),
    );

    let output_dir = job.output_dir.clone();
    session.run(source, detections, &cancel, |annotated| {
        if let Some(dir) = &output_dir {
            write_annotated(dir, annotated)?;
        }
        Ok(())
    });

    session.finish()
}

fn write_annotated(dir: &Path, annotated: &AnnotatedFrame) -> Result<()> {
    frame_io::write_frame(dir, annotated.frame_id, &annotated.image)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::Timeline;
    use crate::landmarks::DetectorLandmark;
    use crate::types::PointId;
    use image::Rgb;

    fn detections(n: u64) -> DetectorOutput {
        DetectorOutput {
            landmarks: (0..n)
                .map(|i| DetectorFrame {
                    frame: i,
                    timestamp: None,
                    landmarks: vec![DetectorLandmark {
                        id: PointId::RightWrist.index(),
                        x: 0.2 + 0.02 * i as f64,
                        y: 0.5,
                        z: None,
                        visibility: 0.95,
                    }],
                })
                .collect(),
        }
    }

    fn config_with_all_passes() -> Config {
        let mut config = Config::default();
        config.visuals.trail.enabled = true;
        config.visuals.glow_trail.enabled = true;
        config.visuals.vectors.enabled = true;
        config.visuals.heatmap.enabled = true;
        config.visuals.hud.enabled = true;
        config
    }

    #[test]
    fn test_default_session_passes_frames_through() {
        let mut session = Session::new("base", Config::default(), Calibration::unset()).unwrap();
        let dets = detections(3);
        for i in 0..3 {
            let img = RgbImage::from_fn(64, 48, |x, y| Rgb([x as u8, y as u8, i as u8]));
            let out = session.process_frame(i, &img, dets.frame(i));
            assert_eq!(out.image.as_raw(), img.as_raw());
        }
        let report = session.finish().unwrap();
        assert_eq!(report.metrics.total_frames, 3);
        assert_eq!(report.metrics.frames_with_landmarks, 3);
        assert!(report.export_path.is_none());
    }

    #[test]
    fn test_all_passes_preserve_dimensions() {
        let mut session =
            Session::new("all", config_with_all_passes(), Calibration::unset()).unwrap();
        let dets = detections(10);
        for i in 0..10 {
            let img = RgbImage::new(320, 240);
            let out = session.process_frame(i, &img, dets.frame(i));
            assert_eq!(out.image.dimensions(), (320, 240));
            assert_eq!(out.failures().count(), 0);
            assert_eq!(out.reports.len(), 5);
        }
        assert_eq!(session.trails.len(PointId::RightWrist), 10);
    }

    #[test]
    fn test_invalid_config_rejected_before_frames() {
        let mut config = Config::default();
        config.kinematics.fps = 0.0;
        assert!(Session::new("bad", config, Calibration::unset()).is_err());
    }

    #[test]
    fn test_missing_frames_age_trails() {
        let mut config = Config::default();
        config.visuals.trail.enabled = true;
        let mut session = Session::new("t", config, Calibration::unset()).unwrap();
        let dets = detections(2);
        let img = RgbImage::new(100, 100);
        session.process_frame(0, &img, dets.frame(0));
        session.process_frame(1, &img, dets.frame(1));
        session.process_frame(2, &img, None);
        let snap = session.trails.snapshot(PointId::RightWrist);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.last().unwrap().age, 1);
    }

    #[test]
    fn test_run_variants_writes_each_output() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let mut frames = Vec::new();
        for i in 0..4 {
            let p = input.path().join(format!("f{:03}.png", i));
            RgbImage::from_pixel(40, 30, Rgb([20, 20, 20])).save(&p).unwrap();
            frames.push(p);
        }

        let mut export_cfg = config_with_all_passes();
        export_cfg.export.enabled = true;
        export_cfg.export.path = output.path().join("all").join("landmarks.json");

        let jobs = vec![
            VariantJob {
                name: "plain".into(),
                config: Config::default(),
                output_dir: Some(output.path().join("plain")),
            },
            VariantJob {
                name: "all".into(),
                config: export_cfg,
                output_dir: Some(output.path().join("all")),
            },
        ];

        let results = run_variants(
            jobs,
            &frames,
            &detections(4),
            2,
            Arc::new(AtomicBool::new(false)),
        );
        assert_eq!(results.len(), 2);
        for (name, result) in &results {
            let report = result.as_ref().unwrap();
            assert_eq!(&report.name, name);
            assert_eq!(report.metrics.total_frames, 4);
            assert!(output.path().join(name).join("frame_000003.png").exists());
        }
        assert!(output.path().join("all").join("landmarks.json").exists());
    }

    #[test]
    fn test_cancelled_run_processes_nothing() {
        let mut session = Session::new("c", Config::default(), Calibration::unset()).unwrap();
        let cancel = AtomicBool::new(true);
        let frames = (0..5u64).map(|i| (i, Ok(RgbImage::new(8, 8))));
        let n = session.run(frames, &DetectorOutput::default(), &cancel, |_| Ok(()));
        assert_eq!(n, 0);
    }

    #[test]
    fn test_corrupt_frame_is_skipped_and_timeline_flushed() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let mut frames = Vec::new();
        for i in 0..4 {
            let p = input.path().join(format!("f{:03}.png", i));
            if i == 2 {
                std::fs::write(&p, b"not a png").unwrap();
            } else {
                RgbImage::from_pixel(40, 30, Rgb([20, 20, 20])).save(&p).unwrap();
            }
            frames.push(p);
        }

        let mut config = config_with_all_passes();
        config.export.enabled = true;
        config.export.path = output.path().join("landmarks.json");
        let jobs = vec![VariantJob {
            name: "gappy".into(),
            config: config.clone(),
            output_dir: Some(output.path().to_path_buf()),
        }];

        let results = run_variants(jobs, &frames, &detections(4), 2, Arc::new(AtomicBool::new(false)));
        let report = results[0].1.as_ref().unwrap();
        assert_eq!(report.metrics.total_frames, 3);
        assert_eq!(report.metrics.frame_errors, 1);
        assert!(output.path().join("frame_000003.png").exists());
        assert!(!output.path().join("frame_000002.png").exists());

        // the skipped frame still holds its slot in the timeline
        let timeline = Timeline::load(&config.export.path).unwrap();
        assert_eq!(timeline.frame_count, 4);
        assert!(timeline.frames[2].points.contains_key(&PointId::RightWrist));
    }

    #[test]
    fn test_rejected_output_is_counted_not_fatal() {
        let mut session = Session::new("w", Config::default(), Calibration::unset()).unwrap();
        let frames = (0..3u64).map(|i| (i, Ok(RgbImage::new(8, 8))));
        let n = session.run(frames, &detections(3), &AtomicBool::new(false), |a| {
            if a.frame_id == 1 {
                anyhow::bail!("disk full");
            }
            Ok(())
        });
        assert_eq!(n, 3);
        assert_eq!(session.metrics().summary().frame_errors, 1);
    }

    #[test]
    fn test_failed_finish_keeps_timeline_for_retry() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.export.enabled = true;
        // an existing directory cannot be written as a file
        config.export.path = dir.path().to_path_buf();
        let mut session = Session::new("retry", config, Calibration::unset()).unwrap();
        let dets = detections(5);
        let img = RgbImage::new(64, 48);
        for i in 0..5 {
            session.process_frame(i, &img, dets.frame(i));
        }

        assert!(session.finish().is_err());
        assert_eq!(session.exporter.as_ref().unwrap().len(), 5);

        let good = dir.path().join("timeline.json");
        session.config.export.path = good.clone();
        let report = session.finish().unwrap();
        assert_eq!(report.export_path.as_deref(), Some(good.as_path()));
        assert_eq!(Timeline::load(&good).unwrap().frame_count, 5);
    }
}
