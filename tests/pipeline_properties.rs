// End-to-end behavior of a session: engine, trails, passes and export wired
// together the way the binary runs them.

use anyhow::{bail, Result};
use image::{Rgb, RgbImage};
use javelin_analysis::analysis::{Calibration, KinematicsEngine, PointStatus, TrailBuffer};
use javelin_analysis::export::Timeline;
use javelin_analysis::landmarks::{DetectorFrame, DetectorLandmark};
use javelin_analysis::pipeline::{FrameContext, PassOutcome, PassRegistry, Session, VisualPass};
use javelin_analysis::types::{FilterConfig, FrameRecord, KinematicsConfig, PointId, Vec2};
use javelin_analysis::Config;

fn wrist(index: u64, x: f64, y: f64) -> FrameRecord {
    FrameRecord::new(index, index as f64 / 30.0).with_point(PointId::RightWrist, x, y, 0.9)
}

fn landmark(id: PointId, x: f64, y: f64) -> DetectorLandmark {
    DetectorLandmark {
        id: id.index(),
        x,
        y,
        z: None,
        visibility: 0.95,
    }
}

/// A subject standing 200 px tall (head at y=300, heel at y=500) whose right
/// wrist moves 50 px per frame.
fn throwing_frame(index: u64) -> DetectorFrame {
    DetectorFrame {
        frame: index,
        timestamp: None,
        landmarks: vec![
            landmark(PointId::Nose, 500.0, 300.0),
            landmark(PointId::RightHeel, 510.0, 500.0),
            landmark(PointId::RightWrist, 100.0 + 50.0 * index as f64, 350.0),
        ],
    }
}

fn pixel_config() -> Config {
    let mut config = Config::default();
    config.input.normalized = false;
    config
}

#[test]
fn test_constant_input_has_zero_derivatives() {
    for filter in [
        FilterConfig::Ema { alpha: 0.3 },
        FilterConfig::SavitzkyGolay {
            window: 7,
            degree: 2,
        },
    ] {
        let mut engine = KinematicsEngine::new(&KinematicsConfig {
            filter,
            ..KinematicsConfig::default()
        });
        for i in 0..20 {
            let k = engine.update(&wrist(i, 240.0, 135.0));
            let pk = k.get(PointId::RightWrist).unwrap();
            if let (Some(v), Some(a)) = (pk.velocity, pk.acceleration) {
                assert!(v.norm() < 1e-9, "{:?}: velocity {:?}", filter, v);
                assert!(a.norm() < 1e-6, "{:?}: acceleration {:?}", filter, a);
            }
            if i >= 6 {
                assert_eq!(pk.status, PointStatus::Tracking);
            }
        }
    }
}

#[test]
fn test_gap_holds_then_resets() {
    let mut engine = KinematicsEngine::new(&KinematicsConfig::default());
    let mut last = None;
    for i in 0..5 {
        last = engine.update(&wrist(i, 100.0 + 10.0 * i as f64, 200.0)).get(PointId::RightWrist).copied();
    }
    let last = last.unwrap();

    for gap in 1..=5u32 {
        let k = engine.update(&FrameRecord::new(4 + gap as u64, 0.0));
        let held = k.get(PointId::RightWrist).unwrap();
        assert_eq!(held.status, PointStatus::Held(gap));
        assert_eq!(held.smoothed, last.smoothed);
        assert_eq!(held.velocity, last.velocity);
        assert!(held.raw.is_none());
        assert!(k.resets.is_empty());
    }

    let k = engine.update(&FrameRecord::new(10, 0.0));
    assert!(k.get(PointId::RightWrist).is_none());
    assert_eq!(k.resets, vec![PointId::RightWrist]);

    // fresh start after the reset: no derivative on the first new sample
    let k = engine.update(&wrist(11, 900.0, 900.0));
    let pk = k.get(PointId::RightWrist).unwrap();
    assert_eq!(pk.velocity, Some(Vec2::ZERO));
    assert_eq!(pk.peak_speed, 0.0);
}

#[test]
fn test_ema_alpha_one_tracks_raw() {
    let mut engine = KinematicsEngine::new(&KinematicsConfig {
        filter: FilterConfig::Ema { alpha: 1.0 },
        ..KinematicsConfig::default()
    });
    for i in 0..10 {
        let raw = Vec2::new(17.0 * i as f64, 400.0 - 3.0 * (i * i) as f64);
        let k = engine.update(&wrist(i, raw.x, raw.y));
        assert_eq!(k.get(PointId::RightWrist).unwrap().smoothed, Some(raw));
    }
}

#[test]
fn test_savitzky_golay_warm_up() {
    let window = 9;
    let mut engine = KinematicsEngine::new(&KinematicsConfig {
        filter: FilterConfig::SavitzkyGolay { window, degree: 3 },
        ..KinematicsConfig::default()
    });
    for i in 0..window as u64 + 3 {
        let raw = Vec2::new(5.0 * i as f64, 100.0);
        let k = engine.update(&wrist(i, raw.x, raw.y));
        let pk = k.get(PointId::RightWrist).unwrap();
        if (i as usize) < window - 1 {
            assert_eq!(pk.status, PointStatus::Warming);
            assert_eq!(pk.smoothed, Some(raw));
            assert!(pk.velocity.is_none());
        } else {
            assert_eq!(pk.status, PointStatus::Tracking);
            // 5 px/frame at 30 fps
            let v = pk.velocity.unwrap();
            assert!((v.x - 150.0).abs() < 1e-6);
        }
    }
}

#[test]
fn test_calibrated_session_reports_meters() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = pixel_config();
    config.subject.height_m = Some(1.8);
    config.kinematics.filter = FilterConfig::Ema { alpha: 1.0 };
    config.export.enabled = true;
    config.export.path = dir.path().join("timeline.json");

    let frames: Vec<DetectorFrame> = (0..4).map(throwing_frame).collect();
    let detections = javelin_analysis::landmarks::DetectorOutput { landmarks: frames };

    let calibration = Session::calibrate(&config, &detections, 1920, 1080);
    assert!((calibration.scale() - 0.009).abs() < 1e-12);

    let mut session = Session::new("meters", config.clone(), calibration).unwrap();
    let image = RgbImage::new(1920, 1080);
    for i in 0..4 {
        session.process_frame(i, &image, detections.frame(i));
    }
    let report = session.finish().unwrap();
    assert!(report.calibrated);

    let timeline = Timeline::load(&config.export.path).unwrap();
    assert_eq!(timeline.units, "meters");
    // 50 px/frame × 30 fps = 1500 px/s → 13.5 m/s
    let v = timeline.frames[2].points[&PointId::RightWrist].velocity.unwrap();
    assert!((v.x - 13.5).abs() < 1e-9, "{:?}", v);
    assert!(v.y.abs() < 1e-12);
}

#[test]
fn test_trail_capacity_bounds_history() {
    let mut trails = TrailBuffer::new();
    trails.track(PointId::RightWrist, 10, 100);
    for i in 0..15 {
        trails.push(PointId::RightWrist, Vec2::new(i as f64, 0.0));
    }
    let snap = trails.snapshot(PointId::RightWrist);
    assert_eq!(snap.len(), 10);
    assert_eq!(snap.first().unwrap().position.x, 5.0);
    assert_eq!(snap.first().unwrap().age, 9);
    assert_eq!(snap.last().unwrap().position.x, 14.0);
    assert_eq!(snap.last().unwrap().age, 0);
}

#[test]
fn test_no_passes_is_byte_identical() {
    let mut session = Session::new("plain", pixel_config(), Calibration::unset()).unwrap();
    for i in 0..5 {
        let image = RgbImage::from_fn(97, 61, |x, y| Rgb([(x * 3) as u8, (y * 5) as u8, (x ^ y) as u8]));
        let out = session.process_frame(i, &image, Some(&throwing_frame(i)));
        assert_eq!(out.image.as_raw(), image.as_raw());
        assert!(out.reports.is_empty());
    }
}

struct Paint(Rgb<u8>, u32);

impl VisualPass for Paint {
    fn apply(&self, frame: &RgbImage, _ctx: &FrameContext) -> Result<RgbImage> {
        let mut out = frame.clone();
        out.put_pixel(self.1, 0, self.0);
        Ok(out)
    }
}

struct Broken;

impl VisualPass for Broken {
    fn apply(&self, _frame: &RgbImage, _ctx: &FrameContext) -> Result<RgbImage> {
        bail!("out of ink")
    }
}

struct Shrink;

impl VisualPass for Shrink {
    fn apply(&self, _frame: &RgbImage, _ctx: &FrameContext) -> Result<RgbImage> {
        Ok(RgbImage::new(1, 1))
    }
}

#[test]
fn test_failing_pass_is_isolated() {
    let mut registry = PassRegistry::new();
    registry.register("first", Box::new(Paint(Rgb([255, 0, 0]), 0)));
    registry.register("broken", Box::new(Broken));
    registry.register("shrink", Box::new(Shrink));
    registry.register("last", Box::new(Paint(Rgb([0, 0, 255]), 1)));

    let record = FrameRecord::new(3, 0.1);
    let kinematics = KinematicsEngine::new(&KinematicsConfig::default()).update(&record);
    let calibration = Calibration::unset();
    let trails = TrailBuffer::new();
    let ctx = FrameContext::new(&record, &kinematics, &calibration, &trails, 30.0);

    let out = registry.apply_all(&RgbImage::new(4, 4), &ctx);
    assert_eq!(out.image.dimensions(), (4, 4));
    assert_eq!(*out.image.get_pixel(0, 0), Rgb([255, 0, 0]));
    assert_eq!(*out.image.get_pixel(1, 0), Rgb([0, 0, 255]));

    let failed: Vec<&str> = out.failures().map(|r| r.name.as_str()).collect();
    assert_eq!(failed, ["broken", "shrink"]);
    assert_eq!(out.reports[0].outcome, PassOutcome::Applied);
    assert_eq!(out.reports[3].outcome, PassOutcome::Applied);
}

#[test]
fn test_session_counts_pass_failures() {
    let mut session = Session::new("faulty", pixel_config(), Calibration::unset()).unwrap();
    session.register_pass("broken", Box::new(Broken));
    let image = RgbImage::from_pixel(8, 8, Rgb([9, 9, 9]));
    for i in 0..3 {
        let out = session.process_frame(i, &image, None);
        assert_eq!(out.image.as_raw(), image.as_raw());
    }
    let report = session.finish().unwrap();
    assert_eq!(report.metrics.pass_failures, 3);
    assert_eq!(report.metrics.frames_with_landmarks, 0);
}

#[test]
fn test_export_replay_reproduces_derivatives() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = pixel_config();
    config.subject.height_m = Some(1.75);
    config.kinematics.filter = FilterConfig::SavitzkyGolay {
        window: 7,
        degree: 2,
    };
    config.export.enabled = true;
    config.export.path = dir.path().join("out").join("timeline.json");

    let calibration = Calibration::from_pixel_height(1.75, 250.0);
    let mut session = Session::new("replay", config.clone(), calibration).unwrap();
    let image = RgbImage::new(1280, 720);
    for i in 0..30u64 {
        // drop a few frames in the middle to exercise held entries
        if (12..14).contains(&i) {
            session.process_frame(i, &image, None);
            continue;
        }
        let mut frame = throwing_frame(i);
        frame.landmarks[2].y = 350.0 - 0.8 * (i * i) as f64;
        session.process_frame(i, &image, Some(&frame));
    }
    let report = session.finish().unwrap();
    assert_eq!(report.export_path.as_deref(), Some(config.export.path.as_path()));

    let timeline = Timeline::load(&config.export.path).unwrap();
    assert_eq!(timeline.frame_count, 30);
    assert!(timeline
        .frames
        .windows(2)
        .all(|w| w[0].frame < w[1].frame));
    let err = timeline.replay_error().unwrap();
    assert!(err < 1e-6, "replay error {}", err);
}
