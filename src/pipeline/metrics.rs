// src/pipeline/metrics.rs
//
// Run counters. Cheap to clone; clones share the same counters so a
// producer thread and the session can both report into one set.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SessionMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub frames_with_landmarks: Arc<AtomicU64>,
    pub points_reset: Arc<AtomicU64>,
    pub pass_failures: Arc<AtomicU64>,
    /// Frames that could not be read or written.
    pub frame_errors: Arc<AtomicU64>,
    pub timeline_entries: Arc<AtomicU64>,
    pub render_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMetrics {
    pub fn new() -> Self {
        let counter = || Arc::new(AtomicU64::new(0));
        Self {
            total_frames: counter(),
            frames_with_landmarks: counter(),
            points_reset: counter(),
            pass_failures: counter(),
            frame_errors: counter(),
            timeline_entries: counter(),
            render_time_us: counter(),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Accumulate the time spent on one frame.
    pub fn record_render(&self, elapsed: Duration) {
        self.add(&self.render_time_us, elapsed.as_micros() as u64);
    }

    fn load(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Frames per second of wall time since the session started.
    pub fn fps(&self) -> f64 {
        let secs = self.started_at.elapsed().as_secs_f64();
        match Self::load(&self.total_frames) {
            0 => 0.0,
            n if secs > 0.0 => n as f64 / secs,
            _ => 0.0,
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let frames = Self::load(&self.total_frames);
        MetricsSummary {
            total_frames: frames,
            fps: self.fps(),
            frames_with_landmarks: Self::load(&self.frames_with_landmarks),
            points_reset: Self::load(&self.points_reset),
            pass_failures: Self::load(&self.pass_failures),
            frame_errors: Self::load(&self.frame_errors),
            timeline_entries: Self::load(&self.timeline_entries),
            avg_render_us: Self::load(&self.render_time_us) / frames.max(1),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub fps: f64,
    pub frames_with_landmarks: u64,
    pub points_reset: u64,
    pub pass_failures: u64,
    pub frame_errors: u64,
    pub timeline_entries: u64,
    /// Mean per-frame processing time (engine, trails, passes, export).
    pub avg_render_us: u64,
    pub elapsed_secs: f64,
}
