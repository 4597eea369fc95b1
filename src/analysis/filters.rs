// src/analysis/filters.rs
//
// Per-point smoothing filters. Each filter consumes raw samples tagged with
// their frame index and emits a smoothed position plus first and second
// derivatives in units per second.
//
//   EMA            O(1) state, derivatives by finite differences of the
//                  smoothed track. First sample: velocity = acceleration = 0.
//
//   Savitzky–Golay least-squares polynomial over the last N raw samples,
//                  evaluated at the window center. Sample times are the real
//                  frame offsets, so a held gap does not distort the fit.
//                  No derivatives until the window is full.

use crate::types::{FilterConfig, Vec2};
use std::collections::VecDeque;

/// Output of one filter step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSample {
    pub smoothed: Vec2,
    pub velocity: Option<Vec2>,
    pub acceleration: Option<Vec2>,
}

#[derive(Debug, Clone)]
pub enum PointFilter {
    Ema(EmaFilter),
    SavitzkyGolay(SavitzkyGolayFilter),
}

impl PointFilter {
    pub fn from_config(config: &FilterConfig) -> Self {
        match *config {
            FilterConfig::Ema { alpha } => Self::Ema(EmaFilter::new(alpha)),
            FilterConfig::SavitzkyGolay { window, degree } => {
                Self::SavitzkyGolay(SavitzkyGolayFilter::new(window, degree))
            }
        }
    }

    /// Feed one raw sample. `frame` must be strictly greater than the frame
    /// of the previous sample since the last reset.
    pub fn push(&mut self, frame: u64, raw: Vec2, fps: f64) -> FilterSample {
        match self {
            Self::Ema(f) => f.push(frame, raw, fps),
            Self::SavitzkyGolay(f) => f.push(frame, raw, fps),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Self::Ema(f) => f.reset(),
            Self::SavitzkyGolay(f) => f.reset(),
        }
    }

    /// Samples required before derivatives are available.
    pub fn warmup_len(&self) -> usize {
        match self {
            Self::Ema(_) => 1,
            Self::SavitzkyGolay(f) => f.window,
        }
    }
}

// ============================================================================
// EMA
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct EmaState {
    smoothed: Vec2,
    velocity: Vec2,
    frame: u64,
}

#[derive(Debug, Clone)]
pub struct EmaFilter {
    alpha: f64,
    state: Option<EmaState>,
}

impl EmaFilter {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, state: None }
    }

    pub fn push(&mut self, frame: u64, raw: Vec2, fps: f64) -> FilterSample {
        let Some(prev) = self.state else {
            self.state = Some(EmaState {
                smoothed: raw,
                velocity: Vec2::ZERO,
                frame,
            });
            return FilterSample {
                smoothed: raw,
                velocity: Some(Vec2::ZERO),
                acceleration: Some(Vec2::ZERO),
            };
        };

        let dt = frame.saturating_sub(prev.frame) as f64 / fps;
        if dt <= 0.0 {
            return FilterSample {
                smoothed: prev.smoothed,
                velocity: Some(prev.velocity),
                acceleration: None,
            };
        }

        let smoothed = raw * self.alpha + prev.smoothed * (1.0 - self.alpha);
        let velocity = (smoothed - prev.smoothed) / dt;
        let acceleration = (velocity - prev.velocity) / dt;

        self.state = Some(EmaState {
            smoothed,
            velocity,
            frame,
        });

        FilterSample {
            smoothed,
            velocity: Some(velocity),
            acceleration: Some(acceleration),
        }
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}

// ============================================================================
// SAVITZKY–GOLAY (windowed least squares)
// ============================================================================

#[derive(Debug, Clone)]
pub struct SavitzkyGolayFilter {
    window: usize,
    degree: usize,
    samples: VecDeque<(u64, Vec2)>,
}

impl SavitzkyGolayFilter {
    pub fn new(window: usize, degree: usize) -> Self {
        Self {
            window,
            degree,
            samples: VecDeque::with_capacity(window),
        }
    }

    pub fn push(&mut self, frame: u64, raw: Vec2, fps: f64) -> FilterSample {
        self.samples.push_back((frame, raw));
        while self.samples.len() > self.window {
            self.samples.pop_front();
        }

        let warming = FilterSample {
            smoothed: raw,
            velocity: None,
            acceleration: None,
        };
        if self.samples.len() < self.window {
            return warming;
        }

        match self.fit(fps) {
            Some(sample) => sample,
            None => warming,
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    /// Fit x(t), y(t) with t in frames relative to the center sample, then
    /// rescale the derivative coefficients to seconds.
    fn fit(&self, fps: f64) -> Option<FilterSample> {
        let center = self.samples.get(self.window / 2)?.0 as f64;
        let n = self.degree + 1;

        // Normal equations: (TᵀT) c = Tᵀy, two right-hand sides (x and y).
        let mut normal = vec![0.0f64; n * n];
        let mut rhs = vec![[0.0f64; 2]; n];
        let mut powers = vec![0.0f64; 2 * n - 1];

        for &(frame, p) in &self.samples {
            let t = frame as f64 - center;
            let mut tp = 1.0;
            for power in powers.iter_mut() {
                *power = tp;
                tp *= t;
            }
            for row in 0..n {
                for col in 0..n {
                    normal[row * n + col] += powers[row + col];
                }
                rhs[row][0] += powers[row] * p.x;
                rhs[row][1] += powers[row] * p.y;
            }
        }

        let coeffs = solve_gauss_jordan(&mut normal, &mut rhs, n)?;

        let smoothed = Vec2::new(coeffs[0][0], coeffs[0][1]);
        let velocity = if n > 1 {
            Vec2::new(coeffs[1][0], coeffs[1][1]) * fps
        } else {
            Vec2::ZERO
        };
        let acceleration = if n > 2 {
            Vec2::new(coeffs[2][0], coeffs[2][1]) * (2.0 * fps * fps)
        } else {
            Vec2::ZERO
        };

        if !(smoothed.is_finite() && velocity.is_finite() && acceleration.is_finite()) {
            return None;
        }

        Some(FilterSample {
            smoothed,
            velocity: Some(velocity),
            acceleration: Some(acceleration),
        })
    }
}

/// Solve `A X = B` in place for an n×n row-major `A` and two-column `B`.
/// Partial pivoting; returns `None` when `A` is (numerically) singular.
fn solve_gauss_jordan(a: &mut [f64], b: &mut [[f64; 2]], n: usize) -> Option<Vec<[f64; 2]>> {
    for col in 0..n {
        let pivot_row = (col..n).max_by(|&r1, &r2| {
            a[r1 * n + col]
                .abs()
                .partial_cmp(&a[r2 * n + col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;

        let pivot = a[pivot_row * n + col];
        if pivot.abs() < 1e-12 {
            return None;
        }

        if pivot_row != col {
            for k in 0..n {
                a.swap(col * n + k, pivot_row * n + k);
            }
            b.swap(col, pivot_row);
        }

        let inv = 1.0 / a[col * n + col];
        for k in 0..n {
            a[col * n + k] *= inv;
        }
        b[col][0] *= inv;
        b[col][1] *= inv;

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[row * n + col];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                a[row * n + k] -= factor * a[col * n + k];
            }
            b[row][0] -= factor * b[col][0];
            b[row][1] -= factor * b[col][1];
        }
    }

    Some(b.to_vec())
}
