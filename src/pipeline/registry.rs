// src/pipeline/registry.rs
//
// Ordered, fault-isolated chain of visual passes.
//
// Passes run strictly in registry order; each receives the previous pass's
// output. A pass that errors is logged and skipped: its input frame goes to
// the next pass unchanged. The registry is built once from configuration and
// never mutated while frames are flowing.

use super::frame_context::FrameContext;
use crate::config::ConfigError;
use crate::overlay::{GlowTrailPass, HeatmapPass, HudPass, TrailPass, VectorPass};
use crate::types::VisualsConfig;
use anyhow::Result;
use image::RgbImage;
use tracing::{debug, info, warn};

/// A rendering step. Implementations read the context only through shared
/// references and return a new frame.
pub trait VisualPass: Send {
    fn apply(&self, frame: &RgbImage, ctx: &FrameContext) -> Result<RgbImage>;
}

// ============================================================================
// BUILT-IN PASSES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Trail,
    Vectors,
    Heatmap,
    Hud,
    GlowTrail,
}

impl PassKind {
    /// Stacking order used for enabled passes not named in `visuals.order`.
    pub const DEFAULT_ORDER: [PassKind; 5] = [
        Self::Trail,
        Self::Vectors,
        Self::Heatmap,
        Self::Hud,
        Self::GlowTrail,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Trail => "trail",
            Self::Vectors => "vectors",
            Self::Heatmap => "heatmap",
            Self::Hud => "hud",
            Self::GlowTrail => "glow_trail",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::DEFAULT_ORDER
            .iter()
            .copied()
            .find(|kind| kind.name() == name)
    }

    fn is_enabled(self, visuals: &VisualsConfig) -> bool {
        match self {
            Self::Trail => visuals.trail.enabled,
            Self::Vectors => visuals.vectors.enabled,
            Self::Heatmap => visuals.heatmap.enabled,
            Self::Hud => visuals.hud.enabled,
            Self::GlowTrail => visuals.glow_trail.enabled,
        }
    }
}

/// Enabled passes in stacking order: those listed in `visuals.order` first,
/// then the remaining enabled passes in default order. Duplicates collapse.
pub fn resolved_pass_order(visuals: &VisualsConfig) -> Result<Vec<PassKind>, ConfigError> {
    let mut order = Vec::new();
    for name in &visuals.order {
        let kind = PassKind::from_name(name).ok_or_else(|| ConfigError::UnknownPass {
            field: "visuals.order".to_string(),
            name: name.clone(),
        })?;
        if kind.is_enabled(visuals) && !order.contains(&kind) {
            order.push(kind);
        }
    }
    for kind in PassKind::DEFAULT_ORDER {
        if kind.is_enabled(visuals) && !order.contains(&kind) {
            order.push(kind);
        }
    }
    Ok(order)
}

// ============================================================================
// OUTCOMES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    Applied,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct PassReport {
    pub name: String,
    pub outcome: PassOutcome,
}

#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
    pub frame_id: u64,
    pub image: RgbImage,
    pub reports: Vec<PassReport>,
}

impl AnnotatedFrame {
    pub fn failures(&self) -> impl Iterator<Item = &PassReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, PassOutcome::Failed(_)))
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Default)]
pub struct PassRegistry {
    passes: Vec<(String, Box<dyn VisualPass>)>,
}

impl PassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the built-in passes enabled in `visuals`, in resolved order.
    pub fn from_config(visuals: &VisualsConfig) -> Result<Self> {
        let mut registry = Self::new();
        for kind in resolved_pass_order(visuals)? {
            let pass: Box<dyn VisualPass> = match kind {
                PassKind::Trail => Box::new(TrailPass::new(visuals.trail.clone())),
                PassKind::GlowTrail => Box::new(GlowTrailPass::new(visuals.glow_trail.clone())),
                PassKind::Vectors => Box::new(VectorPass::new(visuals.vectors.clone())?),
                PassKind::Heatmap => Box::new(HeatmapPass::new(visuals.heatmap.clone())?),
                PassKind::Hud => Box::new(HudPass::new(visuals.hud.clone())?),
            };
            registry.register(kind.name(), pass);
        }
        info!("Visual passes: [{}]", registry.names().join(", "));
        Ok(registry)
    }

    /// Append a pass. Configuration time only.
    pub fn register(&mut self, name: impl Into<String>, pass: Box<dyn VisualPass>) {
        let name = name.into();
        debug!("registering pass `{}`", name);
        self.passes.push((name, pass));
    }

    pub fn names(&self) -> Vec<&str> {
        self.passes.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn apply_all(&self, frame: &RgbImage, ctx: &FrameContext) -> AnnotatedFrame {
        let mut current = frame.clone();
        let mut reports = Vec::with_capacity(self.passes.len());

        for (name, pass) in &self.passes {
            let outcome = match pass.apply(&current, ctx) {
                Ok(next) if next.dimensions() == current.dimensions() => {
                    current = next;
                    PassOutcome::Applied
                }
                Ok(next) => {
                    let reason = format!(
                        "returned {}x{} frame, expected {}x{}",
                        next.width(),
                        next.height(),
                        current.width(),
                        current.height()
                    );
                    warn!("frame {}: pass `{}` failed: {}", ctx.frame_id, name, reason);
                    PassOutcome::Failed(reason)
                }
                Err(e) => {
                    warn!("frame {}: pass `{}` failed: {:#}", ctx.frame_id, name, e);
                    PassOutcome::Failed(format!("{:#}", e))
                }
            };
            reports.push(PassReport {
                name: name.clone(),
                outcome,
            });
        }

        AnnotatedFrame {
            frame_id: ctx.frame_id,
            image: current,
            reports,
        }
    }
}
