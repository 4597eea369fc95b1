// src/pipeline/mod.rs

pub mod frame_context;
pub mod lookahead;
pub mod metrics;
pub mod registry;
pub mod session;

pub use frame_context::FrameContext;
pub use lookahead::LookaheadSource;
pub use metrics::{MetricsSummary, SessionMetrics};
pub use registry::{AnnotatedFrame, PassKind, PassOutcome, PassRegistry, PassReport, VisualPass};
pub use session::{run_variants, Session, SessionReport, VariantJob};
