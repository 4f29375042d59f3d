//! Transform (§4.D), the cleaning-pipeline Orchestrator (§4.L), and the
//! Study Engine (§4.H-§4.K). Bridges `cortex_core`'s pure algorithms to the
//! `cortex_ports` storage traits.

pub mod orchestrator;
pub mod rewriter;
pub mod study;
pub mod transform;

pub use orchestrator::{
    Orchestrator, PipelineStatus, RunOptions, StageSummary, STAGE_ANALYZE, STAGE_DETECT,
    STAGE_ENQUEUE_REWRITE, STAGE_TRANSFORM,
};
pub use rewriter::{EnqueueOutcome, Rewriter};
pub use study::{RecordResponseInput, RecordResponseOutcome, StudyEngine};
pub use transform::{transform_batch, TransformOutcome};
