mod stages;

pub use stages::RetrievalContext;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::{
    config::PipelineTuning,
    error::AppError,
    types::{FusedList, Query},
};
use tracing::info;

use crate::{invocation::InvocationQueue, AnchorIndex, SearchIndex};
use stages::{CollectStage, FuseStage, RewriteStage};

// Stage type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Rewrite,
    Collect,
    Fuse,
}

// Pipeline stage trait
#[async_trait]
pub trait PipelineStage: Send + Sync {
    fn kind(&self) -> StageKind;
    async fn execute(&self, ctx: &mut RetrievalContext<'_>) -> Result<(), AppError>;
}

// Type alias for boxed stages
pub type BoxedStage = Box<dyn PipelineStage>;

// Pipeline stage timings tracker
#[derive(Debug, Default, Clone)]
pub struct PipelineStageTimings {
    timings: Vec<(StageKind, Duration)>,
}

impl PipelineStageTimings {
    pub fn record(&mut self, kind: StageKind, duration: Duration) {
        self.timings.push((kind, duration));
    }

    pub fn into_vec(self) -> Vec<(StageKind, Duration)> {
        self.timings
    }

    fn get_stage_ms(&self, kind: StageKind) -> u128 {
        self.timings
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, d)| d.as_millis())
            .unwrap_or(0)
    }

    pub fn rewrite_ms(&self) -> u128 {
        self.get_stage_ms(StageKind::Rewrite)
    }

    pub fn collect_ms(&self) -> u128 {
        self.get_stage_ms(StageKind::Collect)
    }

    pub fn fuse_ms(&self) -> u128 {
        self.get_stage_ms(StageKind::Fuse)
    }
}

/// Collaborators one retrieval run needs; all external state lives behind
/// these references.
pub struct RetrievalDeps<'a> {
    pub dense: &'a dyn SearchIndex,
    pub sparse: &'a dyn SearchIndex,
    pub anchors: &'a dyn AnchorIndex,
    pub queue: &'a InvocationQueue,
}

/// Output of one retrieval run.
pub struct RetrievalRun {
    pub fused: FusedList,
    pub rewrites_used: usize,
    pub stage_timings: PipelineStageTimings,
}

/// Run the retrieval side of the pipeline: rewrite, collect per facet,
/// fuse. Stages execute strictly in order; no stage starts before its
/// predecessor's full output exists.
pub async fn run_retrieval(
    deps: RetrievalDeps<'_>,
    query: Query,
    tuning: &PipelineTuning,
) -> Result<RetrievalRun, AppError> {
    let input_chars = query.text.chars().count();
    let preview: String = query.text.chars().take(120).collect();
    let preview_clean = preview.replace('\n', " ");
    info!(
        query_id = %query.id,
        input_chars,
        preview = %preview_clean,
        "Starting retrieval pipeline"
    );

    let mut ctx = RetrievalContext::new(deps, query, tuning);
    let stages: Vec<BoxedStage> = vec![
        Box::new(RewriteStage),
        Box::new(CollectStage),
        Box::new(FuseStage),
    ];

    for stage in stages {
        let start = Instant::now();
        stage.execute(&mut ctx).await?;
        ctx.record_stage_duration(stage.kind(), start.elapsed());
    }

    Ok(ctx.into_run())
}
