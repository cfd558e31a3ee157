use async_trait::async_trait;
use common::{
    config::PipelineTuning,
    error::AppError,
    types::{Candidate, FusedList, Query, Rewrite},
};
use futures::{stream::FuturesUnordered, StreamExt};
use tracing::debug;

use crate::{
    fusion::{self, FacetLists, FusionConfig},
    rewriter::QueryRewriter,
    SearchHit,
};

use super::{PipelineStage, PipelineStageTimings, RetrievalDeps, RetrievalRun, StageKind};

pub struct RetrievalContext<'a> {
    pub deps: RetrievalDeps<'a>,
    pub query: Query,
    pub tuning: &'a PipelineTuning,
    pub rewrites: Vec<Rewrite>,
    pub collected: Vec<FacetLists>,
    pub fused: FusedList,
    stage_timings: PipelineStageTimings,
}

impl<'a> RetrievalContext<'a> {
    pub fn new(deps: RetrievalDeps<'a>, query: Query, tuning: &'a PipelineTuning) -> Self {
        Self {
            deps,
            query,
            tuning,
            rewrites: Vec::new(),
            collected: Vec::new(),
            fused: FusedList::default(),
            stage_timings: PipelineStageTimings::default(),
        }
    }

    pub fn record_stage_duration(&mut self, kind: StageKind, duration: std::time::Duration) {
        self.stage_timings.record(kind, duration);
    }

    pub fn into_run(self) -> RetrievalRun {
        RetrievalRun {
            fused: self.fused,
            rewrites_used: self.rewrites.len(),
            stage_timings: self.stage_timings,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RewriteStage;

#[async_trait]
impl PipelineStage for RewriteStage {
    fn kind(&self) -> StageKind {
        StageKind::Rewrite
    }

    async fn execute(&self, ctx: &mut RetrievalContext<'_>) -> Result<(), AppError> {
        let rewriter = QueryRewriter::new(ctx.deps.queue, ctx.deps.sparse, ctx.tuning);
        ctx.rewrites = rewriter.expand(&ctx.query).await?;
        debug!(
            rewrites = ctx.rewrites.len(),
            "query expansion produced facets"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CollectStage;

#[async_trait]
impl PipelineStage for CollectStage {
    fn kind(&self) -> StageKind {
        StageKind::Collect
    }

    async fn execute(&self, ctx: &mut RetrievalContext<'_>) -> Result<(), AppError> {
        let tuning = ctx.tuning;

        // Facet lookups run concurrently; slots keyed by facet position
        // keep the output order independent of completion order.
        let mut futures = FuturesUnordered::new();
        for (position, rewrite) in ctx.rewrites.iter().enumerate() {
            let dense = ctx.deps.dense;
            let sparse = ctx.deps.sparse;
            futures.push(async move {
                let pair = tokio::try_join!(
                    dense.search(&rewrite.text, tuning.dense_take),
                    sparse.search(&rewrite.text, tuning.sparse_take),
                )?;
                Ok::<_, AppError>((position, pair))
            });
        }

        let mut slots: Vec<Option<FacetLists>> = (0..ctx.rewrites.len()).map(|_| None).collect();
        while let Some(result) = futures.next().await {
            let (position, (dense_hits, sparse_hits)) = result?;
            let Some(rewrite) = ctx.rewrites.get(position) else {
                continue;
            };
            debug!(
                facet = rewrite.facet.as_str(),
                dense = dense_hits.len(),
                sparse = sparse_hits.len(),
                "facet candidate counts"
            );
            if let Some(slot) = slots.get_mut(position) {
                *slot = Some(FacetLists {
                    facet: rewrite.facet.clone(),
                    is_base: rewrite.is_base,
                    dense: into_scored_candidates(dense_hits, rewrite, &ctx.deps),
                    sparse: into_scored_candidates(sparse_hits, rewrite, &ctx.deps),
                });
            }
        }
        drop(futures);

        ctx.collected = slots.into_iter().flatten().collect();
        Ok(())
    }
}

fn into_scored_candidates(
    hits: Vec<SearchHit>,
    rewrite: &Rewrite,
    deps: &RetrievalDeps<'_>,
) -> Vec<(Candidate, f32)> {
    hits.into_iter()
        .map(|hit| {
            let is_anchor = deps.anchors.is_anchor(&hit.doc_id, &hit.chunk_id);
            (
                Candidate {
                    doc_id: hit.doc_id,
                    chunk_id: hit.chunk_id,
                    line_start: hit.line_start,
                    line_end: hit.line_end,
                    is_anchor,
                    facet: rewrite.facet.clone(),
                    text: hit.text,
                    embedding: hit.embedding,
                },
                hit.score,
            )
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct FuseStage;

#[async_trait]
impl PipelineStage for FuseStage {
    fn kind(&self) -> StageKind {
        StageKind::Fuse
    }

    async fn execute(&self, ctx: &mut RetrievalContext<'_>) -> Result<(), AppError> {
        let config = FusionConfig::from(ctx.tuning);
        ctx.fused = fusion::fuse(std::mem::take(&mut ctx.collected), &config);
        Ok(())
    }
}
