use std::fmt;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Named tuning presets resolving the thresholds that differ between the
/// precision-leaning and recall-leaning production configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TuningProfile {
    /// Tighter redundancy collapse and one claim per source chunk.
    #[default]
    PrecisionFavoring,
    /// Looser redundancy collapse, two claims per source chunk.
    RecallFavoring,
}

impl std::str::FromStr for TuningProfile {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "precision" | "precision_favoring" | "precision-favoring" => {
                Ok(Self::PrecisionFavoring)
            }
            "recall" | "recall_favoring" | "recall-favoring" => Ok(Self::RecallFavoring),
            other => Err(format!("unknown tuning profile '{other}'")),
        }
    }
}

impl fmt::Display for TuningProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TuningProfile::PrecisionFavoring => "precision_favoring",
            TuningProfile::RecallFavoring => "recall_favoring",
        };
        f.write_str(label)
    }
}

/// How the evidence selector chooses the keep-set for a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Keep only links clearing a signal floor, capped at the claim top-k.
    #[default]
    Threshold,
    /// Keep the highest-confidence links up to a fixed target size.
    DynamicTarget,
}

/// Tunable parameters governing every pipeline stage. All thresholds are
/// validated once at configuration load; stages assume they are in range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineTuning {
    /// Maximum facet rewrites requested from the model.
    #[serde(default = "default_rewrite_k")]
    pub rewrite_k: usize,
    /// Facet rewrites retained after yield scoring.
    #[serde(default = "default_rewrite_keep")]
    pub rewrite_keep: usize,
    /// Minimum yield over the base query for a facet to survive.
    #[serde(default = "default_rewrite_yield_min")]
    pub rewrite_yield_min: f32,
    /// Relaxed yield floor when the base query itself returns few hits.
    #[serde(default = "default_rewrite_yield_min_sparse")]
    pub rewrite_yield_min_sparse: f32,
    /// Base-query hit count below which the sparse-case floor applies.
    #[serde(default = "default_sparse_hit_threshold")]
    pub sparse_hit_threshold: usize,
    /// Hits fetched per facet when probing for yield.
    #[serde(default = "default_rewrite_probe_take")]
    pub rewrite_probe_take: usize,
    /// Candidates fetched from the dense index per facet.
    #[serde(default = "default_dense_take")]
    pub dense_take: usize,
    /// Candidates fetched from the sparse index per facet.
    #[serde(default = "default_sparse_take")]
    pub sparse_take: usize,
    /// Reciprocal rank fusion constant; larger flattens top-rank advantage.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,
    /// Multiplicative boost for anchor-flagged candidates.
    #[serde(default = "default_anchor_boost")]
    pub anchor_boost: f32,
    /// Downweight for non-base-facet candidates without an anchor flag.
    #[serde(default = "default_facet_downweight_no_anchor")]
    pub facet_downweight_no_anchor: f32,
    /// Maximum fused candidates contributed by a single document.
    #[serde(default = "default_per_doc_line_cap")]
    pub per_doc_line_cap: usize,
    /// Lexical Jaccard floor for a strong evidence link.
    #[serde(default = "default_evidence_jaccard")]
    pub evidence_jaccard: f32,
    /// Claim-token coverage floor for a strong evidence link.
    #[serde(default = "default_evidence_coverage")]
    pub evidence_coverage: f32,
    /// Cosine floor for a semantically strong evidence link.
    #[serde(default = "default_cos_floor")]
    pub cos_floor: f32,
    /// N-gram overlap floor for a semantically strong evidence link.
    #[serde(default = "default_rouge_floor")]
    pub rouge_floor: f32,
    /// Evidence items bound per claim.
    #[serde(default = "default_claim_topk")]
    pub claim_topk: usize,
    /// Evidence items bound per already-well-supported claim.
    #[serde(default = "default_claim_topk_strong")]
    pub claim_topk_strong: usize,
    /// Confidence blend weight on cosine similarity.
    #[serde(default = "default_confidence_weight_cosine")]
    pub confidence_weight_cosine: f32,
    /// Confidence blend weight on the anchor flag.
    #[serde(default = "default_confidence_weight_anchor")]
    pub confidence_weight_anchor: f32,
    /// Confidence blend weight on span overlap.
    #[serde(default = "default_confidence_weight_span")]
    pub confidence_weight_span: f32,
    /// Keep-set policy for the evidence selector.
    #[serde(default)]
    pub selection_policy: SelectionPolicy,
    /// Keep-set size under the dynamic-target policy.
    #[serde(default = "default_selection_target")]
    pub selection_target: usize,
    /// Distinct evidence items that must repeat a number in a numeric claim.
    #[serde(default = "default_multi_evidence_for_numeric")]
    pub multi_evidence_for_numeric: usize,
    /// Distinct evidence items that must repeat an entity in an entity claim.
    #[serde(default = "default_multi_evidence_for_entity")]
    pub multi_evidence_for_entity: usize,
    /// Remove unsupported claims entirely instead of flagging them.
    #[serde(default)]
    pub drop_unsupported: bool,
    /// Minimum words the composed answer keeps after dropping.
    #[serde(default = "default_min_words_after_binding")]
    pub min_words_after_binding: usize,
    /// Trigram similarity above which two kept claims collapse into one.
    #[serde(default = "default_redundancy_trigram_max")]
    pub redundancy_trigram_max: f32,
    /// Kept claims allowed to cite the same source chunk.
    #[serde(default = "default_per_chunk_cap")]
    pub per_chunk_cap: usize,
    /// New anchor references each kept claim must introduce.
    #[serde(default = "default_unique_anchor_min")]
    pub unique_anchor_min: usize,
}

impl Default for PipelineTuning {
    fn default() -> Self {
        Self {
            rewrite_k: default_rewrite_k(),
            rewrite_keep: default_rewrite_keep(),
            rewrite_yield_min: default_rewrite_yield_min(),
            rewrite_yield_min_sparse: default_rewrite_yield_min_sparse(),
            sparse_hit_threshold: default_sparse_hit_threshold(),
            rewrite_probe_take: default_rewrite_probe_take(),
            dense_take: default_dense_take(),
            sparse_take: default_sparse_take(),
            rrf_k: default_rrf_k(),
            anchor_boost: default_anchor_boost(),
            facet_downweight_no_anchor: default_facet_downweight_no_anchor(),
            per_doc_line_cap: default_per_doc_line_cap(),
            evidence_jaccard: default_evidence_jaccard(),
            evidence_coverage: default_evidence_coverage(),
            cos_floor: default_cos_floor(),
            rouge_floor: default_rouge_floor(),
            claim_topk: default_claim_topk(),
            claim_topk_strong: default_claim_topk_strong(),
            confidence_weight_cosine: default_confidence_weight_cosine(),
            confidence_weight_anchor: default_confidence_weight_anchor(),
            confidence_weight_span: default_confidence_weight_span(),
            selection_policy: SelectionPolicy::default(),
            selection_target: default_selection_target(),
            multi_evidence_for_numeric: default_multi_evidence_for_numeric(),
            multi_evidence_for_entity: default_multi_evidence_for_entity(),
            drop_unsupported: false,
            min_words_after_binding: default_min_words_after_binding(),
            redundancy_trigram_max: default_redundancy_trigram_max(),
            per_chunk_cap: default_per_chunk_cap(),
            unique_anchor_min: default_unique_anchor_min(),
        }
    }
}

impl PipelineTuning {
    /// Defaults for a named profile. The profiles only diverge on the
    /// redundancy thresholds; everything else shares the common defaults.
    pub fn for_profile(profile: TuningProfile) -> Self {
        let mut tuning = Self::default();
        match profile {
            TuningProfile::PrecisionFavoring => {
                tuning.redundancy_trigram_max = 0.40;
                tuning.per_chunk_cap = 1;
            }
            TuningProfile::RecallFavoring => {
                tuning.redundancy_trigram_max = 0.45;
                tuning.per_chunk_cap = 2;
            }
        }
        tuning
    }

    /// Reject out-of-range thresholds before any stage runs.
    pub fn validate(&self) -> Result<(), AppError> {
        fn unit_range(name: &str, value: f32) -> Result<(), AppError> {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(AppError::Validation(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
            Ok(())
        }
        fn positive(name: &str, value: f32) -> Result<(), AppError> {
            if !value.is_finite() || value <= 0.0 {
                return Err(AppError::Validation(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
            Ok(())
        }
        fn nonzero(name: &str, value: usize) -> Result<(), AppError> {
            if value == 0 {
                return Err(AppError::Validation(format!("{name} must be at least 1")));
            }
            Ok(())
        }

        unit_range("evidence_jaccard", self.evidence_jaccard)?;
        unit_range("evidence_coverage", self.evidence_coverage)?;
        unit_range("cos_floor", self.cos_floor)?;
        unit_range("rouge_floor", self.rouge_floor)?;
        unit_range("redundancy_trigram_max", self.redundancy_trigram_max)?;
        unit_range(
            "facet_downweight_no_anchor",
            self.facet_downweight_no_anchor,
        )?;
        unit_range("confidence_weight_cosine", self.confidence_weight_cosine)?;
        unit_range("confidence_weight_anchor", self.confidence_weight_anchor)?;
        unit_range("confidence_weight_span", self.confidence_weight_span)?;

        positive("rrf_k", self.rrf_k)?;
        positive("anchor_boost", self.anchor_boost)?;
        positive("rewrite_yield_min", self.rewrite_yield_min)?;
        positive("rewrite_yield_min_sparse", self.rewrite_yield_min_sparse)?;

        nonzero("per_doc_line_cap", self.per_doc_line_cap)?;
        nonzero("per_chunk_cap", self.per_chunk_cap)?;
        nonzero("claim_topk", self.claim_topk)?;
        nonzero("dense_take", self.dense_take)?;
        nonzero("sparse_take", self.sparse_take)?;
        nonzero("rewrite_probe_take", self.rewrite_probe_take)?;
        nonzero("selection_target", self.selection_target)?;

        if self.claim_topk_strong < self.claim_topk {
            return Err(AppError::Validation(format!(
                "claim_topk_strong ({}) must not be below claim_topk ({})",
                self.claim_topk_strong, self.claim_topk
            )));
        }

        let weight_sum = self.confidence_weight_cosine
            + self.confidence_weight_anchor
            + self.confidence_weight_span;
        if (weight_sum - 1.0).abs() > 0.01 {
            return Err(AppError::Validation(format!(
                "claim confidence weights must sum to 1.0, got {weight_sum}"
            )));
        }

        Ok(())
    }
}

/// Throughput and retry behavior of the invocation queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Simultaneous in-flight calls to the completion backend.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Sustained request rate in requests per second.
    #[serde(default = "default_max_rps")]
    pub max_rps: f64,
    /// Token-bucket capacity; one means no bursting.
    #[serde(default = "default_burst")]
    pub burst: f64,
    /// Seconds no new dispatch starts after a throttling response.
    #[serde(default = "default_cooldown_sec")]
    pub cooldown_sec: u64,
    /// Base of the exponential backoff schedule.
    #[serde(default = "default_retry_base")]
    pub retry_base: u64,
    /// Multiplier applied to the backoff schedule, in milliseconds.
    #[serde(default = "default_retry_factor_ms")]
    pub retry_factor_ms: u64,
    /// Ceiling on a single backoff sleep, in seconds.
    #[serde(default = "default_retry_max_sleep_sec")]
    pub retry_max_sleep_sec: u64,
    /// Recoverable failures retried before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            max_rps: default_max_rps(),
            burst: default_burst(),
            cooldown_sec: default_cooldown_sec(),
            retry_base: default_retry_base(),
            retry_factor_ms: default_retry_factor_ms(),
            retry_max_sleep_sec: default_retry_max_sleep_sec(),
            max_retries: default_max_retries(),
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_in_flight == 0 {
            return Err(AppError::Validation(
                "max_in_flight must be at least 1".to_string(),
            ));
        }
        if !self.max_rps.is_finite() || self.max_rps <= 0.0 {
            return Err(AppError::Validation(format!(
                "max_rps must be positive and finite, got {}",
                self.max_rps
            )));
        }
        if !self.burst.is_finite() || self.burst < 1.0 {
            return Err(AppError::Validation(format!(
                "burst must be at least 1.0, got {}",
                self.burst
            )));
        }
        if self.retry_base < 2 {
            return Err(AppError::Validation(format!(
                "retry_base must be at least 2, got {}",
                self.retry_base
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_completion_model")]
    pub completion_model: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub profile: TuningProfile,
    /// Explicit tuning overrides; absent means the profile defaults.
    #[serde(default)]
    pub tuning: Option<PipelineTuning>,
    #[serde(default)]
    pub queue: QueueConfig,
}

impl AppConfig {
    /// Tuning in effect for this process: explicit overrides when present,
    /// otherwise the profile defaults.
    pub fn tuning(&self) -> PipelineTuning {
        self.tuning
            .clone()
            .unwrap_or_else(|| PipelineTuning::for_profile(self.profile))
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

pub fn get_config() -> Result<AppConfig, AppError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(AppError::Config)?;
    app_config.tuning().validate()?;
    app_config.queue.validate()?;
    Ok(app_config)
}

const fn default_rewrite_k() -> usize {
    3
}

const fn default_rewrite_keep() -> usize {
    1
}

const fn default_rewrite_yield_min() -> f32 {
    1.5
}

const fn default_rewrite_yield_min_sparse() -> f32 {
    1.2
}

const fn default_sparse_hit_threshold() -> usize {
    2
}

const fn default_rewrite_probe_take() -> usize {
    10
}

const fn default_dense_take() -> usize {
    20
}

const fn default_sparse_take() -> usize {
    20
}

const fn default_rrf_k() -> f32 {
    50.0
}

const fn default_anchor_boost() -> f32 {
    1.8
}

const fn default_facet_downweight_no_anchor() -> f32 {
    0.75
}

const fn default_per_doc_line_cap() -> usize {
    8
}

const fn default_evidence_jaccard() -> f32 {
    0.07
}

const fn default_evidence_coverage() -> f32 {
    0.20
}

const fn default_cos_floor() -> f32 {
    0.58
}

const fn default_rouge_floor() -> f32 {
    0.20
}

const fn default_claim_topk() -> usize {
    2
}

const fn default_claim_topk_strong() -> usize {
    3
}

const fn default_confidence_weight_cosine() -> f32 {
    0.4
}

const fn default_confidence_weight_anchor() -> f32 {
    0.3
}

const fn default_confidence_weight_span() -> f32 {
    0.3
}

const fn default_selection_target() -> usize {
    6
}

const fn default_multi_evidence_for_numeric() -> usize {
    2
}

const fn default_multi_evidence_for_entity() -> usize {
    2
}

const fn default_min_words_after_binding() -> usize {
    150
}

const fn default_redundancy_trigram_max() -> f32 {
    0.40
}

const fn default_per_chunk_cap() -> usize {
    1
}

const fn default_unique_anchor_min() -> usize {
    1
}

const fn default_max_in_flight() -> usize {
    1
}

const fn default_max_rps() -> f64 {
    0.2
}

const fn default_burst() -> f64 {
    1.0
}

const fn default_cooldown_sec() -> u64 {
    10
}

const fn default_retry_base() -> u64 {
    2
}

const fn default_retry_factor_ms() -> u64 {
    500
}

const fn default_retry_max_sleep_sec() -> u64 {
    30
}

const fn default_max_retries() -> usize {
    5
}
