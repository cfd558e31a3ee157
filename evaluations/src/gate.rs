//! The promotion gate: a conjunction of metric floors. Every configured
//! floor must hold simultaneously; one strong metric never masks a
//! regression in another.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::metrics::RunMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum GatePreset {
    /// Floors the current production baseline must hold.
    Baseline,
    /// Stricter targets for promoting a new configuration.
    Climb,
}

impl std::fmt::Display for GatePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Baseline => write!(f, "baseline"),
            Self::Climb => write!(f, "climb"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateThresholds {
    pub precision_min: f64,
    pub recall_min: f64,
    pub f1_min: f64,
    pub faithfulness_min: Option<f64>,
    pub unsupported_max_percent: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateOutcome {
    pub promoted: bool,
    pub violations: Vec<String>,
}

impl GateThresholds {
    pub fn baseline() -> Self {
        Self {
            precision_min: 0.135,
            recall_min: 0.16,
            f1_min: 0.145,
            faithfulness_min: None,
            unsupported_max_percent: None,
        }
    }

    pub fn climb() -> Self {
        Self {
            precision_min: 0.20,
            recall_min: 0.65,
            f1_min: 0.175,
            faithfulness_min: Some(0.60),
            unsupported_max_percent: Some(15.0),
        }
    }

    pub fn for_preset(preset: GatePreset) -> Self {
        match preset {
            GatePreset::Baseline => Self::baseline(),
            GatePreset::Climb => Self::climb(),
        }
    }

    pub fn evaluate(&self, metrics: &RunMetrics) -> GateOutcome {
        let mut violations = Vec::new();

        if metrics.precision < self.precision_min {
            violations.push(format!(
                "precision {:.3} below floor {:.3}",
                metrics.precision, self.precision_min
            ));
        }
        if metrics.recall < self.recall_min {
            violations.push(format!(
                "recall {:.3} below floor {:.3}",
                metrics.recall, self.recall_min
            ));
        }
        if metrics.f1 < self.f1_min {
            violations.push(format!(
                "f1 {:.3} below floor {:.3}",
                metrics.f1, self.f1_min
            ));
        }
        if let Some(floor) = self.faithfulness_min {
            if metrics.faithfulness < floor {
                violations.push(format!(
                    "faithfulness {:.3} below floor {floor:.3}",
                    metrics.faithfulness
                ));
            }
        }
        if let Some(ceiling) = self.unsupported_max_percent {
            if metrics.unsupported_percent > ceiling {
                violations.push(format!(
                    "unsupported {:.1}% above ceiling {ceiling:.1}%",
                    metrics.unsupported_percent
                ));
            }
        }

        GateOutcome {
            promoted: violations.is_empty(),
            violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passing_metrics() -> RunMetrics {
        RunMetrics {
            runs: 10,
            precision: 0.25,
            recall: 0.70,
            f1: 0.30,
            faithfulness: 0.80,
            unsupported_percent: 10.0,
            anchor_coverage: 0.5,
            fusion_gain: 0.1,
            promoted: false,
        }
    }

    #[test]
    fn all_floors_met_promotes() {
        let outcome = GateThresholds::climb().evaluate(&passing_metrics());
        assert!(outcome.promoted);
        assert!(outcome.violations.is_empty());
    }

    #[test]
    fn any_single_violation_blocks_promotion() {
        let thresholds = GateThresholds::climb();

        let mut low_recall = passing_metrics();
        low_recall.recall = 0.10;
        let outcome = thresholds.evaluate(&low_recall);
        assert!(!outcome.promoted);
        assert_eq!(outcome.violations.len(), 1);
        assert!(outcome.violations[0].contains("recall"));

        let mut too_unsupported = passing_metrics();
        too_unsupported.unsupported_percent = 40.0;
        assert!(!thresholds.evaluate(&too_unsupported).promoted);
    }

    #[test]
    fn baseline_preset_skips_optional_floors() {
        let mut metrics = passing_metrics();
        metrics.faithfulness = 0.0;
        metrics.unsupported_percent = 99.0;
        let outcome = GateThresholds::baseline().evaluate(&metrics);
        assert!(outcome.promoted, "baseline has no faithfulness floor");
    }
}
