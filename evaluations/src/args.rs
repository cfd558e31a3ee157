use std::path::PathBuf;

use clap::Parser;

use crate::gate::{GatePreset, GateThresholds};

fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir.parent().unwrap_or(&manifest_dir).to_path_buf()
}

fn default_report_dir() -> PathBuf {
    workspace_root().join("evaluations/reports")
}

#[derive(Debug, Parser)]
#[command(
    name = "evaluations",
    about = "Aggregate pipeline run traces into metrics and evaluate the promotion gate"
)]
pub struct Config {
    /// JSONL file of run records (composed answer plus ground truth per line)
    #[arg(long)]
    pub runs_path: PathBuf,

    /// Directory receiving the JSON, Markdown and JSONL reports
    #[arg(long, default_value_os_t = default_report_dir())]
    pub report_dir: PathBuf,

    /// Gate preset to evaluate against
    #[arg(long, value_enum, default_value_t = GatePreset::Baseline)]
    pub gate: GatePreset,

    /// Label recorded in the report filenames and contents
    #[arg(long, default_value = "adhoc")]
    pub label: String,

    /// Ranking depth for the fusion-gain hit rates
    #[arg(long, default_value_t = 20)]
    pub recall_depth: usize,

    /// Override the preset's precision floor
    #[arg(long)]
    pub precision_min: Option<f64>,

    /// Override the preset's recall floor
    #[arg(long)]
    pub recall_min: Option<f64>,

    /// Override the preset's F1 floor
    #[arg(long)]
    pub f1_min: Option<f64>,

    /// Override the preset's faithfulness floor
    #[arg(long)]
    pub faithfulness_min: Option<f64>,

    /// Override the preset's unsupported-percent ceiling
    #[arg(long)]
    pub unsupported_max: Option<f64>,
}

impl Config {
    /// Preset thresholds with any explicit per-floor overrides applied.
    pub fn thresholds(&self) -> GateThresholds {
        let mut thresholds = GateThresholds::for_preset(self.gate);
        if let Some(floor) = self.precision_min {
            thresholds.precision_min = floor;
        }
        if let Some(floor) = self.recall_min {
            thresholds.recall_min = floor;
        }
        if let Some(floor) = self.f1_min {
            thresholds.f1_min = floor;
        }
        if let Some(floor) = self.faithfulness_min {
            thresholds.faithfulness_min = Some(floor);
        }
        if let Some(ceiling) = self.unsupported_max {
            thresholds.unsupported_max_percent = Some(ceiling);
        }
        thresholds
    }
}

pub fn parse() -> Config {
    Config::parse()
}
