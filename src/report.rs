//! Per-file and batch reporting
//!
//! Aggregates what happened to each input and renders it either as the
//! human-readable summary printed by the CLI or as a JSON report file.

use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// Result of writing one optimized file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub original_size: u64,
    pub optimized_size: u64,
    pub quality: u8,
    pub met_budget: bool,
    pub resized: bool,
}

impl FileReport {
    /// Bytes saved; negative when the output grew.
    pub fn savings_bytes(&self) -> i64 {
        self.original_size as i64 - self.optimized_size as i64
    }

    pub fn savings_percent(&self) -> f64 {
        percent_of(self.savings_bytes(), self.original_size)
    }
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "   Original: {:.1} KB", self.original_size as f64 / KIB)?;
        writeln!(
            f,
            "   Compressed to {:.1} KB at {}% quality",
            self.optimized_size as f64 / KIB,
            self.quality
        )?;
        if self.resized {
            writeln!(f, "   Resized to fit max dimensions")?;
        }
        write!(
            f,
            "   Savings: {:.1} KB ({:.1}%)",
            self.savings_bytes() as f64 / KIB,
            self.savings_percent()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileOutcome {
    Optimized(FileReport),
    Skipped { input_path: PathBuf, reason: String },
    Failed { input_path: PathBuf, error: String },
}

impl FileOutcome {
    pub fn input_path(&self) -> &Path {
        match self {
            FileOutcome::Optimized(report) => &report.input_path,
            FileOutcome::Skipped { input_path, .. } => input_path,
            FileOutcome::Failed { input_path, .. } => input_path,
        }
    }
}

/// Aggregate over a batch of files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: FileOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn optimized(&self) -> impl Iterator<Item = &FileReport> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            FileOutcome::Optimized(report) => Some(report),
            _ => None,
        })
    }

    pub fn optimized_count(&self) -> usize {
        self.optimized().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Failed { .. }))
            .count()
    }

    pub fn unmet_count(&self) -> usize {
        self.optimized().filter(|r| !r.met_budget).count()
    }

    pub fn total_original(&self) -> u64 {
        self.optimized().map(|r| r.original_size).sum()
    }

    pub fn total_optimized(&self) -> u64 {
        self.optimized().map(|r| r.optimized_size).sum()
    }

    pub fn total_savings(&self) -> i64 {
        self.total_original() as i64 - self.total_optimized() as i64
    }

    pub fn total_savings_percent(&self) -> f64 {
        percent_of(self.total_savings(), self.total_original())
    }

    /// Mean of the per-file savings percentages, 0 for an empty batch.
    pub fn average_savings_percent(&self) -> f64 {
        let count = self.optimized_count();
        if count == 0 {
            return 0.0;
        }
        self.optimized().map(FileReport::savings_percent).sum::<f64>() / count as f64
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let original = self.total_original();
        let optimized = self.total_optimized();
        let savings = self.total_savings();

        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "OPTIMIZATION SUMMARY")?;
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "Successfully optimized: {} files", self.optimized_count())?;
        writeln!(f, "Skipped:                {} files", self.skipped_count())?;
        writeln!(f, "Failed:                 {} files", self.failed_count())?;
        writeln!(f, "Over budget:            {} files", self.unmet_count())?;
        writeln!(
            f,
            "Original total size:    {} bytes ({:.2} MB)",
            original,
            original as f64 / MIB
        )?;
        writeln!(
            f,
            "Optimized total size:   {} bytes ({:.2} MB)",
            optimized,
            optimized as f64 / MIB
        )?;
        writeln!(
            f,
            "Total savings:          {} bytes ({:.2} MB)",
            savings,
            savings as f64 / MIB
        )?;
        write!(f, "Size reduction:         {:.1}%", self.total_savings_percent())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonReport {
    pub generated_at: DateTime<Utc>,
    pub total_files_optimized: usize,
    pub total_savings_bytes: i64,
    pub average_savings_percent: f64,
    pub files: Vec<FileOutcome>,
}

impl JsonReport {
    pub fn from_summary(summary: &BatchSummary) -> Self {
        Self {
            generated_at: Utc::now(),
            total_files_optimized: summary.optimized_count(),
            total_savings_bytes: summary.total_savings(),
            average_savings_percent: summary.average_savings_percent(),
            files: summary.outcomes.clone(),
        }
    }
}

pub fn write_json_report(path: &Path, summary: &BatchSummary) -> Result<()> {
    let report = JsonReport::from_summary(summary);
    let json = serde_json::to_string_pretty(&report)?;
    fs::write(path, json)?;
    tracing::info!("Optimization report saved: {}", path.display());
    Ok(())
}

fn percent_of(part: i64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
