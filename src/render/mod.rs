//! Presentation layer.
//!
//! The loader and the orchestrator never print anything themselves. They
//! emit [`RenderInstruction`]s into a [`RenderSink`]; the terminal renderer
//! turns those into stat cards and tables, or into JSON lines for a
//! charting front-end.

pub mod markdown;
pub mod notifications;
pub mod terminal;

pub use notifications::{NotificationCenter, NotificationKind};
pub use terminal::TerminalRenderer;

use crate::analysis::sort_ascending_by_population;
use crate::models::{
    BatchParameters, BatchSummary, DatasetSummary, HistoryFilter, JobPopulation,
    PredictionResult, YearlyAggregate,
};
use serde::Serialize;
use std::path::PathBuf;

/// Stat cards and charts of the dataset summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryView {
    pub total_records: u64,
    pub total_population: u64,
    pub job_count: usize,
    pub year_range: String,
    /// Top jobs, smallest first, as drawn by a horizontal bar chart.
    pub top_jobs: Vec<JobPopulation>,
    pub yearly_totals: Vec<YearlyAggregate>,
}

impl From<&DatasetSummary> for SummaryView {
    fn from(summary: &DatasetSummary) -> Self {
        Self {
            total_records: summary.total_records,
            total_population: summary.total_population,
            job_count: summary.job_types.len(),
            year_range: summary.year_range(),
            top_jobs: sort_ascending_by_population(&summary.top_jobs),
            yearly_totals: summary.yearly_totals.clone(),
        }
    }
}

/// Historical trend chart for a filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryView {
    pub filter: HistoryFilter,
    pub record_count: usize,
    pub yearly: Vec<YearlyAggregate>,
    /// Growth into each year after the first, in percent.
    pub growth: Vec<f64>,
    /// Largest jobs of the last year in `yearly`, largest first.
    pub latest_year_jobs: Vec<JobShare>,
}

/// A job's population and its share of the year's total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobShare {
    pub job_type: String,
    pub population: u64,
    /// Percent of the year's total population.
    pub share: f64,
}

/// Result card of a single prediction plus the job's history line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinglePredictionView {
    pub prediction: PredictionResult,
    pub history: Vec<YearlyAggregate>,
}

/// Result table of a batch prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchPredictionView {
    /// Results ordered by mean prediction, largest first.
    pub results: Vec<PredictionResult>,
    /// Absent for an empty batch.
    pub summary: Option<BatchSummary>,
    pub parameters: BatchParameters,
}

/// A document to hand to the user as a file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Download {
    pub filename: String,
    pub size: usize,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// One drawing step for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderInstruction {
    ShowLoading { label: String },
    HideLoading,
    Notify { kind: NotificationKind, message: String },
    ShowSummary(SummaryView),
    ShowHistory(HistoryView),
    ShowJobTypes { job_types: Vec<String> },
    ShowSinglePrediction(SinglePredictionView),
    ShowBatchPrediction(BatchPredictionView),
    /// Back to the pre-result form.
    ShowInitial,
    Download(Download),
}

impl RenderInstruction {
    pub fn notify(kind: NotificationKind, message: impl Into<String>) -> Self {
        RenderInstruction::Notify {
            kind,
            message: message.into(),
        }
    }
}

/// Consumer of render instructions.
pub trait RenderSink {
    fn render(&mut self, instruction: RenderInstruction);

    /// Hand a document to the user and return where it was stored.
    fn deliver(&mut self, download: Download) -> std::io::Result<PathBuf>;
}

/// Sink that keeps every instruction, for assertions in tests.
///
/// Delivered documents are recorded as [`RenderInstruction::Download`].
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub instructions: Vec<RenderInstruction>,
    /// Make every delivery fail, like a read-only export directory.
    pub fail_downloads: bool,
}

#[cfg(test)]
impl RenderSink for RecordingSink {
    fn render(&mut self, instruction: RenderInstruction) {
        self.instructions.push(instruction);
    }

    fn deliver(&mut self, download: Download) -> std::io::Result<PathBuf> {
        if self.fail_downloads {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "export directory is read-only",
            ));
        }
        let path = PathBuf::from(&download.filename);
        self.instructions.push(RenderInstruction::Download(download));
        Ok(path)
    }
}

#[cfg(test)]
impl RecordingSink {
    /// Notifications emitted so far, in order.
    pub fn notifications(&self) -> Vec<(NotificationKind, String)> {
        self.instructions
            .iter()
            .filter_map(|i| match i {
                RenderInstruction::Notify { kind, message } => Some((*kind, message.clone())),
                _ => None,
            })
            .collect()
    }
}
