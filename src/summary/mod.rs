//! Dataset summary and historical data loading.
//!
//! The loader runs independently of the prediction workflow: once at
//! startup and again whenever the history filter changes. Every call
//! fetches fresh data; a failed call leaves the previous snapshot in place.

use crate::analysis::{
    checked_year_over_year_growth, group_by_year, job_shares, top_jobs, year_over_year_growth,
};
use crate::api::DashboardApi;
use crate::error::Result;
use crate::models::{DatasetSummary, HistoricalRecord, HistoryFilter, YearlyAggregate};
use crate::render::{
    HistoryView, JobShare, NotificationKind, RenderInstruction, RenderSink, SummaryView,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Number of jobs listed under the history chart.
const HISTORY_TOP_JOBS: usize = 10;

/// Holds the latest dataset summary and history view.
#[derive(Debug, Default)]
pub struct SummaryLoader {
    summary: Option<DatasetSummary>,
    history: Option<HistoryView>,
}

impl SummaryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest summary, if one has loaded.
    pub fn summary(&self) -> Option<&DatasetSummary> {
        self.summary.as_ref()
    }

    /// Latest history view, if one has loaded.
    pub fn history(&self) -> Option<&HistoryView> {
        self.history.as_ref()
    }

    /// Fetch the dataset summary and render its stat cards.
    ///
    /// Overlapping calls are allowed; whichever response is applied last
    /// wins.
    pub async fn load_summary<A, S>(&mut self, api: &A, sink: &mut S) -> Result<()>
    where
        A: DashboardApi,
        S: RenderSink + ?Sized,
    {
        match api.data_summary().await {
            Ok(summary) => {
                info!(
                    "Loaded summary: {} records, {} job types, {}",
                    summary.total_records,
                    summary.job_types.len(),
                    summary.year_range()
                );
                sink.render(RenderInstruction::ShowSummary(SummaryView::from(&summary)));
                self.summary = Some(summary);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load data summary: {}", e);
                sink.render(RenderInstruction::notify(
                    NotificationKind::Error,
                    format!("Failed to load data summary: {}", e),
                ));
                Err(e)
            }
        }
    }

    /// Fetch historical records for a filter and render the trend chart.
    pub async fn load_historical<A, S>(
        &mut self,
        api: &A,
        filter: HistoryFilter,
        sink: &mut S,
    ) -> Result<()>
    where
        A: DashboardApi,
        S: RenderSink + ?Sized,
    {
        match api.historical_data(&filter).await {
            Ok(records) => {
                debug!("Loaded {} historical records for {}", records.len(), filter);
                let yearly = group_by_year(&records);
                let growth = match checked_year_over_year_growth(&yearly) {
                    Ok(growth) => growth,
                    Err(e) => {
                        // Still drawn; the undefined rates show up as n/a or ∞
                        warn!("Growth for {}: {}", filter, e);
                        sink.render(RenderInstruction::notify(
                            NotificationKind::Warning,
                            e.to_string(),
                        ));
                        year_over_year_growth(&yearly)
                    }
                };
                let view = HistoryView {
                    latest_year_jobs: latest_year_jobs(&records, &yearly),
                    growth,
                    record_count: records.len(),
                    yearly,
                    filter,
                };
                sink.render(RenderInstruction::ShowHistory(view.clone()));
                self.history = Some(view);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load historical data for {}: {}", filter, e);
                sink.render(RenderInstruction::notify(
                    NotificationKind::Error,
                    format!("Failed to load historical data: {}", e),
                ));
                Err(e)
            }
        }
    }

    /// Fetch the job catalogue and render it as a list.
    pub async fn load_job_types<A, S>(&self, api: &A, sink: &mut S) -> Result<Vec<String>>
    where
        A: DashboardApi,
        S: RenderSink + ?Sized,
    {
        match api.job_types().await {
            Ok(job_types) => {
                sink.render(RenderInstruction::ShowJobTypes {
                    job_types: job_types.clone(),
                });
                Ok(job_types)
            }
            Err(e) => {
                warn!("Failed to load job types: {}", e);
                sink.render(RenderInstruction::notify(
                    NotificationKind::Error,
                    format!("Failed to load job types: {}", e),
                ));
                Err(e)
            }
        }
    }
}

/// Largest jobs of the last year in `yearly`, with their share of that year.
fn latest_year_jobs(records: &[HistoricalRecord], yearly: &[YearlyAggregate]) -> Vec<JobShare> {
    let Some(latest) = yearly.last() else {
        return Vec::new();
    };

    let mut shares: HashMap<String, f64> = HashMap::new();
    for (year, job_type, share) in job_shares(records) {
        if year == latest.year {
            *shares.entry(job_type).or_default() += share;
        }
    }

    top_jobs(records, latest.year, HISTORY_TOP_JOBS)
        .into_iter()
        .map(|job| JobShare {
            share: shares.get(&job.job_type).copied().unwrap_or(0.0),
            job_type: job.job_type,
            population: job.population,
        })
        .collect()
}

/// Query the backend status endpoint and log the result.
///
/// Diagnostic only: failures are logged, never shown to the user.
pub async fn log_system_status<A: DashboardApi>(api: &A) {
    match api.system_status().await {
        Ok(status) => {
            let data_loaded = status.get("data_loaded").and_then(|v| v.as_bool());
            let predictor_ready = status.get("predictor_ready").and_then(|v| v.as_bool());
            info!(
                "Backend status: data_loaded={:?} predictor_ready={:?}",
                data_loaded, predictor_ready
            );
            debug!("Full status payload: {}", status);
        }
        Err(e) => warn!("System status check failed: {}", e),
    }
}
