//! Aggregation of historical records and prediction batches.
//!
//! Every function here is pure: no I/O, deterministic output for a given
//! input. The results feed the chart and table instructions.

use crate::error::GrowthError;
use crate::models::{BatchSummary, HistoricalRecord, JobPopulation, PredictionResult, YearlyAggregate};
use std::collections::{BTreeMap, HashMap};

/// Sum populations per year. Output is sorted ascending by year.
pub fn group_by_year(records: &[HistoricalRecord]) -> Vec<YearlyAggregate> {
    let mut totals: BTreeMap<i32, u64> = BTreeMap::new();

    for record in records {
        *totals.entry(record.year).or_default() += record.population;
    }

    totals
        .into_iter()
        .map(|(year, population)| YearlyAggregate { year, population })
        .collect()
}

/// Percent growth between consecutive entries of a year-sorted series.
///
/// The first year has no reference and is dropped, so the output has one
/// element fewer than the input. A zero base yields an infinite or NaN rate,
/// which is returned as is; see [`checked_year_over_year_growth`].
pub fn year_over_year_growth(series: &[YearlyAggregate]) -> Vec<f64> {
    series
        .windows(2)
        .map(|pair| {
            let previous = pair[0].population as f64;
            let current = pair[1].population as f64;
            (current - previous) / previous * 100.0
        })
        .collect()
}

/// Like [`year_over_year_growth`], but fails on a zero base.
pub fn checked_year_over_year_growth(series: &[YearlyAggregate]) -> Result<Vec<f64>, GrowthError> {
    if let Some(pair) = series.windows(2).find(|pair| pair[0].population == 0) {
        return Err(GrowthError::ZeroBase {
            year: pair[0].year,
            next_year: pair[1].year,
        });
    }

    Ok(year_over_year_growth(series))
}

/// Mean CAGR and population totals of a batch.
///
/// The mean is NaN for an empty batch; callers guard before rendering it.
pub fn summarize_batch(results: &[PredictionResult]) -> BatchSummary {
    let total_cagr: f64 = results.iter().map(|r| r.cagr).sum();

    BatchSummary {
        avg_cagr: total_cagr / results.len() as f64,
        total_current: results.iter().map(|r| r.current_population).sum(),
        total_predicted: results.iter().map(|r| r.mean_prediction).sum(),
    }
}

/// Sort predictions by mean prediction (largest first). Stable.
pub fn sort_descending_by_prediction(results: &[PredictionResult]) -> Vec<PredictionResult> {
    let mut sorted = results.to_vec();
    sorted.sort_by(|a, b| b.mean_prediction.total_cmp(&a.mean_prediction));
    sorted
}

/// Sort jobs by population (smallest first). Stable.
pub fn sort_ascending_by_population(jobs: &[JobPopulation]) -> Vec<JobPopulation> {
    let mut sorted = jobs.to_vec();
    sorted.sort_by_key(|job| job.population);
    sorted
}

/// Share of each record within its year, in percent.
///
/// Returned in input order as `(year, job_type, percentage)`. A year whose
/// total is zero gives 0% for all its jobs.
pub fn job_shares(records: &[HistoricalRecord]) -> Vec<(i32, String, f64)> {
    let mut year_totals: HashMap<i32, u64> = HashMap::new();
    for record in records {
        *year_totals.entry(record.year).or_default() += record.population;
    }

    records
        .iter()
        .map(|record| {
            let total = year_totals.get(&record.year).copied().unwrap_or(0);
            let share = if total == 0 {
                0.0
            } else {
                record.population as f64 / total as f64 * 100.0
            };
            (record.year, record.job_type.clone(), share)
        })
        .collect()
}

/// The `n` largest jobs of a given year, largest first.
pub fn top_jobs(records: &[HistoricalRecord], year: i32, n: usize) -> Vec<JobPopulation> {
    let mut per_job: HashMap<&str, u64> = HashMap::new();
    for record in records.iter().filter(|r| r.year == year) {
        *per_job.entry(record.job_type.as_str()).or_default() += record.population;
    }

    let mut jobs: Vec<JobPopulation> = per_job
        .into_iter()
        .map(|(job_type, population)| JobPopulation {
            job_type: job_type.to_string(),
            population,
        })
        .collect();

    // Name as tie-breaker so the result does not depend on hash order
    jobs.sort_by(|a, b| {
        b.population
            .cmp(&a.population)
            .then_with(|| a.job_type.cmp(&b.job_type))
    });
    jobs.truncate(n);
    jobs
}
