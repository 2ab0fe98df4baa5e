//! Data models for the forecast dashboard.
//!
//! This module contains the records exchanged with the backend API and the
//! shaped values handed to the rendering sink. The backend speaks Indonesian
//! column names (`tahun`, `jenis_pekerjaan`, `jumlah_penduduk`); every record
//! accepts both those and the English field names on decode.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Decodes a head count that the backend may send as a float (`1200.0`).
fn head_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value < 0.0 {
        return Err(serde::de::Error::custom(format!(
            "invalid population value: {}",
            value
        )));
    }
    Ok(value.round() as u64)
}

/// Snapshot of the dataset served by `/api/data/summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Number of aggregated rows in the dataset.
    pub total_records: u64,
    /// Sum of the population column over every row.
    #[serde(deserialize_with = "head_count")]
    pub total_population: u64,
    /// Job catalogue. Order carries no meaning.
    pub job_types: BTreeSet<String>,
    /// Distinct years, ascending.
    pub years: Vec<i32>,
    pub earliest_year: i32,
    pub latest_year: i32,
    /// Largest jobs in the latest year, as sent by the backend.
    #[serde(default)]
    pub top_jobs: Vec<JobPopulation>,
    /// Population summed per year, when the backend includes it.
    #[serde(default)]
    pub yearly_totals: Vec<YearlyAggregate>,
}

impl DatasetSummary {
    /// Returns the covered year span formatted for a stat card.
    pub fn year_range(&self) -> String {
        if self.years.is_empty() {
            "N/A".to_string()
        } else {
            format!("{} - {}", self.earliest_year, self.latest_year)
        }
    }
}

/// Population of a single job type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPopulation {
    #[serde(alias = "jenis_pekerjaan")]
    pub job_type: String,
    #[serde(alias = "jumlah_penduduk", deserialize_with = "head_count")]
    pub population: u64,
}

/// One raw row of historical data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    #[serde(alias = "tahun")]
    pub year: i32,
    #[serde(alias = "jenis_pekerjaan")]
    pub job_type: String,
    #[serde(alias = "jumlah_penduduk", deserialize_with = "head_count")]
    pub population: u64,
    /// Total population of the record's year (backend aggregation column).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_population: Option<f64>,
    /// Share of the year's total, in percent (backend aggregation column).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
}

#[cfg(test)]
impl HistoricalRecord {
    pub fn new(year: i32, job_type: impl Into<String>, population: u64) -> Self {
        Self {
            year,
            job_type: job_type.into(),
            population,
            total_population: None,
            percentage: None,
        }
    }
}

/// Population summed over every job for one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearlyAggregate {
    #[serde(alias = "tahun")]
    pub year: i32,
    #[serde(alias = "jumlah_penduduk", deserialize_with = "head_count")]
    pub population: u64,
}

/// Result of one Monte Carlo prediction for one job type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub job_type: String,
    pub current_year: i32,
    pub current_population: f64,
    pub target_year: i32,
    pub mean_prediction: f64,
    /// Compound annual growth rate, in percent.
    pub cagr: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_simulations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median_prediction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_prediction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_prediction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_prediction: Option<f64>,
}

impl PredictionResult {
    /// Absolute change between the current population and the mean prediction.
    pub fn absolute_change(&self) -> f64 {
        self.mean_prediction - self.current_population
    }

    /// Width of the confidence interval. Negative when the bounds are inverted.
    pub fn ci_width(&self) -> f64 {
        self.ci_upper - self.ci_lower
    }
}

/// Parameters of a prediction submission.
///
/// A missing `job_type` means a batch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequestParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    pub target_year: i32,
    pub n_simulations: u32,
    pub confidence_level: f64,
    /// Restricts a batch to these job types. The backend falls back to its
    /// top ten jobs when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_types: Option<Vec<String>>,
}

impl PredictionRequestParams {
    /// Builds the parameters of a single-job prediction.
    pub fn single(
        job_type: impl Into<String>,
        target_year: i32,
        n_simulations: u32,
        confidence_level: f64,
    ) -> Self {
        Self {
            job_type: Some(job_type.into()),
            target_year,
            n_simulations,
            confidence_level,
            job_types: None,
        }
    }

    /// Builds the parameters of a batch prediction.
    pub fn batch(target_year: i32, n_simulations: u32, confidence_level: f64) -> Self {
        Self {
            job_type: None,
            target_year,
            n_simulations,
            confidence_level,
            job_types: None,
        }
    }
}

/// Successful body of `POST /api/predict`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinglePredictionResponse {
    #[serde(default)]
    pub success: bool,
    pub prediction: PredictionResult,
    #[serde(default)]
    pub historical_data: Vec<HistoricalRecord>,
}

/// Echo of the batch parameters returned by `POST /api/predict/batch`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchParameters {
    #[serde(default)]
    pub target_year: Option<i32>,
    #[serde(default)]
    pub n_simulations: Option<u32>,
    #[serde(default)]
    pub confidence_level: Option<f64>,
    #[serde(default)]
    pub total_predictions: Option<usize>,
}

/// Successful body of `POST /api/predict/batch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPredictionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub results: Vec<PredictionResult>,
    #[serde(default)]
    pub parameters: BatchParameters,
}

/// Body of `POST /api/export/results`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    pub results: Vec<PredictionResult>,
    /// ISO-8601 timestamp of the export.
    pub export_date: String,
    /// Active job type, or [`BATCH_JOB_SENTINEL`] for batch results.
    pub job_type: String,
}

/// Job type sent with exports of batch results.
pub const BATCH_JOB_SENTINEL: &str = "batch";

/// Binary document returned by the export endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDocument {
    /// File name suggested by the server, if any.
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

/// Filter of the historical data view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    pub job_type: Option<String>,
    pub year: Option<i32>,
}

impl fmt::Display for HistoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.job_type, self.year) {
            (Some(job), Some(year)) => write!(f, "{} in {}", job, year),
            (Some(job), None) => write!(f, "{}", job),
            (None, Some(year)) => write!(f, "all jobs in {}", year),
            (None, None) => write!(f, "all jobs"),
        }
    }
}

/// Aggregate figures of a batch of predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Arithmetic mean of the CAGR values. NaN for an empty batch.
    pub avg_cagr: f64,
    pub total_current: f64,
    pub total_predicted: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_historical_record_accepts_backend_columns() {
        let json = r#"{"tahun": 2021, "jenis_pekerjaan": "Petani", "jumlah_penduduk": 1200,
                       "total_population": 5000, "percentage": 24.0}"#;
        let record: HistoricalRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.year, 2021);
        assert_eq!(record.job_type, "Petani");
        assert_eq!(record.population, 1200);
        assert_eq!(record.total_population, Some(5000.0));
    }

    #[test]
    fn test_population_accepts_float_counts() {
        let json = r#"{"tahun": 2021, "jenis_pekerjaan": "Guru", "jumlah_penduduk": 310.0}"#;
        let record: HistoricalRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.population, 310);

        let negative = r#"{"tahun": 2021, "jenis_pekerjaan": "Guru", "jumlah_penduduk": -1}"#;
        assert!(serde_json::from_str::<HistoricalRecord>(negative).is_err());
    }

    #[test]
    fn test_historical_record_accepts_english_fields() {
        let json = r#"{"year": 2020, "job_type": "Guru", "population": 40}"#;
        let record: HistoricalRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record, HistoricalRecord::new(2020, "Guru", 40));
    }

    #[test]
    fn test_batch_params_omit_job_type() {
        let params = PredictionRequestParams::batch(2030, 5000, 0.95);
        let value = serde_json::to_value(&params).unwrap();
        assert!(value.get("job_type").is_none());
        assert!(value.get("job_types").is_none());
        assert_eq!(value["target_year"], 2030);
    }

    #[test]
    fn test_summary_decodes_backend_payload() {
        let json = r#"{
            "total_records": 3,
            "years": [2020, 2021],
            "job_types": ["Guru", "Petani"],
            "total_population": 900,
            "latest_year": 2021,
            "earliest_year": 2020,
            "yearly_totals": [{"tahun": 2020, "jumlah_penduduk": 400}],
            "top_jobs": [{"jenis_pekerjaan": "Petani", "jumlah_penduduk": 300}]
        }"#;
        let summary: DatasetSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.job_types.len(), 2);
        assert_eq!(summary.top_jobs[0].job_type, "Petani");
        assert_eq!(summary.yearly_totals[0].population, 400);
        assert_eq!(summary.year_range(), "2020 - 2021");
    }

    #[test]
    fn test_prediction_accepts_extra_statistics() {
        let json = r#"{"job_type": "Guru", "current_year": 2023, "current_population": 100.0,
                       "target_year": 2030, "n_simulations": 5000, "mean_prediction": 150.0,
                       "median_prediction": 148.0, "std_prediction": 10.0, "ci_lower": 130.0,
                       "ci_upper": 170.0, "min_prediction": 90.0, "max_prediction": 210.0,
                       "cagr": 5.96}"#;
        let prediction: PredictionResult = serde_json::from_str(json).unwrap();
        assert_eq!(prediction.n_simulations, Some(5000));
        assert_eq!(prediction.absolute_change(), 50.0);
        assert_eq!(prediction.ci_width(), 40.0);
    }

    #[test]
    fn test_history_filter_display() {
        let filter = HistoryFilter {
            job_type: Some("Guru".to_string()),
            year: None,
        };
        assert_eq!(filter.to_string(), "Guru");
        assert_eq!(HistoryFilter::default().to_string(), "all jobs");
    }
}
