//! Prediction workflow.
//!
//! Drives one user command at a time through
//! `Idle -> Validating -> Requesting -> Success | Failed -> Idle`.
//! The session state lives in [`WorkflowState`], owned by the
//! [`Orchestrator`] and replaced wholesale on each successful prediction.

use crate::analysis::{group_by_year, sort_descending_by_prediction, summarize_batch};
use crate::api::DashboardApi;
use crate::config::PredictionConfig;
use crate::error::{DashboardError, Result};
use crate::models::{
    BatchPredictionResponse, ExportRequest, PredictionRequestParams, PredictionResult,
    SinglePredictionResponse, BATCH_JOB_SENTINEL,
};
use crate::render::{
    BatchPredictionView, Download, NotificationKind, RenderInstruction, RenderSink,
    SinglePredictionView,
};
use chrono::{SecondsFormat, Utc};
use tracing::{debug, info, warn};

/// A user action for the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Predict one job type. `job_type` must be set and non-empty.
    PredictSingle(PredictionRequestParams),
    /// Predict every catalogued job type. `job_type` is ignored.
    PredictBatch(PredictionRequestParams),
    /// Download the current predictions as a document.
    Export,
    /// Clear the results and go back to the empty form.
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    Idle,
    Validating,
    Requesting,
    Success,
    Failed,
}

/// Which view the dashboard is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// Empty form, no results yet.
    #[default]
    Initial,
    Results,
}

/// Session variables of the prediction page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowState {
    pub current_predictions: Vec<PredictionResult>,
    /// Job type of the displayed single prediction; empty for batch or none.
    pub current_job_type: String,
    pub display_mode: DisplayMode,
}

/// Identifies one request. Later requests have larger tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestToken(u64);

/// How a command ended.
#[derive(Debug)]
pub enum Outcome {
    Completed,
    Failed(DashboardError),
    /// The response belonged to a superseded request and was dropped.
    Stale,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Completed)
    }
}

/// Owns the workflow state and runs commands against the backend.
pub struct Orchestrator {
    state: WorkflowState,
    phase: WorkflowPhase,
    last_outcome: Option<WorkflowPhase>,
    limits: PredictionConfig,
    latest_token: u64,
}

impl Orchestrator {
    pub fn new(limits: PredictionConfig) -> Self {
        Self {
            state: WorkflowState::default(),
            phase: WorkflowPhase::Idle,
            last_outcome: None,
            limits,
            latest_token: 0,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    /// Terminal phase (`Success` or `Failed`) of the last finished command.
    pub fn last_outcome(&self) -> Option<WorkflowPhase> {
        self.last_outcome
    }

    /// Run one command to completion.
    pub async fn dispatch<A, S>(&mut self, command: Command, api: &A, sink: &mut S) -> Outcome
    where
        A: DashboardApi,
        S: RenderSink + ?Sized,
    {
        match command {
            Command::PredictSingle(params) => self.predict_single(params, api, sink).await,
            Command::PredictBatch(params) => self.predict_batch(params, api, sink).await,
            Command::Export => self.export(api, sink).await,
            Command::Reset => {
                self.reset(sink);
                Outcome::Completed
            }
        }
    }

    async fn predict_single<A, S>(
        &mut self,
        params: PredictionRequestParams,
        api: &A,
        sink: &mut S,
    ) -> Outcome
    where
        A: DashboardApi,
        S: RenderSink + ?Sized,
    {
        self.transition(WorkflowPhase::Validating);
        let params = match self.validate_single(params) {
            Ok(params) => params,
            Err(e) => return self.fail(e, "Prediction failed", sink),
        };

        let token = self.start_request();
        sink.render(RenderInstruction::ShowLoading {
            label: format!(
                "Running {} simulations for {}...",
                params.n_simulations,
                params.job_type.as_deref().unwrap_or_default()
            ),
        });
        let response = api.predict(&params).await;
        sink.render(RenderInstruction::HideLoading);

        self.complete_single(token, &params, response, sink)
    }

    async fn predict_batch<A, S>(
        &mut self,
        params: PredictionRequestParams,
        api: &A,
        sink: &mut S,
    ) -> Outcome
    where
        A: DashboardApi,
        S: RenderSink + ?Sized,
    {
        self.transition(WorkflowPhase::Validating);
        let params = match self.validate_batch(params) {
            Ok(params) => params,
            Err(e) => return self.fail(e, "Batch prediction failed", sink),
        };

        let token = self.start_request();
        sink.render(RenderInstruction::ShowLoading {
            label: format!(
                "Running batch prediction for {}...",
                params.target_year
            ),
        });
        let response = api.predict_batch(&params).await;
        sink.render(RenderInstruction::HideLoading);

        self.complete_batch(token, response, sink)
    }

    /// Enter `Requesting` and issue a new request token.
    ///
    /// Issuing a token makes every older token stale.
    pub fn start_request(&mut self) -> RequestToken {
        self.latest_token += 1;
        self.transition(WorkflowPhase::Requesting);
        RequestToken(self.latest_token)
    }

    fn is_stale(&self, token: RequestToken) -> bool {
        token.0 < self.latest_token
    }

    /// Apply the response of a single prediction request.
    pub fn complete_single<S>(
        &mut self,
        token: RequestToken,
        params: &PredictionRequestParams,
        response: Result<SinglePredictionResponse>,
        sink: &mut S,
    ) -> Outcome
    where
        S: RenderSink + ?Sized,
    {
        if self.is_stale(token) {
            debug!("Dropping stale prediction response {:?}", token);
            return Outcome::Stale;
        }

        let response = match response {
            Ok(response) if response.success => response,
            Ok(_) => return self.fail(DashboardError::Unsuccessful, "Prediction failed", sink),
            Err(e) => return self.fail(e, "Prediction failed", sink),
        };

        let prediction = response.prediction;
        let job_type = params
            .job_type
            .clone()
            .unwrap_or_else(|| prediction.job_type.clone());
        info!(
            "Prediction for {} in {}: {:.0}",
            job_type, prediction.target_year, prediction.mean_prediction
        );

        self.state = WorkflowState {
            current_predictions: vec![prediction.clone()],
            current_job_type: job_type.clone(),
            display_mode: DisplayMode::Results,
        };

        let target_year = prediction.target_year;
        sink.render(RenderInstruction::ShowSinglePrediction(SinglePredictionView {
            prediction,
            history: group_by_year(&response.historical_data),
        }));
        self.succeed(
            format!("Prediction for {} in {} complete", job_type, target_year),
            sink,
        )
    }

    /// Apply the response of a batch prediction request.
    pub fn complete_batch<S>(
        &mut self,
        token: RequestToken,
        response: Result<BatchPredictionResponse>,
        sink: &mut S,
    ) -> Outcome
    where
        S: RenderSink + ?Sized,
    {
        if self.is_stale(token) {
            debug!("Dropping stale batch response {:?}", token);
            return Outcome::Stale;
        }

        let response = match response {
            Ok(response) if response.success => response,
            Ok(_) => {
                return self.fail(DashboardError::Unsuccessful, "Batch prediction failed", sink)
            }
            Err(e) => return self.fail(e, "Batch prediction failed", sink),
        };

        let count = response.results.len();
        info!("Batch prediction returned {} results", count);

        let summary = if response.results.is_empty() {
            None
        } else {
            Some(summarize_batch(&response.results))
        };
        let view = BatchPredictionView {
            results: sort_descending_by_prediction(&response.results),
            summary,
            parameters: response.parameters,
        };

        self.state = WorkflowState {
            current_predictions: response.results,
            current_job_type: String::new(),
            display_mode: DisplayMode::Results,
        };

        sink.render(RenderInstruction::ShowBatchPrediction(view));
        self.succeed(
            format!("Batch prediction complete: {} job types", count),
            sink,
        )
    }

    async fn export<A, S>(&mut self, api: &A, sink: &mut S) -> Outcome
    where
        A: DashboardApi,
        S: RenderSink + ?Sized,
    {
        if self.state.current_predictions.is_empty() {
            return self.fail(DashboardError::NoPredictions, "Export failed", sink);
        }

        let now = Utc::now();
        let request = ExportRequest {
            results: self.state.current_predictions.clone(),
            export_date: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            job_type: if self.state.current_job_type.is_empty() {
                BATCH_JOB_SENTINEL.to_string()
            } else {
                self.state.current_job_type.clone()
            },
        };

        self.transition(WorkflowPhase::Requesting);
        sink.render(RenderInstruction::ShowLoading {
            label: "Exporting results...".to_string(),
        });
        let response = api.export_results(&request).await;
        sink.render(RenderInstruction::HideLoading);

        match response {
            Ok(document) => {
                let filename = document
                    .filename
                    .unwrap_or_else(|| format!("predictions_{}.xlsx", now.format("%Y%m%d_%H%M%S")));
                let download = Download {
                    size: document.bytes.len(),
                    filename: filename.clone(),
                    bytes: document.bytes,
                };

                match sink.deliver(download) {
                    Ok(path) => {
                        info!(
                            "Exported {} predictions to {}",
                            request.results.len(),
                            path.display()
                        );
                        self.succeed(format!("Exported {}", filename), sink)
                    }
                    Err(e) => self.fail(
                        DashboardError::Save {
                            filename,
                            reason: e.to_string(),
                        },
                        "Export failed",
                        sink,
                    ),
                }
            }
            Err(e) => self.fail(e, "Export failed", sink),
        }
    }

    /// Clear the session and show the empty form.
    ///
    /// Responses still in flight are invalidated.
    pub fn reset<S>(&mut self, sink: &mut S)
    where
        S: RenderSink + ?Sized,
    {
        self.latest_token += 1;
        self.state = WorkflowState::default();
        self.last_outcome = None;
        self.transition(WorkflowPhase::Idle);
        sink.render(RenderInstruction::ShowInitial);
    }

    fn validate_single(&self, mut params: PredictionRequestParams) -> Result<PredictionRequestParams> {
        let job_type = params
            .job_type
            .as_deref()
            .map(str::trim)
            .filter(|job| !job.is_empty())
            .ok_or_else(|| DashboardError::Validation("Please select a job type".to_string()))?
            .to_string();

        self.validate_common(&params)?;
        params.job_type = Some(job_type);
        params.job_types = None;
        Ok(params)
    }

    fn validate_batch(&self, mut params: PredictionRequestParams) -> Result<PredictionRequestParams> {
        self.validate_common(&params)?;
        params.job_type = None;
        Ok(params)
    }

    fn validate_common(&self, params: &PredictionRequestParams) -> Result<()> {
        let (min, max) = (self.limits.min_target_year, self.limits.max_target_year);
        if !(min..=max).contains(&params.target_year) {
            return Err(DashboardError::Validation(format!(
                "Target year must be between {} and {}",
                min, max
            )));
        }

        if params.n_simulations == 0 {
            return Err(DashboardError::Validation(
                "Number of simulations must be at least 1".to_string(),
            ));
        }

        if !(params.confidence_level > 0.0 && params.confidence_level < 1.0) {
            return Err(DashboardError::Validation(
                "Confidence level must be between 0 and 1".to_string(),
            ));
        }

        Ok(())
    }

    fn succeed<S>(&mut self, message: String, sink: &mut S) -> Outcome
    where
        S: RenderSink + ?Sized,
    {
        self.transition(WorkflowPhase::Success);
        self.last_outcome = Some(WorkflowPhase::Success);
        sink.render(RenderInstruction::notify(NotificationKind::Success, message));
        self.transition(WorkflowPhase::Idle);
        Outcome::Completed
    }

    fn fail<S>(&mut self, error: DashboardError, generic: &str, sink: &mut S) -> Outcome
    where
        S: RenderSink + ?Sized,
    {
        warn!("{} ({:?}): {}", generic, error.kind(), error);
        self.transition(WorkflowPhase::Failed);
        self.last_outcome = Some(WorkflowPhase::Failed);
        sink.render(RenderInstruction::notify(
            NotificationKind::Error,
            error.user_message(generic),
        ));
        self.transition(WorkflowPhase::Idle);
        Outcome::Failed(error)
    }

    fn transition(&mut self, next: WorkflowPhase) {
        debug!("Workflow {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{
        BatchParameters, DatasetSummary, ExportDocument, HistoricalRecord, HistoryFilter,
    };
    use crate::render::RecordingSink;
    use serde_json::Value;
    use std::sync::Mutex;

    fn prediction(job: &str, mean: f64) -> PredictionResult {
        PredictionResult {
            job_type: job.to_string(),
            current_year: 2023,
            current_population: 1000.0,
            target_year: 2030,
            mean_prediction: mean,
            cagr: 3.0,
            ci_lower: mean - 50.0,
            ci_upper: mean + 50.0,
            n_simulations: None,
            median_prediction: None,
            std_prediction: None,
            min_prediction: None,
            max_prediction: None,
        }
    }

    fn single_ok(job: &str, mean: f64) -> Result<SinglePredictionResponse> {
        Ok(SinglePredictionResponse {
            success: true,
            prediction: prediction(job, mean),
            historical_data: vec![
                HistoricalRecord::new(2022, job, 900),
                HistoricalRecord::new(2021, job, 800),
            ],
        })
    }

    fn batch_ok(results: Vec<PredictionResult>) -> Result<BatchPredictionResponse> {
        Ok(BatchPredictionResponse {
            success: true,
            results,
            parameters: BatchParameters::default(),
        })
    }

    /// In-memory backend that records every call it receives.
    #[derive(Default)]
    struct FakeApi {
        single: Mutex<Option<Result<SinglePredictionResponse>>>,
        batch: Mutex<Option<Result<BatchPredictionResponse>>>,
        export: Mutex<Option<Result<ExportDocument>>>,
        calls: Mutex<Vec<String>>,
        exported: Mutex<Vec<ExportRequest>>,
    }

    impl FakeApi {
        fn with_single(response: Result<SinglePredictionResponse>) -> Self {
            let api = Self::default();
            *api.single.lock().unwrap() = Some(response);
            api
        }

        fn with_batch(response: Result<BatchPredictionResponse>) -> Self {
            let api = Self::default();
            *api.batch.lock().unwrap() = Some(response);
            api
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    impl DashboardApi for FakeApi {
        async fn data_summary(&self) -> Result<DatasetSummary> {
            self.record("summary");
            Err(DashboardError::Backend("not used".into()))
        }

        async fn historical_data(&self, _filter: &HistoryFilter) -> Result<Vec<HistoricalRecord>> {
            self.record("historical");
            Ok(vec![])
        }

        async fn job_types(&self) -> Result<Vec<String>> {
            self.record("job_types");
            Ok(vec![])
        }

        async fn system_status(&self) -> Result<Value> {
            self.record("status");
            Ok(Value::Null)
        }

        async fn predict(&self, _params: &PredictionRequestParams) -> Result<SinglePredictionResponse> {
            self.record("predict");
            self.single
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(DashboardError::Transport("no response queued".into())))
        }

        async fn predict_batch(
            &self,
            params: &PredictionRequestParams,
        ) -> Result<BatchPredictionResponse> {
            assert!(params.job_type.is_none());
            self.record("predict_batch");
            self.batch
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(DashboardError::Transport("no response queued".into())))
        }

        async fn export_results(&self, request: &ExportRequest) -> Result<ExportDocument> {
            self.record("export");
            self.exported.lock().unwrap().push(request.clone());
            self.export
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(DashboardError::Transport("no response queued".into())))
        }
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(PredictionConfig::default())
    }

    fn single(job: &str, year: i32) -> Command {
        Command::PredictSingle(PredictionRequestParams::single(job, year, 5000, 0.95))
    }

    fn batch(year: i32) -> Command {
        Command::PredictBatch(PredictionRequestParams::batch(year, 5000, 0.95))
    }

    #[tokio::test]
    async fn test_out_of_range_target_year_fails_without_request() {
        let api = FakeApi::with_single(single_ok("Guru", 1200.0));
        let mut sink = RecordingSink::default();
        let mut orch = orchestrator();

        let outcome = orch.dispatch(single("Guru", 2050), &api, &mut sink).await;

        match outcome {
            Outcome::Failed(e) => assert_eq!(e.kind(), ErrorKind::Validation),
            other => panic!("expected validation failure, got {:?}", other),
        }
        assert_eq!(api.call_count(), 0);
        assert_eq!(orch.last_outcome(), Some(WorkflowPhase::Failed));
        assert_eq!(orch.phase(), WorkflowPhase::Idle);
        assert_eq!(
            sink.notifications(),
            vec![(
                NotificationKind::Error,
                "Target year must be between 2024 and 2040".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_target_year_bounds_are_inclusive() {
        for year in [2024, 2040] {
            let api = FakeApi::with_single(single_ok("Guru", 1200.0));
            let mut sink = RecordingSink::default();
            let mut orch = orchestrator();

            let outcome = orch.dispatch(single("Guru", year), &api, &mut sink).await;

            assert!(outcome.is_success(), "year {} rejected", year);
        }
    }

    #[tokio::test]
    async fn test_blank_job_type_fails_without_request() {
        let api = FakeApi::default();
        let mut sink = RecordingSink::default();
        let mut orch = orchestrator();

        let outcome = orch.dispatch(single("   ", 2030), &api, &mut sink).await;
        assert!(matches!(outcome, Outcome::Failed(DashboardError::Validation(_))));

        let missing = PredictionRequestParams::batch(2030, 5000, 0.95);
        let outcome = orch
            .dispatch(Command::PredictSingle(missing), &api, &mut sink)
            .await;
        assert!(matches!(outcome, Outcome::Failed(DashboardError::Validation(_))));

        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_skips_job_type_validation_but_checks_year() {
        let api = FakeApi::with_batch(batch_ok(vec![prediction("Guru", 1.0)]));
        let mut sink = RecordingSink::default();
        let mut orch = orchestrator();

        let outcome = orch.dispatch(batch(2041), &api, &mut sink).await;
        assert!(matches!(outcome, Outcome::Failed(DashboardError::Validation(_))));
        assert_eq!(api.call_count(), 0);

        let outcome = orch.dispatch(batch(2030), &api, &mut sink).await;
        assert!(outcome.is_success());
        assert_eq!(api.call_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_simulation_parameters() {
        let api = FakeApi::default();
        let mut sink = RecordingSink::default();
        let mut orch = orchestrator();

        let zero_runs = PredictionRequestParams::single("Guru", 2030, 0, 0.95);
        let outcome = orch
            .dispatch(Command::PredictSingle(zero_runs), &api, &mut sink)
            .await;
        assert!(matches!(outcome, Outcome::Failed(DashboardError::Validation(_))));

        let full_confidence = PredictionRequestParams::single("Guru", 2030, 100, 1.0);
        let outcome = orch
            .dispatch(Command::PredictSingle(full_confidence), &api, &mut sink)
            .await;
        assert!(matches!(outcome, Outcome::Failed(DashboardError::Validation(_))));
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_single_success_replaces_state() {
        let api = FakeApi::with_single(single_ok("Guru", 1200.0));
        let mut sink = RecordingSink::default();
        let mut orch = orchestrator();
        assert_eq!(orch.state().display_mode, DisplayMode::Initial);

        let outcome = orch.dispatch(single("Guru", 2030), &api, &mut sink).await;

        assert!(outcome.is_success());
        assert_eq!(orch.state().current_predictions, vec![prediction("Guru", 1200.0)]);
        assert_eq!(orch.state().current_job_type, "Guru");
        assert_eq!(orch.state().display_mode, DisplayMode::Results);
        assert_eq!(orch.last_outcome(), Some(WorkflowPhase::Success));
        assert_eq!(orch.phase(), WorkflowPhase::Idle);

        let view = sink
            .instructions
            .iter()
            .find_map(|i| match i {
                RenderInstruction::ShowSinglePrediction(view) => Some(view.clone()),
                _ => None,
            })
            .expect("prediction rendered");
        let years: Vec<i32> = view.history.iter().map(|h| h.year).collect();
        assert_eq!(years, vec![2021, 2022]);
        assert_eq!(sink.notifications()[0].0, NotificationKind::Success);
    }

    #[tokio::test]
    async fn test_loading_indicator_wraps_request_on_every_path() {
        let responses = vec![
            single_ok("Guru", 1.0),
            Err(DashboardError::Backend("Job type \"Guru\" not found".into())),
            Err(DashboardError::Transport("connection refused".into())),
        ];

        for response in responses {
            let api = FakeApi::with_single(response);
            let mut sink = RecordingSink::default();
            let mut orch = orchestrator();

            orch.dispatch(single("Guru", 2030), &api, &mut sink).await;

            assert!(matches!(
                sink.instructions.first(),
                Some(RenderInstruction::ShowLoading { .. })
            ));
            assert_eq!(sink.instructions[1], RenderInstruction::HideLoading);
        }
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_state_untouched() {
        let api = FakeApi::with_batch(Err(DashboardError::Backend("Predictor not initialized".into())));
        let mut sink = RecordingSink::default();
        let mut orch = orchestrator();

        let outcome = orch.dispatch(batch(2030), &api, &mut sink).await;

        assert!(matches!(outcome, Outcome::Failed(DashboardError::Backend(_))));
        assert_eq!(orch.state(), &WorkflowState::default());
        assert_eq!(
            sink.notifications(),
            vec![(NotificationKind::Error, "Predictor not initialized".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_results() {
        let api = FakeApi::with_single(single_ok("Guru", 1200.0));
        let mut sink = RecordingSink::default();
        let mut orch = orchestrator();
        orch.dispatch(single("Guru", 2030), &api, &mut sink).await;
        let before = orch.state().clone();

        *api.batch.lock().unwrap() = Some(Err(DashboardError::Http {
            status: 500,
            body: String::new(),
        }));
        let outcome = orch.dispatch(batch(2030), &api, &mut sink).await;

        assert!(!outcome.is_success());
        assert_eq!(orch.state(), &before);
        assert_eq!(
            sink.notifications().last().unwrap(),
            &(NotificationKind::Error, "Batch prediction failed".to_string())
        );
    }

    #[tokio::test]
    async fn test_unsuccessful_flag_is_a_failure() {
        let mut response = single_ok("Guru", 1200.0).unwrap();
        response.success = false;
        let api = FakeApi::with_single(Ok(response));
        let mut sink = RecordingSink::default();
        let mut orch = orchestrator();

        let outcome = orch.dispatch(single("Guru", 2030), &api, &mut sink).await;

        assert!(matches!(outcome, Outcome::Failed(DashboardError::Unsuccessful)));
        assert!(orch.state().current_predictions.is_empty());
    }

    #[tokio::test]
    async fn test_batch_success_keeps_order_and_renders_sorted() {
        let results = vec![
            prediction("Guru", 100.0),
            prediction("Petani", 300.0),
            prediction("Nelayan", 200.0),
        ];
        let api = FakeApi::with_batch(batch_ok(results.clone()));
        let mut sink = RecordingSink::default();
        let mut orch = orchestrator();

        let outcome = orch.dispatch(batch(2030), &api, &mut sink).await;

        assert!(outcome.is_success());
        assert_eq!(orch.state().current_predictions, results);
        assert_eq!(orch.state().current_job_type, "");

        let view = sink
            .instructions
            .iter()
            .find_map(|i| match i {
                RenderInstruction::ShowBatchPrediction(view) => Some(view.clone()),
                _ => None,
            })
            .expect("batch rendered");
        let order: Vec<&str> = view.results.iter().map(|r| r.job_type.as_str()).collect();
        assert_eq!(order, vec!["Petani", "Nelayan", "Guru"]);
        let summary = view.summary.expect("summary for non-empty batch");
        assert_eq!(summary.total_predicted, 600.0);
        assert_eq!(summary.avg_cagr, 3.0);
    }

    #[tokio::test]
    async fn test_empty_batch_has_no_summary() {
        let api = FakeApi::with_batch(batch_ok(vec![]));
        let mut sink = RecordingSink::default();
        let mut orch = orchestrator();

        orch.dispatch(batch(2030), &api, &mut sink).await;

        let view = sink
            .instructions
            .iter()
            .find_map(|i| match i {
                RenderInstruction::ShowBatchPrediction(view) => Some(view.clone()),
                _ => None,
            })
            .expect("batch rendered");
        assert!(view.summary.is_none());
        assert!(orch.state().current_predictions.is_empty());
    }

    #[tokio::test]
    async fn test_export_without_predictions_fails_locally() {
        let api = FakeApi::default();
        let mut sink = RecordingSink::default();
        let mut orch = orchestrator();

        let outcome = orch.dispatch(Command::Export, &api, &mut sink).await;

        assert!(matches!(outcome, Outcome::Failed(DashboardError::NoPredictions)));
        assert_eq!(api.call_count(), 0);
        assert_eq!(sink.notifications()[0].0, NotificationKind::Error);
    }

    #[tokio::test]
    async fn test_export_sends_predictions_and_downloads() {
        let api = FakeApi::with_single(single_ok("Guru", 1200.0));
        *api.export.lock().unwrap() = Some(Ok(ExportDocument {
            filename: Some("predictions_x.xlsx".into()),
            bytes: vec![1, 2, 3],
        }));
        let mut sink = RecordingSink::default();
        let mut orch = orchestrator();
        orch.dispatch(single("Guru", 2030), &api, &mut sink).await;

        let outcome = orch.dispatch(Command::Export, &api, &mut sink).await;

        assert!(outcome.is_success());
        let exported = api.exported.lock().unwrap();
        assert_eq!(exported[0].job_type, "Guru");
        assert_eq!(exported[0].results.len(), 1);
        assert!(chrono::DateTime::parse_from_rfc3339(&exported[0].export_date).is_ok());
        assert!(sink.instructions.contains(&RenderInstruction::Download(Download {
            filename: "predictions_x.xlsx".into(),
            size: 3,
            bytes: vec![1, 2, 3],
        })));
    }

    #[tokio::test]
    async fn test_export_of_batch_uses_sentinel_and_failure_skips_download() {
        let api = FakeApi::with_batch(batch_ok(vec![prediction("Guru", 1.0)]));
        *api.export.lock().unwrap() = Some(Err(DashboardError::Http {
            status: 400,
            body: "No results to export".into(),
        }));
        let mut sink = RecordingSink::default();
        let mut orch = orchestrator();
        orch.dispatch(batch(2030), &api, &mut sink).await;

        let outcome = orch.dispatch(Command::Export, &api, &mut sink).await;

        assert!(!outcome.is_success());
        assert_eq!(api.exported.lock().unwrap()[0].job_type, BATCH_JOB_SENTINEL);
        assert!(!sink
            .instructions
            .iter()
            .any(|i| matches!(i, RenderInstruction::Download(_))));
        // Export failure does not touch the held predictions
        assert_eq!(orch.state().current_predictions.len(), 1);
    }

    #[tokio::test]
    async fn test_export_that_cannot_be_saved_fails() {
        let api = FakeApi::with_single(single_ok("Guru", 1200.0));
        *api.export.lock().unwrap() = Some(Ok(ExportDocument {
            filename: Some("p.xlsx".into()),
            bytes: vec![1],
        }));
        let mut sink = RecordingSink {
            fail_downloads: true,
            ..Default::default()
        };
        let mut orch = orchestrator();
        orch.dispatch(single("Guru", 2030), &api, &mut sink).await;

        let outcome = orch.dispatch(Command::Export, &api, &mut sink).await;

        assert!(matches!(outcome, Outcome::Failed(DashboardError::Save { .. })));
        assert_eq!(orch.last_outcome(), Some(WorkflowPhase::Failed));
        let (kind, message) = sink.notifications().last().cloned().unwrap();
        assert_eq!(kind, NotificationKind::Error);
        assert!(message.contains("p.xlsx"));
        assert!(!sink
            .notifications()
            .iter()
            .any(|(_, m)| m.starts_with("Exported")));
        assert_eq!(orch.state().current_predictions.len(), 1);
    }

    #[tokio::test]
    async fn test_reset_restores_initial_state() {
        let api = FakeApi::with_single(single_ok("Guru", 1200.0));
        let mut sink = RecordingSink::default();
        let mut orch = orchestrator();
        orch.dispatch(single("Guru", 2030), &api, &mut sink).await;

        let outcome = orch.dispatch(Command::Reset, &api, &mut sink).await;

        assert!(outcome.is_success());
        assert_eq!(orch.state(), &WorkflowState::default());
        assert_eq!(sink.instructions.last(), Some(&RenderInstruction::ShowInitial));
        assert_eq!(api.call_count(), 1);
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut sink = RecordingSink::default();
        let mut orch = orchestrator();
        let params = PredictionRequestParams::single("Guru", 2030, 5000, 0.95);

        let first = orch.start_request();
        let second = orch.start_request();
        assert!(first < second);

        let outcome = orch.complete_single(second, &params, single_ok("Guru", 2000.0), &mut sink);
        assert!(outcome.is_success());

        let outcome = orch.complete_single(first, &params, single_ok("Guru", 1000.0), &mut sink);
        assert!(matches!(outcome, Outcome::Stale));
        assert_eq!(orch.state().current_predictions[0].mean_prediction, 2000.0);
    }

    #[test]
    fn test_reset_invalidates_in_flight_request() {
        let mut sink = RecordingSink::default();
        let mut orch = orchestrator();
        let token = orch.start_request();

        orch.reset(&mut sink);
        let outcome = orch.complete_batch(token, batch_ok(vec![prediction("Guru", 1.0)]), &mut sink);

        assert!(matches!(outcome, Outcome::Stale));
        assert_eq!(orch.state().display_mode, DisplayMode::Initial);
    }

    #[test]
    fn test_inverted_interval_renders_without_panic() {
        let mut sink = RecordingSink::default();
        let mut orch = orchestrator();
        let mut response = single_ok("Guru", 1000.0).unwrap();
        response.prediction.ci_lower = 5000.0;
        response.prediction.ci_upper = 10.0;

        let token = orch.start_request();
        let params = PredictionRequestParams::single("Guru", 2030, 5000, 0.95);
        let outcome = orch.complete_single(token, &params, Ok(response), &mut sink);

        assert!(outcome.is_success());
        for instruction in &sink.instructions {
            if let RenderInstruction::ShowSinglePrediction(view) = instruction {
                let text = crate::render::markdown::generate_prediction_section(view);
                assert!(text.contains("5,000 - 10"));
            }
        }
    }

    #[test]
    fn test_dispatch_with_block_on() {
        let api = FakeApi::with_single(single_ok("Petani", 3000.0));
        let mut sink = RecordingSink::default();
        let mut orch = orchestrator();

        let outcome = tokio_test::block_on(orch.dispatch(single("Petani", 2035), &api, &mut sink));

        assert!(outcome.is_success());
        assert_eq!(orch.state().current_job_type, "Petani");
    }
}
