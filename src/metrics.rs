use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const EVALUATIONS_TOTAL: &str = "ranker_evaluations_total";
pub const SKIPPED_TOTAL: &str = "ranker_skipped_total";
pub const EVALUATION_FAILURES_TOTAL: &str = "ranker_evaluation_failures_total";
pub const MISSING_CRITERIA_TOTAL: &str = "ranker_missing_criteria_total";
pub const BAD_FILES_TOTAL: &str = "ranker_bad_files_total";
pub const EVALUATION_MS: &str = "ranker_evaluation_ms";

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder once per process; later calls reuse it.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                let handle = PrometheusBuilder::new().install_recorder()?;
                describe();
                Ok::<_, anyhow::Error>(handle)
            })?
            .clone();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!(EVALUATIONS_TOTAL, "Candidates scored and recorded.");
    describe_counter!(
        SKIPPED_TOTAL,
        "Candidates skipped because they were scored within the recency window."
    );
    describe_counter!(EVALUATION_FAILURES_TOTAL, "Evaluator or storage failures per candidate.");
    describe_counter!(
        MISSING_CRITERIA_TOTAL,
        "Requested criteria absent from evaluator output."
    );
    describe_counter!(BAD_FILES_TOTAL, "Uploaded files whose text could not be extracted.");
    describe_histogram!(EVALUATION_MS, "Evaluator round-trip time in milliseconds.");
}
