//! Prometheusメトリクス定義。
use std::time::Duration;

use prometheus::{
    HistogramVec, IntCounterVec, Registry, register_histogram_vec_with_registry,
    register_int_counter_vec_with_registry,
};

use super::PipelineTelemetry;
use crate::error::PipelineError;

/// メトリクスコレクター。
#[derive(Clone)]
pub struct Metrics {
    // カウンター
    pub stage_runs: IntCounterVec,
    pub reviews_enriched: IntCounterVec,
    pub app_runs: IntCounterVec,

    // ヒストグラム
    pub stage_duration: HistogramVec,
    pub app_run_duration: HistogramVec,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成し、`registry` に登録する。
    ///
    /// # Errors
    /// Returns an error when a metric name is already registered.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            stage_runs: register_int_counter_vec_with_registry!(
                "insight_stage_runs_total",
                "Enrichment stage invocations by outcome",
                &["app", "stage", "outcome"],
                registry
            )?,
            reviews_enriched: register_int_counter_vec_with_registry!(
                "insight_reviews_enriched_total",
                "Reviews returned by a successful stage",
                &["app", "stage"],
                registry
            )?,
            app_runs: register_int_counter_vec_with_registry!(
                "insight_app_runs_total",
                "Completed app runs by outcome",
                &["app", "outcome"],
                registry
            )?,
            stage_duration: register_histogram_vec_with_registry!(
                "insight_stage_duration_seconds",
                "Wall time of one enrichment stage",
                &["stage"],
                registry
            )?,
            app_run_duration: register_histogram_vec_with_registry!(
                "insight_app_run_duration_seconds",
                "Wall time of one app run",
                &["app"],
                registry
            )?,
        })
    }
}

impl PipelineTelemetry for Metrics {
    fn stage_started(&self, _app: &str, _stage: &str, _reviews: usize) {}

    fn stage_finished(&self, app: &str, stage: &str, reviews: usize, elapsed: Duration) {
        self.stage_runs
            .with_label_values(&[app, stage, "success"])
            .inc();
        self.reviews_enriched
            .with_label_values(&[app, stage])
            .inc_by(u64::try_from(reviews).unwrap_or(u64::MAX));
        self.stage_duration
            .with_label_values(&[stage])
            .observe(elapsed.as_secs_f64());
    }

    fn stage_failed(&self, app: &str, stage: &str, _error: &PipelineError) {
        self.stage_runs
            .with_label_values(&[app, stage, "failure"])
            .inc();
    }

    fn run_finished(&self, app: &str, _reviews: usize, elapsed: Duration) {
        self.app_runs.with_label_values(&[app, "success"]).inc();
        self.app_run_duration
            .with_label_values(&[app])
            .observe(elapsed.as_secs_f64());
    }

    fn run_failed(&self, app: &str, _reason: &str) {
        self.app_runs.with_label_values(&[app, "failure"]).inc();
    }
}
