pub mod metrics;
pub mod tracing;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use prometheus::{Encoder, Registry, TextEncoder};

use self::metrics::Metrics;
use crate::error::PipelineError;

/// パイプラインのライフサイクル通知。観測専用で結果には影響しない。
pub trait PipelineTelemetry: Send + Sync {
    fn stage_started(&self, app: &str, stage: &str, reviews: usize);
    fn stage_finished(&self, app: &str, stage: &str, reviews: usize, elapsed: Duration);
    fn stage_failed(&self, app: &str, stage: &str, error: &PipelineError);
    fn run_finished(&self, app: &str, reviews: usize, elapsed: Duration);
    fn run_failed(&self, app: &str, reason: &str);
}

/// Emits one structured log line per lifecycle event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl PipelineTelemetry for TracingTelemetry {
    fn stage_started(&self, app: &str, stage: &str, reviews: usize) {
        ::tracing::info!(app, stage, reviews, "stage started");
    }

    fn stage_finished(&self, app: &str, stage: &str, reviews: usize, elapsed: Duration) {
        ::tracing::info!(
            app,
            stage,
            reviews,
            elapsed_secs = elapsed.as_secs_f64(),
            "stage finished"
        );
    }

    fn stage_failed(&self, app: &str, stage: &str, error: &PipelineError) {
        ::tracing::error!(app, stage, kind = error.kind(), error = %error, "stage failed");
    }

    fn run_finished(&self, app: &str, reviews: usize, elapsed: Duration) {
        ::tracing::info!(
            app,
            reviews,
            elapsed_secs = elapsed.as_secs_f64(),
            "app run finished"
        );
    }

    fn run_failed(&self, app: &str, reason: &str) {
        ::tracing::error!(app, reason, "app run failed");
    }
}

/// Telemetry（メトリクスとトレーシング）を管理する構造体。
#[derive(Debug, Clone)]
pub struct Telemetry {
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
}

impl Telemetry {
    /// 新しいTelemetryインスタンスを作成し、トレーシングとメトリクスを初期化する。
    ///
    /// # Errors
    /// Tracing の初期化またはメトリクス登録に失敗した場合。
    pub fn new() -> Result<Self> {
        tracing::init()?;
        Self::with_registry(Registry::new())
    }

    /// Registers metrics on `registry` without touching the global subscriber.
    ///
    /// # Errors
    /// Returns an error when the metrics are already registered.
    pub fn with_registry(registry: Registry) -> Result<Self> {
        let registry = Arc::new(registry);
        let metrics = Arc::new(Metrics::new(&registry)?);
        Ok(Self { registry, metrics })
    }

    /// Prometheusメトリクスをレンダリングする。
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl PipelineTelemetry for Telemetry {
    fn stage_started(&self, app: &str, stage: &str, reviews: usize) {
        TracingTelemetry.stage_started(app, stage, reviews);
        self.metrics.stage_started(app, stage, reviews);
    }

    fn stage_finished(&self, app: &str, stage: &str, reviews: usize, elapsed: Duration) {
        TracingTelemetry.stage_finished(app, stage, reviews, elapsed);
        self.metrics.stage_finished(app, stage, reviews, elapsed);
    }

    fn stage_failed(&self, app: &str, stage: &str, error: &PipelineError) {
        TracingTelemetry.stage_failed(app, stage, error);
        self.metrics.stage_failed(app, stage, error);
    }

    fn run_finished(&self, app: &str, reviews: usize, elapsed: Duration) {
        TracingTelemetry.run_finished(app, reviews, elapsed);
        self.metrics.run_finished(app, reviews, elapsed);
    }

    fn run_failed(&self, app: &str, reason: &str) {
        TracingTelemetry.run_failed(app, reason);
        self.metrics.run_failed(app, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_metrics_from_own_registry() {
        let telemetry = Telemetry::with_registry(Registry::new()).expect("telemetry");

        telemetry.stage_finished("shop", "sentiment_analysis", 3, Duration::from_millis(2));
        telemetry.run_finished("shop", 3, Duration::from_millis(10));

        let rendered = telemetry.render_prometheus();
        assert!(rendered.contains("insight_reviews_enriched_total"));
        assert!(rendered.contains(r#"app="shop""#));
        assert!(rendered.contains("insight_app_run_duration_seconds"));
    }
}
