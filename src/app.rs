//! プロセス全体の実行ループ。アプリごとに読み込み・エンリッチ・保存を行う。
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{AppConfig, Config, ProcessConfig};
use crate::observability::PipelineTelemetry;
use crate::pipeline::filter::{filter_reviews, window_start};
use crate::pipeline::{ParallelMapExecutor, PipelineOrchestrator};
use crate::store::ReviewStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppOutcome {
    Processed { app: String, reviews: usize },
    /// Excluded by `INSIGHT_APP_FILTER`.
    Skipped { app: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppFailure {
    pub app: String,
    pub reason: String,
}

/// `run_app` の失敗。アプリ設定を読めた後は `app` にアプリ名が入る。
#[derive(Debug, Error)]
#[error("{error:#}")]
pub struct AppRunError {
    pub app: Option<String>,
    error: anyhow::Error,
}

impl AppRunError {
    fn new(app: Option<String>, error: impl Into<anyhow::Error>) -> Self {
        Self {
            app,
            error: error.into(),
        }
    }
}

/// Per-app results of one process run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub outcomes: Vec<AppOutcome>,
    pub failures: Vec<AppFailure>,
}

impl RunSummary {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 設定された全アプリを順に処理する。1アプリの失敗は他のアプリに波及しない。
pub struct AppRunner {
    config: Arc<Config>,
    orchestrator: Arc<PipelineOrchestrator>,
    telemetry: Arc<dyn PipelineTelemetry>,
}

impl AppRunner {
    #[must_use]
    pub fn new(config: Config, telemetry: Arc<dyn PipelineTelemetry>) -> Self {
        let orchestrator = PipelineOrchestrator::builder()
            .with_telemetry(Arc::clone(&telemetry))
            .build();
        Self::with_orchestrator(config, orchestrator, telemetry)
    }

    #[must_use]
    pub fn with_orchestrator(
        config: Config,
        orchestrator: PipelineOrchestrator,
        telemetry: Arc<dyn PipelineTelemetry>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            telemetry,
        }
    }

    /// Runs every app listed in the process config.
    ///
    /// Each app runs on the blocking pool; errors and panics are recorded in
    /// the summary and the next app still runs.
    ///
    /// # Errors
    /// Only when the process config itself cannot be loaded.
    pub async fn run_all(&self) -> Result<RunSummary> {
        let process = ProcessConfig::load(self.config.config_file()).with_context(|| {
            format!(
                "failed to load process config {}",
                self.config.config_file().display()
            )
        })?;
        info!(apps = process.apps.len(), "starting process run");

        let mut summary = RunSummary::default();
        for app_config_path in process.apps {
            let label = app_config_path.display().to_string();
            let started = Instant::now();
            let config = Arc::clone(&self.config);
            let orchestrator = Arc::clone(&self.orchestrator);
            let handle = tokio::task::spawn_blocking(move || {
                run_app(&config, &orchestrator, &app_config_path, Utc::now())
            });

            match handle.await {
                Ok(Ok(outcome)) => {
                    if let AppOutcome::Processed { app, reviews } = &outcome {
                        self.telemetry.run_finished(app, *reviews, started.elapsed());
                    }
                    summary.outcomes.push(outcome);
                }
                Ok(Err(err)) => {
                    let reason = err.to_string();
                    let app = err.app.unwrap_or(label);
                    self.telemetry.run_failed(&app, &reason);
                    summary.failures.push(AppFailure { app, reason });
                }
                Err(join_err) => {
                    let reason = if join_err.is_panic() {
                        "app run panicked".to_string()
                    } else {
                        format!("app run was cancelled: {join_err}")
                    };
                    self.telemetry.run_failed(&label, &reason);
                    summary.failures.push(AppFailure { app: label, reason });
                }
            }
        }

        if !summary.is_success() {
            warn!(failed = summary.failures.len(), "some apps failed");
        }
        Ok(summary)
    }
}

/// 1アプリ分の処理を同期的に実行する。
///
/// The app filter matches on the name inside the app config, so the config is
/// parsed first. A config that fails to load is reported even when the filter
/// would have excluded it; such errors carry no app name.
///
/// # Errors
/// Config resolution, review I/O and any pipeline error, with context.
pub fn run_app(
    config: &Config,
    orchestrator: &PipelineOrchestrator,
    app_config_path: &Path,
    now: DateTime<Utc>,
) -> Result<AppOutcome, AppRunError> {
    let app_config =
        AppConfig::load(app_config_path).map_err(|err| AppRunError::new(None, err))?;
    let app = app_config.name().to_string();
    if !config.app_selected(&app) {
        info!(app = %app, "app excluded by filter");
        return Ok(AppOutcome::Skipped { app });
    }

    enrich_app(config, orchestrator, &app_config, &app, now)
        .map_err(|err| AppRunError::new(Some(app), err))
}

fn enrich_app(
    config: &Config,
    orchestrator: &PipelineOrchestrator,
    app_config: &AppConfig,
    app: &str,
    now: DateTime<Utc>,
) -> Result<AppOutcome> {
    let selection = app_config
        .resolve_algorithms()
        .with_context(|| format!("failed to resolve algorithms for {app}"))?;
    let store = store_for(app_config);
    let reviews = store
        .load()
        .with_context(|| format!("failed to load reviews for {app}"))?;

    let since = window_start(now, app_config.algorithm_config.algorithm_days_filter);
    let reviews = filter_reviews(reviews, &app_config.enabled_channels(), since);
    info!(app = %app, reviews = reviews.len(), %since, "reviews selected");

    let executor =
        ParallelMapExecutor::from_limit(config.max_workers(), config.constrained_environment())?;
    let enriched = orchestrator
        .run(app, reviews, &selection, &executor)
        .with_context(|| format!("enrichment failed for {app}"))?;

    store
        .save(&enriched)
        .with_context(|| format!("failed to save reviews for {app}"))?;
    info!(app = %app, path = %store.output().display(), "processed reviews written");

    Ok(AppOutcome::Processed {
        app: app.to_string(),
        reviews: enriched.len(),
    })
}

fn store_for(app_config: &AppConfig) -> ReviewStore {
    let name = app_config.name();
    let input: PathBuf = app_config.data.parsed_reviews_path(name);
    ReviewStore::new(input, app_config.data.processed_reviews_path(name))
}
