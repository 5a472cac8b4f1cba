use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, error, info};

use insight_worker::{app::AppRunner, config::Config, observability::Telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| {
                panic_info
                    .payload()
                    .downcast_ref::<String>()
                    .map(String::as_str)
            })
            .unwrap_or("unknown panic payload");

        if let Some(location) = panic_info.location() {
            error!(
                thread = thread_name,
                file = location.file(),
                line = location.line(),
                column = location.column(),
                message,
                "panic occurred"
            );
        } else {
            error!(
                thread = thread_name,
                message, "panic occurred without location information"
            );
        }
    }));

    // Tracing initialization is handled by Telemetry::new()
    let telemetry = Telemetry::new().context("failed to initialize telemetry")?;
    let config = Config::from_env().context("failed to load configuration")?;
    info!(
        config_file = %config.config_file().display(),
        max_workers = config.max_workers().get(),
        constrained = config.constrained_environment(),
        "configuration loaded"
    );

    let runner = AppRunner::new(config, Arc::new(telemetry.clone()));
    let summary = runner.run_all().await?;
    debug!(metrics = %telemetry.render_prometheus(), "process metrics");

    if summary.is_success() {
        info!(apps = summary.outcomes.len(), "all apps processed");
        Ok(ExitCode::SUCCESS)
    } else {
        for failure in &summary.failures {
            error!(app = %failure.app, reason = %failure.reason, "app failed");
        }
        Ok(ExitCode::FAILURE)
    }
}
