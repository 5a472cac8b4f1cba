use std::{env, num::NonZeroUsize, path::PathBuf};

use thiserror::Error;

pub mod app;

pub use app::{
    AlgorithmConfig, AppConfig, AppInfo, CategorizationAlgorithm, CategorizationConfig,
    DataConfig, EnabledAlgorithm, ProcessConfig, ReviewChannel,
};

const DEFAULT_CONFIG_FILE: &str = "app/config.json";
const DEFAULT_MAX_WORKERS: usize = 8;
const CONSTRAINED_ENV_FLAGS: &[&str] = &["CIRCLECI", "CI"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    config_file: PathBuf,
    max_workers: NonZeroUsize,
    constrained_environment: bool,
    app_filter: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("app {app}: {reason}")]
    Incomplete { app: String, reason: String },
}

impl Config {
    /// 環境変数からワーカー全体の設定値を読み込む。
    ///
    /// # Errors
    /// 数値のパースに失敗した場合は [`ConfigError::Invalid`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let config_file = env::var("INSIGHT_CONFIG_FILE")
            .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);
        let max_workers = parse_non_zero_usize("INSIGHT_MAX_WORKERS", DEFAULT_MAX_WORKERS)?;
        let constrained_environment = CONSTRAINED_ENV_FLAGS.iter().any(|name| flag_set(name));
        let app_filter = parse_csv("INSIGHT_APP_FILTER");

        Ok(Self {
            config_file,
            max_workers,
            constrained_environment,
            app_filter,
        })
    }

    #[must_use]
    pub fn new(config_file: PathBuf, max_workers: NonZeroUsize, constrained: bool) -> Self {
        Self {
            config_file,
            max_workers,
            constrained_environment: constrained,
            app_filter: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_app_filter(mut self, apps: Vec<String>) -> Self {
        self.app_filter = apps;
        self
    }

    #[must_use]
    pub fn config_file(&self) -> &std::path::Path {
        &self.config_file
    }

    #[must_use]
    pub fn max_workers(&self) -> NonZeroUsize {
        self.max_workers
    }

    /// CI などの制約環境ではワーカー数を2に固定する。
    #[must_use]
    pub fn constrained_environment(&self) -> bool {
        self.constrained_environment
    }

    #[must_use]
    pub fn app_selected(&self, app_name: &str) -> bool {
        self.app_filter.is_empty() || self.app_filter.iter().any(|name| name == app_name)
    }
}

fn flag_set(name: &str) -> bool {
    env::var(name).is_ok_and(|value| {
        let value = value.trim();
        !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
    })
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.trim().parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    NonZeroUsize::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_csv(name: &'static str) -> Vec<String> {
    env::var(name)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}
