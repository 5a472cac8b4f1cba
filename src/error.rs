//! パイプライン全体で共有するエラー分類。
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by an app run. None of them are retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 設定やトピックテーブルの欠落・不正、前提条件違反。
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Per-review transform failure inside the parallel executor.
    #[error("stage {stage} failed on review {review_id}: {reason}")]
    WorkerExecution {
        stage: &'static str,
        review_id: String,
        reason: String,
    },
    /// 予測ラベルがバッチ内のカテゴリに解決できなかった。
    #[error("classifier label {label:?} could not be resolved: {reason}")]
    ClassifierLookup { label: String, reason: String },
    #[error("failed to load classifier artifact {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },
    #[error("classifier inference failed: {0}")]
    Inference(String),
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn model_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short label used as a metric / log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::WorkerExecution { .. } => "worker_execution",
            Self::ClassifierLookup { .. } => "classifier_lookup",
            Self::ModelLoad { .. } => "model_load",
            Self::Inference(_) => "inference",
            Self::Io { .. } => "io",
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(PipelineError::config("x").kind(), "configuration");
        assert_eq!(
            PipelineError::ClassifierLookup {
                label: "refunds".into(),
                reason: "missing".into(),
            }
            .kind(),
            "classifier_lookup"
        );
        assert_eq!(PipelineError::Inference("x".into()).kind(), "inference");
    }

    #[test]
    fn worker_error_message_names_review() {
        let error = PipelineError::WorkerExecution {
            stage: "sentiment",
            review_id: "r-1".into(),
            reason: "boom".into(),
        };
        let message = error.to_string();
        assert!(message.contains("sentiment"));
        assert!(message.contains("r-1"));
    }
}
