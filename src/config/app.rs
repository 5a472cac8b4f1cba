//! JSON で記述されるプロセス設定とアプリ別設定。
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::ConfigError;
use crate::classification::ClassifierArtifacts;
use crate::pipeline::{AlgorithmSelection, CategorizationStrategy};

const PARSED_REVIEWS_FILE: &str = "parsed-user-feedback.json";
const PROCESSED_REVIEWS_FILE: &str = "processed-user-feedback.json";
const MODEL_FILE: &str = "classifier-model.json";
const ARTICLE_TOKENIZER_FILE: &str = "article-tokenizer.json";
const LABEL_TOKENIZER_FILE: &str = "label-tokenizer.json";

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// 処理対象アプリの設定ファイル一覧。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProcessConfig {
    pub apps: Vec<PathBuf>,
}

impl ProcessConfig {
    /// # Errors
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        read_json(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppInfo {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReviewChannel {
    pub channel_name: String,
    #[serde(default)]
    pub channel_type: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub is_channel_enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnabledAlgorithm {
    SentimentAnalysis,
    Categorization,
    BugFeatureCategorization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorizationAlgorithm {
    #[default]
    TextMatchClassification,
    #[serde(alias = "lstm_classification")]
    SequenceClassification,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct CategorizationConfig {
    #[serde(default)]
    pub algorithm: CategorizationAlgorithm,
    #[serde(default)]
    pub category_keywords_weights_file: Option<PathBuf>,
    #[serde(default)]
    pub bug_feature_keywords_weights_file: Option<PathBuf>,
    /// Run text-match categorization before the sequence classifier.
    #[serde(default)]
    pub seed_with_text_match: bool,
    #[serde(default)]
    pub model_file: Option<PathBuf>,
    #[serde(default)]
    pub article_tokenizer_file: Option<PathBuf>,
    #[serde(default)]
    pub label_tokenizer_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AlgorithmConfig {
    #[serde(default = "default_days_filter")]
    pub algorithm_days_filter: u32,
    #[serde(default)]
    pub algorithms_to_run: Vec<EnabledAlgorithm>,
    #[serde(default)]
    pub categorization: CategorizationConfig,
}

fn default_days_filter() -> u32 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub base_folder: PathBuf,
    pub parsed_data_folder: String,
    pub processed_data_folder: String,
    pub models_folder: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            base_folder: PathBuf::from("data"),
            parsed_data_folder: "parsed_data".to_string(),
            processed_data_folder: "processed_data".to_string(),
            models_folder: "models".to_string(),
        }
    }
}

impl DataConfig {
    #[must_use]
    pub fn parsed_reviews_path(&self, app_name: &str) -> PathBuf {
        self.base_folder
            .join(&self.parsed_data_folder)
            .join(app_name)
            .join(PARSED_REVIEWS_FILE)
    }

    #[must_use]
    pub fn processed_reviews_path(&self, app_name: &str) -> PathBuf {
        self.base_folder
            .join(&self.processed_data_folder)
            .join(app_name)
            .join(PROCESSED_REVIEWS_FILE)
    }

    #[must_use]
    pub fn model_dir(&self, app_name: &str) -> PathBuf {
        self.base_folder.join(&self.models_folder).join(app_name)
    }
}

/// アプリ別設定。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    pub app: AppInfo,
    #[serde(default)]
    pub review_channels: Vec<ReviewChannel>,
    pub algorithm_config: AlgorithmConfig,
    #[serde(default)]
    pub data: DataConfig,
}

impl AppConfig {
    /// # Errors
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        read_json(path)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.app.name
    }

    /// Channel names whose reviews enter the pipeline.
    #[must_use]
    pub fn enabled_channels(&self) -> Vec<String> {
        self.review_channels
            .iter()
            .filter(|channel| channel.is_channel_enabled)
            .map(|channel| channel.channel_name.clone())
            .collect()
    }

    fn enabled(&self, algorithm: EnabledAlgorithm) -> bool {
        self.algorithm_config.algorithms_to_run.contains(&algorithm)
    }

    fn incomplete(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::Incomplete {
            app: self.app.name.clone(),
            reason: reason.into(),
        }
    }

    /// 有効なアルゴリズムと必要な成果物を解決する。
    ///
    /// # Errors
    /// Returns [`ConfigError::Incomplete`] when an enabled stage lacks a
    /// required file location.
    pub fn resolve_algorithms(&self) -> Result<AlgorithmSelection, ConfigError> {
        let categorization_config = &self.algorithm_config.categorization;

        let categorization = if self.enabled(EnabledAlgorithm::Categorization) {
            let keyword_file = categorization_config.category_keywords_weights_file.clone();
            let strategy = match categorization_config.algorithm {
                CategorizationAlgorithm::TextMatchClassification => {
                    CategorizationStrategy::KeywordMatch {
                        topics: keyword_file.ok_or_else(|| {
                            self.incomplete("text match categorization needs category_keywords_weights_file")
                        })?,
                    }
                }
                CategorizationAlgorithm::SequenceClassification => {
                    let seed_topics = if categorization_config.seed_with_text_match {
                        Some(keyword_file.ok_or_else(|| {
                            self.incomplete("seed_with_text_match needs category_keywords_weights_file")
                        })?)
                    } else {
                        None
                    };
                    CategorizationStrategy::SequenceClassifier {
                        artifacts: self.classifier_artifacts(),
                        seed_topics,
                    }
                }
            };
            Some(strategy)
        } else {
            None
        };

        let bug_feature = if self.enabled(EnabledAlgorithm::BugFeatureCategorization) {
            Some(
                categorization_config
                    .bug_feature_keywords_weights_file
                    .clone()
                    .ok_or_else(|| {
                        self.incomplete(
                            "bug/feature categorization needs bug_feature_keywords_weights_file",
                        )
                    })?,
            )
        } else {
            None
        };

        Ok(AlgorithmSelection {
            sentiment: self.enabled(EnabledAlgorithm::SentimentAnalysis),
            categorization,
            bug_feature,
        })
    }

    fn classifier_artifacts(&self) -> ClassifierArtifacts {
        let categorization = &self.algorithm_config.categorization;
        let model_dir = self.data.model_dir(&self.app.name);
        ClassifierArtifacts {
            model: categorization
                .model_file
                .clone()
                .unwrap_or_else(|| model_dir.join(MODEL_FILE)),
            article_tokenizer: categorization
                .article_tokenizer_file
                .clone()
                .unwrap_or_else(|| model_dir.join(ARTICLE_TOKENIZER_FILE)),
            label_tokenizer: categorization
                .label_tokenizer_file
                .clone()
                .unwrap_or_else(|| model_dir.join(LABEL_TOKENIZER_FILE)),
        }
    }
}
