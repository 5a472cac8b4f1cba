//! Review data model shared by the loader, the pipeline and the persister.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `extra_properties` keys written by the stages.
pub const CATEGORY_SCORES: &str = "category_scores";
pub const BUG_FEATURE: &str = "bug_feature";
pub const CLASSIFIER_CATEGORY: &str = "classifier_category";

/// 感情スコア。`compound` は [-1, 1]、残り3つは比率。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SentimentScore {
    pub compound: f64,
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

/// パイプラインが付与する派生情報。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedInsight {
    #[serde(default)]
    pub sentiment: Option<SentimentScore>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    extra_properties: BTreeMap<String, Value>,
}

impl DerivedInsight {
    /// Records a property. Keys are never removed within a run.
    pub fn record(&mut self, key: impl Into<String>, value: Value) {
        self.extra_properties.insert(key.into(), value);
    }

    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.extra_properties.get(key)
    }

    #[must_use]
    pub fn extra_properties(&self) -> &BTreeMap<String, Value> {
        &self.extra_properties
    }
}

/// 1件のユーザーフィードバック。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(rename = "hash_id", alias = "id")]
    pub id: String,
    pub message: String,
    pub channel_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_type: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default)]
    pub derived_insight: DerivedInsight,
    /// Loader fields this crate does not interpret, kept for the persisted output.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Review {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        message: impl Into<String>,
        channel_name: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            channel_name: channel_name.into(),
            channel_type: None,
            timestamp,
            rating: None,
            user_id: None,
            app_name: None,
            derived_insight: DerivedInsight::default(),
            extra: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.derived_insight.category = Some(category.into());
        self
    }
}
