use std::path::Path;

use serde_json::Value;

use crate::classification::{KeywordScorer, TopicTable};
use crate::error::PipelineResult;
use crate::review::{BUG_FEATURE, Review};

use super::{EnrichmentStage, ParallelMapExecutor};

pub(crate) const STAGE_NAME: &str = "bug_feature_categorization";

/// バグ報告か機能要望かを判定する。勝者ラベルのみを記録する。
#[derive(Debug)]
pub struct BugFeatureStage {
    scorer: KeywordScorer,
}

impl BugFeatureStage {
    /// # Errors
    /// Returns a configuration error if the table cannot be compiled.
    pub fn new(table: &TopicTable) -> PipelineResult<Self> {
        Ok(Self {
            scorer: KeywordScorer::new(table)?,
        })
    }

    /// # Errors
    /// Topic table read or validation failures.
    pub fn from_path(path: &Path) -> PipelineResult<Self> {
        Self::new(&TopicTable::load(path)?)
    }
}

impl EnrichmentStage for BugFeatureStage {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    fn enrich(
        &self,
        reviews: Vec<Review>,
        executor: &ParallelMapExecutor,
    ) -> PipelineResult<Vec<Review>> {
        executor.map(reviews, |mut review| {
            let winner = self.scorer.score(&review.message).winner;
            review.derived_insight.record(BUG_FEATURE, Value::String(winner));
            Ok(review)
        })
    }
}
