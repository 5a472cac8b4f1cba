//! カテゴリ分類ステージ（キーワード照合と系列分類器）。
use serde_json::{Value, json};
use tracing::info;

use crate::classification::sequence::classify;
use crate::classification::{ClassifierBundle, KeywordScorer, TopicTable};
use crate::error::PipelineResult;
use crate::review::{CATEGORY_SCORES, CLASSIFIER_CATEGORY, Review};

use super::orchestrator::ClassifierLoader;
use super::{CategorizationStrategy, EnrichmentStage, ParallelMapExecutor};

pub(crate) const TEXT_MATCH_STAGE: &str = "text_match_categorization";
pub(crate) const SEQUENCE_CLASSIFIER_STAGE: &str = "sequence_classifier_categorization";

/// Sets `category` and records the per-category score breakdown.
#[derive(Debug)]
pub struct KeywordCategorizationStage {
    scorer: KeywordScorer,
}

impl KeywordCategorizationStage {
    /// # Errors
    /// Returns a configuration error if the table cannot be compiled.
    pub fn new(table: &TopicTable) -> PipelineResult<Self> {
        Ok(Self {
            scorer: KeywordScorer::new(table)?,
        })
    }

    fn categorize(&self, mut review: Review) -> Review {
        let result = self.scorer.score(&review.message);
        let scores: serde_json::Map<String, Value> = result
            .scores
            .into_iter()
            .map(|(category, score)| (category, json!(score)))
            .collect();
        review.derived_insight.category = Some(result.winner);
        review
            .derived_insight
            .record(CATEGORY_SCORES, Value::Object(scores));
        review
    }
}

impl EnrichmentStage for KeywordCategorizationStage {
    fn name(&self) -> &'static str {
        TEXT_MATCH_STAGE
    }

    fn enrich(
        &self,
        reviews: Vec<Review>,
        executor: &ParallelMapExecutor,
    ) -> PipelineResult<Vec<Review>> {
        executor.map(reviews, |review| Ok(self.categorize(review)))
    }
}

/// 系列分類器によるカテゴリ付与。バッチ全体で1回だけ推論する。
///
/// The predicted label goes to `classifier_category`; `category` is left as is.
#[derive(Debug)]
pub struct SequenceClassifierStage {
    bundle: ClassifierBundle,
    seed: Option<KeywordCategorizationStage>,
}

impl SequenceClassifierStage {
    #[must_use]
    pub fn new(bundle: ClassifierBundle, seed: Option<KeywordCategorizationStage>) -> Self {
        Self { bundle, seed }
    }
}

impl EnrichmentStage for SequenceClassifierStage {
    fn name(&self) -> &'static str {
        SEQUENCE_CLASSIFIER_STAGE
    }

    fn enrich(
        &self,
        reviews: Vec<Review>,
        executor: &ParallelMapExecutor,
    ) -> PipelineResult<Vec<Review>> {
        let mut reviews = match &self.seed {
            Some(seed) => {
                info!(reviews = reviews.len(), "seeding categories with text match");
                seed.enrich(reviews, executor)?
            }
            None => reviews,
        };

        let labels = classify(&reviews, &self.bundle)?;
        for (review, label) in reviews.iter_mut().zip(labels) {
            review
                .derived_insight
                .record(CLASSIFIER_CATEGORY, Value::String(label));
        }
        Ok(reviews)
    }
}

/// Builds the stage for the resolved strategy, loading its artifacts.
///
/// # Errors
/// Topic table and classifier bundle load failures.
pub fn build_categorizer(
    strategy: &CategorizationStrategy,
    loader: &dyn ClassifierLoader,
) -> PipelineResult<Box<dyn EnrichmentStage>> {
    match strategy {
        CategorizationStrategy::KeywordMatch { topics } => {
            let table = TopicTable::load(topics)?;
            Ok(Box::new(KeywordCategorizationStage::new(&table)?))
        }
        CategorizationStrategy::SequenceClassifier {
            artifacts,
            seed_topics,
        } => {
            let seed = seed_topics
                .as_deref()
                .map(|path| {
                    TopicTable::load(path).and_then(|table| KeywordCategorizationStage::new(&table))
                })
                .transpose()?;
            let bundle = loader.load(artifacts)?;
            Ok(Box::new(SequenceClassifierStage::new(bundle, seed)))
        }
    }
}
