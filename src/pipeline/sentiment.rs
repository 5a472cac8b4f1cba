use std::sync::Arc;

use crate::classification::SentimentAnalyzer;
use crate::error::{PipelineError, PipelineResult};
use crate::review::Review;

use super::{EnrichmentStage, ParallelMapExecutor};

pub(crate) const STAGE_NAME: &str = "sentiment_analysis";

#[derive(Clone)]
pub struct SentimentStage {
    analyzer: Arc<dyn SentimentAnalyzer>,
}

impl SentimentStage {
    #[must_use]
    pub fn new(analyzer: Arc<dyn SentimentAnalyzer>) -> Self {
        Self { analyzer }
    }
}

fn add_sentiment(analyzer: &dyn SentimentAnalyzer, mut review: Review) -> PipelineResult<Review> {
    let score = analyzer
        .analyze(&review.message)
        .map_err(|err| PipelineError::WorkerExecution {
            stage: STAGE_NAME,
            review_id: review.id.clone(),
            reason: format!("{err:#}"),
        })?;
    review.derived_insight.sentiment = Some(score);
    Ok(review)
}

impl EnrichmentStage for SentimentStage {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    fn enrich(
        &self,
        reviews: Vec<Review>,
        executor: &ParallelMapExecutor,
    ) -> PipelineResult<Vec<Review>> {
        let analyzer = self.analyzer.as_ref();
        executor.map(reviews, |review| add_sentiment(analyzer, review))
    }
}
