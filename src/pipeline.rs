//! Review enrichment pipeline: stage selection, stages and the orchestrator.
use std::path::PathBuf;

use crate::classification::ClassifierArtifacts;
use crate::error::PipelineResult;
use crate::review::Review;

pub mod bug_feature;
pub mod categorize;
pub mod executor;
pub mod filter;
pub mod orchestrator;
pub mod sentiment;

pub use executor::ParallelMapExecutor;
pub use orchestrator::{ClassifierLoader, FileClassifierLoader, PipelineBuilder, PipelineOrchestrator};

/// 1つのエンリッチメント工程。全レビューを処理し終えてから次の工程へ進む。
pub trait EnrichmentStage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns one review per input, in input order.
    ///
    /// # Errors
    /// Any error aborts the rest of the app run.
    fn enrich(
        &self,
        reviews: Vec<Review>,
        executor: &ParallelMapExecutor,
    ) -> PipelineResult<Vec<Review>>;
}

/// Categorization strategy, chosen once when the app config is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategorizationStrategy {
    KeywordMatch {
        topics: PathBuf,
    },
    /// `seed_topics` runs keyword categorization first so the classifier has
    /// categories to resolve against; without it reviews must arrive categorized.
    SequenceClassifier {
        artifacts: ClassifierArtifacts,
        seed_topics: Option<PathBuf>,
    },
}

impl CategorizationStrategy {
    #[must_use]
    pub fn stage_name(&self) -> &'static str {
        match self {
            Self::KeywordMatch { .. } => categorize::TEXT_MATCH_STAGE,
            Self::SequenceClassifier { .. } => categorize::SEQUENCE_CLASSIFIER_STAGE,
        }
    }
}

/// Stages enabled for an app, in the fixed order sentiment → categorization → bug/feature.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlgorithmSelection {
    pub sentiment: bool,
    pub categorization: Option<CategorizationStrategy>,
    /// Bug/feature topic table location.
    pub bug_feature: Option<PathBuf>,
}
