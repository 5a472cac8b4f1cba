//! Pipeline orchestrator and builder for the review enrichment run.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, info_span};
use uuid::Uuid;

use crate::classification::{
    ClassifierArtifacts, ClassifierBundle, LexiconSentimentAnalyzer, SentimentAnalyzer,
};
use crate::error::PipelineResult;
use crate::observability::{PipelineTelemetry, TracingTelemetry};
use crate::review::Review;

use super::bug_feature::{self, BugFeatureStage};
use super::categorize::build_categorizer;
use super::sentiment::SentimentStage;
use super::{AlgorithmSelection, EnrichmentStage, ParallelMapExecutor};

/// 分類器バンドルの読み込み口。テストでは差し替える。
pub trait ClassifierLoader: Send + Sync {
    /// # Errors
    /// Returns [`crate::error::PipelineError::ModelLoad`] when an artifact is unusable.
    fn load(&self, artifacts: &ClassifierArtifacts) -> PipelineResult<ClassifierBundle>;
}

/// Loads the bundle from the artifact files on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileClassifierLoader;

impl ClassifierLoader for FileClassifierLoader {
    fn load(&self, artifacts: &ClassifierArtifacts) -> PipelineResult<ClassifierBundle> {
        ClassifierBundle::load(artifacts)
    }
}

/// Runs the enabled stages in the fixed order sentiment → categorization → bug/feature.
pub struct PipelineOrchestrator {
    sentiment: Arc<dyn SentimentAnalyzer>,
    telemetry: Arc<dyn PipelineTelemetry>,
    classifier_loader: Arc<dyn ClassifierLoader>,
}

/// Builder pattern for constructing `PipelineOrchestrator`.
#[derive(Default)]
pub struct PipelineBuilder {
    sentiment: Option<Arc<dyn SentimentAnalyzer>>,
    telemetry: Option<Arc<dyn PipelineTelemetry>>,
    classifier_loader: Option<Arc<dyn ClassifierLoader>>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sentiment_analyzer(mut self, analyzer: Arc<dyn SentimentAnalyzer>) -> Self {
        self.sentiment = Some(analyzer);
        self
    }

    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<dyn PipelineTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    #[must_use]
    pub fn with_classifier_loader(mut self, loader: Arc<dyn ClassifierLoader>) -> Self {
        self.classifier_loader = Some(loader);
        self
    }

    /// 未指定の協調オブジェクトは既定実装で補う。
    #[must_use]
    pub fn build(self) -> PipelineOrchestrator {
        PipelineOrchestrator {
            sentiment: self
                .sentiment
                .unwrap_or_else(|| Arc::new(LexiconSentimentAnalyzer::new())),
            telemetry: self.telemetry.unwrap_or_else(|| Arc::new(TracingTelemetry)),
            classifier_loader: self
                .classifier_loader
                .unwrap_or_else(|| Arc::new(FileClassifierLoader)),
        }
    }
}

impl PipelineOrchestrator {
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Enriches one app's reviews.
    ///
    /// Each stage finishes every review before the next one starts, and the
    /// first error aborts the rest of the run.
    ///
    /// # Errors
    /// Propagates the first stage or stage-construction error.
    pub fn run(
        &self,
        app: &str,
        reviews: Vec<Review>,
        selection: &AlgorithmSelection,
        executor: &ParallelMapExecutor,
    ) -> PipelineResult<Vec<Review>> {
        let run_id = Uuid::now_v7();
        let _span = info_span!("enrichment_run", app, %run_id).entered();
        info!(
            reviews = reviews.len(),
            workers = executor.workers(),
            "starting enrichment"
        );

        let mut reviews = reviews;

        if selection.sentiment {
            let stage = SentimentStage::new(Arc::clone(&self.sentiment));
            reviews = self.run_stage(app, &stage, reviews, executor)?;
        }

        if let Some(strategy) = &selection.categorization {
            // 分類器バンドルはこのブロックの終わりで破棄される
            let stage = self.report(
                app,
                strategy.stage_name(),
                build_categorizer(strategy, self.classifier_loader.as_ref()),
            )?;
            reviews = self.run_stage(app, stage.as_ref(), reviews, executor)?;
            info!(reviews = reviews.len(), "categorization finished");
        }

        if let Some(topics) = &selection.bug_feature {
            let stage = self.report(
                app,
                bug_feature::STAGE_NAME,
                BugFeatureStage::from_path(topics),
            )?;
            reviews = self.run_stage(app, &stage, reviews, executor)?;
        }

        debug!(reviews = reviews.len(), "enrichment complete");
        Ok(reviews)
    }

    fn run_stage(
        &self,
        app: &str,
        stage: &dyn EnrichmentStage,
        reviews: Vec<Review>,
        executor: &ParallelMapExecutor,
    ) -> PipelineResult<Vec<Review>> {
        let name = stage.name();
        self.telemetry.stage_started(app, name, reviews.len());
        let started = Instant::now();
        let enriched = self.report(app, name, stage.enrich(reviews, executor))?;
        self.telemetry
            .stage_finished(app, name, enriched.len(), started.elapsed());
        Ok(enriched)
    }

    fn report<T>(&self, app: &str, stage: &str, result: PipelineResult<T>) -> PipelineResult<T> {
        if let Err(err) = &result {
            self.telemetry.stage_failed(app, stage, err);
        }
        result
    }
}
