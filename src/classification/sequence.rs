//! Sequence classifier adapter: model + article tokenizer + label tokenizer.
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use serde::Deserialize;
use serde_json::Value;
use tokenizers::Tokenizer;
use tracing::debug;

use super::label::normalize_label;
use crate::error::{PipelineError, PipelineResult};
use crate::review::Review;

/// 学習済みモデルの入出力契約。1入力につき1つのラベル番号を返す。
pub trait SequenceModel: Send + Sync {
    /// # Errors
    /// Returns an error when inference fails.
    fn predict(&self, sequences: &[Vec<u32>]) -> Result<Vec<usize>>;
}

/// 記事本文をトークンID列へ変換する。
pub trait ArticleTokenizer: Send + Sync {
    /// # Errors
    /// Returns an error when encoding fails.
    fn encode_articles(&self, articles: &[&str]) -> Result<Vec<Vec<u32>>>;
}

impl ArticleTokenizer for Tokenizer {
    fn encode_articles(&self, articles: &[&str]) -> Result<Vec<Vec<u32>>> {
        let encodings = self
            .encode_batch(articles.to_vec(), false)
            .map_err(|e| anyhow!("failed to encode articles: {e}"))?;
        Ok(encodings
            .iter()
            .map(|encoding| encoding.get_ids().to_vec())
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct LinearWeights {
    vocab_size: usize,
    #[serde(default)]
    max_length: Option<usize>,
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

impl LinearWeights {
    fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.weights.is_empty(), "model has no output labels");
        anyhow::ensure!(
            self.weights.len() == self.bias.len(),
            "bias length mismatch: {} labels, {} biases",
            self.weights.len(),
            self.bias.len()
        );
        for row in &self.weights {
            anyhow::ensure!(row.len() == self.vocab_size, "weight row length mismatch");
        }
        Ok(())
    }
}

/// Bag-of-token-ids linear classifier loaded from a weights JSON file.
///
/// Row `i` of `weights` scores label index `i` of the label tokenizer.
#[derive(Debug)]
pub struct LinearSequenceModel {
    vocab_size: usize,
    max_length: Option<usize>,
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

impl LinearSequenceModel {
    /// # Errors
    /// Returns an error when the file cannot be read, parsed or validated.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// # Errors
    /// Returns an error when the JSON is malformed or dimensions disagree.
    pub fn from_json(raw: &str) -> Result<Self> {
        let weights: LinearWeights = serde_json::from_str(raw)?;
        weights.validate()?;
        Ok(Self {
            vocab_size: weights.vocab_size,
            max_length: weights.max_length,
            weights: weights.weights,
            bias: weights.bias,
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn predict_one(&self, sequence: &[u32]) -> usize {
        let sequence = match self.max_length {
            Some(limit) if sequence.len() > limit => &sequence[..limit],
            _ => sequence,
        };
        let known: Vec<usize> = sequence
            .iter()
            .filter_map(|id| usize::try_from(*id).ok())
            .filter(|id| *id < self.vocab_size)
            .collect();
        let norm = if known.is_empty() {
            0.0
        } else {
            1.0 / known.len() as f32
        };

        let mut best = (0, f32::NEG_INFINITY);
        for (label, row) in self.weights.iter().enumerate() {
            let activation: f32 = known.iter().map(|id| row[*id]).sum::<f32>() * norm;
            let score = self.bias[label] + activation;
            if score > best.1 {
                best = (label, score);
            }
        }
        best.0
    }
}

impl SequenceModel for LinearSequenceModel {
    fn predict(&self, sequences: &[Vec<u32>]) -> Result<Vec<usize>> {
        Ok(sequences.iter().map(|seq| self.predict_one(seq)).collect())
    }
}

/// ラベル番号 → 正規化済みラベル文字列。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTokenizer {
    index_word: BTreeMap<usize, String>,
}

impl LabelTokenizer {
    #[must_use]
    pub fn new(index_word: BTreeMap<usize, String>) -> Self {
        Self { index_word }
    }

    /// Accepts the Keras `tokenizer_to_json` layout, where `config.index_word`
    /// is itself a JSON-encoded string, or a plain `{"index_word": {...}}`.
    ///
    /// # Errors
    /// Returns an error when neither layout matches or an index is not numeric.
    pub fn from_json(raw: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(raw)?;
        let index_word = match root.pointer("/config/index_word") {
            Some(Value::String(encoded)) => serde_json::from_str::<Value>(encoded)?,
            Some(other) => other.clone(),
            None => root
                .get("index_word")
                .cloned()
                .ok_or_else(|| anyhow!("label tokenizer has no index_word table"))?,
        };
        let entries: HashMap<String, String> = serde_json::from_value(index_word)?;

        let mut parsed = BTreeMap::new();
        for (index, word) in entries {
            let index: usize = index
                .parse()
                .map_err(|_| anyhow!("label index {index:?} is not a number"))?;
            parsed.insert(index, word);
        }
        Ok(Self::new(parsed))
    }

    #[must_use]
    pub fn label(&self, index: usize) -> Option<&str> {
        self.index_word.get(&index).map(String::as_str)
    }
}

/// Artifact locations resolved from the app config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierArtifacts {
    pub model: PathBuf,
    pub article_tokenizer: PathBuf,
    pub label_tokenizer: PathBuf,
}

/// Model and tokenizers for one app run. Not cached between runs.
pub struct ClassifierBundle {
    model: Box<dyn SequenceModel>,
    article_tokenizer: Box<dyn ArticleTokenizer>,
    label_tokenizer: LabelTokenizer,
}

impl std::fmt::Debug for ClassifierBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierBundle")
            .field("model", &"<SequenceModel>")
            .field("article_tokenizer", &"<ArticleTokenizer>")
            .field("label_tokenizer", &self.label_tokenizer)
            .finish()
    }
}

impl ClassifierBundle {
    #[must_use]
    pub fn new(
        model: Box<dyn SequenceModel>,
        article_tokenizer: Box<dyn ArticleTokenizer>,
        label_tokenizer: LabelTokenizer,
    ) -> Self {
        Self {
            model,
            article_tokenizer,
            label_tokenizer,
        }
    }

    /// Loads the weights model, the HF article tokenizer and the label tokenizer.
    ///
    /// # Errors
    /// Any failure is reported as [`PipelineError::ModelLoad`] naming the artifact.
    pub fn load(artifacts: &ClassifierArtifacts) -> PipelineResult<Self> {
        let model = LinearSequenceModel::from_path(&artifacts.model)
            .map_err(|err| PipelineError::model_load(&artifacts.model, format!("{err:#}")))?;
        let article_tokenizer = Tokenizer::from_file(&artifacts.article_tokenizer)
            .map_err(|err| PipelineError::model_load(&artifacts.article_tokenizer, err))?;
        let label_tokenizer = fs::read_to_string(&artifacts.label_tokenizer)
            .map_err(anyhow::Error::from)
            .and_then(|raw| LabelTokenizer::from_json(&raw))
            .map_err(|err| {
                PipelineError::model_load(&artifacts.label_tokenizer, format!("{err:#}"))
            })?;

        debug!(
            model = %artifacts.model.display(),
            "classifier bundle loaded"
        );
        Ok(Self::new(
            Box::new(model),
            Box::new(article_tokenizer),
            label_tokenizer,
        ))
    }
}

/// Builds the batch-scoped `normalized label -> original label` table.
///
/// # Errors
/// Returns [`PipelineError::Configuration`] if any review has no category yet.
pub fn build_label_lookup(reviews: &[Review]) -> PipelineResult<HashMap<String, String>> {
    let mut lookup = HashMap::with_capacity(reviews.len());
    for review in reviews {
        let category = review
            .derived_insight
            .category
            .as_deref()
            .filter(|category| !category.is_empty())
            .ok_or_else(|| {
                PipelineError::config(format!(
                    "review {} has no category; sequence classification requires a prior categorization",
                    review.id
                ))
            })?;
        lookup.insert(normalize_label(category), category.to_string());
    }
    Ok(lookup)
}

/// Predicts one display label per review, in input order.
///
/// Predicted labels resolve only against categories present in this batch.
///
/// # Errors
/// - [`PipelineError::Configuration`] when a review has no category.
/// - [`PipelineError::Inference`] when tokenization or the model fails.
/// - [`PipelineError::ClassifierLookup`] when a prediction cannot be resolved.
pub fn classify(reviews: &[Review], bundle: &ClassifierBundle) -> PipelineResult<Vec<String>> {
    let lookup = build_label_lookup(reviews)?;
    if reviews.is_empty() {
        return Ok(Vec::new());
    }

    let articles: Vec<&str> = reviews.iter().map(|review| review.message.as_str()).collect();
    let sequences = bundle
        .article_tokenizer
        .encode_articles(&articles)
        .map_err(|err| PipelineError::Inference(format!("{err:#}")))?;
    let predictions = bundle
        .model
        .predict(&sequences)
        .map_err(|err| PipelineError::Inference(format!("{err:#}")))?;
    if predictions.len() != reviews.len() {
        return Err(PipelineError::Inference(format!(
            "model returned {} predictions for {} reviews",
            predictions.len(),
            reviews.len()
        )));
    }

    predictions
        .into_iter()
        .map(|index| {
            let normalized =
                bundle
                    .label_tokenizer
                    .label(index)
                    .ok_or_else(|| PipelineError::ClassifierLookup {
                        label: index.to_string(),
                        reason: "index is not in the label tokenizer".to_string(),
                    })?;
            lookup
                .get(normalized)
                .cloned()
                .ok_or_else(|| PipelineError::ClassifierLookup {
                    label: normalized.to_string(),
                    reason: "no review in this batch carries that category".to_string(),
                })
        })
        .collect()
}
