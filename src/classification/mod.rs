//! レビュー分類のためのスコアリング・感情分析・系列分類器。
mod label;
pub mod scoring;
pub mod sentiment;
pub mod sequence;

pub use label::normalize_label;
pub use scoring::{CategoryScores, KeywordScorer, TopicTable};
pub use sentiment::{LexiconSentimentAnalyzer, SentimentAnalyzer};
pub use sequence::{
    ArticleTokenizer, ClassifierArtifacts, ClassifierBundle, LabelTokenizer, LinearSequenceModel,
    SequenceModel,
};
