//! 辞書ベースの感情スコアラー。
use std::collections::HashMap;

use anyhow::Result;

use crate::review::SentimentScore;

/// Pure message → sentiment function consumed by the sentiment stage.
pub trait SentimentAnalyzer: Send + Sync {
    /// # Errors
    /// Implementations may fail; the stage reports it as a worker error.
    fn analyze(&self, message: &str) -> Result<SentimentScore>;
}

const NEGATION_SCALAR: f64 = -0.74;
const BOOST: f64 = 0.293;
const NORMALIZATION_ALPHA: f64 = 15.0;
const NEGATION_WINDOW: usize = 3;

const LEXICON: &[(&str, f64)] = &[
    ("amazing", 2.8),
    ("awesome", 3.1),
    ("best", 3.2),
    ("easy", 1.9),
    ("excellent", 2.7),
    ("fantastic", 2.6),
    ("fast", 1.3),
    ("good", 1.9),
    ("great", 3.1),
    ("happy", 2.7),
    ("helpful", 1.8),
    ("like", 1.5),
    ("love", 3.2),
    ("nice", 1.8),
    ("perfect", 2.7),
    ("smooth", 1.6),
    ("thanks", 1.9),
    ("useful", 1.9),
    ("wonderful", 2.7),
    ("angry", -2.3),
    ("annoying", -1.7),
    ("awful", -2.0),
    ("bad", -2.5),
    ("broken", -2.1),
    ("bug", -1.4),
    ("crash", -1.7),
    ("crashes", -1.7),
    ("disappointed", -1.9),
    ("error", -1.4),
    ("fail", -2.0),
    ("fails", -2.0),
    ("frustrating", -2.2),
    ("hate", -2.7),
    ("horrible", -2.5),
    ("poor", -2.1),
    ("sad", -2.1),
    ("slow", -1.2),
    ("terrible", -2.1),
    ("useless", -1.8),
    ("worst", -3.1),
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "cannot", "cant", "can't", "dont", "don't", "doesnt", "doesn't",
    "didnt", "didn't", "isnt", "isn't", "wont", "won't", "without",
];

const BOOSTERS: &[&str] = &[
    "very", "really", "extremely", "so", "super", "totally", "incredibly",
];

/// Lexicon scorer with negation and intensifier handling.
///
/// `compound` uses `x / sqrt(x² + 15)`; the proportions count one unit per
/// polar or neutral token.
#[derive(Debug, Clone)]
pub struct LexiconSentimentAnalyzer {
    lexicon: HashMap<&'static str, f64>,
}

impl LexiconSentimentAnalyzer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lexicon: LEXICON.iter().copied().collect(),
        }
    }

    fn tokenize(message: &str) -> Vec<String> {
        message
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|token| !token.is_empty())
            .map(str::to_lowercase)
            .collect()
    }
}

impl Default for LexiconSentimentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentAnalyzer for LexiconSentimentAnalyzer {
    fn analyze(&self, message: &str) -> Result<SentimentScore> {
        let tokens = Self::tokenize(message);
        let mut sum = 0.0_f64;
        let (mut positive, mut negative, mut neutral) = (0.0_f64, 0.0_f64, 0.0_f64);

        for (idx, token) in tokens.iter().enumerate() {
            let Some(base) = self.lexicon.get(token.as_str()).copied() else {
                if !BOOSTERS.contains(&token.as_str()) && !NEGATIONS.contains(&token.as_str()) {
                    neutral += 1.0;
                }
                continue;
            };

            let mut valence = base;
            if idx > 0 && BOOSTERS.contains(&tokens[idx - 1].as_str()) {
                valence += BOOST.copysign(valence);
            }
            let window_start = idx.saturating_sub(NEGATION_WINDOW);
            if tokens[window_start..idx]
                .iter()
                .any(|previous| NEGATIONS.contains(&previous.as_str()))
            {
                valence *= NEGATION_SCALAR;
            }

            sum += valence;
            if valence > 0.0 {
                positive += valence + 1.0;
            } else {
                negative += valence - 1.0;
            }
        }

        let compound = if sum == 0.0 {
            0.0
        } else {
            (sum / (sum * sum + NORMALIZATION_ALPHA).sqrt()).clamp(-1.0, 1.0)
        };

        let total = positive + negative.abs() + neutral;
        let score = if total == 0.0 {
            SentimentScore {
                compound,
                ..SentimentScore::default()
            }
        } else {
            SentimentScore {
                compound,
                positive: positive / total,
                negative: negative.abs() / total,
                neutral: neutral / total,
            }
        };
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(message: &str) -> SentimentScore {
        LexiconSentimentAnalyzer::new()
            .analyze(message)
            .expect("lexicon analysis is infallible")
    }

    #[test]
    fn positive_message_scores_positive() {
        let score = analyze("I love this app, it is great");
        assert!(score.compound > 0.5);
        assert!(score.positive > score.negative);
    }

    #[test]
    fn negative_message_scores_negative() {
        let score = analyze("Terrible update, the app crashes constantly");
        assert!(score.compound < -0.3);
    }

    #[test]
    fn negation_flips_polarity() {
        let plain = analyze("this is good");
        let negated = analyze("this is not good");
        assert!(plain.compound > 0.0);
        assert!(negated.compound < 0.0);
    }

    #[test]
    fn booster_increases_magnitude() {
        let plain = analyze("good");
        let boosted = analyze("very good");
        assert!(boosted.compound > plain.compound);
    }

    #[test]
    fn empty_message_is_neutral() {
        assert_eq!(analyze(""), SentimentScore::default());
    }

    #[test]
    fn proportions_sum_to_one() {
        let score = analyze("great app but slow login");
        let total = score.positive + score.negative + score.neutral;
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn analysis_is_idempotent() {
        let first = analyze("Nice design, awful battery drain");
        let second = analyze("Nice design, awful battery drain");
        assert_eq!(first, second);
    }
}
