//! 重み付きキーワード照合によるカテゴリスコアリング。
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use serde::Deserialize;

use crate::error::{PipelineError, PipelineResult};

/// カテゴリ名 → (キーワード → 重み)。
///
/// Categories and keywords are kept in lexicographic order, which fixes both
/// the summation order and the tie-break.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<String, BTreeMap<String, f64>>")]
pub struct TopicTable {
    categories: BTreeMap<String, BTreeMap<String, f64>>,
}

impl TopicTable {
    /// Validates and wraps a raw table.
    ///
    /// # Errors
    /// Returns [`PipelineError::Configuration`] when the table is empty, a
    /// category has no keywords, a keyword is blank, or a weight is negative
    /// or not finite.
    pub fn new(categories: BTreeMap<String, BTreeMap<String, f64>>) -> PipelineResult<Self> {
        if categories.is_empty() {
            return Err(PipelineError::config("topic table has no categories"));
        }
        for (category, keywords) in &categories {
            if keywords.is_empty() {
                return Err(PipelineError::config(format!(
                    "category {category:?} has no keywords"
                )));
            }
            for (keyword, weight) in keywords {
                if keyword.trim().is_empty() {
                    return Err(PipelineError::config(format!(
                        "category {category:?} contains a blank keyword"
                    )));
                }
                if !weight.is_finite() || *weight < 0.0 {
                    return Err(PipelineError::config(format!(
                        "keyword {keyword:?} in {category:?} has invalid weight {weight}"
                    )));
                }
            }
        }
        Ok(Self { categories })
    }

    /// Reads a topic table JSON file.
    ///
    /// # Errors
    /// Missing files map to [`PipelineError::Io`]; malformed or invalid
    /// tables map to [`PipelineError::Configuration`].
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| PipelineError::io(path, source))?;
        serde_json::from_str(&raw).map_err(|err| {
            PipelineError::config(format!("invalid topic table {}: {err}", path.display()))
        })
    }
}

impl TryFrom<BTreeMap<String, BTreeMap<String, f64>>> for TopicTable {
    type Error = PipelineError;

    fn try_from(value: BTreeMap<String, BTreeMap<String, f64>>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// スコアリング結果。
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryScores {
    pub scores: BTreeMap<String, f64>,
    pub winner: String,
}

/// A [`TopicTable`] compiled into a single Aho-Corasick automaton.
///
/// Immutable after construction; shared by reference across workers.
#[derive(Debug)]
pub struct KeywordScorer {
    categories: Vec<String>,
    // per category: (pattern id, weight) in keyword order
    keywords: Vec<Vec<(usize, f64)>>,
    matcher: AhoCorasick,
}

impl KeywordScorer {
    /// # Errors
    /// Returns [`PipelineError::Configuration`] if the automaton cannot be built.
    pub fn new(table: &TopicTable) -> PipelineResult<Self> {
        let mut pattern_ids: BTreeMap<String, usize> = BTreeMap::new();
        let mut patterns: Vec<String> = Vec::new();
        let mut categories = Vec::with_capacity(table.categories.len());
        let mut keywords = Vec::with_capacity(table.categories.len());

        for (category, entries) in &table.categories {
            let mut weighted = Vec::with_capacity(entries.len());
            for (keyword, weight) in entries {
                let lowered = keyword.to_lowercase();
                let id = *pattern_ids.entry(lowered.clone()).or_insert_with(|| {
                    patterns.push(lowered);
                    patterns.len() - 1
                });
                weighted.push((id, *weight));
            }
            categories.push(category.clone());
            keywords.push(weighted);
        }

        let matcher = AhoCorasickBuilder::new()
            .match_kind(MatchKind::Standard)
            .build(&patterns)
            .map_err(|err| PipelineError::config(format!("failed to build keyword matcher: {err}")))?;

        Ok(Self {
            categories,
            keywords,
            matcher,
        })
    }

    /// Scores `message` against every category.
    ///
    /// Matching is case-insensitive substring containment and each keyword
    /// counts once. Ties on the maximum go to the lexicographically smallest
    /// category name.
    #[must_use]
    pub fn score(&self, message: &str) -> CategoryScores {
        let haystack = message.to_lowercase();
        let mut hit = vec![false; self.matcher.patterns_len()];
        for mat in self.matcher.find_overlapping_iter(&haystack) {
            hit[mat.pattern().as_usize()] = true;
        }

        let mut scores = BTreeMap::new();
        let mut winner: Option<(&str, f64)> = None;
        for (category, weighted) in self.categories.iter().zip(&self.keywords) {
            let score = weighted
                .iter()
                .filter(|(id, _)| hit[*id])
                .fold(0.0_f64, |acc, (_, weight)| acc + weight);
            if winner.is_none_or(|(_, best)| score > best) {
                winner = Some((category, score));
            }
            scores.insert(category.clone(), score);
        }

        // TopicTable::new rejects empty tables, so there is always a winner.
        let winner = winner.map(|(name, _)| name.to_string()).unwrap_or_default();
        CategoryScores { scores, winner }
    }
}

/// Convenience wrapper for one-off scoring.
///
/// # Errors
/// See [`KeywordScorer::new`].
pub fn score(message: &str, table: &TopicTable) -> PipelineResult<CategoryScores> {
    Ok(KeywordScorer::new(table)?.score(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn table(raw: serde_json::Value) -> TopicTable {
        serde_json::from_value(raw).expect("valid table")
    }

    fn billing_bug() -> TopicTable {
        table(serde_json::json!({
            "billing": {"refund": 2, "charge": 1},
            "bug": {"crash": 3}
        }))
    }

    #[test]
    fn scores_billing_and_bug_scenario() {
        let result = score("app crashes after charge", &billing_bug()).expect("scores");

        assert_eq!(result.scores["billing"], 1.0);
        assert_eq!(result.scores["bug"], 3.0);
        assert_eq!(result.winner, "bug");
    }

    #[test]
    fn keyword_counts_once_per_message() {
        let result = score("refund refund refund", &billing_bug()).expect("scores");
        assert_eq!(result.scores["billing"], 2.0);
    }

    #[test]
    fn matching_ignores_case() {
        let result = score("CRASH on launch", &billing_bug()).expect("scores");
        assert_eq!(result.winner, "bug");
    }

    #[test]
    fn overlapping_keywords_both_count() {
        let topics = table(serde_json::json!({
            "login": {"log": 1, "login": 2},
            "other": {"zzz": 1}
        }));
        let result = score("cannot login", &topics).expect("scores");
        assert_eq!(result.scores["login"], 3.0);
    }

    #[rstest]
    #[case("nothing relevant here", "alpha")]
    #[case("beta gamma", "beta")]
    #[case("shared", "alpha")]
    fn ties_resolve_to_smallest_category_name(#[case] message: &str, #[case] expected: &str) {
        let topics = table(serde_json::json!({
            "gamma": {"gamma": 1, "shared": 1},
            "beta": {"beta": 1, "shared": 1},
            "alpha": {"alpha": 1, "shared": 1}
        }));
        let result = score(message, &topics).expect("scores");
        assert_eq!(result.winner, expected);
    }

    #[test]
    fn every_category_is_present_in_scores() {
        let result = score("", &billing_bug()).expect("scores");
        assert_eq!(result.scores.len(), 2);
        assert!(result.scores.values().all(|value| *value == 0.0));
    }

    #[test]
    fn repeated_scoring_is_bit_identical() {
        let topics = table(serde_json::json!({
            "a": {"x": 0.1, "y": 0.2, "z": 0.3},
            "b": {"x": 0.3, "w": 0.3}
        }));
        let scorer = KeywordScorer::new(&topics).expect("scorer");
        let first = scorer.score("x y z w");
        for _ in 0..10 {
            let again = scorer.score("x y z w");
            assert_eq!(again.scores["a"].to_bits(), first.scores["a"].to_bits());
            assert_eq!(again.winner, first.winner);
        }
    }

    #[rstest]
    #[case(serde_json::json!({}))]
    #[case(serde_json::json!({"a": {}}))]
    #[case(serde_json::json!({"a": {" ": 1}}))]
    #[case(serde_json::json!({"a": {"x": -1}}))]
    fn rejects_invalid_tables(#[case] raw: serde_json::Value) {
        assert!(serde_json::from_value::<TopicTable>(raw).is_err());
    }

    #[test]
    fn load_reports_missing_file_as_io() {
        let err = TopicTable::load(Path::new("/nonexistent/topics.json")).unwrap_err();
        assert_eq!(err.kind(), "io");
    }
}
