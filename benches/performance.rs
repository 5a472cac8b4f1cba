//! 1万件レビューのスコアリング・並列マップ性能ベンチマーク。
use std::collections::BTreeMap;

use chrono::Utc;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use insight_worker::classification::{KeywordScorer, TopicTable};
use insight_worker::pipeline::ParallelMapExecutor;
use insight_worker::pipeline::categorize::KeywordCategorizationStage;
use insight_worker::pipeline::EnrichmentStage;
use insight_worker::review::Review;

const WORDS: &[&str] = &[
    "crash", "refund", "login", "slow", "great", "charge", "update", "battery", "export", "sync",
    "password", "screen", "love", "broken", "please", "add", "dark", "mode", "support", "ads",
];

fn synthetic_messages(count: usize, words_per_message: usize) -> Vec<String> {
    (0..count)
        .map(|idx| {
            (0..words_per_message)
                .map(|offset| WORDS[(idx * 7 + offset * 3) % WORDS.len()])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn topic_table() -> TopicTable {
    let mut categories = BTreeMap::new();
    for (idx, chunk) in WORDS.chunks(4).enumerate() {
        let keywords = chunk
            .iter()
            .enumerate()
            .map(|(weight, word)| ((*word).to_string(), (weight + 1) as f64))
            .collect();
        categories.insert(format!("category-{idx}"), keywords);
    }
    TopicTable::new(categories).expect("valid table")
}

fn bench_keyword_scoring(c: &mut Criterion) {
    let messages = synthetic_messages(10_000, 24);
    let scorer = KeywordScorer::new(&topic_table()).expect("scorer");

    c.bench_function("keyword_scoring_10k_reviews", |b| {
        b.iter(|| {
            for message in &messages {
                black_box(scorer.score(message));
            }
        });
    });
}

fn bench_parallel_categorization(c: &mut Criterion) {
    let reviews: Vec<Review> = synthetic_messages(10_000, 24)
        .into_iter()
        .enumerate()
        .map(|(idx, message)| Review::new(idx.to_string(), message, "web", Utc::now()))
        .collect();
    let stage = KeywordCategorizationStage::new(&topic_table()).expect("stage");
    let executor = ParallelMapExecutor::new(num_cpus::get()).expect("pool");

    c.bench_function("parallel_categorization_10k_reviews", |b| {
        b.iter(|| {
            let out = stage
                .enrich(reviews.clone(), &executor)
                .expect("categorization");
            black_box(out.len());
        });
    });
}

criterion_group!(benches, bench_keyword_scoring, bench_parallel_categorization);
criterion_main!(benches);
