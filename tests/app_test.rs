use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{Value, json};

use insight_worker::app::{AppOutcome, AppRunner, run_app};
use insight_worker::config::Config;
use insight_worker::observability::{Telemetry, TracingTelemetry};
use insight_worker::pipeline::PipelineOrchestrator;
use prometheus::Registry;

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_path_buf();
        Self { _dir: dir, root }
    }

    fn write(&self, relative: &str, value: &Value) -> PathBuf {
        let path = self.root.join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, serde_json::to_string_pretty(value).expect("json")).expect("write");
        path
    }

    /// One app with text-match categorization and bug/feature enabled.
    fn app(&self, name: &str) -> PathBuf {
        let now = Utc::now();
        self.write(
            &format!("data/parsed_data/{name}/parsed-user-feedback.json"),
            &json!([
                {
                    "id": "recent",
                    "message": "The app keeps crashing, really terrible",
                    "channel_name": "play-store",
                    "timestamp": now - Duration::days(1),
                    "rating": 1.0
                },
                {
                    "id": "stale",
                    "message": "crash",
                    "channel_name": "play-store",
                    "timestamp": now - Duration::days(90)
                },
                {
                    "id": "muted",
                    "message": "crash",
                    "channel_name": "twitter",
                    "timestamp": now
                },
                {
                    "hash_id": "wish",
                    "message": "Please add an export option",
                    "channel_name": "email",
                    "timestamp": now,
                    "app_version": "4.1.0"
                }
            ]),
        );
        let categories = self.write(
            "topics/categories.json",
            &json!({"Stability": {"crash": 2}, "Export": {"export": 1}}),
        );
        let bug_feature = self.write(
            "topics/bug-feature.json",
            &json!({"bug": {"crash": 1}, "feature": {"please add": 1}}),
        );
        self.write(
            &format!("apps/{name}.json"),
            &json!({
                "app": {"name": name},
                "review_channels": [
                    {"channel_name": "play-store"},
                    {"channel_name": "email"},
                    {"channel_name": "twitter", "is_channel_enabled": false}
                ],
                "algorithm_config": {
                    "algorithm_days_filter": 30,
                    "algorithms_to_run": ["sentiment_analysis", "categorization", "bug_feature_categorization"],
                    "categorization": {
                        "category_keywords_weights_file": categories,
                        "bug_feature_keywords_weights_file": bug_feature
                    }
                },
                "data": {"base_folder": self.root.join("data")}
            }),
        )
    }

    fn processed(&self, name: &str) -> Vec<Value> {
        let path = self
            .root
            .join(format!("data/processed_data/{name}/processed-user-feedback.json"));
        serde_json::from_str(&fs::read_to_string(path).expect("processed file")).expect("json")
    }
}

fn config(process: &Path) -> Config {
    Config::new(
        process.to_path_buf(),
        NonZeroUsize::new(4).expect("non-zero"),
        false,
    )
}

#[tokio::test]
async fn run_all_enriches_and_persists_each_app() {
    let fixture = Fixture::new();
    let shop = fixture.app("shop");
    let process = fixture.write(
        "config.json",
        &json!({"apps": [shop, fixture.root.join("apps/missing.json")]}),
    );
    let telemetry = Telemetry::with_registry(Registry::new()).expect("telemetry");

    let runner = AppRunner::new(config(&process), Arc::new(telemetry.clone()));
    let summary = runner.run_all().await.expect("process config loads");

    assert_eq!(
        summary.outcomes,
        vec![AppOutcome::Processed {
            app: "shop".to_string(),
            reviews: 2
        }]
    );
    assert_eq!(summary.failures.len(), 1);
    assert!(telemetry.render_prometheus().contains("insight_app_runs_total"));

    let processed = fixture.processed("shop");
    let ids: Vec<&str> = processed
        .iter()
        .map(|review| review["hash_id"].as_str().expect("hash_id"))
        .collect();
    assert_eq!(ids, vec!["recent", "wish"]);

    let recent = &processed[0]["derived_insight"];
    assert_eq!(recent["category"], json!("Stability"));
    assert_eq!(recent["extra_properties"]["bug_feature"], json!("bug"));
    assert!(recent["sentiment"]["compound"].as_f64().expect("compound") < 0.0);

    let wish = &processed[1];
    assert_eq!(wish["derived_insight"]["category"], json!("Export"));
    assert_eq!(wish["derived_insight"]["extra_properties"]["bug_feature"], json!("feature"));
    assert_eq!(wish["app_version"], json!("4.1.0"));
}

#[test]
fn filtered_out_app_is_skipped_without_output() {
    let fixture = Fixture::new();
    let shop = fixture.app("shop");
    let config = config(&fixture.root.join("config.json")).with_app_filter(vec!["other".into()]);
    let orchestrator = PipelineOrchestrator::builder()
        .with_telemetry(Arc::new(TracingTelemetry))
        .build();

    let outcome = run_app(&config, &orchestrator, &shop, Utc::now()).expect("run");

    assert_eq!(
        outcome,
        AppOutcome::Skipped {
            app: "shop".to_string()
        }
    );
    assert!(
        !fixture
            .root
            .join("data/processed_data/shop/processed-user-feedback.json")
            .exists()
    );
}

#[test]
fn failed_enrichment_persists_nothing() {
    let fixture = Fixture::new();
    let shop = fixture.app("shop");
    fs::remove_file(fixture.root.join("topics/bug-feature.json")).expect("remove topics");
    let orchestrator = PipelineOrchestrator::builder().build();

    let err = run_app(
        &config(&fixture.root.join("config.json")),
        &orchestrator,
        &shop,
        Utc::now(),
    )
    .unwrap_err();

    assert_eq!(err.app.as_deref(), Some("shop"));
    assert!(err.to_string().contains("enrichment failed for shop"));
    assert!(
        !fixture
            .root
            .join("data/processed_data/shop/processed-user-feedback.json")
            .exists()
    );
}

#[tokio::test]
async fn failed_app_is_reported_under_its_name() {
    let fixture = Fixture::new();
    let shop = fixture.app("shop");
    fs::remove_file(fixture.root.join("topics/bug-feature.json")).expect("remove topics");
    let process = fixture.write("config.json", &json!({"apps": [shop]}));
    let telemetry = Telemetry::with_registry(Registry::new()).expect("telemetry");

    let runner = AppRunner::new(config(&process), Arc::new(telemetry.clone()));
    let summary = runner.run_all().await.expect("process config loads");

    assert!(summary.outcomes.is_empty());
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].app, "shop");

    let rendered = telemetry.render_prometheus();
    assert!(rendered.contains(r#"insight_app_runs_total{app="shop",outcome="failure"} 1"#));
    assert!(!rendered.contains(&shop.display().to_string()));
}
