use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use docstash::application::render::{
    RenderEngine, RenderError, RenderJob, RenderOptions, RenderService,
};
use docstash::application::templates::TemplateService;
use docstash::cache::{ContentEncoding, FileCache, WriteOptions};
use docstash::infra::telemetry;
use metrics_util::CompositeKey;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serde_json::json;
use tempfile::TempDir;

struct StaticEngine;

#[async_trait]
impl RenderEngine for StaticEngine {
    async fn render(&self, _job: RenderJob<'_>) -> Result<Bytes, RenderError> {
        Ok(Bytes::from_static(b"%PDF-1.7"))
    }
}

type Snapshot = Vec<(
    CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

fn counts_by_result(snapshot: &Snapshot, metric: &str) -> HashMap<String, u64> {
    snapshot
        .iter()
        .filter(|(composite_key, _, _, _)| composite_key.key().name() == metric)
        .filter_map(|(composite_key, _, _, value)| {
            let result = composite_key
                .key()
                .labels()
                .find(|label| label.key() == "result")?
                .value()
                .to_string();
            match value {
                DebugValue::Counter(count) => Some((result, *count)),
                _ => None,
            }
        })
        .collect()
}

#[tokio::test]
async fn cache_and_render_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let dir = TempDir::new().expect("temp dir");
    let cache = Arc::new(
        FileCache::open(dir.path().join("cache"))
            .await
            .expect("open cache"),
    );

    // write: stored, deduplicated, error
    let entry = cache
        .write(b"hello", "a.txt", ContentEncoding::Binary, WriteOptions::default())
        .await
        .expect("stored");
    cache
        .write(b"hello", "a.txt", ContentEncoding::Binary, WriteOptions::default())
        .await
        .expect("deduplicated");
    assert!(
        cache
            .write(b"zz", "a.txt", ContentEncoding::Hex, WriteOptions::default())
            .await
            .is_err()
    );

    // move
    let source = cache.staging_dir().join("incoming");
    std::fs::write(&source, b"moved").expect("write source");
    cache.move_file(&source, "moved.txt").await.expect("moved");

    // read: hit and not_found
    cache.read(entry.identifier.as_str()).await.expect("hit");
    assert!(cache.read(&"f".repeat(64)).await.is_err());

    // render histogram
    let templates = Arc::new(TemplateService::new(Arc::clone(&cache)));
    let renders = RenderService::new(Arc::clone(&templates), Arc::new(StaticEngine));
    renders
        .render(entry.identifier.as_str(), &json!({}), &RenderOptions::default())
        .await
        .expect("rendered");

    // remove
    cache
        .remove(entry.identifier.as_str())
        .await
        .expect("removed");

    // remove whose content cannot be unlinked
    let stuck = cache
        .write(b"stuck", "stuck.txt", ContentEncoding::Binary, WriteOptions::default())
        .await
        .expect("stored");
    std::fs::remove_file(&stuck.storage_path).expect("delete content");
    std::fs::create_dir(&stuck.storage_path).expect("create dir");
    std::fs::write(stuck.storage_path.join("occupant"), b"x").expect("write occupant");
    let removal = cache
        .remove(stuck.identifier.as_str())
        .await
        .expect("removed with warning");
    assert!(removal.storage_warning.is_some());

    let snapshot = snapshotter.snapshot().into_vec();
    let names: HashSet<String> = snapshot
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "docstash_cache_write_total",
        "docstash_cache_move_total",
        "docstash_cache_read_total",
        "docstash_cache_remove_total",
        "docstash_render_ms",
    ];
    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }

    let write_results = counts_by_result(&snapshot, "docstash_cache_write_total");
    assert_eq!(write_results.get("stored"), Some(&2));
    assert_eq!(write_results.get("deduplicated"), Some(&1));
    assert_eq!(write_results.get("error"), Some(&1));

    let remove_results = counts_by_result(&snapshot, "docstash_cache_remove_total");
    assert_eq!(remove_results.get("removed"), Some(&1));
    assert_eq!(remove_results.get("orphaned"), Some(&1));
}
