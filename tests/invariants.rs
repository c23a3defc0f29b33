//! Contract Invariant Tests
//!
//! End-to-end guarantees of the ingestion pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use cardrules_core::{
    storage::{FsBlobStore, FsKeyValueStore, MemoryBlobStore, MemoryKeyValueStore},
    BlobStore, Category, FetchError, FixedClock, IngestionPipeline, KeyValueStore, PageFetcher,
    PipelineError, ProcessStatus, PublishError, PutOptions, RulesetPublisher, StorageError,
    TextFetcher,
};

const SAMPLE_HTML: &str = r#"
<html>
  <head>
    <title>HSBC Red Credit Card Benefits | Earn up to 4% Cashback</title>
  </head>
  <body>
    <h1>HSBC Red Credit Card</h1>
    <p>Earn 1% cashback on all local spend with no minimum.</p>
    <p>Enjoy 4% cashback on online shopping worldwide.</p>
    <p>Groceries get 2.5% rebate at supermarkets and grocery stores.</p>
    <p>Welcome bonus: Limited time offer of extra 8% cashback when you spend HK$8,000.</p>
    <p>Annual fee: HK$400 waived for first year.</p>
    <p>Foreign transaction fee of 3.5% applies to overseas purchases.</p>
  </body>
</html>
"#;

const URL: &str = "https://www.example.com/hsbc-red";

struct StaticFetcher(String);

#[async_trait]
impl TextFetcher for StaticFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
        Ok(self.0.clone())
    }
}

struct RefusingFetcher;

#[async_trait]
impl TextFetcher for RefusingFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        Err(FetchError::Transport(format!("connection refused: {}", url)))
    }
}

struct FailingBlobStore;

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn put(&self, _key: &str, _value: &str, _options: PutOptions) -> Result<(), StorageError> {
        Err(StorageError::Backend("bucket unavailable".to_string()))
    }
}

struct Stores {
    snapshots: Arc<MemoryBlobStore>,
    rulesets: Arc<MemoryBlobStore>,
    pointers: Arc<MemoryKeyValueStore>,
}

fn create_pipeline(html: &str) -> (IngestionPipeline, Stores) {
    let stores = Stores {
        snapshots: Arc::new(MemoryBlobStore::new()),
        rulesets: Arc::new(MemoryBlobStore::new()),
        pointers: Arc::new(MemoryKeyValueStore::new()),
    };
    let clock = Arc::new(FixedClock("2023-10-01T00:00:00Z".parse().unwrap()));
    let fetcher = PageFetcher::new(Arc::new(StaticFetcher(html.to_string())), stores.snapshots.clone())
        .with_clock(clock.clone());
    let publisher = RulesetPublisher::new(stores.rulesets.clone(), stores.pointers.clone())
        .with_clock(clock);
    (IngestionPipeline::new(fetcher, publisher), stores)
}

#[tokio::test]
async fn invariant_sample_page_is_published() {
    let (pipeline, stores) = create_pipeline(SAMPLE_HTML);

    let outcome = pipeline.process(URL, "HK").await.unwrap();
    assert_eq!(outcome.status, ProcessStatus::Published);

    let ruleset = &outcome.ruleset;
    assert_eq!(ruleset.card_name, "HSBC Red Credit Card");
    assert_eq!(ruleset.currency, "HKD");
    assert_eq!(ruleset.rule(Category::Online).unwrap().rate, 4.0);
    assert_eq!(ruleset.rule(Category::Groceries).unwrap().rate, 2.5);
    assert_eq!(ruleset.rule(Category::WelcomeOffer).unwrap().rate, 8.0);
    assert_eq!(ruleset.rule(Category::General).unwrap().rate, 1.0);
    assert_eq!(ruleset.rules.len(), 4);
    assert_eq!(ruleset.base_rate, 1.0);
    assert_eq!(ruleset.annual_fee, Some(400.0));
    assert_eq!(ruleset.fx_fee, Some(3.5));
    assert!(ruleset.promotions.iter().any(|p| p.contains("Limited time")));
    assert!(outcome.validation.valid);

    let published = outcome.publish_result.unwrap();
    assert_eq!(published.card_key, "hsbc-red-credit-card-hk");
    assert_eq!(published.version, "1");
    assert_eq!(published.storage_key, "rulesets/hsbc-red-credit-card-hk/v1.json");
    assert_eq!(published.content_hash, ruleset.content_hash);

    let blob = stores.rulesets.get(&published.storage_key).await.unwrap();
    assert!(blob.value.contains("\"cardName\": \"HSBC Red Credit Card\""));

    let pointer = stores
        .pointers
        .get(&published.card_key)
        .await
        .unwrap()
        .unwrap();
    assert!(pointer.contains(&published.storage_key));

    let snapshot_key = format!("snapshots/hk/{}.html", ruleset.content_hash);
    assert_eq!(stores.snapshots.keys().await, vec![snapshot_key]);
}

#[tokio::test]
async fn invariant_sequential_publishes_are_versioned() {
    let (pipeline, stores) = create_pipeline(SAMPLE_HTML);

    let first = pipeline.process(URL, "HK").await.unwrap().publish_result.unwrap();
    let second = pipeline.process(URL, "HK").await.unwrap().publish_result.unwrap();

    assert_eq!(first.version, "1");
    assert_eq!(second.version, "2");
    assert_ne!(first.storage_key, second.storage_key);
    assert_eq!(stores.rulesets.len().await, 2);
    // Same content, same snapshot key.
    assert_eq!(stores.snapshots.len().await, 1);

    let latest = pipeline.publisher().latest(&second.card_key).await.unwrap().unwrap();
    assert_eq!(latest.version, "2");
    assert_eq!(latest.storage_key, second.storage_key);
}

#[tokio::test]
async fn invariant_invalid_ruleset_is_never_published() {
    let (pipeline, stores) = create_pipeline(SAMPLE_HTML);

    let outcome = pipeline.process(URL, "").await.unwrap();

    assert_eq!(outcome.status, ProcessStatus::NeedsReview);
    assert!(outcome.publish_result.is_none());
    assert!(!outcome.validation.valid);
    assert!(outcome.validation.has_issue("region"));
    assert!(stores.rulesets.is_empty().await);
    assert!(stores.pointers.is_empty().await);

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "needs_review");
    assert!(json.get("publishResult").is_none());
}

#[tokio::test]
async fn invariant_overflowing_rate_is_never_published() {
    let html = format!(
        "<title>Overflow Rewards Card</title><p>Online {}% back</p>",
        "9".repeat(400)
    );
    let (pipeline, stores) = create_pipeline(&html);

    let outcome = pipeline.process(URL, "HK").await.unwrap();

    assert_eq!(outcome.ruleset.rule(Category::Online).unwrap().rate, f64::INFINITY);
    assert_eq!(outcome.status, ProcessStatus::NeedsReview);
    assert!(outcome.validation.has_issue("rules.online"));
    assert!(outcome.validation.has_issue("baseRate"));
    assert!(stores.rulesets.is_empty().await);
    assert!(stores.pointers.is_empty().await);
}

#[tokio::test]
async fn invariant_stylesheet_link_does_not_shift_rules() {
    let html = SAMPLE_HTML.replace(
        "<title>",
        "<link rel=\"stylesheet\" href=\"/static/site.css\">\n    <title>",
    );
    let (pipeline, _) = create_pipeline(&html);

    let outcome = pipeline.process(URL, "HK").await.unwrap();
    assert_eq!(outcome.status, ProcessStatus::Published);
    assert_eq!(outcome.ruleset.rule(Category::General).unwrap().rate, 1.0);
    assert_eq!(outcome.ruleset.base_rate, 1.0);
    assert_eq!(outcome.ruleset.rules.len(), 4);
}

#[tokio::test]
async fn invariant_extraction_is_idempotent() {
    let (pipeline, _) = create_pipeline(SAMPLE_HTML);

    let a = pipeline.process(URL, "HK").await.unwrap();
    let b = pipeline.process(URL, "HK").await.unwrap();
    assert_eq!(a.ruleset, b.ruleset);
}

#[tokio::test]
async fn invariant_fetch_error_propagates() {
    let snapshots = Arc::new(MemoryBlobStore::new());
    let rulesets = Arc::new(MemoryBlobStore::new());
    let pipeline = IngestionPipeline::new(
        PageFetcher::new(Arc::new(RefusingFetcher), snapshots.clone()),
        RulesetPublisher::new(rulesets.clone(), Arc::new(MemoryKeyValueStore::new())),
    );

    let err = pipeline.process(URL, "HK").await.unwrap_err();
    assert!(matches!(err, PipelineError::Fetch(FetchError::Transport(_))));
    assert!(err.to_string().contains("connection refused"));
    assert!(snapshots.is_empty().await);
    assert!(rulesets.is_empty().await);
}

#[tokio::test]
async fn invariant_ruleset_write_failure_leaves_pointer_untouched() {
    let snapshots = Arc::new(MemoryBlobStore::new());
    let pointers = Arc::new(MemoryKeyValueStore::new());
    let pipeline = IngestionPipeline::new(
        PageFetcher::new(Arc::new(StaticFetcher(SAMPLE_HTML.to_string())), snapshots.clone()),
        RulesetPublisher::new(Arc::new(FailingBlobStore), pointers.clone()),
    );

    let err = pipeline.process(URL, "HK").await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Publish(PublishError::Storage(StorageError::Backend(_)))
    ));
    // The snapshot write already happened and is not rolled back.
    assert_eq!(snapshots.len().await, 1);
    assert!(pointers.is_empty().await);
}

#[tokio::test]
async fn invariant_filesystem_backends_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let rulesets = Arc::new(FsBlobStore::new(dir.path()));
    let pipeline = IngestionPipeline::new(
        PageFetcher::new(
            Arc::new(StaticFetcher(SAMPLE_HTML.to_string())),
            Arc::new(FsBlobStore::new(dir.path())),
        ),
        RulesetPublisher::new(rulesets.clone(), Arc::new(FsKeyValueStore::new(dir.path().join("pointers")))),
    );

    let outcome = pipeline.process(URL, "HK").await.unwrap();
    let published = outcome.publish_result.unwrap();

    assert!(dir.path().join("pointers").join(&published.card_key).exists());
    let blob = rulesets.read(&published.storage_key).await.unwrap().unwrap();
    assert_eq!(blob.options.content_type.as_deref(), Some("application/json"));
    assert!(dir
        .path()
        .join("snapshots/hk")
        .join(format!("{}.html", outcome.ruleset.content_hash))
        .exists());

    let again = pipeline.process(URL, "HK").await.unwrap().publish_result.unwrap();
    assert_eq!(again.version, "2");
}
