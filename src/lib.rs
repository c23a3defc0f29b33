//! CardRules Core - Card Reward Ingestion
//!
//! # Pipeline
//! 1. Fetch the issuer page and snapshot it by content hash
//! 2. Extract a ruleset with ordered heuristics
//! 3. Validate; invalid rulesets go to review
//! 4. Publish a new immutable version and move the latest pointer
//!
//! Every external capability (text fetch, blob store, key-value store,
//! clock) is passed in; the crate holds no process-wide state.

pub mod clock;
pub mod config;
pub mod extract;
pub mod fetcher;
pub mod hashing;
pub mod pipeline;
pub mod publisher;
pub mod ruleset;
pub mod storage;
pub mod validation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::IngestConfig;
pub use extract::extract;
pub use fetcher::{FetchError, HttpTextFetcher, PageFetcher, TextFetcher};
pub use hashing::content_hash;
pub use pipeline::{IngestionPipeline, PipelineError, ProcessOutcome, ProcessStatus};
pub use publisher::{card_key, PublishError, RulesetPublisher};
pub use ruleset::{CardRule, CardRuleSet, Category, FetchedPage, PointerRecord, PublishResult};
pub use storage::{BlobStore, KeyValueStore, PutOptions, StorageError};
pub use validation::{ValidationIssue, ValidationResult, ValidationRule, Validator};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
