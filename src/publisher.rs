//! Ruleset Publisher - Versioned Artifacts and Latest Pointer
//!
//! Versioned blobs at `rulesets/<cardKey>/v<N>.json` are only ever added.
//! The pointer record under `<cardKey>` is overwritten on each publish.
//!
//! Read-increment-write on the pointer is not atomic: two concurrent
//! publishes for one card key can both compute the same version, and the
//! later pointer write wins.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::ruleset::{CardRuleSet, PointerRecord, PublishResult};
use crate::storage::{BlobStore, KeyValueStore, PutOptions, StorageError};

pub const RULESET_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Stable slug for a (card name, region) pair: lowercase, runs of
/// non-alphanumerics become one hyphen, no hyphen at either end.
pub fn card_key(card_name: &str, region: &str) -> String {
    let raw = format!("{}-{}", card_name, region).to_lowercase();
    let mut key = String::with_capacity(raw.len());
    let mut pending_hyphen = false;

    for c in raw.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !key.is_empty() {
                key.push('-');
            }
            pending_hyphen = false;
            key.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    key
}

pub fn ruleset_storage_key(card_key: &str, version: u64) -> String {
    format!("rulesets/{}/v{}.json", card_key, version)
}

pub struct RulesetPublisher {
    rulesets: Arc<dyn BlobStore>,
    pointers: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl RulesetPublisher {
    pub fn new(rulesets: Arc<dyn BlobStore>, pointers: Arc<dyn KeyValueStore>) -> Self {
        Self {
            rulesets,
            pointers,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current pointer for `card_key`. Absent and unparsable records both
    /// read as `None`.
    pub async fn latest(&self, card_key: &str) -> Result<Option<PointerRecord>, PublishError> {
        let Some(raw) = self.pointers.get(card_key).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<PointerRecord>(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(card_key, error = %e, "unparsable pointer record, treating as absent");
                Ok(None)
            }
        }
    }

    async fn current_version(&self, card_key: &str) -> Result<u64, PublishError> {
        let version = self.latest(card_key).await?.and_then(|record| {
            let parsed = record.version.parse::<u64>().ok();
            if parsed.is_none() {
                warn!(card_key, version = %record.version, "non-numeric pointer version, starting over");
            }
            parsed
        });
        Ok(version.unwrap_or(0))
    }

    /// Write the ruleset as the next version and move the pointer to it.
    /// Storage failures abort; earlier writes are not rolled back.
    pub async fn publish(&self, ruleset: &CardRuleSet) -> Result<PublishResult, PublishError> {
        let card_key = card_key(&ruleset.card_name, &ruleset.region);
        let version = self.current_version(&card_key).await? + 1;
        let storage_key = ruleset_storage_key(&card_key, version);

        let body = serde_json::to_string_pretty(ruleset)?;
        self.rulesets
            .put(&storage_key, &body, PutOptions::content_type(RULESET_CONTENT_TYPE))
            .await?;

        let pointer = PointerRecord {
            version: version.to_string(),
            storage_key: storage_key.clone(),
            content_hash: ruleset.content_hash.clone(),
            updated_at: self.clock.now(),
        };
        self.pointers.put(&card_key, &serde_json::to_string(&pointer)?).await?;
        info!(card_key = %card_key, version, storage_key = %storage_key, "published ruleset");

        Ok(PublishResult {
            card_key,
            version: pointer.version,
            storage_key,
            content_hash: pointer.content_hash,
            updated_at: pointer.updated_at,
        })
    }
}
