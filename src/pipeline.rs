//! Ingestion Pipeline - Single Entry Point
//!
//! fetch -> extract -> validate -> publish. An invalid ruleset is returned
//! for review and never reaches the publisher.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::extract::extract;
use crate::fetcher::{FetchError, PageFetcher};
use crate::publisher::{PublishError, RulesetPublisher};
use crate::ruleset::{CardRuleSet, PublishResult};
use crate::validation::{ValidationResult, Validator};
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Published,
    NeedsReview,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    pub status: ProcessStatus,
    pub ruleset: CardRuleSet,
    pub validation: ValidationResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_result: Option<PublishResult>,
}

/// The ingestion pipeline - single entry point for processing a card link
pub struct IngestionPipeline {
    fetcher: PageFetcher,
    validator: Validator,
    publisher: RulesetPublisher,
}

impl IngestionPipeline {
    pub fn new(fetcher: PageFetcher, publisher: RulesetPublisher) -> Self {
        Self {
            fetcher,
            validator: Validator::new(),
            publisher,
        }
    }

    pub fn publisher(&self) -> &RulesetPublisher {
        &self.publisher
    }

    /// Validate a ruleset without publishing it
    pub fn validate(&self, ruleset: &CardRuleSet) -> ValidationResult {
        self.validator.validate(ruleset)
    }

    /// Process one card page.
    ///
    /// Callers must reject empty `url`/`region` before calling.
    pub async fn process(&self, url: &str, region: &str) -> Result<ProcessOutcome, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("process", %run_id, url, region, engine = ENGINE_VERSION);
        self.run(url, region).instrument(span).await
    }

    async fn run(&self, url: &str, region: &str) -> Result<ProcessOutcome, PipelineError> {
        let page = self.fetcher.fetch_page(url, region).await?;
        let ruleset = extract(&page, region);
        info!(
            card_name = %ruleset.card_name,
            rules = ruleset.rules.len(),
            promotions = ruleset.promotions.len(),
            "extracted ruleset"
        );

        let validation = self.validator.validate(&ruleset);
        if !validation.valid {
            warn!(issues = validation.issues.len(), "ruleset needs review");
            return Ok(ProcessOutcome {
                status: ProcessStatus::NeedsReview,
                ruleset,
                validation,
                publish_result: None,
            });
        }

        let publish_result = self.publisher.publish(&ruleset).await?;
        Ok(ProcessOutcome {
            status: ProcessStatus::Published,
            ruleset,
            validation,
            publish_result: Some(publish_result),
        })
    }
}
