//! Ruleset Model - Fetched Pages, Rules and Published Versions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reward category. The declaration order is the classification priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    General,
    Dining,
    Groceries,
    Online,
    Travel,
    Fuel,
    WelcomeOffer,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::General,
        Category::Dining,
        Category::Groceries,
        Category::Online,
        Category::Travel,
        Category::Fuel,
        Category::WelcomeOffer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Dining => "dining",
            Category::Groceries => "groceries",
            Category::Online => "online",
            Category::Travel => "travel",
            Category::Fuel => "fuel",
            Category::WelcomeOffer => "welcome-offer",
        }
    }

    /// Parse a category name; `None` for anything outside the fixed set.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

/// Raw page as retrieved and snapshotted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedPage {
    pub url: String,
    pub content: String,
    pub content_hash: String,
    pub snapshot_key: String,
    pub fetched_at: DateTime<Utc>,
}

/// One earning rule. `category` stays a plain string so rulesets read back
/// from storage can carry names the validator has to reject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRule {
    pub category: String,
    pub rate: f64,
    pub description: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub source: Option<String>,
}

fn default_unit() -> String { "%".to_string() }

impl CardRule {
    pub fn percent(category: Category, rate: f64, description: &str, source: &str) -> Self {
        Self {
            category: category.as_str().to_string(),
            rate,
            description: description.to_string(),
            unit: default_unit(),
            source: Some(source.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRuleSet {
    pub card_name: String,
    pub region: String,
    pub currency: String,
    pub base_rate: f64,
    #[serde(default)]
    pub rules: Vec<CardRule>,
    #[serde(default)]
    pub annual_fee: Option<f64>,
    #[serde(default)]
    pub fx_fee: Option<f64>,
    #[serde(default)]
    pub promotions: Vec<String>,
    pub source_url: String,
    pub content_hash: String,
    pub fetched_at: DateTime<Utc>,
}

impl CardRuleSet {
    pub fn rule(&self, category: Category) -> Option<&CardRule> {
        self.rules.iter().find(|r| r.category == category.as_str())
    }
}

/// Latest-version pointer stored in the key-value store under the card key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerRecord {
    pub version: String,
    pub storage_key: String,
    pub content_hash: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResult {
    pub card_key: String,
    pub version: String,
    pub storage_key: String,
    pub content_hash: String,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse("cashback"), None);
    }

    #[test]
    fn test_category_serializes_kebab_case() {
        let json = serde_json::to_string(&Category::WelcomeOffer).unwrap();
        assert_eq!(json, r#""welcome-offer""#);
    }

    #[test]
    fn test_ruleset_uses_camel_case_fields() {
        let ruleset = CardRuleSet {
            card_name: "HSBC Red Credit Card".to_string(),
            region: "HK".to_string(),
            currency: "HKD".to_string(),
            base_rate: 1.0,
            rules: vec![CardRule::percent(Category::Online, 4.0, "4% online", "https://x.test")],
            annual_fee: None,
            fx_fee: Some(3.5),
            promotions: vec![],
            source_url: "https://x.test".to_string(),
            content_hash: "abc".to_string(),
            fetched_at: "2023-10-01T00:00:00Z".parse().unwrap(),
        };
        let value = serde_json::to_value(&ruleset).unwrap();
        assert_eq!(value["cardName"], "HSBC Red Credit Card");
        assert_eq!(value["fxFee"], 3.5);
        assert!(value["annualFee"].is_null());
        assert_eq!(value["rules"][0]["unit"], "%");
        assert_eq!(value["fetchedAt"], "2023-10-01T00:00:00Z");
    }
}
