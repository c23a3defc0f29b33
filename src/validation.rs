//! Validation System - Independent Ruleset Checks
//!
//! Rules produce structured issues. Every rule runs on every ruleset; an
//! issue never stops later rules from running.

use serde::{Deserialize, Serialize};

use crate::publisher::card_key;
use crate::ruleset::{CardRuleSet, Category};

const MIN_CARD_NAME_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(field: impl Into<String>, message: &str) -> Self {
        Self {
            field: field.into(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
    pub mapped_categories: Vec<Category>,
}

impl ValidationResult {
    pub fn has_issue(&self, field: &str) -> bool {
        self.issues.iter().any(|i| i.field == field)
    }
}

/// Validation rule trait - produces issues
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, ruleset: &CardRuleSet) -> Vec<ValidationIssue>;
}

// --- Concrete Rules ---

pub struct CardNameRule;

impl ValidationRule for CardNameRule {
    fn name(&self) -> &'static str { "card_name" }

    fn validate(&self, ruleset: &CardRuleSet) -> Vec<ValidationIssue> {
        if ruleset.card_name.chars().count() < MIN_CARD_NAME_LEN {
            vec![ValidationIssue::new("cardName", "Card name appears invalid")]
        } else {
            vec![]
        }
    }
}

pub struct RegionRule;

impl ValidationRule for RegionRule {
    fn name(&self) -> &'static str { "region" }

    fn validate(&self, ruleset: &CardRuleSet) -> Vec<ValidationIssue> {
        if ruleset.region.is_empty() {
            vec![ValidationIssue::new("region", "Region is required")]
        } else {
            vec![]
        }
    }
}

/// Publishing needs a non-empty storage key derived from name and region.
pub struct CardKeyRule;

impl ValidationRule for CardKeyRule {
    fn name(&self) -> &'static str { "card_key" }

    fn validate(&self, ruleset: &CardRuleSet) -> Vec<ValidationIssue> {
        if card_key(&ruleset.card_name, &ruleset.region).is_empty() {
            vec![ValidationIssue::new(
                "cardKey",
                "Card name and region must contain ASCII letters or digits",
            )]
        } else {
            vec![]
        }
    }
}

pub struct BaseRateRule;

impl ValidationRule for BaseRateRule {
    fn name(&self) -> &'static str { "base_rate" }

    fn validate(&self, ruleset: &CardRuleSet) -> Vec<ValidationIssue> {
        if !ruleset.base_rate.is_finite() || ruleset.base_rate < 0.0 {
            vec![ValidationIssue::new("baseRate", "Base rate must be non-negative")]
        } else {
            vec![]
        }
    }
}

/// Category membership and rate sign, checked for every rule.
pub struct RuleEntriesRule;

impl ValidationRule for RuleEntriesRule {
    fn name(&self) -> &'static str { "rules" }

    fn validate(&self, ruleset: &CardRuleSet) -> Vec<ValidationIssue> {
        let mut issues = vec![];

        for rule in &ruleset.rules {
            let field = format!("rules.{}", rule.category);
            if Category::parse(&rule.category).is_none() {
                issues.push(ValidationIssue::new(field.clone(), "Unknown category"));
            }
            if !rule.rate.is_finite() || rule.rate < 0.0 {
                issues.push(ValidationIssue::new(field, "Rate must be non-negative"));
            }
        }

        issues
    }
}

pub struct AnnualFeeRule;

impl ValidationRule for AnnualFeeRule {
    fn name(&self) -> &'static str { "annual_fee" }

    fn validate(&self, ruleset: &CardRuleSet) -> Vec<ValidationIssue> {
        match ruleset.annual_fee {
            Some(fee) if !fee.is_finite() || fee < 0.0 => {
                vec![ValidationIssue::new("annualFee", "Annual fee cannot be negative")]
            }
            _ => vec![],
        }
    }
}

pub struct FxFeeRule;

impl ValidationRule for FxFeeRule {
    fn name(&self) -> &'static str { "fx_fee" }

    fn validate(&self, ruleset: &CardRuleSet) -> Vec<ValidationIssue> {
        match ruleset.fx_fee {
            Some(fee) if !fee.is_finite() || fee < 0.0 => {
                vec![ValidationIssue::new("fxFee", "FX fee cannot be negative")]
            }
            _ => vec![],
        }
    }
}

/// Validator runs every rule and collects the issues in rule order
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule + Send + Sync>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(CardNameRule),
                Box::new(RegionRule),
                Box::new(CardKeyRule),
                Box::new(BaseRateRule),
                Box::new(RuleEntriesRule),
                Box::new(AnnualFeeRule),
                Box::new(FxFeeRule),
            ],
        }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn validate(&self, ruleset: &CardRuleSet) -> ValidationResult {
        let mut issues = vec![];

        for rule in &self.rules {
            issues.extend(rule.validate(ruleset));
        }

        let mapped_categories = ruleset
            .rules
            .iter()
            .filter_map(|r| Category::parse(&r.category))
            .collect();

        ValidationResult {
            valid: issues.is_empty(),
            issues,
            mapped_categories,
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
