//! Schema Extraction - Heuristic Ruleset Mining
//!
//! Everything downstream of line sanitization works on plain-text lines
//! pulled from `<p>`, `<li>` and `<hN>` blocks. Currency detection and card
//! naming still look at the raw markup (`<title>`, first heading).
//!
//! Classification is an ordered list of keyword matchers; the first one
//! that hits wins.

use std::sync::OnceLock;

use regex::Regex;

use crate::ruleset::{CardRule, CardRuleSet, Category, FetchedPage};

/// Category matchers in priority order. Anything unmatched is `General`.
const CATEGORY_MATCHERS: &[(Category, &[&str])] = &[
    (Category::Dining, &["dining", "restaurant", "food"]),
    (Category::Groceries, &["groc", "supermarket"]),
    (Category::Online, &["online", "e-commerce", "internet"]),
    (Category::Travel, &["travel", "airline", "hotel", "flight"]),
    (Category::Fuel, &["gas", "fuel", "petrol"]),
    (Category::WelcomeOffer, &["welcome", "bonus"]),
];

/// Dollar-prefix markers in priority order, checked before the bare
/// `USD` token.
const CURRENCY_MARKERS: &[(&str, &str)] = &[
    ("HK$", "HKD"),
    ("SG$", "SGD"),
    ("US$", "USD"),
];

const DEFAULT_CURRENCY: &str = "USD";

const ANNUAL_FEE_KEYWORDS: &[&str] = &["annual fee"];
const FX_FEE_KEYWORDS: &[&str] = &["foreign transaction", "fx fee", "overseas transaction"];
const PROMOTION_KEYWORDS: &[&str] = &["limited time", "bonus", "promotion", "offer", "spend"];

fn block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(?:p|li|h[0-9])\b[^>]*>(.*?)</\s*(?:p|li|h[0-9])>").unwrap()
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap())
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<title>(.*?)</title>").unwrap())
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<h[12][^>]*>(.*?)</h[12]>").unwrap())
}

fn card_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"[A-Z][A-Za-z0-9]+(?:\s+[A-Z][A-Za-z0-9]+){1,5}\s+(?:Card|Visa|Mastercard|American Express)",
        )
        .unwrap()
    })
}

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)\s*%").unwrap())
}

fn currency_amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:HK|US|SG|CA|AU)?\$\s*([0-9]+(?:\.[0-9]+)?)").unwrap())
}

fn contains_any(line: &str, keywords: &[&str]) -> bool {
    let lower = line.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

/// Strip nested tags and collapse whitespace.
fn clean_fragment(fragment: &str) -> String {
    let text = tag_re().replace_all(fragment, " ");
    whitespace_re().replace_all(&text, " ").trim().to_string()
}

/// Plain-text lines from block-level tags, in document order.
pub fn sanitize_lines(html: &str) -> Vec<String> {
    block_re()
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| clean_fragment(m.as_str()))
        .filter(|line| !line.is_empty())
        .collect()
}

pub fn detect_currency(content: &str) -> &'static str {
    if let Some((_, code)) = CURRENCY_MARKERS.iter().find(|(marker, _)| content.contains(marker)) {
        return *code;
    }
    if content.to_uppercase().contains("USD") {
        return "USD";
    }
    DEFAULT_CURRENCY
}

pub fn extract_card_name(content: &str, url: &str) -> String {
    if let Some(title) = title_re().captures(content).and_then(|c| c.get(1)) {
        if let Some(hint) = card_name_re().find(title.as_str()) {
            return hint.as_str().to_string();
        }
    }

    if let Some(heading) = heading_re().captures(content).and_then(|c| c.get(1)) {
        let text = clean_fragment(heading.as_str());
        if let Some(hint) = card_name_re().find(&text) {
            return hint.as_str().to_string();
        }
        if text.to_lowercase().contains("card") {
            return text;
        }
    }

    host_of(url)
}

/// URL without scheme, cut at the first path segment.
fn host_of(url: &str) -> String {
    let lower = url.to_ascii_lowercase();
    let rest = if lower.starts_with("https://") {
        &url[8..]
    } else if lower.starts_with("http://") {
        &url[7..]
    } else {
        url
    };
    rest.split('/').next().unwrap_or_default().to_string()
}

fn first_percent(line: &str) -> Option<f64> {
    percent_re()
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn first_currency_amount(line: &str) -> Option<f64> {
    currency_amount_re()
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn categorize(line: &str) -> Category {
    CATEGORY_MATCHERS
        .iter()
        .find(|(_, keywords)| contains_any(line, keywords))
        .map(|(category, _)| *category)
        .unwrap_or(Category::General)
}

fn is_fee_line(line: &str) -> bool {
    contains_any(line, ANNUAL_FEE_KEYWORDS) || contains_any(line, FX_FEE_KEYWORDS)
}

/// One rule per category, keeping the highest rate. Ties keep the first
/// line seen. Fee disclosures are not reward lines and are skipped.
pub fn extract_rules(lines: &[String], source: &str) -> Vec<CardRule> {
    let mut rules: Vec<CardRule> = Vec::new();

    for line in lines {
        if is_fee_line(line) {
            continue;
        }
        let Some(rate) = first_percent(line) else {
            continue;
        };
        let category = categorize(line);
        let candidate = CardRule::percent(category, rate, line, source);

        match rules.iter_mut().find(|r| r.category == category.as_str()) {
            Some(existing) if rate > existing.rate => *existing = candidate,
            Some(_) => {}
            None => rules.push(candidate),
        }
    }

    rules
}

pub fn base_rate(rules: &[CardRule]) -> f64 {
    if let Some(general) = rules.iter().find(|r| r.category == Category::General.as_str()) {
        return general.rate;
    }
    rules.iter().map(|r| r.rate).reduce(f64::min).unwrap_or(0.0)
}

/// Only the first "annual fee" line is considered. A currency amount beats
/// a percentage.
pub fn extract_annual_fee(lines: &[String]) -> Option<f64> {
    lines
        .iter()
        .find(|line| contains_any(line, ANNUAL_FEE_KEYWORDS))
        .and_then(|line| first_currency_amount(line).or_else(|| first_percent(line)))
}

/// Only the first foreign-transaction line is considered.
pub fn extract_fx_fee(lines: &[String]) -> Option<f64> {
    lines
        .iter()
        .find(|line| contains_any(line, FX_FEE_KEYWORDS))
        .and_then(|line| first_percent(line))
}

pub fn extract_promotions(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter(|line| contains_any(line, PROMOTION_KEYWORDS))
        .cloned()
        .collect()
}

/// Build a ruleset from a fetched page. Pure: the same page and region
/// always produce the same ruleset.
pub fn extract(page: &FetchedPage, region: &str) -> CardRuleSet {
    let lines = sanitize_lines(&page.content);
    let rules = extract_rules(&lines, &page.url);

    CardRuleSet {
        card_name: extract_card_name(&page.content, &page.url),
        region: region.to_string(),
        currency: detect_currency(&page.content).to_string(),
        base_rate: base_rate(&rules),
        rules,
        annual_fee: extract_annual_fee(&lines),
        fx_fee: extract_fx_fee(&lines),
        promotions: extract_promotions(&lines),
        source_url: page.url.clone(),
        content_hash: page.content_hash.clone(),
        fetched_at: page.fetched_at,
    }
}
