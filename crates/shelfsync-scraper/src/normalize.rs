//! Normalization from [`RawItem`] to [`shelfsync_core::ProductRecord`].
//!
//! Pure functions only: no network or disk access. Image retrieval happens
//! later in the pipeline; [`image_file_name`] merely derives the name the
//! download will be stored under.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use reqwest::Url;
use rust_decimal::{Decimal, RoundingStrategy};
use sha2::{Digest, Sha256};
use shelfsync_core::{AppConfig, ProductRecord};

use crate::types::RawItem;

const TITLE_SLUG_MAX_CHARS: usize = 50;
const FALLBACK_IMAGE_EXTENSION: &str = ".jpg";

/// Inputs to normalization that come from configuration.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub markup: Decimal,
    pub default_currency: String,
    /// Lower-cased; matched as substrings of the lower-cased title.
    pub title_blacklist: Vec<String>,
    /// Relative image URLs are resolved against this.
    pub base_url: Option<Url>,
}

impl NormalizeOptions {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            markup: config.markup,
            default_currency: config.default_currency.clone(),
            title_blacklist: config
                .title_blacklist
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            base_url: Url::parse(&config.source_url).ok(),
        }
    }
}

/// Normalizes one raw item.
///
/// Returns `None` when the title is empty after whitespace cleanup or matches
/// the blacklist. `image_reference` is always left unset here.
#[must_use]
pub fn normalize(
    item: &RawItem,
    options: &NormalizeOptions,
    captured_at: DateTime<Utc>,
) -> Option<ProductRecord> {
    let title = collapse_whitespace(item.title.as_deref()?);
    if title.is_empty() || is_blacklisted(&title, &options.title_blacklist) {
        return None;
    }

    let base_price = parse_price(item.price.as_deref());
    let currency = item
        .currency
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map_or_else(|| options.default_currency.clone(), str::to_ascii_uppercase);

    Some(ProductRecord {
        title,
        description: item
            .description
            .as_deref()
            .map(collapse_whitespace)
            .unwrap_or_default(),
        base_price,
        resale_price: resale_price(base_price, options.markup),
        currency,
        image_reference: None,
        source_image_url: item
            .image_url
            .as_deref()
            .and_then(|raw| resolve_image_url(raw, options.base_url.as_ref())),
        captured_at: captured_at.trunc_subsecs(0),
    })
}

/// Normalizes a whole snapshot, dropping noise records and keeping the first
/// record of each title.
#[must_use]
pub fn normalize_all(
    items: &[RawItem],
    options: &NormalizeOptions,
    captured_at: DateTime<Utc>,
) -> Vec<ProductRecord> {
    let mut seen: HashSet<String> = HashSet::with_capacity(items.len());
    let mut records = Vec::with_capacity(items.len());
    let mut dropped = 0usize;
    let mut duplicates = 0usize;

    for item in items {
        let Some(record) = normalize(item, options, captured_at) else {
            dropped += 1;
            continue;
        };
        if !seen.insert(record.title.to_lowercase()) {
            duplicates += 1;
            continue;
        }
        records.push(record);
    }

    tracing::debug!(
        raw = items.len(),
        kept = records.len(),
        dropped,
        duplicates,
        "normalized snapshot"
    );
    records
}

/// `round(base + markup, 2)`, half away from zero.
#[must_use]
pub fn resale_price(base: Decimal, markup: Decimal) -> Decimal {
    (base + markup).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Parses a vendor price. Missing, unparsable and negative values become `0`.
///
/// Accepts plain decimals, scientific notation, and text carrying currency
/// symbols or thousands separators (`"$1,250.00"`).
#[must_use]
pub fn parse_price(raw: Option<&str>) -> Decimal {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Decimal::ZERO;
    };

    let parsed = Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
        .or_else(|| {
            if looks_scientific(raw) {
                return None;
            }
            let cleaned: String = raw
                .chars()
                .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
                .collect();
            Decimal::from_str(&cleaned).ok()
        });

    match parsed {
        Some(price) if price >= Decimal::ZERO => price,
        _ => Decimal::ZERO,
    }
}

/// `<decimal>e<int>`: out of range once both parsers rejected it, so it must
/// not be stripped down to its digits.
fn looks_scientific(raw: &str) -> bool {
    raw.split_once(['e', 'E']).is_some_and(|(mantissa, exp)| {
        Decimal::from_str(mantissa).is_ok() && exp.parse::<i64>().is_ok()
    })
}

/// Case-insensitive substring match against an already lower-cased blacklist.
#[must_use]
pub fn is_blacklisted(title: &str, blacklist: &[String]) -> bool {
    let lowered = title.to_lowercase();
    blacklist
        .iter()
        .any(|entry| !entry.is_empty() && lowered.contains(entry.as_str()))
}

/// Filesystem-safe name for a product image.
///
/// Uses the URL's final path segment when it looks like a file name;
/// otherwise a slug of the title plus `.jpg`, or a hash of the URL when the
/// title has no usable characters either.
#[must_use]
pub fn image_file_name(url: &str, title: &str) -> String {
    if let Some(segment) = Url::parse(url)
        .ok()
        .and_then(|u| u.path_segments()?.next_back().map(str::to_owned))
        .filter(|s| is_plain_file_name(s) && s.contains('.'))
    {
        return segment;
    }

    let slug: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .take(TITLE_SLUG_MAX_CHARS)
        .collect();
    let slug = slug.trim();
    if !slug.is_empty() {
        return format!("{slug}{FALLBACK_IMAGE_EXTENSION}");
    }

    let digest = Sha256::digest(url.as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    format!("img-{hex}{FALLBACK_IMAGE_EXTENSION}")
}

/// ASCII letters, digits, `.`, `_` and `-` only, not starting with a dot.
fn is_plain_file_name(name: &str) -> bool {
    is_safe_file_name(name)
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// A single path component that stays inside the images directory: no
/// separators, no `..`, no leading dot, no control or reserved characters.
/// Spaces and non-ASCII letters from title slugs are allowed.
pub(crate) fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && !name.chars().any(|c| {
            c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
        })
}

fn resolve_image_url(raw: &str, base: Option<&Url>) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(_) => Some(raw.to_owned()),
        Err(_) => base
            .and_then(|b| b.join(raw).ok())
            .map(|u| u.to_string())
            .or_else(|| Some(raw.to_owned())),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
