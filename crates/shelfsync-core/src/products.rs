use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Column order of the persisted catalog. The header row is always written,
/// even for an empty catalog.
pub const CATALOG_COLUMNS: [&str; 8] = [
    "title",
    "description",
    "price_base",
    "price_reseller",
    "price_currency",
    "image_file",
    "image_url",
    "scraped_at",
];

/// One product of the storefront catalog, normalized from whatever
/// representation the vendor exposed it through.
///
/// `title` is the identity key within a snapshot: the normalizer never emits
/// two records with the same title in one sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub title: String,
    /// May be empty.
    pub description: String,
    /// Vendor price; `0` when the source value was missing or unparsable.
    pub base_price: Decimal,
    /// Always `round(base_price + markup, 2)`; never edited on its own.
    pub resale_price: Decimal,
    /// ISO 4217 code, e.g. `"USD"`.
    pub currency: String,
    /// Local filename under the images directory, set only after a successful
    /// download. Never a remote URL.
    pub image_reference: Option<String>,
    /// Remote image URL, kept for audit and debugging.
    pub source_image_url: Option<String>,
    pub captured_at: DateTime<Utc>,
}

/// The representations the vendor has exposed its catalog through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Stable JSON API endpoint.
    Api,
    /// `<script type="application/ld+json">` menu blocks.
    JsonLd,
    /// Client-side hydration state assigned to a page global.
    Hydration,
    /// Headless-browser rendered DOM.
    RenderedDom,
}

impl StrategyKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Api => "api",
            StrategyKind::JsonLd => "jsonld",
            StrategyKind::Hydration => "hydration",
            StrategyKind::RenderedDom => "dom",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(StrategyKind::Api),
            "jsonld" | "json-ld" | "json_ld" => Ok(StrategyKind::JsonLd),
            "hydration" => Ok(StrategyKind::Hydration),
            "dom" | "rendered_dom" | "rendered-dom" => Ok(StrategyKind::RenderedDom),
            other => Err(format!("unknown extraction strategy \"{other}\"")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_kind_round_trips_through_display() {
        for kind in [
            StrategyKind::Api,
            StrategyKind::JsonLd,
            StrategyKind::Hydration,
            StrategyKind::RenderedDom,
        ] {
            assert_eq!(kind.to_string().parse::<StrategyKind>(), Ok(kind));
        }
    }

    #[test]
    fn strategy_kind_accepts_aliases() {
        assert_eq!("JSON-LD".parse(), Ok(StrategyKind::JsonLd));
        assert_eq!(" rendered_dom ".parse(), Ok(StrategyKind::RenderedDom));
    }

    #[test]
    fn strategy_kind_rejects_unknown() {
        assert!("selenium".parse::<StrategyKind>().is_err());
    }
}
