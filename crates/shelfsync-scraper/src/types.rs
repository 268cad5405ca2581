//! Loosely-typed product entries as the strategies pull them out of the source.
//!
//! ## Observed shapes
//!
//! The vendor has exposed the same data under different key names over time:
//!
//! - JSON-LD `MenuItem`: `name`, `description`, `image` (string, array, or
//!   `ImageObject`), `offers.price` (number or string), `offers.priceCurrency`.
//!   `offers` is occasionally an array.
//! - JSON API / hydration state: `title` or `name`, `price` either top-level or
//!   under `offers`, `currency` / `priceCurrency`, `image` / `image_url` /
//!   `imageUrl` / `images[0]`.
//! - Rendered DOM: text content only; the price still carries its currency
//!   prefix until the DOM strategy strips it.

use serde_json::Value;

/// One candidate product before normalization. Every field is optional: the
/// normalizer decides what is usable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Price exactly as found (decimal string).
    pub price: Option<String>,
    pub currency: Option<String>,
    pub image_url: Option<String>,
}

impl RawItem {
    /// Maps a JSON object from any of the structured sources onto a `RawItem`,
    /// probing the key names observed across snapshots.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        let offer = first_offer(value);

        let price = first_scalar(value, &["price", "price_base", "basePrice"])
            .or_else(|| offer.and_then(|o| first_scalar(o, &["price", "lowPrice"])));

        let currency = first_string(value, &["currency", "priceCurrency", "price_currency"])
            .or_else(|| offer.and_then(|o| first_string(o, &["priceCurrency", "currency"])));

        let image_url = ["image", "image_url", "imageUrl", "images", "thumbnail"]
            .iter()
            .find_map(|key| value.get(*key).and_then(image_from_value));

        Self {
            title: first_string(value, &["name", "title"]),
            description: first_string(value, &["description", "body", "summary"]),
            price,
            currency,
            image_url,
        }
    }
}

/// `offers` may be a single `Offer` object or an array of them; the first
/// offer wins.
fn first_offer(value: &Value) -> Option<&Value> {
    match value.get("offers")? {
        Value::Array(offers) => offers.first(),
        offer @ Value::Object(_) => Some(offer),
        _ => None,
    }
}

fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        value
            .get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    })
}

/// Like [`first_string`] but also accepts JSON numbers, rendered as text.
fn first_scalar(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn image_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_owned()).filter(|s| !s.is_empty()),
        Value::Array(items) => items.iter().find_map(image_from_value),
        Value::Object(_) => first_string(value, &["url", "contentUrl", "src"]),
        _ => None,
    }
}
