//! Strategy: stable JSON API endpoint.

use serde_json::Value;

use crate::error::ExtractionError;
use crate::types::RawItem;

/// Envelope keys some API versions wrap the list in.
const ENVELOPE_KEYS: [&str; 3] = ["products", "items", "data"];

/// Parse an API response body into raw items.
///
/// The top-level JSON array is the item list; an object wrapping the list
/// under `products`, `items` or `data` is accepted as well. Non-object entries
/// are ignored.
///
/// # Errors
///
/// - [`ExtractionError::MalformedPayload`] when the body is not JSON.
/// - [`ExtractionError::SchemaShapeMismatch`] when no list can be found.
/// - [`ExtractionError::NoItemsFound`] when the list is empty.
pub fn parse_api_items(body: &str) -> Result<Vec<RawItem>, ExtractionError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ExtractionError::malformed(format!("API response is not JSON: {e}")))?;

    let list = match &value {
        Value::Array(items) => items,
        Value::Object(map) => ENVELOPE_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .ok_or_else(|| {
                ExtractionError::shape("API object has no products/items/data list")
            })?,
        _ => return Err(ExtractionError::shape("API response is not a list")),
    };

    let items: Vec<RawItem> = list
        .iter()
        .filter(|entry| entry.is_object())
        .map(RawItem::from_json)
        .collect();

    if items.is_empty() {
        return Err(ExtractionError::NoItemsFound);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_array_is_the_item_list() {
        let items = parse_api_items(r#"[{"title": "A", "price": 1}, {"title": "B"}, 3]"#).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].price.as_deref(), Some("1"));
    }

    #[test]
    fn envelope_object_is_unwrapped() {
        let items = parse_api_items(r#"{"total": 1, "products": [{"name": "C"}]}"#).unwrap();
        assert_eq!(items[0].title.as_deref(), Some("C"));
    }

    #[test]
    fn non_json_is_malformed() {
        let err = parse_api_items("<html>maintenance</html>").unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedPayload { .. }), "{err:?}");
    }

    #[test]
    fn object_without_list_is_shape_mismatch() {
        let err = parse_api_items(r#"{"error": "nope"}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::SchemaShapeMismatch { .. }), "{err:?}");
    }

    #[test]
    fn scalar_is_shape_mismatch() {
        let err = parse_api_items("42").unwrap_err();
        assert!(matches!(err, ExtractionError::SchemaShapeMismatch { .. }), "{err:?}");
    }

    #[test]
    fn empty_list_is_no_items() {
        let err = parse_api_items("[]").unwrap_err();
        assert!(matches!(err, ExtractionError::NoItemsFound), "{err:?}");
    }
}
