//! Strategy: schema.org JSON-LD menu blocks.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::ExtractionError;
use crate::types::RawItem;

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid json-ld script regex")
});

const ITEM_TYPES: [&str; 2] = ["MenuItem", "Product"];

/// Extract product entries from `<script type="application/ld+json">` blocks.
///
/// A block counts when it holds a `Menu` (walked through `hasMenuSection` →
/// `hasMenuItem`, sections may nest) or standalone `Product` nodes. Blocks may
/// be a single object, an array, or an `@graph` container; blocks that do not
/// parse are skipped.
///
/// # Errors
///
/// - [`ExtractionError::MalformedPayload`] when no block is present, none
///   parses as JSON, or none matches the menu/product schema.
/// - [`ExtractionError::NoItemsFound`] when a menu is present but holds no
///   `MenuItem`/`Product` entries.
pub fn extract_jsonld_items(html: &str) -> Result<Vec<RawItem>, ExtractionError> {
    let mut blocks = 0usize;
    let mut parsed = 0usize;
    let mut matched = false;
    let mut items = Vec::new();

    for cap in SCRIPT_RE.captures_iter(html) {
        blocks += 1;
        let raw = cap.get(1).map_or("", |m| m.as_str()).trim();
        let Ok(value) = serde_json::from_str::<Value>(raw) else {
            tracing::debug!(block = blocks, "skipping JSON-LD block that is not valid JSON");
            continue;
        };
        parsed += 1;

        for node in top_level_nodes(&value) {
            if has_type(node, "Menu") {
                matched = true;
                collect_menu_items(node, &mut items);
            } else if ITEM_TYPES.iter().any(|t| has_type(node, t)) {
                matched = true;
                items.push(RawItem::from_json(node));
            }
        }
    }

    if blocks == 0 {
        return Err(ExtractionError::malformed("page has no JSON-LD block"));
    }
    if parsed == 0 {
        return Err(ExtractionError::malformed(format!(
            "none of {blocks} JSON-LD block(s) is valid JSON"
        )));
    }
    if !matched {
        return Err(ExtractionError::malformed(
            "no JSON-LD block matches the menu/product schema",
        ));
    }
    if items.is_empty() {
        return Err(ExtractionError::NoItemsFound);
    }
    Ok(items)
}

/// Flattens top-level arrays and `@graph` containers into candidate nodes.
fn top_level_nodes(value: &Value) -> Vec<&Value> {
    let roots: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    let mut nodes = Vec::with_capacity(roots.len());
    for root in roots {
        nodes.push(root);
        if let Some(graph) = root.get("@graph").and_then(Value::as_array) {
            nodes.extend(graph.iter());
        }
    }
    nodes
}

fn collect_menu_items(node: &Value, out: &mut Vec<RawItem>) {
    for item in as_list(node.get("hasMenuItem")) {
        if ITEM_TYPES.iter().any(|t| has_type(item, t)) {
            out.push(RawItem::from_json(item));
        }
    }
    for section in as_list(node.get("hasMenuSection")) {
        collect_menu_items(section, out);
    }
}

/// schema.org allows a single node wherever a list is expected.
fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(node @ Value::Object(_)) => vec![node],
        _ => Vec::new(),
    }
}

/// `@type` may be a plain string or an array of strings.
fn has_type(node: &Value, wanted: &str) -> bool {
    match node.get("@type") {
        Some(Value::String(s)) => s == wanted,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(wanted)),
        _ => false,
    }
}
