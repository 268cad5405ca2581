//! Strategy: client-side hydration state.
//!
//! Server-rendered storefronts assign their whole store state to a page
//! global (`window.__INITIAL_STATE__ = {...}`, `window.__NUXT__ = {...}`) or,
//! for Next.js, emit it in `<script id="__NEXT_DATA__">`. The product list
//! sits at a configured dotted path inside that blob.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use shelfsync_core::HydrationConfig;

use crate::embed::extract_balanced;
use crate::error::ExtractionError;
use crate::types::RawItem;

static NEXT_DATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*id\s*=\s*["']__NEXT_DATA__["'][^>]*>(.*?)</script>"#)
        .expect("valid next data regex")
});

/// Extract product entries from the hydration blob described by `config`.
///
/// # Errors
///
/// - [`ExtractionError::MalformedPayload`] when the global is not assigned in
///   the page or its value is not valid JSON.
/// - [`ExtractionError::SchemaShapeMismatch`] when `config.path` does not
///   resolve to a list.
/// - [`ExtractionError::NoItemsFound`] when no entry of that list carries the
///   product type tag.
pub fn extract_hydration_items(
    html: &str,
    config: &HydrationConfig,
) -> Result<Vec<RawItem>, ExtractionError> {
    let blob = locate_blob(html, &config.global).ok_or_else(|| {
        ExtractionError::malformed(format!(
            "hydration global `{}` not found in page",
            config.global
        ))
    })?;

    let state: Value = serde_json::from_str(blob).map_err(|e| {
        ExtractionError::malformed(format!("hydration state is not valid JSON: {e}"))
    })?;

    let list = resolve_path(&state, &config.path)
        .ok_or_else(|| ExtractionError::shape(format!("path `{}` is absent", config.path)))?
        .as_array()
        .ok_or_else(|| ExtractionError::shape(format!("path `{}` is not a list", config.path)))?;

    let items: Vec<RawItem> = list
        .iter()
        .filter(|entry| {
            entry.get(&config.type_field).and_then(Value::as_str)
                == Some(config.type_value.as_str())
        })
        .map(RawItem::from_json)
        .collect();

    if items.is_empty() {
        return Err(ExtractionError::NoItemsFound);
    }
    Ok(items)
}

/// Finds the JSON text assigned to `global`.
fn locate_blob<'h>(html: &'h str, global: &str) -> Option<&'h str> {
    if global == "__NEXT_DATA__" {
        if let Some(body) = NEXT_DATA_RE
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
        {
            return Some(body);
        }
    }

    let assign_re = Regex::new(&format!(
        r"(?:\bwindow\s*\.\s*|\b(?:var|let|const)\s+|[;\s>]){}\s*=\s*",
        regex::escape(global)
    ))
    .ok()?;

    let found = assign_re.find_iter(html).find_map(|m| {
        let rest = html[m.end()..].trim_start();
        extract_balanced(rest)
    });
    found
}

/// Walks a dotted path; numeric segments index into arrays.
fn resolve_path<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(root, |node, segment| match node {
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            Value::Object(map) => map.get(segment),
            _ => None,
        })
}
