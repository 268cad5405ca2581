use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::app_config::{AppConfig, DomSelectors, EmptyCatalogPolicy, HydrationConfig};
use crate::{ConfigError, StrategyKind};

const DEFAULT_USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
];

/// Administrative menu entries the vendor mixes into its product list.
const DEFAULT_TITLE_BLACKLIST: [&str; 8] = [
    "Pasos para realizar un pedido",
    "Métodos de Pago",
    "Garantia de Moviles",
    "Whatsapp Gestor",
    "Payment Methods",
    "Order Steps",
    "Mobile Warranty",
    "WhatsApp Manager",
];

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
#[allow(clippy::too_many_lines)]
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        parse_flag(&or_default(var, default)).ok_or_else(|| {
            invalid(var, "expected one of true/false/1/0/yes/no".to_string())
        })
    };

    let source_url = require("SHELFSYNC_SOURCE_URL")?;
    let api_url = lookup("SHELFSYNC_API_URL")
        .ok()
        .filter(|v| !v.trim().is_empty());

    let strategies = match lookup("SHELFSYNC_STRATEGIES") {
        Ok(raw) => {
            parse_strategies(&raw).map_err(|reason| invalid("SHELFSYNC_STRATEGIES", reason))?
        }
        Err(_) => default_strategies(api_url.is_some()),
    };
    if strategies.contains(&StrategyKind::Api) && api_url.is_none() {
        return Err(invalid(
            "SHELFSYNC_STRATEGIES",
            "the api strategy requires SHELFSYNC_API_URL".to_string(),
        ));
    }

    let user_agents = match lookup("SHELFSYNC_USER_AGENTS") {
        Ok(raw) => split_list(&raw),
        Err(_) => DEFAULT_USER_AGENTS.iter().map(|s| (*s).to_string()).collect(),
    };
    if user_agents.is_empty() {
        return Err(invalid(
            "SHELFSYNC_USER_AGENTS",
            "at least one user agent is required".to_string(),
        ));
    }

    let accept_language = or_default("SHELFSYNC_ACCEPT_LANGUAGE", "es-ES,es;q=0.9");
    let request_timeout_secs = parse_u64("SHELFSYNC_REQUEST_TIMEOUT_SECS", "15")?;
    let image_timeout_secs = parse_u64("SHELFSYNC_IMAGE_TIMEOUT_SECS", "10")?;
    let max_attempts = parse_u32("SHELFSYNC_MAX_ATTEMPTS", "3")?;
    if max_attempts == 0 {
        return Err(invalid(
            "SHELFSYNC_MAX_ATTEMPTS",
            "must be at least 1".to_string(),
        ));
    }
    let retry_backoff_secs = parse_u64("SHELFSYNC_RETRY_BACKOFF_SECS", "2")?;
    let render_timeout_secs = parse_u64("SHELFSYNC_RENDER_TIMEOUT_SECS", "20")?;

    let dom_defaults = DomSelectors::default();
    let dom = DomSelectors {
        wait: or_default("SHELFSYNC_DOM_WAIT_SELECTOR", &dom_defaults.wait),
        card: or_default("SHELFSYNC_DOM_CARD_SELECTOR", &dom_defaults.card),
        ..dom_defaults
    };

    let hydration_defaults = HydrationConfig::default();
    let hydration = HydrationConfig {
        global: or_default("SHELFSYNC_HYDRATION_GLOBAL", &hydration_defaults.global),
        path: or_default("SHELFSYNC_HYDRATION_PATH", &hydration_defaults.path),
        type_field: or_default(
            "SHELFSYNC_HYDRATION_TYPE_FIELD",
            &hydration_defaults.type_field,
        ),
        type_value: or_default(
            "SHELFSYNC_HYDRATION_TYPE_VALUE",
            &hydration_defaults.type_value,
        ),
    };

    let markup_raw = or_default("SHELFSYNC_MARKUP", "5.00");
    let markup = Decimal::from_str(markup_raw.trim())
        .map_err(|e| invalid("SHELFSYNC_MARKUP", e.to_string()))?;
    if markup.is_sign_negative() {
        return Err(invalid("SHELFSYNC_MARKUP", "must not be negative".to_string()));
    }

    let default_currency = or_default("SHELFSYNC_DEFAULT_CURRENCY", "USD");
    let title_blacklist = match lookup("SHELFSYNC_TITLE_BLACKLIST") {
        Ok(raw) => split_list(&raw),
        Err(_) => DEFAULT_TITLE_BLACKLIST
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
    };

    let data_dir = PathBuf::from(or_default("SHELFSYNC_DATA_DIR", "./data"));
    let debug_payload = parse_bool("SHELFSYNC_DEBUG_PAYLOAD", "true")?;
    let download_images = parse_bool("SHELFSYNC_DOWNLOAD_IMAGES", "true")?;
    let image_concurrency = parse_usize("SHELFSYNC_IMAGE_CONCURRENCY", "4")?.max(1);

    let sync_interval_secs = parse_u64("SHELFSYNC_SYNC_INTERVAL_SECS", "86400")?;
    if sync_interval_secs == 0 {
        return Err(invalid(
            "SHELFSYNC_SYNC_INTERVAL_SECS",
            "must be at least 1".to_string(),
        ));
    }
    let poll_interval_secs = parse_u64("SHELFSYNC_POLL_INTERVAL_SECS", "2")?.max(1);
    let manual_trigger = parse_bool("SHELFSYNC_MANUAL_TRIGGER", "true")?;
    let run_on_start = parse_bool("SHELFSYNC_RUN_ON_START", "false")?;
    let empty_catalog_policy =
        parse_empty_catalog_policy(&or_default("SHELFSYNC_EMPTY_CATALOG_POLICY", "preserve"))?;

    let publish_command = lookup("SHELFSYNC_PUBLISH_COMMAND")
        .ok()
        .filter(|v| !v.trim().is_empty());
    let log_level = or_default("SHELFSYNC_LOG_LEVEL", "info");

    Ok(AppConfig {
        source_url,
        api_url,
        strategies,
        user_agents,
        accept_language,
        request_timeout_secs,
        image_timeout_secs,
        max_attempts,
        retry_backoff_secs,
        render_timeout_secs,
        dom,
        hydration,
        markup,
        default_currency,
        title_blacklist,
        data_dir,
        debug_payload,
        download_images,
        image_concurrency,
        sync_interval_secs,
        poll_interval_secs,
        manual_trigger,
        run_on_start,
        empty_catalog_policy,
        publish_command,
        log_level,
    })
}

/// Default priority: most API-like first, rendering last.
fn default_strategies(has_api_url: bool) -> Vec<StrategyKind> {
    let mut strategies = Vec::with_capacity(4);
    if has_api_url {
        strategies.push(StrategyKind::Api);
    }
    strategies.extend([
        StrategyKind::JsonLd,
        StrategyKind::Hydration,
        StrategyKind::RenderedDom,
    ]);
    strategies
}

/// Parse a comma-separated strategy list, dropping duplicates but keeping order.
fn parse_strategies(raw: &str) -> Result<Vec<StrategyKind>, String> {
    let mut strategies = Vec::new();
    for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
        let kind = part.parse::<StrategyKind>()?;
        if !strategies.contains(&kind) {
            strategies.push(kind);
        }
    }
    if strategies.is_empty() {
        return Err("at least one strategy is required".to_string());
    }
    Ok(strategies)
}

fn parse_empty_catalog_policy(s: &str) -> Result<EmptyCatalogPolicy, ConfigError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "preserve" => Ok(EmptyCatalogPolicy::Preserve),
        "overwrite" => Ok(EmptyCatalogPolicy::Overwrite),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SHELFSYNC_EMPTY_CATALOG_POLICY".to_string(),
            reason: format!("expected \"preserve\" or \"overwrite\", got \"{other}\""),
        }),
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Split a `|`-separated list. User agents contain commas, so `,` is not
/// usable as the separator.
fn split_list(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
