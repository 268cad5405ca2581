use std::path::PathBuf;

use rust_decimal::Decimal;

use crate::StrategyKind;

/// What a sync cycle does when it ends up with zero records, either because
/// every strategy was exhausted or because normalization filtered everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyCatalogPolicy {
    /// Keep the last good catalog untouched.
    Preserve,
    /// Write an explicit empty catalog (header row only).
    Overwrite,
}

impl std::fmt::Display for EmptyCatalogPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmptyCatalogPolicy::Preserve => write!(f, "preserve"),
            EmptyCatalogPolicy::Overwrite => write!(f, "overwrite"),
        }
    }
}

/// Where the hydration strategy looks for the client-side state blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrationConfig {
    /// Page global the blob is assigned to, e.g. `__INITIAL_STATE__`.
    pub global: String,
    /// Dotted path from the blob root to the candidate list, e.g. `catalog.items`.
    pub path: String,
    pub type_field: String,
    pub type_value: String,
}

impl Default for HydrationConfig {
    fn default() -> Self {
        Self {
            global: "__INITIAL_STATE__".to_owned(),
            path: "catalog.items".to_owned(),
            type_field: "__typename".to_owned(),
            type_value: "Product".to_owned(),
        }
    }
}

/// CSS selectors used to read product cards out of the rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomSelectors {
    /// Awaited (bounded) before the DOM is read.
    pub wait: String,
    /// One match per product.
    pub card: String,
    pub title: String,
    pub description: String,
    pub price: String,
    /// Either an `<img>` or a node carrying `background-image: url(...)`.
    pub image: String,
}

impl Default for DomSelectors {
    fn default() -> Self {
        Self {
            wait: ".product-card__title".to_owned(),
            card: ".product-view-handler".to_owned(),
            title: ".product-card__title".to_owned(),
            description: ".product-card__description".to_owned(),
            price: ".product__price".to_owned(),
            image: ".v-image__image--cover".to_owned(),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub source_url: String,
    pub api_url: Option<String>,
    pub strategies: Vec<StrategyKind>,
    pub user_agents: Vec<String>,
    pub accept_language: String,
    pub request_timeout_secs: u64,
    pub image_timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_backoff_secs: u64,
    pub render_timeout_secs: u64,
    pub dom: DomSelectors,
    pub hydration: HydrationConfig,
    pub markup: Decimal,
    pub default_currency: String,
    pub title_blacklist: Vec<String>,
    pub data_dir: PathBuf,
    pub debug_payload: bool,
    pub download_images: bool,
    pub image_concurrency: usize,
    pub sync_interval_secs: u64,
    pub poll_interval_secs: u64,
    pub manual_trigger: bool,
    pub run_on_start: bool,
    pub empty_catalog_policy: EmptyCatalogPolicy,
    pub publish_command: Option<String>,
    pub log_level: String,
}

impl AppConfig {
    /// `<data_dir>/products.csv`
    #[must_use]
    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("products.csv")
    }

    /// `<data_dir>/images`
    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }

    /// `<data_dir>/last_payload.txt`, or `None` when the debug artifact is disabled.
    #[must_use]
    pub fn debug_payload_path(&self) -> Option<PathBuf> {
        self.debug_payload
            .then(|| self.data_dir.join("last_payload.txt"))
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("source_url", &self.source_url)
            .field("api_url", &self.api_url)
            .field("strategies", &self.strategies)
            .field("user_agents", &self.user_agents.len())
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_secs", &self.retry_backoff_secs)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("markup", &self.markup)
            .field("default_currency", &self.default_currency)
            .field("title_blacklist", &self.title_blacklist.len())
            .field("data_dir", &self.data_dir)
            .field("download_images", &self.download_images)
            .field("sync_interval_secs", &self.sync_interval_secs)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("manual_trigger", &self.manual_trigger)
            .field("empty_catalog_policy", &self.empty_catalog_policy)
            .field(
                "publish_command",
                &self.publish_command.as_ref().map(|_| "[configured]"),
            )
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}
