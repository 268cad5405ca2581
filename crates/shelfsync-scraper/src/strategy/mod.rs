//! Extraction strategies.
//!
//! The vendor has delivered its catalog as a JSON API, as JSON-LD menu blocks,
//! as a client-side hydration blob and, in between, only through the rendered
//! DOM. Each representation is one [`ExtractionStrategy`] variant; the
//! [`crate::CatalogFetcher`] tries them in configured priority order.
//!
//! Attempts never write anything. The only state they share is the
//! [`Source`] handle, which caches the vendor page so the JSON-LD and
//! hydration strategies do not fetch it twice within one fetch call.

mod api;
mod hydration;
mod jsonld;
mod rendered_dom;

use std::time::Duration;

use shelfsync_core::{AppConfig, DomSelectors, HydrationConfig, StrategyKind};

use crate::client::SourceClient;
use crate::error::ExtractionError;
use crate::render::PageRenderer;
use crate::types::RawItem;

pub use api::parse_api_items;
pub use hydration::extract_hydration_items;
pub use jsonld::extract_jsonld_items;
pub use rendered_dom::{clean_price_text, extract_dom_items};

/// One way of obtaining the raw product list from the remote source.
#[derive(Debug, Clone)]
pub enum ExtractionStrategy {
    /// GET a JSON endpoint whose top-level list is the item list.
    Api { url: String },
    /// Walk `Menu` → `hasMenuSection` → `hasMenuItem` in JSON-LD blocks.
    JsonLd,
    /// Read the hydration blob assigned to a page global.
    Hydration(HydrationConfig),
    /// Render the page headlessly and read product cards from the DOM.
    RenderedDom {
        selectors: DomSelectors,
        timeout: Duration,
    },
}

impl ExtractionStrategy {
    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        match self {
            ExtractionStrategy::Api { .. } => StrategyKind::Api,
            ExtractionStrategy::JsonLd => StrategyKind::JsonLd,
            ExtractionStrategy::Hydration(_) => StrategyKind::Hydration,
            ExtractionStrategy::RenderedDom { .. } => StrategyKind::RenderedDom,
        }
    }

    /// Builds the configured strategy chain in priority order.
    ///
    /// `api` is skipped when no API URL is configured; config validation
    /// already rejects that combination when `api` is listed explicitly.
    #[must_use]
    pub fn chain_from_config(config: &AppConfig) -> Vec<Self> {
        config
            .strategies
            .iter()
            .filter_map(|kind| match kind {
                StrategyKind::Api => config
                    .api_url
                    .as_ref()
                    .map(|url| ExtractionStrategy::Api { url: url.clone() }),
                StrategyKind::JsonLd => Some(ExtractionStrategy::JsonLd),
                StrategyKind::Hydration => {
                    Some(ExtractionStrategy::Hydration(config.hydration.clone()))
                }
                StrategyKind::RenderedDom => Some(ExtractionStrategy::RenderedDom {
                    selectors: config.dom.clone(),
                    timeout: Duration::from_secs(config.render_timeout_secs),
                }),
            })
            .collect()
    }

    /// Runs one attempt of this strategy against `source`.
    ///
    /// # Errors
    ///
    /// Returns the [`ExtractionError`] describing why this representation
    /// yielded no items; see [`ExtractionError::is_transient`] for how the
    /// fetcher reacts.
    pub async fn attempt<R: PageRenderer>(
        &self,
        source: &mut Source<'_, R>,
    ) -> Result<Vec<RawItem>, ExtractionError> {
        match self {
            ExtractionStrategy::Api { url } => {
                let body = source.api_body(url).await?;
                parse_api_items(body)
            }
            ExtractionStrategy::JsonLd => {
                let html = source.page_html().await?;
                extract_jsonld_items(html)
            }
            ExtractionStrategy::Hydration(config) => {
                let html = source.page_html().await?;
                extract_hydration_items(html, config)
            }
            ExtractionStrategy::RenderedDom { selectors, timeout } => {
                let html = source.rendered_html(&selectors.wait, *timeout).await?;
                extract_dom_items(html, selectors)
            }
        }
    }
}

/// Access to the remote source for the duration of one fetch call.
pub struct Source<'a, R> {
    client: &'a SourceClient,
    renderer: &'a R,
    page_url: &'a str,
    identity: usize,
    page: Option<String>,
    last_payload: Option<String>,
}

impl<'a, R: PageRenderer> Source<'a, R> {
    pub fn new(client: &'a SourceClient, renderer: &'a R, page_url: &'a str) -> Self {
        Self {
            client,
            renderer,
            page_url,
            identity: 0,
            page: None,
            last_payload: None,
        }
    }

    /// Selects the request identity used by subsequent calls.
    pub fn set_identity(&mut self, identity: usize) {
        self.identity = identity;
    }

    /// The most recent raw body received from the source, if any.
    #[must_use]
    pub fn last_payload(&self) -> Option<&str> {
        self.last_payload.as_deref()
    }

    /// The vendor page HTML, fetched on first use and cached afterwards.
    async fn page_html(&mut self) -> Result<&str, ExtractionError> {
        if self.page.is_none() {
            let html = self.client.get_html(self.page_url, self.identity).await?;
            self.last_payload = Some(html.clone());
            self.page = Some(html);
        }
        Ok(self.page.as_deref().unwrap_or_default())
    }

    async fn api_body(&mut self, url: &str) -> Result<&str, ExtractionError> {
        let body = self.client.get_json_text(url, self.identity).await?;
        Ok(self.last_payload.insert(body).as_str())
    }

    async fn rendered_html(
        &mut self,
        wait_selector: &str,
        timeout: Duration,
    ) -> Result<&str, ExtractionError> {
        let client = self.client;
        let user_agent = client.identity(self.identity);
        let html = self
            .renderer
            .render(self.page_url, wait_selector, timeout, user_agent)
            .await?;
        Ok(self.last_payload.insert(html).as_str())
    }
}
