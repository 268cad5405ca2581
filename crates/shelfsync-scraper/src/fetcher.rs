//! Fetch orchestration: strategy fallback with bounded retry.
//!
//! [`CatalogFetcher::fetch`] walks the configured strategy chain in priority
//! order. Within a strategy, transient failures are retried after a jittered
//! backoff, each retry presenting the next request identity; structural
//! failures (and transient ones once the per-strategy budget is spent)
//! escalate to the next strategy. The first non-empty item list wins.

use std::path::{Path, PathBuf};
use std::time::Duration;

use shelfsync_core::{AppConfig, StrategyKind};

use crate::client::SourceClient;
use crate::error::{FetchError, StrategyFailure};
use crate::render::{DefaultRenderer, PageRenderer};
use crate::strategy::{ExtractionStrategy, Source};
use crate::types::RawItem;

/// Per-strategy retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per strategy, including the first.
    pub max_attempts: u32,
    /// Base delay; the n-th retry waits `backoff * n` ± 25 %.
    pub backoff: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_secs(config.retry_backoff_secs),
        }
    }

    /// Delay before the retry that follows failed attempt number `attempt`.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let base = self.backoff.saturating_mul(attempt.max(1));
        if base.is_zero() {
            return base;
        }
        base.mul_f64(rand::random::<f64>() * 0.5 + 0.75)
    }
}

/// Raw items plus the strategy that produced them.
#[derive(Debug)]
pub struct FetchOutcome {
    pub items: Vec<RawItem>,
    pub strategy: StrategyKind,
}

/// Obtains the raw product list from the vendor.
pub struct CatalogFetcher<R = DefaultRenderer> {
    client: SourceClient,
    renderer: R,
    source_url: String,
    strategies: Vec<ExtractionStrategy>,
    retry: RetryPolicy,
    debug_payload_path: Option<PathBuf>,
}

impl CatalogFetcher<DefaultRenderer> {
    /// Builds a fetcher with the default headless renderer.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, FetchError> {
        Self::with_renderer(config, DefaultRenderer::default())
    }
}

impl<R: PageRenderer> CatalogFetcher<R> {
    /// Builds a fetcher from configuration using `renderer` for the
    /// rendered-DOM strategy.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the HTTP client cannot be built.
    pub fn with_renderer(config: &AppConfig, renderer: R) -> Result<Self, FetchError> {
        let client = SourceClient::new(
            config.request_timeout_secs,
            config.user_agents.clone(),
            &config.accept_language,
        )?;
        Ok(Self::new(
            client,
            renderer,
            config.source_url.clone(),
            ExtractionStrategy::chain_from_config(config),
            RetryPolicy::from_config(config),
        )
        .with_debug_payload(config.debug_payload_path()))
    }

    #[must_use]
    pub fn new(
        client: SourceClient,
        renderer: R,
        source_url: String,
        strategies: Vec<ExtractionStrategy>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            renderer,
            source_url,
            strategies,
            retry,
            debug_payload_path: None,
        }
    }

    /// Writes the last raw body received during each fetch to `path`.
    #[must_use]
    pub fn with_debug_payload(mut self, path: Option<PathBuf>) -> Self {
        self.debug_payload_path = path;
        self
    }

    #[must_use]
    pub fn strategies(&self) -> &[ExtractionStrategy] {
        &self.strategies
    }

    /// Runs the strategy chain once. Never writes catalog state.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::AllStrategiesExhausted`] with one
    /// [`StrategyFailure`] per strategy when none yields items.
    pub async fn fetch(&self) -> Result<FetchOutcome, FetchError> {
        let mut source = Source::new(&self.client, &self.renderer, &self.source_url);
        let result = self.run_chain(&mut source).await;

        if let (Some(path), Some(payload)) = (&self.debug_payload_path, source.last_payload()) {
            write_debug_payload(path, payload).await;
        }
        result
    }

    async fn run_chain(&self, source: &mut Source<'_, R>) -> Result<FetchOutcome, FetchError> {
        let mut identity = 0usize;
        let mut failures = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let kind = strategy.kind();
            let url = target_url(strategy, &self.source_url);
            let mut attempt = 0u32;

            loop {
                attempt += 1;
                source.set_identity(identity);
                match strategy.attempt(source).await {
                    Ok(items) => {
                        tracing::info!(
                            strategy = %kind,
                            url,
                            attempt,
                            items = items.len(),
                            "catalog extracted"
                        );
                        return Ok(FetchOutcome {
                            items,
                            strategy: kind,
                        });
                    }
                    Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                        let delay = self.retry.delay_after(attempt);
                        tracing::warn!(
                            strategy = %kind,
                            url,
                            attempt,
                            max_attempts = self.retry.max_attempts,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %err,
                            "transient extraction error, retrying with next identity"
                        );
                        identity = identity.wrapping_add(1);
                        tokio::time::sleep(delay).await;
                    }
                    Err(err) => {
                        tracing::warn!(
                            strategy = %kind,
                            url,
                            attempt,
                            error = %err,
                            "strategy failed, escalating"
                        );
                        failures.push(StrategyFailure {
                            strategy: kind,
                            attempts: attempt,
                            error: err.to_string(),
                        });
                        break;
                    }
                }
            }
        }

        tracing::error!(
            url = %self.source_url,
            strategies = failures.len(),
            "all extraction strategies exhausted"
        );
        Err(FetchError::AllStrategiesExhausted { failures })
    }
}

fn target_url<'a>(strategy: &'a ExtractionStrategy, page_url: &'a str) -> &'a str {
    match strategy {
        ExtractionStrategy::Api { url } => url,
        _ => page_url,
    }
}

async fn write_debug_payload(path: &Path, payload: &str) {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            tracing::warn!(path = %parent.display(), error = %e, "failed to create debug payload directory");
            return;
        }
    }
    match tokio::fs::write(path, payload).await {
        Ok(()) => tracing::debug!(path = %path.display(), bytes = payload.len(), "wrote debug payload"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to write debug payload"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_backoff_never_sleeps() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::ZERO,
        };
        assert_eq!(policy.delay_after(1), Duration::ZERO);
        assert_eq!(policy.delay_after(5), Duration::ZERO);
    }

    #[test]
    fn delay_grows_linearly_within_jitter() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        };
        for attempt in 1..=3u32 {
            let delay = policy.delay_after(attempt);
            let base = Duration::from_secs(2) * attempt;
            assert!(delay >= base.mul_f64(0.75), "attempt {attempt}: {delay:?}");
            assert!(delay <= base.mul_f64(1.25), "attempt {attempt}: {delay:?}");
        }
    }

    #[test]
    fn api_strategy_targets_its_own_url() {
        let api = ExtractionStrategy::Api {
            url: "https://api.example.com/products".to_owned(),
        };
        assert_eq!(
            target_url(&api, "https://shop.example.com"),
            "https://api.example.com/products"
        );
        assert_eq!(
            target_url(&ExtractionStrategy::JsonLd, "https://shop.example.com"),
            "https://shop.example.com"
        );
    }
}
