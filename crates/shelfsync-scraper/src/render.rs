//! Headless rendering for the rendered-DOM strategy.
//!
//! [`PageRenderer`] loads a page, waits (bounded) until a selector is present
//! and hands back the serialized DOM. DOM reading itself happens in
//! [`crate::strategy`] on the returned HTML, so renderers stay small and the
//! extraction is testable without a browser.

use std::future::Future;
use std::time::Duration;

use crate::error::ExtractionError;

/// Renders a page in a headless browser.
pub trait PageRenderer: Send + Sync {
    /// Loads `url` presenting `user_agent`, waits up to `timeout` for
    /// `wait_selector` to match, and returns the rendered HTML.
    ///
    /// # Errors
    ///
    /// - [`ExtractionError::RenderTimeout`] when the selector never appears.
    /// - [`ExtractionError::Render`] when the browser cannot be driven at all.
    fn render(
        &self,
        url: &str,
        wait_selector: &str,
        timeout: Duration,
        user_agent: Option<&str>,
    ) -> impl Future<Output = Result<String, ExtractionError>>;
}

/// Renderer used when the crate is built without the `browser` feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableRenderer;

impl PageRenderer for UnavailableRenderer {
    async fn render(
        &self,
        _url: &str,
        _wait_selector: &str,
        _timeout: Duration,
        _user_agent: Option<&str>,
    ) -> Result<String, ExtractionError> {
        Err(ExtractionError::Render(
            "built without the `browser` feature".to_owned(),
        ))
    }
}

#[cfg(feature = "browser")]
pub use chrome::ChromeRenderer;

#[cfg(feature = "browser")]
pub type DefaultRenderer = ChromeRenderer;

#[cfg(not(feature = "browser"))]
pub type DefaultRenderer = UnavailableRenderer;

#[cfg(feature = "browser")]
mod chrome {
    use std::time::Duration;

    use chromiumoxide::browser::{Browser, BrowserConfig};
    use futures::StreamExt;

    use super::PageRenderer;
    use crate::error::ExtractionError;

    const SELECTOR_POLL: Duration = Duration::from_millis(250);

    /// Chromium driven over CDP via `chromiumoxide`. A fresh browser is
    /// launched per render and torn down afterwards; a sync runs at most a
    /// handful of renders a day.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct ChromeRenderer;

    impl PageRenderer for ChromeRenderer {
        async fn render(
            &self,
            url: &str,
            wait_selector: &str,
            timeout: Duration,
            user_agent: Option<&str>,
        ) -> Result<String, ExtractionError> {
            let mut builder = BrowserConfig::builder()
                .no_sandbox()
                .window_size(1920, 1080)
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage");
            if let Some(ua) = user_agent {
                builder = builder.arg(format!("--user-agent={ua}"));
            }
            let config = builder.build().map_err(ExtractionError::Render)?;

            let (mut browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| ExtractionError::Render(e.to_string()))?;
            let handler_task = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            let result = render_page(&browser, url, wait_selector, timeout).await;

            if let Err(e) = browser.close().await {
                tracing::debug!(error = %e, "failed to close headless browser cleanly");
            }
            handler_task.abort();
            result
        }
    }

    async fn render_page(
        browser: &Browser,
        url: &str,
        wait_selector: &str,
        timeout: Duration,
    ) -> Result<String, ExtractionError> {
        let page = browser
            .new_page(url)
            .await
            .map_err(|e| ExtractionError::Render(format!("failed to open {url}: {e}")))?;

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if page.find_element(wait_selector).await.is_ok() {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ExtractionError::RenderTimeout {
                    selector: wait_selector.to_owned(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(SELECTOR_POLL).await;
        }

        page.content()
            .await
            .map_err(|e| ExtractionError::Render(format!("failed to read DOM of {url}: {e}")))
    }
}
