//! HTTP access to the vendor page and API with rotating request identities.

use std::time::Duration;

use reqwest::{header, Client};

use crate::error::ExtractionError;

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const JSON_ACCEPT: &str = "application/json,text/plain;q=0.9,*/*;q=0.8";

/// Thin wrapper over `reqwest::Client` that sends browser-like headers and
/// cycles through a configured list of `User-Agent` strings.
///
/// Every call is bounded by the per-request timeout given at construction.
pub struct SourceClient {
    client: Client,
    user_agents: Vec<String>,
    accept_language: String,
}

impl SourceClient {
    /// Creates a `SourceClient`.
    ///
    /// An empty `user_agents` list falls back to reqwest's default agent.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the underlying client cannot be built
    /// (e.g. invalid TLS config).
    pub fn new(
        timeout_secs: u64,
        user_agents: Vec<String>,
        accept_language: &str,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
            .build()?;
        Ok(Self {
            client,
            user_agents,
            accept_language: accept_language.to_owned(),
        })
    }

    /// The identity used for the `index`-th attempt; wraps around the list.
    #[must_use]
    pub fn identity(&self, index: usize) -> Option<&str> {
        if self.user_agents.is_empty() {
            return None;
        }
        self.user_agents
            .get(index % self.user_agents.len())
            .map(String::as_str)
    }

    /// Fetches a page as text, presenting as a browser.
    ///
    /// # Errors
    ///
    /// - [`ExtractionError::Transport`] on network failure or timeout.
    /// - [`ExtractionError::UnexpectedStatus`] on any non-2xx response.
    pub async fn get_html(&self, url: &str, identity: usize) -> Result<String, ExtractionError> {
        self.get_text(url, identity, HTML_ACCEPT).await
    }

    /// Fetches a JSON endpoint as text; parsing is left to the caller so the
    /// raw body can be kept as a debug artifact.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_html`].
    pub async fn get_json_text(
        &self,
        url: &str,
        identity: usize,
    ) -> Result<String, ExtractionError> {
        self.get_text(url, identity, JSON_ACCEPT).await
    }

    async fn get_text(
        &self,
        url: &str,
        identity: usize,
        accept: &str,
    ) -> Result<String, ExtractionError> {
        let mut request = self
            .client
            .get(url)
            .header(header::ACCEPT, accept)
            .header(header::ACCEPT_LANGUAGE, &self.accept_language);
        if let Some(ua) = self.identity(identity) {
            request = request.header(header::USER_AGENT, ua);
        }

        let transport = |source: reqwest::Error| ExtractionError::Transport {
            url: url.to_owned(),
            source,
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        response.text().await.map_err(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with(agents: &[&str]) -> SourceClient {
        SourceClient::new(
            5,
            agents.iter().map(|s| (*s).to_owned()).collect(),
            "en-US",
        )
        .expect("client builds")
    }

    #[test]
    fn identity_cycles_through_agents() {
        let client = client_with(&["ua-1", "ua-2", "ua-3"]);
        assert_eq!(client.identity(0), Some("ua-1"));
        assert_eq!(client.identity(2), Some("ua-3"));
        assert_eq!(client.identity(3), Some("ua-1"));
        assert_eq!(client.identity(7), Some("ua-2"));
    }

    #[test]
    fn identity_is_none_without_agents() {
        let client = client_with(&[]);
        assert_eq!(client.identity(0), None);
    }
}
