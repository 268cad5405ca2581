use shelfsync_core::StrategyKind;
use thiserror::Error;

/// Why a single strategy attempt failed.
///
/// The variants split into two classes that the fetcher treats differently:
/// transient failures ([`ExtractionError::is_transient`]) are retried with
/// backoff under the next request identity, structural failures escalate to
/// the next strategy in priority order.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("transport error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("malformed payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("schema shape mismatch: {reason}")]
    SchemaShapeMismatch { reason: String },

    #[error("payload parsed but contained no product items")]
    NoItemsFound,

    #[error("timed out after {timeout_secs}s waiting for `{selector}` to render")]
    RenderTimeout { selector: String, timeout_secs: u64 },

    #[error("no elements match `{selector}`")]
    ElementNotFound { selector: String },

    #[error("headless browser failure: {0}")]
    Render(String),
}

impl ExtractionError {
    /// Returns `true` for network-level conditions worth retrying after a
    /// backoff delay: transport failures, non-2xx statuses and render timeouts.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExtractionError::Transport { .. }
                | ExtractionError::UnexpectedStatus { .. }
                | ExtractionError::RenderTimeout { .. }
        )
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ExtractionError::MalformedPayload {
            reason: reason.into(),
        }
    }

    pub(crate) fn shape(reason: impl Into<String>) -> Self {
        ExtractionError::SchemaShapeMismatch {
            reason: reason.into(),
        }
    }
}

/// The final failure of one strategy inside a fetch call.
#[derive(Debug, Clone)]
pub struct StrategyFailure {
    pub strategy: StrategyKind,
    pub attempts: u32,
    pub error: String,
}

impl std::fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} attempt{}): {}",
            self.strategy,
            self.attempts,
            if self.attempts == 1 { "" } else { "s" },
            self.error
        )
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("all extraction strategies exhausted: {}", summarize(.failures))]
    AllStrategiesExhausted { failures: Vec<StrategyFailure> },
}

fn summarize(failures: &[StrategyFailure]) -> String {
    if failures.is_empty() {
        return "no strategies configured".to_owned();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
