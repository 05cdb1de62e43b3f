use thiserror::Error;

/// Errors surfaced by the scraping engine.
///
/// Only failures that abort an operation become a `ScoutError`. Recoverable
/// conditions (an unknown filter key, a failed detail fetch, an absent map
/// marker) are logged and degraded instead.
#[derive(Debug, Error)]
pub enum ScoutError {
    /// Invalid site, sub-area, category code or sort value. Raised before
    /// any paginated fetch is attempted.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Transport-level failure that persisted through the single retry.
    #[error("request to {url} failed after retry")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status on a search page. Fatal for the remaining
    /// pagination; records already yielded stay valid.
    #[error("GET {url} returned status {status}")]
    Fetch { url: String, status: u16 },
}

pub type Result<T> = std::result::Result<T, ScoutError>;
