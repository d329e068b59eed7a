use thiserror::Error;

/// Failure of a remote fetch. Never retried; the caller decides what to do.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("world bank api error: {0}")]
    Api(String),

    /// The indicator query returned no usable observations.
    #[error("no data available for {country} between {start} and {end}")]
    NoData {
        country: String,
        start: i32,
        end: i32,
    },

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl FetchError {
    pub fn malformed(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::Malformed {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData { .. })
    }
}
