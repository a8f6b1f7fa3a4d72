//! Error types for bibliographic source calls.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Upper bound applied to server-provided Retry-After hints.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Errors raised by a [`BibliographicSource`](super::BibliographicSource).
///
/// Inside the retrieval fan-out these never fail a request: they are
/// classified for retry and, if still failing, degrade the signal to empty.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Transport failure (DNS, connection refused, TLS, reset)
    #[error("network error calling {endpoint}: {reason}")]
    Network {
        /// The endpoint being called
        endpoint: String,
        /// Underlying transport error text
        reason: String,
    },

    /// Request exceeded the client's read timeout
    #[error("timeout calling {endpoint}")]
    Timeout {
        /// The endpoint being called
        endpoint: String,
    },

    /// Non-success HTTP response
    #[error("HTTP {status} from {endpoint}")]
    HttpStatus {
        /// The endpoint being called
        endpoint: String,
        /// The HTTP status code
        status: u16,
        /// Parsed Retry-After hint, if the server sent one
        retry_after: Option<Duration>,
    },

    /// Response body did not match the expected shape
    #[error("unexpected response from {endpoint}: {reason}")]
    Decode {
        /// The endpoint being called
        endpoint: String,
        /// Parser error text
        reason: String,
    },

    /// HTTP client could not be constructed
    #[error("cannot build HTTP client for {source_name}: {reason}\n  Suggestion: Check proxy environment variables")]
    ClientBuild {
        /// Source name, e.g. "openalex"
        source_name: String,
        /// Why construction failed
        reason: String,
    },
}

impl SourceError {
    /// Maps a reqwest transport error, separating timeouts.
    #[must_use]
    pub fn from_reqwest(endpoint: &str, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else {
            Self::Network {
                endpoint: endpoint.to_string(),
                reason: error.to_string(),
            }
        }
    }

    #[must_use]
    pub fn network(endpoint: &str, reason: &str) -> Self {
        Self::Network {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub fn http_status(endpoint: &str, status: u16, retry_after: Option<Duration>) -> Self {
        Self::HttpStatus {
            endpoint: endpoint.to_string(),
            status,
            retry_after,
        }
    }

    #[must_use]
    pub fn decode(endpoint: &str, reason: &str) -> Self {
        Self::Decode {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub fn client_build(source_name: &str, reason: &str) -> Self {
        Self::ClientBuild {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Server-provided delay hint, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::HttpStatus { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Parses a Retry-After header value (delta-seconds or HTTP-date).
///
/// Values are capped at [`MAX_RETRY_AFTER`]; dates in the past yield zero.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }
        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);
        return Some(cap_retry_after(duration));
    }

    match httpdate::parse_http_date(header_value) {
        Ok(datetime) => Some(
            datetime
                .duration_since(std::time::SystemTime::now())
                .map_or(Duration::ZERO, cap_retry_after),
        ),
        Err(_) => {
            debug!(header_value, "unparseable Retry-After value");
            None
        }
    }
}

fn cap_retry_after(duration: Duration) -> Duration {
    if duration > MAX_RETRY_AFTER {
        warn!(
            delay_secs = duration.as_secs(),
            max_secs = MAX_RETRY_AFTER.as_secs(),
            "Retry-After exceeds maximum, capping"
        );
        MAX_RETRY_AFTER
    } else {
        duration
    }
}
