//! Client error types.

use std::time::Duration;

use thiserror::Error;

/// Errors from subscribing to or posting to the relay.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The relay URL could not be turned into a request.
    #[error("invalid relay url {url}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it was refused.
        reason: String,
    },
    /// The connection or handshake failed.
    #[error("failed to connect to relay: {0}")]
    Connect(String),
    /// An established stream failed.
    #[error("relay transport error: {0}")]
    Transport(String),
    /// The HTTP request failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The relay answered a post with a non-success status.
    #[error("relay rejected record with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// Posting is paused after an earlier failure.
    #[error("relay posting suppressed for another {remaining:?}")]
    Suppressed {
        /// Time left in the cool-down.
        remaining: Duration,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppressed_display_mentions_remaining() {
        let err = ClientError::Suppressed {
            remaining: Duration::from_secs(12),
        };
        assert!(err.to_string().contains("12s"));
    }

    #[test]
    fn invalid_url_display() {
        let err = ClientError::InvalidUrl {
            url: "nope".into(),
            reason: "relative URL without a base".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid relay url nope: relative URL without a base"
        );
    }
}
