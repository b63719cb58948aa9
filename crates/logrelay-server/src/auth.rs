//! Subscriber authentication for `GET /ws`.
//!
//! A connect request is classified before any upgrade happens:
//!
//! - a browser (User-Agent mentions `http` or `Mozilla`) without a ticket gets
//!   the landing page
//! - a request with no headers at all, or whose ticket differs from the
//!   configured secret, is rejected with 400
//! - everything else is accepted and upgraded
//!
//! The secret and the presented ticket never appear in logs.

use std::net::SocketAddr;

use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use tracing::{info, warn};

/// User-Agent fragments that identify a browser.
pub const BROWSER_SIGNATURES: [&str; 2] = ["http", "Mozilla"];

const CF_CONNECTING_IP: &str = "cf-connecting-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Why a connect request was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The request carried no headers.
    EmptyHeaders,
    /// The presented ticket is absent or wrong.
    TicketMismatch,
}

impl RejectReason {
    /// Stable identifier used in responses and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmptyHeaders => "empty_headers",
            Self::TicketMismatch => "ticket_mismatch",
        }
    }
}

/// Result of classifying a connect request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    /// A browser visited the endpoint; serve the landing page.
    Landing,
    /// The request is refused.
    Rejected {
        /// Best-effort client IP.
        client_ip: String,
        /// Why it was refused.
        reason: RejectReason,
    },
    /// The ticket matched; upgrade to a subscriber session.
    Accepted {
        /// Best-effort client IP.
        client_ip: String,
    },
}

/// Checks presented tickets against the configured secret.
pub struct Authenticator {
    ticket: String,
}

impl Authenticator {
    /// Create an authenticator for `ticket`.
    pub fn new(ticket: impl Into<String>) -> Self {
        Self {
            ticket: ticket.into(),
        }
    }

    /// Classify a connect request.
    pub fn authenticate(
        &self,
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
        presented: Option<&str>,
    ) -> AuthOutcome {
        let presented = presented.unwrap_or_default();

        if presented.is_empty() && is_browser(headers) {
            info!(user_agent = user_agent(headers), "browser visit, serving landing page");
            return AuthOutcome::Landing;
        }

        let client_ip = client_ip(headers, peer);
        info!(%client_ip, headers = ?header_summary(headers), "subscriber connect request");

        if headers.is_empty() {
            warn!(
                %client_ip,
                reason = RejectReason::EmptyHeaders.as_str(),
                headers = ?header_summary(headers),
                "authentication failed"
            );
            return AuthOutcome::Rejected {
                client_ip,
                reason: RejectReason::EmptyHeaders,
            };
        }

        if !constant_time_eq(presented.as_bytes(), self.ticket.as_bytes()) {
            warn!(
                %client_ip,
                reason = RejectReason::TicketMismatch.as_str(),
                headers = ?header_summary(headers),
                "authentication failed"
            );
            return AuthOutcome::Rejected {
                client_ip,
                reason: RejectReason::TicketMismatch,
            };
        }

        AuthOutcome::Accepted { client_ip }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("ticket", &"<redacted>")
            .finish()
    }
}

/// Best-effort client IP: `CF-Connecting-IP`, then the first
/// `X-Forwarded-For` entry, then the transport peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(ip) = header_str(headers, CF_CONNECTING_IP).map(str::trim).filter(|s| !s.is_empty()) {
        return ip.to_string();
    }
    if let Some(ip) = header_str(headers, X_FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return ip.to_string();
    }
    peer.map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
}

/// Whether the User-Agent looks like a browser.
pub fn is_browser(headers: &HeaderMap) -> bool {
    let ua = user_agent(headers);
    BROWSER_SIGNATURES.iter().any(|sig| ua.contains(sig))
}

fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Header names and values for connect and rejection log lines.
fn header_summary(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or("<binary>").to_string(),
            )
        })
        .collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
