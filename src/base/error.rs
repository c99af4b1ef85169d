//! Crate-wide error type.
//!
//! A single enum covers both surfaces of the crate: the DoH resolution
//! path (query, race, filter) and the fetch path (dial, TLS, HTTP
//! exchange). Callers of [`crate::Client`] only ever observe a terminal
//! error; per-attempt failures inside a race are logged and discarded.

use thiserror::Error;

/// Errors produced by DoH resolution and racing fetches.
#[derive(Debug, Error)]
pub enum DohError {
    /// A server answered with a non-OK HTTP status.
    #[error("server returned non-OK status {0}")]
    Status(u16),

    /// The endpoint body was not valid dns-json.
    #[error("failed to decode dns-json response")]
    Decode(#[source] serde_json::Error),

    /// The endpoint answered, but with a non-zero DNS status code.
    #[error("{0} could not be resolved (dns status {1})")]
    Unresolved(String, i32),

    /// The answer section held no record whose data parses as an IP.
    #[error("no usable address records for {0}")]
    NoAddress(String),

    /// The race deadline elapsed before any attempt succeeded.
    #[error("deadline elapsed before any attempt succeeded")]
    Timeout,

    /// Every endpoint in the race failed before the deadline.
    #[error("all {0} endpoints failed before the deadline")]
    AllEndpointsFailed(usize),

    /// A URL or target address could not be parsed.
    #[error("invalid URL or target address")]
    InvalidUrl,

    /// Establishing the TCP connection failed.
    #[error("connect failed")]
    Connect(#[source] std::io::Error),

    /// The TLS handshake failed or timed out.
    #[error("TLS handshake failed")]
    TlsHandshake,

    /// The HTTP exchange failed (handshake, send, or response headers).
    #[error("HTTP exchange failed")]
    Http,

    /// The response body could not be read to completion.
    #[error("failed to read response body")]
    Body,
}

impl DohError {
    /// True for the deadline-elapsed terminal error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DohError::Timeout)
    }
}
