//! HTTP transport for the smart-HTTP git protocol.
//!
//! Implements exactly the two requests the client side of this system ever
//! makes: the ref-discovery GET and the pack-fetch POST. This crate owns
//! nothing about pkt-line framing or pack parsing — it hands back a
//! `Content-Type` plus the response bytes for `git-protocol` and `git-pack`
//! to decode.

pub mod http;

pub use http::{HttpResponse, HttpTransport};

use std::time::Duration;

/// Service name used in both transport requests.
pub const UPLOAD_PACK_SERVICE: &str = "git-upload-pack";

/// Errors from the HTTP transport, distinct from the protocol/pack errors
/// the higher layers wrap around a successful response body.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection to {url} failed: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("ref discovery against {url} timed out after {0:?}", .timeout)]
    Timeout { url: String, timeout: Duration },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },
}
