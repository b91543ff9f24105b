//! Git smart-HTTP protocol, client side: pkt-line framing, ref discovery,
//! and the pack request builder.
//!
//! This crate does not speak HTTP itself (see `git-transport`) and does not
//! decode pack bytes (see `git-pack`); it sits between the two, turning an
//! HTTP response into a [`discovery::RefAdvertisement`] and turning a set of
//! wanted ids into the body of the pack-fetch request.

pub mod discovery;
pub mod pktline;
pub mod request;

use git_hash::HashError;
use git_transport::TransportError;

/// Errors that can occur while discovering refs or building a pack request.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid pkt-line: {0}")]
    InvalidPktLine(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unexpected content type from ref discovery: {0:?}")]
    UnexpectedContentType(Option<String>),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
