//! SHA-1 object identity for the gitr git implementation.
//!
//! This crate provides the core `ObjectId` type (a 20-byte checksum), hash
//! computation, hex encoding/decoding, and the fan-out table shared between
//! the pack index writer and searcher.

mod error;
pub mod hex;
mod oid;
pub mod hasher;
pub mod fanout;

pub use error::HashError;
pub use oid::{ObjectId, OID_LEN};
