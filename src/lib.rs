//! Crate root.
//!
//! A decentralized content-addressed messaging node: a content resolver
//! (local store -> peer overlay -> distributed content network, with
//! verification and write-through caching), a message admission path, and a
//! pending-work pipeline that retries deferred work with bounded
//! concurrency.

pub mod config;
pub mod content;
pub mod error;
pub mod hash;
pub mod message;
pub mod pending;
pub mod store;
pub mod supervisor;

pub use error::{ContentError, HashError, NodeError, VerifierError};
pub use hash::{classify, sha256_hex, Hash, ItemType};
