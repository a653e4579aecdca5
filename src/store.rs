//! Local byte store (C2): a minimal key-value contract for content bytes,
//! keyed by content hash. Grounded on `database::utxo_set::UTXOStorage`'s
//! shape (trait for the storage contract, boxed trait object held by a
//! manager, one in-memory implementation for tests/dev).

use std::collections::HashMap;
use std::sync::RwLock;

use crate::hash::Hash;

/// Storage contract for resolved content bytes.
///
/// `get` never fails for a missing key (it returns `None`); `set` is
/// idempotent and durable-on-return. No eviction, no range reads: the core
/// assumes get-set atomicity per key and nothing more.
#[async_trait::async_trait]
pub trait LocalStore: std::fmt::Debug + Send + Sync {
    async fn get(&self, hash: &Hash) -> Option<Vec<u8>>;

    async fn set(&self, hash: &Hash, bytes: Vec<u8>);
}

/// A simple in-memory byte store, useful for tests and development.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<Hash, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience: number of distinct keys currently held.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl LocalStore for InMemoryStore {
    async fn get(&self, hash: &Hash) -> Option<Vec<u8>> {
        self.entries.read().unwrap().get(hash).cloned()
    }

    async fn set(&self, hash: &Hash, bytes: Vec<u8>) {
        // Repeat writes of identical bytes are tolerated; no single-flight
        // coalescing is attempted here (explicit non-goal, see §4.3).
        self.entries.write().unwrap().insert(hash.clone(), bytes);
    }
}
