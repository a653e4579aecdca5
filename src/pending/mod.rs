//! Pending work records and queue contract shared by C6/C7.
//!
//! Grounded on `model/__init__.py` (the `PendingMessage`/`PendingTX`
//! collections) and this codebase's `UTXOStorage`-style trait-plus-in-memory-
//! impl pattern. `BulkOp` mirrors pymongo's `InsertOne`/`DeleteOne`.

pub mod jobs;

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::message::Message;

/// Where a pending-message record came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PendingMessageSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_message: Option<bool>,
}

/// A record awaiting re-delivery of an already-validated (or re-checkable)
/// message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingMessageRecord {
    pub id: String,
    pub time: f64,
    pub message: Message,
    pub source: PendingMessageSource,
}

/// Chain-data context a pending transaction was observed under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingTxContext {
    pub chain_name: String,
    pub tx_hash: String,
    pub height: u64,
    pub time: f64,
}

/// A record awaiting extraction of the messages it embeds (chain data).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingTxRecord {
    pub id: String,
    pub time: f64,
    pub content: serde_json::Value,
    pub context: PendingTxContext,
}

/// One persistent mutation to apply at a drain boundary.
#[derive(Debug, Clone)]
pub enum BulkOp<T> {
    Insert(T),
    Delete { id: String },
}

/// Ordered, time-sorted pending-work queue with batched mutation.
#[async_trait::async_trait]
pub trait PendingQueue<T: Send + Sync>: std::fmt::Debug + Send + Sync {
    /// Fetch up to `limit` records, ordered by `time` ascending.
    async fn sorted_by_time(&self, limit: usize) -> Vec<T>;

    /// Apply a batch of inserts/deletes, in order.
    async fn bulk_write(&self, ops: Vec<BulkOp<T>>);
}

/// In-memory `PendingQueue`, useful for tests and single-node development.
#[derive(Debug)]
pub struct InMemoryPendingQueue<T> {
    records: Mutex<VecDeque<(String, T)>>,
}

impl<T> Default for InMemoryPendingQueue<T> {
    fn default() -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T: Clone + Send + Sync> InMemoryPendingQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, id: impl Into<String>, record: T) {
        self.records.lock().await.push_back((id.into(), record));
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl PendingQueue<PendingMessageRecord> for InMemoryPendingQueue<PendingMessageRecord> {
    async fn sorted_by_time(&self, limit: usize) -> Vec<PendingMessageRecord> {
        let guard = self.records.lock().await;
        let mut items: Vec<PendingMessageRecord> = guard.iter().map(|(_, r)| r.clone()).collect();
        items.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
        items.truncate(limit);
        items
    }

    async fn bulk_write(&self, ops: Vec<BulkOp<PendingMessageRecord>>) {
        let mut guard = self.records.lock().await;
        for op in ops {
            match op {
                BulkOp::Insert(record) => guard.push_back((record.id.clone(), record)),
                BulkOp::Delete { id } => guard.retain(|(rid, _)| rid != &id),
            }
        }
    }
}

#[async_trait::async_trait]
impl PendingQueue<PendingTxRecord> for InMemoryPendingQueue<PendingTxRecord> {
    async fn sorted_by_time(&self, limit: usize) -> Vec<PendingTxRecord> {
        let guard = self.records.lock().await;
        let mut items: Vec<PendingTxRecord> = guard.iter().map(|(_, r)| r.clone()).collect();
        items.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
        items.truncate(limit);
        items
    }

    async fn bulk_write(&self, ops: Vec<BulkOp<PendingTxRecord>>) {
        let mut guard = self.records.lock().await;
        for op in ops {
            match op {
                BulkOp::Insert(record) => guard.push_back((record.id.clone(), record)),
                BulkOp::Delete { id } => guard.retain(|(rid, _)| rid != &id),
            }
        }
    }
}

/// Per-chain set of already-processed identifiers inside one sweep (§3).
///
/// Each chain gets its own `Mutex` (rather than one lock around the whole
/// map) since concurrent handlers only ever touch their own chain's set.
pub type SeenIds = Arc<std::collections::HashMap<String, Mutex<std::collections::HashSet<String>>>>;

pub fn new_seen_ids(chains: &[&str]) -> SeenIds {
    let mut map = std::collections::HashMap::new();
    for chain in chains {
        map.insert(chain.to_string(), Mutex::new(std::collections::HashSet::new()));
    }
    Arc::new(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::ItemType;

    fn message_at(time: f64) -> PendingMessageRecord {
        PendingMessageRecord {
            id: format!("id-{time}"),
            time,
            message: Message {
                item_hash: "h".into(),
                item_content: None,
                item_type: ItemType::Ipfs,
                chain: "X".into(),
                channel: None,
                sender: "s".into(),
                message_type: "POST".into(),
                time,
                signature: "sig".into(),
            },
            source: PendingMessageSource::default(),
        }
    }

    #[tokio::test]
    async fn sorted_by_time_orders_ascending() {
        let queue = InMemoryPendingQueue::new();
        queue.push("b", message_at(2.0)).await;
        queue.push("a", message_at(1.0)).await;

        let items = queue.sorted_by_time(10).await;
        assert_eq!(items[0].time, 1.0);
        assert_eq!(items[1].time, 2.0);
    }

    #[tokio::test]
    async fn bulk_write_applies_deletes() {
        let queue = InMemoryPendingQueue::new();
        queue.push("a", message_at(1.0)).await;
        queue
            .bulk_write(vec![BulkOp::Delete { id: "a".to_string() }])
            .await;

        assert!(queue.is_empty().await);
    }
}
