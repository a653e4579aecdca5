//! Job supervisor (C8): spawns and restarts the pending-message and
//! pending-tx workers, integrated with a shutdown signal.
//!
//! Grounded on `network::sync::SyncScheduler` (an `Arc`-held struct with a
//! `start(self)` method spawning long-lived tasks) and `main.rs`'s
//! `tokio::signal::ctrl_c()` shutdown pattern. The process-wide FIFO retry
//! lock named in §5/§9 is folded in here as a private `tokio::sync::Mutex<()>`
//! field, held for the duration of one sweep so sweeps of the same job never
//! overlap.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::pending::jobs::{self, ChainDataExtractor, IncomingHandler};
use crate::pending::{PendingMessageRecord, PendingQueue, PendingTxRecord};

/// Owns the two long-lived pending-work jobs and a shutdown channel.
#[derive(Debug)]
pub struct JobSupervisor {
    message_queue: Arc<dyn PendingQueue<PendingMessageRecord>>,
    tx_queue: Arc<dyn PendingQueue<PendingTxRecord>>,
    incoming_handler: Arc<dyn IncomingHandler>,
    chaindata_extractor: Arc<dyn ChainDataExtractor>,
    known_chains: Vec<String>,
    message_retry_lock: Arc<Mutex<()>>,
    tx_retry_lock: Arc<Mutex<()>>,
}

impl JobSupervisor {
    pub fn new(
        message_queue: Arc<dyn PendingQueue<PendingMessageRecord>>,
        tx_queue: Arc<dyn PendingQueue<PendingTxRecord>>,
        incoming_handler: Arc<dyn IncomingHandler>,
        chaindata_extractor: Arc<dyn ChainDataExtractor>,
        known_chains: Vec<String>,
    ) -> Self {
        Self {
            message_queue,
            tx_queue,
            incoming_handler,
            chaindata_extractor,
            known_chains,
            message_retry_lock: Arc::new(Mutex::new(())),
            tx_retry_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Spawns both jobs and runs until `shutdown` fires, then waits for the
    /// current sweep of each to finish before returning.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        log::info!("starting jobs");

        let message_queue = self.message_queue.clone();
        let incoming_handler = self.incoming_handler.clone();
        let known_chains = self.known_chains.clone();
        let message_retry_lock = self.message_retry_lock.clone();
        let mut message_shutdown = shutdown.clone();

        let message_job = tokio::spawn(async move {
            let chains: Vec<&str> = known_chains.iter().map(String::as_str).collect();
            loop {
                tokio::select! {
                    _ = message_shutdown.changed() => {
                        if *message_shutdown.borrow() {
                            break;
                        }
                    }
                    _ = async {
                        let _guard = message_retry_lock.lock().await;
                        jobs::retry_messages_job(message_queue.as_ref(), incoming_handler.clone(), &chains).await;
                    } => {
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        });

        let tx_queue = self.tx_queue.clone();
        let message_queue_for_tx = self.message_queue.clone();
        let chaindata_extractor = self.chaindata_extractor.clone();
        let tx_retry_lock = self.tx_retry_lock.clone();
        let mut tx_shutdown = shutdown.clone();

        let tx_job = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx_shutdown.changed() => {
                        if *tx_shutdown.borrow() {
                            break;
                        }
                    }
                    _ = async {
                        let _guard = tx_retry_lock.lock().await;
                        log::info!("handling TXs");
                        jobs::handle_txs_job(tx_queue.as_ref(), message_queue_for_tx.clone(), chaindata_extractor.clone()).await;
                    } => {
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        });

        let _ = shutdown.changed().await;

        if let Err(e) = message_job.await {
            log::error!("message job ended with error: {}", e);
        }
        if let Err(e) = tx_job.await {
            log::error!("tx job ended with error: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::ItemType;
    use crate::pending::{InMemoryPendingQueue, PendingMessageSource};

    #[derive(Debug)]
    struct NoopHandler;

    #[async_trait::async_trait]
    impl IncomingHandler for NoopHandler {
        async fn incoming(
            &self,
            _message: &crate::message::Message,
            _chain_name: Option<&str>,
            _tx_hash: Option<&str>,
            _height: Option<u64>,
            _seen_ids: crate::pending::SeenIds,
            _check_message: bool,
            _retrying: bool,
        ) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    #[derive(Debug)]
    struct NoopExtractor;

    #[async_trait::async_trait]
    impl ChainDataExtractor for NoopExtractor {
        async fn get_chaindata_messages(
            &self,
            _content: &serde_json::Value,
            _context: &crate::pending::PendingTxContext,
        ) -> anyhow::Result<Option<Vec<crate::message::Message>>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn shuts_down_cleanly_with_pending_records() {
        let message_queue: Arc<InMemoryPendingQueue<PendingMessageRecord>> = Arc::new(InMemoryPendingQueue::new());
        message_queue
            .push(
                "id-1",
                PendingMessageRecord {
                    id: "id-1".into(),
                    time: 1.0,
                    message: crate::message::Message {
                        item_hash: "h".into(),
                        item_content: None,
                        item_type: ItemType::Ipfs,
                        chain: "X".into(),
                        channel: None,
                        sender: "s".into(),
                        message_type: "POST".into(),
                        time: 1.0,
                        signature: "sig".into(),
                    },
                    source: PendingMessageSource::default(),
                },
            )
            .await;
        let tx_queue: Arc<InMemoryPendingQueue<PendingTxRecord>> = Arc::new(InMemoryPendingQueue::new());

        let supervisor = JobSupervisor::new(
            message_queue,
            tx_queue,
            Arc::new(NoopHandler),
            Arc::new(NoopExtractor),
            vec!["X".to_string()],
        );

        let (tx, rx) = watch::channel(false);
        let run = tokio::spawn(async move { supervisor.run(rx).await });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(2), run)
            .await
            .expect("supervisor did not shut down in time")
            .unwrap();
    }
}
