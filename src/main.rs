//! Binary entry point for the node (C10).
//!
//! Grounded on this codebase's own `main.rs`: a small hand-rolled argument
//! loop, a `log::info!` startup banner, `tokio::spawn` for background
//! loops, and `tokio::signal::ctrl_c` for shutdown.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;

use aleph_node::config::Config;
use aleph_node::content::ipfs::IpfsHttpClient;
use aleph_node::content::network::HttpPeerOverlay;
use aleph_node::content::ContentResolver;
use aleph_node::message::verifier::Ed25519ChainVerifier;
use aleph_node::message::VerifierRegistry;
use aleph_node::pending::jobs::{ChainDataExtractor, IncomingHandler};
use aleph_node::pending::{InMemoryPendingQueue, PendingMessageRecord, PendingTxRecord};
use aleph_node::store::InMemoryStore;
use aleph_node::supervisor::JobSupervisor;

#[derive(Debug, Clone)]
struct Args {
    config_path: Option<PathBuf>,
}

impl Args {
    fn from_env_args() -> Self {
        let mut args = Self { config_path: None };
        let mut iter = env::args().skip(1);

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => {
                    if let Some(val) = iter.next() {
                        args.config_path = Some(PathBuf::from_str(&val).expect("valid path"));
                    } else {
                        eprintln!("Missing value after --config");
                    }
                }
                "--help" | "-h" => print_help_and_exit(),
                other => {
                    eprintln!("Unknown argument: {}", other);
                    print_help_and_exit();
                }
            }
        }

        args
    }
}

fn print_help_and_exit() -> ! {
    eprintln!(
        "\
aleph-node

USAGE:
  aleph-node [FLAGS]

FLAGS:
  --config <path>   Load config from this TOML file (default: in-memory defaults)
  -h, --help        Show this help and exit
"
    );
    std::process::exit(0);
}

/// A downstream handler that simply marks every record handled. Real
/// deployments supply their own `incoming(...)`, wired to message storage
/// and content fetch (C3); this default exists so the node is runnable
/// end-to-end.
#[derive(Debug, Default)]
struct NoopIncomingHandler;

#[async_trait::async_trait]
impl IncomingHandler for NoopIncomingHandler {
    async fn incoming(
        &self,
        message: &aleph_node::message::Message,
        chain_name: Option<&str>,
        _tx_hash: Option<&str>,
        _height: Option<u64>,
        _seen_ids: aleph_node::pending::SeenIds,
        _check_message: bool,
        _retrying: bool,
    ) -> anyhow::Result<bool> {
        log::debug!(
            "handling pending message '{}' from chain {:?}",
            message.item_hash,
            chain_name
        );
        Ok(true)
    }
}

/// A chain-data extractor that declines to expand anything, leaving pending
/// txs untouched. Real deployments supply a chain-specific implementation.
#[derive(Debug, Default)]
struct NoopChainDataExtractor;

#[async_trait::async_trait]
impl ChainDataExtractor for NoopChainDataExtractor {
    async fn get_chaindata_messages(
        &self,
        _content: &serde_json::Value,
        _context: &aleph_node::pending::PendingTxContext,
    ) -> anyhow::Result<Option<Vec<aleph_node::message::Message>>> {
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = env_logger::builder().is_test(false).try_init();

    let args = Args::from_env_args();
    let config = match &args.config_path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    log::info!(
        "Starting node: queue_topic={}, ipfs.enabled={}, p2p.clients={:?}",
        config.aleph.queue_topic,
        config.ipfs.enabled,
        config.p2p.clients
    );

    let store = Arc::new(InMemoryStore::new());
    let peer = Arc::new(HttpPeerOverlay::new(Vec::new()));
    let network = Arc::new(IpfsHttpClient::new(&config.ipfs.host, config.ipfs.port));

    let resolver = Arc::new(ContentResolver::new(
        store,
        peer,
        network,
        config.p2p.clients.clone(),
        config.ipfs.enabled,
    ));
    log::info!("content resolver ready ({} p2p transports configured)", resolver_transport_count(&config));

    // Built so the node has a real `VerifierRegistry` to hand to a production
    // `IncomingHandler` (which calls back into `check_message`). `NoopIncomingHandler`
    // below doesn't use it; a deployment wiring a real handler would pass
    // `_registry` into it instead of constructing its own.
    let mut registry = VerifierRegistry::new();
    registry.register("NULS", Arc::new(Ed25519ChainVerifier));
    let _registry = Arc::new(registry);

    let message_queue: Arc<InMemoryPendingQueue<PendingMessageRecord>> = Arc::new(InMemoryPendingQueue::new());
    let tx_queue: Arc<InMemoryPendingQueue<PendingTxRecord>> = Arc::new(InMemoryPendingQueue::new());

    let supervisor = JobSupervisor::new(
        message_queue,
        tx_queue,
        Arc::new(NoopIncomingHandler),
        Arc::new(NoopChainDataExtractor),
        vec!["NULS".to_string(), "ETH".to_string(), "BNB".to_string()],
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let supervisor_handle = tokio::spawn(async move { supervisor.run(shutdown_rx).await });

    log::info!("Node running. Press Ctrl+C to stop.");
    signal::ctrl_c().await?;
    log::info!("Shutdown signal received. Exiting...");

    let _ = shutdown_tx.send(true);
    if let Err(e) = supervisor_handle.await {
        log::error!("supervisor task panicked: {}", e);
    }

    Ok(())
}

fn resolver_transport_count(config: &Config) -> usize {
    config.p2p.clients.len()
}
