//! Content resolver (C3): multi-source fetch with verification and
//! write-through caching.
//!
//! Grounded on `storage.py`'s `get_hash_content`/`verify_content_hash`/
//! `get_json`/`add_json`/`add_file`, restructured the way this codebase's
//! `DatabaseManager` wraps a boxed `UTXOStorage` trait object: the resolver
//! owns trait objects for the local store, the peer overlay, and the
//! distributed content network, and is otherwise stateless.

pub mod ipfs;
pub mod network;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ContentError;
use crate::hash::{cid_version_for_expected_hash, sha256_hex, Hash, ItemType};
use ipfs::DistributedContentNetwork;
use network::PeerOverlay;

use crate::store::LocalStore;

/// Which P2P transports are enabled, mirroring `p2p.clients` in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum P2pClientKind {
    Protocol,
    Http,
}

/// Tagged source a piece of content was retrieved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentSource {
    Db,
    P2p,
    Ipfs,
    Inline,
}

/// Base fields shared by every resolved-content type.
#[derive(Debug, Clone)]
pub struct StoredContent {
    pub hash: Hash,
    pub source: Option<ContentSource>,
}

/// Resolved content as raw bytes.
#[derive(Debug, Clone)]
pub struct RawContent {
    pub hash: Hash,
    pub source: Option<ContentSource>,
    pub value: Vec<u8>,
}

impl RawContent {
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// Resolved content decoded as JSON.
#[derive(Debug, Clone)]
pub struct JsonContent {
    pub hash: Hash,
    pub source: Option<ContentSource>,
    pub value: serde_json::Value,
    pub raw_content: Vec<u8>,
}

/// Multi-source content resolver: local store -> peer overlay -> distributed
/// content network, in that order, stopping at the first hit.
#[derive(Debug)]
pub struct ContentResolver {
    store: Arc<dyn LocalStore>,
    peer: Arc<dyn PeerOverlay>,
    network: Arc<dyn DistributedContentNetwork>,
    p2p_clients: HashSet<P2pClientKind>,
    ipfs_enabled: bool,
}

impl ContentResolver {
    pub fn new(
        store: Arc<dyn LocalStore>,
        peer: Arc<dyn PeerOverlay>,
        network: Arc<dyn DistributedContentNetwork>,
        p2p_clients: HashSet<P2pClientKind>,
        ipfs_enabled: bool,
    ) -> Self {
        Self {
            store,
            peer,
            network,
            p2p_clients,
            ipfs_enabled,
        }
    }

    /// Resolve `hash` to verified bytes, trying DB -> P2P -> IPFS in order.
    #[allow(clippy::too_many_arguments)]
    pub async fn get_hash_content(
        &self,
        hash: &Hash,
        engine: ItemType,
        timeout: Duration,
        tries: u32,
        use_network: bool,
        use_ipfs: bool,
        store_value: bool,
    ) -> Result<RawContent, ContentError> {
        let mut content: Option<Vec<u8>> = self.store.get(hash).await;
        let mut source = None;

        if content.is_some() {
            source = Some(ContentSource::Db);
        }

        if content.is_none() && use_network && !self.p2p_clients.is_empty() {
            content = self.fetch_from_peer_overlay(hash, timeout).await;
            if content.is_some() {
                source = Some(ContentSource::P2p);
                self.verify_content_hash(content.as_ref().unwrap(), engine, hash)
                    .await?;
            }
        }

        if content.is_none() && use_ipfs && engine == ItemType::Ipfs && self.ipfs_enabled {
            content = self.network.get(hash, timeout, tries).await;
            if content.is_some() {
                source = Some(ContentSource::Ipfs);
                self.verify_content_hash(content.as_ref().unwrap(), engine, hash)
                    .await?;
            }
        }

        let content = content.ok_or_else(|| {
            ContentError::ContentCurrentlyUnavailable(format!("could not fetch content for '{}'", hash))
        })?;

        log::info!(
            "got content from {:?} for '{}'",
            source.expect("source set whenever content is Some"),
            hash
        );

        if store_value && source != Some(ContentSource::Db) {
            log::debug!("storing content for '{}'", hash);
            self.store.set(hash, content.clone()).await;
        }

        Ok(RawContent {
            hash: hash.clone(),
            source,
            value: content,
        })
    }

    async fn fetch_from_peer_overlay(&self, hash: &Hash, timeout: Duration) -> Option<Vec<u8>> {
        if self.p2p_clients.contains(&P2pClientKind::Protocol) {
            if let Some(bytes) = self.peer.stream_request(hash).await {
                return Some(bytes);
            }
        }

        if self.p2p_clients.contains(&P2pClientKind::Http) {
            if let Some(bytes) = self.peer.http_request(hash, timeout).await {
                return Some(bytes);
            }
        }

        None
    }

    /// Recompute `bytes`' hash under `engine` and compare to `expected`.
    pub async fn verify_content_hash(
        &self,
        bytes: &[u8],
        engine: ItemType,
        expected: &Hash,
    ) -> Result<(), ContentError> {
        let computed = match engine {
            ItemType::Ipfs if self.ipfs_enabled => {
                let cid_version = cid_version_for_expected_hash(expected);
                self.network
                    .add_bytes(bytes, cid_version)
                    .await
                    .map_err(|_| {
                        ContentError::ContentCurrentlyUnavailable(format!(
                            "could not compute hash for '{}'",
                            expected
                        ))
                    })?
                    .into_inner()
            }
            ItemType::Storage => {
                let owned = bytes.to_vec();
                tokio::task::spawn_blocking(move || sha256_hex(&owned))
                    .await
                    .map_err(|e| ContentError::TransientIo(e.to_string()))?
            }
            _ => {
                return Err(ContentError::InvalidArgument(format!(
                    "invalid storage engine: '{:?}'",
                    engine
                )))
            }
        };

        if &computed != expected.as_str() {
            return Err(ContentError::InvalidContent(format!(
                "got a bad hash! expected '{}' but computed '{}'",
                expected, computed
            )));
        }

        Ok(())
    }

    /// Resolve `hash` to bytes (default fetch policy) and decode as JSON.
    pub async fn get_json(
        &self,
        hash: &Hash,
        engine: ItemType,
        timeout: Duration,
        tries: u32,
    ) -> Result<JsonContent, ContentError> {
        let content = self
            .get_hash_content(hash, engine, timeout, tries, true, true, true)
            .await?;

        let raw = content.value.clone();
        let decoded: serde_json::Value = tokio::task::spawn_blocking(move || serde_json::from_slice(&raw))
            .await
            .map_err(|e| ContentError::TransientIo(e.to_string()))?
            .map_err(|e| ContentError::InvalidContent(format!("cannot decode JSON: {}", e)))?;

        Ok(JsonContent {
            hash: content.hash,
            source: content.source,
            value: decoded,
            raw_content: content.value,
        })
    }

    /// Serialize `value` to JSON, hash it per `engine`, and write it to the
    /// local store.
    pub async fn add_json(&self, value: &serde_json::Value, engine: ItemType) -> Result<Hash, ContentError> {
        let value = value.clone();
        let bytes = tokio::task::spawn_blocking(move || serde_json::to_vec(&value))
            .await
            .map_err(|e| ContentError::TransientIo(e.to_string()))?
            .map_err(|e| ContentError::InvalidContent(format!("cannot encode JSON: {}", e)))?;

        self.add_bytes(bytes, engine).await
    }

    /// Hash `bytes` per `engine` (symmetric to `add_json`, for opaque file
    /// payloads) and write it to the local store.
    pub async fn add_file(&self, bytes: Vec<u8>, _name: Option<&str>, engine: ItemType) -> Result<Hash, ContentError> {
        self.add_bytes(bytes, engine).await
    }

    async fn add_bytes(&self, bytes: Vec<u8>, engine: ItemType) -> Result<Hash, ContentError> {
        let hash = match engine {
            ItemType::Ipfs => self.network.add_bytes(&bytes, crate::hash::CidVersion::V0).await?,
            ItemType::Storage => {
                let owned = bytes.clone();
                let digest = tokio::task::spawn_blocking(move || sha256_hex(&owned))
                    .await
                    .map_err(|e| ContentError::TransientIo(e.to_string()))?;
                Hash::new(digest)
            }
            ItemType::Inline => {
                return Err(ContentError::InvalidArgument(
                    "storage engine 'inline' not supported for add_bytes".to_string(),
                ))
            }
        };

        self.store.set(&hash, bytes).await;
        Ok(hash)
    }

    /// Pin `hash` on the distributed content network.
    pub async fn pin_hash(&self, hash: &Hash, timeout: Duration, tries: u32) -> Result<(), ContentError> {
        self.network.pin_add(hash, timeout, tries).await
    }
}

#[cfg(test)]
mod tests {
    use super::ipfs::test_support::MockDistributedNetwork;
    use super::network::test_support::MockPeerOverlay;
    use super::*;
    use crate::store::InMemoryStore;

    fn resolver(
        store: Arc<InMemoryStore>,
        peer: Arc<MockPeerOverlay>,
        net: Arc<MockDistributedNetwork>,
        clients: HashSet<P2pClientKind>,
        ipfs_enabled: bool,
    ) -> ContentResolver {
        ContentResolver::new(store, peer, net, clients, ipfs_enabled)
    }

    #[tokio::test]
    async fn s3_storage_engine_db_hit_skips_network() {
        let store = Arc::new(InMemoryStore::new());
        let hash = Hash::new(sha256_hex(b"payload"));
        store.set(&hash, b"payload".to_vec()).await;

        let peer = Arc::new(MockPeerOverlay::default());
        let net = Arc::new(MockDistributedNetwork::default());
        let r = resolver(store, peer.clone(), net, HashSet::new(), false);

        let result = r
            .get_hash_content(
                &hash,
                ItemType::Storage,
                Duration::from_secs(1),
                1,
                true,
                true,
                true,
            )
            .await
            .unwrap();

        assert_eq!(result.source, Some(ContentSource::Db));
        assert_eq!(result.value, b"payload");
        assert!(peer.stream_response.lock().await.is_none());
    }

    #[tokio::test]
    async fn s4_p2p_fallback_caches_to_db() {
        let store = Arc::new(InMemoryStore::new());
        let hash = Hash::new(sha256_hex(b"payload"));

        let peer = Arc::new(MockPeerOverlay::default());
        *peer.stream_response.lock().await = Some(b"payload".to_vec());

        let net = Arc::new(MockDistributedNetwork::default());
        let mut clients = HashSet::new();
        clients.insert(P2pClientKind::Protocol);

        let r = resolver(store.clone(), peer, net, clients, false);

        let result = r
            .get_hash_content(
                &hash,
                ItemType::Storage,
                Duration::from_secs(1),
                1,
                true,
                true,
                true,
            )
            .await
            .unwrap();

        assert_eq!(result.source, Some(ContentSource::P2p));

        // write-through: a later resolve hits DB
        let again = r
            .get_hash_content(
                &hash,
                ItemType::Storage,
                Duration::from_secs(1),
                1,
                true,
                true,
                true,
            )
            .await
            .unwrap();
        assert_eq!(again.source, Some(ContentSource::Db));
    }

    #[tokio::test]
    async fn s5_corrupt_p2p_is_rejected_and_not_cached() {
        let store = Arc::new(InMemoryStore::new());
        let hash = Hash::new(sha256_hex(b"payload"));

        let peer = Arc::new(MockPeerOverlay::default());
        *peer.stream_response.lock().await = Some(b"pwned".to_vec());

        let net = Arc::new(MockDistributedNetwork::default());
        let mut clients = HashSet::new();
        clients.insert(P2pClientKind::Protocol);

        let r = resolver(store.clone(), peer, net, clients, false);

        let err = r
            .get_hash_content(
                &hash,
                ItemType::Storage,
                Duration::from_secs(1),
                1,
                true,
                true,
                true,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ContentError::InvalidContent(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unavailable_when_all_sources_miss() {
        let store = Arc::new(InMemoryStore::new());
        let hash = Hash::new("deadbeef");
        let peer = Arc::new(MockPeerOverlay::default());
        let net = Arc::new(MockDistributedNetwork::default());
        let mut clients = HashSet::new();
        clients.insert(P2pClientKind::Protocol);

        let r = resolver(store, peer, net, clients, false);
        let err = r
            .get_hash_content(&hash, ItemType::Storage, Duration::from_secs(1), 1, true, true, true)
            .await
            .unwrap_err();

        assert!(matches!(err, ContentError::ContentCurrentlyUnavailable(_)));
    }

    #[tokio::test]
    async fn ipfs_fallback_verifies_via_network_add_bytes() {
        let store = Arc::new(InMemoryStore::new());
        let peer = Arc::new(MockPeerOverlay::default());
        let net = Arc::new(MockDistributedNetwork::default());

        let hash_str = "QmSomeTestCidThatIsLongEnoughToBeV0Style12".to_string();
        *net.next_add_hash.lock().await = Some(hash_str.clone());
        net.entries.lock().await.insert(hash_str.clone(), b"ipfs-bytes".to_vec());

        let hash = Hash::new(hash_str);
        let r = resolver(store.clone(), peer, net, HashSet::new(), true);

        let result = r
            .get_hash_content(&hash, ItemType::Ipfs, Duration::from_secs(1), 1, true, true, true)
            .await
            .unwrap();

        assert_eq!(result.source, Some(ContentSource::Ipfs));
        assert_eq!(result.value, b"ipfs-bytes");
        assert_eq!(store.get(&hash).await.unwrap(), b"ipfs-bytes");
    }

    #[tokio::test]
    async fn verify_unknown_engine_is_invalid_argument() {
        let store = Arc::new(InMemoryStore::new());
        let peer = Arc::new(MockPeerOverlay::default());
        let net = Arc::new(MockDistributedNetwork::default());
        let r = resolver(store, peer, net, HashSet::new(), true);

        let err = r
            .verify_content_hash(b"x", ItemType::Inline, &Hash::new("whatever"))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn add_json_roundtrips_through_get_json() {
        let store = Arc::new(InMemoryStore::new());
        let peer = Arc::new(MockPeerOverlay::default());
        let net = Arc::new(MockDistributedNetwork::default());
        let r = resolver(store, peer, net, HashSet::new(), true);

        let value = serde_json::json!({"a": 1});
        let hash = r.add_json(&value, ItemType::Storage).await.unwrap();

        let fetched = r
            .get_json(&hash, ItemType::Storage, Duration::from_secs(1), 1)
            .await
            .unwrap();
        assert_eq!(fetched.value, value);
        assert_eq!(fetched.source, Some(ContentSource::Db));
    }
}
