//! Adapter interface to the peer overlay: a binary streaming transport plus
//! an HTTP fallback (§6). `HttpPeerOverlay` is a minimal reference
//! implementation; the binary streaming transport itself (libp2p-based, in
//! production deployments) is out of scope for this crate and always
//! returns `None` here, matching §1's framing of the low-level peer
//! transport as an external collaborator.

use std::time::Duration;

#[async_trait::async_trait]
pub trait PeerOverlay: std::fmt::Debug + Send + Sync {
    /// Ask the binary streaming transport for `hash`.
    async fn stream_request(&self, hash: &crate::hash::Hash) -> Option<Vec<u8>>;

    /// Ask a known peer for `hash` over HTTP.
    async fn http_request(&self, hash: &crate::hash::Hash, timeout: Duration) -> Option<Vec<u8>>;
}

/// Talks to a static list of peer HTTP endpoints; the binary transport is
/// not implemented and always misses.
#[derive(Debug, Clone)]
pub struct HttpPeerOverlay {
    peers: Vec<String>,
    client: reqwest::Client,
}

impl HttpPeerOverlay {
    pub fn new(peers: Vec<String>) -> Self {
        Self {
            peers,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl PeerOverlay for HttpPeerOverlay {
    async fn stream_request(&self, _hash: &crate::hash::Hash) -> Option<Vec<u8>> {
        None
    }

    async fn http_request(&self, hash: &crate::hash::Hash, timeout: Duration) -> Option<Vec<u8>> {
        for peer in &self.peers {
            let result = self
                .client
                .get(format!("{peer}/p2p/content/{}", hash.as_str()))
                .timeout(timeout)
                .send()
                .await;

            if let Ok(resp) = result {
                if resp.status().is_success() {
                    if let Ok(bytes) = resp.bytes().await {
                        return Some(bytes.to_vec());
                    }
                }
            }
        }
        None
    }
}
