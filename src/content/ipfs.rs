//! Adapter interface to a distributed content network (IPFS-like).
//!
//! The trait is the contract the resolver depends on (§6); `IpfsHttpClient`
//! is a minimal reference implementation talking to a local IPFS daemon's
//! HTTP API over `reqwest` (the ecosystem-standard async HTTP client — not
//! part of the teacher crate's dependency list, added here because this is
//! the one place the core makes outbound HTTP calls to a content network).
//! Production deployments are expected to supply their own implementation.

use std::time::Duration;

use crate::error::ContentError;
use crate::hash::{CidVersion, Hash};

#[async_trait::async_trait]
pub trait DistributedContentNetwork: std::fmt::Debug + Send + Sync {
    /// Add bytes to the network, returning the resulting content hash.
    async fn add_bytes(&self, bytes: &[u8], cid_version: CidVersion) -> Result<Hash, ContentError>;

    /// Fetch bytes for `hash`, retrying up to `tries` times, each bounded by
    /// `timeout`. Returns `None` if the network genuinely has nothing for
    /// this hash (as opposed to erroring).
    async fn get(&self, hash: &Hash, timeout: Duration, tries: u32) -> Option<Vec<u8>>;

    /// Pin `hash` so the network keeps serving it.
    async fn pin_add(&self, hash: &Hash, timeout: Duration, tries: u32) -> Result<(), ContentError>;
}

/// Talks to a local IPFS daemon's HTTP API (`/api/v0/...`).
#[derive(Debug, Clone)]
pub struct IpfsHttpClient {
    base_url: String,
    client: reqwest::Client,
}

impl IpfsHttpClient {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            base_url: format!("http://{host}:{port}/api/v0"),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl DistributedContentNetwork for IpfsHttpClient {
    async fn add_bytes(&self, bytes: &[u8], cid_version: CidVersion) -> Result<Hash, ContentError> {
        let version_arg = match cid_version {
            CidVersion::V0 => "0",
            CidVersion::V1 => "1",
        };

        let part = reqwest::multipart::Part::bytes(bytes.to_vec());
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .client
            .post(format!("{}/add?cid-version={}", self.base_url, version_arg))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ContentError::TransientIo(e.to_string()))?;

        #[derive(serde::Deserialize)]
        struct AddResponse {
            #[serde(rename = "Hash")]
            hash: String,
        }

        let parsed: AddResponse = resp
            .json()
            .await
            .map_err(|e| ContentError::TransientIo(e.to_string()))?;

        Ok(Hash::new(parsed.hash))
    }

    async fn get(&self, hash: &Hash, timeout: Duration, tries: u32) -> Option<Vec<u8>> {
        for attempt in 0..tries.max(1) {
            let result = self
                .client
                .post(format!("{}/cat?arg={}", self.base_url, hash.as_str()))
                .timeout(timeout)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    if let Ok(bytes) = resp.bytes().await {
                        return Some(bytes.to_vec());
                    }
                }
                _ => {
                    log::debug!(
                        "ipfs get attempt {}/{} failed for '{}'",
                        attempt + 1,
                        tries,
                        hash
                    );
                }
            }
        }
        None
    }

    async fn pin_add(&self, hash: &Hash, timeout: Duration, tries: u32) -> Result<(), ContentError> {
        for attempt in 0..tries.max(1) {
            let result = self
                .client
                .post(format!("{}/pin/add?arg={}", self.base_url, hash.as_str()))
                .timeout(timeout)
                .send()
                .await;

            if matches!(&result, Ok(resp) if resp.status().is_success()) {
                return Ok(());
            }
            log::debug!("ipfs pin_add attempt {}/{} failed for '{}'", attempt + 1, tries, hash);
        }
        Err(ContentError::ContentCurrentlyUnavailable(format!(
            "could not pin '{}'",
            hash
        )))
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// An in-memory stand-in for a distributed content network, used in
    /// resolver tests (§8, S3-S6 style scenarios).
    #[derive(Debug, Default)]
    pub struct MockDistributedNetwork {
        pub entries: Mutex<HashMap<String, Vec<u8>>>,
        pub next_add_hash: Mutex<Option<String>>,
    }

    #[async_trait::async_trait]
    impl DistributedContentNetwork for MockDistributedNetwork {
        async fn add_bytes(&self, bytes: &[u8], _cid_version: CidVersion) -> Result<Hash, ContentError> {
            let hash = self
                .next_add_hash
                .lock()
                .await
                .clone()
                .unwrap_or_else(|| crate::hash::sha256_hex(bytes));
            self.entries.lock().await.insert(hash.clone(), bytes.to_vec());
            Ok(Hash::new(hash))
        }

        async fn get(&self, hash: &Hash, _timeout: Duration, _tries: u32) -> Option<Vec<u8>> {
            self.entries.lock().await.get(hash.as_str()).cloned()
        }

        async fn pin_add(&self, _hash: &Hash, _timeout: Duration, _tries: u32) -> Result<(), ContentError> {
            Ok(())
        }
    }
}
