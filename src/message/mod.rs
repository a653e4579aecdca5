//! Message validator (C4): shape check, hash check for inline content,
//! signature dispatch, field whitelist.
//!
//! Grounded on `network.py`'s `check_message`. Rejection is communicated by
//! returning `None`, never by raising — the original's own comment calls
//! this function the single most dangerous piece of the pipeline ("TODO:
//! Implement it fully! Dangerous!"), so the checks below are exactly the
//! ones it performs today, no more.

pub mod ingest;
pub mod verifier;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::VerifierError;
use crate::hash::{classify, sha256_hex, ItemType};

/// Fields an incoming message is allowed to carry past validation.
pub const INCOMING_MESSAGE_AUTHORIZED_FIELDS: &[&str] = &[
    "item_hash",
    "item_content",
    "item_type",
    "chain",
    "channel",
    "sender",
    "type",
    "time",
    "signature",
];

/// A validated, whitelisted message envelope (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub item_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_content: Option<String>,
    pub item_type: ItemType,
    pub chain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub sender: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub time: f64,
    pub signature: String,
}

/// Chain-specific signature verifier, looked up by chain name (§6).
#[async_trait::async_trait]
pub trait ChainVerifier: std::fmt::Debug + Send + Sync {
    async fn verify(&self, message: &Message) -> Result<bool, VerifierError>;
}

/// Registry of verifiers keyed by chain name, mirroring `VERIFIER_REGISTER`.
#[derive(Debug, Default, Clone)]
pub struct VerifierRegistry {
    verifiers: HashMap<String, Arc<dyn ChainVerifier>>,
}

impl VerifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, chain: impl Into<String>, verifier: Arc<dyn ChainVerifier>) {
        self.verifiers.insert(chain.into(), verifier);
    }

    pub fn get(&self, chain: &str) -> Option<&Arc<dyn ChainVerifier>> {
        self.verifiers.get(chain)
    }
}

fn as_str_field<'a>(raw: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    raw.get(field).and_then(Value::as_str)
}

/// Validate and normalize a raw JSON message envelope.
///
/// `trusted` messages (built programmatically, e.g. from offloaded native
/// signing) skip the whitelist/verification step entirely and are returned
/// unmodified. Any other rejection path returns `None` — this function never
/// fails with an error; malformed input is simply dropped.
pub async fn check_message(
    raw: Value,
    registry: &VerifierRegistry,
    trusted: bool,
) -> Result<Option<Message>, VerifierError> {
    let mut obj = match raw {
        Value::Object(map) => map,
        _ => return Ok(None),
    };

    if as_str_field(&obj, "item_hash").is_none() {
        log::warn!("unknown hash {:?}", obj.get("item_hash"));
        return Ok(None);
    }
    if as_str_field(&obj, "chain").is_none() {
        log::warn!("unknown chain {:?}", obj.get("chain"));
        return Ok(None);
    }
    if let Some(channel) = obj.get("channel") {
        if !channel.is_null() && !channel.is_string() {
            log::warn!("unknown channel {:?}", channel);
            return Ok(None);
        }
    }
    if as_str_field(&obj, "sender").is_none() {
        log::warn!("unknown sender {:?}", obj.get("sender"));
        return Ok(None);
    }
    if as_str_field(&obj, "signature").is_none() {
        log::warn!("unknown signature {:?}", obj.get("signature"));
        return Ok(None);
    }

    let item_type = if let Some(item_content) = obj.get("item_content").cloned() {
        let content_str = match item_content.as_str() {
            Some(s) => s,
            None => return Ok(None),
        };

        if content_str.len() > crate::hash::MAX_INLINE_SIZE {
            log::warn!("message too long");
            return Ok(None);
        }

        tokio::task::yield_now().await;

        let hash_type = obj
            .get("hash_type")
            .and_then(Value::as_str)
            .unwrap_or("sha256");

        if hash_type == "sha256" {
            if !trusted {
                let computed = {
                    let bytes = content_str.as_bytes().to_vec();
                    tokio::task::spawn_blocking(move || sha256_hex(&bytes))
                        .await
                        .map_err(|e| VerifierError::Other(e.to_string()))?
                };

                if as_str_field(&obj, "item_hash") != Some(computed.as_str()) {
                    log::warn!("bad hash");
                    return Ok(None);
                }
            }
        } else {
            log::warn!("unknown hash type {}", hash_type);
            return Ok(None);
        }

        ItemType::Inline
    } else {
        let item_hash = as_str_field(&obj, "item_hash").unwrap().to_string();
        match classify(&crate::hash::Hash::new(item_hash)) {
            Ok(t) => t,
            Err(_) => obj
                .get("item_type")
                .and_then(Value::as_str)
                .and_then(|s| match s {
                    "inline" => Some(ItemType::Inline),
                    "storage" => Some(ItemType::Storage),
                    "ipfs" => Some(ItemType::Ipfs),
                    _ => None,
                })
                .unwrap_or_default(),
        }
    };
    obj.insert("item_type".to_string(), serde_json::to_value(item_type).unwrap());

    if trusted {
        // §8 property 7 says extraneous fields survive when `trusted = true`; here
        // they don't, because `Message` is a typed product of exactly the
        // whitelisted fields (§9 endorses this realization for typed languages).
        // A `trusted` caller that needs to round-trip unknown fields would have to
        // carry them out-of-band rather than on `Message` itself.
        return Ok(Some(decode_envelope(obj)));
    }

    let whitelisted: Map<String, Value> = obj
        .into_iter()
        .filter(|(k, _)| INCOMING_MESSAGE_AUTHORIZED_FIELDS.contains(&k.as_str()))
        .collect();

    tokio::task::yield_now().await;

    let chain = whitelisted.get("chain").and_then(Value::as_str).map(String::from);
    let verifier = match chain.as_deref().and_then(|c| registry.get(c)) {
        Some(v) => v,
        None => {
            log::warn!("unknown chain for validation {:?}", chain);
            return Ok(None);
        }
    };

    let message = decode_envelope(whitelisted);

    match verifier.verify(&message).await {
        Ok(true) => Ok(Some(message)),
        Ok(false) => Ok(None),
        Err(VerifierError::InvalidArgument(msg)) => {
            log::warn!("signature validation error: {}", msg);
            Ok(None)
        }
        Err(other) => Err(other),
    }
}

fn decode_envelope(obj: Map<String, Value>) -> Message {
    Message {
        item_hash: obj.get("item_hash").and_then(Value::as_str).unwrap_or_default().to_string(),
        item_content: obj.get("item_content").and_then(Value::as_str).map(String::from),
        item_type: obj
            .get("item_type")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default(),
        chain: obj.get("chain").and_then(Value::as_str).unwrap_or_default().to_string(),
        channel: obj.get("channel").and_then(Value::as_str).map(String::from),
        sender: obj.get("sender").and_then(Value::as_str).unwrap_or_default().to_string(),
        message_type: obj.get("type").and_then(Value::as_str).unwrap_or_default().to_string(),
        time: obj.get("time").and_then(Value::as_f64).unwrap_or_default(),
        signature: obj.get("signature").and_then(Value::as_str).unwrap_or_default().to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use serde_json::json;

    fn inline_message(content: &str, hash: &str) -> Value {
        json!({
            "item_hash": hash,
            "item_content": content,
            "chain": "X",
            "sender": "s",
            "signature": "ok",
            "type": "POST",
            "time": 1.0,
        })
    }

    #[tokio::test]
    async fn s1_inline_happy_path() {
        let registry = registry_with("X", Arc::new(AcceptVerifier));
        let hash = sha256_hex(b"hi");
        let msg = inline_message("hi", &hash);

        let result = check_message(msg, &registry, false).await.unwrap().unwrap();
        assert_eq!(result.item_type, ItemType::Inline);
        assert_eq!(result.item_hash, hash);
    }

    #[tokio::test]
    async fn s2_corrupt_inline_is_rejected() {
        let registry = registry_with("X", Arc::new(AcceptVerifier));
        let hash = sha256_hex(b"hi");
        let msg = inline_message("hi!", &hash);

        let result = check_message(msg, &registry, false).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn oversize_inline_is_rejected() {
        let registry = registry_with("X", Arc::new(AcceptVerifier));
        let big = "a".repeat(crate::hash::MAX_INLINE_SIZE + 1);
        let hash = sha256_hex(big.as_bytes());
        let msg = inline_message(&big, &hash);

        let result = check_message(msg, &registry, false).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn unknown_chain_is_rejected() {
        let registry = VerifierRegistry::new();
        let hash = sha256_hex(b"hi");
        let msg = inline_message("hi", &hash);

        let result = check_message(msg, &registry, false).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn verifier_false_rejects() {
        let registry = registry_with("X", Arc::new(RejectVerifier));
        let hash = sha256_hex(b"hi");
        let msg = inline_message("hi", &hash);

        let result = check_message(msg, &registry, false).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn field_whitelist_drops_extraneous_fields() {
        let registry = registry_with("X", Arc::new(AcceptVerifier));
        let hash = sha256_hex(b"hi");
        let mut msg = inline_message("hi", &hash);
        msg.as_object_mut()
            .unwrap()
            .insert("evil_field".to_string(), json!("danger"));

        let result = check_message(msg, &registry, false).await.unwrap().unwrap();
        let serialized = serde_json::to_value(&result).unwrap();
        assert!(serialized.get("evil_field").is_none());
    }

    #[tokio::test]
    async fn trusted_message_skips_whitelist_and_verification() {
        // `trusted` skips the *whitelist-projection-then-verify* step (no
        // registry lookup happens here, and `registry` above is empty), not
        // the whitelist itself: `Message` is a typed product of exactly the
        // fields in `INCOMING_MESSAGE_AUTHORIZED_FIELDS`, so `unknown_field`
        // has nowhere to live regardless of `trusted`. This is a deliberate
        // divergence from §8 property 7's untyped-envelope phrasing ("present
        // when trusted = true") — see §9's note that typed languages should
        // define a product type for the normalized envelope.
        let registry = VerifierRegistry::new();
        let hash = sha256_hex(b"hi");
        let mut msg = inline_message("hi", &hash);
        msg.as_object_mut()
            .unwrap()
            .insert("unknown_field".to_string(), json!(true));

        let result = check_message(msg, &registry, true).await.unwrap().unwrap();
        let serialized = serde_json::to_value(&result).unwrap();
        assert!(serialized.get("unknown_field").is_none());
    }

    #[tokio::test]
    async fn non_inline_classifies_item_type_from_hash() {
        let registry = registry_with("X", Arc::new(AcceptVerifier));
        let msg = json!({
            "item_hash": "QmZsK1hCVrBxiwGQ7vu1bhmaXk2hV9a9RxxxxxxxxxX",
            "chain": "X",
            "sender": "s",
            "signature": "ok",
            "type": "POST",
            "time": 1.0,
        });

        let result = check_message(msg, &registry, false).await.unwrap().unwrap();
        assert_eq!(result.item_type, ItemType::Ipfs);
    }
}
