//! Ingestion entrypoint (C5): accept a raw pubsub frame, decode, route to
//! the validator, enqueue.
//!
//! Grounded on `network.py`'s `incoming_check`.

use percent_encoding::percent_decode_str;
use serde_json::Value;

use super::{check_message, Message, VerifierRegistry};
use crate::error::VerifierError;

/// A raw pubsub frame: carries the wire bytes for one message.
#[derive(Debug, Clone)]
pub struct PubsubFrame {
    pub data: Vec<u8>,
}

/// Decode a pubsub frame and validate it as an untrusted, network-origin
/// message. Returns `None` both when the frame fails to decode and when
/// `check_message` rejects it — both cases are logged and dropped, never
/// propagated as an error to the caller.
pub async fn on_pubsub_frame(
    frame: &PubsubFrame,
    registry: &VerifierRegistry,
) -> Result<Option<Message>, VerifierError> {
    let text = match std::str::from_utf8(&frame.data) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("received non-utf8 message: {}", e);
            return Ok(None);
        }
    };

    let unquoted = percent_decode_str(text).decode_utf8_lossy().into_owned();

    let raw: Value = match serde_json::from_str(&unquoted) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("received non-json message {:?}: {}", unquoted, e);
            return Ok(None);
        }
    };

    log::debug!("new message! {:?}", raw);
    check_message(raw, registry, false).await
}
