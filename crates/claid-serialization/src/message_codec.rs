// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use claid_structures::{Blob, Codec};
use tracing::warn;

use crate::{AnyMessage, CodecError, CodecResult, Message};

/// Encoder/decoder bound to one message type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageCodec {
    full_name: String,
}

impl MessageCodec {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
        }
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Encode `message` into a blob. Returns `None` if the message is not of
    /// the type this codec is bound to.
    pub fn encode(&self, message: &dyn AnyMessage) -> Option<Blob> {
        if message.full_name() != self.full_name {
            return None;
        }

        match message.encode_bytes() {
            Ok(payload) => Some(Blob::new(Codec::Json, payload, self.full_name.clone())),
            Err(e) => {
                warn!("[CODEC] failed to encode message of type {}: {}", self.full_name, e);
                None
            }
        }
    }

    /// Decode a blob into `M`.
    ///
    /// Senders may leave the bytes empty for default-valued messages, so an
    /// empty payload decodes to `M::default()`.
    pub fn decode<M: Message>(&self, blob: &Blob) -> CodecResult<M> {
        if M::FULL_NAME != self.full_name {
            return Err(CodecError::TypeMismatch {
                expected: self.full_name.clone(),
                actual: M::FULL_NAME.to_string(),
            });
        }

        if blob.payload.is_empty() {
            warn!(
                "[CODEC] payload of type {} is empty, using default value",
                self.full_name
            );
            return Ok(M::default());
        }

        serde_json::from_slice(&blob.payload).map_err(|e| CodecError::Decode {
            message_type: self.full_name.clone(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{DoubleVal, IntVal};

    #[test]
    fn test_encode_rejects_other_message_types() {
        let codec = MessageCodec::new(IntVal::FULL_NAME);
        assert!(codec.encode(&DoubleVal { val: 1.5 }).is_none());

        let blob = codec.encode(&IntVal { val: 7 }).unwrap();
        assert_eq!(blob.message_type, "claidservice.IntVal");
        assert_eq!(blob.codec, Codec::Json);
    }

    #[test]
    fn test_empty_payload_decodes_to_default() {
        let codec = MessageCodec::new(IntVal::FULL_NAME);
        let blob = Blob::new(Codec::Proto, Vec::new(), IntVal::FULL_NAME);
        let value: IntVal = codec.decode(&blob).unwrap();
        assert_eq!(value, IntVal::default());
    }

    #[test]
    fn test_corrupt_payload_is_a_decode_error() {
        let codec = MessageCodec::new(IntVal::FULL_NAME);
        let blob = Blob::new(Codec::Json, b"{\"val\": \"seven\"}".to_vec(), IntVal::FULL_NAME);
        let result: CodecResult<IntVal> = codec.decode(&blob);
        assert!(matches!(result, Err(CodecError::Decode { .. })));
    }
}
