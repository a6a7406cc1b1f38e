// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

pub type CodecResult<T> = std::result::Result<T, CodecError>;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The example value cannot be mapped onto any payload type.
    #[error("Unsupported type for channel payload: {0}")]
    UnsupportedShape(String),

    #[error("Type mismatch: codec is bound to \"{expected}\" but value is \"{actual}\"")]
    TypeMismatch { expected: String, actual: String },

    #[error("Data package carries no payload (channel \"{0}\")")]
    MissingPayload(String),

    #[error("Failed to decode payload of type \"{message_type}\": {reason}")]
    Decode {
        message_type: String,
        reason: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
