// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the transport session

use claid_structures::StructuresError;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("ZMQ error: {0}")]
    Zmq(#[from] zeromq::ZmqError),

    #[error("Frame encoding error: {0}")]
    Frame(#[from] StructuresError),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Connection to the core is closed")]
    ConnectionClosed,

    #[error("Session already connected")]
    AlreadyConnected,

    /// The first package received after the ping was not its echo.
    #[error("Handshake violation: {0}")]
    HandshakeViolation(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Failed to start I/O runtime: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Check if error is retryable (socket open only)
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Zmq(_) | TransportError::Timeout(_))
    }
}
