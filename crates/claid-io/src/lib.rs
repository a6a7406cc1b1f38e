// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # claid-io
//!
//! Connection between the CLAID Rust runtime and the middleware core.
//!
//! [`ModuleDispatcher`] owns the session: it opens a [`CoreTransport`],
//! performs the unary setup calls, runs the `RUNTIME_PING` handshake and then
//! drains the outbound queue into the transport. [`ZmqCoreTransport`] talks
//! to a real core; [`MemoryCore`]/[`MemoryTransport`] keep both ends in
//! process.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod error;
mod memory;
pub mod reconnect;
mod session;
mod transport;
mod zmq;

pub use error::{Result, TransportError};
pub use memory::{MemoryCore, MemoryTransport};
pub use session::{ModuleDispatcher, SessionState};
pub use transport::CoreTransport;
pub use zmq::ZmqCoreTransport;
