// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # claid-observability
//!
//! Logging infrastructure for the CLAID Rust runtime.
//!
//! Two layers live here:
//! - process-level diagnostics through `tracing`, set up by [`init_logging`]
//!   with per-crate debug flags;
//! - the runtime [`Logger`], an explicit object handed to every component
//!   that logs in the framework's severity/entity model. Where its entries go
//!   is decided by the [`LogSink`]s it was built with.
//!
//! ## Features
//! - `file-logging`: additional non-blocking file output

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;
mod logger;
mod sink;

pub use cli::*;
pub use config::*;
pub use init::*;
pub use logger::Logger;
pub use sink::{ConsoleSink, LogSink, MemorySink};

/// Known CLAID crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "claid-structures",
    "claid-serialization",
    "claid-scheduling",
    "claid-observability",
    "claid-config",
    "claid-module",
    "claid-io",
    "claid-runtime",
];
