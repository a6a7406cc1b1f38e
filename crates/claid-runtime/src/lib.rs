// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # claid-runtime
//!
//! The orchestration layer of the CLAID Rust runtime.
//!
//! [`ModuleManager`] fetches the unit list from the core, runs unit
//! lifecycles, routes packages between the session and the channel registry
//! and executes the control protocol (restart, unload, annotation queries,
//! module injection, log streaming). [`Claid`] wires it to an execution
//! thread and a transport.
//!
//! ```no_run
//! use std::sync::Arc;
//! use claid_config::RuntimeConfig;
//! use claid_io::MemoryCore;
//! use claid_runtime::Claid;
//!
//! let core = MemoryCore::new();
//! let claid = Claid::new(RuntimeConfig::default());
//! claid.start(Arc::new(core.transport())).unwrap();
//! claid.shutdown().unwrap();
//! ```

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod claid;
mod error;
mod log_sink;
mod manager;
pub mod planner;

pub use claid::Claid;
pub use error::{Result, RuntimeError};
pub use log_sink::StreamLogSink;
pub use manager::{ConnectionCallback, LogSinkCallback, ModuleManager, RUNTIME};
pub use planner::{ControlPlanner, ManagerAction, ManagerPhase};
