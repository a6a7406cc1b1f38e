// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Each struct maps to one section of `claid_runtime.toml`.

use std::path::PathBuf;
use std::time::Duration;

use claid_structures::LogMessageSeverityLevel;
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub bootstrap: BootstrapConfig,
    pub connection: ConnectionConfig,
    pub runtime: RuntimeTuning,
    pub logging: LoggingConfig,
}

/// Startup record handed to the runtime once: where the core listens and
/// who this runtime runs for.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// `ipc:///path` or `tcp://host:port`
    pub socket_path: String,
    pub config_file_path: PathBuf,
    pub host_id: String,
    pub user_id: String,
    pub device_id: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            socket_path: "ipc:///tmp/claid_socket".to_string(),
            config_file_path: PathBuf::new(),
            host_id: "localhost".to_string(),
            user_id: String::new(),
            device_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Attempts to open the socket before giving up
    pub connect_retries: u32,
    pub retry_backoff_ms: u64,
    /// How long to wait for the ping echo
    pub handshake_timeout_ms: u64,
    /// Timeout of unary requests (unit list, init runtime)
    pub request_timeout_ms: u64,
    /// Poll interval of the inbound reader loop
    pub stream_poll_interval_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_retries: 5,
            retry_backoff_ms: 500,
            handshake_timeout_ms: 5000,
            request_timeout_ms: 10000,
            stream_poll_interval_ms: 100,
        }
    }
}

impl ConnectionConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn stream_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stream_poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeTuning {
    /// Pause between stopping and starting again on restart
    pub restart_pause_ms: u64,
    pub annotation_query_timeout_ms: u64,
    /// Poll interval of the execution thread
    pub execution_poll_interval_ms: u64,
}

impl Default for RuntimeTuning {
    fn default() -> Self {
        Self {
            restart_pause_ms: 2000,
            annotation_query_timeout_ms: 3000,
            execution_poll_interval_ms: 50,
        }
    }
}

impl RuntimeTuning {
    pub fn restart_pause(&self) -> Duration {
        Duration::from_millis(self.restart_pause_ms)
    }

    pub fn annotation_query_timeout(&self) -> Duration {
        Duration::from_millis(self.annotation_query_timeout_ms)
    }

    pub fn execution_poll_interval(&self) -> Duration {
        Duration::from_millis(self.execution_poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` level (trace, debug, info, warn, error)
    pub level: String,
    /// Lowest severity forwarded to the core's log sink
    pub log_sink_severity_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_sink_severity_level: "WARNING".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Parsed log-sink severity; falls back to `WARNING` when unknown.
    pub fn log_sink_severity(&self) -> LogMessageSeverityLevel {
        self.log_sink_severity_level
            .parse()
            .unwrap_or(LogMessageSeverityLevel::Warning)
    }
}
