// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use chrono::{Local, TimeZone};
use claid_structures::{LogMessage, LogMessageSeverityLevel};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

/// Destination for runtime log entries.
pub trait LogSink: Send + Sync {
    /// Identifies the sink so it can be removed again.
    fn name(&self) -> &str;

    fn write(&self, entry: &LogMessage);

    /// Whether the logger's print threshold applies to this sink. Sinks that
    /// filter on their own return `false`.
    fn uses_print_threshold(&self) -> bool {
        true
    }
}

/// Renders entries as `[time | CLAID Rust LEVEL] message` through `tracing`.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        ConsoleSink
    }
}

impl LogSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn write(&self, entry: &LogMessage) {
        let time = Local
            .timestamp_millis_opt(entry.unix_timestamp_in_ms)
            .single()
            .map(|t| t.format("%d.%m.%Y - %H:%M:%S").to_string())
            .unwrap_or_default();
        let line = format!(
            "[{} | CLAID Rust {}] {}",
            time, entry.severity_level, entry.log_message
        );

        match entry.severity_level {
            LogMessageSeverityLevel::DebugVerbose => debug!("{}", line),
            LogMessageSeverityLevel::Info => info!("{}", line),
            LogMessageSeverityLevel::Warning => warn!("{}", line),
            LogMessageSeverityLevel::Error | LogMessageSeverityLevel::Fatal => error!("{}", line),
        }
    }
}

/// Keeps every entry in memory. Useful for embedding hosts and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogMessage>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogMessage> {
        self.entries.lock().clone()
    }

    pub fn contains(&self, severity: LogMessageSeverityLevel, fragment: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|e| e.severity_level == severity && e.log_message.contains(fragment))
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn write(&self, entry: &LogMessage) {
        self.entries.lock().push(entry.clone());
    }

    fn uses_print_threshold(&self) -> bool {
        false
    }
}
