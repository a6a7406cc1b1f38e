// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use claid_structures::{
    unix_timestamp_ms, LogMessage, LogMessageEntityType, LogMessageSeverityLevel, Runtime,
};
use parking_lot::RwLock;

use crate::{ConsoleSink, LogSink};

/// Runtime logger.
///
/// Shared as `Arc<Logger>` by every component that logs. Entries below the
/// print threshold are not passed to sinks that use it; the threshold is set
/// from the core's unit-list response.
pub struct Logger {
    runtime: Runtime,
    sinks: RwLock<Vec<Arc<dyn LogSink>>>,
    print_threshold: RwLock<LogMessageSeverityLevel>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("runtime", &self.runtime)
            .field("sinks", &self.sink_names())
            .field("print_threshold", &*self.print_threshold.read())
            .finish()
    }
}

impl Logger {
    pub fn new(runtime: Runtime, sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self {
            runtime,
            sinks: RwLock::new(sinks),
            print_threshold: RwLock::new(LogMessageSeverityLevel::Info),
        }
    }

    /// Logger writing to the console only.
    pub fn console(runtime: Runtime) -> Arc<Self> {
        let console: Arc<dyn LogSink> = Arc::new(ConsoleSink::new());
        Arc::new(Self::new(runtime, vec![console]))
    }

    pub fn runtime(&self) -> Runtime {
        self.runtime
    }

    pub fn add_sink(&self, sink: Arc<dyn LogSink>) {
        self.sinks.write().push(sink);
    }

    /// Remove every sink with the given name. Returns how many were removed.
    pub fn remove_sink(&self, name: &str) -> usize {
        let mut sinks = self.sinks.write();
        let before = sinks.len();
        sinks.retain(|sink| sink.name() != name);
        before - sinks.len()
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.sinks.read().iter().map(|s| s.name().to_string()).collect()
    }

    pub fn set_print_threshold(&self, level: LogMessageSeverityLevel) {
        *self.print_threshold.write() = level;
    }

    pub fn print_threshold(&self) -> LogMessageSeverityLevel {
        *self.print_threshold.read()
    }

    pub fn log(
        &self,
        level: LogMessageSeverityLevel,
        entity_type: LogMessageEntityType,
        entity_name: &str,
        message: impl Into<String>,
    ) {
        let entry = LogMessage {
            log_message: message.into(),
            severity_level: level,
            unix_timestamp_in_ms: unix_timestamp_ms(),
            entity_type,
            entity_name: entity_name.to_string(),
            runtime: self.runtime,
        };
        self.write(&entry);
    }

    /// Pass an already built entry to the sinks.
    pub fn write(&self, entry: &LogMessage) {
        let threshold = self.print_threshold();
        // Clone the list so a sink may log or change sinks without deadlocking.
        let sinks: Vec<Arc<dyn LogSink>> = self.sinks.read().clone();
        for sink in sinks {
            if sink.uses_print_threshold() && entry.severity_level < threshold {
                continue;
            }
            sink.write(entry);
        }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.middleware(LogMessageSeverityLevel::DebugVerbose, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.middleware(LogMessageSeverityLevel::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.middleware(LogMessageSeverityLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.middleware(LogMessageSeverityLevel::Error, message);
    }

    pub fn fatal(&self, message: impl Into<String>) {
        self.middleware(LogMessageSeverityLevel::Fatal, message);
    }

    fn middleware(&self, level: LogMessageSeverityLevel, message: impl Into<String>) {
        self.log(level, LogMessageEntityType::MiddlewareOrUnspecified, "", message);
    }
}
