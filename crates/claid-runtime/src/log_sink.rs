// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use claid_observability::LogSink;
use claid_scheduling::ThreadSafeChannel;
use claid_structures::{
    ControlBody, ControlPackage, CtrlType, DataPackage, LogMessage, LogMessageSeverityLevel,
    Runtime,
};

pub(crate) fn log_message_package(runtime: Runtime, source_host: &str, entry: &LogMessage) -> DataPackage {
    DataPackage {
        source_host: source_host.to_string(),
        ..DataPackage::control(
            ControlPackage::new(CtrlType::LocalLogMessage, runtime)
                .with_body(ControlBody::LogMessage(entry.clone())),
        )
    }
}

/// Forwards log entries to the core as `LOCAL_LOG_MESSAGE` while the
/// manager is running.
pub struct StreamLogSink {
    runtime: Runtime,
    source_host: String,
    min_severity: LogMessageSeverityLevel,
    to_core: Arc<ThreadSafeChannel<DataPackage>>,
    running: Arc<AtomicBool>,
}

impl StreamLogSink {
    pub const NAME: &'static str = "core-stream";

    pub fn new(
        runtime: Runtime,
        source_host: impl Into<String>,
        min_severity: LogMessageSeverityLevel,
        to_core: Arc<ThreadSafeChannel<DataPackage>>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            runtime,
            source_host: source_host.into(),
            min_severity,
            to_core,
            running,
        }
    }
}

impl LogSink for StreamLogSink {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn write(&self, entry: &LogMessage) {
        if entry.severity_level < self.min_severity || !self.running.load(Ordering::Acquire) {
            return;
        }
        // A closed queue means the session is going down; the entry still
        // reached the other sinks.
        let _ = self.to_core.put(log_message_package(self.runtime, &self.source_host, entry));
    }

    fn uses_print_threshold(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claid_observability::Logger;

    #[test]
    fn test_only_forwards_while_running_and_above_threshold() {
        let to_core = Arc::new(ThreadSafeChannel::new("to_core"));
        let running = Arc::new(AtomicBool::new(false));
        let sink: Arc<dyn LogSink> = Arc::new(StreamLogSink::new(
            Runtime::Rust,
            "lab-pc",
            LogMessageSeverityLevel::Warning,
            Arc::clone(&to_core),
            Arc::clone(&running),
        ));
        let logger = Logger::new(Runtime::Rust, vec![sink]);

        logger.error("before start");
        assert_eq!(to_core.size(), 0);

        running.store(true, Ordering::SeqCst);
        logger.info("chatty");
        logger.warning("disk almost full");
        assert_eq!(to_core.size(), 1);

        let package = to_core.try_get().unwrap();
        assert_eq!(package.ctrl_type(), Some(CtrlType::LocalLogMessage));
        assert_eq!(package.source_host, "lab-pc");
        assert_eq!(
            package.control_val().unwrap().log_message().unwrap().log_message,
            "disk almost full"
        );
    }
}
