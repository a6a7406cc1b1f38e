// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! `tracing` initialization for CLAID processes.

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::{LogFormat, LoggingConfig};

/// Keeps non-blocking writers alive; logs are flushed when dropped.
#[derive(Default)]
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    installed: bool,
}

impl LoggingGuard {
    /// False if another subscriber was already installed.
    pub fn installed(&self) -> bool {
        self.installed
    }
}

/// Install the global subscriber.
///
/// Safe to call more than once: later calls leave the first subscriber in
/// place and return a guard with `installed() == false`.
pub fn init_logging(config: &LoggingConfig, debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string(&config.level);
    let env_filter = EnvFilter::try_new(&filter)?;

    let mut layers = Vec::new();
    let console_layer = match config.format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_filter(env_filter)
            .boxed(),
    };
    layers.push(console_layer);

    #[cfg(feature = "file-logging")]
    let mut file_guards = Vec::new();

    #[cfg(feature = "file-logging")]
    if let Some(dir) = &config.file_dir {
        std::fs::create_dir_all(dir)?;
        let appender = tracing_appender::rolling::daily(dir, "claid_runtime.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guards.push(guard);
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(EnvFilter::try_new(&filter)?)
                .boxed(),
        );
    }

    let installed = Registry::default().with(layers).try_init().is_ok();

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: file_guards,
        installed,
    })
}

/// Initialize logging with default settings
pub fn init_logging_default(debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    init_logging(&LoggingConfig::default(), debug_flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_does_not_fail() {
        let flags = CrateDebugFlags::default();
        init_logging_default(&flags).unwrap();
        let second = init_logging_default(&flags).unwrap();
        assert!(!second.installed());
    }

    #[test]
    fn test_invalid_level_is_an_error() {
        let config = LoggingConfig {
            level: "claid_io=loud".to_string(),
            ..Default::default()
        };
        assert!(init_logging(&config, &CrateDebugFlags::default()).is_err());
    }
}
