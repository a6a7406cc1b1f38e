// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! All problems are collected and reported together.

use claid_structures::LogMessageSeverityLevel;

use crate::{ConfigError, ConfigResult, RuntimeConfig};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &RuntimeConfig) -> ConfigResult<()> {
    let errors = collect_errors(config);
    if errors.is_empty() {
        return Ok(());
    }

    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

/// Every problem in `config`, in section order.
pub fn collect_errors(config: &RuntimeConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_bootstrap(config, &mut errors);
    validate_timeouts(config, &mut errors);
    validate_logging(config, &mut errors);
    errors
}

fn validate_bootstrap(config: &RuntimeConfig, errors: &mut Vec<ConfigValidationError>) {
    let socket_path = &config.bootstrap.socket_path;
    if socket_path.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "bootstrap.socket_path".to_string(),
        });
    } else if !socket_path.contains("://") {
        errors.push(ConfigValidationError::InvalidValue {
            field: "bootstrap.socket_path".to_string(),
            reason: format!("\"{}\" has no scheme (expected ipc:// or tcp://)", socket_path),
        });
    }

    if config.bootstrap.host_id.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "bootstrap.host_id".to_string(),
        });
    }
}

fn validate_timeouts(config: &RuntimeConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.connection.handshake_timeout_ms == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "connection.handshake_timeout_ms".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    if config.connection.request_timeout_ms == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "connection.request_timeout_ms".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    if config.runtime.execution_poll_interval_ms == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "runtime.execution_poll_interval_ms".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
}

fn validate_logging(config: &RuntimeConfig, errors: &mut Vec<ConfigValidationError>) {
    let level = &config.logging.log_sink_severity_level;
    if level.parse::<LogMessageSeverityLevel>().is_err() {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.log_sink_severity_level".to_string(),
            reason: format!("unknown severity \"{}\"", level),
        });
    }
}
