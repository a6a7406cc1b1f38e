// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{Runtime, StructuresError};

/// Severity of a log entry. Ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogMessageSeverityLevel {
    DebugVerbose,
    #[default]
    Info,
    Warning,
    Error,
    Fatal,
}

impl LogMessageSeverityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogMessageSeverityLevel::DebugVerbose => "DEBUG_VERBOSE",
            LogMessageSeverityLevel::Info => "INFO",
            LogMessageSeverityLevel::Warning => "WARNING",
            LogMessageSeverityLevel::Error => "ERROR",
            LogMessageSeverityLevel::Fatal => "FATAL",
        }
    }
}

impl std::fmt::Display for LogMessageSeverityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogMessageSeverityLevel {
    type Err = StructuresError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG_VERBOSE" | "DEBUG" | "TRACE" => Ok(LogMessageSeverityLevel::DebugVerbose),
            "INFO" => Ok(LogMessageSeverityLevel::Info),
            "WARNING" | "WARN" => Ok(LogMessageSeverityLevel::Warning),
            "ERROR" => Ok(LogMessageSeverityLevel::Error),
            "FATAL" => Ok(LogMessageSeverityLevel::Fatal),
            _ => Err(StructuresError::UnknownSeverityLevel(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogMessageEntityType {
    #[default]
    MiddlewareOrUnspecified,
    Scheduler,
    Module,
}

/// One log entry as it travels through the control stream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogMessage {
    pub log_message: String,
    pub severity_level: LogMessageSeverityLevel,
    pub unix_timestamp_in_ms: i64,
    pub entity_type: LogMessageEntityType,
    pub entity_name: String,
    pub runtime: Runtime,
}
