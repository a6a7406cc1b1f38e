// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use claid_serialization::CodecError;
use claid_scheduling::SchedulingError;
use thiserror::Error;

pub type ModuleResult<T> = std::result::Result<T, ModuleError>;

#[derive(Error, Debug)]
pub enum ModuleError {
    /// Misuse of the unit API. Reported to the unit, never fatal to the runtime.
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Fatal error in module {module_id}: {reason}")]
    Fatal { module_id: String, reason: String },

    #[error("Module class \"{0}\" is not registered")]
    UnknownClass(String),

    #[error("Failed to inject modules: {0}")]
    Injection(String),

    #[error("Missing property \"{0}\"")]
    MissingProperty(String),

    #[error("Invalid value for property \"{key}\": {reason}")]
    InvalidProperty { key: String, reason: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
}

impl ModuleError {
    pub fn usage(message: impl Into<String>) -> Self {
        ModuleError::Usage(message.into())
    }

    pub fn fatal(module_id: impl Into<String>, reason: impl Into<String>) -> Self {
        ModuleError::Fatal {
            module_id: module_id.into(),
            reason: reason.into(),
        }
    }
}
