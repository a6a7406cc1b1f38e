// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use claid_config::ConfigError;
use claid_io::TransportError;
use claid_module::ModuleError;
use claid_scheduling::SchedulingError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to instantiate module \"{module_id}\": class \"{module_class}\" is not registered")]
    Instantiate {
        module_id: String,
        module_class: String,
    },

    #[error("Failed to initialize module \"{module_id}\": {source}")]
    Initialize {
        module_id: String,
        #[source]
        source: ModuleError,
    },

    #[error("Runtime is already running")]
    AlreadyRunning,

    #[error("Runtime is not running")]
    NotRunning,

    #[error("Timeout: {0}")]
    Timeout(String),
}
