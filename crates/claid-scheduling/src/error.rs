// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchedulingError>;

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Channel is closed: {0}")]
    ChannelClosed(String),

    #[error("Dispatcher {0} is already running")]
    AlreadyRunning(String),

    #[error("Failed to spawn thread {name}: {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
