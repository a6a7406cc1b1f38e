// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error type for structure-level validation and parsing.

pub type Result<T> = std::result::Result<T, StructuresError>;

#[derive(Debug, thiserror::Error)]
pub enum StructuresError {
    #[error("Unknown control type identifier: {0}")]
    UnknownControlType(String),

    #[error("Unknown runtime identifier: {0}")]
    UnknownRuntime(String),

    #[error("Unknown log severity level: {0}")]
    UnknownSeverityLevel(String),

    #[error("Invalid data package: {0}")]
    InvalidPackage(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
