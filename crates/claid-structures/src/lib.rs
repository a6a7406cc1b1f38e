// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # claid-structures
//!
//! Plain data types shared by every layer of the CLAID Rust runtime:
//! the [`DataPackage`] envelope, payload [`Blob`]s, control bodies, unit
//! descriptors and annotations, log messages and the request/response
//! records exchanged with the middleware core.
//!
//! Nothing in this crate performs I/O. Serialization is `serde` based so the
//! same types can be framed by any stream transport.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod annotation;
mod config_upload;
mod control;
mod descriptors;
mod error;
mod logging;
mod package;
mod runtime;
mod wire;

pub use annotation::{ModuleAnnotation, PropertyHint, PropertyType};
pub use config_upload::{ConfigUploadPayload, ModuleInjectionDescription};
pub use control::{ControlBody, ControlPackage, CtrlType};
pub use descriptors::{
    InitRuntimeRequest, ModuleChannels, ModuleDescriptor, ModuleListRequest, ModuleListResponse,
};
pub use error::{Result, StructuresError};
pub use logging::{LogMessage, LogMessageEntityType, LogMessageSeverityLevel};
pub use package::{unix_timestamp_ms, Blob, Codec, DataPackage, PackageBody};
pub use runtime::Runtime;
pub use wire::WireFrame;
