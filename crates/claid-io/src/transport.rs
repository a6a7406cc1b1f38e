// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use claid_structures::{DataPackage, InitRuntimeRequest, ModuleListRequest, ModuleListResponse};

use crate::Result;

/// Wire operations towards the core. Implementations are shared between the
/// session's writer thread and the manager's reader thread, so every method
/// takes `&self`.
pub trait CoreTransport: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Open (or reopen) the connection. Opening an open transport is a no-op.
    fn open(&self) -> Result<()>;

    fn is_open(&self) -> bool;

    fn get_module_list(&self, request: ModuleListRequest, timeout: Duration) -> Result<ModuleListResponse>;

    fn init_runtime(&self, request: InitRuntimeRequest, timeout: Duration) -> Result<()>;

    fn send_package(&self, package: &DataPackage) -> Result<()>;

    /// Next inbound package. `Ok(None)` when nothing arrived within
    /// `timeout`; `Err(ConnectionClosed)` once the stream ended.
    fn recv_package(&self, timeout: Duration) -> Result<Option<DataPackage>>;

    fn close(&self);
}
