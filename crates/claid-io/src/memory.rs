// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-process transport. [`MemoryCore`] plays the core side and is used by
//! tests and by hosts that embed the runtime without a separate core.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use claid_structures::{
    CtrlType, DataPackage, InitRuntimeRequest, ModuleListRequest, ModuleListResponse,
};
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::{CoreTransport, Result, TransportError};

struct Link {
    to_core: (Sender<DataPackage>, Receiver<DataPackage>),
    to_runtime: (Sender<DataPackage>, Receiver<DataPackage>),
    open: AtomicBool,
    open_count: AtomicUsize,
    echo_ping: AtomicBool,
    module_list: Mutex<ModuleListResponse>,
    module_list_requests: Mutex<Vec<ModuleListRequest>>,
    init_runtime_requests: Mutex<Vec<InitRuntimeRequest>>,
}

/// Core side of an in-memory link.
#[derive(Clone)]
pub struct MemoryCore {
    link: Arc<Link>,
}

impl Default for MemoryCore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCore {
    pub fn new() -> Self {
        Self {
            link: Arc::new(Link {
                to_core: unbounded(),
                to_runtime: unbounded(),
                open: AtomicBool::new(false),
                open_count: AtomicUsize::new(0),
                echo_ping: AtomicBool::new(true),
                module_list: Mutex::new(ModuleListResponse::default()),
                module_list_requests: Mutex::new(Vec::new()),
                init_runtime_requests: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Runtime side of this link.
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport {
            link: Arc::clone(&self.link),
        }
    }

    pub fn set_module_list(&self, response: ModuleListResponse) {
        *self.link.module_list.lock() = response;
    }

    /// Whether `RUNTIME_PING` is echoed automatically (default: yes).
    pub fn set_echo_ping(&self, echo: bool) {
        self.link.echo_ping.store(echo, Ordering::SeqCst);
    }

    pub fn module_list_requests(&self) -> Vec<ModuleListRequest> {
        self.link.module_list_requests.lock().clone()
    }

    pub fn init_runtime_requests(&self) -> Vec<InitRuntimeRequest> {
        self.link.init_runtime_requests.lock().clone()
    }

    /// How often the runtime opened the link.
    pub fn open_count(&self) -> usize {
        self.link.open_count.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.link.open.load(Ordering::SeqCst)
    }

    pub fn send_to_runtime(&self, package: DataPackage) {
        // Both ends live in `link`, so the channel cannot be disconnected.
        let _ = self.link.to_runtime.0.send(package);
    }

    pub fn recv_from_runtime(&self, timeout: Duration) -> Option<DataPackage> {
        self.link.to_core.1.recv_timeout(timeout).ok()
    }

    /// Wait for the next package from the runtime that satisfies `predicate`,
    /// discarding others.
    pub fn recv_matching(
        &self,
        timeout: Duration,
        predicate: impl Fn(&DataPackage) -> bool,
    ) -> Option<DataPackage> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            match self.link.to_core.1.recv_timeout(remaining) {
                Ok(package) if predicate(&package) => return Some(package),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }

    /// End the stream from the core side.
    pub fn close_stream(&self) {
        self.link.open.store(false, Ordering::SeqCst);
    }
}

/// Runtime side of an in-memory link.
#[derive(Clone)]
pub struct MemoryTransport {
    link: Arc<Link>,
}

impl MemoryTransport {
    fn ensure_open(&self) -> Result<()> {
        if self.link.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::ConnectionClosed)
        }
    }
}

impl CoreTransport for MemoryTransport {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn open(&self) -> Result<()> {
        if !self.link.open.swap(true, Ordering::SeqCst) {
            self.link.open_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.link.open.load(Ordering::SeqCst)
    }

    fn get_module_list(&self, request: ModuleListRequest, _timeout: Duration) -> Result<ModuleListResponse> {
        self.ensure_open()?;
        self.link.module_list_requests.lock().push(request);
        Ok(self.link.module_list.lock().clone())
    }

    fn init_runtime(&self, request: InitRuntimeRequest, _timeout: Duration) -> Result<()> {
        self.ensure_open()?;
        self.link.init_runtime_requests.lock().push(request);
        Ok(())
    }

    fn send_package(&self, package: &DataPackage) -> Result<()> {
        self.ensure_open()?;
        if package.ctrl_type() == Some(CtrlType::RuntimePing)
            && self.link.echo_ping.load(Ordering::SeqCst)
        {
            let _ = self.link.to_runtime.0.send(package.clone());
        }
        self.link
            .to_core
            .0
            .send(package.clone())
            .map_err(|_| TransportError::ConnectionClosed)
    }

    fn recv_package(&self, timeout: Duration) -> Result<Option<DataPackage>> {
        self.ensure_open()?;
        match self.link.to_runtime.1.recv_timeout(timeout) {
            Ok(package) => Ok(Some(package)),
            Err(RecvTimeoutError::Timeout) => {
                self.ensure_open()?;
                Ok(None)
            }
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::ConnectionClosed),
        }
    }

    fn close(&self) {
        self.link.open.store(false, Ordering::SeqCst);
    }
}
