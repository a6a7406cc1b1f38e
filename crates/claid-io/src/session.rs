// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The runtime's session with the core: unary setup calls, the ping
//! handshake and the outbound writer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use claid_config::ConnectionConfig;
use claid_scheduling::ThreadSafeChannel;
use claid_structures::{
    ControlPackage, CtrlType, DataPackage, InitRuntimeRequest, ModuleAnnotation,
    ModuleListRequest, ModuleListResponse, Runtime,
};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::reconnect::{retry_with_backoff, ReconnectionStrategy};
use crate::{CoreTransport, Result, TransportError};

/// Session state machine: `Disconnected -> Open -> Streaming -> Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// Socket open, unary calls possible, no stream yet.
    Open,
    /// Handshake done, writer running.
    Streaming,
}

pub struct ModuleDispatcher {
    transport: Arc<dyn CoreTransport>,
    runtime: Runtime,
    connection: ConnectionConfig,
    to_core: Arc<ThreadSafeChannel<DataPackage>>,
    running: Arc<AtomicBool>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl ModuleDispatcher {
    /// `to_core` is the outbound queue shared with the channel registry.
    pub fn new(
        transport: Arc<dyn CoreTransport>,
        runtime: Runtime,
        connection: ConnectionConfig,
        to_core: Arc<ThreadSafeChannel<DataPackage>>,
    ) -> Self {
        Self {
            transport,
            runtime,
            connection,
            to_core,
            running: Arc::new(AtomicBool::new(false)),
            writer: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        if self.running.load(Ordering::Acquire) {
            SessionState::Streaming
        } else if self.transport.is_open() {
            SessionState::Open
        } else {
            SessionState::Disconnected
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn to_core_queue(&self) -> Arc<ThreadSafeChannel<DataPackage>> {
        Arc::clone(&self.to_core)
    }

    /// Open the socket, retrying with backoff.
    pub fn open(&self) -> Result<()> {
        if self.transport.is_open() {
            return Ok(());
        }
        let mut strategy = ReconnectionStrategy::new(
            self.connection.retry_backoff_ms,
            self.connection.connect_retries,
        );
        retry_with_backoff(|| self.transport.open(), &mut strategy, "Socket open")
    }

    pub fn get_unit_list(
        &self,
        supported_module_classes: Vec<String>,
        module_annotations: HashMap<String, ModuleAnnotation>,
    ) -> Result<ModuleListResponse> {
        self.open()?;
        let request = ModuleListRequest {
            runtime: self.runtime,
            supported_module_classes,
            module_annotations,
        };
        let response = self
            .transport
            .get_module_list(request, self.connection.request_timeout())?;
        response
            .validate()
            .map_err(|e| TransportError::UnexpectedResponse(e.to_string()))?;
        debug!(
            "[DISPATCHER] core assigned {} modules to this runtime",
            response.descriptors.len()
        );
        Ok(response)
    }

    pub fn init_runtime(&self, channel_examples: Vec<(String, Vec<DataPackage>)>) -> Result<()> {
        self.open()?;
        let request = InitRuntimeRequest::from_channel_examples(self.runtime, channel_examples);
        self.transport
            .init_runtime(request, self.connection.request_timeout())
    }

    /// Start the stream: send `RUNTIME_PING` ahead of anything queued, wait
    /// for its echo, then start the writer.
    pub fn connect(&self) -> Result<()> {
        if self.running.load(Ordering::Acquire) {
            return Err(TransportError::AlreadyConnected);
        }
        self.open()?;

        let ping = DataPackage::control(ControlPackage::new(CtrlType::RuntimePing, self.runtime));
        self.transport.send_package(&ping)?;
        self.await_ping_echo()?;

        self.to_core.reopen();
        self.running.store(true, Ordering::Release);
        self.spawn_writer()?;
        info!(
            "[DISPATCHER] stream to core established via {}",
            self.transport.backend_name()
        );
        Ok(())
    }

    fn await_ping_echo(&self) -> Result<()> {
        let timeout = self.connection.handshake_timeout();
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout(format!(
                    "no RUNTIME_PING echo within {:?}",
                    timeout
                )));
            }
            let Some(package) = self.transport.recv_package(remaining)? else {
                continue;
            };
            return match package.ctrl_type() {
                Some(CtrlType::RuntimePing) => Ok(()),
                Some(other) if package.is_control() => Err(TransportError::HandshakeViolation(
                    format!("expected RUNTIME_PING, received {}", other),
                )),
                _ => Err(TransportError::HandshakeViolation(format!(
                    "expected RUNTIME_PING, received data on channel \"{}\"",
                    package.channel
                ))),
            };
        }
    }

    fn spawn_writer(&self) -> Result<()> {
        let transport = Arc::clone(&self.transport);
        let to_core = Arc::clone(&self.to_core);
        let running = Arc::clone(&self.running);
        let poll = self.connection.stream_poll_interval();

        let handle = thread::Builder::new()
            .name("claid-session-writer".to_string())
            .spawn(move || {
                debug!("[DISPATCHER] writer started");
                while running.load(Ordering::Acquire) {
                    let Some(package) = to_core.get_timeout(poll) else {
                        if to_core.is_closed() {
                            break;
                        }
                        continue;
                    };
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    match transport.send_package(&package) {
                        Ok(()) => {}
                        Err(TransportError::ConnectionClosed) => {
                            warn!("[DISPATCHER] connection closed, writer stops");
                            break;
                        }
                        Err(e) => error!("[DISPATCHER] failed to send package: {}", e),
                    }
                }
                debug!("[DISPATCHER] writer stopped");
            })
            .map_err(TransportError::Io)?;

        *self.writer.lock() = Some(handle);
        Ok(())
    }

    /// Queue a package for the core.
    pub fn post_package(&self, package: DataPackage) -> Result<()> {
        self.to_core
            .put(package)
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Next inbound package, waiting at most one poll interval.
    pub fn receive_package(&self) -> Result<Option<DataPackage>> {
        self.transport
            .recv_package(self.connection.stream_poll_interval())
    }

    /// Stop streaming: no further sends happen after this returns, even if
    /// packages are still queued.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        self.to_core.close();
        if let Some(handle) = self.writer.lock().take() {
            if handle.join().is_err() {
                error!("[DISPATCHER] writer thread panicked");
            }
        }
        self.transport.close();
        info!("[DISPATCHER] session shut down");
    }
}

impl Drop for ModuleDispatcher {
    fn drop(&mut self) {
        if self.running.load(Ordering::Acquire) {
            self.shutdown();
        }
    }
}
