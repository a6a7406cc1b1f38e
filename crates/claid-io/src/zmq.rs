// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! ZMQ DEALER transport to the core's ROUTER socket.
//!
//! Every message is `[empty delimiter, JSON WireFrame]`. Unary requests and
//! the package stream share the socket; packages that arrive while a unary
//! call waits for its response are buffered for `recv_package`.

use std::collections::VecDeque;
use std::future::Future;
use std::time::{Duration, Instant};

use claid_structures::{
    DataPackage, InitRuntimeRequest, ModuleListRequest, ModuleListResponse, WireFrame,
};
use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::block_in_place;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use zeromq::{DealerSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

use crate::{CoreTransport, Result, TransportError};

fn block_on_runtime<T>(runtime: &Runtime, future: impl Future<Output = T>) -> T {
    if Handle::try_current().is_ok() {
        block_in_place(|| Handle::current().block_on(future))
    } else {
        runtime.block_on(future)
    }
}

fn encode(frame: &WireFrame) -> Result<ZmqMessage> {
    let mut message = ZmqMessage::from(frame.to_bytes()?);
    message.prepend(&ZmqMessage::from(Vec::new()));
    Ok(message)
}

fn decode(message: ZmqMessage) -> Result<WireFrame> {
    let mut frames = message.into_vec();
    if frames.first().map(|frame| frame.is_empty()).unwrap_or(false) {
        frames.remove(0);
    }
    if frames.len() != 1 {
        return Err(TransportError::UnexpectedResponse(format!(
            "expected a single frame, got {}",
            frames.len()
        )));
    }
    Ok(WireFrame::from_bytes(&frames.remove(0))?)
}

pub struct ZmqCoreTransport {
    endpoint: String,
    connect_timeout: Duration,
    runtime: Runtime,
    socket: Mutex<Option<DealerSocket>>,
    pending: Mutex<VecDeque<DataPackage>>,
}

impl ZmqCoreTransport {
    /// `endpoint` is a ZMQ address such as `ipc:///tmp/claid_socket` or
    /// `tcp://127.0.0.1:1337`.
    pub fn new(endpoint: impl Into<String>, connect_timeout: Duration) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("claid-zmq")
            .enable_all()
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            connect_timeout,
            runtime,
            socket: Mutex::new(None),
            pending: Mutex::new(VecDeque::new()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn recv_frame(&self, socket: &mut DealerSocket, wait: Duration) -> Result<Option<WireFrame>> {
        match block_on_runtime(&self.runtime, async { timeout(wait, socket.recv()).await }) {
            Err(_) => Ok(None),
            Ok(message) => Ok(Some(decode(message?)?)),
        }
    }

    /// Send `request` and wait for the first non-package frame, which must
    /// satisfy `accept`.
    fn unary<T>(
        &self,
        request: WireFrame,
        wait: Duration,
        accept: impl Fn(WireFrame) -> std::result::Result<T, WireFrame>,
    ) -> Result<T> {
        let mut guard = self.socket.lock();
        let socket = guard.as_mut().ok_or(TransportError::ConnectionClosed)?;
        let request_name = request.name();

        block_on_runtime(&self.runtime, socket.send(encode(&request)?))?;

        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout(format!(
                    "no response to {} within {:?}",
                    request_name, wait
                )));
            }
            match self.recv_frame(socket, remaining)? {
                None => continue,
                Some(WireFrame::Package(package)) => self.pending.lock().push_back(package),
                Some(WireFrame::EndOfStream) => return Err(TransportError::ConnectionClosed),
                Some(frame) => {
                    return accept(frame).map_err(|other| {
                        TransportError::UnexpectedResponse(format!(
                            "{} answered with {}",
                            request_name,
                            other.name()
                        ))
                    })
                }
            }
        }
    }
}

impl CoreTransport for ZmqCoreTransport {
    fn backend_name(&self) -> &'static str {
        "zmq-dealer"
    }

    fn open(&self) -> Result<()> {
        let mut guard = self.socket.lock();
        if guard.is_some() {
            return Ok(());
        }

        let mut socket = DealerSocket::new();
        block_on_runtime(&self.runtime, async {
            timeout(self.connect_timeout, socket.connect(&self.endpoint)).await
        })
        .map_err(|_| TransportError::Timeout(format!("connecting to {}", self.endpoint)))??;

        self.pending.lock().clear();
        *guard = Some(socket);
        info!("[ZMQ-DEALER] Connected to {}", self.endpoint);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.socket.lock().is_some()
    }

    fn get_module_list(&self, request: ModuleListRequest, wait: Duration) -> Result<ModuleListResponse> {
        self.unary(WireFrame::ModuleListRequest(request), wait, |frame| match frame {
            WireFrame::ModuleListResponse(response) => Ok(response),
            other => Err(other),
        })
    }

    fn init_runtime(&self, request: InitRuntimeRequest, wait: Duration) -> Result<()> {
        self.unary(WireFrame::InitRuntimeRequest(request), wait, |frame| match frame {
            WireFrame::InitRuntimeResponse => Ok(()),
            other => Err(other),
        })
    }

    fn send_package(&self, package: &DataPackage) -> Result<()> {
        let mut guard = self.socket.lock();
        let socket = guard.as_mut().ok_or(TransportError::ConnectionClosed)?;
        let message = encode(&WireFrame::Package(package.clone()))?;
        block_on_runtime(&self.runtime, socket.send(message))?;
        Ok(())
    }

    fn recv_package(&self, wait: Duration) -> Result<Option<DataPackage>> {
        if let Some(package) = self.pending.lock().pop_front() {
            return Ok(Some(package));
        }

        let mut guard = self.socket.lock();
        let socket = guard.as_mut().ok_or(TransportError::ConnectionClosed)?;
        match self.recv_frame(socket, wait)? {
            None => Ok(None),
            Some(WireFrame::Package(package)) => Ok(Some(package)),
            Some(WireFrame::EndOfStream) => {
                debug!("[ZMQ-DEALER] core ended the stream");
                *guard = None;
                Err(TransportError::ConnectionClosed)
            }
            Some(other) => {
                warn!("[ZMQ-DEALER] ignoring unsolicited {} frame", other.name());
                Ok(None)
            }
        }
    }

    fn close(&self) {
        if self.socket.lock().take().is_some() {
            info!("[ZMQ-DEALER] Disconnected from {}", self.endpoint);
        }
        self.pending.lock().clear();
    }
}
