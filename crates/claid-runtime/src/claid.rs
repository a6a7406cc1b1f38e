// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Entry point that wires the execution thread, the module manager and a
//! transport together.

use std::sync::Arc;
use std::time::Duration;

use claid_config::{validate_config, RuntimeConfig};
use claid_io::{CoreTransport, ZmqCoreTransport};
use claid_module::{Describe, Module, ModuleBundle, ModuleConstructor, ModuleFactory};
use claid_observability::Logger;
use claid_scheduling::{
    ExecutionQueue, ExecutionWorker, ScheduleDescription, ScheduledRunnable, TaskOrigin,
};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::manager::{ModuleManager, RUNTIME};
use crate::{Result, RuntimeError};

/// A CLAID Rust runtime.
///
/// Register unit classes, then [`start`](Self::start) against a transport.
/// Registration is closed once the runtime started.
pub struct Claid {
    config: RuntimeConfig,
    logger: Arc<Logger>,
    factory: Mutex<Option<ModuleFactory>>,
    execution_queue: ExecutionQueue,
    worker: Mutex<Option<ExecutionWorker>>,
    manager: Mutex<Option<Arc<ModuleManager>>>,
}

impl Claid {
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_logger(config, Logger::console(RUNTIME))
    }

    pub fn with_logger(config: RuntimeConfig, logger: Arc<Logger>) -> Self {
        Self {
            config,
            logger,
            factory: Mutex::new(Some(ModuleFactory::new())),
            execution_queue: ExecutionQueue::new(),
            worker: Mutex::new(None),
            manager: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    pub fn get_current_host_id(&self) -> &str {
        &self.config.bootstrap.host_id
    }

    pub fn get_current_user_id(&self) -> &str {
        &self.config.bootstrap.user_id
    }

    pub fn get_current_device_id(&self) -> &str {
        &self.config.bootstrap.device_id
    }

    fn with_factory<R>(&self, f: impl FnOnce(&mut ModuleFactory) -> Result<R>) -> Result<R> {
        match self.factory.lock().as_mut() {
            Some(factory) => f(factory),
            None => Err(RuntimeError::AlreadyRunning),
        }
    }

    pub fn register_module<M: Module + Describe + Default>(&self) -> Result<()> {
        self.with_factory(|factory| Ok(factory.register_module::<M>()?))
    }

    pub fn register_module_with<M: Module + Describe>(&self, constructor: ModuleConstructor) -> Result<()> {
        self.with_factory(|factory| Ok(factory.register_module_with::<M>(constructor)?))
    }

    /// Make `bundle` available for injection under `file_name`. Works before
    /// and after start.
    pub fn register_plugin(&self, file_name: impl Into<String>, bundle: ModuleBundle) {
        if let Some(manager) = self.manager() {
            manager.register_plugin(file_name, bundle);
            return;
        }
        if let Some(factory) = self.factory.lock().as_mut() {
            factory.register_plugin(file_name, bundle);
        }
    }

    /// Start against the core reachable through `transport`.
    ///
    /// # Errors
    ///
    /// Invalid configuration, a failed handshake or a unit that failed to
    /// initialize. The runtime is left stopped in that case.
    pub fn start(&self, transport: Arc<dyn CoreTransport>) -> Result<()> {
        validate_config(&self.config)?;

        let factory = self
            .factory
            .lock()
            .take()
            .ok_or(RuntimeError::AlreadyRunning)?;

        let worker = ExecutionWorker::spawn(
            "claid-execution",
            self.execution_queue.clone(),
            self.config.runtime.execution_poll_interval(),
        )?;
        *self.worker.lock() = Some(worker);

        info!(
            "[CLAID] starting runtime via {} transport",
            transport.backend_name()
        );
        let manager = Arc::new(ModuleManager::new(
            self.config.clone(),
            transport,
            factory,
            self.execution_queue.clone(),
            Arc::clone(&self.logger),
        ));
        *self.manager.lock() = Some(Arc::clone(&manager));

        if let Err(e) = manager.start() {
            self.logger.fatal(format!("Failed to start runtime: {}", e));
            if let Err(stop_error) = manager.shutdown() {
                warn!("[CLAID] cleanup after failed start: {}", stop_error);
            }
            self.stop_worker();
            return Err(e);
        }
        Ok(())
    }

    /// Start against the ZeroMQ endpoint of `[bootstrap] socket_path`.
    pub fn start_zmq(&self) -> Result<()> {
        let transport = ZmqCoreTransport::new(
            self.config.bootstrap.socket_path.clone(),
            self.config.connection.handshake_timeout(),
        )?;
        self.start(Arc::new(transport))
    }

    pub fn manager(&self) -> Option<Arc<ModuleManager>> {
        self.manager.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.manager().is_some_and(|manager| manager.is_running())
    }

    /// Run `f` once on the execution thread.
    pub fn run_once_on_runtime_thread(
        &self,
        name: impl Into<String>,
        f: impl FnMut() -> anyhow::Result<()> + Send + 'static,
    ) -> Result<Arc<ScheduledRunnable>> {
        self.push_external(name, ScheduleDescription::now(), f)
    }

    /// Run `f` on the execution thread over and over until the returned task
    /// is invalidated.
    pub fn repeat_indefinitely_on_runtime_thread(
        &self,
        name: impl Into<String>,
        f: impl FnMut() -> anyhow::Result<()> + Send + 'static,
    ) -> Result<Arc<ScheduledRunnable>> {
        self.push_external(name, ScheduleDescription::immediate_indefinite(), f)
    }

    fn push_external(
        &self,
        name: impl Into<String>,
        schedule: ScheduleDescription,
        f: impl FnMut() -> anyhow::Result<()> + Send + 'static,
    ) -> Result<Arc<ScheduledRunnable>> {
        let name = name.into();
        let logger = Arc::clone(&self.logger);
        let task = ScheduledRunnable::new(name, schedule, f)
            .with_origin(TaskOrigin::External)
            .on_failure(Arc::new(move |task, reason| {
                logger.error(format!("Task \"{}\" failed: {}", task, reason));
            }))
            .into_shared();
        self.execution_queue.push(Arc::clone(&task))?;
        Ok(task)
    }

    /// Stop the manager and the execution thread. Safe to call repeatedly.
    pub fn shutdown(&self) -> Result<()> {
        let manager = self.manager.lock().take();
        if let Some(manager) = manager {
            manager.shutdown()?;
        }
        self.stop_worker();
        Ok(())
    }

    fn stop_worker(&self) {
        let worker = self.worker.lock().take();
        if let Some(mut worker) = worker {
            worker.stop();
        }
    }

    /// Block the calling thread while the runtime is running, polling every
    /// `interval`.
    pub fn wait_while_running(&self, interval: Duration) {
        while self.is_running() {
            std::thread::sleep(interval);
        }
    }
}

impl Drop for Claid {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("[CLAID] shutdown on drop failed: {}", e);
        }
    }
}
