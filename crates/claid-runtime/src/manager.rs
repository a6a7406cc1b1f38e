// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Runtime manager: fetches the unit list, runs unit lifecycles, bridges
//! packages between the session and the channel registry and executes the
//! control protocol.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use claid_config::{BootstrapConfig, RuntimeConfig};
use claid_io::{CoreTransport, ModuleDispatcher, TransportError};
use claid_module::{
    ChannelSubscriberPublisher, ManagedModule, ModuleBundle, ModuleFactory, Properties,
};
use claid_observability::{LogSink, Logger};
use claid_scheduling::{ExecutionQueue, ThreadSafeChannel};
use claid_structures::{
    ConfigUploadPayload, ControlBody, ControlPackage, CtrlType, DataPackage, LogMessage,
    ModuleAnnotation, ModuleDescriptor, Runtime,
};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::log_sink::{log_message_package, StreamLogSink};
use crate::planner::{ControlPlanner, ManagerAction, ManagerPhase};
use crate::{Result, RuntimeError};

/// Runtime kind this crate implements.
pub const RUNTIME: Runtime = Runtime::Rust;

pub type ConnectionCallback = Arc<dyn Fn() + Send + Sync>;
pub type LogSinkCallback = Arc<dyn Fn(&DataPackage) + Send + Sync>;

#[derive(Debug, Default)]
struct HostAnnotations {
    annotations: HashMap<String, ModuleAnnotation>,
    updated: bool,
}

struct ManagerInner {
    config: RuntimeConfig,
    logger: Arc<Logger>,
    session: ModuleDispatcher,
    factory: Mutex<ModuleFactory>,
    registry: Arc<ChannelSubscriberPublisher>,
    to_core: Arc<ThreadSafeChannel<DataPackage>>,
    execution_queue: ExecutionQueue,
    modules: Mutex<Vec<Arc<dyn ManagedModule>>>,
    planner: Mutex<ControlPlanner>,
    running: Arc<AtomicBool>,
    reader_closed: AtomicBool,
    /// Serializes start, stop and restart.
    lifecycle: Mutex<()>,
    reader: Mutex<Option<JoinHandle<()>>>,
    restarter: Mutex<Option<JoinHandle<()>>>,
    host_annotations: Mutex<HashMap<String, HostAnnotations>>,
    annotations_changed: Condvar,
    on_connected: Mutex<Vec<ConnectionCallback>>,
    on_disconnected: Mutex<Vec<ConnectionCallback>>,
    log_sink_callback: Mutex<Option<LogSinkCallback>>,
    restart_count: AtomicUsize,
}

pub struct ModuleManager {
    inner: Arc<ManagerInner>,
}

impl ModuleManager {
    pub fn new(
        config: RuntimeConfig,
        transport: Arc<dyn CoreTransport>,
        factory: ModuleFactory,
        execution_queue: ExecutionQueue,
        logger: Arc<Logger>,
    ) -> Self {
        let to_core = Arc::new(ThreadSafeChannel::new("to_core"));
        let running = Arc::new(AtomicBool::new(false));

        logger.remove_sink(StreamLogSink::NAME);
        let stream_sink: Arc<dyn LogSink> = Arc::new(StreamLogSink::new(
            RUNTIME,
            config.bootstrap.host_id.clone(),
            config.logging.log_sink_severity(),
            Arc::clone(&to_core),
            Arc::clone(&running),
        ));
        logger.add_sink(stream_sink);

        let session = ModuleDispatcher::new(
            transport,
            RUNTIME,
            config.connection.clone(),
            Arc::clone(&to_core),
        );

        Self {
            inner: Arc::new(ManagerInner {
                config,
                logger,
                session,
                factory: Mutex::new(factory),
                registry: Arc::new(ChannelSubscriberPublisher::new(Arc::clone(&to_core))),
                to_core,
                execution_queue,
                modules: Mutex::new(Vec::new()),
                planner: Mutex::new(ControlPlanner::new(RUNTIME)),
                running,
                reader_closed: AtomicBool::new(true),
                lifecycle: Mutex::new(()),
                reader: Mutex::new(None),
                restarter: Mutex::new(None),
                host_annotations: Mutex::new(HashMap::new()),
                annotations_changed: Condvar::new(),
                on_connected: Mutex::new(Vec::new()),
                on_disconnected: Mutex::new(Vec::new()),
                log_sink_callback: Mutex::new(None),
                restart_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Fetch the unit list, instantiate and initialize every unit, announce
    /// their channels and open the stream. A failure leaves already created
    /// units in place.
    pub fn start(&self) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock();
        self.inner.start_locked()
    }

    pub fn shutdown(&self) -> Result<()> {
        let restarter = self.inner.restarter.lock().take();
        if let Some(handle) = restarter {
            if handle.join().is_err() {
                error!("[MANAGER] restart thread panicked");
            }
        }

        let _lifecycle = self.inner.lifecycle.lock();
        self.inner.stop_locked();
        self.inner.planner.lock().mark_stopped();
        info!("[MANAGER] shut down");
        Ok(())
    }

    pub fn phase(&self) -> ManagerPhase {
        self.inner.planner.lock().phase()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// True once the reader loop stopped, either on shutdown or because the
    /// stream to the core closed.
    pub fn is_reader_closed(&self) -> bool {
        self.inner.reader_closed.load(Ordering::Acquire)
    }

    pub fn restart_count(&self) -> usize {
        self.inner.restart_count.load(Ordering::Acquire)
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.inner.logger
    }

    pub fn running_module_ids(&self) -> Vec<String> {
        self.inner
            .modules
            .lock()
            .iter()
            .map(|m| m.id().to_string())
            .collect()
    }

    pub fn module(&self, module_id: &str) -> Option<Arc<dyn ManagedModule>> {
        self.inner.find_module(module_id)
    }

    pub fn registered_module_classes(&self) -> Vec<String> {
        self.inner.factory.lock().get_registered_module_classes()
    }

    pub fn register_plugin(&self, file_name: impl Into<String>, bundle: ModuleBundle) {
        self.inner.factory.lock().register_plugin(file_name, bundle);
    }

    /// Inject classes from plugin bundles, one `(source file, class names)`
    /// entry at a time. Stops at the first failing entry.
    pub fn inject_new_modules(&self, payload_path: &str, injections: &[(String, Vec<String>)]) -> Result<()> {
        self.inner.inject_new_modules(payload_path, injections)
    }

    pub fn register_on_connected_to_server_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.inner.on_connected.lock().push(Arc::new(callback));
    }

    pub fn register_on_disconnected_from_server_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.inner.on_disconnected.lock().push(Arc::new(callback));
    }

    /// Identity this runtime was started with. `config_file_path` and
    /// `device_id` are carried for the embedding host and not read here.
    pub fn bootstrap(&self) -> &BootstrapConfig {
        &self.inner.config.bootstrap
    }

    pub fn get_current_host_id(&self) -> &str {
        &self.inner.config.bootstrap.host_id
    }

    pub fn get_current_user_id(&self) -> &str {
        &self.inner.config.bootstrap.user_id
    }

    pub fn get_current_device_id(&self) -> &str {
        &self.inner.config.bootstrap.device_id
    }

    /// Ask the core for the annotations of `host`; the answer arrives
    /// asynchronously.
    pub fn update_module_annotations_of_host(&self, host: &str) {
        self.inner
            .host_annotations
            .lock()
            .entry(host.to_string())
            .or_default()
            .updated = false;

        let package = DataPackage {
            target_host: host.to_string(),
            ..DataPackage::control(ControlPackage::new(CtrlType::RequestModuleAnnotations, RUNTIME))
        };
        self.inner.post(package);
    }

    pub fn are_module_annotations_of_host_updated(&self, host: &str) -> bool {
        self.inner
            .host_annotations
            .lock()
            .get(host)
            .map(|h| h.updated)
            .unwrap_or(false)
    }

    pub fn get_module_annotations_of_host(&self, host: &str) -> Option<HashMap<String, ModuleAnnotation>> {
        self.inner
            .host_annotations
            .lock()
            .get(host)
            .map(|h| h.annotations.clone())
    }

    /// Request the annotations of `host` and wait for the answer.
    pub fn get_available_modules_for_host(
        &self,
        host: &str,
        timeout: Duration,
    ) -> Result<HashMap<String, ModuleAnnotation>> {
        self.update_module_annotations_of_host(host);

        let deadline = Instant::now() + timeout;
        let mut hosts = self.inner.host_annotations.lock();
        loop {
            if let Some(entry) = hosts.get(host).filter(|h| h.updated) {
                return Ok(entry.annotations.clone());
            }
            if self
                .inner
                .annotations_changed
                .wait_until(&mut hosts, deadline)
                .timed_out()
            {
                return Err(RuntimeError::Timeout(format!(
                    "no module annotations from host \"{}\" within {:?}",
                    host, timeout
                )));
            }
        }
    }

    /// [`Self::get_available_modules_for_host`] with the configured timeout.
    pub fn get_available_modules_for_host_default(
        &self,
        host: &str,
    ) -> Result<HashMap<String, ModuleAnnotation>> {
        let timeout = self.inner.config.runtime.annotation_query_timeout();
        self.get_available_modules_for_host(host, timeout)
    }

    /// Units the core offers for the host this runtime runs on.
    pub fn get_available_modules_for_this_host(
        &self,
        timeout: Duration,
    ) -> Result<HashMap<String, ModuleAnnotation>> {
        let host = self.get_current_host_id().to_string();
        self.get_available_modules_for_host(&host, timeout)
    }

    pub fn upload_config_to_host(&self, host: &str, config: serde_json::Value) {
        self.upload_config_to_host_with_payload(
            host,
            ConfigUploadPayload {
                config,
                ..Default::default()
            },
        );
    }

    pub fn upload_config_to_host_with_payload(&self, host: &str, payload: ConfigUploadPayload) {
        let package = DataPackage {
            target_host: host.to_string(),
            ..DataPackage::control(
                ControlPackage::new(CtrlType::UploadConfigAndData, RUNTIME)
                    .with_body(ControlBody::ConfigUpload(payload)),
            )
        };
        self.inner.post(package);
    }

    /// Forward `entry` to the core. Dropped unless the manager is running.
    pub fn post_log_message(&self, entry: &LogMessage) {
        if !self.is_running() {
            return;
        }
        self.inner.post(log_message_package(RUNTIME, &self.inner.config.bootstrap.host_id, entry));
    }

    pub fn subscribe_log_sink_log_messages(&self, callback: impl Fn(&DataPackage) + Send + Sync + 'static) {
        *self.inner.log_sink_callback.lock() = Some(Arc::new(callback));
        self.inner.post(DataPackage::control(ControlPackage::new(
            CtrlType::SubscribeToLogSinkLogMessageStream,
            RUNTIME,
        )));
    }

    pub fn unsubscribe_log_sink_log_messages(&self) {
        *self.inner.log_sink_callback.lock() = None;
        self.inner.post(DataPackage::control(ControlPackage::new(
            CtrlType::UnsubscribeFromLogSinkLogMessageStream,
            RUNTIME,
        )));
    }
}

impl Drop for ModuleManager {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.shutdown();
        }
    }
}

impl ManagerInner {
    fn start_locked(self: &Arc<Self>) -> Result<()> {
        if self.running.load(Ordering::Acquire) {
            return Err(RuntimeError::AlreadyRunning);
        }
        self.to_core.reopen();

        let (classes, annotations) = {
            let factory = self.factory.lock();
            (factory.get_registered_module_classes(), factory.get_module_annotations())
        };
        self.logger
            .info(format!("Registered module classes: {:?}", classes));

        let module_list = self.session.get_unit_list(classes, annotations)?;
        self.logger.info(format!(
            "Setting log severity level {}",
            module_list.log_severity_level_for_host
        ));
        self.logger
            .set_print_threshold(module_list.log_severity_level_for_host);

        self.instantiate_modules(&module_list.descriptors)?;
        self.initialize_modules(&module_list.descriptors)?;

        self.session.init_runtime(self.channel_examples_of_modules())?;
        self.session.connect()?;

        self.reader_closed.store(false, Ordering::Release);
        self.running.store(true, Ordering::Release);
        self.planner.lock().mark_started();
        self.spawn_reader()?;

        info!(
            "[MANAGER] started with {} modules",
            module_list.descriptors.len()
        );
        Ok(())
    }

    fn stop_locked(&self) {
        self.shutdown_modules();
        self.stop_reading();
        self.registry.reset();
        self.session.shutdown();
    }

    fn find_module(&self, module_id: &str) -> Option<Arc<dyn ManagedModule>> {
        self.modules
            .lock()
            .iter()
            .find(|m| m.id() == module_id)
            .cloned()
    }

    fn modules_snapshot(&self) -> Vec<Arc<dyn ManagedModule>> {
        self.modules.lock().clone()
    }

    fn instantiate_modules(&self, descriptors: &[ModuleDescriptor]) -> Result<()> {
        let factory = self.factory.lock();
        for descriptor in descriptors {
            let module = factory
                .create_module(
                    &descriptor.module_id,
                    &descriptor.module_class,
                    Arc::clone(&self.logger),
                )
                .map_err(|_| {
                    self.logger.fatal(format!(
                        "Failed to instantiate Module \"{}\" (class: \"{}\"). The Module class was not registered to the ModuleFactory.",
                        descriptor.module_id, descriptor.module_class
                    ));
                    RuntimeError::Instantiate {
                        module_id: descriptor.module_id.clone(),
                        module_class: descriptor.module_class.clone(),
                    }
                })?;
            self.logger.info(format!(
                "Loaded Module id \"{}\" (class: \"{}\").",
                descriptor.module_id, descriptor.module_class
            ));
            self.modules.lock().push(module);
        }
        Ok(())
    }

    fn initialize_modules(&self, descriptors: &[ModuleDescriptor]) -> Result<()> {
        for descriptor in descriptors {
            let module = self.find_module(&descriptor.module_id).ok_or_else(|| {
                RuntimeError::Instantiate {
                    module_id: descriptor.module_id.clone(),
                    module_class: descriptor.module_class.clone(),
                }
            })?;

            debug!("[MANAGER] starting module {}", descriptor.module_id);
            module
                .start(
                    Arc::clone(&self.registry),
                    Properties::from(descriptor.properties.clone()),
                    self.execution_queue.clone(),
                )
                .map_err(|source| RuntimeError::Initialize {
                    module_id: descriptor.module_id.clone(),
                    source,
                })?;
            self.logger
                .info(format!("Module \"{}\" has started.", descriptor.module_id));
        }
        Ok(())
    }

    /// Example packages of every running unit, units without channels
    /// included.
    fn channel_examples_of_modules(&self) -> Vec<(String, Vec<DataPackage>)> {
        self.modules_snapshot()
            .iter()
            .map(|m| {
                let id = m.id().to_string();
                let examples = self.registry.get_channel_template_packages_for_module(&id);
                (id, examples)
            })
            .collect()
    }

    fn shutdown_modules(&self) {
        let modules = std::mem::take(&mut *self.modules.lock());
        for module in modules {
            self.logger.info(format!("Shutting down {}", module.id()));
            if let Err(e) = module.shutdown() {
                self.logger
                    .error(format!("Failed to shut down {}: {}", module.id(), e));
            }
        }
    }

    fn spawn_reader(self: &Arc<Self>) -> Result<()> {
        let weak = Arc::downgrade(self);
        let handle = thread::Builder::new()
            .name("claid-manager-reader".to_string())
            .spawn(move || read_from_module_dispatcher(weak))
            .map_err(TransportError::Io)?;
        *self.reader.lock() = Some(handle);
        Ok(())
    }

    /// Stop the reader loop and wait until it observed it.
    fn stop_reading(&self) {
        self.running.store(false, Ordering::Release);
        let handle = self.reader.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                error!("[MANAGER] reader thread panicked");
            }
        }
    }

    /// Packages the manager originates leave with this runtime's host and
    /// user; replies keep the addressing the planner gave them.
    fn post(&self, mut package: DataPackage) {
        let bootstrap = &self.config.bootstrap;
        if package.source_host.is_empty() {
            package.source_host = bootstrap.host_id.clone();
        }
        if package.source_user_token.is_empty() {
            package.source_user_token = bootstrap.user_id.clone();
        }
        if let Err(e) = self.to_core.put(package) {
            warn!("[MANAGER] cannot send package to core: {}", e);
        }
    }

    fn on_package(self: &Arc<Self>, package: DataPackage) {
        let actions = self.planner.lock().plan(&package);
        for action in actions {
            self.execute(action);
        }
    }

    fn execute(self: &Arc<Self>, action: ManagerAction) {
        match action {
            ManagerAction::NotifyConnected => {
                for module in self.modules_snapshot() {
                    module.notify_connected_to_remote_server();
                }
                let callbacks = self.on_connected.lock().clone();
                callbacks.iter().for_each(|callback| callback());
            }
            ManagerAction::NotifyDisconnected => {
                for module in self.modules_snapshot() {
                    module.notify_disconnected_from_remote_server();
                }
                let callbacks = self.on_disconnected.lock().clone();
                callbacks.iter().for_each(|callback| callback());
            }
            ManagerAction::UnloadModules { reply } => {
                self.logger.info("Received UNLOAD_MODULES");
                self.shutdown_modules();
                self.registry.reset();
                self.post(reply);
                self.logger.info("Unloading Modules done");
            }
            ManagerAction::Restart { reply } => {
                self.logger.info("Received RESTART_RUNTIME");
                let inner = Arc::clone(self);
                let spawned = thread::Builder::new()
                    .name("claid-manager-restart".to_string())
                    .spawn(move || inner.restart(reply));
                match spawned {
                    Ok(handle) => *self.restarter.lock() = Some(handle),
                    Err(e) => {
                        self.logger
                            .error(format!("Failed to start restart thread: {}", e));
                        self.planner.lock().mark_started();
                    }
                }
            }
            ManagerAction::AnswerAnnotationRequest { request } => {
                let annotations = self.factory.lock().get_module_annotations();
                let reply = DataPackage::reply_to(
                    &request,
                    ControlPackage::new(CtrlType::RequestModuleAnnotationsResponse, RUNTIME)
                        .with_body(ControlBody::ModuleAnnotations(annotations)),
                );
                self.post(reply);
            }
            ManagerAction::StoreAnnotations { host, annotations } => {
                self.host_annotations.lock().insert(
                    host,
                    HostAnnotations {
                        annotations,
                        updated: true,
                    },
                );
                self.annotations_changed.notify_all();
            }
            ManagerAction::InjectModules {
                payload_path,
                injections,
            } => {
                if let Err(e) = self.inject_new_modules(&payload_path, &injections) {
                    self.logger.error(format!("Failed to inject modules: {}", e));
                }
            }
            ManagerAction::ForwardToLogSink(package) => {
                let callback = self.log_sink_callback.lock().clone();
                if let Some(callback) = callback {
                    callback(&package);
                }
            }
            ManagerAction::DeliverData(package) => self.route_data_package(&package),
            ManagerAction::Ignore { reason } => {
                self.logger
                    .warning(format!("ModuleManager ignored package: {}", reason));
            }
        }
    }

    fn route_data_package(&self, package: &DataPackage) {
        let module_id = package.target_module.as_str();
        let channel = package.channel.as_str();

        if !self
            .registry
            .is_data_package_compatible_with_channel(package, module_id)
        {
            let expected = self
                .registry
                .get_payload_case_of_channel(channel, module_id)
                .unwrap_or_else(|| "<not subscribed>".to_string());
            self.logger.info(format!(
                "ModuleManager received package with target for Module \"{}\" on Channel \"{}\", however the data type of payload of the package did not match the data type of the Channel. Expected payload type \"{}\" but got \"{}\"",
                module_id,
                channel,
                expected,
                package.message_type()
            ));
            return;
        }

        let subscribers = self
            .registry
            .get_subscriber_instances_of_module(channel, module_id);
        if subscribers.is_empty() {
            self.logger.info(format!(
                "ModuleManager received package with target for Module \"{}\" on Channel \"{}\", however the Module has no Subscriber for this Channel.",
                module_id, channel
            ));
            return;
        }
        for subscriber in subscribers {
            subscriber.on_new_data(package);
        }
    }

    fn restart(self: Arc<Self>, reply: DataPackage) {
        let _lifecycle = self.lifecycle.lock();

        self.logger.info("Stopping ModuleManager");
        self.stop_locked();

        thread::sleep(self.config.runtime.restart_pause());
        self.logger.info("Restarting ModuleManager and ModuleDispatcher");

        match self.start_locked() {
            Ok(()) => {
                self.restart_count.fetch_add(1, Ordering::AcqRel);
                self.post(reply);
            }
            Err(e) => {
                self.logger.fatal(format!("Restart failed: {}", e));
                self.planner.lock().mark_stopped();
            }
        }
    }

    fn inject_new_modules(&self, payload_path: &str, injections: &[(String, Vec<String>)]) -> Result<()> {
        let mut factory = self.factory.lock();
        for (module_file, class_names) in injections {
            factory.inject_modules(payload_path, module_file, class_names)?;
            self.logger.info(format!(
                "Injected {:?} from \"{}\"",
                class_names, module_file
            ));
        }
        self.logger.info(factory.registered_modules_summary());
        Ok(())
    }
}

fn read_from_module_dispatcher(manager: Weak<ManagerInner>) {
    debug!("[MANAGER] reader started");
    loop {
        let Some(inner) = manager.upgrade() else {
            break;
        };
        if !inner.running.load(Ordering::Acquire) {
            inner.reader_closed.store(true, Ordering::Release);
            break;
        }
        match inner.session.receive_package() {
            Ok(Some(package)) => inner.on_package(package),
            Ok(None) => {}
            Err(TransportError::ConnectionClosed) => {
                if inner.running.load(Ordering::Acquire) {
                    inner.logger.error("Stream to the core closed");
                }
                inner.reader_closed.store(true, Ordering::Release);
                break;
            }
            Err(e) => {
                inner
                    .logger
                    .error(format!("Error while reading from the core: {}", e));
                inner.reader_closed.store(true, Ordering::Release);
                break;
            }
        }
    }
    debug!("[MANAGER] reader stopped");
}
