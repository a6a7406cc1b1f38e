// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Module manager driven end to end through the in-memory core.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use claid_config::RuntimeConfig;
use claid_io::MemoryCore;
use claid_module::{
    Channel, ChannelData, Describe, ManagedModule, Module, ModuleAnnotator, ModuleBundle,
    ModuleContext, ModuleFactory, ModuleResult, ModuleRunner, Properties,
};
use claid_observability::{LogSink, Logger, MemorySink};
use claid_runtime::{ManagerPhase, ModuleManager, RuntimeError};
use claid_scheduling::{ExecutionQueue, ExecutionWorker};
use claid_serialization::TypeMapping;
use claid_structures::{
    ConfigUploadPayload, ControlBody, ControlPackage, CtrlType, DataPackage, LogMessage,
    LogMessageSeverityLevel, ModuleAnnotation, ModuleDescriptor, ModuleInjectionDescription,
    ModuleListResponse, Runtime,
};

const WAIT: Duration = Duration::from_secs(3);

fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[derive(Default)]
struct Echo {
    out: Option<Channel<i64>>,
    terminated: Arc<AtomicBool>,
}

impl Module for Echo {
    fn initialize(&mut self, ctx: &ModuleContext<Self>, _properties: &Properties) -> ModuleResult<()> {
        self.out = Some(ctx.publish("out", 0_i64));
        ctx.subscribe("in", 0_i64, |echo: &mut Echo, _ctx: &ModuleContext<Echo>, data: ChannelData<i64>| {
            if let Some(out) = &echo.out {
                out.post(data.value());
            }
            Ok(())
        });
        Ok(())
    }

    fn terminate(&mut self, _ctx: &ModuleContext<Self>) -> ModuleResult<()> {
        self.terminated.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl Describe for Echo {
    fn describe(annotator: &mut ModuleAnnotator) -> ModuleResult<()> {
        annotator.set_module_category("Test");
        annotator.describe_publish_channel("out", &0_i64, "echoed value")?;
        annotator.describe_subscribe_channel("in", &0_i64, "value to echo")
    }
}

#[derive(Default)]
struct Doubler;

impl Module for Doubler {
    fn initialize(&mut self, _ctx: &ModuleContext<Self>, _properties: &Properties) -> ModuleResult<()> {
        Ok(())
    }
}

impl Describe for Doubler {
    fn describe(annotator: &mut ModuleAnnotator) -> ModuleResult<()> {
        annotator.make_injectable();
        Ok(())
    }
}

struct Fixture {
    core: MemoryCore,
    manager: ModuleManager,
    logs: Arc<MemorySink>,
    _worker: ExecutionWorker,
}

fn test_config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.connection.stream_poll_interval_ms = 10;
    config.connection.handshake_timeout_ms = 1000;
    config.runtime.restart_pause_ms = 20;
    config.bootstrap.host_id = "lab-pc".to_string();
    config.bootstrap.user_id = "u42".to_string();
    config.bootstrap.device_id = "watch-7".to_string();
    config
}

fn fixture_with(factory: ModuleFactory, descriptors: Vec<ModuleDescriptor>) -> Fixture {
    let core = MemoryCore::new();
    core.set_module_list(ModuleListResponse {
        descriptors,
        log_severity_level_for_host: LogMessageSeverityLevel::Info,
    });

    let queue = ExecutionQueue::new();
    let worker = ExecutionWorker::spawn("exec", queue.clone(), Duration::from_millis(10)).unwrap();
    let logs = Arc::new(MemorySink::new());
    let logger = Arc::new(Logger::new(Runtime::Rust, vec![logs.clone() as Arc<dyn LogSink>]));

    let manager = ModuleManager::new(
        test_config(),
        Arc::new(core.transport()),
        factory,
        queue,
        logger,
    );
    Fixture {
        core,
        manager,
        logs,
        _worker: worker,
    }
}

fn echo_fixture() -> Fixture {
    let mut factory = ModuleFactory::new();
    factory.register_module::<Echo>().unwrap();
    fixture_with(factory, vec![ModuleDescriptor::new("A", "Echo")])
}

fn control_from(host: &str, ctrl_type: CtrlType) -> DataPackage {
    DataPackage {
        source_host: host.to_string(),
        target_host: "this-host".to_string(),
        ..DataPackage::control(ControlPackage::new(ctrl_type, Runtime::MiddlewareCore))
    }
}

fn is_ctrl(ctrl_type: CtrlType) -> impl Fn(&DataPackage) -> bool {
    move |package| package.ctrl_type() == Some(ctrl_type)
}

#[test]
fn test_start_announces_channels_and_routes_data() {
    let fixture = echo_fixture();
    fixture.manager.start().unwrap();
    assert!(fixture.manager.is_running());
    assert_eq!(fixture.manager.phase(), ManagerPhase::Started);

    let list_requests = fixture.core.module_list_requests();
    assert_eq!(list_requests[0].supported_module_classes, vec!["Echo"]);
    assert!(list_requests[0].module_annotations.contains_key("Echo"));

    let init = fixture.core.init_runtime_requests();
    assert_eq!(init.len(), 1);
    assert_eq!(init[0].modules.len(), 1);
    assert_eq!(init[0].modules[0].module_id, "A");
    assert_eq!(init[0].modules[0].channel_packets.len(), 2);

    let mutator = TypeMapping::new().mutator_for(&0_i64).unwrap();
    let mut inbound = DataPackage {
        target_module: "A".to_string(),
        channel: "in".to_string(),
        ..Default::default()
    };
    mutator.set_package_payload(&mut inbound, &7).unwrap();
    fixture.core.send_to_runtime(inbound);

    let echoed = fixture
        .core
        .recv_matching(WAIT, |p| !p.is_control() && p.channel == "out")
        .expect("echo on \"out\"");
    assert_eq!(echoed.source_module, "A");
    assert_eq!(mutator.get_package_payload(&echoed).unwrap(), 7);

    fixture.manager.shutdown().unwrap();
    assert!(!fixture.manager.is_running());
    assert!(fixture.manager.running_module_ids().is_empty());
}

#[test]
fn test_unknown_class_fails_start() {
    let fixture = fixture_with(ModuleFactory::new(), vec![ModuleDescriptor::new("A", "Missing")]);
    let result = fixture.manager.start();
    assert!(matches!(
        result,
        Err(RuntimeError::Instantiate { ref module_class, .. }) if module_class == "Missing"
    ));
    assert!(!fixture.manager.is_running());
    assert!(fixture.logs.contains(LogMessageSeverityLevel::Fatal, "not registered"));
    fixture.manager.shutdown().unwrap();
}

#[test]
fn test_handshake_failure_is_returned_from_start() {
    let fixture = echo_fixture();
    fixture.core.set_echo_ping(false);
    let result = fixture.manager.start();
    assert!(matches!(result, Err(RuntimeError::Transport(_))));
    assert!(!fixture.manager.is_running());
    fixture.manager.shutdown().unwrap();
    assert!(fixture.manager.running_module_ids().is_empty());
}

#[test]
fn test_unload_shuts_down_units_and_replies() {
    let terminated = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&terminated);
    let mut factory = ModuleFactory::new();
    factory
        .register_module_with::<Echo>(Arc::new(move |id: &str, logger: Arc<Logger>| {
            let echo = Echo {
                terminated: Arc::clone(&flag),
                ..Default::default()
            };
            Arc::new(ModuleRunner::new(id, "Echo", echo, logger)) as Arc<dyn ManagedModule>
        }))
        .unwrap();
    let fixture = fixture_with(factory, vec![ModuleDescriptor::new("A", "Echo")]);
    fixture.manager.start().unwrap();

    fixture
        .core
        .send_to_runtime(control_from("core-host", CtrlType::UnloadModules));
    let reply = fixture
        .core
        .recv_matching(WAIT, is_ctrl(CtrlType::UnloadModulesDone))
        .expect("UNLOAD_MODULES_DONE");
    assert_eq!(reply.target_host, "core-host");
    assert!(terminated.load(Ordering::SeqCst));
    assert!(fixture.manager.running_module_ids().is_empty());

    fixture.manager.shutdown().unwrap();
}

#[test]
fn test_annotation_request_is_answered_with_factory_annotations() {
    let fixture = echo_fixture();
    fixture.manager.start().unwrap();

    fixture
        .core
        .send_to_runtime(control_from("ui-host", CtrlType::RequestModuleAnnotations));
    let reply = fixture
        .core
        .recv_matching(WAIT, is_ctrl(CtrlType::RequestModuleAnnotationsResponse))
        .expect("annotation response");
    assert_eq!(reply.target_host, "ui-host");
    let annotations = reply.control_val().and_then(|c| c.module_annotations()).unwrap();
    assert_eq!(annotations["Echo"].module_category, "Test");

    fixture.manager.shutdown().unwrap();
}

#[test]
fn test_available_modules_for_host_waits_for_answer() {
    let fixture = echo_fixture();
    fixture.manager.start().unwrap();

    let core = fixture.core.clone();
    let responder = thread::spawn(move || {
        let request = core
            .recv_matching(WAIT, is_ctrl(CtrlType::RequestModuleAnnotations))
            .expect("annotation request");
        assert_eq!(request.target_host, "phone");

        let mut annotations = HashMap::new();
        annotations.insert("Sensor".to_string(), ModuleAnnotation::default());
        let response = DataPackage {
            source_host: "phone".to_string(),
            ..DataPackage::control(
                ControlPackage::new(CtrlType::RequestModuleAnnotationsResponse, Runtime::MiddlewareCore)
                    .with_body(ControlBody::ModuleAnnotations(annotations)),
            )
        };
        core.send_to_runtime(response);
    });

    let available = fixture
        .manager
        .get_available_modules_for_host("phone", WAIT)
        .unwrap();
    responder.join().unwrap();
    assert!(available.contains_key("Sensor"));
    assert!(fixture.manager.are_module_annotations_of_host_updated("phone"));

    let missing = fixture
        .manager
        .get_available_modules_for_host("nobody", Duration::from_millis(100));
    assert!(matches!(missing, Err(RuntimeError::Timeout(_))));

    fixture.manager.shutdown().unwrap();
}

#[test]
fn test_log_entries_are_forwarded_while_running() {
    let fixture = echo_fixture();
    fixture.manager.start().unwrap();

    fixture.manager.logger().info("not forwarded");
    fixture.manager.logger().error("disk full");
    let forwarded = fixture
        .core
        .recv_matching(WAIT, is_ctrl(CtrlType::LocalLogMessage))
        .expect("LOCAL_LOG_MESSAGE");
    let entry = forwarded.control_val().and_then(|c| c.log_message()).unwrap();
    assert_eq!(entry.log_message, "disk full");
    assert_eq!(entry.severity_level, LogMessageSeverityLevel::Error);

    fixture.manager.post_log_message(&LogMessage {
        log_message: "from host".to_string(),
        ..Default::default()
    });
    assert!(fixture
        .core
        .recv_matching(WAIT, |p| {
            p.control_val()
                .and_then(|c| c.log_message())
                .is_some_and(|m| m.log_message == "from host")
        })
        .is_some());

    fixture.manager.shutdown().unwrap();
}

#[test]
fn test_log_sink_subscription_forwards_stream() {
    let fixture = echo_fixture();
    fixture.manager.start().unwrap();

    let received = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&received);
    fixture.manager.subscribe_log_sink_log_messages(move |_package| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert!(fixture
        .core
        .recv_matching(WAIT, is_ctrl(CtrlType::SubscribeToLogSinkLogMessageStream))
        .is_some());

    fixture
        .core
        .send_to_runtime(control_from("core-host", CtrlType::LogSinkLogMessageStream));
    assert!(wait_until(WAIT, || received.load(Ordering::SeqCst) == 1));

    fixture.manager.unsubscribe_log_sink_log_messages();
    assert!(fixture
        .core
        .recv_matching(WAIT, is_ctrl(CtrlType::UnsubscribeFromLogSinkLogMessageStream))
        .is_some());

    fixture.manager.shutdown().unwrap();
}

#[test]
fn test_connection_notifications_reach_callbacks() {
    let fixture = echo_fixture();
    let connected = Arc::new(AtomicUsize::new(0));
    let disconnected = Arc::new(AtomicUsize::new(0));
    let (c, d) = (Arc::clone(&connected), Arc::clone(&disconnected));
    fixture
        .manager
        .register_on_connected_to_server_callback(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
    fixture
        .manager
        .register_on_disconnected_from_server_callback(move || {
            d.fetch_add(1, Ordering::SeqCst);
        });
    fixture.manager.start().unwrap();

    fixture
        .core
        .send_to_runtime(control_from("core-host", CtrlType::ConnectedToRemoteServer));
    fixture
        .core
        .send_to_runtime(control_from("core-host", CtrlType::DisconnectedFromRemoteServer));
    assert!(wait_until(WAIT, || connected.load(Ordering::SeqCst) == 1));
    assert!(wait_until(WAIT, || disconnected.load(Ordering::SeqCst) == 1));

    fixture.manager.shutdown().unwrap();
}

#[test]
fn test_config_payload_injects_plugin_classes() {
    let fixture = echo_fixture();
    fixture
        .manager
        .register_plugin("dsp.plugin", ModuleBundle::new().with_module::<Doubler>().unwrap());
    fixture.manager.start().unwrap();

    let payload = ConfigUploadPayload {
        modules_to_inject: vec![
            ModuleInjectionDescription {
                module_name: "Doubler".to_string(),
                module_file: "dsp.plugin".to_string(),
                runtime: Runtime::Rust,
            },
            ModuleInjectionDescription {
                module_name: "Plotter".to_string(),
                module_file: "plot.py".to_string(),
                runtime: Runtime::Python,
            },
        ],
        ..Default::default()
    };
    let package = DataPackage::control(
        ControlPackage::new(CtrlType::OnNewConfigPayloadData, Runtime::MiddlewareCore)
            .with_body(ControlBody::ConfigUpload(payload)),
    );
    fixture.core.send_to_runtime(package);

    assert!(wait_until(WAIT, || fixture
        .manager
        .registered_module_classes()
        .contains(&"Doubler".to_string())));
    assert!(!fixture
        .manager
        .registered_module_classes()
        .contains(&"Plotter".to_string()));

    fixture.manager.shutdown().unwrap();
}

#[test]
fn test_upload_config_targets_host() {
    let fixture = echo_fixture();
    fixture.manager.start().unwrap();

    fixture
        .manager
        .upload_config_to_host("watch", serde_json::json!({"hosts": []}));
    let upload = fixture
        .core
        .recv_matching(WAIT, is_ctrl(CtrlType::UploadConfigAndData))
        .expect("UPLOAD_CONFIG_AND_DATA");
    assert_eq!(upload.target_host, "watch");
    let payload = upload.control_val().and_then(|c| c.config_upload_payload()).unwrap();
    assert_eq!(payload.config, serde_json::json!({"hosts": []}));

    fixture.manager.shutdown().unwrap();
}

#[test]
fn test_bootstrap_identity_marks_outgoing_requests_and_logs() {
    let fixture = echo_fixture();
    assert_eq!(fixture.manager.get_current_host_id(), "lab-pc");
    assert_eq!(fixture.manager.get_current_user_id(), "u42");
    assert_eq!(fixture.manager.get_current_device_id(), "watch-7");
    fixture.manager.start().unwrap();

    let core = fixture.core.clone();
    let responder = thread::spawn(move || {
        let request = core
            .recv_matching(WAIT, is_ctrl(CtrlType::RequestModuleAnnotations))
            .expect("annotation request");
        assert_eq!(request.target_host, "lab-pc");
        assert_eq!(request.source_host, "lab-pc");
        assert_eq!(request.source_user_token, "u42");

        let response = DataPackage {
            source_host: "lab-pc".to_string(),
            ..DataPackage::control(
                ControlPackage::new(CtrlType::RequestModuleAnnotationsResponse, Runtime::MiddlewareCore)
                    .with_body(ControlBody::ModuleAnnotations(HashMap::new())),
            )
        };
        core.send_to_runtime(response);
    });
    let available = fixture
        .manager
        .get_available_modules_for_this_host(WAIT)
        .unwrap();
    responder.join().unwrap();
    assert!(available.is_empty());

    fixture.manager.logger().error("battery low");
    let forwarded = fixture
        .core
        .recv_matching(WAIT, is_ctrl(CtrlType::LocalLogMessage))
        .expect("LOCAL_LOG_MESSAGE");
    assert_eq!(forwarded.source_host, "lab-pc");

    fixture.manager.shutdown().unwrap();
}
