// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Decides what an inbound package means for the manager.
//!
//! Pure and deterministic: no threads, no I/O. The manager feeds every
//! package it reads and executes the returned actions.

use std::collections::HashMap;

use claid_structures::{
    ControlPackage, CtrlType, DataPackage, ModuleAnnotation, Runtime,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerPhase {
    Idle,
    Started,
    Restarting,
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ManagerAction {
    NotifyConnected,
    NotifyDisconnected,
    /// Shut down all units, then send `reply`.
    UnloadModules { reply: DataPackage },
    /// Restart asynchronously, then send `reply`.
    Restart { reply: DataPackage },
    /// Answer a request for this runtime's annotations.
    AnswerAnnotationRequest { request: DataPackage },
    StoreAnnotations {
        host: String,
        annotations: HashMap<String, ModuleAnnotation>,
    },
    /// `(source file, class names)` to inject from `payload_path`.
    InjectModules {
        payload_path: String,
        injections: Vec<(String, Vec<String>)>,
    },
    ForwardToLogSink(DataPackage),
    DeliverData(DataPackage),
    Ignore { reason: String },
}

#[derive(Debug, Clone)]
pub struct ControlPlanner {
    runtime: Runtime,
    phase: ManagerPhase,
    last_restart_requester: Option<String>,
}

impl ControlPlanner {
    pub fn new(runtime: Runtime) -> Self {
        Self {
            runtime,
            phase: ManagerPhase::Idle,
            last_restart_requester: None,
        }
    }

    pub fn phase(&self) -> ManagerPhase {
        self.phase
    }

    /// Host that asked for the most recent restart.
    pub fn last_restart_requester(&self) -> Option<&str> {
        self.last_restart_requester.as_deref()
    }

    pub fn mark_started(&mut self) {
        self.phase = ManagerPhase::Started;
    }

    pub fn mark_stopped(&mut self) {
        self.phase = ManagerPhase::Stopped;
    }

    fn reply(&self, request: &DataPackage, ctrl_type: CtrlType) -> DataPackage {
        DataPackage::reply_to(request, ControlPackage::new(ctrl_type, self.runtime))
    }

    fn ignore(reason: impl Into<String>) -> Vec<ManagerAction> {
        vec![ManagerAction::Ignore {
            reason: reason.into(),
        }]
    }

    pub fn plan(&mut self, package: &DataPackage) -> Vec<ManagerAction> {
        if !package.is_control() {
            return match self.phase {
                ManagerPhase::Started => vec![ManagerAction::DeliverData(package.clone())],
                phase => Self::ignore(format!(
                    "data on channel \"{}\" while {:?}",
                    package.channel, phase
                )),
            };
        }

        let Some(control) = package.control_val() else {
            return Self::ignore("control package without control body");
        };

        match control.ctrl_type {
            CtrlType::ConnectedToRemoteServer => vec![ManagerAction::NotifyConnected],
            CtrlType::DisconnectedFromRemoteServer => vec![ManagerAction::NotifyDisconnected],
            CtrlType::UnloadModules => vec![ManagerAction::UnloadModules {
                reply: self.reply(package, CtrlType::UnloadModulesDone),
            }],
            CtrlType::RestartRuntime => {
                if self.phase == ManagerPhase::Restarting {
                    return Self::ignore("restart requested while already restarting");
                }
                self.phase = ManagerPhase::Restarting;
                self.last_restart_requester = Some(package.source_host.clone());
                vec![ManagerAction::Restart {
                    reply: self.reply(package, CtrlType::RestartRuntimeDone),
                }]
            }
            CtrlType::RequestModuleAnnotations => vec![ManagerAction::AnswerAnnotationRequest {
                request: package.clone(),
            }],
            CtrlType::RequestModuleAnnotationsResponse => vec![ManagerAction::StoreAnnotations {
                host: package.source_host.clone(),
                annotations: control.module_annotations().cloned().unwrap_or_default(),
            }],
            CtrlType::OnNewConfigPayloadData => match control.config_upload_payload() {
                Some(payload) => {
                    let injections = payload.injections_for(self.runtime);
                    if injections.is_empty() {
                        return Self::ignore("config payload without modules for this runtime");
                    }
                    vec![ManagerAction::InjectModules {
                        payload_path: payload.payload_data_path.clone(),
                        injections,
                    }]
                }
                None => Self::ignore("ON_NEW_CONFIG_PAYLOAD_DATA without payload"),
            },
            CtrlType::LogSinkLogMessageStream => {
                vec![ManagerAction::ForwardToLogSink(package.clone())]
            }
            other => Self::ignore(format!("unsupported control type {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claid_structures::{
        Blob, Codec, ConfigUploadPayload, ControlBody, ModuleInjectionDescription,
    };

    fn control(ctrl_type: CtrlType) -> DataPackage {
        DataPackage {
            source_host: "laptop".to_string(),
            target_host: "phone".to_string(),
            ..DataPackage::control(ControlPackage::new(ctrl_type, Runtime::MiddlewareCore))
        }
    }

    #[test]
    fn test_data_is_only_delivered_when_started() {
        let mut planner = ControlPlanner::new(Runtime::Rust);
        let data = DataPackage::with_payload("in", Blob::new(Codec::Json, b"1".to_vec(), "claidservice.IntVal"));

        assert!(matches!(planner.plan(&data)[0], ManagerAction::Ignore { .. }));
        planner.mark_started();
        assert_eq!(planner.plan(&data), vec![ManagerAction::DeliverData(data.clone())]);
    }

    #[test]
    fn test_restart_reply_goes_back_to_requester() {
        let mut planner = ControlPlanner::new(Runtime::Rust);
        planner.mark_started();

        let actions = planner.plan(&control(CtrlType::RestartRuntime));
        let ManagerAction::Restart { reply } = &actions[0] else {
            panic!("expected restart, got {:?}", actions);
        };
        assert_eq!(reply.ctrl_type(), Some(CtrlType::RestartRuntimeDone));
        assert_eq!(reply.target_host, "laptop");
        assert_eq!(reply.source_host, "phone");
        assert_eq!(reply.control_val().unwrap().runtime, Runtime::Rust);
        assert_eq!(planner.phase(), ManagerPhase::Restarting);
        assert_eq!(planner.last_restart_requester(), Some("laptop"));

        assert!(matches!(
            planner.plan(&control(CtrlType::RestartRuntime))[0],
            ManagerAction::Ignore { .. }
        ));
    }

    #[test]
    fn test_unload_replies_unload_done() {
        let mut planner = ControlPlanner::new(Runtime::Rust);
        let actions = planner.plan(&control(CtrlType::UnloadModules));
        let ManagerAction::UnloadModules { reply } = &actions[0] else {
            panic!("expected unload, got {:?}", actions);
        };
        assert_eq!(reply.ctrl_type(), Some(CtrlType::UnloadModulesDone));
        assert_eq!(reply.target_host, "laptop");
    }

    #[test]
    fn test_injections_are_filtered_by_runtime() {
        let mut planner = ControlPlanner::new(Runtime::Rust);
        let payload = ConfigUploadPayload {
            payload_data_path: "/data/upload".to_string(),
            modules_to_inject: vec![
                ModuleInjectionDescription {
                    module_name: "Recorder".to_string(),
                    module_file: "recorder.rs".to_string(),
                    runtime: Runtime::Rust,
                },
                ModuleInjectionDescription {
                    module_name: "PyThing".to_string(),
                    module_file: "thing.py".to_string(),
                    runtime: Runtime::Python,
                },
            ],
            ..Default::default()
        };
        let mut package = control(CtrlType::OnNewConfigPayloadData);
        package.body = claid_structures::PackageBody::Control(
            ControlPackage::new(CtrlType::OnNewConfigPayloadData, Runtime::MiddlewareCore)
                .with_body(ControlBody::ConfigUpload(payload)),
        );

        assert_eq!(
            planner.plan(&package),
            vec![ManagerAction::InjectModules {
                payload_path: "/data/upload".to_string(),
                injections: vec![("recorder.rs".to_string(), vec!["Recorder".to_string()])],
            }]
        );
    }

    #[test]
    fn test_annotation_response_is_keyed_by_sender() {
        let mut planner = ControlPlanner::new(Runtime::Rust);
        let actions = planner.plan(&control(CtrlType::RequestModuleAnnotationsResponse));
        assert_eq!(
            actions,
            vec![ManagerAction::StoreAnnotations {
                host: "laptop".to_string(),
                annotations: HashMap::new(),
            }]
        );
    }

    #[test]
    fn test_stray_ping_is_ignored() {
        let mut planner = ControlPlanner::new(Runtime::Rust);
        planner.mark_started();
        assert!(matches!(
            planner.plan(&control(CtrlType::RuntimePing))[0],
            ManagerAction::Ignore { .. }
        ));
    }
}
