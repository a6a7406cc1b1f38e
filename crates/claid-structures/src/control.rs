// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Control bodies exchanged out-of-band with the middleware core.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    ConfigUploadPayload, LogMessage, ModuleAnnotation, Result, Runtime, StructuresError,
};

/// Purpose of a control package. The serialized names are the stable wire
/// identifiers shared by all runtimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CtrlType {
    #[default]
    Unspecified,
    RuntimePing,
    ConnectedToRemoteServer,
    DisconnectedFromRemoteServer,
    UnloadModules,
    UnloadModulesDone,
    RestartRuntime,
    RestartRuntimeDone,
    RequestModuleAnnotations,
    RequestModuleAnnotationsResponse,
    OnNewConfigPayloadData,
    UploadConfigAndData,
    LocalLogMessage,
    LogSinkLogMessageStream,
    SubscribeToLogSinkLogMessageStream,
    UnsubscribeFromLogSinkLogMessageStream,
}

impl CtrlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CtrlType::Unspecified => "UNSPECIFIED",
            CtrlType::RuntimePing => "RUNTIME_PING",
            CtrlType::ConnectedToRemoteServer => "CONNECTED_TO_REMOTE_SERVER",
            CtrlType::DisconnectedFromRemoteServer => "DISCONNECTED_FROM_REMOTE_SERVER",
            CtrlType::UnloadModules => "UNLOAD_MODULES",
            CtrlType::UnloadModulesDone => "UNLOAD_MODULES_DONE",
            CtrlType::RestartRuntime => "RESTART_RUNTIME",
            CtrlType::RestartRuntimeDone => "RESTART_RUNTIME_DONE",
            CtrlType::RequestModuleAnnotations => "REQUEST_MODULE_ANNOTATIONS",
            CtrlType::RequestModuleAnnotationsResponse => "REQUEST_MODULE_ANNOTATIONS_RESPONSE",
            CtrlType::OnNewConfigPayloadData => "ON_NEW_CONFIG_PAYLOAD_DATA",
            CtrlType::UploadConfigAndData => "UPLOAD_CONFIG_AND_DATA",
            CtrlType::LocalLogMessage => "LOCAL_LOG_MESSAGE",
            CtrlType::LogSinkLogMessageStream => "LOG_SINK_LOG_MESSAGE_STREAM",
            CtrlType::SubscribeToLogSinkLogMessageStream => {
                "SUBSCRIBE_TO_LOG_SINK_LOG_MESSAGE_STREAM"
            }
            CtrlType::UnsubscribeFromLogSinkLogMessageStream => {
                "UNSUBSCRIBE_FROM_LOG_SINK_LOG_MESSAGE_STREAM"
            }
        }
    }
}

impl std::fmt::Display for CtrlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CtrlType {
    type Err = StructuresError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.to_uppercase();
        let name = normalized.strip_prefix("CTRL_").unwrap_or(&normalized);
        let parsed = match name {
            "UNSPECIFIED" => CtrlType::Unspecified,
            "RUNTIME_PING" => CtrlType::RuntimePing,
            "CONNECTED_TO_REMOTE_SERVER" => CtrlType::ConnectedToRemoteServer,
            "DISCONNECTED_FROM_REMOTE_SERVER" => CtrlType::DisconnectedFromRemoteServer,
            "UNLOAD_MODULES" => CtrlType::UnloadModules,
            "UNLOAD_MODULES_DONE" => CtrlType::UnloadModulesDone,
            "RESTART_RUNTIME" => CtrlType::RestartRuntime,
            "RESTART_RUNTIME_DONE" => CtrlType::RestartRuntimeDone,
            "REQUEST_MODULE_ANNOTATIONS" => CtrlType::RequestModuleAnnotations,
            "REQUEST_MODULE_ANNOTATIONS_RESPONSE" => CtrlType::RequestModuleAnnotationsResponse,
            "ON_NEW_CONFIG_PAYLOAD_DATA" => CtrlType::OnNewConfigPayloadData,
            "UPLOAD_CONFIG_AND_DATA" => CtrlType::UploadConfigAndData,
            "LOCAL_LOG_MESSAGE" => CtrlType::LocalLogMessage,
            "LOG_SINK_LOG_MESSAGE_STREAM" => CtrlType::LogSinkLogMessageStream,
            "SUBSCRIBE_TO_LOG_SINK_LOG_MESSAGE_STREAM" => {
                CtrlType::SubscribeToLogSinkLogMessageStream
            }
            "UNSUBSCRIBE_FROM_LOG_SINK_LOG_MESSAGE_STREAM" => {
                CtrlType::UnsubscribeFromLogSinkLogMessageStream
            }
            _ => return Err(StructuresError::UnknownControlType(s.to_string())),
        };
        Ok(parsed)
    }
}

/// Kind-specific body of a control package.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ControlBody {
    #[default]
    None,
    /// Annotations keyed by unit class name
    ModuleAnnotations(HashMap<String, ModuleAnnotation>),
    ConfigUpload(ConfigUploadPayload),
    LogMessage(LogMessage),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlPackage {
    pub ctrl_type: CtrlType,
    pub runtime: Runtime,
    #[serde(default)]
    pub body: ControlBody,
}

impl ControlPackage {
    pub fn new(ctrl_type: CtrlType, runtime: Runtime) -> Self {
        Self {
            ctrl_type,
            runtime,
            body: ControlBody::None,
        }
    }

    pub fn with_body(mut self, body: ControlBody) -> Self {
        self.body = body;
        self
    }

    pub fn module_annotations(&self) -> Option<&HashMap<String, ModuleAnnotation>> {
        match &self.body {
            ControlBody::ModuleAnnotations(annotations) => Some(annotations),
            _ => None,
        }
    }

    pub fn config_upload_payload(&self) -> Option<&ConfigUploadPayload> {
        match &self.body {
            ControlBody::ConfigUpload(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn log_message(&self) -> Option<&LogMessage> {
        match &self.body {
            ControlBody::LogMessage(message) => Some(message),
            _ => None,
        }
    }

    /// Check that the populated body is the one the control kind calls for.
    pub fn validate(&self) -> Result<()> {
        let body_ok = match self.ctrl_type {
            CtrlType::RequestModuleAnnotationsResponse => {
                matches!(self.body, ControlBody::ModuleAnnotations(_))
            }
            CtrlType::OnNewConfigPayloadData | CtrlType::UploadConfigAndData => {
                matches!(self.body, ControlBody::ConfigUpload(_))
            }
            CtrlType::LocalLogMessage | CtrlType::LogSinkLogMessageStream => {
                matches!(self.body, ControlBody::LogMessage(_))
            }
            _ => matches!(self.body, ControlBody::None),
        };

        if body_ok {
            Ok(())
        } else {
            Err(StructuresError::InvalidPackage(format!(
                "control type {} does not match its body",
                self.ctrl_type
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctrl_type_parses_with_and_without_prefix() {
        assert_eq!(
            "CTRL_RESTART_RUNTIME".parse::<CtrlType>().unwrap(),
            CtrlType::RestartRuntime
        );
        assert_eq!(
            "runtime_ping".parse::<CtrlType>().unwrap(),
            CtrlType::RuntimePing
        );
        assert!("RESTART_EVERYTHING".parse::<CtrlType>().is_err());
    }

    #[test]
    fn test_ctrl_type_wire_name_matches_display() {
        let json = serde_json::to_string(&CtrlType::UnsubscribeFromLogSinkLogMessageStream).unwrap();
        assert_eq!(
            json,
            format!("\"{}\"", CtrlType::UnsubscribeFromLogSinkLogMessageStream)
        );
    }

    #[test]
    fn test_validate_rejects_missing_log_message() {
        let package = ControlPackage::new(CtrlType::LocalLogMessage, Runtime::Rust);
        assert!(package.validate().is_err());

        let ping = ControlPackage::new(CtrlType::RuntimePing, Runtime::Rust);
        assert!(ping.validate().is_ok());
    }
}
