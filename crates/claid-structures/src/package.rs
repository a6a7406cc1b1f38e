// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The envelope exchanged with the middleware core.

use serde::{Deserialize, Serialize};

use crate::{ControlPackage, CtrlType};

/// Milliseconds since the Unix epoch, as stamped on outgoing packages.
pub fn unix_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Encoding of the bytes inside a [`Blob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Codec {
    #[default]
    #[serde(rename = "CODEC_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "CODEC_PROTO")]
    Proto,
    #[serde(rename = "CODEC_JSON")]
    Json,
}

/// Wire form of an application value: raw bytes plus the type identifier of
/// the message they encode.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Blob {
    pub codec: Codec,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    pub message_type: String,
}

impl Blob {
    pub fn new(codec: Codec, payload: Vec<u8>, message_type: impl Into<String>) -> Self {
        Self {
            codec,
            payload,
            message_type: message_type.into(),
        }
    }
}

/// Exactly one of a typed payload or a control body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PackageBody {
    Payload(Blob),
    Control(ControlPackage),
}

impl Default for PackageBody {
    fn default() -> Self {
        PackageBody::Payload(Blob::default())
    }
}

/// A unit of data or control exchanged with the core.
///
/// Unit ids (`source_module`/`target_module`) address units inside a runtime;
/// host ids address machines and are resolved by the core, not by this runtime.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPackage {
    pub source_module: String,
    pub target_module: String,
    pub source_host: String,
    pub target_host: String,
    pub source_user_token: String,
    pub target_user_token: String,
    pub channel: String,
    pub unix_timestamp_ms: i64,
    pub body: PackageBody,
}

impl DataPackage {
    pub fn control(control: ControlPackage) -> Self {
        Self {
            body: PackageBody::Control(control),
            ..Default::default()
        }
    }

    pub fn with_payload(channel: impl Into<String>, payload: Blob) -> Self {
        Self {
            channel: channel.into(),
            body: PackageBody::Payload(payload),
            ..Default::default()
        }
    }

    /// Control package addressed back to the host that sent `request`.
    pub fn reply_to(request: &DataPackage, control: ControlPackage) -> Self {
        Self {
            source_host: request.target_host.clone(),
            target_host: request.source_host.clone(),
            ..Self::control(control)
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(&self.body, PackageBody::Control(control) if control.ctrl_type != CtrlType::Unspecified)
    }

    pub fn control_val(&self) -> Option<&ControlPackage> {
        match &self.body {
            PackageBody::Control(control) => Some(control),
            PackageBody::Payload(_) => None,
        }
    }

    pub fn ctrl_type(&self) -> Option<CtrlType> {
        self.control_val().map(|control| control.ctrl_type)
    }

    pub fn payload(&self) -> Option<&Blob> {
        match &self.body {
            PackageBody::Payload(blob) => Some(blob),
            PackageBody::Control(_) => None,
        }
    }

    /// Replaces whatever body the package had with `blob`.
    pub fn set_payload(&mut self, blob: Blob) {
        self.body = PackageBody::Payload(blob);
    }

    /// Type identifier of the payload, or an empty string for control packages.
    pub fn message_type(&self) -> &str {
        self.payload()
            .map(|blob| blob.message_type.as_str())
            .unwrap_or("")
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
