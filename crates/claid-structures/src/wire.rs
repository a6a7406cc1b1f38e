// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Frame format for stream transports that carry both the unary calls and the
//! package stream over one socket.

use serde::{Deserialize, Serialize};

use crate::{
    DataPackage, InitRuntimeRequest, ModuleListRequest, ModuleListResponse, Result,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", content = "body", rename_all = "snake_case")]
pub enum WireFrame {
    ModuleListRequest(ModuleListRequest),
    ModuleListResponse(ModuleListResponse),
    InitRuntimeRequest(InitRuntimeRequest),
    InitRuntimeResponse,
    Package(DataPackage),
    /// Sent by either side before it stops streaming.
    EndOfStream,
}

impl WireFrame {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            WireFrame::ModuleListRequest(_) => "module_list_request",
            WireFrame::ModuleListResponse(_) => "module_list_response",
            WireFrame::InitRuntimeRequest(_) => "init_runtime_request",
            WireFrame::InitRuntimeResponse => "init_runtime_response",
            WireFrame::Package(_) => "package",
            WireFrame::EndOfStream => "end_of_stream",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ControlPackage, CtrlType, Runtime};

    #[test]
    fn test_frame_tag_is_readable() {
        let ping = WireFrame::Package(DataPackage::control(ControlPackage::new(
            CtrlType::RuntimePing,
            Runtime::Rust,
        )));
        let bytes = ping.to_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\"frame\":\"package\""));
        assert!(text.contains("RUNTIME_PING"));
        assert_eq!(WireFrame::from_bytes(&bytes).unwrap(), ping);
    }

    #[test]
    fn test_garbage_frame_is_an_error() {
        assert!(WireFrame::from_bytes(b"not json").is_err());
    }
}
