// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::StructuresError;

/// Kind of language runtime attached to the middleware core.
///
/// Control packages are tagged with the runtime that produced them, and
/// config-upload payloads use it to address code injections to one runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Runtime {
    #[default]
    #[serde(rename = "RUNTIME_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "MIDDLEWARE_CORE")]
    MiddlewareCore,
    #[serde(rename = "RUNTIME_CPP")]
    Cpp,
    #[serde(rename = "RUNTIME_DART")]
    Dart,
    #[serde(rename = "RUNTIME_JAVA")]
    Java,
    #[serde(rename = "RUNTIME_PYTHON")]
    Python,
    #[serde(rename = "RUNTIME_RUST")]
    Rust,
}

impl Runtime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Runtime::Unspecified => "RUNTIME_UNSPECIFIED",
            Runtime::MiddlewareCore => "MIDDLEWARE_CORE",
            Runtime::Cpp => "RUNTIME_CPP",
            Runtime::Dart => "RUNTIME_DART",
            Runtime::Java => "RUNTIME_JAVA",
            Runtime::Python => "RUNTIME_PYTHON",
            Runtime::Rust => "RUNTIME_RUST",
        }
    }
}

impl std::fmt::Display for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Runtime {
    type Err = StructuresError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RUNTIME_UNSPECIFIED" | "UNSPECIFIED" => Ok(Runtime::Unspecified),
            "MIDDLEWARE_CORE" => Ok(Runtime::MiddlewareCore),
            "RUNTIME_CPP" | "CPP" => Ok(Runtime::Cpp),
            "RUNTIME_DART" | "DART" => Ok(Runtime::Dart),
            "RUNTIME_JAVA" | "JAVA" => Ok(Runtime::Java),
            "RUNTIME_PYTHON" | "PYTHON" => Ok(Runtime::Python),
            "RUNTIME_RUST" | "RUST" => Ok(Runtime::Rust),
            _ => Err(StructuresError::UnknownRuntime(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_parse_accepts_short_names() {
        assert_eq!("rust".parse::<Runtime>().unwrap(), Runtime::Rust);
        assert_eq!("RUNTIME_PYTHON".parse::<Runtime>().unwrap(), Runtime::Python);
        assert!("cobol".parse::<Runtime>().is_err());
    }

    #[test]
    fn test_runtime_serializes_wire_identifier() {
        let json = serde_json::to_string(&Runtime::Rust).unwrap();
        assert_eq!(json, "\"RUNTIME_RUST\"");
    }
}
