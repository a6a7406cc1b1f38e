// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unit descriptors and the unary requests built around them.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    DataPackage, LogMessageSeverityLevel, ModuleAnnotation, Result, Runtime, StructuresError,
};

/// Declares one unit instance the runtime has to create.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleDescriptor {
    pub module_id: String,
    pub module_class: String,
    pub properties: HashMap<String, String>,
}

impl ModuleDescriptor {
    pub fn new(module_id: impl Into<String>, module_class: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            module_class: module_class.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleListRequest {
    pub runtime: Runtime,
    pub supported_module_classes: Vec<String>,
    pub module_annotations: HashMap<String, ModuleAnnotation>,
}

/// The core's authoritative answer to a [`ModuleListRequest`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleListResponse {
    pub descriptors: Vec<ModuleDescriptor>,
    pub log_severity_level_for_host: LogMessageSeverityLevel,
}

impl ModuleListResponse {
    /// Reject lists that name the same unit id twice or leave ids/classes empty.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for descriptor in &self.descriptors {
            if descriptor.module_id.is_empty() || descriptor.module_class.is_empty() {
                return Err(StructuresError::InvalidPackage(format!(
                    "module descriptor with empty id or class: {:?}",
                    descriptor
                )));
            }
            if !seen.insert(descriptor.module_id.as_str()) {
                return Err(StructuresError::InvalidPackage(format!(
                    "module id \"{}\" is listed more than once",
                    descriptor.module_id
                )));
            }
        }
        Ok(())
    }
}

/// Example packages of every channel one unit declared.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleChannels {
    pub module_id: String,
    pub channel_packets: Vec<DataPackage>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InitRuntimeRequest {
    pub runtime: Runtime,
    pub modules: Vec<ModuleChannels>,
}

impl InitRuntimeRequest {
    pub fn from_channel_examples(
        runtime: Runtime,
        examples: impl IntoIterator<Item = (String, Vec<DataPackage>)>,
    ) -> Self {
        let mut modules: Vec<ModuleChannels> = examples
            .into_iter()
            .map(|(module_id, channel_packets)| ModuleChannels {
                module_id,
                channel_packets,
            })
            .collect();
        modules.sort_by(|a, b| a.module_id.cmp(&b.module_id));
        Self { runtime, modules }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_module_ids_are_rejected() {
        let response = ModuleListResponse {
            descriptors: vec![
                ModuleDescriptor::new("A", "Echo"),
                ModuleDescriptor::new("A", "Logger"),
            ],
            ..Default::default()
        };
        assert!(response.validate().is_err());
    }

    #[test]
    fn test_init_runtime_request_is_sorted_by_module() {
        let request = InitRuntimeRequest::from_channel_examples(
            Runtime::Rust,
            vec![
                ("B".to_string(), Vec::new()),
                ("A".to_string(), Vec::new()),
            ],
        );
        let ids: Vec<_> = request.modules.iter().map(|m| m.module_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }
}
