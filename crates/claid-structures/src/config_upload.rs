// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::Runtime;

/// One unit class to be injected into a runtime from a source file that
/// arrived with a config upload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleInjectionDescription {
    pub module_name: String,
    pub module_file: String,
    pub runtime: Runtime,
}

/// Config plus attached data pushed to a host. The config itself is owned
/// by the core and stays opaque here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigUploadPayload {
    pub config: serde_json::Value,
    pub payload_data_path: String,
    pub modules_to_inject: Vec<ModuleInjectionDescription>,
}

impl ConfigUploadPayload {
    /// Injections addressed to `runtime`, grouped by source file in first-seen order.
    pub fn injections_for(&self, runtime: Runtime) -> Vec<(String, Vec<String>)> {
        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for injection in self.modules_to_inject.iter().filter(|i| i.runtime == runtime) {
            match grouped.iter_mut().find(|(file, _)| *file == injection.module_file) {
                Some((_, names)) => names.push(injection.module_name.clone()),
                None => grouped.push((
                    injection.module_file.clone(),
                    vec![injection.module_name.clone()],
                )),
            }
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn injection(name: &str, file: &str, runtime: Runtime) -> ModuleInjectionDescription {
        ModuleInjectionDescription {
            module_name: name.to_string(),
            module_file: file.to_string(),
            runtime,
        }
    }

    #[test]
    fn test_injections_are_filtered_and_grouped() {
        let payload = ConfigUploadPayload {
            modules_to_inject: vec![
                injection("Filter", "dsp.plugin", Runtime::Rust),
                injection("Plotter", "plot.py", Runtime::Python),
                injection("Window", "dsp.plugin", Runtime::Rust),
                injection("Counter", "util.plugin", Runtime::Rust),
            ],
            ..Default::default()
        };

        let grouped = payload.injections_for(Runtime::Rust);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, "dsp.plugin");
        assert_eq!(grouped[0].1, vec!["Filter", "Window"]);
        assert_eq!(grouped[1].1, vec!["Counter"]);
    }
}
