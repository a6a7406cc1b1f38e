// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Static self-description of a unit class.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::DataPackage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    #[default]
    PropertyTypeDefault,
    PropertyTypeEnum,
    PropertyTypeInt,
    PropertyTypePath,
}

/// Editing hint for one unit property.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyHint {
    pub property_type: PropertyType,
    pub enum_values: Vec<String>,
    pub property_type_int_min: i64,
    pub property_type_int_max: i64,
}

/// Description of a unit class: what it does, which properties it reads and
/// which channels it declares (as example packages).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleAnnotation {
    pub module_description: String,
    pub module_category: String,
    pub properties: Vec<String>,
    pub property_descriptions: Vec<String>,
    pub property_hints: Vec<PropertyHint>,
    pub channel_definition: Vec<DataPackage>,
    pub channel_description: Vec<String>,
    pub is_injectable: bool,
    pub file_dependencies: Vec<String>,
}

impl ModuleAnnotation {
    /// Channels the unit subscribes to (example has a target unit).
    pub fn input_channels(&self) -> Vec<&str> {
        self.channel_definition
            .iter()
            .filter(|package| !package.target_module.is_empty())
            .map(|package| package.channel.as_str())
            .collect()
    }

    /// Channels the unit publishes (example has a source unit).
    pub fn output_channels(&self) -> Vec<&str> {
        self.channel_definition
            .iter()
            .filter(|package| !package.source_module.is_empty())
            .map(|package| package.channel.as_str())
            .collect()
    }

    pub fn input_channel_types(&self) -> HashMap<&str, &DataPackage> {
        self.channel_definition
            .iter()
            .filter(|package| !package.target_module.is_empty())
            .map(|package| (package.channel.as_str(), package))
            .collect()
    }

    pub fn output_channel_types(&self) -> HashMap<&str, &DataPackage> {
        self.channel_definition
            .iter()
            .filter(|package| !package.source_module.is_empty())
            .map(|package| (package.channel.as_str(), package))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_direction_follows_example_addressing() {
        let publish = DataPackage {
            source_module: "Echo".to_string(),
            channel: "out".to_string(),
            ..Default::default()
        };
        let subscribe = DataPackage {
            target_module: "Echo".to_string(),
            channel: "in".to_string(),
            ..Default::default()
        };
        let annotation = ModuleAnnotation {
            channel_definition: vec![publish, subscribe],
            ..Default::default()
        };

        assert_eq!(annotation.input_channels(), vec!["in"]);
        assert_eq!(annotation.output_channels(), vec!["out"]);
        assert!(annotation.input_channel_types().contains_key("in"));
    }
}
