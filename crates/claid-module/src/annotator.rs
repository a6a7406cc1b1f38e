// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use claid_serialization::{ChannelValue, TypeMapping};
use claid_structures::{ModuleAnnotation, PropertyHint, PropertyType};

use crate::{ChannelSubscriberPublisher, ModuleResult};

/// Builds the [`ModuleAnnotation`] of one unit class.
pub struct ModuleAnnotator {
    module_class: String,
    annotation: ModuleAnnotation,
    type_mapping: TypeMapping,
}

impl ModuleAnnotator {
    pub fn new(module_class: impl Into<String>) -> Self {
        Self {
            module_class: module_class.into(),
            annotation: ModuleAnnotation::default(),
            type_mapping: TypeMapping::new(),
        }
    }

    pub fn module_class(&self) -> &str {
        &self.module_class
    }

    pub fn set_module_description(&mut self, description: impl Into<String>) {
        self.annotation.module_description = description.into();
    }

    pub fn set_module_category(&mut self, category: impl Into<String>) {
        self.annotation.module_category = category.into();
    }

    pub fn make_default_property() -> PropertyHint {
        PropertyHint::default()
    }

    pub fn make_enum_property<S: Into<String>>(values: impl IntoIterator<Item = S>) -> PropertyHint {
        PropertyHint {
            property_type: PropertyType::PropertyTypeEnum,
            enum_values: values.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn make_integer_property(min: i64, max: i64) -> PropertyHint {
        PropertyHint {
            property_type: PropertyType::PropertyTypeInt,
            property_type_int_min: min,
            property_type_int_max: max,
            ..Default::default()
        }
    }

    pub fn make_path_property() -> PropertyHint {
        PropertyHint {
            property_type: PropertyType::PropertyTypePath,
            ..Default::default()
        }
    }

    /// Document a property. Without a hint the default hint is used.
    pub fn describe_property(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        hint: Option<PropertyHint>,
    ) {
        self.annotation.properties.push(name.into());
        self.annotation.property_descriptions.push(description.into());
        self.annotation
            .property_hints
            .push(hint.unwrap_or_else(Self::make_default_property));
    }

    /// # Errors
    ///
    /// Fails if `example` has no payload mapping.
    pub fn describe_publish_channel<T: ChannelValue>(
        &mut self,
        channel: &str,
        example: &T,
        description: impl Into<String>,
    ) -> ModuleResult<()> {
        self.describe_channel(channel, example, description, true)
    }

    pub fn describe_subscribe_channel<T: ChannelValue>(
        &mut self,
        channel: &str,
        example: &T,
        description: impl Into<String>,
    ) -> ModuleResult<()> {
        self.describe_channel(channel, example, description, false)
    }

    fn describe_channel<T: ChannelValue>(
        &mut self,
        channel: &str,
        example: &T,
        description: impl Into<String>,
        is_publisher: bool,
    ) -> ModuleResult<()> {
        let mutator = self.type_mapping.mutator_for(example)?;
        let package = ChannelSubscriberPublisher::prepare_example_package(
            &mutator,
            example,
            &self.module_class,
            channel,
            is_publisher,
        )?;
        self.annotation.channel_definition.push(package);
        self.annotation.channel_description.push(description.into());
        Ok(())
    }

    pub fn make_injectable(&mut self) {
        self.annotation.is_injectable = true;
    }

    pub fn add_dependency(&mut self, dependency: impl Into<String>) {
        self.annotation.file_dependencies.push(dependency.into());
    }

    pub fn annotation(&self) -> &ModuleAnnotation {
        &self.annotation
    }

    pub fn into_annotation(self) -> ModuleAnnotation {
        self.annotation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_are_described_with_direction() {
        let mut annotator = ModuleAnnotator::new("Echo");
        annotator.set_module_category("Test");
        annotator.describe_publish_channel("out", &0_i32, "echoed value").unwrap();
        annotator.describe_subscribe_channel("in", &String::new(), "input").unwrap();

        let annotation = annotator.into_annotation();
        assert_eq!(annotation.module_category, "Test");
        assert_eq!(annotation.output_channels(), vec!["out"]);
        assert_eq!(annotation.input_channels(), vec!["in"]);
        assert_eq!(annotation.channel_description, vec!["echoed value", "input"]);
        assert_eq!(
            annotation.input_channel_types()["in"].message_type(),
            "claidservice.StringVal"
        );
    }

    #[test]
    fn test_property_hints_line_up_with_properties() {
        let mut annotator = ModuleAnnotator::new("Sensor");
        annotator.describe_property("rate", "samples per second", Some(ModuleAnnotator::make_integer_property(1, 100)));
        annotator.describe_property("mode", "mode", Some(ModuleAnnotator::make_enum_property(["fast", "slow"])));
        annotator.describe_property("note", "free text", None);

        let annotation = annotator.annotation();
        assert_eq!(annotation.properties.len(), 3);
        assert_eq!(annotation.property_hints.len(), 3);
        assert_eq!(annotation.property_hints[0].property_type_int_max, 100);
        assert_eq!(annotation.property_hints[1].enum_values, vec!["fast", "slow"]);
        assert_eq!(annotation.property_hints[2].property_type, PropertyType::PropertyTypeDefault);
    }
}
