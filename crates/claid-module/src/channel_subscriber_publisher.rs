// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Registry of every channel binding in the runtime.

use std::collections::HashMap;
use std::sync::Arc;

use claid_scheduling::ThreadSafeChannel;
use claid_serialization::{ChannelValue, Mutator, TypeMapping};
use claid_structures::DataPackage;
use parking_lot::Mutex;
use tracing::debug;

use crate::{AnySubscriber, ModuleError, ModuleResult, Publisher};

#[derive(Default)]
struct Bindings {
    /// Example envelope of every channel, per unit, in declaration order.
    examples: HashMap<String, Vec<DataPackage>>,
    /// Keyed by (channel, unit).
    subscribers: HashMap<(String, String), Vec<Arc<dyn AnySubscriber>>>,
}

/// Channel registry shared by all units and the outbound path.
///
/// Declaring a channel records an example envelope under the owning unit:
/// publishers set `source_module`, subscribers set `target_module`. The
/// examples document the unit's channels for the core and are used to
/// check inbound envelopes.
pub struct ChannelSubscriberPublisher {
    type_mapping: TypeMapping,
    to_core: Arc<ThreadSafeChannel<DataPackage>>,
    bindings: Mutex<Bindings>,
}

impl ChannelSubscriberPublisher {
    pub fn new(to_core: Arc<ThreadSafeChannel<DataPackage>>) -> Self {
        Self {
            type_mapping: TypeMapping::new(),
            to_core,
            bindings: Mutex::new(Bindings::default()),
        }
    }

    pub fn type_mapping(&self) -> &TypeMapping {
        &self.type_mapping
    }

    pub fn to_core_queue(&self) -> Arc<ThreadSafeChannel<DataPackage>> {
        Arc::clone(&self.to_core)
    }

    /// Example envelope for a channel, carrying `example` as payload.
    pub fn prepare_example_package<T: ChannelValue>(
        mutator: &Mutator<T>,
        example: &T,
        module_id: &str,
        channel: &str,
        is_publisher: bool,
    ) -> ModuleResult<DataPackage> {
        let mut package = DataPackage {
            channel: channel.to_string(),
            ..Default::default()
        };
        if is_publisher {
            package.source_module = module_id.to_string();
        } else {
            package.target_module = module_id.to_string();
        }
        mutator.set_package_payload(&mut package, example)?;
        Ok(package)
    }

    pub fn publish<T: ChannelValue>(
        &self,
        example: &T,
        module_id: &str,
        channel: &str,
    ) -> ModuleResult<Arc<Publisher<T>>> {
        let mutator = self.type_mapping.mutator_for(example)?;
        let package = Self::prepare_example_package(&mutator, example, module_id, channel, true)?;
        self.insert_example(module_id, package, true)?;

        Ok(Arc::new(Publisher::new(
            module_id,
            channel,
            mutator,
            Arc::clone(&self.to_core),
        )))
    }

    /// Add `subscriber` to the (channel, unit) subscriber list.
    ///
    /// A unit may subscribe the same channel several times; every callback
    /// receives each package. The example envelope is recorded by the first
    /// subscription, later ones must use the same payload type.
    pub fn subscribe<T: ChannelValue>(
        &self,
        example: &T,
        module_id: &str,
        channel: &str,
        mutator: &Mutator<T>,
        subscriber: Arc<dyn AnySubscriber>,
    ) -> ModuleResult<()> {
        let package = Self::prepare_example_package(mutator, example, module_id, channel, false)?;
        let existing = {
            let bindings = self.bindings.lock();
            Self::subscribe_example(&bindings.examples, channel, module_id)
                .map(|declared| declared.message_type().to_string())
        };
        match existing {
            None => self.insert_example(module_id, package, false)?,
            Some(declared) if declared == package.message_type() => {
                debug!(
                    "[CHANNELS] {} adds another subscriber to channel \"{}\"",
                    module_id, channel
                );
            }
            Some(declared) => {
                return Err(ModuleError::usage(format!(
                    "channel \"{}\" was already subscribed with payload type \"{}\", cannot subscribe it again as \"{}\"",
                    channel,
                    declared,
                    package.message_type()
                )));
            }
        }
        self.bindings
            .lock()
            .subscribers
            .entry((channel.to_string(), module_id.to_string()))
            .or_default()
            .push(subscriber);
        Ok(())
    }

    fn insert_example(&self, module_id: &str, package: DataPackage, is_publisher: bool) -> ModuleResult<()> {
        let mut bindings = self.bindings.lock();
        let examples = bindings.examples.entry(module_id.to_string()).or_default();

        let duplicate = examples.iter().any(|existing| {
            existing.channel == package.channel
                && (existing.source_module == module_id) == is_publisher
        });
        if duplicate {
            return Err(ModuleError::usage(format!(
                "channel \"{}\" was already {} by this module",
                package.channel,
                if is_publisher { "published" } else { "subscribed" }
            )));
        }

        debug!(
            "[CHANNELS] {} {} channel \"{}\" ({})",
            module_id,
            if is_publisher { "publishes" } else { "subscribes" },
            package.channel,
            package.message_type()
        );
        examples.push(package);
        Ok(())
    }

    /// Subscribe-side example of `(channel, module_id)`, if declared.
    fn subscribe_example<'a>(
        examples: &'a HashMap<String, Vec<DataPackage>>,
        channel: &str,
        module_id: &str,
    ) -> Option<&'a DataPackage> {
        examples.get(module_id).and_then(|packages| {
            packages
                .iter()
                .find(|p| p.channel == channel && p.target_module == module_id)
        })
    }

    /// True if `package` may be delivered to `receiver_module`: the unit
    /// subscribed its channel and the payload type matches the declared one.
    pub fn is_data_package_compatible_with_channel(
        &self,
        package: &DataPackage,
        receiver_module: &str,
    ) -> bool {
        if package.payload().is_none() {
            return false;
        }
        let bindings = self.bindings.lock();
        Self::subscribe_example(&bindings.examples, &package.channel, receiver_module)
            .is_some_and(|example| example.message_type() == package.message_type())
    }

    /// Declared payload type of a subscribed channel.
    pub fn get_payload_case_of_channel(&self, channel: &str, receiver_module: &str) -> Option<String> {
        let bindings = self.bindings.lock();
        Self::subscribe_example(&bindings.examples, channel, receiver_module)
            .map(|example| example.message_type().to_string())
    }

    pub fn get_subscriber_instances_of_module(
        &self,
        channel: &str,
        module_id: &str,
    ) -> Vec<Arc<dyn AnySubscriber>> {
        self.bindings
            .lock()
            .subscribers
            .get(&(channel.to_string(), module_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_channel_template_packages_for_module(&self, module_id: &str) -> Vec<DataPackage> {
        self.bindings
            .lock()
            .examples
            .get(module_id)
            .cloned()
            .unwrap_or_default()
    }

    /// `(unit id, example envelopes)` of every unit that declared channels.
    pub fn channel_examples(&self) -> Vec<(String, Vec<DataPackage>)> {
        self.bindings
            .lock()
            .examples
            .iter()
            .map(|(id, packages)| (id.clone(), packages.clone()))
            .collect()
    }

    pub fn reset(&self) {
        let mut bindings = self.bindings.lock();
        bindings.examples.clear();
        bindings.subscribers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claid_structures::{Blob, Codec};

    struct NullSubscriber;

    impl AnySubscriber for NullSubscriber {
        fn module_id(&self) -> &str {
            "B"
        }
        fn channel(&self) -> &str {
            "in"
        }
        fn message_type(&self) -> &str {
            "claidservice.StringVal"
        }
        fn on_new_data(&self, _package: &DataPackage) {}
    }

    fn registry() -> ChannelSubscriberPublisher {
        ChannelSubscriberPublisher::new(Arc::new(ThreadSafeChannel::new("to_core")))
    }

    fn subscribe_string(registry: &ChannelSubscriberPublisher) {
        let example = String::new();
        let mutator = registry.type_mapping().mutator_for(&example).unwrap();
        registry
            .subscribe(&example, "B", "in", &mutator, Arc::new(NullSubscriber))
            .unwrap();
    }

    #[test]
    fn test_examples_record_direction() {
        let registry = registry();
        registry.publish(&0_i64, "A", "out").unwrap();
        subscribe_string(&registry);

        let a = registry.get_channel_template_packages_for_module("A");
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].source_module, "A");
        assert!(a[0].target_module.is_empty());

        let b = registry.get_channel_template_packages_for_module("B");
        assert_eq!(b[0].target_module, "B");
        assert_eq!(b[0].message_type(), "claidservice.StringVal");
    }

    #[test]
    fn test_type_mismatch_is_incompatible() {
        let registry = registry();
        subscribe_string(&registry);

        let mut package = DataPackage::with_payload(
            "in",
            Blob::new(Codec::Json, b"{\"val\":1}".to_vec(), "claidservice.IntVal"),
        );
        package.target_module = "B".to_string();
        assert!(!registry.is_data_package_compatible_with_channel(&package, "B"));

        package.set_payload(Blob::new(
            Codec::Json,
            b"{\"val\":\"x\"}".to_vec(),
            "claidservice.StringVal",
        ));
        assert!(registry.is_data_package_compatible_with_channel(&package, "B"));
        assert!(!registry.is_data_package_compatible_with_channel(&package, "C"));
    }

    #[test]
    fn test_same_channel_twice_in_one_direction_is_rejected() {
        let registry = registry();
        registry.publish(&0_i64, "A", "out").unwrap();
        assert!(matches!(
            registry.publish(&0_i64, "A", "out"),
            Err(ModuleError::Usage(_))
        ));
        // The other direction is still allowed.
        let mutator = registry.type_mapping().mutator_for(&0_i64).unwrap();
        registry
            .subscribe(&0_i64, "A", "out", &mutator, Arc::new(NullSubscriber))
            .unwrap();
    }

    #[test]
    fn test_repeated_subscribe_keeps_one_example_and_every_subscriber() {
        let registry = registry();
        subscribe_string(&registry);
        subscribe_string(&registry);

        assert_eq!(registry.get_channel_template_packages_for_module("B").len(), 1);
        assert_eq!(registry.get_subscriber_instances_of_module("in", "B").len(), 2);
    }

    #[test]
    fn test_repeated_subscribe_with_other_type_is_rejected() {
        let registry = registry();
        subscribe_string(&registry);
        let mutator = registry.type_mapping().mutator_for(&0_i64).unwrap();
        assert!(matches!(
            registry.subscribe(&0_i64, "B", "in", &mutator, Arc::new(NullSubscriber)),
            Err(ModuleError::Usage(_))
        ));
        assert_eq!(registry.get_subscriber_instances_of_module("in", "B").len(), 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let registry = registry();
        registry.publish(&0.5_f64, "A", "out").unwrap();
        subscribe_string(&registry);
        registry.reset();

        assert!(registry.channel_examples().is_empty());
        assert!(registry.get_subscriber_instances_of_module("in", "B").is_empty());
        assert_eq!(registry.get_payload_case_of_channel("in", "B"), None);
    }
}
