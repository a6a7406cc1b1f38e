// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use chrono::{DateTime, Utc};
use claid_scheduling::ThreadSafeChannel;
use claid_serialization::Mutator;
use claid_structures::DataPackage;

use crate::ModuleResult;

/// Writes values of one channel into envelopes bound for the core.
pub struct Publisher<T> {
    module_id: String,
    channel: String,
    mutator: Mutator<T>,
    to_core: Arc<ThreadSafeChannel<DataPackage>>,
}

impl<T: 'static> Publisher<T> {
    pub fn new(
        module_id: impl Into<String>,
        channel: impl Into<String>,
        mutator: Mutator<T>,
        to_core: Arc<ThreadSafeChannel<DataPackage>>,
    ) -> Self {
        Self {
            module_id: module_id.into(),
            channel: channel.into(),
            mutator,
            to_core,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn message_type(&self) -> &str {
        self.mutator.message_type()
    }

    pub fn post(&self, value: &T, timestamp: DateTime<Utc>) -> ModuleResult<()> {
        let mut package = DataPackage {
            source_module: self.module_id.clone(),
            channel: self.channel.clone(),
            unix_timestamp_ms: timestamp.timestamp_millis(),
            ..Default::default()
        };
        self.mutator.set_package_payload(&mut package, value)?;
        self.to_core.put(package)?;
        Ok(())
    }
}
