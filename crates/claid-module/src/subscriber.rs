// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use claid_observability::Logger;
use claid_scheduling::{
    FailureHandler, RunnableDispatcher, ScheduleDescription, ScheduledRunnable,
};
use claid_serialization::Mutator;
use claid_structures::{DataPackage, LogMessageSeverityLevel};

use crate::diagnostics::module_log;
use crate::{ChannelData, ModuleResult};

/// Type-erased receiving end of a channel binding.
pub trait AnySubscriber: Send + Sync {
    fn module_id(&self) -> &str;
    fn channel(&self) -> &str;
    fn message_type(&self) -> &str;
    /// Decode `package` and schedule the callback on the subscribing unit.
    fn on_new_data(&self, package: &DataPackage);
}

pub type SubscriberCallback<T> = Arc<dyn Fn(ChannelData<T>) -> ModuleResult<()> + Send + Sync>;

pub struct Subscriber<T> {
    module_id: String,
    channel: String,
    mutator: Mutator<T>,
    callback: SubscriberCallback<T>,
    dispatcher: Arc<RunnableDispatcher>,
    failure_handler: FailureHandler,
    logger: Arc<Logger>,
}

impl<T: Send + Sync + 'static> Subscriber<T> {
    pub fn new(
        module_id: impl Into<String>,
        channel: impl Into<String>,
        mutator: Mutator<T>,
        callback: SubscriberCallback<T>,
        dispatcher: Arc<RunnableDispatcher>,
        failure_handler: FailureHandler,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            module_id: module_id.into(),
            channel: channel.into(),
            mutator,
            callback,
            dispatcher,
            failure_handler,
            logger,
        }
    }
}

impl<T: Send + Sync + 'static> AnySubscriber for Subscriber<T> {
    fn module_id(&self) -> &str {
        &self.module_id
    }

    fn channel(&self) -> &str {
        &self.channel
    }

    fn message_type(&self) -> &str {
        self.mutator.message_type()
    }

    fn on_new_data(&self, package: &DataPackage) {
        let value = match self.mutator.get_package_payload(package) {
            Ok(value) => value,
            Err(e) => {
                module_log(
                    &self.logger,
                    &self.module_id,
                    LogMessageSeverityLevel::Warning,
                    format!("dropping data on channel \"{}\": {}", self.channel, e),
                );
                return;
            }
        };

        let mut data = Some(ChannelData::from_unix_ms(
            value,
            package.unix_timestamp_ms,
            package.source_user_token.clone(),
        ));
        let callback = Arc::clone(&self.callback);
        let task = ScheduledRunnable::new(
            format!("channel:{}", self.channel),
            ScheduleDescription::now(),
            move || match data.take() {
                Some(data) => callback(data).map_err(anyhow::Error::from),
                None => Ok(()),
            },
        )
        .on_failure(Arc::clone(&self.failure_handler));

        self.dispatcher.add(task.into_shared());
    }
}
