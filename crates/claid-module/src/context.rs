// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The handle a unit uses to declare channels, manage timers and log.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use claid_observability::Logger;
use claid_scheduling::ScheduleDescription;
use claid_serialization::ChannelValue;
use claid_structures::LogMessageSeverityLevel;

use crate::runner::ModuleShared;
use crate::{
    Channel, ChannelData, LifecycleState, Module, ModuleError, ModuleResult, Subscriber,
    SubscriberCallback,
};

/// Passed to every hook of a unit. Borrowed only for the duration of the
/// hook.
pub struct ModuleContext<M: Module> {
    shared: Arc<ModuleShared<M>>,
}

impl<M: Module> ModuleContext<M> {
    pub(crate) fn new(shared: Arc<ModuleShared<M>>) -> Self {
        Self { shared }
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn module_class(&self) -> &str {
        &self.shared.module_class
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.shared.logger
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.state()
    }

    fn is_initializing(&self) -> bool {
        self.shared.state() == LifecycleState::Initializing
    }

    /// Declare an output channel. Outside of `initialize` this reports an
    /// error and returns an invalid channel.
    pub fn publish<T: ChannelValue>(&self, channel: &str, example: T) -> Channel<T> {
        let invalid = || Channel::invalid(channel, self.id(), Arc::clone(&self.shared.logger));

        if !self.is_initializing() {
            self.module_error(format!(
                "cannot publish channel \"{}\". Publishing is only allowed during initialization (i.e., in the initialize function).",
                channel
            ));
            return invalid();
        }
        let Some(registry) = self.shared.registry() else {
            return invalid();
        };

        match registry.publish(&example, self.id(), channel) {
            Ok(publisher) => Channel::writable(
                channel,
                self.id(),
                publisher,
                Arc::clone(&self.shared.logger),
            ),
            Err(e) => {
                self.report_declaration_error(channel, e);
                invalid()
            }
        }
    }

    /// Declare an input channel. `callback` runs on the execution thread for
    /// every package delivered on `channel`.
    pub fn subscribe<T, F>(&self, channel: &str, example: T, callback: F) -> Channel<T>
    where
        T: ChannelValue,
        F: Fn(&mut M, &ModuleContext<M>, ChannelData<T>) -> ModuleResult<()> + Send + Sync + 'static,
    {
        let invalid = || Channel::invalid(channel, self.id(), Arc::clone(&self.shared.logger));

        if !self.is_initializing() {
            self.module_error(format!(
                "cannot subscribe channel \"{}\". Subscribing is only allowed during initialization (i.e., in the initialize function).",
                channel
            ));
            return invalid();
        }
        let (Some(registry), Some(dispatcher)) = (self.shared.registry(), self.shared.dispatcher())
        else {
            return invalid();
        };

        let mutator = match registry.type_mapping().mutator_for(&example) {
            Ok(mutator) => mutator,
            Err(e) => {
                self.report_declaration_error(channel, e.into());
                return invalid();
            }
        };

        let weak = Arc::downgrade(&self.shared);
        let bound: SubscriberCallback<T> = Arc::new(move |data: ChannelData<T>| {
            let Some(shared) = weak.upgrade() else {
                return Ok(());
            };
            if shared.is_disabled() {
                return Ok(());
            }
            let ctx = ModuleContext::new(Arc::clone(&shared));
            let mut instance = shared.instance.lock();
            callback(&mut instance, &ctx, data)
        });

        let subscriber = Arc::new(Subscriber::new(
            self.id(),
            channel,
            mutator.clone(),
            bound,
            dispatcher,
            self.shared.failure_handler(),
            Arc::clone(&self.shared.logger),
        ));

        match registry.subscribe(&example, self.id(), channel, &mutator, subscriber) {
            Ok(()) => Channel::readable(channel, self.id(), Arc::clone(&self.shared.logger)),
            Err(e) => {
                self.report_declaration_error(channel, e);
                invalid()
            }
        }
    }

    /// Codec failures make the unit unusable; duplicates are plain misuse.
    fn report_declaration_error(&self, channel: &str, error: ModuleError) {
        match error {
            ModuleError::Codec(e) => {
                let reason = format!("channel \"{}\": {}", channel, e);
                self.module_fatal(&reason);
                self.shared.record_init_failure(reason);
            }
            other => self.module_error(other.to_string()),
        }
    }

    /// Run `function` every `interval`, first after one interval has passed.
    pub fn register_periodic_function<F>(
        &self,
        name: &str,
        interval: Duration,
        function: F,
    ) -> ModuleResult<()>
    where
        F: FnMut(&mut M, &ModuleContext<M>) -> ModuleResult<()> + Send + 'static,
    {
        let start = Utc::now() + chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::zero());
        self.register_periodic_function_with_start_time(name, interval, start, function)
    }

    pub fn register_periodic_function_with_start_time<F>(
        &self,
        name: &str,
        interval: Duration,
        start: DateTime<Utc>,
        function: F,
    ) -> ModuleResult<()>
    where
        F: FnMut(&mut M, &ModuleContext<M>) -> ModuleResult<()> + Send + 'static,
    {
        if interval.is_zero() {
            return Err(self.usage_error(format!(
                "cannot register periodic function \"{}\" with an interval of 0",
                name
            )));
        }
        let interval = chrono::Duration::from_std(interval).map_err(|e| {
            self.usage_error(format!("invalid interval for \"{}\": {}", name, e))
        })?;

        let mut timers = self.shared.timers.lock();
        if timers.contains_key(name) {
            return Err(self.usage_error(format!(
                "tried to register function with name \"{}\", but a periodic function with the same name was already registered before",
                name
            )));
        }
        let task = self.shared.schedule(
            name,
            ScheduleDescription::fixed_interval(start, interval),
            Box::new(function),
        )?;
        timers.insert(name.to_string(), task);
        Ok(())
    }

    /// Run `function` once at `at`. An existing timer of the same name is
    /// replaced.
    pub fn register_scheduled_function<F>(
        &self,
        name: &str,
        at: DateTime<Utc>,
        function: F,
    ) -> ModuleResult<()>
    where
        F: FnMut(&mut M, &ModuleContext<M>) -> ModuleResult<()> + Send + 'static,
    {
        if at < Utc::now() {
            self.module_warning(format!(
                "scheduled function \"{}\" has an execution time in the past, running it now",
                name
            ));
        }

        let mut timers = self.shared.timers.lock();
        if let Some(previous) = timers.remove(name) {
            previous.invalidate();
        }
        let task = self
            .shared
            .schedule(name, ScheduleDescription::once(at), Box::new(function))?;
        timers.insert(name.to_string(), task);
        Ok(())
    }

    pub fn unregister_periodic_function(&self, name: &str) -> ModuleResult<()> {
        match self.shared.timers.lock().remove(name) {
            Some(task) => {
                task.invalidate();
                Ok(())
            }
            None => Err(self.usage_error(format!(
                "cannot unregister periodic function \"{}\": no function with that name was registered",
                name
            ))),
        }
    }

    pub fn unregister_all_periodic_functions(&self) {
        self.shared.invalidate_all_timers();
    }

    fn usage_error(&self, message: String) -> ModuleError {
        self.module_error(&message);
        ModuleError::usage(message)
    }

    pub fn module_debug(&self, message: impl AsRef<str>) {
        self.shared.log(LogMessageSeverityLevel::DebugVerbose, message);
    }

    pub fn module_info(&self, message: impl AsRef<str>) {
        self.shared.log(LogMessageSeverityLevel::Info, message);
    }

    pub fn module_warning(&self, message: impl AsRef<str>) {
        self.shared.log(LogMessageSeverityLevel::Warning, message);
    }

    pub fn module_error(&self, message: impl AsRef<str>) {
        self.shared.log(LogMessageSeverityLevel::Error, message);
    }

    pub fn module_fatal(&self, message: impl AsRef<str>) {
        self.shared.log(LogMessageSeverityLevel::Fatal, message);
    }
}
