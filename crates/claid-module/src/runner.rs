// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Drives one unit instance through its lifecycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use claid_observability::Logger;
use claid_scheduling::{
    ExecutionQueue, FailureHandler, RunnableDispatcher, ScheduleDescription, ScheduledRunnable,
};
use claid_structures::LogMessageSeverityLevel;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

use crate::diagnostics::module_log;
use crate::{
    ChannelSubscriberPublisher, LifecycleState, Module, ModuleContext, ModuleError, ModuleResult,
    Properties,
};

/// Object-safe view of a unit, as held by the runtime manager.
pub trait ManagedModule: Send + Sync {
    fn id(&self) -> &str;

    fn module_class(&self) -> &str;

    /// Run `initialize` on the execution thread and block until it finished.
    fn start(
        &self,
        registry: Arc<ChannelSubscriberPublisher>,
        properties: Properties,
        queue: ExecutionQueue,
    ) -> ModuleResult<()>;

    /// Run `terminate` on the execution thread, block until it finished and
    /// stop the unit's dispatcher.
    fn shutdown(&self) -> ModuleResult<()>;

    fn notify_connected_to_remote_server(&self);

    fn notify_disconnected_from_remote_server(&self);

    fn state(&self) -> LifecycleState;

    /// True once unit code failed without catching the error.
    fn is_disabled(&self) -> bool;
}

#[derive(Default)]
struct Lifecycle {
    state: LifecycleState,
    init_failure: Option<String>,
}

/// How long `start` and `shutdown` wait for `initialize` and `terminate`
/// to complete on the execution thread.
pub const DEFAULT_LIFECYCLE_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) type UnitTaskFn<M> =
    Box<dyn FnMut(&mut M, &ModuleContext<M>) -> ModuleResult<()> + Send + 'static>;

pub(crate) struct ModuleShared<M> {
    pub(crate) id: String,
    pub(crate) module_class: String,
    pub(crate) logger: Arc<Logger>,
    pub(crate) instance: Mutex<M>,
    lifecycle: Mutex<Lifecycle>,
    lifecycle_changed: Condvar,
    disabled: AtomicBool,
    dispatcher: Mutex<Option<Arc<RunnableDispatcher>>>,
    pub(crate) timers: Mutex<HashMap<String, Arc<ScheduledRunnable>>>,
    registry: Mutex<Option<Arc<ChannelSubscriberPublisher>>>,
}

impl<M: Module> ModuleShared<M> {
    pub(crate) fn state(&self) -> LifecycleState {
        self.lifecycle.lock().state
    }

    fn set_state(&self, state: LifecycleState) {
        self.lifecycle.lock().state = state;
        self.lifecycle_changed.notify_all();
    }

    /// Move from `from` to `to`; false if another path changed the state.
    fn advance(&self, from: LifecycleState, to: LifecycleState) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != from {
            return false;
        }
        lifecycle.state = to;
        drop(lifecycle);
        self.lifecycle_changed.notify_all();
        true
    }

    /// Mark initialization as failed; `start` reports it once `initialize`
    /// returns.
    pub(crate) fn record_init_failure(&self, reason: String) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.init_failure.is_none() {
            lifecycle.init_failure = Some(reason);
        }
    }

    pub(crate) fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    pub(crate) fn dispatcher(&self) -> Option<Arc<RunnableDispatcher>> {
        self.dispatcher.lock().clone()
    }

    pub(crate) fn registry(&self) -> Option<Arc<ChannelSubscriberPublisher>> {
        self.registry.lock().clone()
    }

    pub(crate) fn log(&self, level: LogMessageSeverityLevel, message: impl AsRef<str>) {
        module_log(&self.logger, &self.id, level, message);
    }

    pub(crate) fn invalidate_all_timers(&self) {
        for (_, task) in self.timers.lock().drain() {
            task.invalidate();
        }
    }

    /// Uncaught failure in unit code: the unit is disabled, the rest of the
    /// runtime carries on.
    fn fail(&self, task_name: &str, message: &str) {
        self.disabled.store(true, Ordering::Release);
        self.invalidate_all_timers();
        self.log(
            LogMessageSeverityLevel::Error,
            format!(
                "disabled after uncaught error in \"{}\": {}",
                task_name, message
            ),
        );

        let mut lifecycle = self.lifecycle.lock();
        match lifecycle.state {
            LifecycleState::Initializing => {
                lifecycle.init_failure = Some(message.to_string());
                lifecycle.state = LifecycleState::Stopped;
            }
            LifecycleState::Terminating => lifecycle.state = LifecycleState::Stopped,
            _ => {}
        }
        drop(lifecycle);
        self.lifecycle_changed.notify_all();
    }

    pub(crate) fn failure_handler(self: &Arc<Self>) -> FailureHandler {
        let weak = Arc::downgrade(self);
        Arc::new(move |task_name: &str, message: &str| {
            if let Some(shared) = weak.upgrade() {
                shared.fail(task_name, message);
            }
        })
    }

    /// Task that runs `f` against the unit instance, unless the unit was
    /// disabled in the meantime.
    pub(crate) fn make_task(
        self: &Arc<Self>,
        name: &str,
        schedule: ScheduleDescription,
        mut f: UnitTaskFn<M>,
    ) -> Arc<ScheduledRunnable> {
        let weak: Weak<Self> = Arc::downgrade(self);
        ScheduledRunnable::new(name, schedule, move || {
            let Some(shared) = weak.upgrade() else {
                return Ok(());
            };
            if shared.is_disabled() {
                return Ok(());
            }
            let ctx = ModuleContext::new(Arc::clone(&shared));
            let mut instance = shared.instance.lock();
            f(&mut instance, &ctx).map_err(anyhow::Error::from)
        })
        .on_failure(self.failure_handler())
        .into_shared()
    }

    pub(crate) fn schedule(
        self: &Arc<Self>,
        name: &str,
        schedule: ScheduleDescription,
        f: UnitTaskFn<M>,
    ) -> ModuleResult<Arc<ScheduledRunnable>> {
        let dispatcher = self
            .dispatcher()
            .ok_or_else(|| ModuleError::usage(format!("module \"{}\" is not started", self.id)))?;
        let task = self.make_task(name, schedule, f);
        dispatcher.add(Arc::clone(&task));
        Ok(task)
    }
}

/// Owns one unit instance and implements [`ManagedModule`] for it.
pub struct ModuleRunner<M: Module> {
    shared: Arc<ModuleShared<M>>,
    lifecycle_timeout: Duration,
}

impl<M: Module> ModuleRunner<M> {
    pub fn new(
        id: impl Into<String>,
        module_class: impl Into<String>,
        instance: M,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            shared: Arc::new(ModuleShared {
                id: id.into(),
                module_class: module_class.into(),
                logger,
                instance: Mutex::new(instance),
                lifecycle: Mutex::new(Lifecycle::default()),
                lifecycle_changed: Condvar::new(),
                disabled: AtomicBool::new(false),
                dispatcher: Mutex::new(None),
                timers: Mutex::new(HashMap::new()),
                registry: Mutex::new(None),
            }),
            lifecycle_timeout: DEFAULT_LIFECYCLE_TIMEOUT,
        }
    }

    pub fn with_lifecycle_timeout(mut self, timeout: Duration) -> Self {
        self.lifecycle_timeout = timeout;
        self
    }

    /// Read the unit instance from outside the execution thread.
    pub fn with_instance<R>(&self, f: impl FnOnce(&M) -> R) -> R {
        f(&self.shared.instance.lock())
    }

    pub fn active_timers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.timers.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn stop_dispatcher(&self) {
        if let Some(dispatcher) = self.shared.dispatcher.lock().take() {
            dispatcher.stop();
        }
    }

    /// Block while the unit is in `state`. `Err` carries the reason when the
    /// transition failed or did not happen within the lifecycle timeout.
    fn wait_while(&self, state: LifecycleState) -> Result<(), String> {
        let deadline = Instant::now() + self.lifecycle_timeout;
        let mut lifecycle = self.shared.lifecycle.lock();
        while lifecycle.state == state {
            if self
                .shared
                .lifecycle_changed
                .wait_until(&mut lifecycle, deadline)
                .timed_out()
                && lifecycle.state == state
            {
                return Err(format!(
                    "{:?} did not complete within {:?}",
                    state, self.lifecycle_timeout
                ));
            }
        }
        match lifecycle.init_failure.take() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }
}

impl<M: Module> ManagedModule for ModuleRunner<M> {
    fn id(&self) -> &str {
        &self.shared.id
    }

    fn module_class(&self) -> &str {
        &self.shared.module_class
    }

    fn start(
        &self,
        registry: Arc<ChannelSubscriberPublisher>,
        properties: Properties,
        queue: ExecutionQueue,
    ) -> ModuleResult<()> {
        {
            let mut lifecycle = self.shared.lifecycle.lock();
            if lifecycle.state != LifecycleState::Stopped {
                drop(lifecycle);
                self.shared
                    .log(LogMessageSeverityLevel::Fatal, "initialize called twice");
                return Err(ModuleError::fatal(&self.shared.id, "initialize called twice"));
            }
            lifecycle.state = LifecycleState::Initializing;
            lifecycle.init_failure = None;
        }

        self.shared.disabled.store(false, Ordering::Release);
        *self.shared.registry.lock() = Some(registry);

        let dispatcher = Arc::new(RunnableDispatcher::new(self.shared.id.clone(), queue));
        if let Err(e) = dispatcher.start() {
            self.shared.set_state(LifecycleState::Stopped);
            return Err(e.into());
        }
        *self.shared.dispatcher.lock() = Some(Arc::clone(&dispatcher));

        let weak = Arc::downgrade(&self.shared);
        let init = ScheduledRunnable::new("initialize", ScheduleDescription::now(), move || {
            let Some(shared) = weak.upgrade() else {
                return Ok(());
            };
            if shared.state() != LifecycleState::Initializing {
                return Ok(());
            }
            let ctx = ModuleContext::new(Arc::clone(&shared));
            shared.instance.lock().initialize(&ctx, &properties)?;

            if properties.was_any_property_missing() {
                shared.log(
                    LogMessageSeverityLevel::Warning,
                    format!("missing properties: {}", properties.missing_properties().join(", ")),
                );
            }
            shared.advance(LifecycleState::Initializing, LifecycleState::Initialized);
            Ok(())
        })
        .on_failure(self.shared.failure_handler())
        .into_shared();
        dispatcher.add(Arc::clone(&init));

        let outcome = self.wait_while(LifecycleState::Initializing);
        *self.shared.registry.lock() = None;

        if let Err(reason) = outcome {
            init.invalidate();
            self.shared.log(
                LogMessageSeverityLevel::Error,
                format!("failed to start: {}", reason),
            );
            self.shared.invalidate_all_timers();
            self.shared.set_state(LifecycleState::Stopped);
            self.stop_dispatcher();
            return Err(ModuleError::fatal(&self.shared.id, reason));
        }
        debug!("[MODULE] {} initialized", self.shared.id);
        Ok(())
    }

    fn shutdown(&self) -> ModuleResult<()> {
        {
            let mut lifecycle = self.shared.lifecycle.lock();
            match lifecycle.state {
                LifecycleState::Initialized => lifecycle.state = LifecycleState::Terminating,
                LifecycleState::Stopped => {
                    drop(lifecycle);
                    self.stop_dispatcher();
                    return Ok(());
                }
                other => {
                    return Err(ModuleError::usage(format!(
                        "cannot shut down module \"{}\" while {:?}",
                        self.shared.id, other
                    )))
                }
            }
        }

        let Some(dispatcher) = self.shared.dispatcher() else {
            self.shared.set_state(LifecycleState::Stopped);
            return Ok(());
        };

        let weak = Arc::downgrade(&self.shared);
        let terminate = ScheduledRunnable::new("terminate", ScheduleDescription::now(), move || {
            let Some(shared) = weak.upgrade() else {
                return Ok(());
            };
            shared.invalidate_all_timers();
            if !shared.is_disabled() {
                let ctx = ModuleContext::new(Arc::clone(&shared));
                if let Err(e) = shared.instance.lock().terminate(&ctx) {
                    shared.log(
                        LogMessageSeverityLevel::Error,
                        format!("terminate failed: {}", e),
                    );
                }
            }
            shared.set_state(LifecycleState::Stopped);
            Ok(())
        })
        .stopping_dispatcher()
        .on_failure(self.shared.failure_handler())
        .into_shared();
        dispatcher.add(Arc::clone(&terminate));

        let outcome = self.wait_while(LifecycleState::Terminating);
        if let Err(reason) = outcome {
            terminate.invalidate();
            self.shared.invalidate_all_timers();
            self.shared.advance(LifecycleState::Terminating, LifecycleState::Stopped);
            self.stop_dispatcher();
            error!("[MODULE] {} did not terminate cleanly: {}", self.shared.id, reason);
            return Err(ModuleError::fatal(&self.shared.id, reason));
        }
        self.stop_dispatcher();
        debug!("[MODULE] {} terminated", self.shared.id);
        Ok(())
    }

    fn notify_connected_to_remote_server(&self) {
        if self.shared.state() != LifecycleState::Initialized {
            return;
        }
        let result = self.shared.schedule(
            "on_connected_to_remote_server",
            ScheduleDescription::now(),
            Box::new(|module: &mut M, ctx: &ModuleContext<M>| {
                module.on_connected_to_remote_server(ctx)
            }),
        );
        if let Err(e) = result {
            self.shared.log(LogMessageSeverityLevel::Warning, e.to_string());
        }
    }

    fn notify_disconnected_from_remote_server(&self) {
        if self.shared.state() != LifecycleState::Initialized {
            return;
        }
        let result = self.shared.schedule(
            "on_disconnected_from_remote_server",
            ScheduleDescription::now(),
            Box::new(|module: &mut M, ctx: &ModuleContext<M>| {
                module.on_disconnected_from_remote_server(ctx)
            }),
        );
        if let Err(e) = result {
            self.shared.log(LogMessageSeverityLevel::Warning, e.to_string());
        }
    }

    fn state(&self) -> LifecycleState {
        self.shared.state()
    }

    fn is_disabled(&self) -> bool {
        self.shared.is_disabled()
    }
}
