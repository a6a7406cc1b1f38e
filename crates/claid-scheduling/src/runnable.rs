// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::error;

use crate::ScheduleDescription;

/// Work wrapped by a [`ScheduledRunnable`]. Repeating tasks call it more than
/// once, hence `FnMut`.
pub type TaskAction = Box<dyn FnMut() -> anyhow::Result<()> + Send>;

/// Called on the execution thread when a task that does not catch its own
/// errors fails. Receives the task name and the failure text.
pub type FailureHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Who queued the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskOrigin {
    /// Handed over by a unit's dispatcher, which owns rescheduling.
    #[default]
    Dispatcher,
    /// Put straight onto the execution queue; the drain loop re-enqueues it
    /// when it repeats.
    External,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Invalidated before it got to run.
    Skipped,
    Completed,
    /// Failed and the failure was stored on the task.
    Caught(String),
    /// Failed and the failure was passed to the failure handler.
    Failed(String),
}

/// A unit of deferred or repeated work.
///
/// Once [`invalidate`](Self::invalidate)d a task never runs again, including
/// when it is already sitting in the execution queue.
pub struct ScheduledRunnable {
    name: String,
    action: Mutex<TaskAction>,
    schedule: Mutex<ScheduleDescription>,
    valid: AtomicBool,
    executed: AtomicBool,
    catch_exceptions: bool,
    stop_dispatcher_after_this_runnable: bool,
    origin: TaskOrigin,
    exception: Mutex<Option<String>>,
    failure_handler: Option<FailureHandler>,
}

impl std::fmt::Debug for ScheduledRunnable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledRunnable")
            .field("name", &self.name)
            .field("schedule", &*self.schedule.lock())
            .field("valid", &self.is_valid())
            .field("executed", &self.was_executed())
            .field("origin", &self.origin)
            .finish()
    }
}

impl ScheduledRunnable {
    pub fn new(
        name: impl Into<String>,
        schedule: ScheduleDescription,
        action: impl FnMut() -> anyhow::Result<()> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            action: Mutex::new(Box::new(action)),
            schedule: Mutex::new(schedule),
            valid: AtomicBool::new(true),
            executed: AtomicBool::new(false),
            catch_exceptions: false,
            stop_dispatcher_after_this_runnable: false,
            origin: TaskOrigin::Dispatcher,
            exception: Mutex::new(None),
            failure_handler: None,
        }
    }

    /// Store failures on the task instead of reporting them.
    pub fn catching_exceptions(mut self) -> Self {
        self.catch_exceptions = true;
        self
    }

    pub fn stopping_dispatcher(mut self) -> Self {
        self.stop_dispatcher_after_this_runnable = true;
        self
    }

    pub fn with_origin(mut self, origin: TaskOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn on_failure(mut self, handler: FailureHandler) -> Self {
        self.failure_handler = Some(handler);
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> TaskOrigin {
        self.origin
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    pub fn was_executed(&self) -> bool {
        self.executed.load(Ordering::Acquire)
    }

    pub fn stops_dispatcher(&self) -> bool {
        self.stop_dispatcher_after_this_runnable
    }

    pub fn execution_time(&self) -> DateTime<Utc> {
        self.schedule.lock().execution_time()
    }

    pub fn does_repeat(&self) -> bool {
        self.schedule.lock().does_repeat()
    }

    pub fn update_execution_time(&self) {
        self.schedule.lock().update_execution_time();
    }

    pub fn schedule(&self) -> ScheduleDescription {
        *self.schedule.lock()
    }

    pub fn has_exception(&self) -> bool {
        self.exception.lock().is_some()
    }

    pub fn exception(&self) -> Option<String> {
        self.exception.lock().clone()
    }

    fn set_exception(&self, message: String) {
        *self.exception.lock() = Some(message);
    }

    /// The task could not reach the execution thread. It is invalidated and
    /// the failure goes where a failing run would have gone.
    pub fn report_handoff_failure(&self, reason: &str) {
        self.invalidate();
        let failure = format!("could not be handed to the execution thread: {}", reason);
        if self.catch_exceptions {
            self.set_exception(failure);
            return;
        }
        match &self.failure_handler {
            Some(handler) => handler(&self.name, &failure),
            None => error!("[SCHEDULER] Task \"{}\" {}", self.name, failure),
        }
    }

    /// Run the wrapped action on the calling thread.
    ///
    /// Errors and panics never escape: they are stored on the task when it
    /// catches exceptions, otherwise handed to the failure handler.
    pub fn run(&self) -> RunOutcome {
        if !self.is_valid() {
            return RunOutcome::Skipped;
        }

        let result = {
            let mut action = self.action.lock();
            catch_unwind(AssertUnwindSafe(|| (*action)()))
        };
        self.executed.store(true, Ordering::Release);

        let failure = match result {
            Ok(Ok(())) => return RunOutcome::Completed,
            Ok(Err(e)) => format!("{:#}", e),
            Err(panic) => panic_message(panic.as_ref()),
        };

        if self.catch_exceptions {
            self.set_exception(failure.clone());
            return RunOutcome::Caught(failure);
        }

        match &self.failure_handler {
            Some(handler) => handler(&self.name, &failure),
            None => error!(
                "[SCHEDULER] Task \"{}\" failed without a failure handler: {}",
                self.name, failure
            ),
        }
        RunOutcome::Failed(failure)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_handoff_failure_reaches_failure_handler() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reported);
        let task = ScheduledRunnable::new("init", ScheduleDescription::now(), || Ok(()))
            .on_failure(Arc::new(move |name: &str, message: &str| {
                sink.lock().push(format!("{}: {}", name, message));
            }));

        task.report_handoff_failure("queue closed");
        assert!(!task.is_valid());
        assert_eq!(task.run(), RunOutcome::Skipped);
        let reported = reported.lock();
        assert_eq!(reported.len(), 1);
        assert!(reported[0].starts_with("init: could not be handed"));
        assert!(reported[0].ends_with("queue closed"));
    }

    #[test]
    fn test_invalidated_task_is_skipped() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let task = ScheduledRunnable::new("t", ScheduleDescription::now(), move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        task.invalidate();
        assert_eq!(task.run(), RunOutcome::Skipped);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!task.was_executed());
    }

    #[test]
    fn test_caught_error_is_stored_on_task() {
        let task = ScheduledRunnable::new("t", ScheduleDescription::now(), || {
            anyhow::bail!("sensor unavailable")
        })
        .catching_exceptions();

        assert!(matches!(task.run(), RunOutcome::Caught(_)));
        assert!(task.was_executed());
        assert_eq!(task.exception().as_deref(), Some("sensor unavailable"));
    }

    #[test]
    fn test_panic_goes_to_failure_handler() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let r = Arc::clone(&reported);
        let task = ScheduledRunnable::new("boom", ScheduleDescription::now(), || {
            panic!("bad state")
        })
        .on_failure(Arc::new(move |name: &str, message: &str| {
            r.lock().push(format!("{}: {}", name, message));
        }));

        assert!(matches!(task.run(), RunOutcome::Failed(_)));
        assert!(!task.has_exception());
        assert_eq!(reported.lock().as_slice(), ["boom: panic: bad state"]);
    }
}
