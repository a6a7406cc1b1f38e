// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Utc;
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, trace};

use crate::{ExecutionQueue, Result, ScheduledRunnable, SchedulingError};

#[derive(Default)]
struct DispatcherState {
    /// Sorted ascending by due time; equal due times keep insertion order.
    tasks: Vec<Arc<ScheduledRunnable>>,
    reschedule_required: bool,
    stopped: bool,
}

impl DispatcherState {
    fn insert_sorted(&mut self, task: Arc<ScheduledRunnable>) {
        let due = task.execution_time();
        let index = self.tasks.partition_point(|t| t.execution_time() <= due);
        self.tasks.insert(index, task);
    }
}

struct DispatcherShared {
    name: String,
    state: Mutex<DispatcherState>,
    wakeup: Condvar,
    target: ExecutionQueue,
}

/// Timer loop of one unit.
///
/// Keeps tasks ordered by due time and, when they become due, hands them to
/// the target [`ExecutionQueue`] instead of running them. Repeating tasks are
/// reinserted under the same lock that popped them, so a task is never
/// handed off twice for the same due time.
pub struct RunnableDispatcher {
    shared: Arc<DispatcherShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RunnableDispatcher {
    pub fn new(name: impl Into<String>, target: ExecutionQueue) -> Self {
        Self {
            shared: Arc::new(DispatcherShared {
                name: name.into(),
                state: Mutex::new(DispatcherState::default()),
                wakeup: Condvar::new(),
                target,
            }),
            handle: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Queue `task` and wake the loop so it can recompute its sleep.
    pub fn add(&self, task: Arc<ScheduledRunnable>) {
        let mut state = self.shared.state.lock();
        trace!(
            "[SCHEDULER:{}] Adding task \"{}\" due at {}",
            self.shared.name,
            task.name(),
            task.execution_time()
        );
        state.insert_sorted(task);
        state.reschedule_required = true;
        drop(state);
        self.shared.wakeup.notify_one();
    }

    /// Remove every queued task with the given name. The tasks are also
    /// invalidated in case they were already handed off.
    pub fn remove(&self, name: &str) -> usize {
        let mut state = self.shared.state.lock();
        let before = state.tasks.len();
        state.tasks.retain(|task| {
            if task.name() == name {
                task.invalidate();
                false
            } else {
                true
            }
        });
        before - state.tasks.len()
    }

    pub fn pending(&self) -> usize {
        self.shared.state.lock().tasks.len()
    }

    pub fn start(&self) -> Result<()> {
        let mut handle = self.handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(SchedulingError::AlreadyRunning(self.shared.name.clone()));
        }

        self.shared.state.lock().stopped = false;
        let shared = Arc::clone(&self.shared);
        let thread_name = format!("claid-sched-{}", self.shared.name);
        let spawned = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || run_loop(&shared))
            .map_err(|source| SchedulingError::ThreadSpawn {
                name: thread_name,
                source,
            })?;
        *handle = Some(spawned);
        debug!("[SCHEDULER:{}] Started", self.shared.name);
        Ok(())
    }

    /// Stop the loop and wait for its thread. Queued tasks stay queued.
    pub fn stop(&self) {
        self.shared.state.lock().stopped = true;
        self.shared.wakeup.notify_all();

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                error!("[SCHEDULER:{}] Timer thread panicked", self.shared.name);
            }
        }
        debug!("[SCHEDULER:{}] Stopped", self.shared.name);
    }

    pub fn is_running(&self) -> bool {
        let stopped = self.shared.state.lock().stopped;
        !stopped && self.handle.lock().as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RunnableDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(shared: &DispatcherShared) {
    let mut state = shared.state.lock();
    loop {
        if state.stopped {
            break;
        }

        match state.tasks.first().map(|t| t.execution_time()) {
            None => {
                while !state.reschedule_required && !state.stopped {
                    shared.wakeup.wait(&mut state);
                }
            }
            Some(due) => {
                let now = Utc::now();
                if due > now && !state.reschedule_required {
                    let sleep = (due - now).to_std().unwrap_or_default();
                    shared.wakeup.wait_for(&mut state, sleep);
                }
            }
        }
        state.reschedule_required = false;
        if state.stopped {
            break;
        }

        let now = Utc::now();
        let due_count = state.tasks.partition_point(|t| t.execution_time() <= now);
        let due: Vec<_> = state.tasks.drain(..due_count).collect();

        for task in due {
            if !task.is_valid() {
                continue;
            }
            if let Err(e) = shared.target.push(Arc::clone(&task)) {
                error!(
                    "[SCHEDULER:{}] Could not hand off task \"{}\": {}",
                    shared.name,
                    task.name(),
                    e
                );
                // The handler takes unit locks that are held around `add`.
                MutexGuard::unlocked(&mut state, || task.report_handoff_failure(&e.to_string()));
                continue;
            }
            if task.stops_dispatcher() {
                state.stopped = true;
                break;
            }
            if task.does_repeat() {
                task.update_execution_time();
                state.insert_sorted(task);
            }
        }
    }
    debug!("[SCHEDULER:{}] Timer loop exited", shared.name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScheduleDescription;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn noop(name: &str, schedule: ScheduleDescription) -> Arc<ScheduledRunnable> {
        ScheduledRunnable::new(name, schedule, || Ok(())).into_shared()
    }

    #[test]
    fn test_tasks_are_handed_off_in_due_order() {
        let queue = ExecutionQueue::new();
        let dispatcher = RunnableDispatcher::new("order", queue.clone());
        let base = Utc::now() + ChronoDuration::milliseconds(50);

        for (name, offset) in [("c", 60), ("a", 0), ("d", 90), ("b", 30)] {
            dispatcher.add(noop(
                name,
                ScheduleDescription::once(base + ChronoDuration::milliseconds(offset)),
            ));
        }
        dispatcher.start().unwrap();

        let names: Vec<String> = (0..4)
            .filter_map(|_| queue.pop_timeout(Duration::from_secs(2)))
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        dispatcher.stop();
    }

    #[test]
    fn test_invalidated_task_is_never_handed_off() {
        let queue = ExecutionQueue::new();
        let dispatcher = RunnableDispatcher::new("invalid", queue.clone());
        dispatcher.start().unwrap();

        let task = noop(
            "cancelled",
            ScheduleDescription::once(Utc::now() + ChronoDuration::milliseconds(40)),
        );
        dispatcher.add(Arc::clone(&task));
        task.invalidate();

        assert!(queue.pop_timeout(Duration::from_millis(150)).is_none());
        assert_eq!(dispatcher.pending(), 0);
        dispatcher.stop();
    }

    #[test]
    fn test_closed_queue_reports_handoff_failure() {
        let queue = ExecutionQueue::new();
        queue.close();
        let dispatcher = RunnableDispatcher::new("closed", queue.clone());
        dispatcher.start().unwrap();

        let failures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&failures);
        let task = ScheduledRunnable::new("initialize", ScheduleDescription::now(), || Ok(()))
            .on_failure(Arc::new(move |_: &str, _: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .into_shared();
        dispatcher.add(Arc::clone(&task));

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while failures.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(failures.load(Ordering::SeqCst), 1);
        assert!(!task.is_valid());
        assert!(queue.pop_timeout(Duration::from_millis(20)).is_none());
        dispatcher.stop();
    }

    #[test]
    fn test_repeating_task_is_reinserted() {
        let queue = ExecutionQueue::new();
        let dispatcher = RunnableDispatcher::new("repeat", queue.clone());
        let start = Utc::now();
        let task = noop(
            "tick",
            ScheduleDescription::fixed_interval(start, ChronoDuration::milliseconds(20)),
        );
        dispatcher.add(Arc::clone(&task));
        dispatcher.start().unwrap();

        for _ in 0..3 {
            assert!(queue.pop_timeout(Duration::from_secs(2)).is_some());
        }
        dispatcher.stop();
        assert!(task.execution_time() >= start + ChronoDuration::milliseconds(60));
        assert_eq!(dispatcher.pending(), 1);
    }

    #[test]
    fn test_stop_after_runnable_stops_the_loop() {
        let queue = ExecutionQueue::new();
        let dispatcher = RunnableDispatcher::new("terminal", queue.clone());
        dispatcher.start().unwrap();

        dispatcher.add(
            ScheduledRunnable::new("terminate", ScheduleDescription::now(), || Ok(()))
                .stopping_dispatcher()
                .into_shared(),
        );
        assert!(queue.pop_timeout(Duration::from_secs(2)).is_some());

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while dispatcher.is_running() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!dispatcher.is_running());

        dispatcher.add(noop("after", ScheduleDescription::now()));
        assert!(queue.pop_timeout(Duration::from_millis(100)).is_none());
        dispatcher.stop();
    }

    #[test]
    fn test_double_start_is_rejected() {
        let dispatcher = RunnableDispatcher::new("twice", ExecutionQueue::new());
        dispatcher.start().unwrap();
        assert!(matches!(
            dispatcher.start(),
            Err(SchedulingError::AlreadyRunning(_))
        ));
        dispatcher.stop();
    }
}
