// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The shared hand-off queue and the single thread that drains it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::{Result, RunOutcome, ScheduledRunnable, SchedulingError, TaskOrigin};

/// FIFO across all producers. Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct ExecutionQueue {
    tx: Sender<Arc<ScheduledRunnable>>,
    rx: Receiver<Arc<ScheduledRunnable>>,
    closed: Arc<AtomicBool>,
}

impl Default for ExecutionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionQueue {
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self {
            tx,
            rx,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enqueue a task. Never blocks.
    pub fn push(&self, task: Arc<ScheduledRunnable>) -> Result<()> {
        if self.is_closed() {
            return Err(SchedulingError::ChannelClosed(format!(
                "execution queue (task \"{}\")",
                task.name()
            )));
        }
        self.tx
            .send(task)
            .map_err(|_| SchedulingError::ChannelClosed("execution queue".to_string()))
    }

    pub fn pop_timeout(&self, timeout: Duration) -> Option<Arc<ScheduledRunnable>> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// The serialized execution thread.
///
/// Pulls tasks from an [`ExecutionQueue`] and runs them one at a time.
/// External repeating tasks are put back at the end of the queue after each
/// run. Stops when asked to or once the queue is closed and drained.
pub struct ExecutionWorker {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    executed: Arc<AtomicU64>,
    name: String,
}

impl ExecutionWorker {
    pub fn spawn(name: impl Into<String>, queue: ExecutionQueue, poll_interval: Duration) -> Result<Self> {
        let name = name.into();
        let shutdown = Arc::new(AtomicBool::new(false));
        let executed = Arc::new(AtomicU64::new(0));
        let shutdown_clone = Arc::clone(&shutdown);
        let executed_clone = Arc::clone(&executed);
        let name_clone = name.clone();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                debug!("[EXECUTION:{}] Drain loop started", name_clone);
                while !shutdown_clone.load(Ordering::Relaxed) {
                    match queue.rx.recv_timeout(poll_interval) {
                        Ok(task) => {
                            let outcome = task.run();
                            if outcome != RunOutcome::Skipped {
                                executed_clone.fetch_add(1, Ordering::Relaxed);
                            }
                            requeue_if_external_repeat(&queue, task);
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            if queue.is_closed() && queue.is_empty() {
                                break;
                            }
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("[EXECUTION:{}] Drain loop stopped", name_clone);
            })
            .map_err(|source| SchedulingError::ThreadSpawn {
                name: name.clone(),
                source,
            })?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
            executed,
            name,
        })
    }

    /// Number of tasks that actually ran (skipped tasks excluded).
    pub fn executed_count(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    /// Signal the worker to stop and wait for it to finish.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("[EXECUTION:{}] Drain thread panicked", self.name);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Relaxed)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ExecutionWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn requeue_if_external_repeat(queue: &ExecutionQueue, task: Arc<ScheduledRunnable>) {
    if task.origin() != TaskOrigin::External || !task.is_valid() || !task.does_repeat() {
        return;
    }
    task.update_execution_time();
    if let Err(e) = queue.push(task) {
        debug!("[EXECUTION] Dropping repeating task: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScheduleDescription;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_worker_runs_tasks_in_enqueue_order() {
        let queue = ExecutionQueue::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for i in 0..5 {
            let seen = Arc::clone(&seen);
            queue
                .push(
                    ScheduledRunnable::new(format!("t{}", i), ScheduleDescription::now(), move || {
                        seen.lock().push(i);
                        Ok(())
                    })
                    .into_shared(),
                )
                .unwrap();
        }

        let mut worker =
            ExecutionWorker::spawn("test-exec", queue.clone(), Duration::from_millis(10)).unwrap();
        assert!(wait_until(Duration::from_secs(2), || seen.lock().len() == 5));
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(worker.executed_count(), 5);

        worker.stop();
        assert!(!worker.is_running());
    }

    #[test]
    fn test_external_repeat_runs_until_invalidated() {
        let queue = ExecutionQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let task = ScheduledRunnable::new("pump", ScheduleDescription::immediate_indefinite(), move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .with_origin(TaskOrigin::External)
        .into_shared();
        queue.push(Arc::clone(&task)).unwrap();

        let mut worker =
            ExecutionWorker::spawn("test-pump", queue.clone(), Duration::from_millis(10)).unwrap();
        assert!(wait_until(Duration::from_secs(2), || counter.load(Ordering::SeqCst) >= 10));

        task.invalidate();
        thread::sleep(Duration::from_millis(50));
        let after_invalidate = counter.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(counter.load(Ordering::SeqCst), after_invalidate);
        assert!(queue.is_empty());

        worker.stop();
    }

    #[test]
    fn test_closed_queue_rejects_push_and_stops_worker() {
        let queue = ExecutionQueue::new();
        let worker =
            ExecutionWorker::spawn("test-close", queue.clone(), Duration::from_millis(10)).unwrap();
        queue.close();

        let task = ScheduledRunnable::new("late", ScheduleDescription::now(), || Ok(())).into_shared();
        assert!(queue.push(task).is_err());
        assert!(wait_until(Duration::from_secs(2), || !worker.is_running()));
    }
}
