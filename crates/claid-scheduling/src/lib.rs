// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # claid-scheduling
//!
//! Two-level execution model of the CLAID runtime:
//!
//! - every unit owns a [`RunnableDispatcher`], a timer loop on its own thread
//!   that keeps [`ScheduledRunnable`]s ordered by due time and hands due work
//!   to an [`ExecutionQueue`];
//! - a single [`ExecutionWorker`] drains that queue. It is the only thread
//!   that runs unit-authored code.
//!
//! The orchestrating thread may block on a unit's start/shutdown while the
//! worker keeps draining, so waiting on work never requires the waiter to
//! drain it.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod dispatcher;
mod error;
mod execution_queue;
mod runnable;
mod schedule;
mod thread_safe_channel;

pub use dispatcher::RunnableDispatcher;
pub use error::{Result, SchedulingError};
pub use execution_queue::{ExecutionQueue, ExecutionWorker};
pub use runnable::{FailureHandler, RunOutcome, ScheduledRunnable, TaskAction, TaskOrigin};
pub use schedule::ScheduleDescription;
pub use thread_safe_channel::ThreadSafeChannel;
