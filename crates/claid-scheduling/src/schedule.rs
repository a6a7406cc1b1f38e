// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Duration, Utc};

/// When a [`ScheduledRunnable`](crate::ScheduledRunnable) is due, and whether
/// it comes back after running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDescription {
    /// Due at `at`, never repeats.
    Once { at: DateTime<Utc> },
    /// Due at `next`; afterwards every `interval`, counted from the planned
    /// time so execution latency does not accumulate.
    FixedIntervalRepeat {
        next: DateTime<Utc>,
        interval: Duration,
    },
    /// Due right away and again right after each run.
    ImmediateIndefiniteRepeat { next: DateTime<Utc> },
}

impl ScheduleDescription {
    pub fn once(at: DateTime<Utc>) -> Self {
        ScheduleDescription::Once { at }
    }

    pub fn now() -> Self {
        ScheduleDescription::Once { at: Utc::now() }
    }

    pub fn fixed_interval(start: DateTime<Utc>, interval: Duration) -> Self {
        ScheduleDescription::FixedIntervalRepeat {
            next: start,
            interval,
        }
    }

    pub fn immediate_indefinite() -> Self {
        ScheduleDescription::ImmediateIndefiniteRepeat { next: Utc::now() }
    }

    pub fn execution_time(&self) -> DateTime<Utc> {
        match self {
            ScheduleDescription::Once { at } => *at,
            ScheduleDescription::FixedIntervalRepeat { next, .. } => *next,
            ScheduleDescription::ImmediateIndefiniteRepeat { next } => *next,
        }
    }

    pub fn does_repeat(&self) -> bool {
        !matches!(self, ScheduleDescription::Once { .. })
    }

    /// Advance to the next due time after a run.
    pub fn update_execution_time(&mut self) {
        match self {
            ScheduleDescription::Once { .. } => {}
            ScheduleDescription::FixedIntervalRepeat { next, interval } => {
                *next += *interval;
            }
            ScheduleDescription::ImmediateIndefiniteRepeat { next } => {
                *next = Utc::now();
            }
        }
    }
}
