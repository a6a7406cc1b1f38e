// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Retry with exponential backoff for opening the core socket.

use std::time::Duration;

use tracing::{info, warn};

use crate::error::Result;

const MAX_BACKOFF_MS: u64 = 60_000;

pub struct ReconnectionStrategy {
    base_backoff_ms: u64,
    max_backoff_ms: u64,
    current_attempt: u32,
    /// 0 = retry forever
    max_attempts: u32,
}

impl ReconnectionStrategy {
    pub fn new(base_backoff_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_backoff_ms,
            max_backoff_ms: MAX_BACKOFF_MS,
            current_attempt: 0,
            max_attempts,
        }
    }

    /// `base * 2^(attempt - 1)`, capped. `None` once attempts are used up.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.current_attempt += 1;

        let factor = 2u64.saturating_pow(self.current_attempt - 1);
        let backoff_ms = self.base_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms);
        Some(Duration::from_millis(backoff_ms))
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    pub fn attempt_number(&self) -> u32 {
        self.current_attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_attempts > 0 && self.current_attempt >= self.max_attempts
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error or
/// the strategy gives up.
pub fn retry_with_backoff<F, T>(
    mut operation: F,
    strategy: &mut ReconnectionStrategy,
    operation_name: &str,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    loop {
        match operation() {
            Ok(result) => {
                if strategy.attempt_number() > 0 {
                    info!(
                        "[RECONNECT] {} succeeded after {} retries",
                        operation_name,
                        strategy.attempt_number()
                    );
                }
                strategy.reset();
                return Ok(result);
            }
            Err(e) if e.is_retryable() => match strategy.next_backoff() {
                Some(backoff) => {
                    warn!(
                        "[RECONNECT] {} failed (attempt {}): {} - retrying in {:?}",
                        operation_name,
                        strategy.attempt_number(),
                        e,
                        backoff
                    );
                    std::thread::sleep(backoff);
                }
                None => {
                    warn!(
                        "[RECONNECT] {} failed after {} attempts - giving up",
                        operation_name,
                        strategy.attempt_number()
                    );
                    return Err(e);
                }
            },
            Err(e) => return Err(e),
        }
    }
}
