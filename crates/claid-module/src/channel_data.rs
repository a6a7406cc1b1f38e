// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, TimeZone, Utc};

/// A value received on a channel together with its envelope metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelData<T> {
    value: T,
    timestamp: DateTime<Utc>,
    user_token: String,
}

impl<T> ChannelData<T> {
    pub fn new(value: T, timestamp: DateTime<Utc>, user_token: impl Into<String>) -> Self {
        Self {
            value,
            timestamp,
            user_token: user_token.into(),
        }
    }

    /// Timestamp from milliseconds since the epoch. Out-of-range values map
    /// to the epoch itself.
    pub fn from_unix_ms(value: T, unix_timestamp_ms: i64, user_token: impl Into<String>) -> Self {
        let timestamp = Utc
            .timestamp_millis_opt(unix_timestamp_ms)
            .single()
            .unwrap_or_default();
        Self::new(value, timestamp, user_token)
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn user_token(&self) -> &str {
        &self.user_token
    }
}
