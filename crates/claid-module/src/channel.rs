// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use chrono::{DateTime, Utc};
use claid_observability::Logger;
use claid_structures::LogMessageSeverityLevel;

use crate::diagnostics::module_log;
use crate::Publisher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelAccessRights {
    None,
    Read,
    Write,
}

/// Handle to one channel binding of a unit.
///
/// Handles returned outside a unit's initialization window are invalid;
/// posting on them, or on a read-only handle, is reported to the unit and
/// otherwise ignored.
pub struct Channel<T> {
    channel_id: String,
    module_id: String,
    access: ChannelAccessRights,
    publisher: Option<Arc<Publisher<T>>>,
    logger: Arc<Logger>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            channel_id: self.channel_id.clone(),
            module_id: self.module_id.clone(),
            access: self.access,
            publisher: self.publisher.clone(),
            logger: Arc::clone(&self.logger),
        }
    }
}

impl<T> std::fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("channel_id", &self.channel_id)
            .field("module_id", &self.module_id)
            .field("access", &self.access)
            .finish()
    }
}

impl<T: 'static> Channel<T> {
    pub(crate) fn writable(
        channel_id: impl Into<String>,
        module_id: impl Into<String>,
        publisher: Arc<Publisher<T>>,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            module_id: module_id.into(),
            access: ChannelAccessRights::Write,
            publisher: Some(publisher),
            logger,
        }
    }

    pub(crate) fn readable(
        channel_id: impl Into<String>,
        module_id: impl Into<String>,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            module_id: module_id.into(),
            access: ChannelAccessRights::Read,
            publisher: None,
            logger,
        }
    }

    pub(crate) fn invalid(
        channel_id: impl Into<String>,
        module_id: impl Into<String>,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            module_id: module_id.into(),
            access: ChannelAccessRights::None,
            publisher: None,
            logger,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn access_rights(&self) -> ChannelAccessRights {
        self.access
    }

    pub fn is_valid(&self) -> bool {
        self.access != ChannelAccessRights::None
    }

    pub fn can_read(&self) -> bool {
        self.access == ChannelAccessRights::Read
    }

    pub fn can_write(&self) -> bool {
        self.access == ChannelAccessRights::Write
    }

    /// Post `value` stamped with the current time.
    pub fn post(&self, value: &T) {
        self.post_with_timestamp(value, Utc::now());
    }

    pub fn post_with_timestamp(&self, value: &T, timestamp: DateTime<Utc>) {
        let publisher = match (&self.publisher, self.access) {
            (Some(publisher), ChannelAccessRights::Write) => publisher,
            (_, ChannelAccessRights::None) => {
                self.report(format!(
                    "cannot post on channel \"{}\": the channel is invalid. Was it published outside of initialize?",
                    self.channel_id
                ));
                return;
            }
            _ => {
                self.report(format!(
                    "cannot post on channel \"{}\": no write access (channel was subscribed, not published)",
                    self.channel_id
                ));
                return;
            }
        };

        if let Err(e) = publisher.post(value, timestamp) {
            self.report(format!("failed to post on channel \"{}\": {}", self.channel_id, e));
        }
    }

    fn report(&self, message: String) {
        module_log(
            &self.logger,
            &self.module_id,
            LogMessageSeverityLevel::Error,
            message,
        );
    }
}
