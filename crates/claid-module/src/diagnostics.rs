// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use claid_observability::Logger;
use claid_structures::{LogMessageEntityType, LogMessageSeverityLevel};

/// Log on behalf of a unit, prefixed with `Module "<id>": `.
pub(crate) fn module_log(
    logger: &Logger,
    module_id: &str,
    level: LogMessageSeverityLevel,
    message: impl AsRef<str>,
) {
    logger.log(
        level,
        LogMessageEntityType::Module,
        module_id,
        format!("Module \"{}\": {}", module_id, message.as_ref()),
    );
}
