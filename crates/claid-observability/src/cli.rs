// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-claid-io`, `--debug-claid-runtime`, etc.

use std::collections::HashMap;
use std::env;

use crate::KNOWN_CRATES;

/// Environment variable holding comma-separated crate names, or `all`.
pub const DEBUG_ENV_VAR: &str = "CLAID_DEBUG";

/// Per-crate debug switches.
///
/// # Example
/// ```rust
/// use claid_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-claid-io".to_string()]);
/// assert!(flags.is_enabled("claid-io"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrateDebugFlags {
    pub enabled_crates: HashMap<String, bool>,
}

impl CrateDebugFlags {
    /// Parse debug flags from command-line arguments
    ///
    /// Looks for arguments matching `--debug-{crate-name}`.
    /// `--debug-all` enables every known crate.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = CrateDebugFlags::default();

        for arg in args {
            if arg == "--debug-all" {
                flags.enable_all();
                continue;
            }

            if let Some(crate_name) = arg.strip_prefix("--debug-") {
                flags.enabled_crates.insert(crate_name.to_string(), true);
            }
        }

        flags
    }

    /// Merge the value of [`DEBUG_ENV_VAR`] into these flags.
    pub fn merge_env_value(&mut self, value: &str) {
        if value.trim() == "all" {
            self.enable_all();
            return;
        }
        for crate_name in value.split(',') {
            let crate_name = crate_name.trim();
            if !crate_name.is_empty() {
                self.enabled_crates.insert(crate_name.to_string(), true);
            }
        }
    }

    fn enable_all(&mut self) {
        for crate_name in KNOWN_CRATES {
            self.enabled_crates.insert(crate_name.to_string(), true);
        }
    }

    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains_key(crate_name)
    }

    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// `DEBUG` if enabled for the crate, `INFO` otherwise.
    pub fn log_level(&self, crate_name: &str) -> tracing::Level {
        if self.is_enabled(crate_name) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Filter directives for `EnvFilter`, e.g. `claid_io=debug,info`.
    ///
    /// Tracing targets are module paths, so crate names are written with
    /// underscores.
    pub fn to_filter_string(&self, default_level: &str) -> String {
        let mut crates: Vec<&String> = self.enabled_crates.keys().collect();
        crates.sort();

        let mut filters: Vec<String> = crates
            .into_iter()
            .map(|crate_name| format!("{}=debug", crate_name.replace('-', "_")))
            .collect();
        filters.push(default_level.to_string());
        filters.join(",")
    }
}

/// Flags from the process arguments plus [`DEBUG_ENV_VAR`].
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());
    if let Ok(value) = env::var(DEBUG_ENV_VAR) {
        flags.merge_env_value(&value);
    }
    flags
}

/// Generate help text for debug flags
pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for specific crate

Available crates:
  {}

Environment Variable:
  {}={{crate-name}}[,{{crate-name}}]  Enable debug for crates (comma-separated)
  {}=all                              Enable debug for all crates
"#,
        KNOWN_CRATES.join(", "),
        DEBUG_ENV_VAR,
        DEBUG_ENV_VAR
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_crate_flag() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-claid-io".to_string()]);
        assert!(flags.is_enabled("claid-io"));
        assert!(!flags.is_enabled("claid-runtime"));
    }

    #[test]
    fn test_debug_all() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-all".to_string()]);
        for crate_name in KNOWN_CRATES {
            assert!(flags.is_enabled(crate_name), "{} should be enabled", crate_name);
        }
    }

    #[test]
    fn test_env_value_is_comma_separated() {
        let mut flags = CrateDebugFlags::default();
        flags.merge_env_value("claid-module, claid-scheduling,");
        assert!(flags.is_enabled("claid-module"));
        assert!(flags.is_enabled("claid-scheduling"));
        assert_eq!(flags.enabled_crates.len(), 2);
    }

    #[test]
    fn test_filter_string_uses_target_names() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-claid-io".to_string()]);
        assert_eq!(flags.to_filter_string("warn"), "claid_io=debug,warn");
        assert_eq!(CrateDebugFlags::default().to_filter_string("info"), "info");
    }

    #[test]
    fn test_log_level() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-claid-io".to_string()]);
        assert_eq!(flags.log_level("claid-io"), tracing::Level::DEBUG);
        assert_eq!(flags.log_level("claid-module"), tracing::Level::INFO);
    }
}
