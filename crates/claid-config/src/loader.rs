// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later ones winning:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, RuntimeConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "claid_runtime.toml";
const CONFIG_PATH_ENV_VAR: &str = "CLAID_RUNTIME_CONFIG_PATH";

/// Find the runtime configuration file
///
/// Search order:
/// 1. `CLAID_RUNTIME_CONFIG_PATH` environment variable
/// 2. `./claid_runtime.toml`
/// 3. Up to five parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var(CONFIG_PATH_ENV_VAR) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by {} not found: {}",
            CONFIG_PATH_ENV_VAR,
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(path) = search_paths.iter().find(|p| p.exists()) {
        return Ok(path.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet {} to specify a custom location.",
        CONFIG_FILE_NAME, search_list, CONFIG_PATH_ENV_VAR
    )))
}

/// Load configuration from a TOML file and apply overrides.
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, the file is searched for.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if the config file is not found or contains invalid TOML
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<RuntimeConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: RuntimeConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

/// Like [`load_config`], but starts from defaults when no file can be found.
/// A file that exists but fails to parse is still an error.
pub fn load_config_or_default(
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<RuntimeConfig> {
    match find_config_file() {
        Ok(path) => load_config(Some(&path), cli_args),
        Err(ConfigError::FileNotFound(_)) => {
            let mut config = RuntimeConfig::default();
            apply_environment_overrides(&mut config);
            if let Some(cli) = cli_args {
                apply_cli_overrides(&mut config, cli);
            }
            Ok(config)
        }
        Err(e) => Err(e),
    }
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `CLAID_SOCKET_PATH` -> `bootstrap.socket_path`
/// - `CLAID_CONFIG_FILE` -> `bootstrap.config_file_path`
/// - `CLAID_HOST_ID` -> `bootstrap.host_id`
/// - `CLAID_USER_ID` -> `bootstrap.user_id`
/// - `CLAID_DEVICE_ID` -> `bootstrap.device_id`
/// - `CLAID_CONNECT_RETRIES` -> `connection.connect_retries`
/// - `CLAID_HANDSHAKE_TIMEOUT_MS` -> `connection.handshake_timeout_ms`
/// - `CLAID_RESTART_PAUSE_MS` -> `runtime.restart_pause_ms`
/// - `CLAID_LOG_LEVEL` -> `logging.level`
pub fn apply_environment_overrides(config: &mut RuntimeConfig) {
    if let Ok(value) = env::var("CLAID_SOCKET_PATH") {
        config.bootstrap.socket_path = value;
    }
    if let Ok(value) = env::var("CLAID_CONFIG_FILE") {
        config.bootstrap.config_file_path = PathBuf::from(value);
    }
    if let Ok(value) = env::var("CLAID_HOST_ID") {
        config.bootstrap.host_id = value;
    }
    if let Ok(value) = env::var("CLAID_USER_ID") {
        config.bootstrap.user_id = value;
    }
    if let Ok(value) = env::var("CLAID_DEVICE_ID") {
        config.bootstrap.device_id = value;
    }

    if let Ok(value) = env::var("CLAID_CONNECT_RETRIES") {
        if let Ok(retries) = value.parse::<u32>() {
            config.connection.connect_retries = retries;
        }
    }
    if let Ok(value) = env::var("CLAID_HANDSHAKE_TIMEOUT_MS") {
        if let Ok(ms) = value.parse::<u64>() {
            config.connection.handshake_timeout_ms = ms;
        }
    }
    if let Ok(value) = env::var("CLAID_RESTART_PAUSE_MS") {
        if let Ok(ms) = value.parse::<u64>() {
            config.runtime.restart_pause_ms = ms;
        }
    }

    if let Ok(value) = env::var("CLAID_LOG_LEVEL") {
        config.logging.level = value;
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - e.g. `{"socket_path": "ipc:///tmp/other", "host_id": "phone"}`
pub fn apply_cli_overrides(config: &mut RuntimeConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("socket_path") {
        config.bootstrap.socket_path = value.clone();
    }
    if let Some(value) = cli_args.get("config_file") {
        config.bootstrap.config_file_path = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("host_id") {
        config.bootstrap.host_id = value.clone();
    }
    if let Some(value) = cli_args.get("user_id") {
        config.bootstrap.user_id = value.clone();
    }
    if let Some(value) = cli_args.get("device_id") {
        config.bootstrap.device_id = value.clone();
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
    if let Some(value) = cli_args.get("restart_pause_ms") {
        if let Ok(ms) = value.parse::<u64>() {
            config.runtime.restart_pause_ms = ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_runtime.toml");
        File::create(&config_path).unwrap();

        env::set_var(CONFIG_PATH_ENV_VAR, config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var(CONFIG_PATH_ENV_VAR);

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_missing_env_path_is_not_found() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var(CONFIG_PATH_ENV_VAR, "/nonexistent/claid_runtime.toml");
        let result = find_config_file();
        env::remove_var(CONFIG_PATH_ENV_VAR);

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let saved_socket = env::var("CLAID_SOCKET_PATH").ok();
        env::remove_var("CLAID_SOCKET_PATH");

        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[bootstrap]").unwrap();
        writeln!(file, "socket_path = \"ipc:///tmp/test_socket\"").unwrap();
        writeln!(file, "[runtime]").unwrap();
        writeln!(file, "restart_pause_ms = 10").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.bootstrap.socket_path, "ipc:///tmp/test_socket");
        assert_eq!(config.runtime.restart_pause_ms, 10);
        assert_eq!(config.connection, crate::ConnectionConfig::default());

        if let Some(value) = saved_socket {
            env::set_var("CLAID_SOCKET_PATH", value);
        }
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[bootstrap\nsocket_path = 1").unwrap();

        assert!(matches!(
            load_config(Some(&config_path), None),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = RuntimeConfig::default();

        env::set_var("CLAID_HOST_ID", "smartwatch");
        env::set_var("CLAID_CONNECT_RETRIES", "9");
        env::set_var("CLAID_RESTART_PAUSE_MS", "not-a-number");

        apply_environment_overrides(&mut config);

        env::remove_var("CLAID_HOST_ID");
        env::remove_var("CLAID_CONNECT_RETRIES");
        env::remove_var("CLAID_RESTART_PAUSE_MS");

        assert_eq!(config.bootstrap.host_id, "smartwatch");
        assert_eq!(config.connection.connect_retries, 9);
        assert_eq!(config.runtime.restart_pause_ms, 2000);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = RuntimeConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("socket_path".to_string(), "tcp://127.0.0.1:1337".to_string());
        cli_args.insert("device_id".to_string(), "pixel".to_string());

        apply_cli_overrides(&mut config, &cli_args);

        assert_eq!(config.bootstrap.socket_path, "tcp://127.0.0.1:1337");
        assert_eq!(config.bootstrap.device_id, "pixel");
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[bootstrap]").unwrap();
        writeln!(file, "host_id = \"file-host\"").unwrap();
        writeln!(file, "user_id = \"file-user\"").unwrap();

        env::set_var("CLAID_HOST_ID", "env-host");
        env::set_var("CLAID_USER_ID", "env-user");

        let mut cli_args = HashMap::new();
        cli_args.insert("host_id".to_string(), "cli-host".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args)).unwrap();

        env::remove_var("CLAID_HOST_ID");
        env::remove_var("CLAID_USER_ID");

        // CLI wins for host, env wins for user (no CLI override)
        assert_eq!(config.bootstrap.host_id, "cli-host");
        assert_eq!(config.bootstrap.user_id, "env-user");
    }
}
