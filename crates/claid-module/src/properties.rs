// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::str::FromStr;

use parking_lot::Mutex;

use crate::{ModuleError, ModuleResult};

/// Properties of one unit instance as configured in the core.
///
/// Values arrive as strings and are parsed on access. Keys that were asked for
/// but not present are remembered so a unit can report all of them at once.
#[derive(Debug, Default)]
pub struct Properties {
    values: HashMap<String, String>,
    missing: Mutex<Vec<String>>,
}

impl Clone for Properties {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            missing: Mutex::new(self.missing.lock().clone()),
        }
    }
}

impl From<HashMap<String, String>> for Properties {
    fn from(values: HashMap<String, String>) -> Self {
        Self {
            values,
            missing: Mutex::new(Vec::new()),
        }
    }
}

impl Properties {
    pub fn new(values: HashMap<String, String>) -> Self {
        values.into()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_string(&self, key: &str) -> ModuleResult<String> {
        match self.values.get(key) {
            Some(value) => Ok(value.clone()),
            None => {
                self.remember_missing(key);
                Err(ModuleError::MissingProperty(key.to_string()))
            }
        }
    }

    /// Parse the property into `T`.
    pub fn get<T>(&self, key: &str) -> ModuleResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.get_string(key)?;
        raw.trim()
            .parse::<T>()
            .map_err(|e| ModuleError::InvalidProperty {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    /// Parsed value, or `default` when the key is absent. Unparsable values
    /// are still an error.
    pub fn get_or<T>(&self, key: &str, default: T) -> ModuleResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        if self.contains(key) {
            self.get(key)
        } else {
            Ok(default)
        }
    }

    /// Comma-separated list.
    pub fn get_list(&self, key: &str) -> ModuleResult<Vec<String>> {
        Ok(self
            .get_string(key)?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub fn missing_properties(&self) -> Vec<String> {
        self.missing.lock().clone()
    }

    pub fn was_any_property_missing(&self) -> bool {
        !self.missing.lock().is_empty()
    }

    pub fn as_map(&self) -> &HashMap<String, String> {
        &self.values
    }

    fn remember_missing(&self, key: &str) {
        let mut missing = self.missing.lock();
        if !missing.iter().any(|k| k == key) {
            missing.push(key.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>()
            .into()
    }

    #[test]
    fn test_typed_access() {
        let properties = props(&[("rate", " 50 "), ("enabled", "true"), ("axes", "x, y,z")]);
        assert_eq!(properties.get::<u32>("rate").unwrap(), 50);
        assert!(properties.get::<bool>("enabled").unwrap());
        assert_eq!(properties.get_list("axes").unwrap(), vec!["x", "y", "z"]);
        assert_eq!(properties.get_or("missing", 3.5_f64).unwrap(), 3.5);
    }

    #[test]
    fn test_missing_keys_are_remembered_once() {
        let properties = props(&[]);
        assert!(properties.get_string("path").is_err());
        assert!(properties.get::<i32>("path").is_err());
        assert!(properties.get::<i32>("count").is_err());
        assert_eq!(properties.missing_properties(), vec!["path", "count"]);
    }

    #[test]
    fn test_unparsable_value_is_invalid_property() {
        let properties = props(&[("rate", "fast")]);
        assert!(matches!(
            properties.get::<u32>("rate"),
            Err(ModuleError::InvalidProperty { .. })
        ));
    }
}
