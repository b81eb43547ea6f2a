use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::static_config::{StaticConfigItem, STATIC_CONFIG_TABLE};

/// Flattened `section.key` settings, validated against the static table.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    values: HashMap<String, String>,
}

impl SystemConfig {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// The configured value, or the table default for known keys.
    fn effective(&self, key: &str) -> Option<&str> {
        self.get(key)
            .or_else(|| config_item(key).map(|item| item.default_value))
    }

    pub fn get_string(&self, key: &str) -> String {
        self.effective(key).unwrap_or_default().to_string()
    }

    /// `None` when the effective value is blank.
    pub fn get_non_empty(&self, key: &str) -> Option<String> {
        self.effective(key)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get_non_empty(key).map(PathBuf::from)
    }

    pub fn get_number(&self, key: &str) -> i64 {
        self.effective(key)
            .and_then(|value| value.parse().ok())
            .unwrap_or(0)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.effective(key).and_then(parse_bool).unwrap_or(false)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config read error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("unknown config key: {0}")]
    UnknownKey(String),
    #[error("type mismatch for key {0}: expected {1}")]
    TypeMismatch(String, String),
}

pub struct SystemConfigLoader;

impl SystemConfigLoader {
    pub fn from_str(input: &str) -> Result<SystemConfig, ConfigError> {
        let value: toml::Value =
            toml::from_str(input).map_err(|err| ConfigError::Parse(err.to_string()))?;
        let mut values = HashMap::new();
        flatten_into(&mut values, "", &value)?;
        Ok(SystemConfig { values })
    }

    pub fn from_path(path: &Path) -> Result<SystemConfig, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
        Self::from_str(&raw)
    }
}

fn flatten_into(
    output: &mut HashMap<String, String>,
    prefix: &str,
    value: &toml::Value,
) -> Result<(), ConfigError> {
    let (rendered, value_type) = match value {
        toml::Value::Table(table) => {
            for (key, nested) in table {
                let path = if prefix.is_empty() {
                    key.to_string()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(output, &path, nested)?;
            }
            return Ok(());
        }
        toml::Value::String(value) => (value.to_string(), "string"),
        toml::Value::Integer(value) => (value.to_string(), "number"),
        toml::Value::Float(value) => (value.to_string(), "number"),
        toml::Value::Boolean(value) => (value.to_string(), "boolean"),
        _ => {
            return Err(ConfigError::TypeMismatch(
                prefix.to_string(),
                "string|number|boolean".to_string(),
            ))
        }
    };

    let item = config_item(prefix).ok_or_else(|| ConfigError::UnknownKey(prefix.to_string()))?;
    if item.value_type != value_type {
        return Err(ConfigError::TypeMismatch(
            prefix.to_string(),
            item.value_type.to_string(),
        ));
    }
    output.insert(prefix.to_string(), rendered);
    Ok(())
}

fn config_item(key: &str) -> Option<&'static StaticConfigItem> {
    STATIC_CONFIG_TABLE.iter().find(|item| item.key == key)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
