//! INI file configuration adapter.
//!
//! Section and key names are case-insensitive. Values are trimmed.

use crate::domain::error::LsquantError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LsquantError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| LsquantError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, LsquantError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| LsquantError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }

    /// Parse a present value with `parse`, or fall back to `default`.
    fn typed<T>(
        &self,
        section: &str,
        key: &str,
        default: T,
        expected: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<T, LsquantError> {
        match self.get_string(section, key) {
            None => Ok(default),
            Some(raw) => parse(&raw).ok_or_else(|| LsquantError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason: format!("expected {expected}, got '{raw}'"),
            }),
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, LsquantError> {
        self.typed(section, key, default, "an integer", |v| v.parse().ok())
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, LsquantError> {
        self.typed(section, key, default, "a number", |v| v.parse().ok())
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, LsquantError> {
        self.typed(section, key, default, "a boolean", Self::parse_bool)
    }
}
