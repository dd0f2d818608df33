//! Configuration access port.
//!
//! Typed getters return `default` when a key is absent and `ConfigInvalid`
//! when a value is present but does not parse as the requested type.

use crate::domain::error::LsquantError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, LsquantError>;
    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, LsquantError>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, LsquantError>;
}
