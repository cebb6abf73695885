//! Application configuration.
//!
//! Values come from the environment. The binary loads a `.env` file into it
//! first when present. CLI flags override them.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `FORMULARY_PORT` | `3000` |
//! | `FORMULARY_PAGE_SIZE` | `5` |
//! | `FORMULARY_MAX_UPLOAD_BYTES` | 50 MiB |
//! | `FORMULARY_PARALLEL_THRESHOLD` | `10000` |

use std::env;
use std::str::FromStr;

use crate::error::ConfigError;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PAGE_SIZE: usize = 5;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// HTTP port for `serve`.
    pub port: u16,
    /// Default page size for catalog listings.
    pub page_size: usize,
    /// Largest accepted upload body.
    pub max_upload_bytes: usize,
    /// Row count above which grouping runs on the thread pool.
    pub parallel_threshold: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            page_size: DEFAULT_PAGE_SIZE,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    ///
    /// The binary loads `.env` before calling this, so values from it are
    /// already in the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            port: read(&lookup, "FORMULARY_PORT", defaults.port)?,
            page_size: read_positive(&lookup, "FORMULARY_PAGE_SIZE", defaults.page_size)?,
            max_upload_bytes: read_positive(&lookup, "FORMULARY_MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            parallel_threshold: read(&lookup, "FORMULARY_PARALLEL_THRESHOLD", defaults.parallel_threshold)?,
        })
    }
}

fn read<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.clone(),
            message: e.to_string(),
        }),
    }
}

fn read_positive<F>(lookup: &F, key: &str, default: usize) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = read(lookup, key, default)?;
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: "0".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.port, 3000);
        assert_eq!(config.page_size, 5);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("FORMULARY_PORT", "8080"),
            ("FORMULARY_PAGE_SIZE", " 25 "),
            ("FORMULARY_PARALLEL_THRESHOLD", "0"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.page_size, 25);
        assert_eq!(config.parallel_threshold, 0);
    }

    #[test]
    fn test_invalid_value() {
        let err = AppConfig::from_lookup(lookup(&[("FORMULARY_PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("FORMULARY_PORT"));

        let err = AppConfig::from_lookup(lookup(&[("FORMULARY_PAGE_SIZE", "0")])).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }
}
