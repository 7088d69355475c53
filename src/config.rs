use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::env;
use std::path::Path;

use crate::timezone::{parse_zone, DEFAULT_TIMEZONE};

pub const DEFAULT_WORKERS: usize = 8;
pub const MAX_WORKERS: usize = 256;

#[derive(Debug, Clone)]
pub struct Config {
    // Zone for stores without a timezone entry
    pub default_timezone: String,

    // Concurrent store computations per report run
    pub workers: usize,

    // Dataset snapshot (JSON) to report on; may be overridden on the command line
    pub data_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_timezone: DEFAULT_TIMEZONE.to_string(),
            workers: DEFAULT_WORKERS,
            data_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env if present, ignore if missing
        Self::from_getter(|key| env::var(key).ok())
    }

    /// Parse config from a custom getter function (for testing)
    pub fn from_getter<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Config {
            default_timezone: get("STOREMON_DEFAULT_TIMEZONE")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),

            workers: match get("STOREMON_WORKERS") {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .context("STOREMON_WORKERS must be a positive integer")?,
                None => DEFAULT_WORKERS,
            },

            data_path: get("STOREMON_DATA_PATH").filter(|s| !s.is_empty()),
        })
    }

    /// Create config from a HashMap (convenience for testing)
    pub fn from_map(map: &HashMap<&str, &str>) -> Result<Self> {
        Self::from_getter(|key| map.get(key).map(|v| v.to_string()))
    }

    /// Validate configuration values at startup.
    /// Returns Ok(()) if all validations pass, or Err with details of what failed.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if parse_zone(&self.default_timezone).is_none() {
            errors.push(format!(
                "STOREMON_DEFAULT_TIMEZONE '{}' is not a known IANA timezone.",
                self.default_timezone
            ));
        }

        if self.workers == 0 {
            errors.push("STOREMON_WORKERS must be greater than 0.".to_string());
        } else if self.workers > MAX_WORKERS {
            errors.push(format!(
                "STOREMON_WORKERS={} seems too high (max: {}).",
                self.workers, MAX_WORKERS
            ));
        }

        if let Some(path) = &self.data_path {
            if !Path::new(path).exists() {
                errors.push(format!("Dataset snapshot not found at '{}'.", path));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )
        }
    }
}
