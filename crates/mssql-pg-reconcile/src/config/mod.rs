//! Configuration loading, environment overrides and validation.

mod types;
mod validation;

pub use types::*;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ReconcileError, Result};

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Apply overrides from the process environment.
    pub fn with_process_env(self) -> Result<Self> {
        self.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply knob overrides looked up by name.
    ///
    /// Recognized keys: `TABLES`, `HASH_ALGORITHM`, `BATCH_SIZE`,
    /// `MAX_ROWS_PER_TABLE`, `COMMAND_TIMEOUT_SECONDS`, `SOURCE_SKIP_COLUMNS`,
    /// `TARGET_SKIP_COLUMNS` and `CSV_EXPORT_DIR`. The result is re-validated.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let rc = &mut self.reconcile;

        if let Some(v) = get("TABLES") {
            rc.tables = v;
        }
        if let Some(v) = get("HASH_ALGORITHM") {
            rc.hash_algorithm = v.parse()?;
        }
        if let Some(v) = get("BATCH_SIZE") {
            rc.batch_size = parse_number("BATCH_SIZE", &v)?;
        }
        if let Some(v) = get("MAX_ROWS_PER_TABLE") {
            rc.max_rows_per_table = Some(parse_number("MAX_ROWS_PER_TABLE", &v)?);
        }
        if let Some(v) = get("COMMAND_TIMEOUT_SECONDS") {
            rc.command_timeout_seconds = parse_number("COMMAND_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = get("SOURCE_SKIP_COLUMNS") {
            rc.source_skip_columns = parse_column_list(&v);
        }
        if let Some(v) = get("TARGET_SKIP_COLUMNS") {
            rc.target_skip_columns = parse_column_list(&v);
        }
        if let Some(v) = get("CSV_EXPORT_DIR") {
            rc.csv_export_dir = Some(PathBuf::from(v));
        }

        debug!("Effective reconcile config: {:?}", self.reconcile);
        self.validate()?;
        Ok(self)
    }
}

/// Split a comma-separated column list, dropping blanks.
pub fn parse_column_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ReconcileError::Config(format!("{} must be a number, got '{}'", key, value)))
}
