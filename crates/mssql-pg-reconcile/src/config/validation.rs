//! Configuration validation.

use super::{Config, ConnectionConfig};
use crate::error::{ReconcileError, Result};
use crate::orchestrator::TableSelection;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_side("source", &config.source)?;
    validate_side("target", &config.target)?;

    let rc = &config.reconcile;
    if rc.batch_size == 0 {
        return Err(ReconcileError::Config(
            "reconcile.batch_size must be at least 1".into(),
        ));
    }
    if let Some(0) = rc.max_rows_per_table {
        return Err(ReconcileError::Config(
            "reconcile.max_rows_per_table must be at least 1 (omit it for no limit)".into(),
        ));
    }
    if rc.command_timeout_seconds == 0 {
        return Err(ReconcileError::Config(
            "reconcile.command_timeout_seconds must be at least 1".into(),
        ));
    }

    // Surfaces malformed mappings before any connection is opened
    TableSelection::parse(&rc.tables)?;

    Ok(())
}

fn validate_side(side: &str, conn: &ConnectionConfig) -> Result<()> {
    if conn.host.is_empty() {
        return Err(ReconcileError::Config(format!("{}.host is required", side)));
    }
    if conn.database.is_empty() {
        return Err(ReconcileError::Config(format!(
            "{}.database is required",
            side
        )));
    }
    if conn.user.is_empty() {
        return Err(ReconcileError::Config(format!("{}.user is required", side)));
    }
    if let Some(schema) = &conn.schema {
        if schema.trim().is_empty() {
            return Err(ReconcileError::Config(format!(
                "{}.schema must not be blank",
                side
            )));
        }
    }
    Ok(())
}
