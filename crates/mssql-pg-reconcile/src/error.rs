//! Error types for the reconciliation library.

use thiserror::Error;

/// Exit code for configuration problems.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code used by the CLI when the run completed but tables differ or errored.
pub const EXIT_NOT_RECONCILED: u8 = 2;
/// Exit code for database connectivity and query failures.
pub const EXIT_DATABASE_ERROR: u8 = 3;
/// Exit code for file system failures.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for reconciliation operations.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Configuration error (invalid YAML, missing fields, bad table mapping, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// MSSQL connection or query error
    #[error("MSSQL error: {0}")]
    Mssql(#[from] tiberius::error::Error),

    /// PostgreSQL connection or query error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Connection could not be established
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// Table metadata could not be resolved
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Row extraction failed for a specific table
    #[error("Extraction failed for table {table}: {message}")]
    Extraction { table: String, message: String },

    /// A statement exceeded its timeout
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ReconcileError {
    /// Create a Connection error with context about where it occurred
    pub fn connection(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        ReconcileError::Connection {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create an Extraction error
    pub fn extraction(table: impl Into<String>, message: impl Into<String>) -> Self {
        ReconcileError::Extraction {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Timeout error
    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        ReconcileError::Timeout {
            operation: operation.into(),
            seconds,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ReconcileError::Config(_) | ReconcileError::Yaml(_) => EXIT_CONFIG_ERROR,
            ReconcileError::Io(_) | ReconcileError::Csv(_) => EXIT_IO_ERROR,
            ReconcileError::Json(_) => EXIT_IO_ERROR,
            ReconcileError::Mssql(_)
            | ReconcileError::Postgres(_)
            | ReconcileError::Connection { .. }
            | ReconcileError::Metadata(_)
            | ReconcileError::Extraction { .. }
            | ReconcileError::Timeout { .. } => EXIT_DATABASE_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;
