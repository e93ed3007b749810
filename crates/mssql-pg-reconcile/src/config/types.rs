//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::IdentifierCase;
use crate::verify::HashAlgorithm;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source side of the migration (the system being migrated away from).
    pub source: ConnectionConfig,

    /// Target side of the migration.
    pub target: ConnectionConfig,

    /// Reconciliation behavior.
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// Database engine of one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    /// Microsoft SQL Server.
    #[serde(alias = "sqlserver", alias = "sql_server")]
    Mssql,
    /// PostgreSQL.
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
}

impl DatabaseKind {
    /// Default TCP port for the engine.
    pub fn default_port(&self) -> u16 {
        match self {
            DatabaseKind::Mssql => 1433,
            DatabaseKind::Postgres => 5432,
        }
    }

    /// Default schema for the engine.
    pub fn default_schema(&self) -> &'static str {
        match self {
            DatabaseKind::Mssql => "dbo",
            DatabaseKind::Postgres => "public",
        }
    }

    /// Identifier casing convention for the engine family.
    pub fn default_identifier_case(&self) -> IdentifierCase {
        match self {
            DatabaseKind::Mssql => IdentifierCase::Upper,
            DatabaseKind::Postgres => IdentifierCase::Lower,
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseKind::Mssql => write!(f, "mssql"),
            DatabaseKind::Postgres => write!(f, "postgres"),
        }
    }
}

/// Connection settings for one side.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database engine.
    pub r#type: DatabaseKind,

    /// Database host.
    pub host: String,

    /// Database port (default: engine default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Schema used for `ALL` discovery and unqualified table names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Identifier casing applied to table references (default: engine convention).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier_case: Option<IdentifierCase>,

    /// MSSQL: encrypt the connection (default: true).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// MSSQL: trust the server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,

    /// PostgreSQL: SSL mode (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,
}

impl ConnectionConfig {
    /// Port with the engine default applied.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.r#type.default_port())
    }

    /// Schema with the engine default applied.
    pub fn effective_schema(&self) -> String {
        self.schema
            .clone()
            .unwrap_or_else(|| self.r#type.default_schema().to_string())
    }

    /// Identifier casing with the engine default applied.
    pub fn effective_identifier_case(&self) -> IdentifierCase {
        self.identifier_case
            .unwrap_or_else(|| self.r#type.default_identifier_case())
    }

    /// Short description for logs (never includes credentials).
    pub fn describe(&self) -> String {
        format!(
            "{}://{}:{}/{}",
            self.r#type,
            self.host,
            self.effective_port(),
            self.database
        )
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("identifier_case", &self.identifier_case)
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Reconciliation behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Table mapping: `SRC.TABLE=tgt.table,...` or `ALL` (default: ALL).
    #[serde(default = "default_tables")]
    pub tables: String,

    /// Row digest algorithm (default: SHA256).
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,

    /// Rows per extraction batch (default: 5000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Cap on rows extracted per table and side (default: unlimited).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rows_per_table: Option<u64>,

    /// Statement timeout in seconds (default: 300).
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,

    /// Columns never read on the source side (case-insensitive).
    #[serde(default)]
    pub source_skip_columns: Vec<String>,

    /// Columns never read on the target side (case-insensitive).
    #[serde(default)]
    pub target_skip_columns: Vec<String>,

    /// Evidence entries kept per outcome list (default: 10).
    #[serde(default = "default_max_evidence_rows")]
    pub max_evidence_rows: usize,

    /// Directory for per-row hash CSV files (disabled when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_export_dir: Option<PathBuf>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            tables: default_tables(),
            hash_algorithm: HashAlgorithm::default(),
            batch_size: default_batch_size(),
            max_rows_per_table: None,
            command_timeout_seconds: default_command_timeout(),
            source_skip_columns: Vec::new(),
            target_skip_columns: Vec::new(),
            max_evidence_rows: default_max_evidence_rows(),
            csv_export_dir: None,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_require() -> String {
    "require".to_string()
}

fn default_tables() -> String {
    "ALL".to_string()
}

fn default_batch_size() -> usize {
    5_000
}

fn default_command_timeout() -> u64 {
    300
}

fn default_max_evidence_rows() -> usize {
    10
}
