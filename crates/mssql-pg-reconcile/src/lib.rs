//! # mssql-pg-reconcile
//!
//! Row-level reconciliation of a Microsoft SQL Server to PostgreSQL migration.
//!
//! Every row on both sides is read in primary-key order, fingerprinted with a
//! digest of its canonicalized values, and compared by position:
//!
//! - **Match**: same fingerprint at the same position
//! - **Mismatch**: different fingerprints at the same position
//! - **Missing**: position exists only in the source
//! - **Extra**: position exists only in the target
//!
//! Columns can be excluded per side, so that a migrated table with added or
//! dropped columns can still be compared.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_pg_reconcile::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> mssql_pg_reconcile::Result<()> {
//!     let config = Config::load("config.yaml")?.with_process_env()?;
//!     let summary = Orchestrator::new(&config).run().await?;
//!     println!("{:.2}% rows matching", summary.match_percentage());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod verify;

// Re-exports for convenient access
pub use config::{Config, ConnectionConfig, DatabaseKind, ReconcileConfig};
pub use crate::core::{Connector, IdentifierCase, OrderingMode, Row, RowSource, SqlValue, TableRef};
pub use drivers::DriverConnector;
pub use error::{ReconcileError, Result};
pub use extract::{DeterministicExtractor, TableMetadataResolver};
pub use orchestrator::{HealthCheckResult, Orchestrator, TablePair, TableSelection};
pub use verify::{
    ComparisonOutcome, ComparisonResult, HashAlgorithm, RowFingerprinter, RunSummary, TableAuditor,
};
