//! Seams between the reconciliation engine and the database drivers.
//!
//! - [`RowSource`]: probes tables and streams ordered rows from one side
//! - [`Connector`]: opens a fresh [`RowSource`] for one side
//! - [`Dialect`]: SQL generation strategy for one engine

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

use super::schema::{ColumnDescriptor, IdentifierCase, TableRef};
use super::value::RowBatch;

/// Options for streaming rows from a table.
#[derive(Debug, Clone)]
pub struct ReadRequest {
    /// Table to read.
    pub table: TableRef,
    /// Projected columns. Empty means the table has no comparable columns and
    /// every row is delivered as an empty [`Row`](super::value::Row).
    pub columns: Vec<String>,
    /// Ordering key columns. Empty means constant ordering.
    pub order_by: Vec<String>,
    /// Number of rows per batch.
    pub batch_size: usize,
    /// Maximum number of rows to return.
    pub limit: Option<u64>,
}

/// Read metadata and rows from one database.
///
/// # Streaming
///
/// [`read_rows`](RowSource::read_rows) returns a bounded channel fed by a
/// spawned task. The final batch must carry `is_last`; a receiver that closes
/// without seeing it signals an incomplete extraction.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Run a zero-row probe and return the full column set of a table.
    async fn probe_columns(&self, table: &TableRef) -> Result<Vec<ColumnDescriptor>>;

    /// Primary key constraint columns of a table, in constraint order.
    async fn primary_key_columns(&self, table: &TableRef) -> Result<Vec<String>>;

    /// Base tables of a schema.
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>>;

    /// Start streaming rows.
    fn read_rows(&self, request: ReadRequest) -> mpsc::Receiver<Result<RowBatch>>;

    /// Get the database type identifier (e.g., "mssql", "postgres").
    fn db_type(&self) -> &str;

    /// Close the connection.
    async fn close(&self);
}

/// Opens connections for one side of the audit.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new connection.
    async fn connect(&self) -> Result<Box<dyn RowSource>>;

    /// Identifier casing applied to this side's table references.
    fn identifier_case(&self) -> IdentifierCase;

    /// Schema used for `ALL` discovery.
    fn schema(&self) -> String;

    /// Human readable endpoint for logs.
    fn describe(&self) -> String;
}

/// SQL syntax strategy for one engine.
pub trait Dialect: Send + Sync {
    /// Get the dialect identifier (e.g., "mssql", "postgres").
    fn name(&self) -> &str;

    /// Quote an identifier (table name, column name, etc.).
    ///
    /// - MSSQL: `[identifier]`
    /// - PostgreSQL: `"identifier"`
    fn quote_ident(&self, name: &str) -> String;

    /// Quote a schema-qualified table name.
    fn qualify(&self, table: &TableRef) -> String {
        format!(
            "{}.{}",
            self.quote_ident(&table.schema),
            self.quote_ident(&table.name)
        )
    }

    /// Build a query that returns the column set and no rows.
    fn build_probe_query(&self, table: &TableRef) -> String;

    /// Build the ordered extraction query.
    fn build_select_query(&self, opts: &SelectQueryOptions) -> String;

    /// Catalog query for primary key columns. Binds schema then table.
    fn primary_key_query(&self) -> &'static str;

    /// Catalog query for base tables. Binds the schema.
    fn list_tables_query(&self) -> &'static str;
}

/// Options for building a SELECT query.
#[derive(Debug, Clone)]
pub struct SelectQueryOptions {
    /// Table to read.
    pub table: TableRef,
    /// Columns to select.
    pub columns: Vec<String>,
    /// Ordering key columns.
    pub order_by: Vec<String>,
    /// Row limit.
    pub limit: Option<u64>,
}

impl From<&ReadRequest> for SelectQueryOptions {
    fn from(request: &ReadRequest) -> Self {
        Self {
            table: request.table.clone(),
            columns: request.columns.clone(),
            order_by: request.order_by.clone(),
            limit: request.limit,
        }
    }
}
