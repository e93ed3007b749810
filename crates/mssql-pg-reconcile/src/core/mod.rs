//! Core types and traits shared by the drivers and the reconciliation engine.

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use identifier::{quote_mssql, quote_pg, validate_identifier};
pub use schema::{ColumnDescriptor, IdentifierCase, OrderingMode, TableMetadata, TableRef};
pub use traits::{Connector, Dialect, ReadRequest, RowSource, SelectQueryOptions};
pub use value::{Row, RowBatch, SqlValue};
