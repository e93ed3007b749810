//! Database driver implementations.
//!
//! - [`mssql`]: Microsoft SQL Server driver (Tiberius)
//! - [`postgres`]: PostgreSQL driver (tokio-postgres)
//! - [`common`]: Shared utilities (TLS, statement timeouts)
//!
//! Each driver pairs a `Dialect` for SQL generation with a `RowSource`
//! reader. [`DriverConnector`] picks the driver for one side from its
//! configuration and opens a fresh connection per call.

pub mod common;
pub mod mssql;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;

pub use common::SslMode;
pub use mssql::{MssqlDialect, MssqlReader};
pub use postgres::{PostgresDialect, PostgresReader};

use crate::config::{ConnectionConfig, DatabaseKind};
use crate::core::schema::IdentifierCase;
use crate::core::traits::{Connector, RowSource};
use crate::error::Result;

/// Opens connections for one configured side.
#[derive(Debug, Clone)]
pub struct DriverConnector {
    config: ConnectionConfig,
    timeout: Duration,
}

impl DriverConnector {
    /// Create a connector; `timeout` bounds connecting and every statement.
    pub fn new(config: ConnectionConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    /// Engine of this side.
    pub fn kind(&self) -> DatabaseKind {
        self.config.r#type
    }
}

#[async_trait]
impl Connector for DriverConnector {
    async fn connect(&self) -> Result<Box<dyn RowSource>> {
        let source: Box<dyn RowSource> = match self.config.r#type {
            DatabaseKind::Mssql => Box::new(MssqlReader::connect(&self.config, self.timeout).await?),
            DatabaseKind::Postgres => {
                Box::new(PostgresReader::connect(&self.config, self.timeout).await?)
            }
        };
        Ok(source)
    }

    fn identifier_case(&self) -> IdentifierCase {
        self.config.effective_identifier_case()
    }

    fn schema(&self) -> String {
        self.config.effective_schema()
    }

    fn describe(&self) -> String {
        self.config.describe()
    }
}
