//! MSSQL SQL dialect.

use crate::core::identifier::quote_mssql;
use crate::core::schema::TableRef;
use crate::core::traits::{Dialect, SelectQueryOptions};

/// Microsoft SQL Server dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct MssqlDialect;

impl MssqlDialect {
    /// Create a new MSSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for MssqlDialect {
    fn name(&self) -> &str {
        "mssql"
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_mssql(name)
    }

    fn build_probe_query(&self, table: &TableRef) -> String {
        format!("SELECT TOP 0 * FROM {}", self.qualify(table))
    }

    fn build_select_query(&self, opts: &SelectQueryOptions) -> String {
        let cols = if opts.columns.is_empty() {
            "1 AS [__row]".to_string()
        } else {
            opts.columns
                .iter()
                .map(|c| self.quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let top = opts
            .limit
            .map(|n| format!("TOP ({}) ", n))
            .unwrap_or_default();

        // ORDER BY is mandatory; a constant expression keeps the plan legal
        let order_by = if opts.order_by.is_empty() {
            "(SELECT NULL)".to_string()
        } else {
            opts.order_by
                .iter()
                .map(|c| self.quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        format!(
            "SELECT {}{} FROM {} ORDER BY {}",
            top,
            cols,
            self.qualify(&opts.table),
            order_by
        )
    }

    fn primary_key_query(&self) -> &'static str {
        r#"
            SELECT c.COLUMN_NAME
            FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
            JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE c
                ON c.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
                AND c.TABLE_SCHEMA = tc.TABLE_SCHEMA
                AND c.TABLE_NAME = tc.TABLE_NAME
            WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
              AND tc.TABLE_SCHEMA = @P1
              AND tc.TABLE_NAME = @P2
            ORDER BY c.ORDINAL_POSITION
        "#
    }

    fn list_tables_query(&self) -> &'static str {
        r#"
            SELECT t.TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES t
            WHERE t.TABLE_TYPE = 'BASE TABLE'
              AND t.TABLE_SCHEMA = @P1
            ORDER BY t.TABLE_NAME
        "#
    }
}
