//! PostgreSQL SQL dialect.

use crate::core::identifier::quote_pg;
use crate::core::schema::TableRef;
use crate::core::traits::{Dialect, SelectQueryOptions};

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_pg(name)
    }

    fn build_probe_query(&self, table: &TableRef) -> String {
        format!("SELECT * FROM {} WHERE 1 = 0", self.qualify(table))
    }

    fn build_select_query(&self, opts: &SelectQueryOptions) -> String {
        let cols = if opts.columns.is_empty() {
            "1 AS \"__row\"".to_string()
        } else {
            opts.columns
                .iter()
                .map(|c| self.quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", cols, self.qualify(&opts.table));

        // SQL Server sorts NULL before any value; match it so positions align
        if !opts.order_by.is_empty() {
            let order_by = opts
                .order_by
                .iter()
                .map(|c| format!("{} NULLS FIRST", self.quote_ident(c)))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {}", order_by));
        }

        if let Some(limit) = opts.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        sql
    }

    fn primary_key_query(&self) -> &'static str {
        r#"
            SELECT a.attname::text
            FROM pg_index i
            JOIN pg_class c ON c.oid = i.indrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            JOIN LATERAL unnest(i.indkey) WITH ORDINALITY AS k(attnum, ord) ON true
            JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
            WHERE i.indisprimary
              AND n.nspname = $1
              AND c.relname = $2
            ORDER BY k.ord
        "#
    }

    fn list_tables_query(&self) -> &'static str {
        r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_type = 'BASE TABLE'
              AND table_schema = $1
            ORDER BY table_name
        "#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_query() {
        let d = PostgresDialect::new();
        assert_eq!(d.name(), "postgres");
        assert_eq!(
            d.build_probe_query(&TableRef::new("public", "orders")),
            "SELECT * FROM \"public\".\"orders\" WHERE 1 = 0"
        );
    }

    #[test]
    fn test_select_with_key_and_limit() {
        let sql = PostgresDialect::new().build_select_query(&SelectQueryOptions {
            table: TableRef::new("public", "orders"),
            columns: vec!["id".into(), "total".into()],
            order_by: vec!["id".into()],
            limit: Some(11),
        });
        assert_eq!(
            sql,
            "SELECT \"id\", \"total\" FROM \"public\".\"orders\" ORDER BY \"id\" NULLS FIRST LIMIT 11"
        );
    }

    #[test]
    fn test_every_ordering_column_puts_nulls_first() {
        let sql = PostgresDialect::new().build_select_query(&SelectQueryOptions {
            table: TableRef::new("s", "t"),
            columns: vec!["a".into(), "b".into()],
            order_by: vec!["a".into(), "b".into()],
            limit: None,
        });
        assert_eq!(
            sql,
            "SELECT \"a\", \"b\" FROM \"s\".\"t\" ORDER BY \"a\" NULLS FIRST, \"b\" NULLS FIRST"
        );
    }

    #[test]
    fn test_select_without_columns() {
        let sql = PostgresDialect::new().build_select_query(&SelectQueryOptions {
            table: TableRef::new("public", "audit"),
            columns: vec![],
            order_by: vec![],
            limit: None,
        });
        assert_eq!(sql, "SELECT 1 AS \"__row\" FROM \"public\".\"audit\"");
    }
}
