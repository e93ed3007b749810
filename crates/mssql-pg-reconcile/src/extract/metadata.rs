//! Table metadata resolution: projection and ordering key per side.

use tracing::{debug, warn};

use crate::core::schema::{ColumnDescriptor, OrderingMode, TableMetadata, TableRef};
use crate::core::traits::RowSource;
use crate::error::Result;

/// Resolves the projected columns and the ordering key of a table.
#[derive(Debug, Clone, Default)]
pub struct TableMetadataResolver {
    excluded: Vec<String>,
}

impl TableMetadataResolver {
    /// Resolver that drops `excluded` columns (case-insensitive).
    pub fn new(excluded: Vec<String>) -> Self {
        Self { excluded }
    }

    fn is_excluded(&self, column: &str) -> bool {
        self.excluded.iter().any(|e| e.eq_ignore_ascii_case(column))
    }

    /// Resolve metadata for one table.
    ///
    /// The ordering key is, in order of preference: key columns flagged by the
    /// probe, primary key columns from the catalog, every projected column.
    /// A probe failure is returned; a catalog failure only degrades ordering.
    pub async fn resolve(&self, source: &dyn RowSource, table: &TableRef) -> Result<TableMetadata> {
        let probed = source.probe_columns(table).await?;

        let mut columns: Vec<ColumnDescriptor> = probed
            .into_iter()
            .filter(|c| !self.is_excluded(&c.name))
            .collect();
        for (i, col) in columns.iter_mut().enumerate() {
            col.ordinal = i + 1;
        }

        let flagged: Vec<String> = columns
            .iter()
            .filter(|c| c.is_key)
            .map(|c| c.name.clone())
            .collect();

        let key = if !flagged.is_empty() {
            flagged
        } else {
            match source.primary_key_columns(table).await {
                Ok(pk) => pk
                    .iter()
                    .filter_map(|k| {
                        columns
                            .iter()
                            .find(|c| c.name.eq_ignore_ascii_case(k))
                            .map(|c| c.name.clone())
                    })
                    .collect(),
                Err(e) => {
                    warn!(
                        "{}: primary key lookup failed, continuing without one: {}",
                        table, e
                    );
                    Vec::new()
                }
            }
        };

        let (ordering_key, ordering) = if !key.is_empty() {
            (key, OrderingMode::PrimaryKey)
        } else if !columns.is_empty() {
            warn!(
                "{}: no primary key available, ordering by all {} columns; rows with duplicate values may align arbitrarily",
                table,
                columns.len()
            );
            (
                columns.iter().map(|c| c.name.clone()).collect(),
                OrderingMode::AllColumns,
            )
        } else {
            warn!("{}: no comparable columns remain, ordering is constant", table);
            (Vec::new(), OrderingMode::Constant)
        };

        for col in columns.iter_mut() {
            col.is_key = ordering == OrderingMode::PrimaryKey
                && ordering_key.iter().any(|k| k == &col.name);
        }

        debug!(
            "{}: {} columns, ordering by {:?} ({})",
            table,
            columns.len(),
            ordering_key,
            ordering
        );

        Ok(TableMetadata {
            table: table.clone(),
            columns,
            ordering_key,
            ordering,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{MemorySource, MemoryTable};

    fn orders() -> MemoryTable {
        MemoryTable::new(&["ORDER_ID", "LINE_NO", "SKU", "ROWVERSION"]).primary_key(&["ORDER_ID", "LINE_NO"])
    }

    #[tokio::test]
    async fn test_catalog_primary_key_in_constraint_order() {
        let source = MemorySource::new("mssql").with_table("DBO.LINES", orders());
        let meta = TableMetadataResolver::default()
            .resolve(&source, &TableRef::new("DBO", "LINES"))
            .await
            .unwrap();
        assert_eq!(meta.ordering, OrderingMode::PrimaryKey);
        assert_eq!(meta.ordering_key, vec!["ORDER_ID", "LINE_NO"]);
        assert_eq!(meta.columns.len(), 4);
        assert!(meta.columns[0].is_key && meta.columns[1].is_key && !meta.columns[2].is_key);
    }

    #[tokio::test]
    async fn test_exclusions_are_case_insensitive() {
        let source = MemorySource::new("mssql").with_table("DBO.LINES", orders());
        let meta = TableMetadataResolver::new(vec!["rowversion".into()])
            .resolve(&source, &TableRef::new("DBO", "LINES"))
            .await
            .unwrap();
        assert_eq!(meta.column_names(), vec!["ORDER_ID", "LINE_NO", "SKU"]);
        assert_eq!(meta.columns[2].ordinal, 3);
    }

    #[tokio::test]
    async fn test_excluded_key_column_is_dropped_from_key() {
        let source = MemorySource::new("mssql").with_table("DBO.LINES", orders());
        let meta = TableMetadataResolver::new(vec!["LINE_NO".into()])
            .resolve(&source, &TableRef::new("DBO", "LINES"))
            .await
            .unwrap();
        assert_eq!(meta.ordering_key, vec!["ORDER_ID"]);
    }

    #[tokio::test]
    async fn test_flagged_key_wins_over_catalog() {
        let table = orders().flagged_keys(&["SKU"]);
        let source = MemorySource::new("mssql").with_table("DBO.LINES", table);
        let meta = TableMetadataResolver::default()
            .resolve(&source, &TableRef::new("DBO", "LINES"))
            .await
            .unwrap();
        assert_eq!(meta.ordering_key, vec!["SKU"]);
        assert_eq!(meta.ordering, OrderingMode::PrimaryKey);
    }

    #[tokio::test]
    async fn test_catalog_failure_degrades_to_all_columns() {
        let source = MemorySource::new("postgres")
            .with_table("public.lines", orders())
            .failing_pk_lookup();
        let meta = TableMetadataResolver::default()
            .resolve(&source, &TableRef::new("public", "lines"))
            .await
            .unwrap();
        assert_eq!(meta.ordering, OrderingMode::AllColumns);
        assert_eq!(meta.ordering_key, meta.column_names());
        assert!(meta.columns.iter().all(|c| !c.is_key));
    }

    #[tokio::test]
    async fn test_no_columns_means_constant_ordering() {
        let source = MemorySource::new("postgres").with_table("public.lines", orders());
        let meta = TableMetadataResolver::new(vec![
            "order_id".into(),
            "line_no".into(),
            "sku".into(),
            "rowversion".into(),
        ])
        .resolve(&source, &TableRef::new("public", "lines"))
        .await
        .unwrap();
        assert!(meta.columns.is_empty());
        assert_eq!(meta.ordering, OrderingMode::Constant);
        assert!(meta.ordering_key.is_empty());
    }

    #[tokio::test]
    async fn test_probe_failure_is_fatal() {
        let source = MemorySource::new("mssql")
            .with_table("DBO.LINES", orders())
            .failing_probe();
        let result = TableMetadataResolver::default()
            .resolve(&source, &TableRef::new("DBO", "LINES"))
            .await;
        assert!(result.is_err());
    }
}
