//! Deterministic row extraction.
//!
//! Rows are streamed in ordering-key order so that the n-th row of both sides
//! can be compared positionally. Batch size only affects buffering.

mod metadata;

pub use metadata::TableMetadataResolver;

use tracing::{debug, info, warn};

use crate::core::schema::TableMetadata;
use crate::core::traits::{ReadRequest, RowSource};
use crate::core::value::Row;
use crate::error::{ReconcileError, Result};

/// Outcome of extracting one side of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractionSummary {
    /// Rows delivered to the consumer.
    pub rows_read: u64,
    /// Whether the row cap cut the table short.
    pub truncated: bool,
}

/// Streams ordered rows of one table side to a consumer.
#[derive(Debug, Clone)]
pub struct DeterministicExtractor {
    batch_size: usize,
    max_rows: Option<u64>,
}

impl DeterministicExtractor {
    pub fn new(batch_size: usize, max_rows: Option<u64>) -> Self {
        Self {
            batch_size,
            max_rows,
        }
    }

    /// Extract all rows of `metadata.table`, handing them to `on_batch` in order.
    ///
    /// With a row cap the driver is asked for one extra row; seeing it marks
    /// the extraction as truncated. A stream that closes without its final
    /// batch is an error.
    pub async fn extract<F>(
        &self,
        source: &dyn RowSource,
        metadata: &TableMetadata,
        mut on_batch: F,
    ) -> Result<ExtractionSummary>
    where
        F: FnMut(Vec<Row>) -> Result<()>,
    {
        let table = metadata.table.full_name();
        let request = ReadRequest {
            table: metadata.table.clone(),
            columns: metadata.column_names(),
            order_by: metadata.ordering_key.clone(),
            batch_size: self.batch_size,
            limit: self.max_rows.map(|cap| cap.saturating_add(1)),
        };

        let mut rx = source.read_rows(request);
        let mut summary = ExtractionSummary::default();
        let mut finished = false;
        let mut batches = 0usize;

        while let Some(batch) = rx.recv().await {
            let batch = batch?;
            let is_last = batch.is_last;
            let mut rows = batch.rows;

            if let Some(cap) = self.max_rows {
                let remaining = cap.saturating_sub(summary.rows_read);
                if rows.len() as u64 > remaining {
                    rows.truncate(remaining as usize);
                    summary.truncated = true;
                }
            }

            summary.rows_read += rows.len() as u64;
            batches += 1;
            if !rows.is_empty() {
                on_batch(rows)?;
            }
            debug!("{}: batch {} done, {} rows so far", table, batches, summary.rows_read);

            if is_last {
                finished = true;
                break;
            }
        }

        if !finished {
            return Err(ReconcileError::extraction(
                table,
                format!(
                    "row stream closed before the final batch after {} rows",
                    summary.rows_read
                ),
            ));
        }

        if summary.truncated {
            warn!(
                "{}: stopped at the row cap of {} rows; remaining rows are not compared",
                table, summary.rows_read
            );
        } else {
            info!("{}: read {} rows from {}", table, summary.rows_read, source.db_type());
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::TableRef;
    use crate::core::testing::{MemorySource, MemoryTable};
    use crate::core::value::SqlValue;
    use crate::extract::TableMetadataResolver;

    fn five_rows() -> MemoryTable {
        MemoryTable::id_name(&[(1, "a"), (2, "b"), (3, "c"), (4, "d"), (5, "e")])
    }

    async fn run(
        source: &MemorySource,
        extractor: DeterministicExtractor,
    ) -> Result<(ExtractionSummary, Vec<Row>)> {
        let table = TableRef::new("DBO", "T");
        let meta = TableMetadataResolver::default().resolve(source, &table).await?;
        let mut seen = Vec::new();
        let summary = extractor
            .extract(source, &meta, |rows| {
                seen.extend(rows);
                Ok(())
            })
            .await?;
        Ok((summary, seen))
    }

    #[tokio::test]
    async fn test_batch_size_does_not_change_rows() {
        let source = MemorySource::new("mssql").with_table("DBO.T", five_rows());
        let (small, small_rows) = run(&source, DeterministicExtractor::new(2, None)).await.unwrap();
        let (large, large_rows) = run(&source, DeterministicExtractor::new(1000, None)).await.unwrap();
        assert_eq!(small.rows_read, 5);
        assert_eq!(large.rows_read, 5);
        assert_eq!(small_rows, large_rows);
        assert_eq!(small_rows[4].get("ID"), Some(&SqlValue::I32(5)));
    }

    #[tokio::test]
    async fn test_request_carries_ordering_and_cap_plus_one() {
        let source = MemorySource::new("mssql").with_table("DBO.T", five_rows());
        run(&source, DeterministicExtractor::new(10, Some(3))).await.unwrap();
        let request = &source.requests()[0];
        assert_eq!(request.order_by, vec!["ID"]);
        assert_eq!(request.columns, vec!["ID", "NAME"]);
        assert_eq!(request.limit, Some(4));
    }

    #[tokio::test]
    async fn test_row_cap_marks_truncation() {
        let source = MemorySource::new("mssql").with_table("DBO.T", five_rows());
        let (summary, rows) = run(&source, DeterministicExtractor::new(2, Some(3))).await.unwrap();
        assert_eq!(summary.rows_read, 3);
        assert!(summary.truncated);
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test]
    async fn test_row_cap_equal_to_table_size_is_not_truncation() {
        let source = MemorySource::new("mssql").with_table("DBO.T", five_rows());
        let (summary, _) = run(&source, DeterministicExtractor::new(2, Some(5))).await.unwrap();
        assert_eq!(summary.rows_read, 5);
        assert!(!summary.truncated);
    }

    #[tokio::test]
    async fn test_empty_table() {
        let source =
            MemorySource::new("mssql").with_table("DBO.T", MemoryTable::id_name(&[]));
        let (summary, rows) = run(&source, DeterministicExtractor::new(2, None)).await.unwrap();
        assert_eq!(summary, ExtractionSummary::default());
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_stream_without_final_batch_is_an_error() {
        let source = MemorySource::new("mssql")
            .with_table("DBO.T", five_rows())
            .without_final_batch();
        let err = run(&source, DeterministicExtractor::new(2, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Extraction { .. }));
        assert!(err.to_string().contains("final batch"));
    }

    #[tokio::test]
    async fn test_mid_stream_failure_aborts() {
        let source = MemorySource::new("mssql")
            .with_table("DBO.T", five_rows())
            .failing_after_rows(3);
        assert!(run(&source, DeterministicExtractor::new(2, None)).await.is_err());
    }

    #[tokio::test]
    async fn test_consumer_error_aborts() {
        let source = MemorySource::new("mssql").with_table("DBO.T", five_rows());
        let table = TableRef::new("DBO", "T");
        let meta = TableMetadataResolver::default()
            .resolve(&source, &table)
            .await
            .unwrap();
        let result = DeterministicExtractor::new(2, None)
            .extract(&source, &meta, |_| Err(ReconcileError::Metadata("stop".into())))
            .await;
        assert!(result.is_err());
    }
}
