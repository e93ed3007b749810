//! Row-level reconciliation of a table pair.
//!
//! # Pipeline
//!
//! 1. Resolve metadata on both sides (projection minus exclusions, ordering key)
//! 2. Extract both sides concurrently in ordering-key order
//! 3. Fingerprint every row into `(index, hash, key evidence)`
//! 4. Classify each positional index as match, mismatch, missing or extra
//!
//! Any failure on either side turns the table into an errored
//! [`ComparisonResult`]; it never aborts the run.

mod export;
mod fingerprint;
mod normalize;
mod reconcile;
mod types;

pub use export::CsvExporter;
pub use fingerprint::{FingerprintSet, HashAlgorithm, KeyValues, RowFingerprint, RowFingerprinter};
pub use normalize::{LexicalCanonicalizer, ValueCanonicalizer, NULL_TOKEN};
pub use reconcile::ReconciliationEngine;
pub use types::{ComparisonOutcome, ComparisonResult, RowEvidence, RunSummary};

use std::time::Instant;

use tracing::{info, warn};

use crate::config::ReconcileConfig;
use crate::core::schema::{TableMetadata, TableRef};
use crate::core::traits::RowSource;
use crate::error::Result;
use crate::extract::{DeterministicExtractor, ExtractionSummary, TableMetadataResolver};
use crate::orchestrator::TablePair;

/// Fingerprints of one fully extracted side.
struct SideFingerprints {
    metadata: TableMetadata,
    set: FingerprintSet,
    extraction: ExtractionSummary,
}

/// Reconciles one table pair end to end.
#[derive(Debug, Clone)]
pub struct TableAuditor {
    source_resolver: TableMetadataResolver,
    target_resolver: TableMetadataResolver,
    extractor: DeterministicExtractor,
    fingerprinter: RowFingerprinter,
    engine: ReconciliationEngine,
    exporter: Option<CsvExporter>,
}

impl TableAuditor {
    /// Build an auditor from the reconcile settings.
    pub fn new(config: &ReconcileConfig) -> Self {
        Self {
            source_resolver: TableMetadataResolver::new(config.source_skip_columns.clone()),
            target_resolver: TableMetadataResolver::new(config.target_skip_columns.clone()),
            extractor: DeterministicExtractor::new(config.batch_size, config.max_rows_per_table),
            fingerprinter: RowFingerprinter::new(config.hash_algorithm),
            engine: ReconciliationEngine::new(config.max_evidence_rows),
            exporter: config.csv_export_dir.clone().map(CsvExporter::new),
        }
    }

    /// Replace the fingerprinter (e.g. to use a custom canonicalizer).
    pub fn with_fingerprinter(mut self, fingerprinter: RowFingerprinter) -> Self {
        self.fingerprinter = fingerprinter;
        self
    }

    /// Reconcile one table pair. Never fails: errors end up in the result.
    pub async fn audit(
        &self,
        source: &dyn RowSource,
        target: &dyn RowSource,
        pair: &TablePair,
    ) -> ComparisonResult {
        let start = Instant::now();
        let label = pair.label();
        info!("Reconciling {}", label);

        let (src, tgt) = tokio::join!(
            self.collect_side(source, &pair.source, &self.source_resolver),
            self.collect_side(target, &pair.target, &self.target_resolver),
        );

        let mut result = match (src, tgt) {
            (Ok(src), Ok(tgt)) => {
                let mut result = self.engine.reconcile(
                    &pair.source.full_name(),
                    &pair.target.full_name(),
                    &src.set,
                    &tgt.set,
                );
                result.source_truncated = src.extraction.truncated;
                result.target_truncated = tgt.extraction.truncated;
                result.source_ordering = Some(src.metadata.ordering);
                result.target_ordering = Some(tgt.metadata.ordering);
                self.export(pair, &src.set, &tgt.set);
                result
            }
            (src, tgt) => {
                let mut result =
                    ComparisonResult::new(pair.source.full_name(), pair.target.full_name());
                let mut errors = Vec::new();
                match src {
                    Ok(side) => result.source_row_count = side.extraction.rows_read,
                    Err(e) => errors.push(format!("source: {}", e)),
                }
                match tgt {
                    Ok(side) => result.target_row_count = side.extraction.rows_read,
                    Err(e) => errors.push(format!("target: {}", e)),
                }
                let message = errors.join("; ");
                warn!("{} failed: {}", label, message);
                result.with_error(message)
            }
        };

        result.duration_ms = start.elapsed().as_millis() as u64;
        if result.is_match() {
            info!(
                "{}: {} rows match ({}ms)",
                label, result.matching_rows, result.duration_ms
            );
        } else if !result.is_error() {
            warn!(
                "{}: {} matching, {} mismatched, {} missing, {} extra",
                label,
                result.matching_rows,
                result.mismatched_rows,
                result.missing_rows,
                result.extra_rows
            );
        }
        result
    }

    async fn collect_side(
        &self,
        source: &dyn RowSource,
        table: &TableRef,
        resolver: &TableMetadataResolver,
    ) -> Result<SideFingerprints> {
        let metadata = resolver.resolve(source, table).await?;
        // Evidence follows the ordering key; without a primary key that is
        // every projected column.
        let mut set = FingerprintSet::new(metadata.ordering_key.clone());
        let extraction = self
            .extractor
            .extract(source, &metadata, |rows| {
                for row in &rows {
                    set.add_row(&self.fingerprinter, row);
                }
                Ok(())
            })
            .await?;

        Ok(SideFingerprints {
            metadata,
            set,
            extraction,
        })
    }

    fn export(&self, pair: &TablePair, source: &FingerprintSet, target: &FingerprintSet) {
        let Some(exporter) = &self.exporter else {
            return;
        };
        for (table, side, set) in [
            (&pair.source, "source", source),
            (&pair.target, "target", target),
        ] {
            if let Err(e) = exporter.export(table, side, set) {
                warn!("{}: hash export for {} side failed: {}", pair.label(), side, e);
            }
        }
    }
}
