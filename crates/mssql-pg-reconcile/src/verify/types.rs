//! Reconciliation result types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fingerprint::{HashAlgorithm, KeyValues, RowFingerprint};
use crate::core::schema::OrderingMode;
use crate::error::Result;

/// One side's view of an anomalous row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowEvidence {
    /// Positional index of the row.
    pub index: u64,
    /// Row fingerprint.
    pub hash: String,
    /// Ordering-key values in key order, empty when ordering is constant.
    pub key_values: KeyValues,
}

impl RowEvidence {
    /// Canonical value of one key column.
    pub fn key_value(&self, column: &str) -> Option<&str> {
        self.key_values
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
    }
}

impl From<&RowFingerprint> for RowEvidence {
    fn from(fp: &RowFingerprint) -> Self {
        Self {
            index: fp.index,
            hash: fp.hash.clone(),
            key_values: fp.primary_key_values.clone(),
        }
    }
}

impl fmt::Display for RowEvidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key_values.is_empty() {
            return write!(f, "row {}", self.index);
        }
        let keys = self
            .key_values
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "row {} ({})", self.index, keys)
    }
}

/// Classification of one positional index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ComparisonOutcome {
    /// Same hash on both sides.
    Match,
    /// Different hashes at the same index.
    Mismatch {
        source: RowEvidence,
        target: RowEvidence,
    },
    /// Index exists only on the source side.
    Missing { source: RowEvidence },
    /// Index exists only on the target side.
    Extra { target: RowEvidence },
}

impl fmt::Display for ComparisonOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonOutcome::Match => write!(f, "match"),
            ComparisonOutcome::Mismatch { source, target } => {
                write!(f, "mismatch: source {} vs target {}", source, target)
            }
            ComparisonOutcome::Missing { source } => write!(f, "missing in target: {}", source),
            ComparisonOutcome::Extra { target } => write!(f, "extra in target: {}", target),
        }
    }
}

/// Reconciliation result for one table pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Source table (schema-qualified).
    pub source_table: String,
    /// Target table (schema-qualified).
    pub target_table: String,
    /// Rows extracted from the source.
    pub source_row_count: u64,
    /// Rows extracted from the target.
    pub target_row_count: u64,
    pub matching_rows: u64,
    pub mismatched_rows: u64,
    pub missing_rows: u64,
    pub extra_rows: u64,
    /// First mismatches, up to the evidence limit.
    pub mismatches: Vec<ComparisonOutcome>,
    /// First missing rows, up to the evidence limit.
    pub missing: Vec<ComparisonOutcome>,
    /// First extra rows, up to the evidence limit.
    pub extra: Vec<ComparisonOutcome>,
    /// Terminal error, if the table could not be reconciled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub source_truncated: bool,
    pub target_truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ordering: Option<OrderingMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_ordering: Option<OrderingMode>,
    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl ComparisonResult {
    /// Empty result for a table pair.
    pub fn new(source_table: impl Into<String>, target_table: impl Into<String>) -> Self {
        Self {
            source_table: source_table.into(),
            target_table: target_table.into(),
            source_row_count: 0,
            target_row_count: 0,
            matching_rows: 0,
            mismatched_rows: 0,
            missing_rows: 0,
            extra_rows: 0,
            mismatches: Vec::new(),
            missing: Vec::new(),
            extra: Vec::new(),
            error: None,
            source_truncated: false,
            target_truncated: false,
            source_ordering: None,
            target_ordering: None,
            duration_ms: 0,
        }
    }

    /// Mark the table as errored. Classification is discarded; row counts stay.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.matching_rows = 0;
        self.mismatched_rows = 0;
        self.missing_rows = 0;
        self.extra_rows = 0;
        self.mismatches.clear();
        self.missing.clear();
        self.extra.clear();
        self.error = Some(message.into());
        self
    }

    /// `SOURCE -> target` label.
    pub fn label(&self) -> String {
        format!("{} -> {}", self.source_table, self.target_table)
    }

    /// Check if the table reconciled without anomalies or errors.
    pub fn is_match(&self) -> bool {
        self.error.is_none()
            && self.mismatched_rows == 0
            && self.missing_rows == 0
            && self.extra_rows == 0
    }

    /// Check if the table errored.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Matching rows as a percentage of source rows.
    pub fn match_percentage(&self) -> f64 {
        percentage(self.matching_rows, self.source_row_count, self.target_row_count)
    }
}

fn percentage(matching: u64, source: u64, target: u64) -> f64 {
    match (source, target) {
        (0, 0) => 100.0,
        (0, _) => 0.0,
        _ => matching as f64 / source as f64 * 100.0,
    }
}

/// Aggregate of all table results in a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run identifier.
    pub run_id: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run completed.
    pub completed_at: DateTime<Utc>,
    /// Results in processing order.
    pub tables: Vec<ComparisonResult>,
    pub hash_algorithm: HashAlgorithm,
    pub total_source_rows: u64,
    pub total_target_rows: u64,
    pub total_matching_rows: u64,
    pub tables_matched: usize,
    pub tables_with_differences: usize,
    pub tables_errored: usize,
    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn new(hash_algorithm: HashAlgorithm) -> Self {
        Self {
            hash_algorithm,
            ..Default::default()
        }
    }

    /// Append a table result.
    pub fn add(&mut self, result: ComparisonResult) {
        self.total_source_rows += result.source_row_count;
        self.total_target_rows += result.target_row_count;
        self.total_matching_rows += result.matching_rows;
        if result.is_error() {
            self.tables_errored += 1;
        } else if result.is_match() {
            self.tables_matched += 1;
        } else {
            self.tables_with_differences += 1;
        }
        self.tables.push(result);
    }

    /// Check if every table matched. A run with no tables passes.
    pub fn is_pass(&self) -> bool {
        self.tables.iter().all(ComparisonResult::is_match)
    }

    /// Matching rows as a percentage of all source rows.
    pub fn match_percentage(&self) -> f64 {
        percentage(
            self.total_matching_rows,
            self.total_source_rows,
            self.total_target_rows,
        )
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
