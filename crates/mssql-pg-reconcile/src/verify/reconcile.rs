//! Positional reconciliation of two fingerprint sets.
//!
//! Rows are aligned purely by index: row n of the source is compared with row
//! n of the target. A row deleted in the middle of the target therefore shows
//! up as a run of mismatches followed by one missing row.

use super::fingerprint::FingerprintSet;
use super::types::{ComparisonOutcome, ComparisonResult, RowEvidence};

/// Classifies every positional index of a table pair.
#[derive(Debug, Clone, Copy)]
pub struct ReconciliationEngine {
    evidence_limit: usize,
}

impl ReconciliationEngine {
    /// Engine keeping at most `evidence_limit` entries per evidence list.
    pub fn new(evidence_limit: usize) -> Self {
        Self { evidence_limit }
    }

    /// Classify every index: source indices in ascending order, then target
    /// indices beyond the end of the source.
    pub fn outcomes<'a>(
        source: &'a FingerprintSet,
        target: &'a FingerprintSet,
    ) -> impl Iterator<Item = ComparisonOutcome> + 'a {
        let paired = source.iter().map(move |s| match target.get(s.index) {
            Some(t) if t.hash == s.hash => ComparisonOutcome::Match,
            Some(t) => ComparisonOutcome::Mismatch {
                source: RowEvidence::from(s),
                target: RowEvidence::from(t),
            },
            None => ComparisonOutcome::Missing {
                source: RowEvidence::from(s),
            },
        });
        let extra = target
            .iter()
            .skip(source.len())
            .map(|t| ComparisonOutcome::Extra {
                target: RowEvidence::from(t),
            });
        paired.chain(extra)
    }

    /// Reconcile two complete fingerprint sets.
    pub fn reconcile(
        &self,
        source_table: &str,
        target_table: &str,
        source: &FingerprintSet,
        target: &FingerprintSet,
    ) -> ComparisonResult {
        let mut result = ComparisonResult::new(source_table, target_table);
        result.source_row_count = source.len() as u64;
        result.target_row_count = target.len() as u64;

        let limit = self.evidence_limit;
        for outcome in Self::outcomes(source, target) {
            let (count, list) = match outcome {
                ComparisonOutcome::Match => {
                    result.matching_rows += 1;
                    continue;
                }
                ComparisonOutcome::Mismatch { .. } => {
                    (&mut result.mismatched_rows, &mut result.mismatches)
                }
                ComparisonOutcome::Missing { .. } => (&mut result.missing_rows, &mut result.missing),
                ComparisonOutcome::Extra { .. } => (&mut result.extra_rows, &mut result.extra),
            };
            *count += 1;
            if list.len() < limit {
                list.push(outcome);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::{Row, SqlValue};
    use crate::verify::fingerprint::{HashAlgorithm, RowFingerprinter};

    fn set(rows: &[(i32, &str)]) -> FingerprintSet {
        let fp = RowFingerprinter::new(HashAlgorithm::Sha256);
        let mut set = FingerprintSet::new(vec!["ID".into()]);
        for (id, name) in rows {
            let row: Row = [("ID", SqlValue::I32(*id)), ("NAME", SqlValue::from(*name))]
                .into_iter()
                .collect();
            set.add_row(&fp, &row);
        }
        set
    }

    fn engine() -> ReconciliationEngine {
        ReconciliationEngine::new(10)
    }

    const FIVE: [(i32, &str); 5] = [(1, "a"), (2, "b"), (3, "c"), (4, "d"), (5, "e")];

    #[test]
    fn test_exact_match() {
        let rows = [(1, "a"), (2, "b"), (3, "c")];
        let r = engine().reconcile("S", "T", &set(&rows), &set(&rows));
        assert_eq!(r.matching_rows, 3);
        assert_eq!(r.mismatched_rows + r.missing_rows + r.extra_rows, 0);
        assert!(r.is_match());
    }

    #[test]
    fn test_single_value_change_is_one_mismatch() {
        let src = set(&[(1, "a"), (2, "b"), (3, "c")]);
        let tgt = set(&[(1, "a"), (2, "B"), (3, "c")]);
        let r = engine().reconcile("S", "T", &src, &tgt);
        assert_eq!(r.matching_rows, 2);
        assert_eq!(r.mismatched_rows, 1);
        match &r.mismatches[0] {
            ComparisonOutcome::Mismatch { source, target } => {
                assert_eq!(source.index, 2);
                assert_eq!(source.key_value("ID"), Some("2"));
                assert_eq!(target.key_value("ID"), Some("2"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(!r.is_match());
    }

    #[test]
    fn test_tail_deletion_is_missing() {
        let r = engine().reconcile("S", "T", &set(&FIVE), &set(&FIVE[..4]));
        assert_eq!(r.matching_rows, 4);
        assert_eq!(r.mismatched_rows, 0);
        assert_eq!(r.missing_rows, 1);
        match &r.missing[0] {
            ComparisonOutcome::Missing { source } => assert_eq!(source.index, 5),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_middle_deletion_shifts_positions() {
        let tgt = set(&[(1, "a"), (2, "b"), (4, "d"), (5, "e")]);
        let r = engine().reconcile("S", "T", &set(&FIVE), &tgt);
        assert_eq!(r.matching_rows, 2);
        assert_eq!(r.mismatched_rows, 2);
        assert_eq!(r.missing_rows, 1);
        let indices: Vec<u64> = r
            .mismatches
            .iter()
            .map(|o| match o {
                ComparisonOutcome::Mismatch { source, .. } => source.index,
                _ => 0,
            })
            .collect();
        assert_eq!(indices, vec![3, 4]);
        match &r.missing[0] {
            ComparisonOutcome::Missing { source } => assert_eq!(source.index, 5),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_target_surplus_is_extra() {
        let r = engine().reconcile("S", "T", &set(&FIVE[..3]), &set(&FIVE));
        assert_eq!(r.matching_rows, 3);
        assert_eq!(r.extra_rows, 2);
        match &r.extra[1] {
            ComparisonOutcome::Extra { target } => assert_eq!(target.index, 5),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_evidence_is_capped_but_counts_are_not() {
        let src: Vec<(i32, &str)> = (1..=20).map(|i| (i, "x")).collect();
        let tgt: Vec<(i32, &str)> = (1..=20).map(|i| (i, "y")).collect();
        let r = ReconciliationEngine::new(3).reconcile("S", "T", &set(&src), &set(&tgt));
        assert_eq!(r.mismatched_rows, 20);
        assert_eq!(r.mismatches.len(), 3);
    }

    #[test]
    fn test_both_empty() {
        let r = engine().reconcile("S", "T", &set(&[]), &set(&[]));
        assert!(r.is_match());
        assert_eq!(r.match_percentage(), 100.0);
    }
}
