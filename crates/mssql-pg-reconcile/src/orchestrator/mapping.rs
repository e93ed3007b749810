//! Table selection and source/target pairing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::schema::{IdentifierCase, TableRef};
use crate::error::{ReconcileError, Result};

/// A source table and the target table it is reconciled against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePair {
    pub source: TableRef,
    pub target: TableRef,
}

impl TablePair {
    pub fn new(source: TableRef, target: TableRef) -> Self {
        Self { source, target }
    }

    /// `SOURCE -> target` label.
    pub fn label(&self) -> String {
        format!("{} -> {}", self.source, self.target)
    }
}

/// Which tables a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSelection {
    /// Every source table with a same-named target table.
    All,
    /// Explicit pairs in the configured order.
    Explicit(Vec<TablePair>),
}

impl TableSelection {
    /// Parse `ALL` or a comma-separated `SRC.TABLE=tgt.table` list.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.eq_ignore_ascii_case("all") {
            return Ok(TableSelection::All);
        }

        let mut pairs = Vec::new();
        for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (source, target) = entry.split_once('=').ok_or_else(|| {
                ReconcileError::Config(format!(
                    "Invalid table mapping '{}': expected SOURCE_SCHEMA.TABLE=TARGET_SCHEMA.TABLE",
                    entry
                ))
            })?;
            pairs.push(TablePair::new(
                TableRef::parse(source.trim())?,
                TableRef::parse(target.trim())?,
            ));
        }

        if pairs.is_empty() {
            return Err(ReconcileError::Config(
                "reconcile.tables must be ALL or at least one SOURCE=TARGET mapping".into(),
            ));
        }
        Ok(TableSelection::Explicit(pairs))
    }

    /// Apply each side's identifier casing to explicit pairs.
    pub fn normalize(self, source_case: IdentifierCase, target_case: IdentifierCase) -> Self {
        match self {
            TableSelection::All => TableSelection::All,
            TableSelection::Explicit(pairs) => TableSelection::Explicit(
                pairs
                    .into_iter()
                    .map(|p| {
                        TablePair::new(
                            p.source.normalized(source_case),
                            p.target.normalized(target_case),
                        )
                    })
                    .collect(),
            ),
        }
    }
}

/// Pair discovered tables by case-insensitive name, in source order.
///
/// Catalog names are kept as reported on each side.
pub fn match_all(
    source_schema: &str,
    source_tables: &[String],
    target_schema: &str,
    target_tables: &[String],
) -> Vec<TablePair> {
    let by_name: HashMap<String, &String> = target_tables
        .iter()
        .map(|t| (t.to_lowercase(), t))
        .collect();

    let mut pairs = Vec::new();
    for name in source_tables {
        match by_name.get(&name.to_lowercase()) {
            Some(target) => pairs.push(TablePair::new(
                TableRef::new(source_schema, name.as_str()),
                TableRef::new(target_schema, target.as_str()),
            )),
            None => warn!(
                "{}.{} has no counterpart in target schema {}, skipping",
                source_schema, name, target_schema
            ),
        }
    }

    for name in target_tables {
        if !source_tables.iter().any(|s| s.eq_ignore_ascii_case(name)) {
            warn!(
                "{}.{} has no counterpart in source schema {}, skipping",
                target_schema, name, source_schema
            );
        }
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all() {
        assert_eq!(TableSelection::parse("ALL").unwrap(), TableSelection::All);
        assert_eq!(TableSelection::parse(" all ").unwrap(), TableSelection::All);
    }

    #[test]
    fn test_parse_explicit_pairs_keep_order() {
        let sel = TableSelection::parse("DBO.ORDERS=public.orders, DBO.ITEMS=public.items").unwrap();
        let TableSelection::Explicit(pairs) = sel else {
            panic!("expected explicit selection");
        };
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].source, TableRef::new("DBO", "ORDERS"));
        assert_eq!(pairs[0].target, TableRef::new("public", "orders"));
        assert_eq!(pairs[1].label(), "DBO.ITEMS -> public.items");
    }

    #[test]
    fn test_parse_rejects_malformed_entries() {
        assert!(TableSelection::parse("DBO.ORDERS").is_err());
        assert!(TableSelection::parse("ORDERS=public.orders").is_err());
        assert!(TableSelection::parse("").is_err());
        assert!(TableSelection::parse(" , ").is_err());
    }

    #[test]
    fn test_normalize_applies_each_sides_case() {
        let sel = TableSelection::parse("dbo.Orders=Public.Orders")
            .unwrap()
            .normalize(IdentifierCase::Upper, IdentifierCase::Lower);
        let TableSelection::Explicit(pairs) = sel else {
            panic!("expected explicit selection");
        };
        assert_eq!(pairs[0].source, TableRef::new("DBO", "ORDERS"));
        assert_eq!(pairs[0].target, TableRef::new("public", "orders"));
    }

    #[test]
    fn test_match_all_is_case_insensitive() {
        let source = vec!["ORDERS".to_string(), "ITEMS".to_string(), "AUDIT".to_string()];
        let target = vec!["items".to_string(), "orders".to_string(), "extra".to_string()];
        let pairs = match_all("DBO", &source, "public", &target);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].label(), "DBO.ORDERS -> public.orders");
        assert_eq!(pairs[1].label(), "DBO.ITEMS -> public.items");
    }
}
