//! Table and column metadata types used by extraction and reconciliation.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::identifier::validate_identifier;
use crate::error::{ReconcileError, Result};

/// Casing convention applied to identifiers of one engine family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierCase {
    /// Fold to upper case.
    Upper,
    /// Fold to lower case.
    Lower,
    /// Leave identifiers as written.
    #[default]
    Preserve,
}

impl IdentifierCase {
    /// Apply the convention to an identifier.
    pub fn apply(&self, ident: &str) -> String {
        match self {
            IdentifierCase::Upper => ident.to_uppercase(),
            IdentifierCase::Lower => ident.to_lowercase(),
            IdentifierCase::Preserve => ident.to_string(),
        }
    }
}

/// A schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub name: String,
}

impl TableRef {
    /// Create a table reference without validation.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parse `schema.table`.
    ///
    /// The first dot separates schema from table; both parts must be valid
    /// identifiers.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let (schema, name) = input.split_once('.').ok_or_else(|| {
            ReconcileError::Config(format!(
                "Table reference '{}' must be schema-qualified (schema.table)",
                input
            ))
        })?;
        let (schema, name) = (schema.trim(), name.trim());
        validate_identifier(schema)?;
        validate_identifier(name)?;
        Ok(Self::new(schema, name))
    }

    /// Return a copy with the casing convention applied to both parts.
    pub fn normalized(&self, case: IdentifierCase) -> Self {
        Self::new(case.apply(&self.schema), case.apply(&self.name))
    }

    /// Get the fully qualified table name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// One projected column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name as reported by the driver.
    pub name: String,
    /// 1-based position in the projection.
    pub ordinal: usize,
    /// Whether the column is part of the ordering key.
    pub is_key: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            ordinal,
            is_key: false,
        }
    }
}

/// How the extraction order of a table was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingMode {
    /// Primary key columns (driver flag or catalog constraint).
    PrimaryKey,
    /// Degraded: every remaining column.
    AllColumns,
    /// No columns left to order by.
    Constant,
}

impl fmt::Display for OrderingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingMode::PrimaryKey => write!(f, "primary key"),
            OrderingMode::AllColumns => write!(f, "all columns"),
            OrderingMode::Constant => write!(f, "constant"),
        }
    }
}

/// Resolved metadata for one table on one side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMetadata {
    /// The table.
    pub table: TableRef,
    /// Projected columns after exclusions, in projection order.
    pub columns: Vec<ColumnDescriptor>,
    /// Columns used in `ORDER BY`, in order.
    pub ordering_key: Vec<String>,
    /// How `ordering_key` was chosen.
    pub ordering: OrderingMode,
}

impl TableMetadata {
    /// Names of the projected columns.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}
