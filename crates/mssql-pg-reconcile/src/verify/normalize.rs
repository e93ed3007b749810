//! Lexical value canonicalization.
//!
//! Every value is turned into a string before hashing. The rules below are
//! purely lexical: equal strings hash equally, and anything that renders
//! differently (`1.50` vs `1.5`) is a mismatch. Implement
//! [`ValueCanonicalizer`] to plug in per-type rules.

use std::borrow::Cow;
use std::fmt::Debug;

use crate::core::value::SqlValue;

/// Rendering of SQL NULL.
pub const NULL_TOKEN: &str = "NULL";

/// Turns a value into the string that gets hashed.
pub trait ValueCanonicalizer: Send + Sync + Debug {
    fn canonicalize<'a>(&self, value: &'a SqlValue) -> Cow<'a, str>;
}

/// Default canonicalizer.
///
/// | value | rendering |
/// |---|---|
/// | NULL | `NULL` |
/// | bool | `1` / `0` |
/// | integers, floats | `Display` |
/// | decimal | `Display`, scale preserved |
/// | text | verbatim |
/// | uuid | lowercase hyphenated |
/// | bytes | lowercase hex |
/// | date | `%Y-%m-%d` |
/// | time | `%H:%M:%S%.f` |
/// | timestamp | `%Y-%m-%d %H:%M:%S%.f` |
/// | timestamp with offset | RFC 3339 |
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalCanonicalizer;

impl ValueCanonicalizer for LexicalCanonicalizer {
    fn canonicalize<'a>(&self, value: &'a SqlValue) -> Cow<'a, str> {
        match value {
            SqlValue::Null => Cow::Borrowed(NULL_TOKEN),
            SqlValue::Bool(true) => Cow::Borrowed("1"),
            SqlValue::Bool(false) => Cow::Borrowed("0"),
            SqlValue::I16(v) => Cow::Owned(v.to_string()),
            SqlValue::I32(v) => Cow::Owned(v.to_string()),
            SqlValue::I64(v) => Cow::Owned(v.to_string()),
            SqlValue::F32(v) => Cow::Owned(v.to_string()),
            SqlValue::F64(v) => Cow::Owned(v.to_string()),
            SqlValue::Text(s) => Cow::Borrowed(s.as_str()),
            SqlValue::Bytes(b) => Cow::Owned(hex::encode(b)),
            SqlValue::Uuid(u) => Cow::Owned(u.hyphenated().to_string()),
            SqlValue::Decimal(d) => Cow::Owned(d.to_string()),
            SqlValue::DateTime(dt) => Cow::Owned(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            SqlValue::DateTimeOffset(dt) => Cow::Owned(dt.to_rfc3339()),
            SqlValue::Date(d) => Cow::Owned(d.format("%Y-%m-%d").to_string()),
            SqlValue::Time(t) => Cow::Owned(t.format("%H:%M:%S%.f").to_string()),
        }
    }
}
