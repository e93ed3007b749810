//! Row fingerprinting.
//!
//! A fingerprint is the digest of a row's canonicalized values joined with
//! `|`, taken in column-name order so that projection order does not matter.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::normalize::{LexicalCanonicalizer, ValueCanonicalizer};
use crate::core::value::Row;
use crate::error::{ReconcileError, Result};

/// Separator between canonical values.
const VALUE_SEPARATOR: &str = "|";

/// Key column to canonical value, in ordering-key order.
pub type KeyValues = Vec<(String, String)>;

/// Row digest algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// MD5, 32 hex characters.
    #[serde(rename = "MD5", alias = "md5")]
    Md5,
    /// SHA-256, 64 hex characters.
    #[default]
    #[serde(rename = "SHA256", alias = "sha256", alias = "SHA-256", alias = "sha-256")]
    Sha256,
}

impl HashAlgorithm {
    /// Digest bytes into lowercase hex.
    pub fn digest_hex(&self, bytes: &[u8]) -> String {
        match self {
            HashAlgorithm::Md5 => hex::encode(Md5::digest(bytes)),
            HashAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().replace('-', "").as_str() {
            "MD5" => Ok(HashAlgorithm::Md5),
            "SHA256" => Ok(HashAlgorithm::Sha256),
            _ => Err(ReconcileError::Config(format!(
                "Unknown hash algorithm '{}'. Valid values: MD5, SHA256",
                s
            ))),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Md5 => write!(f, "MD5"),
            HashAlgorithm::Sha256 => write!(f, "SHA256"),
        }
    }
}

/// Computes row fingerprints and key evidence.
#[derive(Debug, Clone)]
pub struct RowFingerprinter {
    algorithm: HashAlgorithm,
    canonicalizer: Arc<dyn ValueCanonicalizer>,
}

impl RowFingerprinter {
    /// Fingerprinter with the lexical canonicalizer.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self::with_canonicalizer(algorithm, Arc::new(LexicalCanonicalizer))
    }

    pub fn with_canonicalizer(
        algorithm: HashAlgorithm,
        canonicalizer: Arc<dyn ValueCanonicalizer>,
    ) -> Self {
        Self {
            algorithm,
            canonicalizer,
        }
    }

    /// Fingerprint one row.
    ///
    /// Columns are ordered by case-folded name, ties broken by the raw name.
    pub fn fingerprint(&self, row: &Row) -> String {
        let mut values: Vec<_> = row.iter().collect();
        values.sort_by_cached_key(|(name, _)| (name.to_lowercase(), name.to_string()));

        let joined = values
            .iter()
            .map(|(_, v)| self.canonicalizer.canonicalize(v))
            .collect::<Vec<_>>()
            .join(VALUE_SEPARATOR);

        self.algorithm.digest_hex(joined.as_bytes())
    }

    /// Canonical values of the key columns present in the row, in key order.
    pub fn key_values(&self, row: &Row, key_columns: &[String]) -> KeyValues {
        key_columns
            .iter()
            .filter_map(|col| {
                row.get(col)
                    .map(|v| (col.clone(), self.canonicalizer.canonicalize(v).into_owned()))
            })
            .collect()
    }
}

/// Fingerprint of one extracted row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFingerprint {
    /// 1-based extraction position.
    pub index: u64,
    /// Lowercase hex digest.
    pub hash: String,
    /// Key column to canonical value.
    pub primary_key_values: KeyValues,
}

/// All fingerprints of one table side, addressable by positional index.
#[derive(Debug, Clone, Default)]
pub struct FingerprintSet {
    key_columns: Vec<String>,
    fingerprints: Vec<RowFingerprint>,
}

impl FingerprintSet {
    /// Empty set whose evidence is taken from `key_columns`.
    pub fn new(key_columns: Vec<String>) -> Self {
        Self {
            key_columns,
            fingerprints: Vec::new(),
        }
    }

    /// Fingerprint a row and assign it the next index.
    pub fn add_row(&mut self, fingerprinter: &RowFingerprinter, row: &Row) -> u64 {
        let hash = fingerprinter.fingerprint(row);
        let keys = fingerprinter.key_values(row, &self.key_columns);
        self.push(hash, keys)
    }

    /// Append a precomputed fingerprint and return its index.
    pub fn push(&mut self, hash: String, primary_key_values: KeyValues) -> u64 {
        let index = self.fingerprints.len() as u64 + 1;
        self.fingerprints.push(RowFingerprint {
            index,
            hash,
            primary_key_values,
        });
        index
    }

    /// Fingerprint at a 1-based index.
    pub fn get(&self, index: u64) -> Option<&RowFingerprint> {
        index
            .checked_sub(1)
            .and_then(|i| self.fingerprints.get(i as usize))
    }

    /// Fingerprints in index order.
    pub fn iter(&self) -> impl Iterator<Item = &RowFingerprint> {
        self.fingerprints.iter()
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}
