//! Per-row hash export to CSV.

use std::path::PathBuf;

use tracing::debug;

use super::fingerprint::FingerprintSet;
use crate::core::schema::TableRef;
use crate::error::Result;

/// Writes one `<schema>.<table>_<side>_hashes.csv` file per table side.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    dir: PathBuf,
}

impl CsvExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File path for a table side.
    pub fn path_for(&self, table: &TableRef, side: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}_{}_hashes.csv", table.schema, table.name, side))
    }

    /// Write the fingerprints of one side in index order.
    pub fn export(&self, table: &TableRef, side: &str, set: &FingerprintSet) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(table, side);

        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(["Row_ID", "Hash_Value", "Hash_Length"])?;
        for fp in set.iter() {
            writer.write_record([
                fp.index.to_string(),
                fp.hash.clone(),
                fp.hash.len().to_string(),
            ])?;
        }
        writer.flush()?;

        debug!("Exported {} hashes to {}", set.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::{Row, SqlValue};
    use crate::verify::fingerprint::{HashAlgorithm, RowFingerprinter};

    #[test]
    fn test_export_contents() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path().join("hashes"));
        let fp = RowFingerprinter::new(HashAlgorithm::Md5);

        let mut set = FingerprintSet::new(vec!["ID".into()]);
        for id in 1..=2 {
            let row: Row = [("ID", SqlValue::I32(id))].into_iter().collect();
            set.add_row(&fp, &row);
        }

        let table = TableRef::new("DBO", "ORDERS");
        let path = exporter.export(&table, "source", &set).unwrap();
        assert_eq!(path.file_name().unwrap(), "DBO.ORDERS_source_hashes.csv");

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Row_ID,Hash_Value,Hash_Length");
        let first = set.get(1).unwrap();
        assert_eq!(lines[1], format!("1,{},32", first.hash));
        assert!(lines[2].starts_with("2,"));
    }
}
