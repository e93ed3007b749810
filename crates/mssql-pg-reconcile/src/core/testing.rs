//! In-memory row sources for pipeline tests.
//!
//! Rows are served in insertion order, so tests insert them already sorted by
//! the ordering key the resolver is expected to pick.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::schema::{ColumnDescriptor, IdentifierCase, TableRef};
use super::traits::{Connector, ReadRequest, RowSource};
use super::value::{Row, RowBatch, SqlValue};
use crate::drivers::common::with_timeout;
use crate::error::{ReconcileError, Result};

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryTable {
    pub columns: Vec<String>,
    pub flagged_keys: Vec<String>,
    pub primary_key: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
    pub stall_after_rows: Option<usize>,
}

impl MemoryTable {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Key columns reported by the probe itself rather than the catalog.
    pub fn flagged_keys(mut self, columns: &[&str]) -> Self {
        self.flagged_keys = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// The fetch after `rows` rows never completes.
    pub fn stalling_after_rows(mut self, rows: usize) -> Self {
        self.stall_after_rows = Some(rows);
        self
    }

    pub fn row(mut self, values: Vec<SqlValue>) -> Self {
        self.rows.push(values);
        self
    }

    /// `(ID, NAME)` table keyed on `ID`.
    pub fn id_name(rows: &[(i32, &str)]) -> Self {
        rows.iter().fold(
            Self::new(&["ID", "NAME"]).primary_key(&["ID"]),
            |t, (id, name)| t.row(vec![SqlValue::I32(*id), SqlValue::from(*name)]),
        )
    }
}

#[derive(Clone)]
pub(crate) struct MemorySource {
    db_type: &'static str,
    tables: HashMap<String, MemoryTable>,
    fail_pk_lookup: bool,
    fail_probe: bool,
    fail_after_rows: Option<usize>,
    drop_final_batch: bool,
    fetch_timeout: Duration,
    requests: Arc<Mutex<Vec<ReadRequest>>>,
}

fn key(table: &TableRef) -> String {
    table.full_name().to_lowercase()
}

impl MemorySource {
    pub fn new(db_type: &'static str) -> Self {
        Self {
            db_type,
            tables: HashMap::new(),
            fail_pk_lookup: false,
            fail_probe: false,
            fail_after_rows: None,
            drop_final_batch: false,
            fetch_timeout: Duration::from_millis(50),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_table(mut self, table: &str, data: MemoryTable) -> Self {
        let table = TableRef::parse(table).unwrap();
        self.tables.insert(key(&table), data);
        self
    }

    pub fn failing_pk_lookup(mut self) -> Self {
        self.fail_pk_lookup = true;
        self
    }

    pub fn failing_probe(mut self) -> Self {
        self.fail_probe = true;
        self
    }

    pub fn failing_after_rows(mut self, rows: usize) -> Self {
        self.fail_after_rows = Some(rows);
        self
    }

    pub fn without_final_batch(mut self) -> Self {
        self.drop_final_batch = true;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn requests(&self) -> Vec<ReadRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn table(&self, table: &TableRef) -> Result<&MemoryTable> {
        self.tables.get(&key(table)).ok_or_else(|| {
            ReconcileError::extraction(table.full_name(), "Invalid object name")
        })
    }
}

#[async_trait]
impl RowSource for MemorySource {
    async fn probe_columns(&self, table: &TableRef) -> Result<Vec<ColumnDescriptor>> {
        if self.fail_probe {
            return Err(ReconcileError::extraction(table.full_name(), "probe failed"));
        }
        let data = self.table(table)?;
        Ok(data
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| ColumnDescriptor {
                name: name.clone(),
                ordinal: i + 1,
                is_key: data.flagged_keys.iter().any(|k| k == name),
            })
            .collect())
    }

    async fn primary_key_columns(&self, table: &TableRef) -> Result<Vec<String>> {
        if self.fail_pk_lookup {
            return Err(ReconcileError::Metadata("catalog unavailable".into()));
        }
        Ok(self.table(table)?.primary_key.clone())
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        let prefix = format!("{}.", schema.to_lowercase());
        let mut names: Vec<String> = self
            .tables
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix).map(String::from))
            .collect();
        names.sort();
        Ok(names)
    }

    fn read_rows(&self, request: ReadRequest) -> mpsc::Receiver<Result<RowBatch>> {
        let (tx, rx) = mpsc::channel(4);
        self.requests.lock().unwrap().push(request.clone());
        let data = self.table(&request.table).cloned();
        let fail_after = self.fail_after_rows;
        let drop_final = self.drop_final_batch;
        let fetch_timeout = self.fetch_timeout;

        tokio::spawn(async move {
            let data = match data {
                Ok(d) => d,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            let positions: Vec<usize> = request
                .columns
                .iter()
                .map(|c| {
                    data.columns
                        .iter()
                        .position(|t| t.eq_ignore_ascii_case(c))
                        .unwrap()
                })
                .collect();
            let limit = request.limit.map(|l| l as usize).unwrap_or(usize::MAX);

            let mut batch = Vec::new();
            for (n, values) in data.rows.iter().take(limit).enumerate() {
                if data.stall_after_rows == Some(n) {
                    let stalled = with_timeout(
                        fetch_timeout,
                        "memory row fetch",
                        std::future::pending::<Result<()>>(),
                    )
                    .await;
                    if let Err(e) = stalled {
                        let _ = tx.send(Err(e)).await;
                    }
                    return;
                }
                if fail_after == Some(n) {
                    let _ = tx
                        .send(Err(ReconcileError::extraction(
                            request.table.full_name(),
                            "connection reset by peer",
                        )))
                        .await;
                    return;
                }
                let row: Row = positions
                    .iter()
                    .map(|&i| (data.columns[i].clone(), values[i].clone()))
                    .collect();
                batch.push(row);
                if batch.len() >= request.batch_size {
                    let full = std::mem::take(&mut batch);
                    if tx.send(Ok(RowBatch::new(full))).await.is_err() {
                        return;
                    }
                }
            }

            if drop_final {
                if !batch.is_empty() {
                    let _ = tx.send(Ok(RowBatch::new(batch))).await;
                }
            } else {
                let _ = tx.send(Ok(RowBatch::new(batch).mark_final())).await;
            }
        });

        rx
    }

    fn db_type(&self) -> &str {
        self.db_type
    }

    async fn close(&self) {}
}

pub(crate) struct MemoryConnector {
    pub source: MemorySource,
    pub case: IdentifierCase,
    pub schema: String,
    pub fail_connect: bool,
    pub connects: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new(source: MemorySource, case: IdentifierCase, schema: &str) -> Self {
        Self {
            source,
            case,
            schema: schema.to_string(),
            fail_connect: false,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn RowSource>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(ReconcileError::connection(
                "connection refused",
                format!("connecting to {}", self.describe()),
            ));
        }
        Ok(Box::new(self.source.clone()))
    }

    fn identifier_case(&self) -> IdentifierCase {
        self.case
    }

    fn schema(&self) -> String {
        self.schema.clone()
    }

    fn describe(&self) -> String {
        format!("memory://{}", self.source.db_type)
    }
}
