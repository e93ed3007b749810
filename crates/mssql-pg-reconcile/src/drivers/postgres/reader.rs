//! PostgreSQL row source.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::{Client, Config as PgConfig, NoTls, Socket};
use tracing::{debug, info, warn};

use super::PostgresDialect;
use crate::config::ConnectionConfig;
use crate::core::schema::{ColumnDescriptor, TableRef};
use crate::core::traits::{Dialect, ReadRequest, RowSource, SelectQueryOptions};
use crate::core::value::{Row, RowBatch, SqlValue};
use crate::drivers::common::{make_tls_connector, with_timeout, SslMode};
use crate::error::{ReconcileError, Result};

/// Batches buffered between the streaming task and the extractor.
const CHANNEL_CAPACITY: usize = 4;

/// PostgreSQL implementation of [`RowSource`].
pub struct PostgresReader {
    client: Arc<Client>,
    connection: Mutex<Option<JoinHandle<()>>>,
    dialect: PostgresDialect,
    timeout: Duration,
}

impl PostgresReader {
    /// Open a connection and apply the session statement timeout.
    pub async fn connect(config: &ConnectionConfig, timeout: Duration) -> Result<Self> {
        let mut pg = PgConfig::new();
        pg.host(&config.host);
        pg.port(config.effective_port());
        pg.dbname(&config.database);
        pg.user(&config.user);
        pg.password(&config.password);
        pg.application_name("mssql-pg-reconcile");
        pg.connect_timeout(timeout);

        let ssl_mode: SslMode = config.ssl_mode.parse()?;
        let context = format!("connecting to {}", config.describe());
        let connected = match make_tls_connector(ssl_mode)? {
            Some(tls) => with_timeout(timeout, "PostgreSQL connect", spawn_connection(&pg, tls)).await,
            None => with_timeout(timeout, "PostgreSQL connect", spawn_connection(&pg, NoTls)).await,
        };
        let (client, connection) = connected.map_err(|e| ReconcileError::connection(e, context))?;

        let ms = timeout.as_millis();
        with_timeout(
            timeout,
            "PostgreSQL session setup",
            client.batch_execute(&format!("SET statement_timeout = {}", ms)),
        )
        .await?;

        info!(
            "Connected to PostgreSQL: {} (statement_timeout={}ms)",
            config.describe(),
            ms
        );

        Ok(Self {
            client: Arc::new(client),
            connection: Mutex::new(Some(connection)),
            dialect: PostgresDialect::new(),
            timeout,
        })
    }

    async fn query_strings(
        &self,
        operation: &str,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Vec<String>> {
        let rows = with_timeout(self.timeout, operation, self.client.query(sql, params)).await?;
        rows.iter()
            .map(|r| r.try_get::<_, String>(0).map_err(ReconcileError::from))
            .collect()
    }
}

async fn spawn_connection<T>(
    pg: &PgConfig,
    tls: T,
) -> std::result::Result<(Client, JoinHandle<()>), tokio_postgres::Error>
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let (client, connection) = pg.connect(tls).await?;
    let handle = tokio::spawn(async move {
        if let Err(e) = connection.await {
            warn!("PostgreSQL connection error: {}", e);
        }
    });
    Ok((client, handle))
}

#[async_trait]
impl RowSource for PostgresReader {
    async fn probe_columns(&self, table: &TableRef) -> Result<Vec<ColumnDescriptor>> {
        let sql = self.dialect.build_probe_query(table);
        debug!("PostgreSQL probe: {}", sql);

        let stmt = with_timeout(self.timeout, "PostgreSQL probe", self.client.prepare(&sql)).await?;
        Ok(stmt
            .columns()
            .iter()
            .enumerate()
            .map(|(i, c)| ColumnDescriptor::new(c.name(), i + 1))
            .collect())
    }

    async fn primary_key_columns(&self, table: &TableRef) -> Result<Vec<String>> {
        self.query_strings(
            "PostgreSQL primary key lookup",
            self.dialect.primary_key_query(),
            &[&table.schema, &table.name],
        )
        .await
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        self.query_strings(
            "PostgreSQL table listing",
            self.dialect.list_tables_query(),
            &[&schema],
        )
        .await
    }

    fn read_rows(&self, request: ReadRequest) -> mpsc::Receiver<Result<RowBatch>> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let client = Arc::clone(&self.client);
        let sql = self
            .dialect
            .build_select_query(&SelectQueryOptions::from(&request));
        let timeout = self.timeout;

        tokio::spawn(async move {
            if let Err(e) = stream_rows(&client, &sql, &request, timeout, &tx).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    fn db_type(&self) -> &str {
        self.dialect.name()
    }

    async fn close(&self) {
        if let Some(handle) = self.connection.lock().await.take() {
            handle.abort();
        }
    }
}

async fn stream_rows(
    client: &Client,
    sql: &str,
    request: &ReadRequest,
    timeout: Duration,
    tx: &mpsc::Sender<Result<RowBatch>>,
) -> Result<()> {
    debug!("PostgreSQL extraction query: {}", sql);

    let stream = with_timeout(
        timeout,
        "PostgreSQL query",
        client.query_raw(sql, Vec::<String>::new()),
    )
    .await?;
    tokio::pin!(stream);

    let table = request.table.full_name();
    let mut batch = Vec::with_capacity(request.batch_size);
    while let Some(row) = with_timeout(timeout, "PostgreSQL row fetch", stream.try_next()).await? {
        batch.push(convert_row(&row, &request.columns, &table)?);
        if batch.len() >= request.batch_size {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(request.batch_size));
            if tx.send(Ok(RowBatch::new(full))).await.is_err() {
                return Ok(()); // receiver gone
            }
        }
    }

    let _ = tx.send(Ok(RowBatch::new(batch).mark_final())).await;
    Ok(())
}

fn convert_row(row: &tokio_postgres::Row, columns: &[String], table: &str) -> Result<Row> {
    if columns.is_empty() {
        return Ok(Row::default());
    }
    let mut out = Row::with_capacity(columns.len());
    for (idx, name) in columns.iter().enumerate() {
        out.push(name.clone(), convert_pg_value(row, idx, table)?);
    }
    Ok(out)
}

/// Convert a column to [`SqlValue`] by its PostgreSQL type name.
fn convert_pg_value(row: &tokio_postgres::Row, idx: usize, table: &str) -> Result<SqlValue> {
    let type_name = row.columns()[idx].type_().name();

    let value = match type_name {
        "bool" => SqlValue::from_option(row.try_get::<_, Option<bool>>(idx)?),
        "char" => SqlValue::from_option(row.try_get::<_, Option<i8>>(idx)?.map(i16::from)),
        "int2" => SqlValue::from_option(row.try_get::<_, Option<i16>>(idx)?),
        "int4" => SqlValue::from_option(row.try_get::<_, Option<i32>>(idx)?),
        "int8" => SqlValue::from_option(row.try_get::<_, Option<i64>>(idx)?),
        "oid" => SqlValue::from_option(row.try_get::<_, Option<u32>>(idx)?.map(i64::from)),
        "float4" => SqlValue::from_option(row.try_get::<_, Option<f32>>(idx)?),
        "float8" => SqlValue::from_option(row.try_get::<_, Option<f64>>(idx)?),
        "numeric" => {
            SqlValue::from_option(row.try_get::<_, Option<rust_decimal::Decimal>>(idx)?)
        }
        "uuid" => SqlValue::from_option(row.try_get::<_, Option<uuid::Uuid>>(idx)?),
        "timestamp" => {
            SqlValue::from_option(row.try_get::<_, Option<chrono::NaiveDateTime>>(idx)?)
        }
        "timestamptz" => SqlValue::from_option(
            row.try_get::<_, Option<chrono::DateTime<chrono::FixedOffset>>>(idx)?,
        ),
        "date" => SqlValue::from_option(row.try_get::<_, Option<chrono::NaiveDate>>(idx)?),
        "time" => SqlValue::from_option(row.try_get::<_, Option<chrono::NaiveTime>>(idx)?),
        "bytea" => SqlValue::from_option(row.try_get::<_, Option<Vec<u8>>>(idx)?),
        "json" | "jsonb" => SqlValue::from_option(
            row.try_get::<_, Option<serde_json::Value>>(idx)?
                .map(|v| v.to_string()),
        ),
        other => SqlValue::from_option(row.try_get::<_, Option<String>>(idx).map_err(|e| {
            ReconcileError::extraction(
                table,
                format!(
                    "column {} has unsupported type {} ({}); exclude it with target_skip_columns or source_skip_columns",
                    row.columns()[idx].name(),
                    other,
                    e
                ),
            )
        })?),
    };
    Ok(value)
}
