//! MSSQL row source.
//!
//! One Tiberius client per reader, shared between the metadata calls and the
//! spawned streaming task through an async mutex.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures::TryStreamExt;
use rust_decimal::Decimal;
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql, Query};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

use super::MssqlDialect;
use crate::config::ConnectionConfig;
use crate::core::schema::{ColumnDescriptor, TableRef};
use crate::core::traits::{Dialect, ReadRequest, RowSource, SelectQueryOptions};
use crate::core::value::{Row, RowBatch, SqlValue};
use crate::drivers::common::with_timeout;
use crate::error::{ReconcileError, Result};

/// Maximum TDS packet size (32767 bytes, ~32KB).
const TDS_MAX_PACKET_SIZE: u32 = 32767;

/// TCP keepalive interval (30 seconds).
const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Batches buffered between the streaming task and the extractor.
const CHANNEL_CAPACITY: usize = 4;

type TdsClient = Client<Compat<TcpStream>>;
type SharedClient = Arc<Mutex<Option<TdsClient>>>;

/// MSSQL implementation of [`RowSource`].
pub struct MssqlReader {
    client: SharedClient,
    dialect: MssqlDialect,
    timeout: Duration,
}

impl MssqlReader {
    /// Open a connection. The timeout also bounds every later statement.
    pub async fn connect(config: &ConnectionConfig, timeout: Duration) -> Result<Self> {
        let tds = build_config(config);
        let addr = tds.get_addr();

        let client = with_timeout(timeout, "MSSQL connect", async {
            let tcp = open_tcp(&addr).await?;
            Client::connect(tds, tcp.compat_write())
                .await
                .map_err(ReconcileError::from)
        })
        .await
        .map_err(|e| ReconcileError::connection(e, format!("connecting to {}", config.describe())))?;

        info!("Connected to MSSQL: {}", config.describe());

        Ok(Self {
            client: Arc::new(Mutex::new(Some(client))),
            dialect: MssqlDialect::new(),
            timeout,
        })
    }

    /// Run a catalog query and collect its first column as strings.
    async fn query_strings(&self, operation: &str, query: Query<'_>) -> Result<Vec<String>> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or_else(closed)?;
        let rows = with_timeout(self.timeout, operation, async move {
            let stream = query.query(client).await?;
            stream.into_first_result().await
        })
        .await?;

        Ok(rows
            .iter()
            .filter_map(|r| r.get::<&str, _>(0))
            .map(String::from)
            .collect())
    }
}

fn build_config(conn: &ConnectionConfig) -> Config {
    let mut config = Config::new();
    config.host(&conn.host);
    config.port(conn.effective_port());
    config.database(&conn.database);
    config.application_name("mssql-pg-reconcile");
    config.authentication(AuthMethod::sql_server(&conn.user, &conn.password));

    if conn.encrypt {
        if conn.trust_server_cert {
            config.trust_cert();
        }
        config.encryption(EncryptionLevel::Required);
    } else {
        config.encryption(EncryptionLevel::NotSupported);
    }

    config.packet_size(TDS_MAX_PACKET_SIZE);
    config
}

async fn open_tcp(addr: &str) -> Result<TcpStream> {
    let tcp = TcpStream::connect(addr).await?;
    tcp.set_nodelay(true).ok();

    let socket = socket2::Socket::from(tcp.into_std()?);
    let keepalive = socket2::TcpKeepalive::new()
        .with_time(TCP_KEEPALIVE_INTERVAL)
        .with_interval(TCP_KEEPALIVE_INTERVAL);
    if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
        warn!("Failed to set TCP keepalive on MSSQL connection: {}", e);
    }

    let std_tcp: std::net::TcpStream = socket.into();
    std_tcp.set_nonblocking(true)?;
    Ok(TcpStream::from_std(std_tcp)?)
}

fn closed() -> ReconcileError {
    ReconcileError::connection("connection already closed", "MSSQL reader")
}

#[async_trait]
impl RowSource for MssqlReader {
    async fn probe_columns(&self, table: &TableRef) -> Result<Vec<ColumnDescriptor>> {
        let sql = self.dialect.build_probe_query(table);
        debug!("MSSQL probe: {}", sql);

        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or_else(closed)?;

        with_timeout(self.timeout, "MSSQL probe", async {
            let mut stream = client.simple_query(sql.as_str()).await?;
            let columns = stream
                .columns()
                .await?
                .map(|cols| {
                    cols.iter()
                        .enumerate()
                        .map(|(i, c)| ColumnDescriptor::new(c.name(), i + 1))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            stream.into_results().await?;
            Ok::<_, tiberius::error::Error>(columns)
        })
        .await
    }

    async fn primary_key_columns(&self, table: &TableRef) -> Result<Vec<String>> {
        let mut query = Query::new(self.dialect.primary_key_query());
        query.bind(table.schema.clone());
        query.bind(table.name.clone());
        self.query_strings("MSSQL primary key lookup", query).await
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        let mut query = Query::new(self.dialect.list_tables_query());
        query.bind(schema.to_string());
        self.query_strings("MSSQL table listing", query).await
    }

    fn read_rows(&self, request: ReadRequest) -> mpsc::Receiver<Result<RowBatch>> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let client = Arc::clone(&self.client);
        let sql = self
            .dialect
            .build_select_query(&SelectQueryOptions::from(&request));
        let timeout = self.timeout;

        tokio::spawn(async move {
            if let Err(e) = stream_rows(client, sql, &request, timeout, &tx).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    fn db_type(&self) -> &str {
        self.dialect.name()
    }

    async fn close(&self) {
        if let Some(client) = self.client.lock().await.take() {
            if let Err(e) = client.close().await {
                debug!("Error closing MSSQL connection: {}", e);
            }
        }
    }
}

async fn stream_rows(
    client: SharedClient,
    sql: String,
    request: &ReadRequest,
    timeout: Duration,
    tx: &mpsc::Sender<Result<RowBatch>>,
) -> Result<()> {
    debug!("MSSQL extraction query: {}", sql);

    let mut guard = client.lock().await;
    let client = guard.as_mut().ok_or_else(closed)?;

    let stream = with_timeout(timeout, "MSSQL query", client.simple_query(sql.as_str())).await?;
    let mut rows = stream.into_row_stream();

    let mut batch = Vec::with_capacity(request.batch_size);
    while let Some(row) = with_timeout(timeout, "MSSQL row fetch", rows.try_next()).await? {
        batch.push(convert_row(row, &request.columns)?);
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

fn convert_row(row: tiberius::Row, columns: &[String]) -> Result<Row> {
    if columns.is_empty() {
        return Ok(Row::default());
    }
    let mut out = Row::with_capacity(columns.len());
    for (name, data) in columns.iter().zip(row) {
        out.push(name.clone(), convert_column_data(data)?);
    }
    Ok(out)
}

/// Convert a TDS value to [`SqlValue`] by its wire type.
fn convert_column_data(data: ColumnData<'static>) -> Result<SqlValue> {
    let value = match data {
        ColumnData::U8(v) => SqlValue::from_option(v.map(i16::from)),
        ColumnData::I16(v) => SqlValue::from_option(v),
        ColumnData::I32(v) => SqlValue::from_option(v),
        ColumnData::I64(v) => SqlValue::from_option(v),
        ColumnData::F32(v) => SqlValue::from_option(v),
        ColumnData::F64(v) => SqlValue::from_option(v),
        ColumnData::Bit(v) => SqlValue::from_option(v),
        ColumnData::String(v) => SqlValue::from_option(v.map(Cow::into_owned)),
        ColumnData::Guid(v) => SqlValue::from_option(v),
        ColumnData::Binary(v) => SqlValue::from_option(v.map(Cow::into_owned)),
        ColumnData::Xml(v) => SqlValue::from_option(v.map(|x| x.into_owned().into_string())),
        ColumnData::Numeric(None) => SqlValue::Null,
        ColumnData::Numeric(Some(n)) => {
            Decimal::try_from_i128_with_scale(n.value(), u32::from(n.scale()))
                .map(SqlValue::Decimal)
                .unwrap_or_else(|_| SqlValue::Text(n.to_string()))
        }
        ref d @ (ColumnData::DateTime(_)
        | ColumnData::SmallDateTime(_)
        | ColumnData::DateTime2(_)) => SqlValue::from_option(NaiveDateTime::from_sql(d)?),
        ref d @ ColumnData::Date(_) => SqlValue::from_option(NaiveDate::from_sql(d)?),
        ref d @ ColumnData::Time(_) => SqlValue::from_option(NaiveTime::from_sql(d)?),
        ref d @ ColumnData::DateTimeOffset(_) => {
            SqlValue::from_option(DateTime::<FixedOffset>::from_sql(d)?)
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseKind;
    use tiberius::numeric::Numeric;
    use uuid::Uuid;

    #[test]
    fn test_convert_scalars() {
        assert_eq!(
            convert_column_data(ColumnData::U8(Some(7))).unwrap(),
            SqlValue::I16(7)
        );
        assert_eq!(
            convert_column_data(ColumnData::I32(None)).unwrap(),
            SqlValue::Null
        );
        assert_eq!(
            convert_column_data(ColumnData::Bit(Some(true))).unwrap(),
            SqlValue::Bool(true)
        );
        assert_eq!(
            convert_column_data(ColumnData::String(Some(Cow::Borrowed("abc")))).unwrap(),
            SqlValue::Text("abc".into())
        );
        let id = Uuid::nil();
        assert_eq!(
            convert_column_data(ColumnData::Guid(Some(id))).unwrap(),
            SqlValue::Uuid(id)
        );
    }

    #[test]
    fn test_convert_numeric_keeps_scale() {
        let value = convert_column_data(ColumnData::Numeric(Some(Numeric::new_with_scale(150, 2))))
            .unwrap();
        assert_eq!(value, SqlValue::Decimal(Decimal::new(150, 2)));
        if let SqlValue::Decimal(d) = value {
            assert_eq!(d.to_string(), "1.50");
        }
    }

    #[test]
    fn test_build_config_address() {
        let conn = ConnectionConfig {
            r#type: DatabaseKind::Mssql,
            host: "mssql.internal".into(),
            port: None,
            database: "Sales".into(),
            user: "sa".into(),
            password: "secret".into(),
            schema: None,
            identifier_case: None,
            encrypt: true,
            trust_server_cert: true,
            ssl_mode: "require".into(),
        };
        assert_eq!(build_config(&conn).get_addr(), "mssql.internal:1433");
    }
}
