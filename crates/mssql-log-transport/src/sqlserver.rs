//! SQL Server backend for mssql-log-transport
//!
//! tiberius-backed [`Connection`] and [`ConnectionFactory`]. Parameters are
//! sent as typed TDS parameters (`@P1`, `@P2`, ...), never spliced into the
//! statement text.

use async_trait::async_trait;
use std::borrow::Cow;
use std::time::Duration;
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::connection::{Connection, ConnectionConfig, ConnectionFactory};
use crate::error::{Error, Result};
use crate::types::{Row, Value};

/// SQL Server connection
pub struct SqlServerConnection {
    client: Mutex<Client<Compat<TcpStream>>>,
}

impl SqlServerConnection {
    /// Open and authenticate a connection
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let tib_config = tiberius_config(config);
        let timeout = Duration::from_millis(config.connect_timeout_ms);

        let tcp = tokio::time::timeout(timeout, TcpStream::connect(tib_config.get_addr()))
            .await
            .map_err(|_| Error::timeout(format!("Connecting to {} timed out", config.addr())))?
            .map_err(|e| Error::connection_with_source(format!("Failed to connect to {}", config.addr()), e))?;

        tcp.set_nodelay(true).ok();

        let client = tokio::time::timeout(timeout, Client::connect(tib_config, tcp.compat_write()))
            .await
            .map_err(|_| Error::timeout("SQL Server login timed out"))?
            .map_err(|e| match e {
                tiberius::error::Error::Server(ref token) if token.code() == 18456 => {
                    Error::authentication(format!("Login failed for user '{}'", config.user))
                }
                other => Error::connection_with_source("Failed to authenticate", other),
            })?;

        Ok(Self {
            client: Mutex::new(client),
        })
    }
}

fn tiberius_config(config: &ConnectionConfig) -> Config {
    let mut tib_config = Config::new();

    tib_config.host(&config.server);
    tib_config.port(config.port);
    tib_config.database(&config.database);
    tib_config.authentication(AuthMethod::sql_server(
        &config.user,
        config.password.expose_secret(),
    ));

    if let Some(name) = &config.application_name {
        tib_config.application_name(name);
    }

    tib_config.encryption(if config.encrypt {
        EncryptionLevel::Required
    } else {
        EncryptionLevel::Off
    });

    if config.trust_cert {
        tib_config.trust_cert();
    }

    tib_config
}

/// Owned parameter wrapper for native tiberius parameter binding.
struct SqlParam(Value);

impl tiberius::ToSql for SqlParam {
    fn to_sql(&self) -> ColumnData<'_> {
        match &self.0 {
            Value::Null => ColumnData::String(None),
            Value::Bool(b) => ColumnData::Bit(Some(*b)),
            Value::Int64(n) => ColumnData::I64(Some(*n)),
            Value::Float64(n) => ColumnData::F64(Some(*n)),
            Value::String(s) => ColumnData::String(Some(Cow::Borrowed(s.as_str()))),
            Value::Bytes(b) => ColumnData::Binary(Some(Cow::Borrowed(b.as_slice()))),
            // ISO 8601 text; SQL Server converts it implicitly for DATETIME/DATETIME2 columns
            Value::DateTime(dt) => ColumnData::String(Some(Cow::Owned(
                dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
            ))),
            Value::DateTimeTz(dt) => ColumnData::String(Some(Cow::Owned(
                dt.format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string(),
            ))),
            Value::Json(j) => ColumnData::String(Some(Cow::Owned(j.to_string()))),
        }
    }
}

fn param_refs(tib_params: &[SqlParam]) -> Vec<&dyn tiberius::ToSql> {
    tib_params
        .iter()
        .map(|p| p as &dyn tiberius::ToSql)
        .collect()
}

/// Convert tiberius column value to a transport Value
fn tiberius_to_value(row: &tiberius::Row, idx: usize) -> Value {
    // try typed columns before raw bytes so BIT does not come back as Bytes
    if let Ok(Some(v)) = row.try_get::<bool, _>(idx) {
        return Value::Bool(v);
    }
    if let Ok(Some(v)) = row.try_get::<u8, _>(idx) {
        return Value::Int64(i64::from(v));
    }
    if let Ok(Some(v)) = row.try_get::<i16, _>(idx) {
        return Value::Int64(i64::from(v));
    }
    if let Ok(Some(v)) = row.try_get::<i32, _>(idx) {
        return Value::Int64(i64::from(v));
    }
    if let Ok(Some(v)) = row.try_get::<i64, _>(idx) {
        return Value::Int64(v);
    }
    if let Ok(Some(v)) = row.try_get::<f32, _>(idx) {
        return Value::Float64(f64::from(v));
    }
    if let Ok(Some(v)) = row.try_get::<f64, _>(idx) {
        return Value::Float64(v);
    }
    if let Ok(Some(v)) = row.try_get::<&str, _>(idx) {
        return Value::String(v.to_string());
    }
    if let Ok(Some(v)) = row.try_get::<chrono::NaiveDateTime, _>(idx) {
        return Value::DateTime(v);
    }
    if let Ok(Some(v)) = row.try_get::<chrono::DateTime<chrono::FixedOffset>, _>(idx) {
        return Value::DateTimeTz(v.with_timezone(&chrono::Utc));
    }
    if let Ok(Some(bytes)) = row.try_get::<&[u8], _>(idx) {
        return Value::Bytes(bytes.to_vec());
    }

    Value::Null
}

fn tiberius_row_to_row(tib_row: &tiberius::Row) -> Row {
    let columns: Vec<String> = tib_row
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let values: Vec<Value> = (0..columns.len())
        .map(|i| tiberius_to_value(tib_row, i))
        .collect();

    Row::new(columns, values)
}

#[async_trait]
impl Connection for SqlServerConnection {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let tib_params: Vec<SqlParam> = params.iter().cloned().map(SqlParam).collect();
        let refs = param_refs(&tib_params);
        let mut client = self.client.lock().await;

        let result = client
            .execute(sql, &refs)
            .await
            .map_err(|e| Error::query_with_sql(format!("Execute failed: {}", e), sql))?;

        Ok(result.total())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let tib_params: Vec<SqlParam> = params.iter().cloned().map(SqlParam).collect();
        let refs = param_refs(&tib_params);
        let mut client = self.client.lock().await;

        let stream = client
            .query(sql, &refs)
            .await
            .map_err(|e| Error::query_with_sql(format!("Query failed: {}", e), sql))?;

        let tib_rows = stream
            .into_first_result()
            .await
            .map_err(|e| Error::query_with_sql(format!("Failed to fetch rows: {}", e), sql))?;

        Ok(tib_rows.iter().map(tiberius_row_to_row).collect())
    }

    async fn is_valid(&self) -> bool {
        let mut client = self.client.lock().await;
        client.execute("SELECT 1", &[]).await.is_ok()
    }

    async fn close(&self) -> Result<()> {
        // Connection closes when dropped
        Ok(())
    }
}

/// SQL Server connection factory
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerConnectionFactory;

#[async_trait]
impl ConnectionFactory for SqlServerConnectionFactory {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        let conn = SqlServerConnection::connect(config).await?;
        Ok(Box::new(conn))
    }
}
