//! The SQL Server log transport
//!
//! [`MssqlTransport`] takes log records from a logging pipeline, maps them
//! onto the configured columns and inserts one row per record. Records can
//! be read back by time range with [`MssqlTransport::query`].
//!
//! Both entry points return immediately and run on a spawned tokio task;
//! [`write`](MssqlTransport::write) and [`read`](MssqlTransport::read) are
//! the awaitable forms. Tasks go to the runtime the transport was built in,
//! so `log` and `query` may be called from threads outside it. With no
//! runtime at all the callback gets a connection error straight away.
//!
//! Write failures are handled according to [`WriteMode`]:
//! - `FireAndForget`: the failure is logged and the callback gets `Ok(false)`
//! - `Durable`: the callback gets the error

use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::{TransportConfig, WriteMode};
use crate::connection::ConnectionFactory;
use crate::error::{Error, Result};
use crate::pool::{PoolStats, SimpleConnectionPool};
use crate::record::{map_record, LogRecord};
use crate::stats::{AtomicTransportStats, TransportStats};
use crate::statement::{build_insert, build_select, QueryOptions};
use crate::types::Row;

#[cfg(feature = "sqlserver")]
use crate::sqlserver::SqlServerConnectionFactory;

/// Name the transport registers under
pub const TRANSPORT_NAME: &str = "MSSQL";

const NOTIFY_CAPACITY: usize = 256;

/// Transport diagnostics: info/error with `console` set, debug otherwise
macro_rules! diag {
    ($console:expr, info, $($arg:tt)+) => {
        if $console {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
    ($console:expr, error, $($arg:tt)+) => {
        if $console {
            tracing::error!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

struct Inner {
    config: TransportConfig,
    pool: Arc<SimpleConnectionPool>,
    logged: broadcast::Sender<LogRecord>,
    stats: AtomicTransportStats,
    runtime: Option<Handle>,
}

/// Log transport writing to a SQL Server table.
///
/// Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct MssqlTransport {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MssqlTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlTransport")
            .field("server", &self.inner.config.server)
            .field("database", &self.inner.config.database)
            .field("table", &self.inner.config.table)
            .finish()
    }
}

impl MssqlTransport {
    /// Create a transport connecting through tiberius.
    ///
    /// Fails if the configuration is incomplete. A server that cannot be
    /// reached does not fail construction; the error surfaces on the first
    /// write or read.
    #[cfg(feature = "sqlserver")]
    pub fn new(config: TransportConfig) -> Result<Self> {
        Self::with_factory(config, Arc::new(SqlServerConnectionFactory))
    }

    /// Create a transport with a custom connection factory
    pub fn with_factory(
        config: TransportConfig,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Result<Self> {
        config.validate_all()?;

        let pool = SimpleConnectionPool::new(config.pool_config(), factory);
        let (logged, _) = broadcast::channel(NOTIFY_CAPACITY);

        let transport = Self {
            inner: Arc::new(Inner {
                config,
                pool,
                logged,
                stats: AtomicTransportStats::default(),
                runtime: Handle::try_current().ok(),
            }),
        };
        transport.spawn_warm_up();
        Ok(transport)
    }

    fn spawn_warm_up(&self) {
        let Some(handle) = self.inner.runtime.clone() else {
            debug!("No tokio runtime, connections will be opened on first use");
            return;
        };

        let pool = self.inner.pool.clone();
        let console = self.inner.config.console;
        let server = self.inner.config.server.clone();
        let database = self.inner.config.database.clone();

        handle.spawn(async move {
            match pool.warm_up().await {
                Ok(connections) => diag!(
                    console,
                    info,
                    server = %server,
                    database = %database,
                    connections,
                    "Connected to SQL Server"
                ),
                Err(e) => diag!(
                    console,
                    error,
                    server = %server,
                    database = %database,
                    error = %e,
                    "Failed to connect to SQL Server"
                ),
            }
        });
    }

    /// Runtime captured at construction, else the caller's
    fn runtime(&self) -> Option<Handle> {
        self.inner
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
    }

    /// Transport name
    pub fn name(&self) -> &'static str {
        TRANSPORT_NAME
    }

    /// Configuration captured at construction
    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }

    /// Receive every record once it has been persisted
    pub fn subscribe(&self) -> broadcast::Receiver<LogRecord> {
        self.inner.logged.subscribe()
    }

    /// Persist a record in the background and hand the outcome to `callback`.
    ///
    /// `Ok(true)` means the row was inserted. `Ok(false)` means nothing was
    /// inserted: the record was filtered, the transport is silent, or the
    /// insert failed in fire-and-forget mode.
    ///
    /// Returns `None` when there is no tokio runtime to run the write on.
    /// The callback has then already been called, with the outcome of a
    /// failed write.
    pub fn log<F>(&self, record: LogRecord, callback: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(Result<bool>) + Send + 'static,
    {
        let Some(runtime) = self.runtime() else {
            let e = Error::connection("no tokio runtime to run the write on");
            callback(self.write_failed(e));
            return None;
        };

        let transport = self.clone();
        Some(runtime.spawn(async move {
            let result = transport.write(record).await;
            callback(result);
        }))
    }

    /// Persist a record and wait for the outcome.
    ///
    /// See [`log`](Self::log) for the meaning of the result.
    pub async fn write(&self, record: LogRecord) -> Result<bool> {
        let inner = &self.inner;

        if inner.config.silent {
            inner.stats.record_skipped();
            return Ok(false);
        }
        if let Some(threshold) = inner.config.level {
            if !threshold.admits(record.level.as_deref()) {
                inner.stats.record_skipped();
                return Ok(false);
            }
        }

        let start = Instant::now();
        match self.insert(&record).await {
            Ok(_) => {
                inner.stats.record_write(start.elapsed());
                // no subscribers is fine
                let _ = inner.logged.send(record);
                Ok(true)
            }
            Err(e) => self.write_failed(e),
        }
    }

    fn write_failed(&self, e: Error) -> Result<bool> {
        let inner = &self.inner;
        inner.stats.record_write_failure();
        diag!(
            inner.config.console,
            error,
            table = %inner.config.table,
            error = %e,
            "Failed to write log record"
        );
        match inner.config.write_mode {
            WriteMode::FireAndForget => Ok(false),
            WriteMode::Durable => Err(e),
        }
    }

    async fn insert(&self, record: &LogRecord) -> Result<u64> {
        let config = &self.inner.config;
        let row = map_record(record, &config.fields)?;
        let statement = build_insert(&config.table, &row, config.statement_style)?;

        let conn = self.inner.pool.get().await?;
        conn.execute(&statement.sql, &statement.params).await
    }

    /// Read records in the background and hand the rows to `callback`.
    ///
    /// Returns `None`, after passing a connection error to `callback`, when
    /// there is no tokio runtime to run the read on.
    pub fn query<F>(&self, options: QueryOptions, callback: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(Result<Vec<Row>>) + Send + 'static,
    {
        let Some(runtime) = self.runtime() else {
            self.inner.stats.record_query(false);
            callback(Err(Error::connection("no tokio runtime to run the query on")));
            return None;
        };

        let transport = self.clone();
        Some(runtime.spawn(async move {
            let result = transport.read(&options).await;
            callback(result);
        }))
    }

    /// Read records and wait for the rows, in the order the store returns them
    pub async fn read(&self, options: &QueryOptions) -> Result<Vec<Row>> {
        let result = self.select(options).await;
        self.inner.stats.record_query(result.is_ok());

        if let Err(e) = &result {
            diag!(
                self.inner.config.console,
                error,
                table = %self.inner.config.table,
                error = %e,
                "Failed to query log records"
            );
        }
        result
    }

    async fn select(&self, options: &QueryOptions) -> Result<Vec<Row>> {
        let config = &self.inner.config;
        let statement = build_select(&config.table, &config.fields, options, config.statement_style)?;

        let conn = self.inner.pool.get().await?;
        conn.query(&statement.sql, &statement.params).await
    }

    /// Run `SELECT 1` on a pooled connection
    pub async fn check(&self) -> Result<()> {
        let conn = self.inner.pool.get().await?;
        conn.execute("SELECT 1", &[]).await?;
        diag!(
            self.inner.config.console,
            info,
            table = %self.inner.config.table,
            "SQL Server connection check passed"
        );
        Ok(())
    }

    /// Transport statistics
    pub fn stats(&self) -> TransportStats {
        self.inner.stats.snapshot()
    }

    /// Pool statistics
    pub fn pool_stats(&self) -> PoolStats {
        self.inner.pool.stats()
    }

    /// Close the pool. Later writes and reads fail with a pool error.
    pub async fn close(&self) -> Result<()> {
        self.inner.pool.close().await?;

        let stats = self.stats();
        diag!(
            self.inner.config.console,
            info,
            records_written = stats.records_written,
            records_failed = stats.records_failed,
            "SQL Server transport closed"
        );

        let pool = self.pool_stats();
        debug!(
            connections_created = pool.connections_created,
            acquisitions = pool.acquisitions,
            exhausted = pool.exhausted_count,
            avg_wait_ms = pool.avg_wait_time_ms(),
            "Pool statistics"
        );
        Ok(())
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.inner.pool.is_closed()
    }
}
