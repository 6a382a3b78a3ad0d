//! Connection pool for mssql-log-transport
//!
//! One pool per transport, owned for the transport's lifetime:
//! - Semaphore-bounded number of connections in use
//! - Idle connections reused LIFO and recycled after `idle_timeout`
//! - Validation on borrow
//! - Connections go back to the pool when the `PooledConnection` drops
//!
//! # Example
//!
//! ```rust,ignore
//! use mssql_log_transport::prelude::*;
//! use mssql_log_transport::sqlserver::SqlServerConnectionFactory;
//!
//! let pool = SimpleConnectionPool::new(
//!     PoolConfig::new(ConnectionConfig::new("localhost", "logs")).with_max_size(10),
//!     Arc::new(SqlServerConnectionFactory),
//! );
//!
//! let conn = pool.get().await?;
//! conn.execute("SELECT 1", &[]).await?;
//! // Connection is returned to pool when dropped
//! ```

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::connection::{Connection, ConnectionConfig, ConnectionFactory};
use crate::error::{Error, Result};

/// Pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Connection configuration
    pub connection: ConnectionConfig,
    /// Connections opened by warm-up and kept around
    pub min_size: usize,
    /// Maximum connections in use at once
    pub max_size: usize,
    /// Maximum time to wait for a connection
    pub acquire_timeout: Duration,
    /// Maximum connection lifetime (for recycling)
    pub max_lifetime: Duration,
    /// Idle timeout (connections idle longer are closed)
    pub idle_timeout: Duration,
    /// Whether to test connections on borrow
    pub test_on_borrow: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            min_size: 0,
            max_size: 10,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: Duration::from_secs(1800), // 30 minutes
            idle_timeout: Duration::from_secs(30),
            test_on_borrow: true,
        }
    }
}

impl PoolConfig {
    /// Create pool config for a connection
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            connection,
            ..Default::default()
        }
    }

    /// Set minimum pool size
    pub fn with_min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }

    /// Set maximum pool size
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Set acquire timeout
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set maximum connection lifetime
    pub fn with_max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// Set idle timeout
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Enable/disable test on borrow
    pub fn with_test_on_borrow(mut self, test: bool) -> Self {
        self.test_on_borrow = test;
        self
    }
}

/// Pool statistics
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Total number of connections created
    pub connections_created: u64,
    /// Total number of connections closed
    pub connections_closed: u64,
    /// Total number of connection acquisitions
    pub acquisitions: u64,
    /// Number of times pool was exhausted
    pub exhausted_count: u64,
    /// Total wait time for connections (in milliseconds)
    pub total_wait_time_ms: u64,
    /// Number of health check failures
    pub health_check_failures: u64,
}

impl PoolStats {
    /// Average wait for a connection in milliseconds
    pub fn avg_wait_time_ms(&self) -> f64 {
        if self.acquisitions == 0 {
            0.0
        } else {
            self.total_wait_time_ms as f64 / self.acquisitions as f64
        }
    }
}

/// Atomic pool stats for concurrent updates
#[derive(Debug, Default)]
#[allow(missing_docs)]
pub struct AtomicPoolStats {
    pub connections_created: AtomicU64,
    pub connections_closed: AtomicU64,
    pub acquisitions: AtomicU64,
    pub exhausted_count: AtomicU64,
    pub total_wait_time_ms: AtomicU64,
    pub health_check_failures: AtomicU64,
}

impl AtomicPoolStats {
    /// Create new atomic stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection creation
    pub fn record_created(&self) {
        self.connections_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection close
    pub fn record_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an acquisition
    pub fn record_acquisition(&self, wait_time_ms: u64) {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        self.total_wait_time_ms
            .fetch_add(wait_time_ms, Ordering::Relaxed);
    }

    /// Record pool exhaustion
    pub fn record_exhausted(&self) {
        self.exhausted_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record health check failure
    pub fn record_health_check_failure(&self) {
        self.health_check_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot current stats
    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            connections_created: self.connections_created.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            exhausted_count: self.exhausted_count.load(Ordering::Relaxed),
            total_wait_time_ms: self.total_wait_time_ms.load(Ordering::Relaxed),
            health_check_failures: self.health_check_failures.load(Ordering::Relaxed),
        }
    }

}

/// A connection borrowed from the pool
pub struct PooledConnection {
    conn: Option<Box<dyn Connection>>,
    created_at: Instant,
    pool: Arc<SimpleConnectionPool>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Get the underlying connection
    pub fn connection(&self) -> &(dyn Connection + 'static) {
        self.conn
            .as_ref()
            .expect("connection already returned")
            .as_ref()
    }

    /// Time since the underlying connection was opened
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("age", &self.age())
            .field("returned", &self.conn.is_none())
            .finish_non_exhaustive()
    }
}

impl std::ops::Deref for PooledConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.created_at);
        }
        // the permit is released after this body, once the connection is idle again
    }
}

/// Internal pool entry with metadata
struct PoolEntry {
    conn: Box<dyn Connection>,
    created_at: Instant,
    last_used: Instant,
}

/// Semaphore-bounded connection pool.
///
/// Idle connections are kept LIFO so the most recently used (and most
/// likely still healthy) connection is handed out first.
pub struct SimpleConnectionPool {
    config: PoolConfig,
    factory: Arc<dyn ConnectionFactory>,
    idle: Mutex<Vec<PoolEntry>>,
    semaphore: Arc<Semaphore>,
    total_connections: AtomicUsize,
    stats: AtomicPoolStats,
    shutdown: AtomicBool,
    self_ref: Weak<Self>,
}

impl SimpleConnectionPool {
    /// Create a new connection pool. No connection is opened until
    /// [`warm_up`](Self::warm_up) or the first [`get`](Self::get).
    pub fn new(config: PoolConfig, factory: Arc<dyn ConnectionFactory>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            semaphore: Arc::new(Semaphore::new(config.max_size)),
            idle: Mutex::new(Vec::with_capacity(config.max_size)),
            config,
            factory,
            total_connections: AtomicUsize::new(0),
            stats: AtomicPoolStats::new(),
            shutdown: AtomicBool::new(false),
            self_ref: self_ref.clone(),
        })
    }

    /// Open `min_size` connections (at least one) and park them as idle.
    ///
    /// Returns the number of connections opened, or the first connect error.
    pub async fn warm_up(&self) -> Result<usize> {
        let target = self.config.min_size.max(1);
        for _ in 0..target {
            let conn = self.create_connection().await?;
            let now = Instant::now();
            self.idle.lock().push(PoolEntry {
                conn,
                created_at: now,
                last_used: now,
            });
        }
        Ok(target)
    }

    /// Borrow a connection, opening one if none is idle.
    pub async fn get(&self) -> Result<PooledConnection> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(Error::pool_exhausted("Pool is shut down"));
        }

        let start = Instant::now();

        let permit = tokio::time::timeout(
            self.config.acquire_timeout,
            self.semaphore.clone().acquire_owned(),
        )
        .await
        .map_err(|_| {
            self.stats.record_exhausted();
            Error::pool_exhausted(format!(
                "Timeout waiting for connection ({}ms)",
                self.config.acquire_timeout.as_millis()
            ))
        })?
        .map_err(|_| Error::pool_exhausted("Pool semaphore closed"))?;

        let (conn, created_at) = match self.take_idle().await {
            Some(entry) => (entry.conn, entry.created_at),
            None => (self.create_connection().await?, Instant::now()),
        };

        self.stats
            .record_acquisition(start.elapsed().as_millis() as u64);

        let pool = self
            .self_ref
            .upgrade()
            .ok_or_else(|| Error::pool_exhausted("Pool has been dropped"))?;

        Ok(PooledConnection {
            conn: Some(conn),
            created_at,
            pool,
            _permit: permit,
        })
    }

    /// Pop idle connections until a usable one turns up
    async fn take_idle(&self) -> Option<PoolEntry> {
        loop {
            let entry = self.idle.lock().pop()?;

            if self.should_recycle(&entry) {
                self.discard();
                continue;
            }
            if self.config.test_on_borrow && !entry.conn.is_valid().await {
                self.discard();
                self.stats.record_health_check_failure();
                continue;
            }
            return Some(entry);
        }
    }

    fn release(&self, conn: Box<dyn Connection>, created_at: Instant) {
        if self.shutdown.load(Ordering::Acquire) {
            drop(conn);
            self.discard();
            return;
        }

        self.idle.lock().push(PoolEntry {
            conn,
            created_at,
            last_used: Instant::now(),
        });
    }

    async fn create_connection(&self) -> Result<Box<dyn Connection>> {
        let conn = self.factory.connect(&self.config.connection).await?;
        self.total_connections.fetch_add(1, Ordering::Release);
        self.stats.record_created();
        Ok(conn)
    }

    fn discard(&self) {
        self.total_connections.fetch_sub(1, Ordering::Release);
        self.stats.record_closed();
    }

    fn should_recycle(&self, entry: &PoolEntry) -> bool {
        entry.created_at.elapsed() > self.config.max_lifetime
            || entry.last_used.elapsed() > self.config.idle_timeout
    }

    /// Get pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Connections currently open (idle and in use)
    pub fn size(&self) -> usize {
        self.total_connections.load(Ordering::Acquire)
    }

    /// Connections currently idle
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    /// Connections currently borrowed
    pub fn in_use(&self) -> usize {
        self.config
            .max_size
            .saturating_sub(self.semaphore.available_permits())
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        self.stats.snapshot()
    }

    /// Refuse new borrows and close all idle connections.
    ///
    /// Borrowed connections are closed as they come back.
    pub async fn close(&self) -> Result<()> {
        self.shutdown.store(true, Ordering::Release);
        self.semaphore.close();

        let drained: Vec<PoolEntry> = std::mem::take(&mut *self.idle.lock());
        for entry in drained {
            let _ = entry.conn.close().await;
            self.discard();
        }

        Ok(())
    }
}
