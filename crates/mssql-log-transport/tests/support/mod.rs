//! In-memory store shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use mssql_log_transport::prelude::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A statement the store received
#[derive(Debug, Clone)]
pub struct Executed {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Shared state behind every connection the factory hands out
#[derive(Default)]
pub struct MemoryStore {
    executed: Mutex<Vec<Executed>>,
    rows: Mutex<Vec<Row>>,
    fail_statements: AtomicBool,
    fail_connect: AtomicBool,
    invalid: AtomicBool,
    connects: AtomicUsize,
    latency: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn executed(&self) -> Vec<Executed> {
        self.executed.lock().clone()
    }

    pub fn inserts(&self) -> Vec<Executed> {
        self.executed()
            .into_iter()
            .filter(|e| e.sql.starts_with("INSERT"))
            .collect()
    }

    pub fn set_rows(&self, rows: Vec<Row>) {
        *self.rows.lock() = rows;
    }

    pub fn fail_statements(&self, fail: bool) {
        self.fail_statements.store(fail, Ordering::SeqCst);
    }

    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_invalid(&self, invalid: bool) {
        self.invalid.store(invalid, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    async fn run(&self, sql: &str, params: &[Value]) -> Result<()> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        self.executed.lock().push(Executed {
            sql: sql.to_string(),
            params: params.to_vec(),
        });

        if self.fail_statements.load(Ordering::SeqCst) {
            return Err(Error::query_with_sql("Invalid object name", sql));
        }
        Ok(())
    }
}

pub struct MemoryConnection {
    store: Arc<MemoryStore>,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.store.run(sql, params).await?;
        Ok(self.store.rows.lock().clone())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.store.run(sql, params).await?;
        Ok(1)
    }

    async fn is_valid(&self) -> bool {
        !self.store.invalid.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryFactory {
    pub store: Arc<MemoryStore>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionFactory for MemoryFactory {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        self.store.connects.fetch_add(1, Ordering::SeqCst);
        if self.store.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::connection("connection refused"));
        }
        Ok(Box::new(MemoryConnection {
            store: self.store.clone(),
        }))
    }
}

pub fn config() -> TransportConfig {
    TransportConfig::new("localhost", "sa", "pw", "logs", "winston_logs")
}

pub fn transport(config: TransportConfig) -> (MssqlTransport, Arc<MemoryStore>) {
    let factory = MemoryFactory::new();
    let store = factory.store.clone();
    let transport = MssqlTransport::with_factory(config, Arc::new(factory))
        .expect("valid test configuration");
    (transport, store)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
