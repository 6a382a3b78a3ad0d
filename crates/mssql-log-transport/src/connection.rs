//! Connection traits for mssql-log-transport
//!
//! The transport talks to the store through two seams:
//! - Connection: executes one statement and returns rows or an affected count
//! - ConnectionFactory: opens connections for the pool

use async_trait::async_trait;

use crate::config::SensitiveString;
use crate::error::Result;
use crate::types::{Row, Value};

/// A connection to a database
#[async_trait]
pub trait Connection: Send + Sync {
    /// Execute a query that returns rows
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a statement that modifies data, returns affected row count
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute a query and return the first row (convenience method)
    async fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        let rows = self.query(sql, params).await?;
        Ok(rows.into_iter().next())
    }

    /// Check if connection is valid/alive
    async fn is_valid(&self) -> bool;

    /// Close the connection
    async fn close(&self) -> Result<()>;
}

/// Factory for creating connections
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Create a new connection
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>>;
}

/// Configuration for creating connections
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server host name or address
    pub server: String,
    /// TDS port
    pub port: u16,
    /// Database name
    pub database: String,
    /// SQL login name
    pub user: String,
    /// SQL login password
    pub password: SensitiveString,
    /// Require an encrypted connection
    pub encrypt: bool,
    /// Skip server certificate validation
    pub trust_cert: bool,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Application name (shown in sys.dm_exec_sessions)
    pub application_name: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server: "localhost".into(),
            port: 1433,
            database: String::new(),
            user: String::new(),
            password: SensitiveString::default(),
            encrypt: false,
            trust_cert: false,
            connect_timeout_ms: 15_000,
            application_name: Some("mssql-log-transport".into()),
        }
    }
}

impl ConnectionConfig {
    /// Create configuration for a server and database
    pub fn new(server: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            database: database.into(),
            ..Default::default()
        }
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set SQL login credentials
    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<SensitiveString>,
    ) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Require encryption
    pub fn with_encrypt(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }

    /// Trust the server certificate
    pub fn with_trust_cert(mut self, trust: bool) -> Self {
        self.trust_cert = trust;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Set application name
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// `host:port` address
    pub fn addr(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_builder() {
        let config = ConnectionConfig::new("db.internal", "telemetry")
            .with_port(14330)
            .with_credentials("logger", "secret")
            .with_encrypt(true)
            .with_connect_timeout(5000)
            .with_application_name("myapp");

        assert_eq!(config.addr(), "db.internal:14330");
        assert_eq!(config.user, "logger");
        assert_eq!(config.password.expose_secret(), "secret");
        assert!(config.encrypt);
        assert_eq!(config.connect_timeout_ms, 5000);
        assert_eq!(config.application_name, Some("myapp".into()));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ConnectionConfig::new("h", "d").with_credentials("u", "hunter2");
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
