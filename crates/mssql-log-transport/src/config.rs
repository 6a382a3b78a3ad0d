//! Transport configuration
//!
//! Everything the transport needs is captured once at construction in a
//! [`TransportConfig`]. The five connection fields (server, user, password,
//! database, table) are mandatory; the rest falls back to defaults.
//!
//! # Example
//!
//! ```yaml
//! server: sql.internal
//! user: logger
//! password: s3cret
//! database: telemetry
//! table: dbo.winston_logs
//! fields:
//!   level: mylevel
//!   meta: metadata
//!   message: source
//!   timestamp: addDate
//! pool:
//!   max: 10
//!   min: 0
//!   idleTimeoutMillis: 30000
//! console: true
//! ```

use schemars::JsonSchema;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::connection::ConnectionConfig;
use crate::error::{Error, Result};
use crate::pool::PoolConfig;
use crate::record::{FieldMapping, Level};
use crate::security::validate_qualified_name;
use crate::statement::StatementStyle;

/// A string whose value never shows up in `Debug`, `Display` or serialized output.
#[derive(Clone)]
pub struct SensitiveString(SecretString);

impl SensitiveString {
    /// Create a new sensitive string from any string-like value
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::new(value.into().into_boxed_str()))
    }

    /// Expose the secret value.
    ///
    /// Use sparingly - only when the actual value is needed (e.g., for authentication).
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    /// Whether the secret is the empty string
    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl Default for SensitiveString {
    fn default() -> Self {
        Self::new("")
    }
}

impl std::fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for SensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for SensitiveString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SensitiveString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Serialize as redacted to prevent accidental exposure in config dumps/logs
impl Serialize for SensitiveString {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str("***REDACTED***")
    }
}

impl<'de> Deserialize<'de> for SensitiveString {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

impl JsonSchema for SensitiveString {
    fn schema_name() -> String {
        "SensitiveString".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        let mut schema = gen.subschema_for::<String>();
        if let schemars::schema::Schema::Object(obj) = &mut schema {
            obj.format = Some("password".to_string());
            obj.metadata().description =
                Some("Sensitive value. Will be redacted in logs.".to_string());
        }
        schema
    }
}

/// What a write reports back when the store rejects it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Store failures are logged and the caller is told the write went through
    #[default]
    FireAndForget,
    /// Store failures are returned to the caller
    Durable,
}

/// Connection pool sizing and recycling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, JsonSchema)]
pub struct PoolOptions {
    /// Maximum number of open connections (default: 10)
    #[serde(default = "default_pool_max")]
    #[validate(range(min = 1, max = 1024))]
    pub max: u32,

    /// Connections kept open when idle (default: 0)
    #[serde(default)]
    #[validate(range(min = 0, max = 1024))]
    pub min: u32,

    /// Idle connections older than this are closed (default: 30000)
    #[serde(default = "default_idle_timeout_millis", alias = "idleTimeoutMillis")]
    #[validate(range(min = 1))]
    pub idle_timeout_millis: u64,

    /// Maximum time to wait for a free connection (default: 30000)
    #[serde(default = "default_acquire_timeout_millis", alias = "acquireTimeoutMillis")]
    #[validate(range(min = 1))]
    pub acquire_timeout_millis: u64,

    /// Connections open longer than this are replaced (default: 1800000)
    #[serde(default = "default_max_lifetime_millis", alias = "maxLifetimeMillis")]
    #[validate(range(min = 1))]
    pub max_lifetime_millis: u64,

    /// Check idle connections before handing them out (default: true)
    #[serde(default = "default_test_on_borrow", alias = "testOnBorrow")]
    pub test_on_borrow: bool,
}

fn default_pool_max() -> u32 {
    10
}

fn default_idle_timeout_millis() -> u64 {
    30_000
}

fn default_acquire_timeout_millis() -> u64 {
    30_000
}

fn default_max_lifetime_millis() -> u64 {
    1_800_000
}

fn default_test_on_borrow() -> bool {
    true
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max: default_pool_max(),
            min: 0,
            idle_timeout_millis: default_idle_timeout_millis(),
            acquire_timeout_millis: default_acquire_timeout_millis(),
            max_lifetime_millis: default_max_lifetime_millis(),
            test_on_borrow: default_test_on_borrow(),
        }
    }
}

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, JsonSchema)]
pub struct TransportConfig {
    /// Database server host name or address
    #[serde(default)]
    pub server: String,

    /// TDS port (default: 1433)
    #[serde(default = "default_port")]
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    /// SQL login name
    #[serde(default)]
    pub user: String,

    /// SQL login password
    #[serde(default)]
    pub password: SensitiveString,

    /// Database name
    #[serde(default)]
    pub database: String,

    /// Target table, optionally schema-qualified (`dbo.logs`)
    #[serde(default)]
    pub table: String,

    /// Column names for the record roles
    #[serde(default)]
    #[validate(nested)]
    pub fields: FieldMapping,

    /// Pool sizing
    #[serde(default)]
    #[validate(nested)]
    pub pool: PoolOptions,

    /// Require an encrypted connection
    #[serde(default)]
    pub encrypt: bool,

    /// Accept the server certificate without validation
    #[serde(default, alias = "trustServerCertificate")]
    pub trust_server_certificate: bool,

    /// Emit transport diagnostics at info/error instead of debug
    #[serde(default)]
    pub console: bool,

    /// Whether writes surface store failures
    #[serde(default)]
    pub write_mode: WriteMode,

    /// Bound parameters or inline literals
    #[serde(default)]
    pub statement_style: StatementStyle,

    /// Least severe level that is persisted (None = everything)
    #[serde(default)]
    pub level: Option<Level>,

    /// Acknowledge writes without persisting anything
    #[serde(default)]
    pub silent: bool,

    /// Connect timeout in milliseconds (default: 15000)
    #[serde(default = "default_connect_timeout_ms")]
    #[validate(range(min = 100, max = 300_000))]
    pub connect_timeout_ms: u64,
}

fn default_port() -> u16 {
    1433
}

fn default_connect_timeout_ms() -> u64 {
    15_000
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: default_port(),
            user: String::new(),
            password: SensitiveString::default(),
            database: String::new(),
            table: String::new(),
            fields: FieldMapping::default(),
            pool: PoolOptions::default(),
            encrypt: false,
            trust_server_certificate: false,
            console: false,
            write_mode: WriteMode::default(),
            statement_style: StatementStyle::default(),
            level: None,
            silent: false,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl TransportConfig {
    /// Create a configuration from the five mandatory fields
    pub fn new(
        server: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<SensitiveString>,
        database: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
            table: table.into(),
            ..Default::default()
        }
    }

    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::config(format!("invalid YAML config: {}", e)))
    }

    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::config(format!("invalid JSON config: {}", e)))
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set custom column names
    pub fn with_fields(mut self, fields: FieldMapping) -> Self {
        self.fields = fields;
        self
    }

    /// Set pool sizing
    pub fn with_pool(mut self, pool: PoolOptions) -> Self {
        self.pool = pool;
        self
    }

    /// Enable/disable transport encryption
    pub fn with_encrypt(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }

    /// Trust the server certificate without validation
    pub fn with_trust_server_certificate(mut self, trust: bool) -> Self {
        self.trust_server_certificate = trust;
        self
    }

    /// Enable/disable verbose diagnostics
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// Set the write mode
    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    /// Set the statement style
    pub fn with_statement_style(mut self, style: StatementStyle) -> Self {
        self.statement_style = style;
        self
    }

    /// Only persist records at `level` or more severe
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Enable/disable silent mode
    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Check the mandatory fields, ranges and identifiers.
    ///
    /// Mandatory fields are checked first, in declaration order, so the
    /// error names the first one missing.
    pub fn validate_all(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(Error::config("The database server is required"));
        }
        if self.user.trim().is_empty() {
            return Err(Error::config("The database username is required"));
        }
        if self.password.is_empty() {
            return Err(Error::config("The database password is required"));
        }
        if self.database.trim().is_empty() {
            return Err(Error::config("The database name is required"));
        }
        if self.table.trim().is_empty() {
            return Err(Error::config("The database table is required"));
        }

        self.validate()?;

        if self.pool.min > self.pool.max {
            return Err(Error::config(format!(
                "pool.min ({}) must not exceed pool.max ({})",
                self.pool.min, self.pool.max
            )));
        }

        validate_qualified_name(&self.table)?;
        self.fields.validate_columns()?;
        Ok(())
    }

    /// Driver-level connection settings
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(&self.server, &self.database)
            .with_port(self.port)
            .with_credentials(&self.user, self.password.clone())
            .with_encrypt(self.encrypt)
            .with_trust_cert(self.trust_server_certificate)
            .with_connect_timeout(self.connect_timeout_ms)
    }

    /// Pool settings
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new(self.connection_config())
            .with_min_size(self.pool.min as usize)
            .with_max_size(self.pool.max as usize)
            .with_idle_timeout(Duration::from_millis(self.pool.idle_timeout_millis))
            .with_acquire_timeout(Duration::from_millis(self.pool.acquire_timeout_millis))
            .with_max_lifetime(Duration::from_millis(self.pool.max_lifetime_millis))
            .with_test_on_borrow(self.pool.test_on_borrow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> TransportConfig {
        TransportConfig::new("localhost", "sa", "pw", "logs", "winston_logs")
    }

    #[test]
    fn test_defaults() {
        let config = valid();
        assert_eq!(config.port, 1433);
        assert_eq!(config.pool.max, 10);
        assert_eq!(config.pool.min, 0);
        assert_eq!(config.pool.idle_timeout_millis, 30_000);
        assert_eq!(config.write_mode, WriteMode::FireAndForget);
        assert_eq!(config.fields, FieldMapping::default());
        assert!(config.validate_all().is_ok());
    }

    #[test]
    fn test_password_redacted() {
        let config = valid();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("pw\""));
        assert!(debug.contains("[REDACTED]"));

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("***REDACTED***"));
    }

    #[test]
    fn test_pool_min_above_max_rejected() {
        let config = valid().with_pool(PoolOptions {
            max: 2,
            min: 5,
            ..Default::default()
        });
        assert!(config.validate_all().is_err());
    }

    #[test]
    fn test_pool_config_passthrough() {
        let pool = valid().pool_config();
        assert_eq!(pool.max_size, 10);
        assert_eq!(pool.min_size, 0);
        assert_eq!(pool.idle_timeout, Duration::from_secs(30));
        assert_eq!(pool.max_lifetime, Duration::from_secs(1800));
        assert!(pool.test_on_borrow);
    }
}
