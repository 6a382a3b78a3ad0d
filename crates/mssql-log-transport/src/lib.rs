//! # mssql-log-transport
//!
//! A log transport that persists structured log records into a SQL Server
//! table and reads them back by time range.
//!
//! ## Features
//!
//! - **Record Mapping**: level, message and a JSON metadata column, with
//!   configurable column names
//! - **Statement Building**: bound `@P1..` parameters by default, inline
//!   literals for compatibility
//! - **Write Modes**: fire-and-forget (failures are logged) or durable
//!   (failures are returned)
//! - **Connection Pooling**: semaphore-bounded pool with idle recycling and
//!   health checks
//! - **Queries**: time range, limit, sort order and column projection
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mssql_log_transport::prelude::*;
//!
//! let config = TransportConfig::new("sql.internal", "logger", "s3cret", "telemetry", "dbo.logs")
//!     .with_console(true);
//! let transport = MssqlTransport::new(config)?;
//!
//! transport.log(LogRecord::new("info", "user signed in").with_meta("user", "alice"), |result| {
//!     if let Ok(true) = result {
//!         // persisted
//!     }
//! });
//!
//! let rows = transport
//!     .read(&QueryOptions::new().from("2024-01-01").limit(50).order("asc"))
//!     .await?;
//! ```
//!
//! ## Feature Flags
//!
//! - `sqlserver` (default) - SQL Server support via tiberius

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod pool;
pub mod record;
pub mod security;
pub mod statement;
pub mod stats;
pub mod transport;
pub mod types;

#[cfg(feature = "sqlserver")]
pub mod sqlserver;

/// Prelude module for convenient imports
pub mod prelude {
    // Error types
    pub use crate::error::{Error, ErrorCategory, Result};

    // Value and type system
    pub use crate::types::{Row, Value};

    // Configuration
    pub use crate::config::{PoolOptions, SensitiveString, TransportConfig, WriteMode};

    // Records and mapping
    pub use crate::record::{map_record, FieldMapping, Level, LogRecord, Role, RowValue, RowValues};

    // Statements
    pub use crate::statement::{
        build_insert, build_select, QueryOptions, SortOrder, Statement, StatementStyle,
    };

    // Connection traits and pool
    pub use crate::connection::{Connection, ConnectionConfig, ConnectionFactory};
    pub use crate::pool::{PoolConfig, PoolStats, PooledConnection, SimpleConnectionPool};

    // Transport
    pub use crate::stats::TransportStats;
    pub use crate::transport::{MssqlTransport, TRANSPORT_NAME};

    #[cfg(feature = "sqlserver")]
    pub use crate::sqlserver::{SqlServerConnection, SqlServerConnectionFactory};
}

// Re-export commonly used items at crate root
pub use config::TransportConfig;
pub use error::{Error, Result};
pub use record::LogRecord;
pub use transport::{MssqlTransport, TRANSPORT_NAME};
pub use types::Value;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let _value = Value::Int64(42);
        let _config = TransportConfig::new("localhost", "sa", "pw", "logs", "winston_logs");
        let _options = QueryOptions::new().limit(10);
        let _mode = WriteMode::Durable;
    }

    #[test]
    fn test_error_types() {
        let err = Error::connection("test error");
        assert!(err.is_retriable());
        assert_eq!(err.category(), ErrorCategory::Connection);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(WriteMode::default(), WriteMode::FireAndForget);
        assert_eq!(StatementStyle::default(), StatementStyle::Bound);
        assert_eq!(FieldMapping::default().column(Role::Timestamp), "timestamp");
        assert_eq!(TRANSPORT_NAME, "MSSQL");
    }
}
