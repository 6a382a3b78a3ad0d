//! Tests for transport configuration and construction

mod support;

use mssql_log_transport::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use support::{config, MemoryFactory};

fn construct(config: TransportConfig) -> Result<MssqlTransport> {
    MssqlTransport::with_factory(config, Arc::new(MemoryFactory::new()))
}

// ==================== Mandatory Fields ====================

#[test]
fn test_each_mandatory_field_is_required() {
    let cases: [(fn(&mut TransportConfig), &str); 5] = [
        (|c| c.server.clear(), "The database server is required"),
        (|c| c.user.clear(), "The database username is required"),
        (
            |c| {
                c.password = SensitiveString::default();
            },
            "The database password is required",
        ),
        (|c| c.database.clear(), "The database name is required"),
        (|c| c.table.clear(), "The database table is required"),
    ];

    for (clear, message) in cases {
        let mut config = config();
        clear(&mut config);

        let err = construct(config).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.to_string().contains(message), "{}", err);
    }
}

#[test]
fn test_construction_succeeds_outside_runtime() {
    // no tokio runtime: warm-up is skipped, the pool connects lazily
    let transport = construct(config()).unwrap();
    assert_eq!(transport.config().table, "winston_logs");
}

#[tokio::test]
async fn test_construction_succeeds_with_all_fields() {
    assert!(construct(config()).is_ok());
}

#[test]
fn test_whitespace_server_is_missing() {
    let mut config = config();
    config.server = "   ".into();
    assert!(construct(config).is_err());
}

// ==================== Validation ====================

#[test]
fn test_invalid_table_name_rejected() {
    for table in ["logs\0", "dbo..logs", "a.b.c.d"] {
        let mut config = config();
        config.table = table.into();

        let err = construct(config).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }
}

#[test]
fn test_delimited_table_names_accepted() {
    for table in ["winston-logs", "dbo.winston logs", "app.dbo.Protokoll_Größe"] {
        let mut config = config();
        config.table = table.into();
        assert!(construct(config).is_ok(), "{}", table);
    }
}

#[test]
fn test_invalid_field_mapping_rejected() {
    let empty = config().with_fields(FieldMapping::new("level", "", "message", "timestamp"));
    assert!(construct(empty).is_err());

    let control = config().with_fields(FieldMapping::new("lvl\tx", "meta", "message", "timestamp"));
    assert!(construct(control).is_err());

    let long = config().with_fields(FieldMapping::new("level", "meta", "x".repeat(129), "timestamp"));
    assert!(construct(long).is_err());
}

#[test]
fn test_delimited_field_mapping_accepted() {
    let fields = FieldMapping::new("log-level", "Größe", "log message", "lvl]x");
    assert!(construct(config().with_fields(fields)).is_ok());
}

#[test]
fn test_pool_min_above_max_rejected() {
    let pool = PoolOptions {
        max: 2,
        min: 5,
        ..PoolOptions::default()
    };
    assert!(construct(config().with_pool(pool)).is_err());
}

#[test]
fn test_zero_pool_max_rejected() {
    let pool = PoolOptions {
        max: 0,
        ..PoolOptions::default()
    };
    assert!(construct(config().with_pool(pool)).is_err());
}

// ==================== Loading ====================

#[test]
fn test_from_yaml() {
    let yaml = r#"
server: sql.internal
port: 14330
user: logger
password: s3cret
database: telemetry
table: dbo.winston_logs
fields:
  level: mylevel
  meta: metadata
  message: source
  timestamp: addDate
pool:
  max: 4
  idleTimeoutMillis: 5000
  maxLifetimeMillis: 600000
  testOnBorrow: false
console: true
write_mode: durable
statement_style: literal
level: warn
"#;

    let config = TransportConfig::from_yaml_str(yaml).unwrap();
    config.validate_all().unwrap();

    assert_eq!(config.port, 14330);
    assert_eq!(config.password.expose_secret(), "s3cret");
    assert_eq!(config.fields.column(Role::Timestamp), "addDate");
    assert_eq!(config.pool.max, 4);
    assert_eq!(config.pool.min, 0);
    assert_eq!(config.pool.idle_timeout_millis, 5000);
    assert_eq!(config.pool.max_lifetime_millis, 600_000);
    assert!(!config.pool.test_on_borrow);
    assert!(config.console);
    assert_eq!(config.write_mode, WriteMode::Durable);
    assert_eq!(config.statement_style, StatementStyle::Literal);
    assert_eq!(config.level, Some(Level::Warn));
}

#[test]
fn test_from_json_partial_fields() {
    let json = r#"{
        "server": "localhost",
        "user": "sa",
        "password": "pw",
        "database": "logs",
        "table": "winston_logs",
        "fields": { "meta": "metadata" },
        "trustServerCertificate": true
    }"#;

    let config = TransportConfig::from_json_str(json).unwrap();

    assert_eq!(config.fields.meta, "metadata");
    assert_eq!(config.fields.level, "level");
    assert!(config.trust_server_certificate);
    assert_eq!(config.write_mode, WriteMode::FireAndForget);
    assert_eq!(config.statement_style, StatementStyle::Bound);
}

#[test]
fn test_malformed_yaml_is_config_error() {
    let err = TransportConfig::from_yaml_str("pool: [unterminated").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

#[test]
fn test_missing_fields_load_then_fail_validation() {
    let config = TransportConfig::from_yaml_str("server: localhost").unwrap();
    let err = config.validate_all().unwrap_err();
    assert!(err.to_string().contains("username"));
}

// ==================== Derived Settings ====================

#[test]
fn test_pool_config_from_options() {
    let pool = PoolOptions {
        max: 4,
        min: 1,
        idle_timeout_millis: 1_000,
        acquire_timeout_millis: 2_000,
        max_lifetime_millis: 60_000,
        test_on_borrow: false,
    };
    let pool_config = config().with_port(1434).with_pool(pool).pool_config();

    assert_eq!(pool_config.max_size, 4);
    assert_eq!(pool_config.min_size, 1);
    assert_eq!(pool_config.idle_timeout, Duration::from_secs(1));
    assert_eq!(pool_config.acquire_timeout, Duration::from_secs(2));
    assert_eq!(pool_config.max_lifetime, Duration::from_secs(60));
    assert!(!pool_config.test_on_borrow);
    assert_eq!(pool_config.connection.addr(), "localhost:1434");
}

#[test]
fn test_connection_config_carries_tls_flags() {
    let connection = config()
        .with_encrypt(true)
        .with_trust_server_certificate(true)
        .connection_config();

    assert!(connection.encrypt);
    assert!(connection.trust_cert);
    assert_eq!(connection.user, "sa");
    assert_eq!(connection.password.expose_secret(), "pw");
}

#[test]
fn test_password_never_printed() {
    let config = TransportConfig::new("localhost", "sa", "hunter2", "logs", "winston_logs");

    assert!(!format!("{:?}", config).contains("hunter2"));
    assert!(!serde_json::to_string(&config).unwrap().contains("hunter2"));
}
