//! Unit tests for mssql-log-transport dialect and identifier checks

use mssql_log_transport::dialect::SqlServerDialect;
use mssql_log_transport::security::{
    escape_string_literal, validate_qualified_name, validate_sql_identifier,
};

#[test]
fn test_sqlserver_quote_identifier() {
    let dialect = SqlServerDialect;

    assert_eq!(dialect.quote_identifier("users"), "[users]");
    assert_eq!(dialect.quote_identifier("user_table"), "[user_table]");
    // Test escaping closing brackets
    assert_eq!(dialect.quote_identifier("my]table"), "[my]]table]");
}

#[test]
fn test_sqlserver_placeholder() {
    let dialect = SqlServerDialect;

    assert_eq!(dialect.placeholder(1), "@P1");
    assert_eq!(dialect.placeholder(12), "@P12");
}

#[test]
fn test_column_validates_before_quoting() {
    let dialect = SqlServerDialect;

    assert_eq!(dialect.column("addDate").unwrap(), "[addDate]");
    assert_eq!(dialect.column("a]b").unwrap(), "[a]]b]");
    assert_eq!(dialect.column("log-level").unwrap(), "[log-level]");
    assert_eq!(dialect.column("Größe").unwrap(), "[Größe]");
    assert_eq!(dialect.column("log level").unwrap(), "[log level]");
    assert!(dialect.column("").is_err());
    assert!(dialect.column("a\nb").is_err());
}

#[test]
fn test_table_names() {
    let dialect = SqlServerDialect;

    assert_eq!(dialect.table("winston_logs").unwrap(), "[winston_logs]");
    assert_eq!(dialect.table("dbo.winston_logs").unwrap(), "[dbo].[winston_logs]");
    assert_eq!(
        dialect.table("telemetry.dbo.logs").unwrap(),
        "[telemetry].[dbo].[logs]"
    );
    assert_eq!(
        dialect.table("dbo.winston-logs").unwrap(),
        "[dbo].[winston-logs]"
    );
    assert!(dialect.table("a.b.c.d").is_err());
    assert!(dialect.table(".logs").is_err());
}

#[test]
fn test_top_clause() {
    let dialect = SqlServerDialect;

    assert_eq!(dialect.top_clause(Some(0)), "TOP (0) ");
    assert_eq!(dialect.top_clause(Some(250)), "TOP (250) ");
    assert_eq!(dialect.top_clause(None), "");
}

#[test]
fn test_string_literal() {
    assert_eq!(SqlServerDialect.string_literal("plain"), "'plain'");
    assert_eq!(SqlServerDialect.string_literal("''"), "''''''");
}

#[test]
fn test_identifier_rules() {
    assert!(validate_sql_identifier("_private").is_ok());
    assert!(validate_sql_identifier("col1").is_ok());
    assert!(validate_sql_identifier(&"a".repeat(128)).is_ok());

    assert!(validate_sql_identifier("1col").is_ok());
    assert!(validate_sql_identifier("my-col").is_ok());
    assert!(validate_sql_identifier("my col").is_ok());
    assert!(validate_sql_identifier("naïve").is_ok());

    assert!(validate_sql_identifier(&"a".repeat(129)).is_err());
    assert!(validate_sql_identifier("my\tcol").is_err());
    assert!(validate_sql_identifier("\0").is_err());
}

#[test]
fn test_qualified_name_parts() {
    assert_eq!(validate_qualified_name("logs").unwrap(), vec!["logs"]);
    assert!(validate_qualified_name("dbo..logs").is_err());
}

#[test]
fn test_escape_string() {
    assert_eq!(escape_string_literal("hello"), "hello");
    assert_eq!(escape_string_literal("it's"), "it''s");
    assert_eq!(escape_string_literal("'quoted'"), "''quoted''");
}
