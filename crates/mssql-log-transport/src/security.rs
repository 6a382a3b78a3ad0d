//! Identifier validation and literal escaping for generated SQL.
//!
//! Table and column names are interpolated into statement text (they cannot
//! be bound as parameters), so every name coming from configuration or
//! query options passes through [`validate_sql_identifier`] first.

use crate::error::Error;

/// Validate a SQL identifier (table, schema or column name).
///
/// Names are always emitted as `[name]` with `]` doubled, so any text SQL
/// Server accepts as a delimited identifier is allowed:
/// - Must not be empty
/// - Maximum 128 characters (SQL Server `sysname`)
/// - No control characters (NUL, tab, newline, ...)
///
/// # Examples
///
/// ```
/// use mssql_log_transport::security::validate_sql_identifier;
///
/// assert!(validate_sql_identifier("winston_logs").is_ok());
/// assert!(validate_sql_identifier("log-level").is_ok());
/// assert!(validate_sql_identifier("Größe").is_ok());
///
/// assert!(validate_sql_identifier("").is_err());
/// assert!(validate_sql_identifier("level\0").is_err());
/// assert!(validate_sql_identifier("line\nbreak").is_err());
/// ```
pub fn validate_sql_identifier(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(Error::config("SQL identifier cannot be empty"));
    }

    let len = name.chars().count();
    if len > 128 {
        return Err(Error::config(format!(
            "SQL identifier too long: {} chars (max 128)",
            len
        )));
    }

    if let Some(c) = name.chars().find(|c| c.is_control()) {
        return Err(Error::config(format!(
            "Invalid SQL identifier {:?}: contains control character {:?}",
            name, c
        )));
    }

    Ok(())
}

/// Validate a possibly qualified object name (`table`, `schema.table` or
/// `database.schema.table`) and return its parts.
///
/// ```
/// use mssql_log_transport::security::validate_qualified_name;
///
/// assert_eq!(validate_qualified_name("dbo.logs").unwrap(), vec!["dbo", "logs"]);
/// assert!(validate_qualified_name("a.b.c.d").is_err());
/// assert!(validate_qualified_name("dbo.").is_err());
/// ```
pub fn validate_qualified_name(name: &str) -> crate::Result<Vec<&str>> {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 3 {
        return Err(Error::config(format!(
            "Invalid object name '{}': at most three parts allowed",
            name
        )));
    }
    for part in &parts {
        validate_sql_identifier(part)?;
    }
    Ok(parts)
}

/// Escape a string value for a single-quoted SQL literal.
///
/// Replaces `'` with `''`. This is the only escaping the literal statement
/// style performs; bound parameters never go through it.
///
/// ```
/// use mssql_log_transport::security::escape_string_literal;
///
/// assert_eq!(escape_string_literal("don't"), "don''t");
/// assert_eq!(escape_string_literal("x'; DROP TABLE logs--"), "x''; DROP TABLE logs--");
/// ```
pub fn escape_string_literal(value: &str) -> String {
    // Fast path: no escaping needed (common case)
    if !value.contains('\'') {
        return value.to_string();
    }
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_sql_identifier("level").is_ok());
        assert!(validate_sql_identifier("my_table").is_ok());
        assert!(validate_sql_identifier("_private").is_ok());
        assert!(validate_sql_identifier("TABLE_123").is_ok());
        assert!(validate_sql_identifier("log level").is_ok());
        assert!(validate_sql_identifier("123abc").is_ok());
        assert!(validate_sql_identifier("ログ").is_ok());
    }

    #[test]
    fn test_too_long_identifier() {
        let long = "a".repeat(129);
        assert!(validate_sql_identifier(&long).is_err());

        let max = "a".repeat(128);
        assert!(validate_sql_identifier(&max).is_ok());

        // counted in characters, not bytes
        let wide = "ö".repeat(128);
        assert!(validate_sql_identifier(&wide).is_ok());
    }

    #[test]
    fn test_control_characters() {
        assert!(validate_sql_identifier("x\0").is_err());
        assert!(validate_sql_identifier("a\tb").is_err());
        assert!(validate_sql_identifier("level\r\n").is_err());
        assert!(validate_sql_identifier("\u{7f}").is_err());
    }

    #[test]
    fn test_qualified_names() {
        assert_eq!(validate_qualified_name("logs").unwrap(), vec!["logs"]);
        assert_eq!(
            validate_qualified_name("app.dbo.logs").unwrap(),
            vec!["app", "dbo", "logs"]
        );
        assert_eq!(
            validate_qualified_name("dbo.winston-logs").unwrap(),
            vec!["dbo", "winston-logs"]
        );
        assert!(validate_qualified_name(".logs").is_err());
        assert!(validate_qualified_name("dbo.lo\ngs").is_err());
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_string_literal("plain"), "plain");
        assert_eq!(escape_string_literal("'hello'"), "''hello''");
        assert_eq!(escape_string_literal(""), "");
    }
}
