//! SQL Server dialect helpers
//!
//! Identifier quoting, parameter placeholders and clause fragments used by
//! the statement builder. SQL Server has no sea-query backend, so the SQL is
//! produced by hand here.

use crate::error::Result;
use crate::security::{escape_string_literal, validate_qualified_name, validate_sql_identifier};

/// SQL Server (T-SQL) dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl SqlServerDialect {
    /// Get the dialect name
    pub fn name(&self) -> &'static str {
        "SQL Server"
    }

    /// Quote an identifier: `[name]`, with `]` doubled
    pub fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    /// Validate and quote a column name
    pub fn column(&self, name: &str) -> Result<String> {
        validate_sql_identifier(name)?;
        Ok(self.quote_identifier(name))
    }

    /// Validate and quote a possibly qualified table name: `[dbo].[logs]`
    pub fn table(&self, name: &str) -> Result<String> {
        let parts = validate_qualified_name(name)?;
        Ok(parts
            .iter()
            .map(|p| self.quote_identifier(p))
            .collect::<Vec<_>>()
            .join("."))
    }

    /// Parameter placeholder, 1-based (`@P1`)
    pub fn placeholder(&self, index: usize) -> String {
        format!("@P{}", index)
    }

    /// Row-limiting prefix for a SELECT list
    pub fn top_clause(&self, limit: Option<u64>) -> String {
        match limit {
            Some(n) => format!("TOP ({}) ", n),
            None => String::new(),
        }
    }

    /// Quote a string literal
    pub fn string_literal(&self, value: &str) -> String {
        format!("'{}'", escape_string_literal(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlserver_dialect() {
        let dialect = SqlServerDialect;
        assert_eq!(dialect.name(), "SQL Server");
        assert_eq!(dialect.quote_identifier("logs"), "[logs]");
        assert_eq!(dialect.quote_identifier("a]b"), "[a]]b]");
        assert_eq!(dialect.placeholder(1), "@P1");
    }

    #[test]
    fn test_qualified_table() {
        let dialect = SqlServerDialect;
        assert_eq!(dialect.table("dbo.winston_logs").unwrap(), "[dbo].[winston_logs]");
        assert_eq!(dialect.table("logs").unwrap(), "[logs]");
        assert_eq!(dialect.table("logs; DROP TABLE x").unwrap(), "[logs; DROP TABLE x]");
        assert!(dialect.table("logs\0").is_err());
    }

    #[test]
    fn test_top_clause() {
        let dialect = SqlServerDialect;
        assert_eq!(dialect.top_clause(Some(10)), "TOP (10) ");
        assert_eq!(dialect.top_clause(None), "");
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(SqlServerDialect.string_literal("it's"), "'it''s'");
    }
}
