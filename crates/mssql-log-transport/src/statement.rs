//! INSERT and SELECT statement construction
//!
//! Both builders support two styles:
//! - [`StatementStyle::Bound`]: values travel as driver parameters (`@P1`..)
//! - [`StatementStyle::Literal`]: values are inlined as SQL literals using
//!   the [`RowValue`](crate::record::RowValue) rendering rules
//!
//! Identifiers are validated and bracket-quoted in both styles.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dialect::SqlServerDialect;
use crate::error::{Error, Result};
use crate::record::{FieldMapping, Role, RowValues};
use crate::types::Value;

/// Largest row count `TOP (n)` takes
const MAX_TOP: u64 = i64::MAX as u64;

/// How values reach the statement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatementStyle {
    /// Driver-bound parameters
    #[default]
    Bound,
    /// Inline literals with quote doubling
    Literal,
}

/// SQL text plus the parameters it expects
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Statement text
    pub sql: String,
    /// Bound parameters, in placeholder order (empty for literal statements)
    pub params: Vec<Value>,
}

impl Statement {
    fn new(sql: String, params: Vec<Value>) -> Self {
        Self { sql, params }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Build `INSERT INTO {table} ({columns}) VALUES ({values});`
///
/// Columns keep the insertion order of `row`.
pub fn build_insert(table: &str, row: &RowValues, style: StatementStyle) -> Result<Statement> {
    if row.is_empty() {
        return Err(Error::serialization("cannot insert a row without columns"));
    }

    let dialect = SqlServerDialect;
    let table = dialect.table(table)?;

    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    let mut params = Vec::new();

    for (i, (column, value)) in row.iter().enumerate() {
        columns.push(dialect.column(column)?);
        match style {
            StatementStyle::Bound => {
                values.push(dialect.placeholder(i + 1));
                params.push(value.to_param());
            }
            StatementStyle::Literal => values.push(value.to_literal()?),
        }
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({});",
        table,
        columns.join(", "),
        values.join(", ")
    );
    Ok(Statement::new(sql, params))
}

/// Sort direction on the timestamp column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Oldest first
    Asc,
    /// Newest first
    #[default]
    Desc,
}

impl SortOrder {
    /// `ASC` or `DESC` in any case; anything else falls back to `DESC`
    pub fn parse_lenient(order: Option<&str>) -> Self {
        match order {
            Some(o) if o.eq_ignore_ascii_case("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }

    /// SQL keyword
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Options for reading records back
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueryOptions {
    /// Lower bound on the timestamp (inclusive)
    #[serde(default)]
    pub from: Option<String>,

    /// Upper bound on the timestamp (inclusive)
    #[serde(default)]
    pub until: Option<String>,

    /// Row limit; ignored unless it is a non-negative whole number
    #[serde(default)]
    pub limit: Option<serde_json::Value>,

    /// `ASC` or `DESC` (default)
    #[serde(default)]
    pub order: Option<String>,

    /// Columns to return besides level and timestamp (default: message, meta)
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

impl QueryOptions {
    /// Empty options: newest first, no bounds, no limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lower bound
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Set the upper bound
    pub fn until(mut self, until: impl Into<String>) -> Self {
        self.until = Some(until.into());
        self
    }

    /// Set the row limit
    pub fn limit(mut self, limit: impl Into<serde_json::Value>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    /// Set the sort order
    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Set the projected fields
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// The limit, if it is usable, capped at what `TOP` accepts (`bigint`)
    pub fn effective_limit(&self) -> Option<u64> {
        let limit = match self.limit.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            }),
            serde_json::Value::String(s) => {
                let digits = s.trim();
                digits.parse().ok().or_else(|| {
                    (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
                        .then_some(u64::MAX)
                })
            }
            _ => None,
        }?;
        Some(limit.min(MAX_TOP))
    }

    /// The sort order, defaulting to newest first
    pub fn sort_order(&self) -> SortOrder {
        SortOrder::parse_lenient(self.order.as_deref())
    }

    /// Parsed lower bound, if present and well-formed
    pub fn from_bound(&self) -> Option<NaiveDateTime> {
        self.from.as_deref().and_then(parse_date)
    }

    /// Parsed upper bound, if present and well-formed
    pub fn until_bound(&self) -> Option<NaiveDateTime> {
        self.until.as_deref().and_then(parse_date)
    }

    /// Requested fields, or the defaults
    pub fn requested_fields(&self) -> Vec<&str> {
        match &self.fields {
            Some(f) if !f.is_empty() => f.iter().map(String::as_str).collect(),
            _ => vec![Role::Message.as_str(), Role::Meta.as_str()],
        }
    }
}

/// Parse a timestamp bound.
///
/// Accepts RFC 3339 (converted to UTC), `YYYY-MM-DD[ T]HH:MM[:SS[.fff]]`
/// and plain `YYYY-MM-DD` (midnight).
pub fn parse_date(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.naive_utc());
    }

    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, fmt) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Build the SELECT for a time-range read.
///
/// `SELECT [TOP (n)] {fields}, {level}, {timestamp} FROM {table}
/// [WHERE {timestamp} >= from AND {timestamp} <= until]
/// ORDER BY {timestamp} {order}`
pub fn build_select(
    table: &str,
    fields: &FieldMapping,
    options: &QueryOptions,
    style: StatementStyle,
) -> Result<Statement> {
    let dialect = SqlServerDialect;
    let table = dialect.table(table)?;

    let mut projection: Vec<&str> = Vec::new();
    for name in options.requested_fields() {
        let column = fields.resolve(name);
        if !projection.contains(&column) {
            projection.push(column);
        }
    }
    for role in [Role::Level, Role::Timestamp] {
        let column = fields.column(role);
        if !projection.contains(&column) {
            projection.push(column);
        }
    }

    let columns = projection
        .iter()
        .map(|c| dialect.column(c))
        .collect::<Result<Vec<_>>>()?;

    let ts = dialect.column(fields.column(Role::Timestamp))?;

    let mut predicates = Vec::new();
    let mut params = Vec::new();
    for (op, bound) in [(">=", options.from_bound()), ("<=", options.until_bound())] {
        let Some(bound) = bound else { continue };
        let rhs = match style {
            StatementStyle::Bound => {
                params.push(Value::DateTime(bound));
                dialect.placeholder(params.len())
            }
            StatementStyle::Literal => {
                dialect.string_literal(&bound.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
            }
        };
        predicates.push(format!("{} {} {}", ts, op, rhs));
    }

    let mut sql = format!(
        "SELECT {}{} FROM {}",
        dialect.top_clause(options.effective_limit()),
        columns.join(", "),
        table
    );
    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }
    sql.push_str(&format!(" ORDER BY {} {}", ts, options.sort_order().as_sql()));

    Ok(Statement::new(sql, params))
}
