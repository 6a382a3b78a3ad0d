//! Log records and their mapping onto table columns
//!
//! A [`LogRecord`] arrives from the logging pipeline with a level, a
//! message and free-form metadata. [`map_record`] turns it into
//! [`RowValues`]: an insertion-ordered list of physical column names and
//! classified [`RowValue`]s that the statement builder consumes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::error::{Error, Result};
use crate::security::{escape_string_literal, validate_sql_identifier};
use crate::types::Value;

/// A structured log record as handed over by the logging pipeline.
///
/// Every key other than `level` and `message` lands in `meta`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Log level name (`info`, `error`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Log message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Remaining record fields
    #[serde(flatten)]
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl LogRecord {
    /// Create a record with a level and a message and no metadata
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Some(level.into()),
            message: Some(message.into()),
            meta: serde_json::Map::new(),
        }
    }

    /// Add a metadata entry
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Split a JSON object into level, message and metadata.
    ///
    /// Fails with a serialization error when the input is not an object or
    /// when `level`/`message` are present but not strings.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::serialization("log record must be a JSON object"));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Parsed npm level, if the level name is a known one
    pub fn parsed_level(&self) -> Option<Level> {
        self.level.as_deref().and_then(|l| l.parse().ok())
    }
}

/// npm logging levels, most severe first
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// error (0)
    Error,
    /// warn (1)
    Warn,
    /// info (2)
    Info,
    /// http (3)
    Http,
    /// verbose (4)
    Verbose,
    /// debug (5)
    Debug,
    /// silly (6)
    Silly,
}

impl Level {
    /// Numeric severity, lower is more severe
    pub const fn severity(self) -> u8 {
        self as u8
    }

    /// Level name as it appears in records
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Http => "http",
            Self::Verbose => "verbose",
            Self::Debug => "debug",
            Self::Silly => "silly",
        }
    }

    /// Whether a record at `level` passes a threshold of `self`.
    ///
    /// Missing or unrecognised record levels always pass.
    pub fn admits(self, level: Option<&str>) -> bool {
        match level.and_then(|l| l.parse::<Level>().ok()) {
            Some(l) => l <= self,
            None => true,
        }
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "http" => Ok(Self::Http),
            "verbose" => Ok(Self::Verbose),
            "debug" => Ok(Self::Debug),
            "silly" => Ok(Self::Silly),
            other => Err(Error::config(format!("unknown log level '{}'", other))),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical record roles that own a table column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Log level column
    Level,
    /// Serialized metadata column
    Meta,
    /// Message column
    Message,
    /// Insert timestamp column
    Timestamp,
}

impl Role {
    /// All roles
    pub const ALL: [Role; 4] = [Role::Level, Role::Meta, Role::Message, Role::Timestamp];

    /// Logical name of the role
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Level => "level",
            Self::Meta => "meta",
            Self::Message => "message",
            Self::Timestamp => "timestamp",
        }
    }

    /// Look up a role by its logical name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == name)
    }
}

/// Physical column names for the four record roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, JsonSchema)]
pub struct FieldMapping {
    /// Column receiving the level
    #[serde(default = "default_level")]
    #[validate(length(min = 1, max = 128))]
    pub level: String,

    /// Column receiving the JSON-encoded metadata
    #[serde(default = "default_meta")]
    #[validate(length(min = 1, max = 128))]
    pub meta: String,

    /// Column receiving the message
    #[serde(default = "default_message")]
    #[validate(length(min = 1, max = 128))]
    pub message: String,

    /// Column holding the insert time (filled by the store)
    #[serde(default = "default_timestamp")]
    #[validate(length(min = 1, max = 128))]
    pub timestamp: String,
}

fn default_level() -> String {
    "level".to_string()
}

fn default_meta() -> String {
    "meta".to_string()
}

fn default_message() -> String {
    "message".to_string()
}

fn default_timestamp() -> String {
    "timestamp".to_string()
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            level: default_level(),
            meta: default_meta(),
            message: default_message(),
            timestamp: default_timestamp(),
        }
    }
}

impl FieldMapping {
    /// Create a mapping with explicit column names
    pub fn new(
        level: impl Into<String>,
        meta: impl Into<String>,
        message: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            level: level.into(),
            meta: meta.into(),
            message: message.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Physical column for a role
    pub fn column(&self, role: Role) -> &str {
        match role {
            Role::Level => &self.level,
            Role::Meta => &self.meta,
            Role::Message => &self.message,
            Role::Timestamp => &self.timestamp,
        }
    }

    /// Resolve a requested field name: logical role names map to their
    /// column, anything else is taken as a physical column name.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        match Role::from_name(name) {
            Some(role) => self.column(role),
            None => name,
        }
    }

    /// Check that every role resolves to a usable column name
    pub fn validate_columns(&self) -> Result<()> {
        for role in Role::ALL {
            let column = self.column(role);
            validate_sql_identifier(column).map_err(|e| {
                Error::config(format!("field mapping for '{}': {}", role.as_str(), e))
            })?;
        }
        Ok(())
    }
}

/// A column value classified for statement rendering
#[derive(Debug, Clone, PartialEq)]
pub enum RowValue {
    /// Rendered as `null`
    Null,
    /// Rendered as a bare numeric literal
    Number(serde_json::Number),
    /// Rendered as a quoted string with `'` doubled
    Text(String),
    /// JSON-encoded, then rendered like text
    Structured(serde_json::Value),
}

impl RowValue {
    /// SQL literal for the literal statement style
    pub fn to_literal(&self) -> Result<String> {
        Ok(match self {
            Self::Null => "null".to_string(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => format!("'{}'", escape_string_literal(s)),
            Self::Structured(v) => {
                let json = serde_json::to_string(v)?;
                format!("'{}'", escape_string_literal(&json))
            }
        })
    }

    /// Driver parameter for the bound statement style
    pub fn to_param(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Number(n) => match n.as_i64() {
                Some(i) => Value::Int64(i),
                None => n.as_f64().map(Value::Float64).unwrap_or(Value::Null),
            },
            Self::Text(s) => Value::String(s.clone()),
            Self::Structured(v) => Value::Json(v.clone()),
        }
    }
}

impl From<serde_json::Value> for RowValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::Text(s),
            other => Self::Structured(other),
        }
    }
}

impl From<Option<String>> for RowValue {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(s) => Self::Text(s),
            None => Self::Null,
        }
    }
}

/// Insertion-ordered column → value mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowValues {
    entries: Vec<(String, RowValue)>,
}

impl RowValues {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column. Re-assigning a column keeps its original position.
    pub fn insert(&mut self, column: impl Into<String>, value: RowValue) {
        let column = column.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    /// Value of a column
    pub fn get(&self, column: &str) -> Option<&RowValue> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    /// Column names in insertion order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValue)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no column is set
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Map a record onto the configured columns.
///
/// Columns are inserted as meta, level, message; the timestamp column is
/// left to the store's default.
pub fn map_record(record: &LogRecord, fields: &FieldMapping) -> Result<RowValues> {
    let meta = serde_json::to_string(&record.meta)?;

    let mut row = RowValues::new();
    row.insert(fields.meta.as_str(), RowValue::Text(meta));
    row.insert(fields.level.as_str(), RowValue::from(record.level.clone()));
    row.insert(fields.message.as_str(), RowValue::from(record.message.clone()));
    Ok(row)
}
