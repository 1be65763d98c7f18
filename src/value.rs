//! Client-side value model and date/time constructors.
//!
//! Converting wire bytes to these values is the transport's concern; this
//! module only defines what flows between the application and the driver
//! core: parameter values, fetched rows, and column metadata.

use chrono::{LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::Serialize;
use smallvec::SmallVec;
use uuid::Uuid;

use crate::error::{Error, Result};

// Re-export serde_json::Value for JSON support
pub use serde_json::Value as JsonValue;

/// A single column value, as supplied by the application or produced by the
/// transport's value codec.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Json(JsonValue),
}

impl SqlValue {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// A fetched row. Inline storage for rows with up to 16 columns, which
/// covers most tables without a heap allocation.
pub type Row = SmallVec<[SqlValue; 16]>;

/// Column metadata exposed through `Cursor::description`, one entry per
/// result column in result order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    /// Backend type identifier, treated opaquely.
    pub type_code: i32,
    pub display_size: Option<i32>,
    pub internal_size: Option<i32>,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
    pub null_ok: Option<bool>,
}

impl Column {
    pub fn new(name: impl Into<String>, type_code: i32) -> Self {
        Self {
            name: name.into(),
            type_code,
            display_size: None,
            internal_size: None,
            precision: None,
            scale: None,
            null_ok: None,
        }
    }
}

// ============================================================================
// Binary parameter wrapper
// ============================================================================

/// Marks a parameter as opaque bytes rather than text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary(pub Vec<u8>);

impl Binary {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Binary(data.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Binary {
    fn from(data: &[u8]) -> Self {
        Binary(data.to_vec())
    }
}

impl std::ops::Deref for Binary {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

// ============================================================================
// Conversions into SqlValue
// ============================================================================

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Binary> for SqlValue {
    fn from(v: Binary) -> Self {
        SqlValue::Bytes(v.0)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveTime> for SqlValue {
    fn from(v: NaiveTime) -> Self {
        SqlValue::Time(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<JsonValue> for SqlValue {
    fn from(v: JsonValue) -> Self {
        SqlValue::Json(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}

// ============================================================================
// Date/time constructors
// ============================================================================

/// Build a date from calendar fields.
pub fn date(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| Error::Usage(format!("invalid date {year:04}-{month:02}-{day:02}")))
}

/// Build a time-of-day from clock fields.
pub fn time(hour: u32, minute: u32, second: u32) -> Result<NaiveTime> {
    NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or_else(|| Error::Usage(format!("invalid time {hour:02}:{minute:02}:{second:02}")))
}

/// Build a timestamp from calendar and clock fields.
pub fn timestamp(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Result<NaiveDateTime> {
    Ok(date(year, month, day)?.and_time(time(hour, minute, second)?))
}

/// Wall-clock civil time for a Unix tick count, interpreted in the
/// process's configured time zone.
fn civil_from_ticks(ticks: i64) -> Result<NaiveDateTime> {
    match chrono::Local.timestamp_opt(ticks, 0) {
        LocalResult::Single(dt) => Ok(dt.naive_local()),
        _ => Err(Error::Usage(format!("tick value {ticks} out of range"))),
    }
}

/// The calendar date of a Unix tick count in the process time zone.
pub fn date_from_ticks(ticks: i64) -> Result<NaiveDate> {
    Ok(civil_from_ticks(ticks)?.date())
}

/// The time of day of a Unix tick count in the process time zone.
pub fn time_from_ticks(ticks: i64) -> Result<NaiveTime> {
    Ok(civil_from_ticks(ticks)?.time())
}

/// The full civil timestamp of a Unix tick count in the process time zone.
pub fn timestamp_from_ticks(ticks: i64) -> Result<NaiveDateTime> {
    civil_from_ticks(ticks)
}
