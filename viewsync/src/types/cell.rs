use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::fmt::Write;

/// Format used to render naive date-times in SQL literals.
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A single column value of a row image.
///
/// Values are decoded by the log reader. Temporal columns may come back in different
/// representations for the same instant, which is why change detection goes through
/// [`Cell::same_value`] instead of plain equality.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    /// Fixed point value kept in its textual form.
    Decimal(String),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    /// `DATETIME` value, interpreted as UTC when compared with other temporal values.
    DateTime(NaiveDateTime),
    /// `TIMESTAMP` value.
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns the instant of a date or date-time value in microseconds since the epoch.
    pub fn instant_micros(&self) -> Option<i64> {
        match self {
            Cell::Date(date) => date
                .and_hms_opt(0, 0, 0)
                .map(|midnight| midnight.and_utc().timestamp_micros()),
            Cell::DateTime(datetime) => Some(datetime.and_utc().timestamp_micros()),
            Cell::Timestamp(timestamp) => Some(timestamp.timestamp_micros()),
            _ => None,
        }
    }

    /// Returns `true` if both cells hold the same value.
    ///
    /// Date and date-time values are compared by the instant they denote and signed/unsigned
    /// integers by their numeric value. Everything else falls back to equality.
    pub fn same_value(&self, other: &Cell) -> bool {
        if let (Some(a), Some(b)) = (self.instant_micros(), other.instant_micros()) {
            return a == b;
        }

        match (self, other) {
            (Cell::I64(a), Cell::U64(b)) | (Cell::U64(b), Cell::I64(a)) => {
                u64::try_from(*a).is_ok_and(|a| a == *b)
            }
            _ => self == other,
        }
    }

    /// Renders the value as an escaped MySQL literal.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Cell::Null => "NULL".to_string(),
            Cell::Bool(value) => value.to_string(),
            Cell::I64(value) => value.to_string(),
            Cell::U64(value) => value.to_string(),
            Cell::F64(value) if value.is_finite() => value.to_string(),
            Cell::F64(_) => "NULL".to_string(),
            Cell::Decimal(value) | Cell::String(value) => quote_string(value),
            Cell::Bytes(value) => {
                let mut rendered = String::with_capacity(value.len() * 2 + 3);
                rendered.push_str("X'");
                for byte in value {
                    let _ = write!(rendered, "{byte:02x}");
                }
                rendered.push('\'');
                rendered
            }
            Cell::Date(value) => quote_string(&value.format("%Y-%m-%d").to_string()),
            Cell::Time(value) => quote_string(&value.format("%H:%M:%S%.f").to_string()),
            Cell::DateTime(value) => quote_string(&value.format(DATETIME_FORMAT).to_string()),
            Cell::Timestamp(value) => {
                quote_string(&value.naive_utc().format(DATETIME_FORMAT).to_string())
            }
            Cell::Json(value) => quote_string(&value.to_string()),
        }
    }
}

/// Quotes a string literal, escaping the characters MySQL treats specially.
fn quote_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        match ch {
            '\0' => quoted.push_str("\\0"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\x1a' => quoted.push_str("\\Z"),
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '"' => quoted.push_str("\\\""),
            other => quoted.push(other),
        }
    }
    quoted.push('\'');
    quoted
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::I64(value.into())
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Self {
        Cell::U64(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::F64(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl From<Vec<u8>> for Cell {
    fn from(value: Vec<u8>) -> Self {
        Cell::Bytes(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(value: NaiveDateTime) -> Self {
        Cell::DateTime(value)
    }
}

impl From<DateTime<Utc>> for Cell {
    fn from(value: DateTime<Utc>) -> Self {
        Cell::Timestamp(value)
    }
}

impl From<serde_json::Value> for Cell {
    fn from(value: serde_json::Value) -> Self {
        Cell::Json(value)
    }
}

impl<T> From<Option<T>> for Cell
where
    T: Into<Cell>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn same_instant_in_different_representations_is_unchanged() {
        let naive = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_milli_opt(10, 30, 0, 250)
            .unwrap();
        let timestamp = Utc.from_utc_datetime(&naive);

        assert!(Cell::DateTime(naive).same_value(&Cell::Timestamp(timestamp)));
        assert!(Cell::Timestamp(timestamp).same_value(&Cell::Timestamp(timestamp)));
    }

    #[test]
    fn midnight_datetime_matches_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        assert!(Cell::Date(date).same_value(&Cell::DateTime(date.and_hms_opt(0, 0, 0).unwrap())));
        assert!(!Cell::Date(date).same_value(&Cell::Date(date.succ_opt().unwrap())));
    }

    #[test]
    fn integers_compare_across_signedness() {
        assert!(Cell::I64(5).same_value(&Cell::U64(5)));
        assert!(!Cell::I64(-1).same_value(&Cell::U64(u64::MAX)));
        assert!(!Cell::I64(5).same_value(&Cell::String("5".to_string())));
    }

    #[test]
    fn literals_are_escaped() {
        assert_eq!(Cell::from("it's").to_sql_literal(), r"'it\'s'");
        assert_eq!(Cell::Null.to_sql_literal(), "NULL");
        assert_eq!(Cell::Bytes(vec![0xde, 0xad]).to_sql_literal(), "X'dead'");
        assert_eq!(
            Cell::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()).to_sql_literal(),
            "'2024-01-02'"
        );
        assert_eq!(Cell::from(Option::<i64>::None), Cell::Null);
    }
}
