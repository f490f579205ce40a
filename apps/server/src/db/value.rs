//! Bind values and canonical result shapes

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// One result row: column name -> scalar, in select-list order.
pub type Row = Map<String, JsonValue>;

/// Scalar bound positionally to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Unambiguous byte encoding used for cache fingerprints.
    ///
    /// Every variant is tagged, and text is length-prefixed, so `Int(1)`,
    /// `Float(1.0)` and `Text("1")` never encode the same way.
    pub(crate) fn write_fingerprint(&self, out: &mut Vec<u8>) {
        match self {
            Self::Null => out.push(b'n'),
            Self::Bool(b) => {
                out.push(b'b');
                out.push(u8::from(*b));
            }
            Self::Int(i) => {
                out.push(b'i');
                out.extend_from_slice(&i.to_le_bytes());
            }
            Self::Float(f) => {
                out.push(b'f');
                out.extend_from_slice(&f.to_bits().to_le_bytes());
            }
            Self::Text(s) => {
                out.push(b's');
                out.extend_from_slice(&(s.len() as u64).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for SqlValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Canonical result of one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub rows: Vec<Row>,
    /// Rows returned, or rows affected for mutations.
    pub row_count: u64,
}

impl QueryResult {
    /// Result of a row-returning statement.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let row_count = rows.len() as u64;
        Self { rows, row_count }
    }

    /// Result of a mutation, using the backend's affected-row count.
    pub fn affected(row_count: u64) -> Self {
        Self {
            rows: Vec::new(),
            row_count,
        }
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }
}

/// NUMERIC/DECIMAL as a JSON number; integral values stay integers.
pub(crate) fn decimal_to_json(value: rust_decimal::Decimal) -> JsonValue {
    use rust_decimal::prelude::ToPrimitive;

    if value.fract().is_zero() {
        if let Some(i) = value.to_i64() {
            return JsonValue::from(i);
        }
    }
    value
        .to_f64()
        .map_or_else(|| JsonValue::String(value.to_string()), JsonValue::from)
}

/// Build a positional parameter list from mixed scalar types.
///
/// ```
/// use soundshelf::params;
/// let p = params!["biology", 10, true];
/// assert_eq!(p.len(), 3);
/// ```
#[macro_export]
macro_rules! params {
    () => { ::std::vec::Vec::<$crate::db::SqlValue>::new() };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::db::SqlValue::from($value)),+]
    };
}
