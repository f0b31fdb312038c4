use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Literal values accepted by predicate operands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    /// Represents SQL/Arrow `NULL`.
    Null,
    /// Boolean literal.
    Boolean(bool),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    Utf8(String),
    /// Binary blob.
    Binary(Vec<u8>),
}

impl ScalarValue {
    /// Returns true when the literal is the `Null` variant.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Compares this scalar with another, returning the ordering when both sides are comparable.
    ///
    /// Numeric variants compare by value: integer pairs exactly, pairs
    /// involving a float through `f64`. Everything else only compares
    /// against its own variant.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        use ScalarValue::*;
        match (self, other) {
            (Null, _) | (_, Null) => None,
            (Boolean(lhs), Boolean(rhs)) => Some(lhs.cmp(rhs)),
            (Int64(lhs), Int64(rhs)) => Some(lhs.cmp(rhs)),
            (UInt64(lhs), UInt64(rhs)) => Some(lhs.cmp(rhs)),
            (Int64(lhs), UInt64(rhs)) => Some(i128::from(*lhs).cmp(&i128::from(*rhs))),
            (UInt64(lhs), Int64(rhs)) => Some(i128::from(*lhs).cmp(&i128::from(*rhs))),
            (Float64(lhs), Float64(rhs)) => lhs.partial_cmp(rhs),
            (Int64(lhs), Float64(rhs)) => (*lhs as f64).partial_cmp(rhs),
            (UInt64(lhs), Float64(rhs)) => (*lhs as f64).partial_cmp(rhs),
            (Float64(lhs), Int64(rhs)) => lhs.partial_cmp(&(*rhs as f64)),
            (Float64(lhs), UInt64(rhs)) => lhs.partial_cmp(&(*rhs as f64)),
            (Utf8(lhs), Utf8(rhs)) => Some(lhs.cmp(rhs)),
            (Binary(lhs), Binary(rhs)) => Some(lhs.cmp(rhs)),
            _ => None,
        }
    }

    /// Short name of the literal kind, used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            ScalarValue::Null => "null",
            ScalarValue::Boolean(_) => "boolean",
            ScalarValue::Int64(_) => "int64",
            ScalarValue::UInt64(_) => "uint64",
            ScalarValue::Float64(_) => "float64",
            ScalarValue::Utf8(_) => "utf8",
            ScalarValue::Binary(_) => "binary",
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Boolean(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Int64(i64::from(value))
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int64(value)
    }
}

impl From<u32> for ScalarValue {
    fn from(value: u32) -> Self {
        ScalarValue::UInt64(u64::from(value))
    }
}

impl From<u64> for ScalarValue {
    fn from(value: u64) -> Self {
        ScalarValue::UInt64(value)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Float64(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Utf8(value.to_owned())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Utf8(value)
    }
}

impl From<Vec<u8>> for ScalarValue {
    fn from(value: Vec<u8>) -> Self {
        ScalarValue::Binary(value)
    }
}

impl<T> From<Option<T>> for ScalarValue
where
    T: Into<ScalarValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(ScalarValue::Null, Into::into)
    }
}
