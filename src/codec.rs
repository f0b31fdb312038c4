//! Transport encodings for pending filters.
//!
//! Binary items use `bincode`, text items use JSON. Both go through the
//! predicate tree's own serde representation, so anything that builds as a
//! [`Predicate`] round-trips, with one exception: JSON cannot carry NaN or
//! infinite floats and such predicates are rejected up front.

use std::{convert::Infallible, fmt};

use hopper_predicate::{
    Operand, Predicate, PredicateLeaf, PredicateVisitor, ScalarValue,
};

use crate::error::EncodingError;

/// Declared encoding of serialized filters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterFormat {
    /// Compact binary encoding.
    #[default]
    Binary,
    /// Human-readable JSON text.
    Json,
}

impl FilterFormat {
    /// Lower-case name of the format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FilterFormat::Binary => "binary",
            FilterFormat::Json => "json",
        }
    }
}

impl fmt::Display for FilterFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One encoded filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SerializedFilter {
    /// Binary payload.
    Binary(Vec<u8>),
    /// JSON payload.
    Json(String),
}

impl SerializedFilter {
    /// Format this item is encoded in.
    #[must_use]
    pub fn format(&self) -> FilterFormat {
        match self {
            SerializedFilter::Binary(_) => FilterFormat::Binary,
            SerializedFilter::Json(_) => FilterFormat::Json,
        }
    }
}

impl From<Vec<u8>> for SerializedFilter {
    fn from(value: Vec<u8>) -> Self {
        SerializedFilter::Binary(value)
    }
}

impl From<String> for SerializedFilter {
    fn from(value: String) -> Self {
        SerializedFilter::Json(value)
    }
}

/// Encode a single predicate. `index` only labels errors.
pub fn encode(
    index: usize,
    predicate: &Predicate,
    format: FilterFormat,
) -> Result<SerializedFilter, EncodingError> {
    match format {
        FilterFormat::Binary => bincode::serialize(predicate)
            .map(SerializedFilter::Binary)
            .map_err(|source| EncodingError::Binary { index, source }),
        FilterFormat::Json => {
            if has_non_finite_literal(predicate) {
                return Err(EncodingError::Unsupported {
                    index,
                    format,
                    reason: "non-finite float literal".to_string(),
                });
            }
            serde_json::to_string(predicate)
                .map(SerializedFilter::Json)
                .map_err(|source| EncodingError::Json { index, source })
        }
    }
}

/// Decode a single item, checking it against the declared format first.
pub fn decode(
    index: usize,
    item: &SerializedFilter,
    format: FilterFormat,
) -> Result<Predicate, EncodingError> {
    match (item, format) {
        (SerializedFilter::Binary(bytes), FilterFormat::Binary) => {
            bincode::deserialize(bytes).map_err(|source| EncodingError::Binary { index, source })
        }
        (SerializedFilter::Json(text), FilterFormat::Json) => {
            serde_json::from_str(text).map_err(|source| EncodingError::Json { index, source })
        }
        (item, expected) => Err(EncodingError::FormatMismatch {
            index,
            expected,
            actual: item.format(),
        }),
    }
}

/// Encode every predicate in order.
pub fn encode_all<'a, I>(
    predicates: I,
    format: FilterFormat,
) -> Result<Vec<SerializedFilter>, EncodingError>
where
    I: IntoIterator<Item = &'a Predicate>,
{
    predicates
        .into_iter()
        .enumerate()
        .map(|(index, predicate)| encode(index, predicate, format))
        .collect()
}

/// Decode every item in order; the first failure aborts the whole batch.
pub fn decode_all(
    items: &[SerializedFilter],
    format: FilterFormat,
) -> Result<Vec<Predicate>, EncodingError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| decode(index, item, format))
        .collect()
}

fn has_non_finite_literal(predicate: &Predicate) -> bool {
    let mut finder = NonFiniteFinder;
    match predicate.accept(&mut finder) {
        Ok(found) => found,
        Err(never) => match never {},
    }
}

struct NonFiniteFinder;

impl NonFiniteFinder {
    fn scalar(value: &ScalarValue) -> bool {
        matches!(value, ScalarValue::Float64(v) if !v.is_finite())
    }

    fn operand(operand: &Operand) -> bool {
        matches!(operand, Operand::Literal(value) if Self::scalar(value))
    }
}

impl PredicateVisitor for NonFiniteFinder {
    type Error = Infallible;
    type Value = bool;

    fn visit_leaf(&mut self, leaf: &PredicateLeaf) -> Result<bool, Infallible> {
        Ok(match leaf {
            PredicateLeaf::Compare { left, right, .. } => {
                Self::operand(left) || Self::operand(right)
            }
            PredicateLeaf::InList { expr, list, .. } => {
                Self::operand(expr) || list.iter().any(Self::scalar)
            }
            PredicateLeaf::IsNull { expr, .. } | PredicateLeaf::Contains { expr, .. } => {
                Self::operand(expr)
            }
        })
    }

    fn combine_not(&mut self, child: bool) -> Result<bool, Infallible> {
        Ok(child)
    }

    fn combine_and(&mut self, children: Vec<bool>) -> Result<bool, Infallible> {
        Ok(children.into_iter().any(|found| found))
    }

    fn combine_or(&mut self, children: Vec<bool>) -> Result<bool, Infallible> {
        Ok(children.into_iter().any(|found| found))
    }
}

#[cfg(test)]
mod tests {
    use hopper_predicate::col;

    use super::*;

    #[test]
    fn binary_item_rejected_when_json_declared() {
        let encoded = encode(0, &Predicate::is_null(col("x")), FilterFormat::Binary)
            .expect("encode");
        let err = decode(3, &encoded, FilterFormat::Json).expect_err("mismatch");
        match err {
            EncodingError::FormatMismatch {
                index,
                expected,
                actual,
            } => {
                assert_eq!(index, 3);
                assert_eq!(expected, FilterFormat::Json);
                assert_eq!(actual, FilterFormat::Binary);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn garbage_bytes_fail_binary_decode() {
        let item = SerializedFilter::Binary(vec![0xff; 3]);
        assert!(matches!(
            decode(0, &item, FilterFormat::Binary),
            Err(EncodingError::Binary { index: 0, .. })
        ));
    }

    #[test]
    fn garbage_text_fails_json_decode() {
        let item = SerializedFilter::Json("{\"Leaf\": 42".to_string());
        assert!(matches!(
            decode(2, &item, FilterFormat::Json),
            Err(EncodingError::Json { index: 2, .. })
        ));
    }

    #[test]
    fn nan_literal_is_unsupported_in_json_only() {
        let predicate = Predicate::greater_than(col("score"), f64::NAN);
        assert!(matches!(
            encode(0, &predicate, FilterFormat::Json),
            Err(EncodingError::Unsupported { .. })
        ));
        let binary = encode(0, &predicate, FilterFormat::Binary).expect("binary handles NaN");
        let decoded = decode(0, &binary, FilterFormat::Binary).expect("decode");
        assert_eq!(decoded.required_columns(), predicate.required_columns());
    }

    #[test]
    fn json_text_is_readable() {
        let encoded = encode(0, &Predicate::greater_than(col("age"), 18), FilterFormat::Json)
            .expect("encode");
        match encoded {
            SerializedFilter::Json(text) => assert!(text.contains("\"age\"")),
            other => panic!("expected json, got {other:?}"),
        }
    }
}
