//! Arrow evaluation of predicate trees.
//!
//! A predicate evaluates to a `BooleanArray` with one slot per row. NULL
//! slots follow Kleene logic through `AND`/`OR`/`NOT` and drop the row when the
//! mask is used as a filter.

use std::sync::Arc;

use arrow::{
    array::{
        new_null_array, Array, ArrayRef, AsArray, BinaryArray, BooleanArray, Float64Array,
        Int64Array, RecordBatch, Scalar, StringArray, UInt64Array,
    },
    compute::kernels::{
        boolean::{and_kleene, is_not_null, is_null, not, or_kleene},
        cast::{can_cast_types, cast_with_options, CastOptions},
        cmp,
    },
    datatypes::DataType,
    error::ArrowError,
};
use hopper_predicate::{
    ComparisonOp, Operand, Predicate, PredicateLeaf, PredicateVisitor, ScalarValue,
};

use crate::error::EvalError;

/// Knobs for predicate evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvalOptions {
    /// Fail when a literal cannot be represented in the column type instead
    /// of treating it as NULL.
    pub strict_casts: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self { strict_casts: true }
    }
}

/// Evaluate `predicate` against every row of `batch`.
pub fn evaluate(
    predicate: &Predicate,
    batch: &RecordBatch,
    options: &EvalOptions,
) -> Result<BooleanArray, EvalError> {
    let mut evaluator = BatchEvaluator { batch, options };
    predicate.accept(&mut evaluator)
}

enum Resolved<'a> {
    Column { name: &'a str, array: ArrayRef },
    Literal(&'a ScalarValue),
}

struct BatchEvaluator<'a> {
    batch: &'a RecordBatch,
    options: &'a EvalOptions,
}

impl<'a> BatchEvaluator<'a> {
    fn rows(&self) -> usize {
        self.batch.num_rows()
    }

    fn constant(&self, value: Option<bool>) -> BooleanArray {
        match value {
            Some(value) => BooleanArray::from(vec![value; self.rows()]),
            None => BooleanArray::new_null(self.rows()),
        }
    }

    fn resolve<'p>(&self, operand: &'p Operand) -> Result<Resolved<'p>, EvalError> {
        match operand {
            Operand::Column(column) => {
                let array = self
                    .batch
                    .column_by_name(&column.name)
                    .ok_or_else(|| EvalError::UnknownColumn(column.name.to_string()))?;
                Ok(Resolved::Column {
                    name: &*column.name,
                    array: Arc::clone(array),
                })
            }
            Operand::Literal(value) => Ok(Resolved::Literal(value)),
        }
    }

    fn cast_options(&self) -> CastOptions<'static> {
        CastOptions {
            safe: !self.options.strict_casts,
            ..Default::default()
        }
    }

    fn cast(&self, array: &ArrayRef, target: &DataType) -> Result<ArrayRef, EvalError> {
        if array.data_type() == target {
            return Ok(Arc::clone(array));
        }
        Ok(cast_with_options(array, target, &self.cast_options())?)
    }

    /// Dictionary arrays compare through their value type.
    fn unpack_dictionary(&self, array: ArrayRef) -> Result<ArrayRef, EvalError> {
        if let DataType::Dictionary(_, value_type) = array.data_type() {
            let value_type = value_type.as_ref().clone();
            return self.cast(&array, &value_type);
        }
        Ok(array)
    }

    /// Bring `other` into a type comparable with the column `array`.
    ///
    /// Numeric pairs meet at a common numeric type; every other pair casts
    /// `other` onto the column type when the two belong to the same family.
    fn coerce(
        &self,
        name: &str,
        array: ArrayRef,
        other: ArrayRef,
        describe_other: impl FnOnce() -> String,
    ) -> Result<(ArrayRef, ArrayRef), EvalError> {
        let array = self.unpack_dictionary(array)?;
        let other = self.unpack_dictionary(other)?;
        let (column_type, other_type) = (array.data_type().clone(), other.data_type().clone());
        if column_type == other_type {
            return Ok((array, other));
        }
        if column_type.is_numeric() && other_type.is_numeric() {
            let target = common_numeric_type(&column_type, &other_type);
            return Ok((self.cast(&array, &target)?, self.cast(&other, &target)?));
        }
        if !same_family(&column_type, &other_type) || !can_cast_types(&other_type, &column_type) {
            return Err(EvalError::TypeMismatch {
                column: name.to_string(),
                column_type,
                other: describe_other(),
            });
        }
        let other = self.cast(&other, &column_type)?;
        Ok((array, other))
    }

    fn compare(
        &self,
        left: &Operand,
        op: ComparisonOp,
        right: &Operand,
    ) -> Result<BooleanArray, EvalError> {
        match (self.resolve(left)?, self.resolve(right)?) {
            (Resolved::Literal(lhs), Resolved::Literal(rhs)) => Ok(self.constant(
                lhs.compare(rhs).map(|ordering| ordering_matches(op, ordering)),
            )),
            (Resolved::Literal(value), Resolved::Column { name, array }) => {
                self.compare_literal(name, array, op.flipped(), value)
            }
            (Resolved::Column { name, array }, Resolved::Literal(value)) => {
                self.compare_literal(name, array, op, value)
            }
            (
                Resolved::Column { name, array },
                Resolved::Column {
                    name: other_name,
                    array: other,
                },
            ) => {
                let (lhs, rhs) = self.coerce(name, array, other, || {
                    format!("column '{other_name}'")
                })?;
                Ok(compare_datums(&lhs, op, &rhs)?)
            }
        }
    }

    fn compare_literal(
        &self,
        name: &str,
        array: ArrayRef,
        op: ComparisonOp,
        value: &ScalarValue,
    ) -> Result<BooleanArray, EvalError> {
        if value.is_null() {
            return Ok(self.constant(None));
        }
        let literal = literal_array(value);
        let (lhs, rhs) = self.coerce(name, array, literal, || {
            format!("{} literal", value.kind_name())
        })?;
        Ok(compare_datums(&lhs, op, &Scalar::new(rhs))?)
    }

    fn in_list(
        &self,
        expr: &Operand,
        list: &[ScalarValue],
        negated: bool,
    ) -> Result<BooleanArray, EvalError> {
        let candidates = list.iter().filter(|value| !value.is_null());
        let matched = match self.resolve(expr)? {
            Resolved::Literal(value) => self.constant(Some(
                !value.is_null()
                    && list.iter().any(|candidate| {
                        value.compare(candidate) == Some(std::cmp::Ordering::Equal)
                    }),
            )),
            Resolved::Column { name, array } => {
                let mut acc = self.constant(Some(false));
                for candidate in candidates {
                    let hit = self.compare_literal(
                        name,
                        Arc::clone(&array),
                        ComparisonOp::Equal,
                        candidate,
                    )?;
                    acc = or_kleene(&acc, &hit)?;
                }
                acc
            }
        };
        if negated {
            Ok(not(&matched)?)
        } else {
            Ok(matched)
        }
    }

    fn is_null(&self, expr: &Operand, negated: bool) -> Result<BooleanArray, EvalError> {
        match self.resolve(expr)? {
            Resolved::Literal(value) => Ok(self.constant(Some(value.is_null() != negated))),
            Resolved::Column { array, .. } => {
                if negated {
                    Ok(is_not_null(array.as_ref())?)
                } else {
                    Ok(is_null(array.as_ref())?)
                }
            }
        }
    }

    fn contains(&self, expr: &Operand, pattern: &str) -> Result<BooleanArray, EvalError> {
        match self.resolve(expr)? {
            Resolved::Literal(ScalarValue::Utf8(text)) => {
                Ok(self.constant(Some(text.contains(pattern))))
            }
            Resolved::Literal(ScalarValue::Null) => Ok(self.constant(None)),
            Resolved::Literal(other) => Err(EvalError::TypeMismatch {
                column: String::new(),
                column_type: DataType::Utf8,
                other: format!("{} literal", other.kind_name()),
            }),
            Resolved::Column { name, array } => {
                let data_type = array.data_type().clone();
                let strings = match &data_type {
                    DataType::Utf8 => array,
                    DataType::LargeUtf8 | DataType::Utf8View => self.cast(&array, &DataType::Utf8)?,
                    DataType::Dictionary(_, value_type) if is_string(value_type) => {
                        self.cast(&array, &DataType::Utf8)?
                    }
                    other => {
                        return Err(EvalError::Unsupported {
                            op: "CONTAINS",
                            column: name.to_string(),
                            data_type: other.clone(),
                        })
                    }
                };
                Ok(strings
                    .as_string::<i32>()
                    .iter()
                    .map(|value| value.map(|text| text.contains(pattern)))
                    .collect())
            }
        }
    }
}

impl PredicateVisitor for BatchEvaluator<'_> {
    type Error = EvalError;
    type Value = BooleanArray;

    fn visit_leaf(&mut self, leaf: &PredicateLeaf) -> Result<BooleanArray, EvalError> {
        match leaf {
            PredicateLeaf::Compare { left, op, right } => self.compare(left, *op, right),
            PredicateLeaf::InList {
                expr,
                list,
                negated,
            } => self.in_list(expr, list, *negated),
            PredicateLeaf::IsNull { expr, negated } => self.is_null(expr, *negated),
            PredicateLeaf::Contains { expr, pattern } => self.contains(expr, pattern),
        }
    }

    fn combine_not(&mut self, child: BooleanArray) -> Result<BooleanArray, EvalError> {
        Ok(not(&child)?)
    }

    fn combine_and(&mut self, children: Vec<BooleanArray>) -> Result<BooleanArray, EvalError> {
        fold_masks(children, and_kleene, || self.constant(Some(true)))
    }

    fn combine_or(&mut self, children: Vec<BooleanArray>) -> Result<BooleanArray, EvalError> {
        fold_masks(children, or_kleene, || self.constant(Some(false)))
    }
}

fn fold_masks<F, E>(
    children: Vec<BooleanArray>,
    combine: F,
    empty: E,
) -> Result<BooleanArray, EvalError>
where
    F: Fn(&BooleanArray, &BooleanArray) -> Result<BooleanArray, ArrowError>,
    E: FnOnce() -> BooleanArray,
{
    let mut children = children.into_iter();
    let Some(mut acc) = children.next() else {
        return Ok(empty());
    };
    for child in children {
        acc = combine(&acc, &child)?;
    }
    Ok(acc)
}

fn compare_datums(
    lhs: &dyn arrow::array::Datum,
    op: ComparisonOp,
    rhs: &dyn arrow::array::Datum,
) -> Result<BooleanArray, ArrowError> {
    match op {
        ComparisonOp::Equal => cmp::eq(lhs, rhs),
        ComparisonOp::NotEqual => cmp::neq(lhs, rhs),
        ComparisonOp::LessThan => cmp::lt(lhs, rhs),
        ComparisonOp::LessThanOrEqual => cmp::lt_eq(lhs, rhs),
        ComparisonOp::GreaterThan => cmp::gt(lhs, rhs),
        ComparisonOp::GreaterThanOrEqual => cmp::gt_eq(lhs, rhs),
    }
}

fn ordering_matches(op: ComparisonOp, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering;
    match op {
        ComparisonOp::Equal => ordering == Ordering::Equal,
        ComparisonOp::NotEqual => ordering != Ordering::Equal,
        ComparisonOp::LessThan => ordering == Ordering::Less,
        ComparisonOp::LessThanOrEqual => ordering != Ordering::Greater,
        ComparisonOp::GreaterThan => ordering == Ordering::Greater,
        ComparisonOp::GreaterThanOrEqual => ordering != Ordering::Less,
    }
}

/// One-element array holding a non-null literal.
fn literal_array(value: &ScalarValue) -> ArrayRef {
    match value {
        ScalarValue::Null => new_null_array(&DataType::Null, 1),
        ScalarValue::Boolean(v) => Arc::new(BooleanArray::from(vec![*v])),
        ScalarValue::Int64(v) => Arc::new(Int64Array::from(vec![*v])),
        ScalarValue::UInt64(v) => Arc::new(UInt64Array::from(vec![*v])),
        ScalarValue::Float64(v) => Arc::new(Float64Array::from(vec![*v])),
        ScalarValue::Utf8(v) => Arc::new(StringArray::from(vec![v.as_str()])),
        ScalarValue::Binary(v) => Arc::new(BinaryArray::from_vec(vec![v.as_slice()])),
    }
}

fn common_numeric_type(left: &DataType, right: &DataType) -> DataType {
    let is_float = |ty: &DataType| {
        matches!(
            ty,
            DataType::Float16
                | DataType::Float32
                | DataType::Float64
                | DataType::Decimal128(_, _)
                | DataType::Decimal256(_, _)
        )
    };
    let is_unsigned = |ty: &DataType| {
        matches!(
            ty,
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64
        )
    };
    if is_float(left) || is_float(right) {
        DataType::Float64
    } else if is_unsigned(left) && is_unsigned(right) {
        DataType::UInt64
    } else {
        DataType::Int64
    }
}

fn is_string(ty: &DataType) -> bool {
    matches!(ty, DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View)
}

fn is_binary(ty: &DataType) -> bool {
    matches!(
        ty,
        DataType::Binary | DataType::LargeBinary | DataType::BinaryView | DataType::FixedSizeBinary(_)
    )
}

/// Whether a value of type `other` may be compared with a column of type `column`.
fn same_family(column: &DataType, other: &DataType) -> bool {
    (is_string(column) && is_string(other))
        || (is_binary(column) && is_binary(other))
        || (column.is_temporal() && (other.is_numeric() || is_string(other)))
}
