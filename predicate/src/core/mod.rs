#![deny(missing_docs)]
//! Core predicate structures shared by the hopper and its evaluator.

mod operand;
mod value;
mod visitor;

use std::{collections::BTreeSet, fmt, sync::Arc};

pub use operand::{col, ColumnRef, Operand};
use serde::{Deserialize, Serialize};
pub use value::ScalarValue;
pub use visitor::{ColumnCollector, PredicateVisitor};

/// Comparison operator used by binary predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    /// Equals (`=`).
    Equal,
    /// Not equals (`!=`).
    NotEqual,
    /// Less than (`<`).
    LessThan,
    /// Less than or equal to (`<=`).
    LessThanOrEqual,
    /// Greater than (`>`).
    GreaterThan,
    /// Greater than or equal to (`>=`).
    GreaterThanOrEqual,
}

impl ComparisonOp {
    /// Returns a textual representation of the operator.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "!=",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessThanOrEqual => "<=",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterThanOrEqual => ">=",
        }
    }

    /// Returns the operator that swaps the left/right side of the comparison.
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            ComparisonOp::Equal => ComparisonOp::Equal,
            ComparisonOp::NotEqual => ComparisonOp::NotEqual,
            ComparisonOp::LessThan => ComparisonOp::GreaterThan,
            ComparisonOp::LessThanOrEqual => ComparisonOp::GreaterThanOrEqual,
            ComparisonOp::GreaterThan => ComparisonOp::LessThan,
            ComparisonOp::GreaterThanOrEqual => ComparisonOp::LessThanOrEqual,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean test over table rows, paired with the columns it reads.
///
/// Predicates are immutable values: every combinator consumes its inputs and
/// returns a fresh tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate {
    kind: PredicateNode,
}

impl Predicate {
    /// Returns a reference to the underlying node.
    #[must_use]
    pub fn kind(&self) -> &PredicateNode {
        &self.kind
    }

    /// Builds a predicate directly from a leaf node.
    #[must_use]
    pub fn from_leaf(leaf: PredicateLeaf) -> Self {
        Self::from_kind(PredicateNode::Leaf(leaf))
    }

    /// Binary comparison between two operands.
    #[must_use]
    pub fn compare<L, R>(left: L, op: ComparisonOp, right: R) -> Self
    where
        L: Into<Operand>,
        R: Into<Operand>,
    {
        Self::from_leaf(PredicateLeaf::Compare {
            left: left.into(),
            op,
            right: right.into(),
        })
    }

    /// `left = right`.
    #[must_use]
    pub fn equals<L: Into<Operand>, R: Into<Operand>>(left: L, right: R) -> Self {
        Self::compare(left, ComparisonOp::Equal, right)
    }

    /// `left != right`.
    #[must_use]
    pub fn not_equals<L: Into<Operand>, R: Into<Operand>>(left: L, right: R) -> Self {
        Self::compare(left, ComparisonOp::NotEqual, right)
    }

    /// `left < right`.
    #[must_use]
    pub fn less_than<L: Into<Operand>, R: Into<Operand>>(left: L, right: R) -> Self {
        Self::compare(left, ComparisonOp::LessThan, right)
    }

    /// `left <= right`.
    #[must_use]
    pub fn less_than_or_equal<L: Into<Operand>, R: Into<Operand>>(left: L, right: R) -> Self {
        Self::compare(left, ComparisonOp::LessThanOrEqual, right)
    }

    /// `left > right`.
    #[must_use]
    pub fn greater_than<L: Into<Operand>, R: Into<Operand>>(left: L, right: R) -> Self {
        Self::compare(left, ComparisonOp::GreaterThan, right)
    }

    /// `left >= right`.
    #[must_use]
    pub fn greater_than_or_equal<L: Into<Operand>, R: Into<Operand>>(left: L, right: R) -> Self {
        Self::compare(left, ComparisonOp::GreaterThanOrEqual, right)
    }

    /// Membership test against a literal list.
    #[must_use]
    pub fn in_list<O, I>(expr: O, list: I) -> Self
    where
        O: Into<Operand>,
        I: IntoIterator,
        I::Item: Into<ScalarValue>,
    {
        Self::from_leaf(PredicateLeaf::InList {
            expr: expr.into(),
            list: list.into_iter().map(Into::into).collect(),
            negated: false,
        })
    }

    /// Negated membership test against a literal list.
    #[must_use]
    pub fn not_in_list<O, I>(expr: O, list: I) -> Self
    where
        O: Into<Operand>,
        I: IntoIterator,
        I::Item: Into<ScalarValue>,
    {
        Self::from_leaf(PredicateLeaf::InList {
            expr: expr.into(),
            list: list.into_iter().map(Into::into).collect(),
            negated: true,
        })
    }

    /// `expr IS NULL`.
    #[must_use]
    pub fn is_null<O: Into<Operand>>(expr: O) -> Self {
        Self::from_leaf(PredicateLeaf::IsNull {
            expr: expr.into(),
            negated: false,
        })
    }

    /// `expr IS NOT NULL`.
    #[must_use]
    pub fn is_not_null<O: Into<Operand>>(expr: O) -> Self {
        Self::from_leaf(PredicateLeaf::IsNull {
            expr: expr.into(),
            negated: true,
        })
    }

    /// Substring match over a UTF-8 operand.
    #[must_use]
    pub fn contains<O, P>(expr: O, pattern: P) -> Self
    where
        O: Into<Operand>,
        P: Into<String>,
    {
        Self::from_leaf(PredicateLeaf::Contains {
            expr: expr.into(),
            pattern: pattern.into(),
        })
    }

    /// Logical negation without rewriting the child.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(predicate: Predicate) -> Self {
        Self::from_kind(PredicateNode::Inner(PredicateInner::Not(Box::new(
            predicate,
        ))))
    }

    /// Conjunction of `self` and `other`. Nested conjunctions are flattened.
    #[must_use]
    pub fn and(self, other: Predicate) -> Self {
        let mut clauses = Vec::with_capacity(2);
        for clause in [self, other] {
            match clause.kind {
                PredicateNode::Inner(PredicateInner::And(nested)) => clauses.extend(nested),
                kind => clauses.push(Self::from_kind(kind)),
            }
        }
        Self::from_kind(PredicateNode::Inner(PredicateInner::And(clauses)))
    }

    /// Disjunction of `self` and `other`. Nested disjunctions are flattened.
    #[must_use]
    pub fn or(self, other: Predicate) -> Self {
        let mut clauses = Vec::with_capacity(2);
        for clause in [self, other] {
            match clause.kind {
                PredicateNode::Inner(PredicateInner::Or(nested)) => clauses.extend(nested),
                kind => clauses.push(Self::from_kind(kind)),
            }
        }
        Self::from_kind(PredicateNode::Inner(PredicateInner::Or(clauses)))
    }

    /// Names of every column this predicate reads, in sorted order.
    #[must_use]
    pub fn required_columns(&self) -> BTreeSet<Arc<str>> {
        let mut collector = ColumnCollector::new();
        match self.accept(&mut collector) {
            Ok(()) => collector.into_columns(),
            Err(never) => match never {},
        }
    }

    /// Accepts a visitor that walks the predicate tree bottom-up.
    pub fn accept<V>(&self, visitor: &mut V) -> Result<V::Value, V::Error>
    where
        V: PredicateVisitor + ?Sized,
    {
        visitor.visit_predicate(self)
    }

    fn from_kind(kind: PredicateNode) -> Self {
        Self { kind }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PredicateNode::Leaf(leaf) => fmt::Display::fmt(leaf, f),
            PredicateNode::Inner(PredicateInner::Not(inner)) => write!(f, "NOT ({inner})"),
            PredicateNode::Inner(PredicateInner::And(clauses)) => write_joined(f, clauses, "AND"),
            PredicateNode::Inner(PredicateInner::Or(clauses)) => write_joined(f, clauses, "OR"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, clauses: &[Predicate], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (idx, clause) in clauses.iter().enumerate() {
        if idx > 0 {
            write!(f, " {sep} ")?;
        }
        write!(f, "{clause}")?;
    }
    f.write_str(")")
}

/// Categorises a predicate node as leaf or branch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PredicateNode {
    /// Leaf predicates without child expressions.
    Leaf(PredicateLeaf),
    /// Branch predicates with one or more child predicates.
    Inner(PredicateInner),
}

/// Leaf predicates encode terminal expressions with no child nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PredicateLeaf {
    /// Binary comparison.
    Compare {
        /// Left operand.
        left: Operand,
        /// Operator.
        op: ComparisonOp,
        /// Right operand.
        right: Operand,
    },
    /// Membership test against a literal list.
    InList {
        /// Value to test.
        expr: Operand,
        /// Literal candidates.
        list: Vec<ScalarValue>,
        /// True when representing `NOT IN`.
        negated: bool,
    },
    /// Null check (`IS NULL` / `IS NOT NULL`).
    IsNull {
        /// Operand under inspection.
        expr: Operand,
        /// True when representing `IS NOT NULL`.
        negated: bool,
    },
    /// Substring match over UTF-8 values.
    Contains {
        /// Operand under inspection.
        expr: Operand,
        /// Literal substring to look for.
        pattern: String,
    },
}

impl fmt::Display for PredicateLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateLeaf::Compare { left, op, right } => {
                write!(f, "{} {op} {}", DisplayOperand(left), DisplayOperand(right))
            }
            PredicateLeaf::InList {
                expr,
                list,
                negated,
            } => {
                write!(f, "{}", DisplayOperand(expr))?;
                f.write_str(if *negated { " NOT IN (" } else { " IN (" })?;
                for (idx, value) in list.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", DisplayScalar(value))?;
                }
                f.write_str(")")
            }
            PredicateLeaf::IsNull { expr, negated } => {
                let suffix = if *negated { "IS NOT NULL" } else { "IS NULL" };
                write!(f, "{} {suffix}", DisplayOperand(expr))
            }
            PredicateLeaf::Contains { expr, pattern } => {
                write!(f, "{} CONTAINS {pattern:?}", DisplayOperand(expr))
            }
        }
    }
}

struct DisplayOperand<'a>(&'a Operand);

impl fmt::Display for DisplayOperand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Operand::Column(column) => write!(f, "{column}"),
            Operand::Literal(value) => write!(f, "{}", DisplayScalar(value)),
        }
    }
}

struct DisplayScalar<'a>(&'a ScalarValue);

impl fmt::Display for DisplayScalar<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            ScalarValue::Null => f.write_str("NULL"),
            ScalarValue::Boolean(v) => write!(f, "{v}"),
            ScalarValue::Int64(v) => write!(f, "{v}"),
            ScalarValue::UInt64(v) => write!(f, "{v}"),
            ScalarValue::Float64(v) => write!(f, "{v}"),
            ScalarValue::Utf8(v) => write!(f, "{v:?}"),
            ScalarValue::Binary(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// Branch predicates contain one or more child predicates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PredicateInner {
    /// Logical negation.
    Not(Box<Predicate>),
    /// Conjunction over multiple predicates.
    And(Vec<Predicate>),
    /// Disjunction over multiple predicates.
    Or(Vec<Predicate>),
}
