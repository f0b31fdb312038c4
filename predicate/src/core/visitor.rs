use std::{collections::BTreeSet, convert::Infallible, sync::Arc};

use super::{Operand, Predicate, PredicateInner, PredicateLeaf, PredicateNode};

/// Visitor that walks predicate trees bottom-up and folds them into a value.
///
/// `And`/`Or` groups may be empty when decoded from external input;
/// implementations decide what an empty group means.
pub trait PredicateVisitor {
    /// Error type used when evaluation fails.
    type Error;
    /// Concrete value type produced while walking the predicate.
    type Value;

    /// Evaluates a leaf predicate and returns its result.
    fn visit_leaf(&mut self, leaf: &PredicateLeaf) -> Result<Self::Value, Self::Error>;

    /// Combines the result of a negated child predicate.
    fn combine_not(&mut self, child: Self::Value) -> Result<Self::Value, Self::Error>;

    /// Combines an `AND` clause from the supplied child results.
    fn combine_and(&mut self, children: Vec<Self::Value>) -> Result<Self::Value, Self::Error>;

    /// Combines an `OR` clause from the supplied child results.
    fn combine_or(&mut self, children: Vec<Self::Value>) -> Result<Self::Value, Self::Error>;

    /// Visits the supplied predicate by walking the expression tree.
    fn visit_predicate(&mut self, predicate: &Predicate) -> Result<Self::Value, Self::Error> {
        match predicate.kind() {
            PredicateNode::Leaf(leaf) => self.visit_leaf(leaf),
            PredicateNode::Inner(PredicateInner::Not(inner)) => {
                let child = self.visit_predicate(inner)?;
                self.combine_not(child)
            }
            PredicateNode::Inner(PredicateInner::And(clauses)) => {
                let mut children = Vec::with_capacity(clauses.len());
                for clause in clauses {
                    children.push(self.visit_predicate(clause)?);
                }
                self.combine_and(children)
            }
            PredicateNode::Inner(PredicateInner::Or(clauses)) => {
                let mut children = Vec::with_capacity(clauses.len());
                for clause in clauses {
                    children.push(self.visit_predicate(clause)?);
                }
                self.combine_or(children)
            }
        }
    }
}

/// Collects every column name referenced anywhere in a predicate tree.
#[derive(Debug, Default)]
pub struct ColumnCollector {
    columns: BTreeSet<Arc<str>>,
}

impl ColumnCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the collector and returns the gathered names.
    #[must_use]
    pub fn into_columns(self) -> BTreeSet<Arc<str>> {
        self.columns
    }

    fn note(&mut self, operand: &Operand) {
        if let Some(column) = operand.as_column() {
            self.columns.insert(Arc::clone(&column.name));
        }
    }
}

impl PredicateVisitor for ColumnCollector {
    type Error = Infallible;
    type Value = ();

    fn visit_leaf(&mut self, leaf: &PredicateLeaf) -> Result<(), Infallible> {
        match leaf {
            PredicateLeaf::Compare { left, right, .. } => {
                self.note(left);
                self.note(right);
            }
            PredicateLeaf::InList { expr, .. }
            | PredicateLeaf::IsNull { expr, .. }
            | PredicateLeaf::Contains { expr, .. } => self.note(expr),
        }
        Ok(())
    }

    fn combine_not(&mut self, _child: ()) -> Result<(), Infallible> {
        Ok(())
    }

    fn combine_and(&mut self, _children: Vec<()>) -> Result<(), Infallible> {
        Ok(())
    }

    fn combine_or(&mut self, _children: Vec<()>) -> Result<(), Infallible> {
        Ok(())
    }
}
