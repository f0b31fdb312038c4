#![deny(missing_docs)]
//! Predicate facade crate for the filter hopper.
//!
//! Predicates are plain, serializable expression trees over named columns.
//! They carry no evaluation logic of their own: an engine walks them through
//! [`PredicateVisitor`] and the hopper only asks them which columns they read.

mod core;

pub use core::{
    col, ColumnCollector, ColumnRef, ComparisonOp, Operand, Predicate, PredicateInner,
    PredicateLeaf, PredicateNode, PredicateVisitor, ScalarValue,
};
