#![deny(missing_docs)]
//! Deferred row filters for Arrow-backed frames.
//!
//! A [`Frame`] wraps an Arrow `RecordBatch` together with a small metadata
//! store. Attaching a [`Hopper`] to a frame gives it a queue of pending
//! [`Predicate`]s. Each apply call fires every queued predicate whose columns
//! are present and leaves the rest queued, so a pipeline can register its row
//! restrictions up front and have them take effect as soon as the data that
//! drives them has been joined in.
//!
//! ```
//! use std::sync::Arc;
//!
//! use arrow::array::{ArrayRef, Int64Array};
//! use filter_hopper::{col, Frame, Predicate};
//!
//! let mut users = Frame::from_columns([(
//!     "user_id",
//!     Arc::new(Int64Array::from(vec![0, 1, 2])) as ArrayRef,
//! )])?;
//! let mut hopper = users.hopper();
//! hopper.add_filter(Predicate::greater_than(col("age"), 18));
//! let users = hopper.apply_ready_filters()?;
//! assert_eq!(users.shape(), (3, 1));
//!
//! let mut users =
//!     users.with_column("age", Arc::new(Int64Array::from(vec![25, 15, 30])))?;
//! let adults = users.hopper().apply_ready_filters()?;
//! assert_eq!(adults.shape(), (2, 2));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod observability;

/// Binary and JSON transport for pending filters.
pub mod codec;
/// Hopper tunables.
pub mod config;
/// Error types.
pub mod error;
/// Vectorised predicate evaluation over record batches.
pub mod eval;
/// Frames: record batches with identity and metadata.
pub mod frame;
/// The pending-filter queue and its apply semantics.
pub mod hopper;
/// Frame metadata and the typed hopper slot.
pub mod metadata;

pub use hopper_predicate as predicate;
pub use hopper_predicate::{col, ColumnRef, ComparisonOp, Predicate, ScalarValue};

pub use crate::{
    codec::{FilterFormat, SerializedFilter},
    config::HopperConfig,
    error::{EncodingError, EvalError, FrameError, HopperError},
    eval::EvalOptions,
    frame::{Frame, FrameId},
    hopper::Hopper,
    metadata::{DerivedColumn, HopperState, Metadata},
};
