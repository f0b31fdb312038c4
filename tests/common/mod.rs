//! Common test utilities for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Int64Array, StringArray};
use filter_hopper::{Frame, HopperState};

/// Build a frame from `(name, array)` pairs.
pub fn frame(columns: Vec<(&str, ArrayRef)>) -> Frame {
    Frame::from_columns(columns).expect("frame construction should succeed")
}

pub fn ints(values: &[i64]) -> ArrayRef {
    Arc::new(Int64Array::from(values.to_vec()))
}

pub fn strings(values: &[&str]) -> ArrayRef {
    Arc::new(StringArray::from(values.to_vec()))
}

/// The `user_id = [0, 1, 2]` frame used throughout the scenarios.
pub fn users() -> Frame {
    frame(vec![("user_id", ints(&[0, 1, 2]))])
}

/// Values of an Int64 column, panicking if it is absent or of another type.
pub fn int_column(frame: &Frame, name: &str) -> Vec<i64> {
    frame
        .column(name)
        .unwrap_or_else(|| panic!("column {name} missing"))
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap_or_else(|| panic!("column {name} is not Int64"))
        .values()
        .to_vec()
}

/// Values of a Boolean column; nulls read as `None`.
pub fn bool_column(frame: &Frame, name: &str) -> Vec<Option<bool>> {
    let array = frame
        .column(name)
        .unwrap_or_else(|| panic!("column {name} missing"))
        .as_any()
        .downcast_ref::<BooleanArray>()
        .unwrap_or_else(|| panic!("column {name} is not Boolean"));
    (0..array.len())
        .map(|i| (!array.is_null(i)).then(|| array.value(i)))
        .collect()
}

/// Hopper state of a frame, panicking when no hopper was ever attached.
pub fn state(frame: &Frame) -> &HopperState {
    frame
        .metadata()
        .hopper()
        .expect("frame should carry hopper state")
}
