//! Logging infrastructure for the hopper.
//!
//! Events are emitted through `tracing` with target `filter_hopper` and an
//! `event` field for filtering. The crate never installs a subscriber;
//! applications configure one via `tracing_subscriber` or similar.
//!
//! ## Conventions
//!
//! - `event`: snake_case event name (required)
//! - `component`: subsystem (`hopper`, `codec`, `frame`)
//! - Use `%` for Display, `?` for Debug formatting

/// Target for all hopper log events.
pub(crate) const HOPPER_TARGET: &str = "filter_hopper";

/// Macro for info-level log events.
///
/// # Example
/// ```ignore
/// log_info!(
///     component = "hopper",
///     event = "hopper_filters_replaced",
///     count = filters.len(),
/// );
/// ```
macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::HOPPER_TARGET, $($field)*)
    };
}

/// Macro for debug-level log events.
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::HOPPER_TARGET, $($field)*)
    };
}

/// Macro for warn-level log events.
macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::HOPPER_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_info;
pub(crate) use log_warn;
