//! The filter hopper: a queue of pending predicates attached to a frame.
//!
//! Predicates fire opportunistically. On every apply call each queued
//! predicate is checked, in insertion order, against the columns of the frame
//! produced so far. Ready predicates are applied and dropped from the queue;
//! the rest stay queued untouched. A not-ready predicate never blocks later
//! ready ones.
//!
//! Readiness is decided by comparing required columns against the schema up
//! front, never by attempting the filter and interpreting a failure. A ready
//! predicate that still fails in the engine aborts the whole call with
//! [`HopperError::Apply`]. The failing entry is dropped from its queue so it
//! is never retried; everything else stays queued exactly as before the
//! call, including entries that fired earlier in it.
//!
//! After a successful call the surviving queue is written to the input frame
//! and, when a new frame was produced, to that frame as well. The derived
//! frame's copied metadata holds the pre-apply queue, so it is overwritten
//! explicitly.

use std::{collections::BTreeSet, sync::Arc};

use hopper_predicate::Predicate;

use crate::{
    codec::{self, FilterFormat, SerializedFilter},
    config::HopperConfig,
    error::{EncodingError, EvalError, HopperError},
    eval::{self, EvalOptions},
    frame::Frame,
    metadata::{DerivedColumn, HopperState},
    observability::{log_debug, log_info, log_warn},
};

/// Handle for managing the pending queues of one frame.
///
/// Obtained through [`Frame::hopper`]; attaching initialises an empty state
/// the first time and is a no-op afterwards.
#[derive(Debug)]
pub struct Hopper<'a> {
    frame: &'a mut Frame,
    config: HopperConfig,
}

/// Outcome of one pass over a queue, not yet written anywhere.
struct Pass<T> {
    produced: Option<Frame>,
    pending: Vec<T>,
}

/// Queue entry that failed in the engine, by position in its queue.
struct Failed {
    index: usize,
    error: HopperError,
}

impl<'a> Hopper<'a> {
    pub(crate) fn attach(frame: &'a mut Frame, config: HopperConfig) -> Self {
        if frame.metadata().hopper().is_none() {
            frame.metadata_mut().set_hopper(HopperState::default());
            log_debug!(
                component = "hopper",
                event = "hopper_attached",
                frame = %frame.id(),
            );
        }
        Self { frame, config }
    }

    /// Frame this hopper is attached to.
    #[must_use]
    pub fn frame(&self) -> &Frame {
        self.frame
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &HopperConfig {
        &self.config
    }

    /// Append `predicate` to the pending queue. No validation happens here.
    pub fn add_filter(&mut self, predicate: Predicate) {
        log_debug!(
            component = "hopper",
            event = "hopper_filter_added",
            frame = %self.frame.id(),
            predicate = %predicate,
        );
        self.state_mut().filters.push(predicate);
    }

    /// Append several predicates, keeping their order.
    pub fn add_filters<I>(&mut self, predicates: I)
    where
        I: IntoIterator<Item = Predicate>,
    {
        for predicate in predicates {
            self.add_filter(predicate);
        }
    }

    /// Pending filters in insertion order.
    #[must_use]
    pub fn list_filters(&self) -> &[Predicate] {
        self.frame
            .metadata()
            .hopper()
            .map(HopperState::filters)
            .unwrap_or_default()
    }

    /// Drop every pending filter.
    pub fn clear_filters(&mut self) {
        self.state_mut().filters.clear();
    }

    /// Queue a boolean column `name` computed from `predicate` once its inputs exist.
    pub fn add_column(&mut self, name: impl Into<String>, predicate: Predicate) {
        let derived = DerivedColumn::new(name, predicate);
        log_debug!(
            component = "hopper",
            event = "hopper_column_added",
            frame = %self.frame.id(),
            column = derived.name(),
            predicate = %derived.predicate(),
        );
        self.state_mut().columns.push(derived);
    }

    /// Pending derived columns in insertion order.
    #[must_use]
    pub fn list_columns(&self) -> &[DerivedColumn] {
        self.frame
            .metadata()
            .hopper()
            .map(HopperState::columns)
            .unwrap_or_default()
    }

    /// Apply every filter whose columns are present, returning the resulting frame.
    ///
    /// When nothing fires the returned frame is a clone of the input and
    /// shares its identity.
    pub fn apply_ready_filters(&mut self) -> Result<Frame, HopperError> {
        let pass = run_filters(&*self.frame, self.list_filters(), self.config.eval())
            .map_err(|failed| self.drop_failed_filter(failed))?;
        Ok(self.commit(pass.produced, Some(pass.pending), None))
    }

    /// Materialise every derived column whose inputs are present.
    ///
    /// Passes repeat until one makes no progress or the configured cascade
    /// limit is hit, so a derivation that depends on another resolves in the
    /// same call regardless of insertion order.
    pub fn apply_ready_columns(&mut self) -> Result<Frame, HopperError> {
        let pass = run_columns(
            &*self.frame,
            self.list_columns(),
            self.config.eval(),
            self.config.cascade_limit(),
        )
        .map_err(|failed| self.drop_failed_column(failed))?;
        Ok(self.commit(pass.produced, None, Some(pass.pending)))
    }

    /// Derived columns first, then filters against the widened frame.
    ///
    /// Both queues are committed together. A failure in either step drops
    /// only the failing entry and commits nothing else.
    pub fn apply_ready(&mut self) -> Result<Frame, HopperError> {
        let columns = run_columns(
            &*self.frame,
            self.list_columns(),
            self.config.eval(),
            self.config.cascade_limit(),
        )
        .map_err(|failed| self.drop_failed_column(failed))?;
        let base = columns.produced.as_ref().unwrap_or(&*self.frame);
        let filters = run_filters(base, self.list_filters(), self.config.eval())
            .map_err(|failed| self.drop_failed_filter(failed))?;
        let produced = filters.produced.or(columns.produced);
        Ok(self.commit(produced, Some(filters.pending), Some(columns.pending)))
    }

    /// Encode every pending filter in `format`, in queue order.
    pub fn serialize_filters(
        &self,
        format: FilterFormat,
    ) -> Result<Vec<SerializedFilter>, EncodingError> {
        codec::encode_all(self.list_filters(), format)
    }

    /// Replace the pending queue with the decoded `items`.
    ///
    /// Every item is decoded before anything is written; on failure the
    /// current queue is left untouched.
    pub fn deserialize_filters(
        &mut self,
        items: &[SerializedFilter],
        format: FilterFormat,
    ) -> Result<(), HopperError> {
        let filters = codec::decode_all(items, format).map_err(|err| {
            log_warn!(
                component = "codec",
                event = "hopper_filters_decode_failed",
                frame = %self.frame.id(),
                format = %format,
                error = %err,
            );
            err
        })?;
        log_info!(
            component = "codec",
            event = "hopper_filters_replaced",
            frame = %self.frame.id(),
            format = %format,
            count = filters.len(),
        );
        self.state_mut().filters = filters;
        Ok(())
    }

    fn drop_failed_filter(&mut self, failed: Failed) -> HopperError {
        let frame = self.frame.id();
        let filters = &mut self.state_mut().filters;
        if failed.index < filters.len() {
            let dropped = filters.remove(failed.index);
            log_warn!(
                component = "hopper",
                event = "hopper_filter_dropped",
                frame = %frame,
                predicate = %dropped,
                pending = filters.len(),
            );
        }
        failed.error
    }

    fn drop_failed_column(&mut self, failed: Failed) -> HopperError {
        let frame = self.frame.id();
        let columns = &mut self.state_mut().columns;
        if failed.index < columns.len() {
            let dropped = columns.remove(failed.index);
            log_warn!(
                component = "hopper",
                event = "hopper_column_dropped",
                frame = %frame,
                column = dropped.name(),
                pending = columns.len(),
            );
        }
        failed.error
    }

    fn state_mut(&mut self) -> &mut HopperState {
        self.frame.metadata_mut().hopper_or_default()
    }

    /// Write surviving queues to the input frame and, if one was produced,
    /// to the new frame. Returns the frame the caller should continue with.
    fn commit(
        &mut self,
        produced: Option<Frame>,
        filters: Option<Vec<Predicate>>,
        columns: Option<Vec<DerivedColumn>>,
    ) -> Frame {
        let state = self.state_mut();
        if let Some(filters) = &filters {
            state.filters.clone_from(filters);
        }
        if let Some(columns) = &columns {
            state.columns.clone_from(columns);
        }
        let state = state.clone();
        log_debug!(
            component = "hopper",
            event = "hopper_apply_completed",
            frame = %self.frame.id(),
            produced = produced.is_some(),
            pending_filters = state.filters.len(),
            pending_columns = state.columns.len(),
        );
        match produced {
            Some(mut frame) => {
                frame.metadata_mut().set_hopper(state);
                frame
            }
            None => self.frame.clone(),
        }
    }
}

/// Columns `required` that `frame` does not have yet.
fn missing_columns<'c>(frame: &Frame, required: &'c BTreeSet<Arc<str>>) -> Vec<&'c str> {
    required
        .iter()
        .map(|name| &**name)
        .filter(|name| !frame.has_column(name))
        .collect()
}

fn run_filters(
    base: &Frame,
    pending: &[Predicate],
    options: &EvalOptions,
) -> Result<Pass<Predicate>, Failed> {
    let mut current: Option<Frame> = None;
    let mut still_pending = Vec::new();
    for (index, predicate) in pending.iter().enumerate() {
        let target = current.as_ref().unwrap_or(base);
        let required = predicate.required_columns();
        let missing = missing_columns(target, &required);
        if !missing.is_empty() {
            log_debug!(
                component = "hopper",
                event = "hopper_filter_pending",
                frame = %base.id(),
                predicate = %predicate,
                missing = ?missing,
            );
            still_pending.push(predicate.clone());
            continue;
        }
        let rows_before = target.num_rows();
        let next = target
            .filter_with(predicate, options)
            .map_err(|source| Failed {
                index,
                error: apply_failure(base, predicate, source),
            })?;
        log_debug!(
            component = "hopper",
            event = "hopper_filter_applied",
            frame = %base.id(),
            predicate = %predicate,
            rows_before,
            rows_after = next.num_rows(),
        );
        current = Some(next);
    }
    Ok(Pass {
        produced: current,
        pending: still_pending,
    })
}

fn run_columns(
    base: &Frame,
    pending: &[DerivedColumn],
    options: &EvalOptions,
    cascade_limit: usize,
) -> Result<Pass<DerivedColumn>, Failed> {
    let mut current: Option<Frame> = None;
    // Entries keep their position in `pending` so a failure can be attributed.
    let mut queue: Vec<(usize, DerivedColumn)> = pending.iter().cloned().enumerate().collect();
    for _ in 0..cascade_limit.max(1) {
        let mut progressed = false;
        let mut still_pending = Vec::with_capacity(queue.len());
        for (index, derived) in queue {
            let target = current.as_ref().unwrap_or(base);
            let required = derived.predicate().required_columns();
            if !missing_columns(target, &required).is_empty() {
                still_pending.push((index, derived));
                continue;
            }
            let mask = eval::evaluate(derived.predicate(), target.batch(), options).map_err(
                |source| Failed {
                    index,
                    error: apply_failure(base, derived.predicate(), source),
                },
            )?;
            let next = target
                .with_column(derived.name(), Arc::new(mask))
                .map_err(|source| Failed {
                    index,
                    error: source.into(),
                })?;
            log_debug!(
                component = "hopper",
                event = "hopper_column_applied",
                frame = %base.id(),
                column = derived.name(),
                predicate = %derived.predicate(),
            );
            current = Some(next);
            progressed = true;
        }
        queue = still_pending;
        if !progressed || queue.is_empty() {
            break;
        }
    }
    Ok(Pass {
        produced: current,
        pending: queue.into_iter().map(|(_, derived)| derived).collect(),
    })
}

fn apply_failure(base: &Frame, predicate: &Predicate, source: EvalError) -> HopperError {
    log_warn!(
        component = "hopper",
        event = "hopper_apply_failed",
        frame = %base.id(),
        predicate = %predicate,
        error = %source,
    );
    HopperError::Apply {
        predicate: predicate.to_string(),
        source,
    }
}
