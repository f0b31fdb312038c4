//! Hopper configuration.

use crate::eval::EvalOptions;

/// Default number of derived-column passes run by one apply call.
pub const DEFAULT_CASCADE_LIMIT: usize = 16;

/// Configuration carried by a [`Hopper`](crate::hopper::Hopper) handle.
///
/// The defaults match what most pipelines want: strict literal casts and
/// enough derived-column passes to resolve any realistic dependency chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HopperConfig {
    pub(crate) eval: EvalOptions,
    pub(crate) cascade_limit: usize,
}

impl Default for HopperConfig {
    fn default() -> Self {
        Self {
            eval: EvalOptions::default(),
            cascade_limit: DEFAULT_CASCADE_LIMIT,
        }
    }
}

impl HopperConfig {
    /// Override the evaluation options used when a predicate fires.
    #[must_use]
    pub fn with_eval(mut self, eval: EvalOptions) -> Self {
        self.eval = eval;
        self
    }

    /// Bound the number of derived-column passes per apply call.
    ///
    /// A limit of zero is treated as one pass.
    #[must_use]
    pub fn with_cascade_limit(mut self, limit: usize) -> Self {
        self.cascade_limit = limit.max(1);
        self
    }

    /// Evaluation options in effect.
    #[must_use]
    pub fn eval(&self) -> &EvalOptions {
        &self.eval
    }

    /// Maximum derived-column passes per apply call.
    #[must_use]
    pub fn cascade_limit(&self) -> usize {
        self.cascade_limit
    }
}
