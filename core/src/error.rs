//! Error types for the fixpoint loop
//!
//! Sequencing itself cannot fail. The only failure a fixpoint call can
//! report is the optional iteration guard tripping, see
//! [`FetchConfig::max_iterations`](crate::config::FetchConfig::max_iterations).

use thiserror::Error;

/// Errors reported by [`FetchReducer::try_reduce`](crate::fetch::FetchReducer::try_reduce)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FixpointError {
    /// Derive still proposed actions after the configured number of batches
    ///
    /// State reflects every batch drained before the guard tripped. The
    /// `pending` actions from the last derive call were not applied.
    #[error("Fixpoint not reached within {max_iterations} iterations ({pending} actions still pending)")]
    NotSettled {
        /// The configured limit
        max_iterations: usize,
        /// Number of actions derive proposed on the final query
        pending: usize,
    },
}

/// A fixpoint call cut short by the iteration guard
///
/// `output` holds everything produced by the actions that were applied
/// before the guard tripped. Those actions are already reflected in state,
/// so the host must still execute their effects.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct Interrupted<T> {
    /// Effects (and extras, for the side-channel form) of the applied actions
    pub output: T,
    /// Why the loop stopped
    pub error: FixpointError,
}

impl<T> Interrupted<T> {
    /// Split into the accumulated output and the error
    #[must_use]
    pub fn into_parts(self) -> (T, FixpointError) {
        (self.output, self.error)
    }
}
