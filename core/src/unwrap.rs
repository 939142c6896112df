//! Result unwrapping for terminal lifecycle events.
//!
//! Gives callers a `Result`-shaped view of an invocation: the success value,
//! or the failure that ended it.

use crate::event::LifecycleEvent;
use crate::serialized_error::SerializedError;
use thiserror::Error;

/// Why a terminal event did not unwrap to a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnwrapError<V> {
    /// The computation rejected deliberately; carries the raw payload
    #[error("Rejected with value: {0:?}")]
    Rejected(V),

    /// The invocation failed, was aborted, or was skipped; carries the
    /// serialized failure
    #[error("{0}")]
    Failed(SerializedError),

    /// A start event was unwrapped; only terminal events carry an outcome
    #[error("Invocation has not settled")]
    NotSettled,
}

impl<V> UnwrapError<V> {
    /// The serialized failure, when there is one
    #[must_use]
    pub const fn serialized(&self) -> Option<&SerializedError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// The rejection payload, when there is one
    pub fn into_rejection(self) -> Option<V> {
        match self {
            Self::Rejected(payload) => Some(payload),
            _ => None,
        }
    }
}

/// Unwrap a terminal event into the success value or its failure.
///
/// - `Fulfilled` returns the payload.
/// - `Rejected` with a value returns [`UnwrapError::Rejected`] with the raw
///   payload, not the serialized error.
/// - Any other `Rejected` returns [`UnwrapError::Failed`] with the
///   serialized error. The original failure remains on the event.
///
/// # Errors
///
/// Returns an [`UnwrapError`] for every non-fulfilled event.
///
/// # Example
///
/// ```
/// use composable_lifecycle_core::event::LifecycleEvent;
/// use composable_lifecycle_core::family::EventFamily;
/// use composable_lifecycle_core::unwrap::unwrap_result;
///
/// let family = EventFamily::new("greet");
/// let event: LifecycleEvent<(), &str, ()> = family.succeeded("ok", "req-1", ());
/// assert_eq!(unwrap_result(event), Ok("ok"));
/// ```
pub fn unwrap_result<A, R, V>(event: LifecycleEvent<A, R, V>) -> Result<R, UnwrapError<V>> {
    match event {
        LifecycleEvent::Fulfilled { payload, .. } => Ok(payload),
        LifecycleEvent::Rejected {
            payload: Some(payload),
            meta,
            ..
        } if meta.rejected_with_value => Err(UnwrapError::Rejected(payload)),
        LifecycleEvent::Rejected { error, .. } => Err(UnwrapError::Failed(error)),
        LifecycleEvent::Pending { .. } => Err(UnwrapError::NotSettled),
    }
}
