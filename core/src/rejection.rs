//! Rejection marker and computation outcomes.
//!
//! A computation reports failure in one of two ways:
//!
//! - **Deliberate rejection**: the computation decides the request failed
//!   for a domain reason and hands back a typed value. It builds a
//!   [`RejectWithValue`] marker (usually through `ThunkApi::reject_with_value`)
//!   and returns it as the error.
//! - **Thrown failure**: anything else that went wrong, carried as an
//!   [`anyhow::Error`]. The `?` operator converts into it.
//!
//! The orchestrator resolves every computation into an [`Outcome`], the
//! single tagged union used to classify what happened.
//!
//! # Example
//!
//! ```
//! use composable_lifecycle_core::rejection::{Failure, RejectWithValue};
//!
//! fn validate(quantity: u32) -> Result<u32, Failure<String>> {
//!     if quantity == 0 {
//!         return Err(RejectWithValue::new("quantity must be positive".to_string()).into());
//!     }
//!     let doubled = quantity
//!         .checked_mul(2)
//!         .ok_or_else(|| anyhow::anyhow!("overflow"))?;
//!     Ok(doubled)
//! }
//!
//! assert!(matches!(validate(0), Err(Failure::Rejected(_))));
//! assert!(matches!(validate(u32::MAX), Err(Failure::Thrown(_))));
//! assert_eq!(validate(2).ok(), Some(4));
//! ```

use std::fmt;
use std::sync::Arc;

/// Marker for a deliberate, domain-level rejection.
///
/// Wraps a caller-chosen payload. Distinct from thrown errors by type, so the
/// orchestrator never has to inspect the payload to classify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectWithValue<V> {
    /// The rejection payload handed back to the caller
    pub payload: V,
}

impl<V> RejectWithValue<V> {
    /// Wrap `payload` as a deliberate rejection.
    #[must_use]
    pub const fn new(payload: V) -> Self {
        Self { payload }
    }

    /// Unwrap the payload
    pub fn into_payload(self) -> V {
        self.payload
    }
}

/// The error side of a computation's result.
#[derive(Debug)]
pub enum Failure<V> {
    /// The computation rejected deliberately with a typed value
    Rejected(V),

    /// The computation failed with an error it did not handle
    Thrown(anyhow::Error),
}

impl<V> Failure<V> {
    /// Build a thrown failure from an arbitrary JSON value.
    ///
    /// The value is preserved for the default normalizer, which applies the
    /// field whitelist to it.
    #[must_use]
    pub fn thrown_value(value: serde_json::Value) -> Self {
        Self::Thrown(anyhow::Error::msg(value))
    }
}

impl<V> From<RejectWithValue<V>> for Failure<V> {
    fn from(marker: RejectWithValue<V>) -> Self {
        Self::Rejected(marker.payload)
    }
}

impl<V> From<anyhow::Error> for Failure<V> {
    fn from(error: anyhow::Error) -> Self {
        Self::Thrown(error)
    }
}

/// The original failure of a thrown outcome.
///
/// `anyhow::Error` is not `Clone`; events are. This shares one error between
/// every clone of the event that carries it.
#[derive(Clone)]
pub struct OriginalError(Arc<anyhow::Error>);

impl OriginalError {
    /// Wrap a thrown error
    #[must_use]
    pub fn new(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }

    /// Borrow the underlying error
    #[must_use]
    pub fn error(&self) -> &anyhow::Error {
        &self.0
    }

    /// Attempt to downcast the original failure to a concrete type.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for OriginalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for OriginalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl From<anyhow::Error> for OriginalError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(error)
    }
}

/// How a computation settled.
#[derive(Debug, Clone)]
pub enum Outcome<R, V> {
    /// Completed with a plain value
    Success(R),

    /// Rejected deliberately with a typed value
    Rejected(V),

    /// Failed with an unhandled error
    Thrown(OriginalError),
}

impl<R, V> Outcome<R, V> {
    /// Whether the computation completed successfully
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl<R, V> From<Result<R, Failure<V>>> for Outcome<R, V> {
    fn from(result: Result<R, Failure<V>>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(Failure::Rejected(payload)) => Self::Rejected(payload),
            Err(Failure::Thrown(error)) => Self::Thrown(OriginalError::new(error)),
        }
    }
}
