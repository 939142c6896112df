//! Lifecycle events emitted for every invocation.
//!
//! An invocation emits at most two events: a `Pending` event when it starts
//! running, then exactly one terminal event, `Fulfilled` or `Rejected`. A
//! condition-skipped invocation emits only the terminal `Rejected` event.
//!
//! Every event carries the `request_id` and `arg` of the invocation that
//! produced it, so consumers can correlate a terminal event with its start.
//!
//! # Event Types
//!
//! Event type strings are built from the family's type prefix and the
//! request status:
//!
//! - `"users/fetch/pending"`
//! - `"users/fetch/fulfilled"`
//! - `"users/fetch/rejected"`

use crate::rejection::OriginalError;
use crate::serialized_error::SerializedError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Lifecycle phase of a request, also the suffix of its event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// The invocation started running
    Pending,

    /// The invocation completed with a value
    Fulfilled,

    /// The invocation failed, was rejected, aborted, or skipped
    Rejected,
}

impl RequestStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [Self; 3] = [Self::Pending, Self::Fulfilled, Self::Rejected];

    /// The event type suffix for this status
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fulfilled => "fulfilled",
            Self::Rejected => "rejected",
        }
    }

    /// Parse a status from its suffix
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.suffix() == suffix)
    }

    /// Split an event type string into its type prefix and status.
    ///
    /// ```
    /// use composable_lifecycle_core::event::RequestStatus;
    ///
    /// assert_eq!(
    ///     RequestStatus::split_event_type("users/fetch/fulfilled"),
    ///     Some(("users/fetch", RequestStatus::Fulfilled))
    /// );
    /// assert_eq!(RequestStatus::split_event_type("users/fetch"), None);
    /// ```
    #[must_use]
    pub fn split_event_type(event_type: &str) -> Option<(&str, Self)> {
        let (prefix, suffix) = event_type.rsplit_once('/')?;
        Self::from_suffix(suffix).map(|status| (prefix, status))
    }

    /// Whether this status ends the lifecycle
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Metadata shared by every lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta<A> {
    /// The argument the invocation was called with
    pub arg: A,

    /// Correlation identity of the invocation
    pub request_id: String,

    /// The phase this event reports
    pub request_status: RequestStatus,
}

/// Metadata of a rejected event.
///
/// The flags tell the four failure kinds apart:
///
/// | kind                  | `rejected_with_value` | `aborted` | `condition` |
/// |-----------------------|-----------------------|-----------|-------------|
/// | gate skip             | false                 | false     | true        |
/// | cancellation          | false                 | true      | false       |
/// | deliberate rejection  | true                  | false     | false       |
/// | uncaught failure      | false                 | false     | false       |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedMeta<A> {
    /// Shared metadata
    #[serde(flatten)]
    pub base: EventMeta<A>,

    /// The computation rejected deliberately with a payload
    pub rejected_with_value: bool,

    /// The invocation was aborted after it started
    pub aborted: bool,

    /// The gate skipped the invocation before it started
    pub condition: bool,
}

/// Everything a rejected event reports about the failure.
#[derive(Debug, Clone)]
pub struct RejectionDetails<V> {
    /// Rejection payload, present only for deliberate rejections
    pub payload: Option<V>,

    /// Serialized form of the failure
    pub error: SerializedError,

    /// Original failure, absent for gate skips and deliberate rejections
    pub cause: Option<OriginalError>,

    /// See [`RejectedMeta::rejected_with_value`]
    pub rejected_with_value: bool,

    /// See [`RejectedMeta::aborted`]
    pub aborted: bool,

    /// See [`RejectedMeta::condition`]
    pub condition: bool,
}

impl<V> RejectionDetails<V> {
    /// A deliberate rejection carrying `payload`.
    ///
    /// `error` is the normalized fallback literal.
    #[must_use]
    pub const fn with_value(payload: V, error: SerializedError) -> Self {
        Self {
            payload: Some(payload),
            error,
            cause: None,
            rejected_with_value: true,
            aborted: false,
            condition: false,
        }
    }

    /// An uncaught failure, or the synthetic abort failure when `aborted`.
    #[must_use]
    pub const fn thrown(cause: OriginalError, error: SerializedError, aborted: bool) -> Self {
        Self {
            payload: None,
            error,
            cause: Some(cause),
            rejected_with_value: false,
            aborted,
            condition: false,
        }
    }

    /// A gate skip.
    ///
    /// `error` is the normalized [`SerializedError::condition_skipped`].
    #[must_use]
    pub const fn condition_skipped(error: SerializedError) -> Self {
        Self {
            payload: None,
            error,
            cause: None,
            rejected_with_value: false,
            aborted: false,
            condition: true,
        }
    }
}

/// A tagged lifecycle event.
///
/// # Type Parameters
///
/// - `A`: The invocation argument
/// - `R`: The success value
/// - `V`: The deliberate rejection payload
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LifecycleEvent<A, R, V> {
    /// The invocation passed its gate and started running
    Pending {
        /// Type prefix of the family that built this event
        type_prefix: Arc<str>,
        /// Event metadata
        meta: EventMeta<A>,
    },

    /// The computation completed with a plain value
    Fulfilled {
        /// Type prefix of the family that built this event
        type_prefix: Arc<str>,
        /// The success value
        payload: R,
        /// Event metadata
        meta: EventMeta<A>,
    },

    /// The invocation failed: gate skip, cancellation, deliberate rejection,
    /// or uncaught failure
    Rejected {
        /// Type prefix of the family that built this event
        type_prefix: Arc<str>,
        /// The rejection payload, for deliberate rejections
        payload: Option<V>,
        /// Serialized form of the failure
        error: SerializedError,
        /// The original failure, never serialized
        #[serde(skip)]
        cause: Option<OriginalError>,
        /// Event metadata with failure flags
        meta: RejectedMeta<A>,
    },
}

impl<A, R, V> LifecycleEvent<A, R, V> {
    /// The type prefix shared by this event's family
    #[must_use]
    pub fn type_prefix(&self) -> &str {
        match self {
            Self::Pending { type_prefix, .. }
            | Self::Fulfilled { type_prefix, .. }
            | Self::Rejected { type_prefix, .. } => type_prefix,
        }
    }

    /// The full event type, e.g. `"users/fetch/pending"`
    #[must_use]
    pub fn event_type(&self) -> String {
        format!("{}/{}", self.type_prefix(), self.request_status().suffix())
    }

    /// The phase this event reports
    #[must_use]
    pub const fn request_status(&self) -> RequestStatus {
        match self {
            Self::Pending { .. } => RequestStatus::Pending,
            Self::Fulfilled { .. } => RequestStatus::Fulfilled,
            Self::Rejected { .. } => RequestStatus::Rejected,
        }
    }

    /// Shared metadata of this event
    #[must_use]
    pub const fn meta(&self) -> &EventMeta<A> {
        match self {
            Self::Pending { meta, .. } | Self::Fulfilled { meta, .. } => meta,
            Self::Rejected { meta, .. } => &meta.base,
        }
    }

    /// Correlation identity of the originating invocation
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.meta().request_id
    }

    /// Argument of the originating invocation
    #[must_use]
    pub const fn arg(&self) -> &A {
        &self.meta().arg
    }

    /// Whether this is a `Pending` event
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// Whether this is a `Fulfilled` event
    #[must_use]
    pub const fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled { .. })
    }

    /// Whether this is a `Rejected` event
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Failure flags, for rejected events
    #[must_use]
    pub const fn rejected_meta(&self) -> Option<&RejectedMeta<A>> {
        match self {
            Self::Rejected { meta, .. } => Some(meta),
            _ => None,
        }
    }

    /// Serialized failure, for rejected events
    #[must_use]
    pub const fn error(&self) -> Option<&SerializedError> {
        match self {
            Self::Rejected { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The original failure, for thrown and aborted rejections
    #[must_use]
    pub const fn cause(&self) -> Option<&OriginalError> {
        match self {
            Self::Rejected { cause, .. } => cause.as_ref(),
            _ => None,
        }
    }

    /// Whether this event rejected deliberately with a payload
    #[must_use]
    pub fn is_rejected_with_value(&self) -> bool {
        self.rejected_meta().is_some_and(|meta| meta.rejected_with_value)
    }

    /// Whether this event reports an abort
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.rejected_meta().is_some_and(|meta| meta.aborted)
    }

    /// Whether this event reports a gate skip
    #[must_use]
    pub fn is_condition_skipped(&self) -> bool {
        self.rejected_meta().is_some_and(|meta| meta.condition)
    }
}
