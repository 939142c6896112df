//! Event family builder.
//!
//! A family ties three correlated event constructors to one type prefix.
//! Consumers such as reducers use the family's [`EventCreator`]s to recognize
//! lifecycle events without depending on the orchestrator.
//!
//! # Example
//!
//! ```
//! use composable_lifecycle_core::event::LifecycleEvent;
//! use composable_lifecycle_core::family::EventFamily;
//!
//! let family = EventFamily::new("users/fetch");
//! let started: LifecycleEvent<u32, String, ()> = family.started("req-1", 42);
//!
//! assert_eq!(family.pending().event_type(), "users/fetch/pending");
//! assert!(family.pending().matches(&started));
//! assert!(!family.fulfilled().matches(&started));
//! ```

use crate::event::{EventMeta, LifecycleEvent, RejectedMeta, RejectionDetails, RequestStatus};
use std::fmt;
use std::sync::Arc;

/// Builds the pending, fulfilled and rejected events of one type prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventFamily {
    type_prefix: Arc<str>,
}

impl EventFamily {
    /// Create a family for `type_prefix`
    #[must_use]
    pub fn new(type_prefix: impl Into<String>) -> Self {
        Self {
            type_prefix: Arc::from(type_prefix.into()),
        }
    }

    /// The shared type prefix
    #[must_use]
    pub fn type_prefix(&self) -> &str {
        &self.type_prefix
    }

    /// The creator for events with `status`
    #[must_use]
    pub fn creator(&self, status: RequestStatus) -> EventCreator {
        EventCreator {
            type_prefix: Arc::clone(&self.type_prefix),
            status,
        }
    }

    /// The creator of `pending` events
    #[must_use]
    pub fn pending(&self) -> EventCreator {
        self.creator(RequestStatus::Pending)
    }

    /// The creator of `fulfilled` events
    #[must_use]
    pub fn fulfilled(&self) -> EventCreator {
        self.creator(RequestStatus::Fulfilled)
    }

    /// The creator of `rejected` events
    #[must_use]
    pub fn rejected(&self) -> EventCreator {
        self.creator(RequestStatus::Rejected)
    }

    /// Build the start event of an invocation
    pub fn started<A, R, V>(
        &self,
        request_id: impl Into<String>,
        arg: A,
    ) -> LifecycleEvent<A, R, V> {
        LifecycleEvent::Pending {
            type_prefix: Arc::clone(&self.type_prefix),
            meta: EventMeta {
                arg,
                request_id: request_id.into(),
                request_status: RequestStatus::Pending,
            },
        }
    }

    /// Build the success event of an invocation
    pub fn succeeded<A, R, V>(
        &self,
        payload: R,
        request_id: impl Into<String>,
        arg: A,
    ) -> LifecycleEvent<A, R, V> {
        LifecycleEvent::Fulfilled {
            type_prefix: Arc::clone(&self.type_prefix),
            payload,
            meta: EventMeta {
                arg,
                request_id: request_id.into(),
                request_status: RequestStatus::Fulfilled,
            },
        }
    }

    /// Build the failure event of an invocation
    pub fn failed<A, R, V>(
        &self,
        details: RejectionDetails<V>,
        request_id: impl Into<String>,
        arg: A,
    ) -> LifecycleEvent<A, R, V> {
        LifecycleEvent::Rejected {
            type_prefix: Arc::clone(&self.type_prefix),
            payload: details.payload,
            error: details.error,
            cause: details.cause,
            meta: RejectedMeta {
                base: EventMeta {
                    arg,
                    request_id: request_id.into(),
                    request_status: RequestStatus::Rejected,
                },
                rejected_with_value: details.rejected_with_value,
                aborted: details.aborted,
                condition: details.condition,
            },
        }
    }
}

/// Recognizes the events of one family member.
///
/// A creator is a type prefix plus a status; matching compares both, so it
/// works for any event type parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventCreator {
    type_prefix: Arc<str>,
    status: RequestStatus,
}

impl EventCreator {
    /// The status this creator recognizes
    #[must_use]
    pub const fn status(&self) -> RequestStatus {
        self.status
    }

    /// The type prefix this creator recognizes
    #[must_use]
    pub fn type_prefix(&self) -> &str {
        &self.type_prefix
    }

    /// The full event type, e.g. `"users/fetch/rejected"`
    #[must_use]
    pub fn event_type(&self) -> String {
        format!("{}/{}", self.type_prefix, self.status.suffix())
    }

    /// Whether `event` was built by this family member
    #[must_use]
    pub fn matches<A, R, V>(&self, event: &LifecycleEvent<A, R, V>) -> bool {
        event.request_status() == self.status && event.type_prefix() == &*self.type_prefix
    }

    /// Whether an event type string belongs to this family member
    #[must_use]
    pub fn matches_type(&self, event_type: &str) -> bool {
        RequestStatus::split_event_type(event_type)
            .is_some_and(|(prefix, status)| status == self.status && prefix == &*self.type_prefix)
    }
}

impl fmt::Display for EventCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_prefix, self.status)
    }
}
