//! Predicates for dispatching on lifecycle events.
//!
//! Reducers and sinks often care about every lifecycle event of a few
//! families ("any of these requests is loading"). These helpers cover the
//! common cases without matching on each creator by hand.
//!
//! ```
//! use composable_lifecycle_core::event::LifecycleEvent;
//! use composable_lifecycle_core::family::EventFamily;
//! use composable_lifecycle_core::matchers::{is_pending, matches_any};
//!
//! let users = EventFamily::new("users/fetch");
//! let posts = EventFamily::new("posts/fetch");
//!
//! let event: LifecycleEvent<(), (), ()> = posts.started("req-1", ());
//!
//! assert!(is_pending(&event));
//! assert!(matches_any(&[users.pending(), posts.pending()], &event));
//! assert!(!matches_any(&[users.pending()], &event));
//! ```

use crate::event::{LifecycleEvent, RequestStatus};
use crate::family::EventCreator;

/// Whether `event` is a start event
#[must_use]
pub const fn is_pending<A, R, V>(event: &LifecycleEvent<A, R, V>) -> bool {
    event.is_pending()
}

/// Whether `event` is a success event
#[must_use]
pub const fn is_fulfilled<A, R, V>(event: &LifecycleEvent<A, R, V>) -> bool {
    event.is_fulfilled()
}

/// Whether `event` is a failure event of any kind
#[must_use]
pub const fn is_rejected<A, R, V>(event: &LifecycleEvent<A, R, V>) -> bool {
    event.is_rejected()
}

/// Whether `event` is a deliberate rejection carrying a payload
#[must_use]
pub fn is_rejected_with_value<A, R, V>(event: &LifecycleEvent<A, R, V>) -> bool {
    event.is_rejected_with_value()
}

/// Whether any of `creators` recognizes `event`
#[must_use]
pub fn matches_any<A, R, V>(creators: &[EventCreator], event: &LifecycleEvent<A, R, V>) -> bool {
    creators.iter().any(|creator| creator.matches(event))
}

/// Whether `event_type` names a lifecycle event with `status`.
///
/// Useful for consumers that only see event type strings.
#[must_use]
pub fn is_status_type(event_type: &str, status: RequestStatus) -> bool {
    RequestStatus::split_event_type(event_type).is_some_and(|(_, found)| found == status)
}
