//! Abort signal observed by a running invocation.
//!
//! The signal is a one-way flag: it starts not-aborted and may transition to
//! aborted exactly once, carrying the abort reason. Computations use it for
//! cooperative cancellation; the orchestrator races it against the
//! computation.
//!
//! # Example
//!
//! ```
//! use composable_lifecycle_core::signal::AbortSignal;
//!
//! # tokio_test::block_on(async {
//! let (trigger, signal) = AbortSignal::channel();
//! assert!(!signal.is_aborted());
//!
//! assert!(trigger.fire("user navigated away"));
//! assert!(!trigger.fire("second call is ignored"));
//!
//! assert_eq!(signal.aborted().await, "user navigated away");
//! assert_eq!(signal.reason().as_deref(), Some("user navigated away"));
//! # });
//! ```

use tokio::sync::watch;

/// Read side of an abort flag.
///
/// Cheap to clone; every clone observes the same transition.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    state: watch::Receiver<Option<String>>,
}

impl AbortSignal {
    /// Create a connected trigger/signal pair.
    #[must_use]
    pub fn channel() -> (AbortTrigger, Self) {
        let (tx, rx) = watch::channel(None);
        (AbortTrigger { state: tx }, Self { state: rx })
    }

    /// A signal that never transitions.
    ///
    /// Used where cancellation is unsupported: [`AbortSignal::aborted`] pends
    /// forever and [`AbortSignal::is_aborted`] is always `false`.
    #[must_use]
    pub fn never() -> Self {
        let (_, rx) = watch::channel(None);
        Self { state: rx }
    }

    /// Whether the signal has transitioned to aborted
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// The abort reason, once aborted
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.state.borrow().clone()
    }

    /// Wait until the signal is aborted and return the reason.
    ///
    /// Resolves immediately if the signal is already aborted. If the trigger
    /// is dropped without firing, the signal can no longer transition and
    /// this future never resolves.
    pub async fn aborted(&self) -> String {
        let mut state = self.state.clone();
        let reason = match state.wait_for(Option::is_some).await {
            Ok(current) => current.clone(),
            Err(_) => None,
        };
        match reason {
            Some(reason) => reason,
            None => futures::future::pending().await,
        }
    }
}

/// Write side of an abort flag.
#[derive(Debug)]
pub struct AbortTrigger {
    state: watch::Sender<Option<String>>,
}

impl AbortTrigger {
    /// Transition the signal to aborted with `reason`.
    ///
    /// Returns `true` if this call performed the transition, `false` if the
    /// signal was already aborted. The first reason wins.
    pub fn fire(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        self.state.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    /// Whether the signal has been fired
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.state.borrow().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fire_is_one_way_and_idempotent() {
        let (trigger, signal) = AbortSignal::channel();

        assert!(trigger.fire("first"));
        assert!(!trigger.fire("second"));
        assert!(trigger.is_fired());
        assert_eq!(signal.reason().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_aborted_wakes_waiter() {
        let (trigger, signal) = AbortSignal::channel();

        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.aborted().await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.fire("stop");

        let reason = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(matches!(reason, Ok(Ok(ref r)) if r == "stop"));
    }

    #[tokio::test]
    async fn test_never_signal_does_not_resolve() {
        let signal = AbortSignal::never();
        assert!(!signal.is_aborted());

        let result = tokio::time::timeout(Duration::from_millis(20), signal.aborted()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_dropped_trigger_does_not_resolve() {
        let (trigger, signal) = AbortSignal::channel();
        drop(trigger);

        let result = tokio::time::timeout(Duration::from_millis(20), signal.aborted()).await;
        assert!(result.is_err());
    }
}
