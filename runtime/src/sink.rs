//! A sink that fans events out to subscribers.
//!
//! [`BroadcastSink`] lets any number of observers watch a lifecycle's events
//! without the orchestrator knowing about them: server-sent events, audit
//! logs, or a reducer running on another task.

use crate::error::LifecycleError;
use composable_lifecycle_core::environment::Sink;
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;

/// Default number of events buffered per subscriber
pub const DEFAULT_CAPACITY: usize = 64;

/// Sink backed by a tokio broadcast channel.
///
/// Dispatch never blocks. Events dispatched while nobody is subscribed are
/// dropped, and slow subscribers skip the oldest events.
pub struct BroadcastSink<E> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> BroadcastSink<E> {
    /// Create a sink with [`DEFAULT_CAPACITY`]
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a sink buffering `capacity` events per subscriber
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to every event dispatched from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Wait on `rx` for the first event matching `predicate`.
    ///
    /// Subscribe before starting the invocation, otherwise the event may be
    /// dispatched before anyone listens.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::Timeout`]: nothing matched within `timeout`
    /// - [`LifecycleError::ChannelClosed`]: the sink was dropped
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut rx = sink.subscribe();
    /// let handle = fetch_user.call(7, &env);
    ///
    /// let done = BroadcastSink::wait_for(
    ///     &mut rx,
    ///     |e| e.request_id() == handle.request_id() && e.request_status().is_terminal(),
    ///     Duration::from_secs(5),
    /// )
    /// .await?;
    /// ```
    pub async fn wait_for<F>(
        rx: &mut broadcast::Receiver<E>,
        predicate: F,
        timeout: Duration,
    ) -> Result<E, LifecycleError>
    where
        F: Fn(&E) -> bool,
    {
        tokio::time::timeout(timeout, async {
            loop {
                match rx.recv().await {
                    Ok(event) if predicate(&event) => return Ok(event),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // A skipped terminal event surfaces as a timeout
                        tracing::warn!(skipped, "Event subscriber lagged, {} events skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(LifecycleError::ChannelClosed);
                    }
                }
            }
        })
        .await
        .map_err(|_| LifecycleError::Timeout)?
    }
}

impl<E: Clone> Default for BroadcastSink<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for BroadcastSink<E> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<E> fmt::Debug for BroadcastSink<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastSink")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl<E: Clone + Send> Sink<E> for BroadcastSink<E> {
    fn dispatch(&self, event: E) -> E {
        if self.sender.send(event.clone()).is_err() {
            tracing::trace!("No subscribers, event dropped");
        }
        event
    }
}
