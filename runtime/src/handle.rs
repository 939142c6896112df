//! Invocation handles.
//!
//! [`Lifecycle::call`](crate::lifecycle::Lifecycle::call) returns an
//! [`InvocationHandle`] immediately. The handle is a future resolving to the
//! invocation's terminal event, and it carries the request id, the argument
//! and the abort operation.
//!
//! Awaiting the handle never fails: failures arrive as rejected events. Use
//! [`InvocationHandle::unwrap`] for a `Result` view.

use crate::cancellation::CancellationController;
use crate::error::LifecycleError;
use composable_lifecycle_core::computation::{Computation, EventOf};
use composable_lifecycle_core::event::RejectionDetails;
use composable_lifecycle_core::family::EventFamily;
use composable_lifecycle_core::rejection::OriginalError;
use composable_lifecycle_core::serialized_error::SerializedError;
use composable_lifecycle_core::signal::AbortSignal;
use composable_lifecycle_core::unwrap::{UnwrapError, unwrap_result};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;

const DRIVER_LOST_MESSAGE: &str = "Invocation driver terminated before settling";

/// Clonable abort capability of one invocation.
///
/// Aborting before the invocation has started (while the gate is still
/// pending) is a no-op.
#[derive(Clone)]
pub struct AbortHandle {
    started: Arc<AtomicBool>,
    controller: Arc<dyn CancellationController>,
}

impl AbortHandle {
    pub(crate) fn new(controller: Arc<dyn CancellationController>) -> Self {
        Self {
            started: Arc::new(AtomicBool::new(false)),
            controller,
        }
    }

    pub(crate) fn mark_started(&self) {
        self.started.store(true, Ordering::Release);
    }

    /// Whether the invocation passed its gate and started
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Abort with the default reason.
    ///
    /// Returns `true` if this call aborted the invocation.
    pub fn abort(&self) -> bool {
        self.request(None)
    }

    /// Abort with `reason`. The first reason recorded wins.
    ///
    /// Returns `true` if this call aborted the invocation.
    pub fn abort_with_reason(&self, reason: impl Into<String>) -> bool {
        self.request(Some(reason.into()))
    }

    /// The invocation's abort signal
    #[must_use]
    pub fn signal(&self) -> AbortSignal {
        self.controller.signal()
    }

    fn request(&self, reason: Option<String>) -> bool {
        if !self.is_started() {
            tracing::debug!("Abort ignored: invocation has not started");
            return false;
        }
        self.controller.abort(reason.as_deref())
    }
}

impl fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortHandle")
            .field("started", &self.is_started())
            .field("controller", &self.controller)
            .finish()
    }
}

/// Handle to a running invocation.
///
/// # Example
///
/// ```ignore
/// let handle = lifecycle.call(user_id, &env);
/// println!("started {}", handle.request_id());
///
/// let event = handle.await;
/// assert!(event.is_fulfilled());
/// ```
pub struct InvocationHandle<C: Computation> {
    request_id: String,
    arg: C::Arg,
    abort: AbortHandle,
    family: EventFamily,
    settled: oneshot::Receiver<EventOf<C>>,
}

impl<C: Computation> InvocationHandle<C> {
    pub(crate) const fn new(
        request_id: String,
        arg: C::Arg,
        abort: AbortHandle,
        family: EventFamily,
        settled: oneshot::Receiver<EventOf<C>>,
    ) -> Self {
        Self {
            request_id,
            arg,
            abort,
            family,
            settled,
        }
    }

    /// The invocation's request id
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The argument the invocation was called with
    #[must_use]
    pub const fn arg(&self) -> &C::Arg {
        &self.arg
    }

    /// Abort with the default reason. See [`AbortHandle::abort`].
    pub fn abort(&self) -> bool {
        self.abort.abort()
    }

    /// Abort with `reason`. See [`AbortHandle::abort_with_reason`].
    pub fn abort_with_reason(&self, reason: impl Into<String>) -> bool {
        self.abort.abort_with_reason(reason)
    }

    /// A clonable abort capability that outlives the handle
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// The invocation's abort signal
    #[must_use]
    pub fn signal(&self) -> AbortSignal {
        self.abort.signal()
    }

    /// Wait for the terminal event and unwrap it.
    ///
    /// # Errors
    ///
    /// [`UnwrapError::Rejected`] with the raw payload for deliberate
    /// rejections, [`UnwrapError::Failed`] with the serialized error for
    /// everything else.
    pub async fn unwrap(self) -> Result<C::Output, UnwrapError<C::Rejection>> {
        unwrap_result(self.await)
    }

    /// Wait for the terminal event for at most `timeout`.
    ///
    /// The invocation keeps running if the timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Timeout`] if the invocation has not settled
    /// in time.
    pub async fn wait_with_timeout(self, timeout: Duration) -> Result<EventOf<C>, LifecycleError> {
        tokio::time::timeout(timeout, self)
            .await
            .map_err(|_| LifecycleError::Timeout)
    }

    fn driver_lost(&self) -> EventOf<C> {
        tracing::error!(request_id = %self.request_id, "{DRIVER_LOST_MESSAGE}");
        let cause = OriginalError::new(anyhow::anyhow!(DRIVER_LOST_MESSAGE));
        self.family.failed(
            RejectionDetails::thrown(cause, SerializedError::from_message(DRIVER_LOST_MESSAGE), false),
            self.request_id.clone(),
            self.arg.clone(),
        )
    }
}

// No field is structurally pinned.
impl<C: Computation> Unpin for InvocationHandle<C> {}

impl<C: Computation> Future for InvocationHandle<C> {
    type Output = EventOf<C>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.settled).poll(cx) {
            Poll::Ready(Ok(event)) => Poll::Ready(event),
            Poll::Ready(Err(_)) => Poll::Ready(this.driver_lost()),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<C: Computation> fmt::Debug for InvocationHandle<C>
where
    C::Arg: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationHandle")
            .field("type_prefix", &self.family.type_prefix())
            .field("request_id", &self.request_id)
            .field("arg", &self.arg)
            .field("started", &self.abort.is_started())
            .finish_non_exhaustive()
    }
}
