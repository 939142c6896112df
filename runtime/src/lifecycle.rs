//! The lifecycle orchestrator.
//!
//! A [`Lifecycle`] wraps a [`Computation`] and turns every call into a
//! correlated sequence of events dispatched to the environment's sink:
//!
//! ```text
//! call(arg) ─▶ gate ──false──▶ rejected{condition}
//!                │
//!                ▼
//!             started ─▶ pending ─▶ race(computation, abort)
//!                                        │
//!                   ┌────────────────────┼──────────────────────┐
//!                   ▼                    ▼                      ▼
//!              fulfilled      rejected{with value|thrown}   rejected{aborted}
//! ```
//!
//! Exactly one terminal event is produced per call. The handle returned by
//! [`Lifecycle::call`] resolves to it, whether or not it was dispatched.
//!
//! # Scheduling
//!
//! `call` only generates the request id and spawns a driver task; the gate
//! runs inside the driver. An abort issued before the driver marks the
//! invocation started is therefore a no-op.
//!
//! When the abort wins the race, the computation task is detached rather
//! than cancelled. It keeps running, and its eventual outcome is discarded.

use crate::cancellation::{CancellationController, CancellationSupport};
use crate::error::LifecycleError;
use crate::handle::{AbortHandle, InvocationHandle};
use crate::metrics::LifecycleMetrics;
use crate::options::LifecycleOptions;
use composable_lifecycle_core::computation::{
    Computation, EnvironmentOf, EventOf, GateApi, GateApiOf, ThunkApi,
};
use composable_lifecycle_core::environment::IdGenerator;
use composable_lifecycle_core::event::RejectionDetails;
use composable_lifecycle_core::family::{EventCreator, EventFamily};
use composable_lifecycle_core::rejection::{OriginalError, Outcome};
use composable_lifecycle_core::serialized_error::{ErrorNormalizer, REJECTED_FALLBACK, SerializedError};
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tokio::task::JoinError;

/// Create a lifecycle for `computation` under `type_prefix`.
///
/// To install a gate on a closure computation, use [`Lifecycle::builder`]:
/// the builder already knows the computation's types, so the gate closure
/// needs no annotations.
///
/// # Example
///
/// ```
/// use composable_lifecycle_core::{ComputationApi, Environment, Failure, LifecycleEvent, computation_fn};
/// use composable_lifecycle_runtime::{LifecycleOptions, create_lifecycle};
///
/// type Event = LifecycleEvent<u32, String, String>;
///
/// # tokio_test::block_on(async {
/// let fetch_user = create_lifecycle(
///     "users/fetch",
///     computation_fn(|id: u32, _api: ComputationApi<u32, String, String>| async move {
///         Ok::<_, Failure<String>>(format!("user-{id}"))
///     }),
///     LifecycleOptions::default().with_id_generator(|| "req-1".to_string()),
/// );
///
/// let env = Environment::new(|event: Event| event, || (), ());
/// let handle = fetch_user.call(42, &env);
/// assert_eq!(handle.request_id(), "req-1");
/// assert_eq!(handle.unwrap().await, Ok("user-42".to_string()));
/// # });
/// ```
pub fn create_lifecycle<C: Computation>(
    type_prefix: impl Into<String>,
    computation: C,
    options: LifecycleOptions<C>,
) -> Lifecycle<C> {
    Lifecycle::with_options(type_prefix, computation, options)
}

/// A computation bound to an event family and its options.
///
/// Cheap to clone; clones share the computation and options.
pub struct Lifecycle<C: Computation> {
    family: EventFamily,
    computation: Arc<C>,
    options: Arc<LifecycleOptions<C>>,
}

impl<C: Computation> Lifecycle<C> {
    /// Create a lifecycle with default options
    #[must_use]
    pub fn new(type_prefix: impl Into<String>, computation: C) -> Self {
        Self::with_options(type_prefix, computation, LifecycleOptions::default())
    }

    /// Start building a lifecycle for `computation` under `type_prefix`
    #[must_use]
    pub fn builder(type_prefix: impl Into<String>, computation: C) -> LifecycleBuilder<C> {
        LifecycleBuilder {
            type_prefix: type_prefix.into(),
            computation,
            options: LifecycleOptions::default(),
        }
    }

    /// Create a lifecycle with `options`
    #[must_use]
    pub fn with_options(
        type_prefix: impl Into<String>,
        computation: C,
        options: LifecycleOptions<C>,
    ) -> Self {
        let family = EventFamily::new(type_prefix);
        tracing::debug!(type_prefix = %family.type_prefix(), ?options, "Lifecycle created");
        Self {
            family,
            computation: Arc::new(computation),
            options: Arc::new(options),
        }
    }

    /// The type prefix shared by this lifecycle's events
    #[must_use]
    pub fn type_prefix(&self) -> &str {
        self.family.type_prefix()
    }

    /// The event family
    #[must_use]
    pub const fn family(&self) -> &EventFamily {
        &self.family
    }

    /// Creator of this lifecycle's start events
    #[must_use]
    pub fn pending(&self) -> EventCreator {
        self.family.pending()
    }

    /// Creator of this lifecycle's success events
    #[must_use]
    pub fn fulfilled(&self) -> EventCreator {
        self.family.fulfilled()
    }

    /// Creator of this lifecycle's failure events
    #[must_use]
    pub fn rejected(&self) -> EventCreator {
        self.family.rejected()
    }

    /// Start an invocation.
    ///
    /// Generates the request id, then schedules the gate and the
    /// computation on the current tokio runtime. Returns before either runs.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime. Use
    /// [`try_call`](Self::try_call) to get an error instead.
    pub fn call(&self, arg: C::Arg, env: &EnvironmentOf<C>) -> InvocationHandle<C> {
        let (driver, handle) = self.prepare(arg, env);
        tokio::spawn(driver.drive());
        handle
    }

    /// Start an invocation, failing when no tokio runtime is available.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NoRuntime`] outside a tokio runtime. No
    /// request id is consumed in that case.
    pub fn try_call(
        &self,
        arg: C::Arg,
        env: &EnvironmentOf<C>,
    ) -> Result<InvocationHandle<C>, LifecycleError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| LifecycleError::NoRuntime)?;
        let (driver, handle) = self.prepare(arg, env);
        runtime.spawn(driver.drive());
        Ok(handle)
    }

    fn prepare(&self, arg: C::Arg, env: &EnvironmentOf<C>) -> (Driver<C>, InvocationHandle<C>) {
        let request_id = self.options.id_generator().next_id();
        let controller: Arc<dyn CancellationController> = self.options.cancellation().controller();
        let abort = AbortHandle::new(controller);
        let (settled_tx, settled_rx) = oneshot::channel();

        LifecycleMetrics::record_call();

        let driver = Driver {
            family: self.family.clone(),
            computation: Arc::clone(&self.computation),
            options: Arc::clone(&self.options),
            env: env.clone(),
            request_id: request_id.clone(),
            arg: arg.clone(),
            abort: abort.clone(),
            settled: settled_tx,
        };
        let handle = InvocationHandle::new(request_id, arg, abort, self.family.clone(), settled_rx);
        (driver, handle)
    }
}

impl<C: Computation> Clone for Lifecycle<C> {
    fn clone(&self) -> Self {
        Self {
            family: self.family.clone(),
            computation: Arc::clone(&self.computation),
            options: Arc::clone(&self.options),
        }
    }
}

impl<C: Computation> fmt::Debug for Lifecycle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("type_prefix", &self.family.type_prefix())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`Lifecycle`], created by [`Lifecycle::builder`].
///
/// Mirrors the [`LifecycleOptions`] builder methods. The computation type is
/// fixed before any option is set, so gate closures infer `&C::Arg` and
/// `&GateApi<C::State, C::Extra>` on their own.
///
/// # Example
///
/// ```
/// use composable_lifecycle_core::{ComputationApi, Environment, Failure, LifecycleEvent, computation_fn};
/// use composable_lifecycle_runtime::Lifecycle;
///
/// type Event = LifecycleEvent<u32, u32, String>;
///
/// # tokio_test::block_on(async {
/// let double = Lifecycle::builder(
///     "n/double",
///     computation_fn(|n: u32, _api: ComputationApi<u32, u32, String, bool>| async move {
///         Ok::<_, Failure<String>>(n * 2)
///     }),
/// )
/// .with_gate(|n, api| Some(!api.get_state() && *n < 100))
/// .suppress_skip_dispatch(true)
/// .build();
///
/// let idle = Environment::new(|event: Event| event, || false, ());
/// let busy = Environment::new(|event: Event| event, || true, ());
///
/// assert!(double.call(4, &idle).await.is_fulfilled());
/// assert!(double.call(4, &busy).await.is_condition_skipped());
/// assert!(double.call(400, &idle).await.is_condition_skipped());
/// # });
/// ```
pub struct LifecycleBuilder<C: Computation> {
    type_prefix: String,
    computation: C,
    options: LifecycleOptions<C>,
}

impl<C: Computation> LifecycleBuilder<C> {
    /// Install a gate predicate. See [`LifecycleOptions::with_gate`].
    #[must_use]
    pub fn with_gate<F>(mut self, gate: F) -> Self
    where
        F: Fn(&C::Arg, &GateApiOf<C>) -> Option<bool> + Send + Sync + 'static,
    {
        self.options = self.options.with_gate(gate);
        self
    }

    /// See [`LifecycleOptions::suppress_skip_dispatch`]
    #[must_use]
    pub fn suppress_skip_dispatch(mut self, suppress: bool) -> Self {
        self.options = self.options.suppress_skip_dispatch(suppress);
        self
    }

    /// See [`LifecycleOptions::with_error_normalizer`]
    #[must_use]
    pub fn with_error_normalizer(mut self, normalizer: impl ErrorNormalizer + 'static) -> Self {
        self.options = self.options.with_error_normalizer(normalizer);
        self
    }

    /// See [`LifecycleOptions::with_id_generator`]
    #[must_use]
    pub fn with_id_generator(mut self, generator: impl IdGenerator + 'static) -> Self {
        self.options = self.options.with_id_generator(generator);
        self
    }

    /// See [`LifecycleOptions::with_cancellation`]
    #[must_use]
    pub fn with_cancellation(mut self, support: CancellationSupport) -> Self {
        self.options = self.options.with_cancellation(support);
        self
    }

    /// Finish the lifecycle
    #[must_use]
    pub fn build(self) -> Lifecycle<C> {
        Lifecycle::with_options(self.type_prefix, self.computation, self.options)
    }
}

impl<C: Computation> fmt::Debug for LifecycleBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleBuilder")
            .field("type_prefix", &self.type_prefix)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Everything one invocation needs, moved into its driver task.
struct Driver<C: Computation> {
    family: EventFamily,
    computation: Arc<C>,
    options: Arc<LifecycleOptions<C>>,
    env: EnvironmentOf<C>,
    request_id: String,
    arg: C::Arg,
    abort: AbortHandle,
    settled: oneshot::Sender<EventOf<C>>,
}

impl<C: Computation> Driver<C> {
    #[tracing::instrument(
        name = "lifecycle_invocation",
        skip_all,
        fields(type_prefix = %self.family.type_prefix(), request_id = %self.request_id)
    )]
    async fn drive(self) {
        let started_at = Instant::now();
        let event = self.settle().await;

        if event.is_condition_skipped() && self.options.skips_dispatch_suppressed() {
            tracing::debug!("Condition skip not dispatched");
        } else {
            tracing::trace!(event_type = %event.event_type(), "Dispatching terminal event");
            self.env.dispatch(event.clone());
        }

        LifecycleMetrics::record_settled(event.request_status(), started_at.elapsed());

        if self.settled.send(event).is_err() {
            tracing::trace!("Invocation handle dropped before settling");
        }
    }

    async fn settle(&self) -> EventOf<C> {
        if let Some(skipped) = self.run_gate() {
            return skipped;
        }

        self.abort.mark_started();
        tracing::debug!("Invocation started");
        self.env
            .dispatch(self.family.started(self.request_id.clone(), self.arg.clone()));

        let api = ThunkApi::new(&self.env, self.request_id.clone(), self.abort.signal());
        let computation = Arc::clone(&self.computation);
        let arg = self.arg.clone();
        let mut task = tokio::spawn(async move { computation.run(arg, api).await });

        let signal = self.abort.signal();
        tokio::select! {
            biased;
            reason = signal.aborted() => {
                tracing::debug!(%reason, "Invocation aborted");
                LifecycleMetrics::record_abort();
                self.aborted(&reason)
            }
            joined = &mut task => {
                let outcome = match joined {
                    Ok(result) => Outcome::from(result),
                    Err(join_error) => Outcome::Thrown(OriginalError::new(join_failure(join_error))),
                };
                self.classify(outcome)
            }
        }
    }

    /// Run the gate. Returns the terminal event when the invocation must
    /// not start.
    fn run_gate(&self) -> Option<EventOf<C>> {
        let gate = self.options.gate()?;
        let api = GateApi::new(&self.env);

        match catch_unwind(AssertUnwindSafe(|| gate(&self.arg, &api))) {
            Ok(Some(false)) => {
                tracing::debug!("Gate returned false, invocation skipped");
                LifecycleMetrics::record_condition_skip();
                let cause = anyhow::Error::new(SerializedError::condition_skipped());
                let error = self.options.normalizer().normalize(&cause);
                Some(self.family.failed(
                    RejectionDetails::condition_skipped(error),
                    self.request_id.clone(),
                    self.arg.clone(),
                ))
            }
            Ok(_) => None,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(%message, "Gate panicked");
                Some(self.thrown(OriginalError::new(anyhow::anyhow!("Gate panicked: {message}"))))
            }
        }
    }

    fn classify(&self, outcome: Outcome<C::Output, C::Rejection>) -> EventOf<C> {
        match outcome {
            Outcome::Success(payload) => {
                tracing::debug!("Invocation fulfilled");
                self.family
                    .succeeded(payload, self.request_id.clone(), self.arg.clone())
            }
            Outcome::Rejected(payload) => {
                tracing::debug!("Invocation rejected with value");
                let error = self.options.normalizer().normalize_literal(REJECTED_FALLBACK);
                self.family.failed(
                    RejectionDetails::with_value(payload, error),
                    self.request_id.clone(),
                    self.arg.clone(),
                )
            }
            Outcome::Thrown(cause) => {
                tracing::debug!(error = %cause, "Invocation failed");
                self.thrown(cause)
            }
        }
    }

    fn aborted(&self, reason: &str) -> EventOf<C> {
        let cause = anyhow::Error::new(SerializedError::aborted(Some(reason)));
        let error = self.options.normalizer().normalize(&cause);
        self.family.failed(
            RejectionDetails::thrown(OriginalError::new(cause), error, true),
            self.request_id.clone(),
            self.arg.clone(),
        )
    }

    fn thrown(&self, cause: OriginalError) -> EventOf<C> {
        let error = self.options.normalizer().normalize(cause.error());
        self.family.failed(
            RejectionDetails::thrown(cause, error, false),
            self.request_id.clone(),
            self.arg.clone(),
        )
    }
}

fn join_failure(error: JoinError) -> anyhow::Error {
    if error.is_panic() {
        let payload = error.into_panic();
        anyhow::anyhow!("Computation panicked: {}", panic_message(payload.as_ref()))
    } else {
        anyhow::anyhow!("Computation task cancelled")
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::panic)] // Tests exercise panicking computations
mod tests {
    use super::*;

    fn explode() -> u32 {
        panic!("kaboom")
    }

    #[test]
    fn test_panic_message_extraction() {
        let static_payload: Box<dyn Any + Send> = Box::new("static");
        let owned_payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other_payload: Box<dyn Any + Send> = Box::new(7_u8);

        assert_eq!(panic_message(static_payload.as_ref()), "static");
        assert_eq!(panic_message(owned_payload.as_ref()), "owned");
        assert_eq!(panic_message(other_payload.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn test_join_failure_reports_panic() {
        let task = tokio::spawn(async { explode() });
        let Err(error) = task.await else {
            panic!("task should have panicked");
        };
        assert_eq!(join_failure(error).to_string(), "Computation panicked: kaboom");
    }
}
