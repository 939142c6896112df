//! Environment seams consumed by the orchestrator.
//!
//! All external collaborators are abstracted behind traits and injected:
//!
//! - [`Sink`]: receives every emitted lifecycle event
//! - [`IdGenerator`]: supplies request identities
//! - state reader and `extra`: opaque values forwarded to gates and
//!   computations untouched
//!
//! Closures implement both traits, so tests can inject plain functions.

use std::fmt;
use std::sync::Arc;

/// The external consumer of lifecycle events.
///
/// Called synchronously at each emission point. The return value is the
/// event itself; the orchestrator ignores it.
///
/// # Example
///
/// ```
/// use composable_lifecycle_core::environment::Sink;
///
/// let log = |event: String| {
///     println!("{event}");
///     event
/// };
/// assert_eq!(log.dispatch("users/fetch/pending".to_string()), "users/fetch/pending");
/// ```
pub trait Sink<E>: Send + Sync {
    /// Accept an event and hand it back
    fn dispatch(&self, event: E) -> E;
}

impl<E, F> Sink<E> for F
where
    F: Fn(E) -> E + Send + Sync,
{
    fn dispatch(&self, event: E) -> E {
        self(event)
    }
}

/// Supplies a unique request identity on demand.
///
/// The orchestrator calls [`IdGenerator::next_id`] exactly once per
/// invocation.
pub trait IdGenerator: Send + Sync {
    /// Produce a fresh identifier
    fn next_id(&self) -> String;
}

impl<F> IdGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn next_id(&self) -> String {
        self()
    }
}

/// Default identifier generator producing random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Shared state reader
pub type StateReader<S> = Arc<dyn Fn() -> S + Send + Sync>;

/// The collaborators an invocation runs against.
///
/// # Type Parameters
///
/// - `S`: State returned by the state reader
/// - `X`: Opaque extra value (API clients, configuration, ...)
/// - `E`: Event type accepted by the sink
///
/// # Example
///
/// ```
/// use composable_lifecycle_core::environment::Environment;
///
/// let env: Environment<u32, &str, String> =
///     Environment::new(|event: String| event, || 42, "api-client");
///
/// assert_eq!(env.get_state(), 42);
/// assert_eq!(*env.extra(), "api-client");
/// assert_eq!(env.dispatch("ping".to_string()), "ping");
/// ```
pub struct Environment<S, X, E> {
    sink: Arc<dyn Sink<E>>,
    get_state: StateReader<S>,
    extra: Arc<X>,
}

impl<S, X, E> Environment<S, X, E> {
    /// Create an environment from a sink, a state reader and an extra value
    pub fn new(
        sink: impl Sink<E> + 'static,
        get_state: impl Fn() -> S + Send + Sync + 'static,
        extra: X,
    ) -> Self {
        Self {
            sink: Arc::new(sink),
            get_state: Arc::new(get_state),
            extra: Arc::new(extra),
        }
    }

    /// Create an environment from already shared collaborators
    #[must_use]
    pub fn from_shared(sink: Arc<dyn Sink<E>>, get_state: StateReader<S>, extra: Arc<X>) -> Self {
        Self {
            sink,
            get_state,
            extra,
        }
    }

    /// Send an event to the sink
    pub fn dispatch(&self, event: E) -> E {
        self.sink.dispatch(event)
    }

    /// Read the current state
    pub fn get_state(&self) -> S {
        (self.get_state)()
    }

    /// The extra value
    #[must_use]
    pub fn extra(&self) -> &X {
        &self.extra
    }

    /// The shared sink
    #[must_use]
    pub fn sink(&self) -> Arc<dyn Sink<E>> {
        Arc::clone(&self.sink)
    }

    /// The shared state reader
    #[must_use]
    pub fn state_reader(&self) -> StateReader<S> {
        Arc::clone(&self.get_state)
    }

    /// The shared extra value
    #[must_use]
    pub fn shared_extra(&self) -> Arc<X> {
        Arc::clone(&self.extra)
    }
}

impl<S, X, E> Clone for Environment<S, X, E> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            get_state: Arc::clone(&self.get_state),
            extra: Arc::clone(&self.extra),
        }
    }
}

impl<S, X: fmt::Debug, E> fmt::Debug for Environment<S, X, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("extra", &self.extra)
            .finish_non_exhaustive()
    }
}
