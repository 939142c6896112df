//! The user computation and the API it runs against.
//!
//! A [`Computation`] is the user-supplied unit of async work whose lifecycle
//! the orchestrator manages. It receives the invocation argument plus a
//! [`ThunkApi`] giving it access to the sink, the state reader, the extra
//! value, its own request id and abort signal, and the rejection marker.
//!
//! # Example
//!
//! ```
//! use composable_lifecycle_core::computation::{Computation, ThunkApiOf};
//! use composable_lifecycle_core::rejection::Failure;
//!
//! struct FetchUser;
//!
//! impl Computation for FetchUser {
//!     type Arg = u64;
//!     type Output = String;
//!     type Rejection = String;
//!     type State = ();
//!     type Extra = ();
//!
//!     async fn run(&self, id: u64, api: ThunkApiOf<Self>) -> Result<String, Failure<String>> {
//!         if id == 0 {
//!             return Err(api.reject_with_value("unknown user".to_string()).into());
//!         }
//!         Ok(format!("user-{id}"))
//!     }
//! }
//! ```

use crate::environment::{Environment, Sink, StateReader};
use crate::event::LifecycleEvent;
use crate::rejection::{Failure, RejectWithValue};
use crate::signal::AbortSignal;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// The lifecycle event type of a computation
pub type EventOf<C> = LifecycleEvent<
    <C as Computation>::Arg,
    <C as Computation>::Output,
    <C as Computation>::Rejection,
>;

/// The API handed to a computation
pub type ThunkApiOf<C> = ThunkApi<<C as Computation>::State, <C as Computation>::Extra, EventOf<C>>;

/// The gate API of a computation
pub type GateApiOf<C> = GateApi<<C as Computation>::State, <C as Computation>::Extra>;

/// The environment a computation is invoked against
pub type EnvironmentOf<C> =
    Environment<<C as Computation>::State, <C as Computation>::Extra, EventOf<C>>;

/// The API of a closure computation, spelled out from its types.
///
/// `S` and `X` default to `()` for computations that read neither state nor
/// extra.
pub type ComputationApi<A, R, V, S = (), X = ()> = ThunkApi<S, X, LifecycleEvent<A, R, V>>;

/// A user-supplied async computation.
///
/// # Associated Types
///
/// - `Arg`: The invocation argument, copied into every lifecycle event
/// - `Output`: The success value
/// - `Rejection`: The payload of deliberate rejections
/// - `State`: What the state reader returns
/// - `Extra`: The opaque extra value
pub trait Computation: Send + Sync + 'static {
    /// The invocation argument
    type Arg: Clone + Send + Sync + 'static;

    /// The success value
    type Output: Clone + Send + 'static;

    /// The payload of deliberate rejections
    type Rejection: Clone + Send + 'static;

    /// What the state reader returns
    type State: 'static;

    /// The opaque extra value
    type Extra: Send + Sync + 'static;

    /// Run the computation.
    ///
    /// Return `Ok` with the success value, `Err(Failure::Rejected)` (via
    /// [`ThunkApi::reject_with_value`]) for a deliberate rejection, or
    /// `Err(Failure::Thrown)` for anything else.
    fn run(
        &self,
        arg: Self::Arg,
        api: ThunkApiOf<Self>,
    ) -> impl Future<Output = Result<Self::Output, Failure<Self::Rejection>>> + Send;
}

/// What a running computation can reach.
pub struct ThunkApi<S, X, E> {
    sink: Arc<dyn Sink<E>>,
    get_state: StateReader<S>,
    extra: Arc<X>,
    request_id: String,
    signal: AbortSignal,
}

impl<S, X, E> ThunkApi<S, X, E> {
    /// Build the API for one invocation
    #[must_use]
    pub fn new(env: &Environment<S, X, E>, request_id: impl Into<String>, signal: AbortSignal) -> Self {
        Self {
            sink: env.sink(),
            get_state: env.state_reader(),
            extra: env.shared_extra(),
            request_id: request_id.into(),
            signal,
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

    /// This invocation's request id
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// This invocation's abort signal
    #[must_use]
    pub const fn signal(&self) -> &AbortSignal {
        &self.signal
    }

    /// Mark `payload` as a deliberate rejection.
    ///
    /// Convert the marker into the computation's error with `.into()`.
    pub const fn reject_with_value<V>(&self, payload: V) -> RejectWithValue<V> {
        RejectWithValue::new(payload)
    }
}

impl<S, X, E> Clone for ThunkApi<S, X, E> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            get_state: Arc::clone(&self.get_state),
            extra: Arc::clone(&self.extra),
            request_id: self.request_id.clone(),
            signal: self.signal.clone(),
        }
    }
}

impl<S, X, E> fmt::Debug for ThunkApi<S, X, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThunkApi")
            .field("request_id", &self.request_id)
            .field("aborted", &self.signal.is_aborted())
            .finish_non_exhaustive()
    }
}

/// What a gate predicate can read.
pub struct GateApi<S, X> {
    get_state: StateReader<S>,
    extra: Arc<X>,
}

impl<S, X> GateApi<S, X> {
    /// Build the gate API from an environment
    #[must_use]
    pub fn new<E>(env: &Environment<S, X, E>) -> Self {
        Self {
            get_state: env.state_reader(),
            extra: env.shared_extra(),
        }
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
}

impl<S, X> fmt::Debug for GateApi<S, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateApi").finish_non_exhaustive()
    }
}

/// A computation backed by a closure. Built by [`computation_fn`].
pub struct FnComputation<F, A, R, V, S = (), X = ()> {
    f: F,
    _types: PhantomData<fn(A, S, X) -> (R, V)>,
}

/// Adapt a closure into a [`Computation`].
///
/// # Example
///
/// ```
/// use composable_lifecycle_core::computation::{computation_fn, ComputationApi};
/// use composable_lifecycle_core::rejection::Failure;
///
/// let double = computation_fn(|n: u32, _api: ComputationApi<u32, u32, String>| async move {
///     Ok::<_, Failure<String>>(n * 2)
/// });
/// # let _ = double;
/// ```
pub const fn computation_fn<F, Fut, A, R, V, S, X>(f: F) -> FnComputation<F, A, R, V, S, X>
where
    F: Fn(A, ThunkApi<S, X, LifecycleEvent<A, R, V>>) -> Fut,
    Fut: Future<Output = Result<R, Failure<V>>>,
{
    FnComputation {
        f,
        _types: PhantomData,
    }
}

impl<F, Fut, A, R, V, S, X> Computation for FnComputation<F, A, R, V, S, X>
where
    F: Fn(A, ThunkApi<S, X, LifecycleEvent<A, R, V>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Failure<V>>> + Send + 'static,
    A: Clone + Send + Sync + 'static,
    R: Clone + Send + 'static,
    V: Clone + Send + 'static,
    S: 'static,
    X: Send + Sync + 'static,
{
    type Arg = A;
    type Output = R;
    type Rejection = V;
    type State = S;
    type Extra = X;

    fn run(
        &self,
        arg: Self::Arg,
        api: ThunkApiOf<Self>,
    ) -> impl Future<Output = Result<Self::Output, Failure<Self::Rejection>>> + Send {
        (self.f)(arg, api)
    }
}

impl<F, A, R, V, S, X> fmt::Debug for FnComputation<F, A, R, V, S, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnComputation").finish_non_exhaustive()
    }
}
