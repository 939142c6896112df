//! # Composable Lifecycle Runtime
//!
//! Runtime for the lifecycle of asynchronous operations.
//!
//! This crate wraps a user [`Computation`](composable_lifecycle_core::Computation)
//! in a [`Lifecycle`]: every call dispatches a start event, races the
//! computation against its abort signal, classifies the outcome and
//! dispatches exactly one terminal event.
//!
//! ## Core Components
//!
//! - **Lifecycle**: The orchestrator, built with [`create_lifecycle`] or
//!   [`Lifecycle::builder`]
//! - **Invocation handle**: Awaitable, abortable view of one call
//! - **Cancellation controller**: Native or fallback abort signalling
//! - **Options**: Gate predicate, error normalizer, id generator
//! - **Broadcast sink**: Fan-out of events to subscribers
//!
//! ## Example
//!
//! ```
//! use composable_lifecycle_core::{ComputationApi, Environment, Failure, LifecycleEvent, computation_fn};
//! use composable_lifecycle_runtime::Lifecycle;
//!
//! #[derive(Clone, Default)]
//! struct Users {
//!     loading: Vec<u32>,
//! }
//!
//! type Event = LifecycleEvent<u32, String, String>;
//!
//! # tokio_test::block_on(async {
//! let fetch_user = Lifecycle::builder(
//!     "users/fetch",
//!     computation_fn(|id: u32, api: ComputationApi<u32, String, String, Users>| async move {
//!         if id == 0 {
//!             return Err(Failure::from(api.reject_with_value("no such user".to_string())));
//!         }
//!         Ok(format!("user-{id}"))
//!     }),
//! )
//! .with_gate(|id, api| Some(!api.get_state().loading.contains(id)))
//! .build();
//!
//! let env = Environment::new(|event: Event| event, Users::default, ());
//!
//! let handle = fetch_user.call(42, &env);
//! match handle.await {
//!     event if event.is_fulfilled() => println!("loaded"),
//!     event => eprintln!("failed: {:?}", event.error()),
//! }
//!
//! let rejected = fetch_user.call(0, &env).await;
//! assert!(rejected.is_rejected_with_value());
//! # });
//! ```

/// Cancellation controllers and host support detection
pub mod cancellation;

/// Invocation handles
pub mod handle;

/// The lifecycle orchestrator
pub mod lifecycle;

/// Lifecycle metrics
pub mod metrics;

/// Per-lifecycle options
pub mod options;

/// Broadcasting event sink
pub mod sink;

/// Error types for the lifecycle runtime
pub mod error {
    use thiserror::Error;

    /// Errors the runtime reports outside of lifecycle events.
    ///
    /// Computation failures never surface here; they arrive as rejected
    /// events.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum LifecycleError {
        /// Timeout waiting for an invocation to settle
        ///
        /// The invocation itself keeps running.
        #[error("Timeout waiting for invocation to settle")]
        Timeout,

        /// Event broadcast channel closed
        ///
        /// Every sender of the broadcast sink was dropped.
        #[error("Event broadcast channel closed")]
        ChannelClosed,

        /// No tokio runtime to schedule the invocation on
        #[error("No tokio runtime available to schedule the invocation")]
        NoRuntime,
    }
}

pub use cancellation::{CancellationController, CancellationSupport, FallbackController, NativeController};
pub use error::LifecycleError;
pub use handle::{AbortHandle, InvocationHandle};
pub use lifecycle::{Lifecycle, LifecycleBuilder, create_lifecycle};
pub use options::{Gate, LifecycleOptions};
pub use sink::BroadcastSink;
