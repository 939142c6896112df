//! # Composable Lifecycle Core
//!
//! Core types and traits for managing the lifecycle of asynchronous
//! operations.
//!
//! This crate provides the pure building blocks; the orchestration itself
//! lives in `composable-lifecycle-runtime`.
//!
//! ## Core Concepts
//!
//! - **Computation**: User-supplied async work, `(Arg, ThunkApi) → Result<Output, Failure>`
//! - **Lifecycle event**: One of `pending`, `fulfilled`, `rejected`, correlated by request id
//! - **Event family**: The three event constructors sharing one type prefix
//! - **Rejection marker**: A typed, deliberate failure distinct from thrown errors
//! - **Serialized error**: The stable, whitelisted shape of any failure
//! - **Abort signal**: A one-way flag a running invocation observes
//! - **Environment**: Injected sink, state reader and extra value
//!
//! ## Example
//!
//! ```ignore
//! use composable_lifecycle_core::*;
//!
//! struct FetchUser;
//!
//! impl Computation for FetchUser {
//!     type Arg = UserId;
//!     type Output = User;
//!     type Rejection = ApiError;
//!     type State = AppState;
//!     type Extra = ApiClient;
//!
//!     async fn run(&self, id: UserId, api: ThunkApiOf<Self>) -> Result<User, Failure<ApiError>> {
//!         match api.extra().get_user(id).await? {
//!             Ok(user) => Ok(user),
//!             Err(api_error) => Err(api.reject_with_value(api_error).into()),
//!         }
//!     }
//! }
//! ```

/// The user computation and its API
pub mod computation;

/// Injected collaborators: sink, id generator, environment
pub mod environment;

/// Lifecycle events and their metadata
pub mod event;

/// Event family builder and creators
pub mod family;

/// Predicates over lifecycle events
pub mod matchers;

/// Rejection marker, failures and outcomes
pub mod rejection;

/// Serializable errors and error normalization
pub mod serialized_error;

/// Abort signal
pub mod signal;

/// Terminal event unwrapping
pub mod unwrap;

// Re-export commonly used types
pub use computation::{
    Computation, ComputationApi, EnvironmentOf, EventOf, FnComputation, GateApi, GateApiOf,
    ThunkApi, ThunkApiOf, computation_fn,
};
pub use environment::{Environment, IdGenerator, Sink, UuidGenerator};
pub use event::{EventMeta, LifecycleEvent, RejectedMeta, RejectionDetails, RequestStatus};
pub use family::{EventCreator, EventFamily};
pub use rejection::{Failure, OriginalError, Outcome, RejectWithValue};
pub use serialized_error::{ErrorNormalizer, MiniSerializer, SerializedError, normalize_value};
pub use signal::{AbortSignal, AbortTrigger};
pub use unwrap::{UnwrapError, unwrap_result};
