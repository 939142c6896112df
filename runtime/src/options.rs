//! Per-lifecycle configuration.
//!
//! Everything here is fixed when the lifecycle is created and shared by all
//! of its invocations.
//!
//! Options are typed by their computation. A gate closure can only infer its
//! parameter types once that type is known, so either name it as below or
//! configure through [`Lifecycle::builder`](crate::lifecycle::Lifecycle::builder).
//!
//! # Example
//!
//! ```
//! use composable_lifecycle_core::{Computation, Failure, ThunkApiOf};
//! use composable_lifecycle_runtime::LifecycleOptions;
//! use std::future::Future;
//!
//! struct FetchUser;
//!
//! impl Computation for FetchUser {
//!     type Arg = u32;
//!     type Output = String;
//!     type Rejection = String;
//!     type State = Vec<u32>;
//!     type Extra = ();
//!
//!     fn run(
//!         &self,
//!         id: u32,
//!         _api: ThunkApiOf<Self>,
//!     ) -> impl Future<Output = Result<String, Failure<String>>> + Send {
//!         async move { Ok(format!("user-{id}")) }
//!     }
//! }
//!
//! let options = LifecycleOptions::<FetchUser>::default()
//!     .with_gate(|id, api| Some(!api.get_state().contains(id)))
//!     .suppress_skip_dispatch(true)
//!     .with_id_generator(|| "req-1".to_string());
//!
//! assert!(format!("{options:?}").contains("gated: true"));
//! ```

use crate::cancellation::CancellationSupport;
use composable_lifecycle_core::computation::{Computation, GateApiOf};
use composable_lifecycle_core::environment::{IdGenerator, UuidGenerator};
use composable_lifecycle_core::serialized_error::{ErrorNormalizer, MiniSerializer};
use std::fmt;
use std::sync::Arc;

/// A gate predicate.
///
/// Runs synchronously before an invocation starts. Only `Some(false)` skips
/// the invocation; `Some(true)` and `None` both proceed.
pub type Gate<C> =
    Arc<dyn Fn(&<C as Computation>::Arg, &GateApiOf<C>) -> Option<bool> + Send + Sync>;

/// Options for a [`Lifecycle`](crate::lifecycle::Lifecycle).
pub struct LifecycleOptions<C: Computation> {
    gate: Option<Gate<C>>,
    suppress_skip_dispatch: bool,
    normalizer: Arc<dyn ErrorNormalizer>,
    id_generator: Arc<dyn IdGenerator>,
    cancellation: CancellationSupport,
}

impl<C: Computation> LifecycleOptions<C> {
    /// Options with no gate, skip events dispatched, [`MiniSerializer`],
    /// [`UuidGenerator`] and detected cancellation support
    #[must_use]
    pub fn new() -> Self {
        Self {
            gate: None,
            suppress_skip_dispatch: false,
            normalizer: Arc::new(MiniSerializer),
            id_generator: Arc::new(UuidGenerator),
            cancellation: CancellationSupport::detect(),
        }
    }

    /// Install a gate predicate.
    ///
    /// The closure's parameter types come from `C`; when `C` is not named,
    /// use [`LifecycleBuilder::with_gate`](crate::lifecycle::LifecycleBuilder::with_gate).
    #[must_use]
    pub fn with_gate<F>(mut self, gate: F) -> Self
    where
        F: Fn(&C::Arg, &GateApiOf<C>) -> Option<bool> + Send + Sync + 'static,
    {
        self.gate = Some(Arc::new(gate));
        self
    }

    /// Whether a gate skip produces a dispatched terminal event.
    ///
    /// The handle resolves with the skip event either way.
    #[must_use]
    pub const fn suppress_skip_dispatch(mut self, suppress: bool) -> Self {
        self.suppress_skip_dispatch = suppress;
        self
    }

    /// Replace the error normalizer
    #[must_use]
    pub fn with_error_normalizer(mut self, normalizer: impl ErrorNormalizer + 'static) -> Self {
        self.normalizer = Arc::new(normalizer);
        self
    }

    /// Replace the request id generator
    #[must_use]
    pub fn with_id_generator(mut self, generator: impl IdGenerator + 'static) -> Self {
        self.id_generator = Arc::new(generator);
        self
    }

    /// Override cancellation support detection
    #[must_use]
    pub const fn with_cancellation(mut self, support: CancellationSupport) -> Self {
        self.cancellation = support;
        self
    }

    pub(crate) fn gate(&self) -> Option<&Gate<C>> {
        self.gate.as_ref()
    }

    pub(crate) const fn skips_dispatch_suppressed(&self) -> bool {
        self.suppress_skip_dispatch
    }

    pub(crate) fn normalizer(&self) -> &dyn ErrorNormalizer {
        self.normalizer.as_ref()
    }

    pub(crate) fn id_generator(&self) -> &dyn IdGenerator {
        self.id_generator.as_ref()
    }

    /// The cancellation support invocations are built with
    #[must_use]
    pub const fn cancellation(&self) -> CancellationSupport {
        self.cancellation
    }
}

impl<C: Computation> Default for LifecycleOptions<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Computation> Clone for LifecycleOptions<C> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            suppress_skip_dispatch: self.suppress_skip_dispatch,
            normalizer: Arc::clone(&self.normalizer),
            id_generator: Arc::clone(&self.id_generator),
            cancellation: self.cancellation,
        }
    }
}

impl<C: Computation> fmt::Debug for LifecycleOptions<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleOptions")
            .field("gated", &self.gate.is_some())
            .field("suppress_skip_dispatch", &self.suppress_skip_dispatch)
            .field("cancellation", &self.cancellation)
            .finish_non_exhaustive()
    }
}
