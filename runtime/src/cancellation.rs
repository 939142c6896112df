//! Cancellation controllers.
//!
//! Each invocation owns one controller. The controller exposes the
//! invocation's [`AbortSignal`] and performs the one-way abort transition.
//!
//! Two implementations exist, selected once per invocation from the
//! injected [`CancellationSupport`] flag:
//!
//! - [`NativeController`]: the signal transitions on the first abort
//! - [`FallbackController`]: the signal never transitions; aborting only
//!   emits a one-time diagnostic notice per process
//!
//! The lifecycle surface is identical with both. Under the fallback the
//! computation simply runs uncancellable.

use composable_lifecycle_core::serialized_error::DEFAULT_ABORT_REASON;
use composable_lifecycle_core::signal::{AbortSignal, AbortTrigger};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Exposes an abort signal and the operation that fires it.
pub trait CancellationController: Send + Sync + fmt::Debug {
    /// The signal observed by the invocation
    fn signal(&self) -> AbortSignal;

    /// Request cancellation.
    ///
    /// Returns `true` only if this call transitioned the signal. Repeated
    /// calls are no-ops.
    fn abort(&self, reason: Option<&str>) -> bool;
}

/// Whether the host can cancel invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationSupport {
    /// Real cancellation through a watch-backed signal
    #[default]
    Native,

    /// No cancellation; aborts are logged once and otherwise ignored
    Unsupported,
}

impl CancellationSupport {
    /// Probe the host for cancellation support.
    ///
    /// Tokio always provides the primitives the native controller needs.
    #[must_use]
    pub const fn detect() -> Self {
        Self::Native
    }

    /// Build a controller for one invocation
    #[must_use]
    pub fn controller(self) -> Arc<dyn CancellationController> {
        match self {
            Self::Native => Arc::new(NativeController::new()),
            Self::Unsupported => Arc::new(FallbackController::new()),
        }
    }
}

/// Controller backed by a real abort signal.
#[derive(Debug)]
pub struct NativeController {
    trigger: AbortTrigger,
    signal: AbortSignal,
}

impl NativeController {
    /// Create a controller whose signal has not fired
    #[must_use]
    pub fn new() -> Self {
        let (trigger, signal) = AbortSignal::channel();
        Self { trigger, signal }
    }
}

impl Default for NativeController {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationController for NativeController {
    fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    fn abort(&self, reason: Option<&str>) -> bool {
        let fired = self.trigger.fire(reason.unwrap_or(DEFAULT_ABORT_REASON));
        if fired {
            tracing::debug!(reason = reason.unwrap_or(DEFAULT_ABORT_REASON), "Abort signal fired");
        } else {
            tracing::trace!("Abort ignored: signal already fired");
        }
        fired
    }
}

/// Set once the fallback notice has been emitted; never reset.
static FALLBACK_NOTICE_EMITTED: AtomicBool = AtomicBool::new(false);

/// Controller for hosts without cancellation support.
#[derive(Debug)]
pub struct FallbackController {
    signal: AbortSignal,
}

impl FallbackController {
    /// Create a controller whose signal never fires
    #[must_use]
    pub fn new() -> Self {
        Self {
            signal: AbortSignal::never(),
        }
    }

    /// Emit the unsupported-cancellation notice if it has not been emitted
    /// in this process yet. Returns `true` if this call emitted it.
    pub fn emit_notice() -> bool {
        if FALLBACK_NOTICE_EMITTED.swap(true, Ordering::AcqRel) {
            return false;
        }
        tracing::warn!(
            "This host does not support cancellation. Aborting an invocation will not \
             cancel it; the computation runs to completion and its outcome is reported."
        );
        true
    }
}

impl Default for FallbackController {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationController for FallbackController {
    fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    fn abort(&self, _reason: Option<&str>) -> bool {
        Self::emit_notice();
        false
    }
}
