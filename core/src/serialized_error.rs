//! Serializable error shape and error normalization.
//!
//! Failures produced by a computation are arbitrary values: Rust errors,
//! JSON payloads, or already-serialized errors. Before a failure is attached
//! to a lifecycle event it is reduced to a [`SerializedError`], a small
//! whitelisted record of optional strings that can be stored, logged or sent
//! over the wire without dragging the original value along.
//!
//! # Example
//!
//! ```
//! use composable_lifecycle_core::serialized_error::normalize_value;
//! use serde_json::json;
//!
//! let error = normalize_value(&json!({ "name": "E", "message": "boom", "extra": 1 }));
//! assert_eq!(error.name.as_deref(), Some("E"));
//! assert_eq!(error.message.as_deref(), Some("boom"));
//! assert!(error.stack.is_none());
//!
//! let error = normalize_value(&json!(42));
//! assert_eq!(error.message.as_deref(), Some("42"));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Name carried by the synthetic failure of an aborted invocation.
pub const ABORT_ERROR_NAME: &str = "AbortError";

/// Message used when an invocation is aborted without a reason.
pub const DEFAULT_ABORT_REASON: &str = "Aborted";

/// Name carried by the failure of a condition-skipped invocation.
pub const CONDITION_ERROR_NAME: &str = "ConditionError";

/// Message carried by the failure of a condition-skipped invocation.
pub const CONDITION_ERROR_MESSAGE: &str = "Aborted due to condition callback returning false.";

/// Fallback literal normalized when an invocation rejects with a value.
pub const REJECTED_FALLBACK: &str = "Rejected";

/// The fields copied from an object-shaped failure value.
const WHITELISTED_FIELDS: [&str; 4] = ["name", "message", "stack", "code"];

/// A stable, serializable description of a failure.
///
/// Every field is optional. Normalization only ever copies string-typed
/// fields, so a `SerializedError` never holds references to the original
/// value.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[error("{}", .message.as_deref().unwrap_or("Unknown error"))]
pub struct SerializedError {
    /// Error class name, e.g. `AbortError`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Stack or cause-chain rendering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,

    /// Machine-readable error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl SerializedError {
    /// Create a serialized error carrying only a message.
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Set the error name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the error code
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set the stack rendering
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// The failure reported when an invocation is aborted.
    ///
    /// The message is the abort reason, or [`DEFAULT_ABORT_REASON`].
    #[must_use]
    pub fn aborted(reason: Option<&str>) -> Self {
        Self::from_message(reason.unwrap_or(DEFAULT_ABORT_REASON)).with_name(ABORT_ERROR_NAME)
    }

    /// The failure reported when the gate skips an invocation.
    #[must_use]
    pub fn condition_skipped() -> Self {
        Self::from_message(CONDITION_ERROR_MESSAGE).with_name(CONDITION_ERROR_NAME)
    }

    /// Whether this error is the abort failure.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        self.name.as_deref() == Some(ABORT_ERROR_NAME)
    }
}

/// Normalize an arbitrary JSON value into a [`SerializedError`].
///
/// Objects keep only the string-typed `name`, `message`, `stack` and `code`
/// fields. Any other value becomes `{ message: <value> }`, where strings are
/// used as-is and everything else uses its JSON rendering.
///
/// Never fails.
#[must_use]
pub fn normalize_value(value: &Value) -> SerializedError {
    match value {
        Value::Object(fields) => {
            let pick = |key: &str| {
                fields
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            };
            let [name, message, stack, code] = WHITELISTED_FIELDS.map(pick);
            SerializedError {
                name,
                message,
                stack,
                code,
            }
        },
        Value::String(text) => SerializedError::from_message(text.clone()),
        other => SerializedError::from_message(other.to_string()),
    }
}

/// Converts a thrown failure into its serialized form.
///
/// Implementations must never panic. The orchestrator calls the normalizer
/// for every thrown failure and for the synthetic abort and gate-skip
/// failures, which arrive as [`SerializedError`] payloads.
pub trait ErrorNormalizer: Send + Sync {
    /// Reduce `error` to a [`SerializedError`]
    fn normalize(&self, error: &anyhow::Error) -> SerializedError;

    /// Normalize the fallback literal used for value rejections.
    ///
    /// The default routes the literal through [`ErrorNormalizer::normalize`].
    fn normalize_literal(&self, literal: &str) -> SerializedError {
        self.normalize(&anyhow::Error::msg(Value::String(literal.to_owned())))
    }
}

impl<F> ErrorNormalizer for F
where
    F: Fn(&anyhow::Error) -> SerializedError + Send + Sync,
{
    fn normalize(&self, error: &anyhow::Error) -> SerializedError {
        self(error)
    }
}

/// The default error normalizer.
///
/// Resolution order for a thrown `anyhow::Error`:
/// 1. a [`SerializedError`] payload is cloned;
/// 2. a [`serde_json::Value`] payload goes through [`normalize_value`];
/// 3. anything else reports its `Display` output as the message and its
///    `Debug` output (cause chain, backtrace when captured) as the stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct MiniSerializer;

impl ErrorNormalizer for MiniSerializer {
    fn normalize(&self, error: &anyhow::Error) -> SerializedError {
        if let Some(serialized) = error.downcast_ref::<SerializedError>() {
            return serialized.clone();
        }
        if let Some(value) = error.downcast_ref::<Value>() {
            return normalize_value(value);
        }
        SerializedError::from_message(error.to_string()).with_stack(format!("{error:?}"))
    }

    fn normalize_literal(&self, literal: &str) -> SerializedError {
        SerializedError::from_message(literal)
    }
}
