//! # Composable Lifecycle Testing
//!
//! Testing utilities and helpers for async operation lifecycles.
//!
//! This crate provides:
//! - Mock implementations of the environment seams
//! - A fluent Given-When-Then harness for lifecycles
//! - Assertion helpers for event sequences
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```ignore
//! use composable_lifecycle_testing::{LifecycleTest, assertions};
//!
//! #[tokio::test]
//! async fn test_fetch_user() {
//!     LifecycleTest::new(Lifecycle::new("users/fetch", FetchUser))
//!         .given_state(AppState::default())
//!         .when_called(42)
//!         .then_events(|events| assertions::assert_started_then_settled(events))
//!         .then_outcome(|event| assert!(event.is_fulfilled()))
//!         .run()
//!         .await;
//! }
//! ```


pub use lifecycle_test::{LifecycleTest, assertions};

/// Mock implementations of the environment seams.
pub mod mocks {
    use composable_lifecycle_core::environment::{IdGenerator, Sink};
    use composable_lifecycle_core::event::LifecycleEvent;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

    /// Sink that records every dispatched event
    ///
    /// Clones share the same record, so keep one clone for assertions and
    /// hand the other to the environment.
    ///
    /// # Example
    ///
    /// ```
    /// use composable_lifecycle_testing::mocks::RecordingSink;
    /// use composable_lifecycle_core::environment::Sink;
    ///
    /// let sink = RecordingSink::new();
    /// sink.dispatch("users/fetch/pending");
    /// assert_eq!(sink.events(), vec!["users/fetch/pending"]);
    /// ```
    #[derive(Debug)]
    pub struct RecordingSink<E> {
        events: Arc<Mutex<Vec<E>>>,
    }

    impl<E> RecordingSink<E> {
        /// Create an empty sink
        #[must_use]
        pub fn new() -> Self {
            Self {
                events: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn record(&self) -> MutexGuard<'_, Vec<E>> {
            self.events.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Number of recorded events
        #[must_use]
        pub fn len(&self) -> usize {
            self.record().len()
        }

        /// Whether nothing was recorded
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.record().is_empty()
        }

        /// Forget every recorded event
        pub fn clear(&self) {
            self.record().clear();
        }
    }

    impl<E: Clone> RecordingSink<E> {
        /// Snapshot of the recorded events, in dispatch order
        #[must_use]
        pub fn events(&self) -> Vec<E> {
            self.record().clone()
        }
    }

    impl<A: Clone, R: Clone, V: Clone> RecordingSink<LifecycleEvent<A, R, V>> {
        /// Type strings of the recorded events, in dispatch order
        #[must_use]
        pub fn event_types(&self) -> Vec<String> {
            self.record().iter().map(LifecycleEvent::event_type).collect()
        }

        /// Recorded events of one invocation
        #[must_use]
        pub fn for_request(&self, request_id: &str) -> Vec<LifecycleEvent<A, R, V>> {
            self.record()
                .iter()
                .filter(|event| event.request_id() == request_id)
                .cloned()
                .collect()
        }
    }

    impl<E> Clone for RecordingSink<E> {
        fn clone(&self) -> Self {
            Self {
                events: Arc::clone(&self.events),
            }
        }
    }

    impl<E> Default for RecordingSink<E> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<E: Clone + Send> Sink<E> for RecordingSink<E> {
        fn dispatch(&self, event: E) -> E {
            self.record().push(event.clone());
            event
        }
    }

    /// Predictable request ids: `{prefix}-1`, `{prefix}-2`, ...
    ///
    /// Clones share the counter.
    ///
    /// # Example
    ///
    /// ```
    /// use composable_lifecycle_testing::mocks::SequentialIdGenerator;
    /// use composable_lifecycle_core::environment::IdGenerator;
    ///
    /// let ids = SequentialIdGenerator::new("req");
    /// assert_eq!(ids.next_id(), "req-1");
    /// assert_eq!(ids.next_id(), "req-2");
    /// assert_eq!(ids.calls(), 2);
    /// ```
    #[derive(Debug, Clone)]
    pub struct SequentialIdGenerator {
        prefix: Arc<str>,
        issued: Arc<AtomicU64>,
    }

    impl SequentialIdGenerator {
        /// Create a generator with `prefix`
        #[must_use]
        pub fn new(prefix: &str) -> Self {
            Self {
                prefix: Arc::from(prefix),
                issued: Arc::new(AtomicU64::new(0)),
            }
        }

        /// How many ids were issued
        #[must_use]
        pub fn calls(&self) -> u64 {
            self.issued.load(Ordering::SeqCst)
        }
    }

    impl Default for SequentialIdGenerator {
        fn default() -> Self {
            Self::new("req")
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next_id(&self) -> String {
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            format!("{}-{n}", self.prefix)
        }
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use crate::mocks::RecordingSink;
    use composable_lifecycle_core::environment::Environment;

    /// Install a `tracing` subscriber writing to the test output.
    ///
    /// Honours `RUST_LOG`; defaults to `debug`. Safe to call from every test.
    pub fn init_test_tracing() {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }

    /// An environment over a fixed state, paired with the sink it records to
    pub fn recording_environment<S, X, E>(state: S, extra: X) -> (Environment<S, X, E>, RecordingSink<E>)
    where
        S: Clone + Send + Sync + 'static,
        E: Clone + Send + 'static,
    {
        let sink = RecordingSink::new();
        let env = Environment::new(sink.clone(), move || state.clone(), extra);
        (env, sink)
    }
}

/// Property-based testing strategies.
pub mod properties {
    use composable_lifecycle_core::event::RequestStatus;
    use proptest::prelude::*;
    use serde_json::{Map, Value};

    /// Slash-separated type prefixes such as `users/fetch`
    pub fn type_prefix() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{0,7}(/[a-z][a-z0-9]{0,7}){0,2}"
    }

    /// Any lifecycle status
    pub fn request_status() -> impl Strategy<Value = RequestStatus> {
        prop::sample::select(RequestStatus::ALL.to_vec())
    }

    /// Human-readable abort reasons
    pub fn abort_reason() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z ]{0,23}"
    }

    /// Arbitrary JSON scalars
    pub fn json_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[a-z ]{0,12}".prop_map(Value::String),
        ]
    }

    /// Error-like JSON objects: whitelisted keys with scalar values, plus
    /// unlisted noise keys
    pub fn error_object() -> impl Strategy<Value = Value> {
        let key = prop_oneof![
            Just("name".to_string()),
            Just("message".to_string()),
            Just("stack".to_string()),
            Just("code".to_string()),
            "[a-z]{1,8}",
        ];
        prop::collection::btree_map(key, json_scalar(), 0..8)
            .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<_, _>>()))
    }
}
