//! # Fetchloop Testing
//!
//! Testing utilities and helpers for fetchloop reducers.
//!
//! This crate provides:
//! - Mock reducers and derive functions with observable behaviour
//! - [`FixpointTest`], a Given-When-Then builder for fetch-driven reducers
//! - Assertion helpers for effects
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```
//! use fetchloop_testing::{FixpointTest, RecordingReducer};
//!
//! FixpointTest::new(RecordingReducer::new(), |state: &Vec<u32>| {
//!     if state.contains(&2) { vec![] } else { vec![2] }
//! })
//! .with_env(())
//! .given_state(vec![])
//! .when_action(1)
//! .then_state(|state| assert_eq!(state, &vec![2, 1]))
//! .then_derive_calls(2)
//! .run();
//! ```

#![allow(clippy::module_name_repetitions)]


pub use fixpoint_test::{FixpointTest, assertions};
pub use mocks::{CountingDerive, RecordingExtraReducer, RecordingReducer, ScriptedDerive};

/// Mock reducers and derive functions
///
/// Every mock here is pure and deterministic, so it can stand in for a real
/// reducer or derive function in a fixpoint test.
pub mod mocks {
    use fetchloop_core::fetch::Derive;
    use fetchloop_core::{Effect, Effects, ExtraReducer, Reducer, smallvec};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Wraps a derive function and counts how often it is queried
    ///
    /// Clones share the counter, so a clone kept by the test observes the
    /// calls made through the copy moved into the reducer.
    ///
    /// # Example
    ///
    /// ```
    /// use fetchloop_core::fetch::Derive;
    /// use fetchloop_testing::CountingDerive;
    ///
    /// let derive = CountingDerive::new(|_: &u8| Vec::<u8>::new());
    /// let observer = derive.clone();
    ///
    /// derive.derive(&0);
    /// derive.derive(&1);
    /// assert_eq!(observer.calls(), 2);
    /// ```
    #[derive(Debug, Clone)]
    pub struct CountingDerive<D> {
        inner: D,
        calls: Arc<AtomicUsize>,
    }

    impl<D> CountingDerive<D> {
        /// Start counting calls to `inner`
        #[must_use]
        pub fn new(inner: D) -> Self {
            Self {
                inner,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Number of queries so far
        #[must_use]
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl<S, A, D> Derive<S, A> for CountingDerive<D>
    where
        D: Derive<S, A>,
    {
        fn derive(&self, state: &S) -> Vec<A> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.derive(state)
        }
    }

    /// Derive function that walks a fixed script of batches
    ///
    /// Batch `i + 1` is proposed once the last action of batch `i` is
    /// present in the state; nothing is proposed once the final batch has
    /// landed. Pair it with [`RecordingReducer`], whose state is the list
    /// of applied actions.
    ///
    /// Empty batches are skipped, since an empty answer means "settled".
    #[derive(Debug, Clone)]
    pub struct ScriptedDerive<A> {
        batches: Vec<Vec<A>>,
    }

    impl<A> ScriptedDerive<A> {
        /// Script the given batches, in order
        #[must_use]
        pub fn new(batches: Vec<Vec<A>>) -> Self {
            Self {
                batches: batches.into_iter().filter(|b| !b.is_empty()).collect(),
            }
        }

        /// Batches that will be proposed
        #[must_use]
        pub fn batches(&self) -> &[Vec<A>] {
            &self.batches
        }
    }

    impl<A: Clone + PartialEq> Derive<Vec<A>, A> for ScriptedDerive<A> {
        fn derive(&self, state: &Vec<A>) -> Vec<A> {
            let landed = |batch: &Vec<A>| batch.last().is_some_and(|last| state.contains(last));
            let done = self.batches.iter().rposition(landed).map_or(0, |i| i + 1);
            self.batches.get(done).cloned().unwrap_or_default()
        }
    }

    /// Reducer that records every action it sees
    ///
    /// The state is the list of applied actions, most recent first. Each
    /// application emits one `Effect::Delay` carrying the action, so the
    /// order of accumulated effects is observable with
    /// [`assertions::delayed_actions`](crate::assertions::delayed_actions).
    #[derive(Debug, Clone, Copy)]
    pub struct RecordingReducer<A> {
        _phantom: std::marker::PhantomData<fn(A)>,
    }

    impl<A> RecordingReducer<A> {
        /// Create a new recording reducer
        #[must_use]
        pub const fn new() -> Self {
            Self {
                _phantom: std::marker::PhantomData,
            }
        }
    }

    impl<A> Default for RecordingReducer<A> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<A: Clone> Reducer for RecordingReducer<A> {
        type State = Vec<A>;
        type Action = A;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> Effects<Self::Action> {
            state.insert(0, action.clone());
            smallvec![Effect::delay(Duration::ZERO, action)]
        }
    }

    /// [`RecordingReducer`] with a side channel
    ///
    /// `forward` decides which extras each action hands to the outer caller.
    #[derive(Clone)]
    pub struct RecordingExtraReducer<A, F> {
        forward: F,
        _phantom: std::marker::PhantomData<fn(A)>,
    }

    impl<A, F> RecordingExtraReducer<A, F> {
        /// Record actions and forward `forward(&action)` as extras
        #[must_use]
        pub const fn new(forward: F) -> Self {
            Self {
                forward,
                _phantom: std::marker::PhantomData,
            }
        }
    }

    impl<A, X, F> ExtraReducer for RecordingExtraReducer<A, F>
    where
        A: Clone,
        F: Fn(&A) -> Vec<X>,
    {
        type State = Vec<A>;
        type Action = A;
        type Extra = X;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> (Effects<Self::Action>, Vec<Self::Extra>) {
            let extras = (self.forward)(&action);
            let effects = RecordingReducer::new().reduce(state, action, env);
            (effects, extras)
        }
    }
}

/// Property-based testing utilities
///
/// Strategies for scripts of derived batches, built on proptest.
pub mod properties {
    use proptest::collection::vec;
    use proptest::prelude::*;

    /// Batches of unique `"fetch-<n>"` labels
    ///
    /// Labels never repeat across batches, so a
    /// [`ScriptedDerive`](crate::ScriptedDerive) over the result always
    /// settles.
    pub fn scripts(max_batches: usize, max_batch_len: usize) -> impl Strategy<Value = Vec<Vec<String>>> {
        vec(1..=max_batch_len.max(1), 0..=max_batches).prop_map(|sizes| {
            let mut next = 0usize;
            sizes
                .into_iter()
                .map(|size| {
                    (0..size)
                        .map(|_| {
                            next += 1;
                            format!("fetch-{next}")
                        })
                        .collect()
                })
                .collect()
        })
    }

    /// Short lists of short action labels
    pub fn action_lists(max_len: usize) -> impl Strategy<Value = Vec<String>> {
        vec("[a-z]{1,6}", 0..=max_len)
    }
}

/// Install a `tracing` subscriber that writes through the test harness
///
/// Safe to call from every test; only the first call installs anything.
/// Honours `RUST_LOG`, defaulting to `fetchloop_core=trace`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fetchloop_core=trace")),
        )
        .with_test_writer()
        .try_init();
}
