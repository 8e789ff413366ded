//! # Fetchloop Core
//!
//! Reducer sequencing and derived-action fixpoint combinators for
//! unidirectional state-update architectures.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state owned by the host
//! - **Action**: All possible inputs to a reducer
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Extra**: Actions a reducer hands back to an outer caller instead of handling itself
//! - **Effect**: Side effect descriptions (not execution)
//! - **Derive**: Pure function `State → [Action]` proposing follow-up work
//!
//! ## The fixpoint loop
//!
//! [`fetch::and_then_fetch`] wraps a reducer so that, after every action, the
//! derive function is asked what the *new* state still needs. Proposed actions
//! are drained in batches until derive proposes nothing:
//!
//! ```text
//! action ─► reduce ─► derive(state) ──[]──► Settled
//!                         │ ▲
//!                  [a, b] │ │
//!                         ▼ │
//!                 sequence(a, b)
//! ```
//!
//! ## Example
//!
//! ```
//! use fetchloop_core::{Effects, Reducer, SmallVec, fetch::and_then_fetch};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum Action {
//!     Open,
//!     Load,
//! }
//!
//! #[derive(Default)]
//! struct State {
//!     open: bool,
//!     loading: bool,
//! }
//!
//! struct Screen;
//!
//! impl Reducer for Screen {
//!     type State = State;
//!     type Action = Action;
//!     type Environment = ();
//!
//!     fn reduce(&self, state: &mut State, action: Action, _env: &()) -> Effects<Action> {
//!         match action {
//!             Action::Open => state.open = true,
//!             Action::Load => state.loading = true,
//!         }
//!         SmallVec::new()
//!     }
//! }
//!
//! let reducer = and_then_fetch(
//!     |state: &State| {
//!         if state.open && !state.loading { vec![Action::Load] } else { vec![] }
//!     },
//!     Screen,
//! );
//!
//! let mut state = State::default();
//! let _effects = reducer.reduce(&mut state, Action::Open, &());
//! assert!(state.loading);
//! ```

// Re-export commonly used types
pub use smallvec::{SmallVec, smallvec};

pub use effect::{Batch, Effect, Effects};
pub use reducer::{ExtraReducer, Reducer};

/// Optional limits for the fixpoint loop
pub mod config;

/// Error types for the fixpoint loop
pub mod error;

/// Derived-action fixpoint loop
pub mod fetch;

/// Ordered application of action lists
pub mod sequence;

/// Reducer module - The core traits for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// State is exclusively borrowed for the duration of one call, so no other
/// holder ever observes a half-applied action.
pub mod reducer {
    use super::effect::Effects;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Purity
    ///
    /// Implementations must be referentially transparent: the same state,
    /// action, and environment always produce the same new state and the
    /// same effect descriptions. Nothing in this crate checks this.
    ///
    /// # Example
    ///
    /// ```
    /// use fetchloop_core::{Effect, Effects, Reducer, smallvec};
    ///
    /// struct Counter;
    ///
    /// impl Reducer for Counter {
    ///     type State = i64;
    ///     type Action = i64;
    ///     type Environment = ();
    ///
    ///     fn reduce(&self, state: &mut i64, action: i64, _env: &()) -> Effects<i64> {
    ///         *state += action;
    ///         smallvec![Effect::None]
    ///     }
    /// }
    ///
    /// let mut state = 1;
    /// Counter.reduce(&mut state, 41, &());
    /// assert_eq!(state, 42);
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// Updates `state` in place and returns effect descriptions for a
        /// host runtime to execute.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Effects<Self::Action>;
    }

    /// A reducer with a side channel for actions it cannot process itself
    ///
    /// Besides effects, each application returns an ordered list of
    /// [`Extra`](ExtraReducer::Extra) values that an outer caller is
    /// expected to handle. Typical use is a child feature forwarding
    /// navigation or session events to its parent.
    pub trait ExtraReducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// Work deferred to the outer caller
        type Extra;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes, effects, and extras
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> (Effects<Self::Action>, Vec<Self::Extra>);
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by a host runtime.
/// They are values (not execution) and are merged with [`Batch`].
pub mod effect {
    use smallvec::{Array, SmallVec};
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// Effects returned by a single reducer application
    pub type Effects<Action> = SmallVec<[Effect<Action>; 4]>;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed by this crate. They are descriptions of what
    /// should happen, returned from reducers and executed by the host.
    #[allow(missing_docs)]
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Run effects sequentially
        Sequential(Vec<Effect<Action>>),

        /// Delayed action (for timeouts, retries)
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Dispatch `action` after `duration`
        #[must_use]
        pub fn delay(duration: Duration, action: Action) -> Effect<Action> {
            Effect::Delay {
                duration,
                action: Box::new(action),
            }
        }

        /// Whether this effect does nothing when executed
        #[must_use]
        pub fn is_none(&self) -> bool {
            match self {
                Effect::None => true,
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    effects.iter().all(Effect::is_none)
                },
                Effect::Delay { .. } | Effect::Future(_) => false,
            }
        }
    }

    /// Associative merge of deferred work
    ///
    /// Laws every implementation upholds:
    ///
    /// - `Self::none().batch(x) == x` and `x.batch(Self::none()) == x`
    /// - `a.batch(b).batch(c) == a.batch(b.batch(c))`
    /// - no sub-effect is dropped, duplicated, or reordered
    ///
    /// Merging never executes anything.
    pub trait Batch: Sized {
        /// The identity element
        #[must_use]
        fn none() -> Self;

        /// Append `other` after `self`
        #[must_use]
        fn batch(self, other: Self) -> Self;

        /// Left-to-right fold of `items` onto [`Batch::none`]
        #[must_use]
        fn batch_all<I>(items: I) -> Self
        where
            I: IntoIterator<Item = Self>,
        {
            items.into_iter().fold(Self::none(), Self::batch)
        }
    }

    /// `None` is the identity; everything else is flattened into one
    /// top-level `Parallel` so grouping never changes the result.
    impl<Action> Batch for Effect<Action> {
        fn none() -> Self {
            Effect::None
        }

        fn batch(self, other: Self) -> Self {
            match (self, other) {
                (Effect::None, effect) | (effect, Effect::None) => effect,
                (Effect::Parallel(mut left), Effect::Parallel(right)) => {
                    left.extend(right);
                    Effect::Parallel(left)
                },
                (Effect::Parallel(mut left), effect) => {
                    left.push(effect);
                    Effect::Parallel(left)
                },
                (effect, Effect::Parallel(right)) => {
                    let mut merged = Vec::with_capacity(right.len() + 1);
                    merged.push(effect);
                    merged.extend(right);
                    Effect::Parallel(merged)
                },
                (left, right) => Effect::Parallel(vec![left, right]),
            }
        }
    }

    impl<A: Array> Batch for SmallVec<A> {
        fn none() -> Self {
            SmallVec::new()
        }

        fn batch(mut self, other: Self) -> Self {
            self.extend(other);
            self
        }
    }

    impl<T> Batch for Vec<T> {
        fn none() -> Self {
            Vec::new()
        }

        fn batch(mut self, mut other: Self) -> Self {
            self.append(&mut other);
            self
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use proptest::prelude::*;

        fn debug<A: std::fmt::Debug>(effect: &Effect<A>) -> String {
            format!("{effect:?}")
        }

        fn leaf(n: u8) -> Effect<u8> {
            Effect::delay(Duration::ZERO, n)
        }

        /// Plain description of an effect so proptest can build it twice.
        #[derive(Clone, Debug)]
        enum Shape {
            None,
            Leaf(u8),
            Parallel(Vec<u8>),
            Sequential(Vec<u8>),
        }

        fn build(shape: &Shape) -> Effect<u8> {
            match shape {
                Shape::None => Effect::None,
                Shape::Leaf(n) => leaf(*n),
                Shape::Parallel(ns) => Effect::Parallel(ns.iter().copied().map(leaf).collect()),
                Shape::Sequential(ns) => Effect::Sequential(ns.iter().copied().map(leaf).collect()),
            }
        }

        fn arb_shape() -> impl Strategy<Value = Shape> {
            prop_oneof![
                Just(Shape::None),
                any::<u8>().prop_map(Shape::Leaf),
                prop::collection::vec(any::<u8>(), 0..4).prop_map(Shape::Parallel),
                prop::collection::vec(any::<u8>(), 0..4).prop_map(Shape::Sequential),
            ]
        }

        fn effects(ns: &[u8]) -> Effects<u8> {
            ns.iter().copied().map(leaf).collect()
        }

        #[test]
        fn test_none_is_identity() {
            assert_eq!(debug(&Effect::none().batch(leaf(1))), debug(&leaf(1)));
            assert_eq!(debug(&leaf(1).batch(Effect::none())), debug(&leaf(1)));
        }

        #[test]
        fn test_batch_flattens_parallel() {
            let merged = Effect::Parallel(vec![leaf(1), leaf(2)])
                .batch(leaf(3))
                .batch(Effect::Parallel(vec![leaf(4)]));

            let expected = Effect::Parallel(vec![leaf(1), leaf(2), leaf(3), leaf(4)]);
            assert_eq!(debug(&merged), debug(&expected));
        }

        #[test]
        fn test_batch_keeps_sequential_intact() {
            let merged = Effect::chain(vec![leaf(1), leaf(2)]).batch(leaf(3));

            let expected = Effect::Parallel(vec![Effect::chain(vec![leaf(1), leaf(2)]), leaf(3)]);
            assert_eq!(debug(&merged), debug(&expected));
        }

        #[test]
        fn test_batch_all_preserves_order() {
            let merged: Effects<u8> = Batch::batch_all(vec![
                SmallVec::from_vec(vec![leaf(1)]),
                SmallVec::new(),
                SmallVec::from_vec(vec![leaf(2), leaf(3)]),
            ]);

            let order: Vec<String> = merged.iter().map(debug).collect();
            assert_eq!(order, vec![debug(&leaf(1)), debug(&leaf(2)), debug(&leaf(3))]);
        }

        #[test]
        fn test_is_none() {
            assert!(Effect::<u8>::None.is_none());
            assert!(Effect::<u8>::Parallel(vec![Effect::None, Effect::chain(vec![])]).is_none());
            assert!(!Effect::Parallel(vec![Effect::None, leaf(1)]).is_none());
        }

        proptest! {
            #[test]
            fn prop_effect_batch_is_associative(a in arb_shape(), b in arb_shape(), c in arb_shape()) {
                let left = build(&a).batch(build(&b)).batch(build(&c));
                let right = build(&a).batch(build(&b).batch(build(&c)));
                prop_assert_eq!(debug(&left), debug(&right));
            }

            #[test]
            fn prop_effect_batch_identity(a in arb_shape()) {
                prop_assert_eq!(debug(&Effect::none().batch(build(&a))), debug(&build(&a)));
                prop_assert_eq!(debug(&build(&a).batch(Effect::none())), debug(&build(&a)));
            }

            #[test]
            fn prop_effects_batch_is_associative(
                a in prop::collection::vec(any::<u8>(), 0..4),
                b in prop::collection::vec(any::<u8>(), 0..4),
                c in prop::collection::vec(any::<u8>(), 0..4),
            ) {
                let left = effects(&a).batch(effects(&b)).batch(effects(&c));
                let right = effects(&a).batch(effects(&b).batch(effects(&c)));
                let flat: Vec<u8> = a.iter().chain(&b).chain(&c).copied().collect();
                prop_assert_eq!(format!("{left:?}"), format!("{right:?}"));
                prop_assert_eq!(format!("{left:?}"), format!("{:?}", effects(&flat)));
            }
        }
    }
}
