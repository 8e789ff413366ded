//! Derived-action fixpoint loop
//!
//! [`and_then_fetch`] turns a reducer and a pure [`Derive`] function into a
//! reducer of the same shape. After the incoming action is applied, derive
//! is asked what the resulting state still needs; its answer is applied as
//! one batch and derive is asked again, until it answers with nothing.
//!
//! The loop is a two-state machine:
//!
//! - **Draining**: derive returned actions. Sequence all of them, then query again.
//! - **Settled**: derive returned nothing. Return the accumulated effects.
//!
//! Derive is never queried mid-batch. If it returns `[a, b, c]`, `b` sees the
//! state `a` produced, but derive only sees the state after `c`. A call that
//! drains `n` batches therefore queries derive exactly `n + 1` times.
//!
//! # Termination
//!
//! Derive must be *idempotent under its own resolution*: once an action it
//! proposed has been applied, the updated state must stop proposing it. The
//! usual technique is for the reducer to record "requested" in state as soon
//! as it handles a fetch action, before the effect that performs the fetch
//! ever runs. A derive function that keeps proposing work loops forever
//! unless a [`FetchConfig::bounded`] cap is installed.
//!
//! # Example
//!
//! ```
//! use fetchloop_core::{Effect, Effects, Reducer, smallvec};
//! use fetchloop_core::fetch::and_then_fetch;
//!
//! #[derive(Default)]
//! struct Profile {
//!     user: Option<u32>,
//!     avatar_requested: bool,
//! }
//!
//! enum Action {
//!     SelectUser(u32),
//!     FetchAvatar(u32),
//! }
//!
//! struct ProfileReducer;
//!
//! impl Reducer for ProfileReducer {
//!     type State = Profile;
//!     type Action = Action;
//!     type Environment = ();
//!
//!     fn reduce(&self, state: &mut Profile, action: Action, _env: &()) -> Effects<Action> {
//!         match action {
//!             Action::SelectUser(id) => {
//!                 state.user = Some(id);
//!                 state.avatar_requested = false;
//!                 smallvec![Effect::None]
//!             },
//!             Action::FetchAvatar(_id) => {
//!                 // Recorded before the fetch runs, so derive stops asking.
//!                 state.avatar_requested = true;
//!                 smallvec![Effect::Future(Box::pin(async { None }))]
//!             },
//!         }
//!     }
//! }
//!
//! let reducer = and_then_fetch(
//!     |state: &Profile| match state.user {
//!         Some(id) if !state.avatar_requested => vec![Action::FetchAvatar(id)],
//!         _ => vec![],
//!     },
//!     ProfileReducer,
//! );
//!
//! let mut state = Profile::default();
//! let effects = reducer.reduce(&mut state, Action::SelectUser(7), &());
//!
//! assert!(state.avatar_requested);
//! assert_eq!(effects.len(), 2);
//! ```

use crate::config::FetchConfig;
use crate::effect::{Batch, Effects};
use crate::error::{FixpointError, Interrupted};
use crate::reducer::{ExtraReducer, Reducer};
use crate::sequence::{sequence, sequence_extra_in_place};

/// Pure function from state to the follow-up actions that state requires
///
/// Implemented for every `Fn(&S) -> Vec<A>`, so closures and plain
/// functions can be passed to [`and_then_fetch`] directly.
pub trait Derive<S, A> {
    /// Actions the current state still needs, in the order to apply them
    fn derive(&self, state: &S) -> Vec<A>;
}

impl<S, A, F> Derive<S, A> for F
where
    F: Fn(&S) -> Vec<A>,
{
    fn derive(&self, state: &S) -> Vec<A> {
        self(state)
    }
}

/// Wraps `reducer` so every call also drains the actions `derive` proposes
///
/// The result implements [`Reducer`] when `reducer` does, and
/// [`ExtraReducer`] when `reducer` does, so it can be wired in anywhere the
/// base reducer was.
#[must_use]
pub fn and_then_fetch<R, D>(derive: D, reducer: R) -> FetchReducer<R, D> {
    FetchReducer {
        reducer,
        derive,
        config: FetchConfig::default(),
    }
}

/// A reducer that settles derived actions before returning.
///
/// Created by [`and_then_fetch`].
#[derive(Clone)]
pub struct FetchReducer<R, D> {
    reducer: R,
    derive: D,
    config: FetchConfig,
}

impl<R, D> FetchReducer<R, D> {
    /// Install an iteration cap
    #[must_use]
    pub fn with_config(mut self, config: FetchConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration
    #[must_use]
    pub const fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// The derive function
    #[must_use]
    pub const fn derive(&self) -> &D {
        &self.derive
    }

    /// Query derive until it answers with nothing, handing each batch to `drain`.
    ///
    /// Returns the number of batches drained.
    fn settle<S, A>(
        &self,
        state: &mut S,
        mut drain: impl FnMut(&mut S, Vec<A>),
    ) -> Result<usize, FixpointError>
    where
        D: Derive<S, A>,
    {
        let mut batches = 0usize;

        loop {
            let derived = self.derive.derive(state);
            if derived.is_empty() {
                tracing::debug!(batches, "Fixpoint settled");
                return Ok(batches);
            }

            if let Some(max_iterations) = self.config.max_iterations {
                if batches >= max_iterations {
                    return Err(FixpointError::NotSettled {
                        max_iterations,
                        pending: derived.len(),
                    });
                }
            }

            batches += 1;
            tracing::trace!(batch = batches, actions = derived.len(), "Draining derived actions");
            drain(state, derived);
        }
    }
}

impl<R, D> FetchReducer<R, D>
where
    R: Reducer,
    D: Derive<R::State, R::Action>,
{
    /// Apply `action`, then drain derived actions until settled
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] carrying [`FixpointError::NotSettled`] if a
    /// configured iteration cap is reached while derive still proposes
    /// actions. `state` keeps every batch applied before that point, and the
    /// error's `output` holds the effects those batches produced.
    pub fn try_reduce(
        &self,
        state: &mut R::State,
        action: R::Action,
        env: &R::Environment,
    ) -> Result<Effects<R::Action>, Interrupted<Effects<R::Action>>> {
        self.run(state, action, env)
    }

    #[tracing::instrument(skip_all, name = "fetch_reduce")]
    fn run(
        &self,
        state: &mut R::State,
        action: R::Action,
        env: &R::Environment,
    ) -> Result<Effects<R::Action>, Interrupted<Effects<R::Action>>> {
        let mut effects = self.reducer.reduce(state, action, env);

        let settled = self.settle(state, |state: &mut R::State, derived: Vec<R::Action>| {
            let drained = sequence(&self.reducer, state, derived, env);
            effects = std::mem::take(&mut effects).batch(drained);
        });

        match settled {
            Ok(_) => Ok(effects),
            Err(error) => Err(Interrupted {
                output: effects,
                error,
            }),
        }
    }
}

impl<R, D> Reducer for FetchReducer<R, D>
where
    R: Reducer,
    D: Derive<R::State, R::Action>,
{
    type State = R::State;
    type Action = R::Action;
    type Environment = R::Environment;

    /// Infallible form of [`FetchReducer::try_reduce`]
    ///
    /// When the iteration cap trips, the error is logged and the effects
    /// accumulated so far are returned.
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects<Self::Action> {
        match self.run(state, action, env) {
            Ok(effects) => effects,
            Err(interrupted) => {
                let (effects, error) = interrupted.into_parts();
                tracing::error!(%error, "Abandoning derived actions");
                effects
            },
        }
    }
}

impl<R, D> FetchReducer<R, D>
where
    R: ExtraReducer,
    D: Derive<R::State, R::Action>,
{
    /// Side-channel form of [`FetchReducer::try_reduce`]
    ///
    /// Extras from the incoming action come first, followed by the extras of
    /// every derived action in drain order.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] carrying [`FixpointError::NotSettled`] if a
    /// configured iteration cap is reached while derive still proposes
    /// actions. Its `output` holds the effects and extras gathered so far.
    pub fn try_reduce_extra(
        &self,
        state: &mut R::State,
        action: R::Action,
        env: &R::Environment,
    ) -> Result<(Effects<R::Action>, Vec<R::Extra>), Interrupted<(Effects<R::Action>, Vec<R::Extra>)>>
    {
        self.run_extra(state, action, env)
    }

    #[tracing::instrument(skip_all, name = "fetch_reduce_extra")]
    fn run_extra(
        &self,
        state: &mut R::State,
        action: R::Action,
        env: &R::Environment,
    ) -> Result<(Effects<R::Action>, Vec<R::Extra>), Interrupted<(Effects<R::Action>, Vec<R::Extra>)>>
    {
        let (mut effects, mut extras) = self.reducer.reduce(state, action, env);

        let settled = self.settle(state, |state: &mut R::State, derived: Vec<R::Action>| {
            sequence_extra_in_place(&self.reducer, state, derived, env, &mut effects, &mut extras);
        });

        match settled {
            Ok(_) => Ok((effects, extras)),
            Err(error) => Err(Interrupted {
                output: (effects, extras),
                error,
            }),
        }
    }
}

impl<R, D> ExtraReducer for FetchReducer<R, D>
where
    R: ExtraReducer,
    D: Derive<R::State, R::Action>,
{
    type State = R::State;
    type Action = R::Action;
    type Extra = R::Extra;
    type Environment = R::Environment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> (Effects<Self::Action>, Vec<Self::Extra>) {
        match self.run_extra(state, action, env) {
            Ok(output) => output,
            Err(interrupted) => {
                let (output, error) = interrupted.into_parts();
                tracing::error!(%error, "Abandoning derived actions");
                output
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Effect;
    use crate::smallvec;
    use std::cell::Cell;
    use std::time::Duration;

    type Log = Vec<String>;

    /// Prepends every action to the log and echoes it as a delayed effect.
    struct Prepend;

    impl Reducer for Prepend {
        type State = Log;
        type Action = String;
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

    /// `Prepend`, plus every action is reported upward as `"saw:<action>"`.
    struct Reporting;

    impl ExtraReducer for Reporting {
        type State = Log;
        type Action = String;
        type Extra = String;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> (Effects<Self::Action>, Vec<Self::Extra>) {
            let extra = format!("saw:{action}");
            (Reducer::reduce(&Prepend, state, action, env), vec![extra])
        }
    }

    fn has(state: &Log, entry: &str) -> bool {
        state.iter().any(|s| s == entry)
    }

    fn fetches(state: &Log) -> Vec<String> {
        if has(state, "fetch-4") {
            vec![]
        } else if has(state, "fetch-3") {
            vec!["fetch-4".to_string()]
        } else {
            vec!["fetch-1".to_string(), "fetch-2".to_string(), "fetch-3".to_string()]
        }
    }

    fn delayed(effects: &Effects<String>) -> Vec<String> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Delay { action, .. } => Some(action.to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_drains_to_fixpoint() {
        let reducer = and_then_fetch(fetches, Prepend);
        let mut state = Log::new();

        let effects = reducer.reduce(&mut state, "test".to_string(), &());

        assert_eq!(state, vec!["fetch-4", "fetch-3", "fetch-2", "fetch-1", "test"]);
        assert_eq!(
            delayed(&effects),
            vec!["test", "fetch-1", "fetch-2", "fetch-3", "fetch-4"]
        );
    }

    #[test]
    fn test_derive_queried_once_per_batch() {
        let calls = Cell::new(0);
        let seen = std::cell::RefCell::new(Vec::new());
        let reducer = and_then_fetch(
            |state: &Log| {
                calls.set(calls.get() + 1);
                seen.borrow_mut().push(state.len());
                fetches(state)
            },
            Prepend,
        );
        let mut state = Log::new();

        let _ = reducer.reduce(&mut state, "test".to_string(), &());

        assert_eq!(calls.get(), 3);
        // After "test", after the 3-action batch, after "fetch-4".
        assert_eq!(*seen.borrow(), vec![1, 4, 5]);
    }

    #[test]
    fn test_no_derived_actions_matches_base_reducer() {
        let reducer = and_then_fetch(|_: &Log| Vec::<String>::new(), Prepend);
        let mut wrapped = vec!["old".to_string()];
        let mut direct = wrapped.clone();

        let wrapped_effects = reducer.reduce(&mut wrapped, "new".to_string(), &());
        let direct_effects = Prepend.reduce(&mut direct, "new".to_string(), &());

        assert_eq!(wrapped, direct);
        assert_eq!(format!("{wrapped_effects:?}"), format!("{direct_effects:?}"));
    }

    #[test]
    fn test_later_actions_in_batch_see_earlier_state() {
        // "second" only applies if "first" already landed in the same batch.
        struct Guarded;

        impl Reducer for Guarded {
            type State = Log;
            type Action = String;
            type Environment = ();

            fn reduce(&self, state: &mut Log, action: String, env: &()) -> Effects<String> {
                if action == "second" && !has(state, "first") {
                    return Effects::new();
                }
                Prepend.reduce(state, action, env)
            }
        }

        let reducer = and_then_fetch(
            |state: &Log| {
                if has(state, "first") {
                    vec![]
                } else {
                    vec!["first".to_string(), "second".to_string()]
                }
            },
            Guarded,
        );
        let mut state = Log::new();

        let _ = reducer.reduce(&mut state, "go".to_string(), &());

        assert_eq!(state, vec!["second", "first", "go"]);
    }

    #[test]
    fn test_try_reduce_settles_without_cap() {
        let reducer = and_then_fetch(fetches, Prepend);
        let mut state = Log::new();

        let effects = reducer.try_reduce(&mut state, "test".to_string(), &());

        assert!(effects.is_ok());
        assert_eq!(state.len(), 5);
    }

    #[test]
    fn test_iteration_cap_reports_not_settled() {
        let reducer = and_then_fetch(|_: &Log| vec!["again".to_string()], Prepend)
            .with_config(FetchConfig::bounded(3));
        let mut state = Log::new();

        let result = reducer.try_reduce(&mut state, "test".to_string(), &());

        assert_eq!(
            result.err().map(|interrupted| interrupted.error),
            Some(FixpointError::NotSettled {
                max_iterations: 3,
                pending: 1,
            })
        );
        assert_eq!(state, vec!["again", "again", "again", "test"]);
    }

    #[test]
    #[allow(clippy::panic)] // Test code can panic
    fn test_iteration_cap_returns_effects_of_applied_batches() {
        // Every applied load is recorded in state, so its effect must survive.
        let reducer = and_then_fetch(|state: &Log| vec![format!("load-{}", state.len())], Prepend)
            .with_config(FetchConfig::bounded(2));
        let mut state = Log::new();

        let Err(interrupted) = reducer.try_reduce(&mut state, "open".to_string(), &()) else {
            panic!("expected the cap to trip");
        };

        assert_eq!(state, vec!["load-2", "load-1", "open"]);
        assert_eq!(delayed(&interrupted.output), vec!["open", "load-1", "load-2"]);
        assert_eq!(
            interrupted.error,
            FixpointError::NotSettled {
                max_iterations: 2,
                pending: 1,
            }
        );
    }

    #[test]
    fn test_iteration_cap_keeps_effects_on_infallible_path() {
        let reducer = and_then_fetch(|_: &Log| vec!["again".to_string()], Prepend)
            .with_config(FetchConfig::bounded(2));
        let mut state = Log::new();

        let effects = reducer.reduce(&mut state, "test".to_string(), &());

        assert_eq!(delayed(&effects), vec!["test", "again", "again"]);
    }

    #[test]
    fn test_cap_not_hit_when_loop_settles_exactly() {
        // Two batches drained, the third query is empty.
        let reducer = and_then_fetch(fetches, Prepend).with_config(FetchConfig::bounded(2));
        let mut state = Log::new();

        assert!(reducer.try_reduce(&mut state, "test".to_string(), &()).is_ok());
    }

    #[test]
    fn test_long_chain_does_not_grow_the_stack() {
        struct Step;

        impl Reducer for Step {
            type State = u64;
            type Action = u64;
            type Environment = ();

            fn reduce(&self, state: &mut u64, action: u64, _env: &()) -> Effects<u64> {
                *state = action;
                Effects::new()
            }
        }

        let reducer = and_then_fetch(
            |state: &u64| if *state < 200_000 { vec![*state + 1] } else { vec![] },
            Step,
        );
        let mut state = 0;

        let effects = reducer.reduce(&mut state, 1, &());

        assert_eq!(state, 200_000);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_extra_form_accumulates_extras_in_drain_order() {
        let reducer = and_then_fetch(fetches, Reporting);
        let mut state = Log::new();

        let (effects, extras) = ExtraReducer::reduce(&reducer, &mut state, "test".to_string(), &());

        assert_eq!(state, vec!["fetch-4", "fetch-3", "fetch-2", "fetch-1", "test"]);
        assert_eq!(
            extras,
            vec!["saw:test", "saw:fetch-1", "saw:fetch-2", "saw:fetch-3", "saw:fetch-4"]
        );
        assert_eq!(delayed(&effects).len(), 5);
    }

    #[test]
    #[allow(clippy::panic)] // Test code can panic
    fn test_extra_form_respects_cap() {
        let reducer = and_then_fetch(|_: &Log| vec!["again".to_string()], Reporting)
            .with_config(FetchConfig::bounded(1));
        let mut state = Log::new();

        let Err(interrupted) = reducer.try_reduce_extra(&mut state, "test".to_string(), &()) else {
            panic!("expected the cap to trip");
        };
        let ((effects, extras), error) = interrupted.into_parts();

        assert!(matches!(error, FixpointError::NotSettled { max_iterations: 1, .. }));
        assert_eq!(state, vec!["again", "test"]);
        assert_eq!(delayed(&effects), vec!["test", "again"]);
        assert_eq!(extras, vec!["saw:test", "saw:again"]);
    }

    #[test]
    fn test_fetch_reducer_is_shareable() {
        fn assert_send_sync<T: Send + Sync>(_: &T) {}

        let reducer = and_then_fetch(fetches, Prepend);
        assert_send_sync(&reducer);
        assert!(reducer.config().max_iterations.is_none());
    }
}
