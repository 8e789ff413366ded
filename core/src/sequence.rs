//! Ordered application of action lists
//!
//! Both combinators are strict left-to-right folds: action `i + 1` sees the
//! state produced by action `i`, and every effect and extra appears in the
//! same relative order as the action that produced it.
//!
//! # Examples
//!
//! ```
//! use fetchloop_core::{Effects, ExtraReducer, SmallVec};
//! use fetchloop_core::sequence::sequence_extra;
//!
//! /// Adds numbers; forwards negative ones to the parent.
//! struct Tally;
//!
//! impl ExtraReducer for Tally {
//!     type State = i32;
//!     type Action = i32;
//!     type Extra = i32;
//!     type Environment = ();
//!
//!     fn reduce(&self, state: &mut i32, action: i32, _env: &()) -> (Effects<i32>, Vec<i32>) {
//!         if action < 0 {
//!             return (SmallVec::new(), vec![action]);
//!         }
//!         *state += action;
//!         (SmallVec::new(), vec![])
//!     }
//! }
//!
//! let (state, effects, extras) =
//!     sequence_extra(&Tally, [1, -2, 3, -4], (0, SmallVec::new(), vec![]), &());
//!
//! assert_eq!(state, 4);
//! assert!(effects.is_empty());
//! assert_eq!(extras, vec![-2, -4]);
//! ```

use crate::effect::{Batch, Effects};
use crate::reducer::{ExtraReducer, Reducer};

/// Applies `actions` to `state` in order and returns their merged effects
///
/// With no actions, `state` is untouched and the result is empty.
pub fn sequence<R, I>(
    reducer: &R,
    state: &mut R::State,
    actions: I,
    env: &R::Environment,
) -> Effects<R::Action>
where
    R: Reducer + ?Sized,
    I: IntoIterator<Item = R::Action>,
{
    actions.into_iter().fold(Effects::none(), |effects, action| {
        effects.batch(reducer.reduce(state, action, env))
    })
}

/// Applies `actions` in order, threading state, effects, and extras
///
/// The result is `start` with every action folded in: effects are
/// `start.1` batched with each action's effects, extras are `start.2`
/// followed by each action's extras. An empty `actions` returns `start`
/// unchanged.
pub fn sequence_extra<R, I>(
    reducer: &R,
    actions: I,
    start: (R::State, Effects<R::Action>, Vec<R::Extra>),
    env: &R::Environment,
) -> (R::State, Effects<R::Action>, Vec<R::Extra>)
where
    R: ExtraReducer + ?Sized,
    I: IntoIterator<Item = R::Action>,
{
    let (mut state, mut effects, mut extras) = start;
    sequence_extra_in_place(reducer, &mut state, actions, env, &mut effects, &mut extras);
    (state, effects, extras)
}

/// [`sequence_extra`] over borrowed accumulators.
pub(crate) fn sequence_extra_in_place<R, I>(
    reducer: &R,
    state: &mut R::State,
    actions: I,
    env: &R::Environment,
    effects: &mut Effects<R::Action>,
    extras: &mut Vec<R::Extra>,
) where
    R: ExtraReducer + ?Sized,
    I: IntoIterator<Item = R::Action>,
{
    for action in actions {
        let (produced, deferred) = reducer.reduce(state, action, env);
        *effects = std::mem::take(effects).batch(produced);
        extras.extend(deferred);
    }
}
