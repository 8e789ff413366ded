//! A minimal effect-executing host loop.
//!
//! Runs every effect in order on the current task. `Parallel` groups are
//! not run concurrently; that is enough for a demo and keeps the action
//! order deterministic.

use fetchloop_core::{Effect, Reducer};
use std::collections::VecDeque;

/// Send `action`, then keep executing effects and feeding their actions
/// back until nothing is left
///
/// Returns how many actions were reduced.
pub async fn run_until_idle<R>(
    reducer: &R,
    state: &mut R::State,
    env: &R::Environment,
    action: R::Action,
) -> usize
where
    R: Reducer,
    R::Action: std::fmt::Debug,
{
    let mut queue = VecDeque::from([action]);
    let mut processed = 0;

    while let Some(action) = queue.pop_front() {
        processed += 1;
        tracing::debug!(?action, "Processing action");

        let mut leaves = Vec::new();
        flatten(reducer.reduce(state, action, env), &mut leaves);
        tracing::trace!("Executing {} effects", leaves.len());

        for effect in leaves {
            match effect {
                Effect::Future(future) => {
                    if let Some(next) = future.await {
                        queue.push_back(next);
                    }
                },
                Effect::Delay { duration, action } => {
                    tokio::time::sleep(duration).await;
                    queue.push_back(*action);
                },
                Effect::None | Effect::Parallel(_) | Effect::Sequential(_) => {},
            }
        }
    }

    tracing::debug!(processed, "Host idle");
    processed
}

/// Depth-first, in-order list of the effects that actually do something.
fn flatten<A>(effects: impl IntoIterator<Item = Effect<A>>, out: &mut Vec<Effect<A>>) {
    for effect in effects {
        match effect {
            Effect::None => {},
            Effect::Parallel(inner) | Effect::Sequential(inner) => flatten(inner, out),
            leaf => out.push(leaf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_flatten_keeps_order_and_drops_none() {
        let effects = vec![
            Effect::delay(Duration::ZERO, 1),
            Effect::None,
            Effect::Parallel(vec![
                Effect::delay(Duration::ZERO, 2),
                Effect::chain(vec![Effect::None, Effect::delay(Duration::ZERO, 3)]),
            ]),
        ];
        let mut out = Vec::new();

        flatten(effects, &mut out);

        let actions: Vec<i32> = out
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::Delay { action, .. } => Some(*action),
                _ => None,
            })
            .collect();
        assert_eq!(actions, vec![1, 2, 3]);
    }
}
