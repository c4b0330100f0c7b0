use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{Action, Position, table::QTable};

/// Trait defining how the learner picks the next action.
pub trait ActionSelector {
    /// Chooses an action for `state` given the current value estimates.
    /// `exploration_rate` is the probability of ignoring the estimates.
    fn select_action(&mut self, table: &QTable, state: Position, exploration_rate: f64) -> Action;
}

/// Epsilon-greedy selection.
///
/// Explores with a uniformly random action from all four directions, even
/// ones that would bump into a wall, and otherwise exploits the best-valued
/// action.
#[derive(Debug, Clone)]
pub struct EpsilonGreedy {
    rng: StdRng,
}

impl EpsilonGreedy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeds the generator from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl ActionSelector for EpsilonGreedy {
    fn select_action(&mut self, table: &QTable, state: Position, exploration_rate: f64) -> Action {
        if self.rng.random::<f64>() < exploration_rate {
            Action::ALL[self.rng.random_range(0..Action::ALL.len())]
        } else {
            table.best_action(state)
        }
    }
}
