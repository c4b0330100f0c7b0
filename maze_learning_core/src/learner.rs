//! Episodic Q-learning driver

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    Position,
    agent::{ActionSelector, EpsilonGreedy},
    environment::{Maze, Status},
    table::QTable,
};

/// Hyperparameters of one training run.
///
/// Values are used as given; nothing is range-checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub episodes: usize,
    /// Step size α of the temporal-difference update.
    pub learning_rate: f64,
    /// Factor applied to the exploration rate after every episode.
    pub exploration_decay: f64,
    /// Initial probability ε of taking a random action.
    pub exploration_rate: f64,
    /// Discount γ applied to the best next value.
    pub discount_rate: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 1000,
            learning_rate: 0.1,
            exploration_decay: 0.995,
            exploration_rate: 0.1,
            discount_rate: 0.9,
        }
    }
}

/// Per-episode records of a training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainingHistory {
    /// Total reward of each episode.
    pub rewards: Vec<f64>,
    /// Visited states of each episode, from the start cell to the terminal state.
    pub states: Vec<Vec<Position>>,
    /// Whether each episode ended on the exit.
    pub wins: Vec<bool>,
    /// Exploration rate after the last decay.
    pub final_exploration_rate: f64,
}

impl TrainingHistory {
    pub fn episodes(&self) -> usize {
        self.rewards.len()
    }

    pub fn win_count(&self) -> usize {
        self.wins.iter().filter(|won| **won).count()
    }

    pub fn win_rate(&self) -> f64 {
        if self.wins.is_empty() {
            0.0
        } else {
            self.win_count() as f64 / self.wins.len() as f64
        }
    }

    /// State trace of the last episode.
    pub fn last_path(&self) -> Option<&[Position]> {
        self.states.last().map(Vec::as_slice)
    }
}

/// Outcome of following the greedy policy from the start cell.
#[derive(Debug, Clone, PartialEq)]
pub struct GreedyRun {
    pub path: Vec<Position>,
    pub status: Status,
    pub total_reward: f64,
}

struct Episode {
    reward: f64,
    states: Vec<Position>,
    status: Status,
}

/// Tabular Q-learning agent bound to one maze.
///
/// The value table lives as long as the learner, so consecutive calls to
/// [`QLearner::train`] keep refining the same estimates.
#[derive(Debug, Clone)]
pub struct QLearner<S = EpsilonGreedy> {
    maze: Maze,
    table: QTable,
    selector: S,
}

impl QLearner<EpsilonGreedy> {
    /// Creates a learner with a seeded epsilon-greedy policy.
    pub fn new(maze: Maze, seed: u64) -> Self {
        Self::with_selector(maze, EpsilonGreedy::new(seed))
    }
}

impl<S: ActionSelector> QLearner<S> {
    pub fn with_selector(maze: Maze, selector: S) -> Self {
        Self {
            maze,
            table: QTable::new(),
            selector,
        }
    }

    /// Runs `config.episodes` episodes, updating the table after every step.
    ///
    /// The exploration rate starts at `config.exploration_rate` and is
    /// multiplied by `config.exploration_decay` after each episode.
    pub fn train(&mut self, config: &TrainingConfig) -> TrainingHistory {
        info!(
            "Training for {} episodes (alpha={}, epsilon={}, decay={}, gamma={})",
            config.episodes,
            config.learning_rate,
            config.exploration_rate,
            config.exploration_decay,
            config.discount_rate
        );

        let mut history = TrainingHistory {
            rewards: Vec::with_capacity(config.episodes),
            states: Vec::with_capacity(config.episodes),
            wins: Vec::with_capacity(config.episodes),
            final_exploration_rate: config.exploration_rate,
        };
        let mut exploration_rate = config.exploration_rate;

        for episode_number in 1..=config.episodes {
            let episode = self.run_episode(
                exploration_rate,
                config.learning_rate,
                config.discount_rate,
            );
            debug!(
                episode = episode_number,
                status = ?episode.status,
                reward = episode.reward,
                steps = episode.states.len() - 1,
                "Episode finished"
            );

            history.rewards.push(episode.reward);
            history.wins.push(episode.status == Status::Won);
            history.states.push(episode.states);

            exploration_rate *= config.exploration_decay;
        }
        history.final_exploration_rate = exploration_rate;

        info!(
            "Training finished: {} of {} episodes won, table holds {} entries",
            history.win_count(),
            history.episodes(),
            self.table.len()
        );
        history
    }

    fn run_episode(
        &mut self,
        exploration_rate: f64,
        learning_rate: f64,
        discount_rate: f64,
    ) -> Episode {
        let mut state = self.maze.reset();
        let mut states = vec![state];
        let mut reward = 0.0;

        loop {
            let action = self
                .selector
                .select_action(&self.table, state, exploration_rate);
            let outcome = self.maze.step(action);

            self.table.q_learning_update(
                state,
                action,
                outcome.reward,
                outcome.state,
                learning_rate,
                discount_rate,
            );

            reward += outcome.reward;
            states.push(outcome.state);

            if outcome.status.is_terminal() {
                return Episode {
                    reward,
                    states,
                    status: outcome.status,
                };
            }
            state = outcome.state;
        }
    }

    /// Follows the best-valued action from the start cell without learning.
    ///
    /// Stops at a terminal status or after `max_steps` steps.
    pub fn greedy_path(&mut self, max_steps: usize) -> GreedyRun {
        let mut state = self.maze.reset();
        let mut path = vec![state];
        let mut status = Status::Ongoing;

        for _ in 0..max_steps {
            let outcome = self.maze.step(self.table.best_action(state));
            path.push(outcome.state);
            status = outcome.status;
            if status.is_terminal() {
                break;
            }
            state = outcome.state;
        }

        GreedyRun {
            path,
            status,
            total_reward: self.maze.total_reward(),
        }
    }

    /// Forgets every value estimate.
    pub fn reset_table(&mut self) {
        self.table.clear();
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }
    pub fn maze(&self) -> &Maze {
        &self.maze
    }
    pub fn selector(&self) -> &S {
        &self.selector
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{Action, map::Grid};

    fn open_maze(rows: usize, cols: usize) -> Maze {
        Maze::new(Grid::new(rows, cols).unwrap()).unwrap()
    }

    /// Always plays the same sequence of actions, cycling when exhausted.
    struct Scripted {
        actions: Vec<Action>,
        next: usize,
    }

    impl ActionSelector for Scripted {
        fn select_action(&mut self, _: &QTable, _: Position, _: f64) -> Action {
            let action = self.actions[self.next % self.actions.len()];
            self.next += 1;
            action
        }
    }

    #[test]
    fn default_config_matches_documented_values() {
        let config = TrainingConfig::default();
        assert_eq!(config.episodes, 1000);
        assert_relative_eq!(config.learning_rate, 0.1);
        assert_relative_eq!(config.exploration_decay, 0.995);
        assert_relative_eq!(config.exploration_rate, 0.1);
        assert_relative_eq!(config.discount_rate, 0.9);
    }

    #[test]
    fn scripted_episode_records_trace_and_win() {
        let selector = Scripted {
            actions: vec![Action::Right, Action::Down],
            next: 0,
        };
        let mut learner = QLearner::with_selector(open_maze(2, 2), selector);
        let config = TrainingConfig {
            episodes: 2,
            ..TrainingConfig::default()
        };
        let history = learner.train(&config);

        assert_eq!(history.episodes(), 2);
        assert_eq!(history.wins, vec![true, true]);
        assert_eq!(
            history.states[0],
            vec![Position::new(0, 0), Position::new(0, 1), Position::new(1, 1)]
        );
        assert_relative_eq!(history.rewards[0], 9.95);
        assert_eq!(learner.table().len(), 2);
        // Right from the start: 0.1 * (-0.05 + 0.9 * 0) in the first episode
        // and 0.1 * (-0.05 + 0.9 * 1.0 - (-0.005)) added in the second.
        assert_relative_eq!(
            learner.table().get(Position::new(0, 0), Action::Right),
            -0.005 + 0.1 * (-0.05 + 0.9 * 1.0 + 0.005)
        );
    }

    #[test]
    fn table_persists_between_training_calls() {
        let mut learner = QLearner::new(open_maze(3, 3), 3);
        let config = TrainingConfig {
            episodes: 20,
            ..TrainingConfig::default()
        };
        learner.train(&config);
        let after_first = learner.table().clone();
        assert!(!after_first.is_empty());
        learner.train(&config);
        assert!(learner.table().len() >= after_first.len());

        learner.reset_table();
        assert!(learner.table().is_empty());
    }

    #[test]
    fn greedy_path_does_not_learn() {
        let mut learner = QLearner::new(open_maze(2, 2), 0);
        let run = learner.greedy_path(10);
        assert!(learner.table().is_empty());
        // All values tie at zero, so the policy keeps pushing Left into the edge
        assert!(run.path.iter().all(|p| *p == Position::new(0, 0)));
        assert_eq!(run.status, Status::Lost);
        assert_eq!(run.path.len(), 4);
    }

    #[test]
    fn greedy_path_follows_learned_values() {
        let mut learner = QLearner::new(open_maze(2, 2), 0);
        learner.table.set(Position::new(0, 0), Action::Down, 1.0);
        learner.table.set(Position::new(1, 0), Action::Right, 1.0);
        let run = learner.greedy_path(10);
        assert_eq!(
            run.path,
            vec![Position::new(0, 0), Position::new(1, 0), Position::new(1, 1)]
        );
        assert_eq!(run.status, Status::Won);
        assert_relative_eq!(run.total_reward, 9.95);
    }

    #[test]
    fn history_statistics() {
        let history = TrainingHistory {
            rewards: vec![1.0, -2.0, 3.0, 4.0],
            states: vec![vec![Position::new(0, 0)]; 4],
            wins: vec![true, false, true, true],
            final_exploration_rate: 0.0,
        };
        assert_eq!(history.win_count(), 3);
        assert_relative_eq!(history.win_rate(), 0.75);
        assert_eq!(history.last_path(), Some(&[Position::new(0, 0)][..]));
        assert_eq!(TrainingHistory::default().win_rate(), 0.0);
    }
}
