use clap::ValueEnum;
use maze_learning_core::{
    agent::ActionSelector,
    environment::RewardConfig,
    learner::{QLearner, TrainingConfig, TrainingHistory},
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Contents of a `--config` file. Missing fields keep their defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub training: TrainingConfig,
    pub rewards: RewardConfig,
}

/// Hyperparameter varied by a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepKind {
    ExplorationRate,
    LearningRate,
    DiscountRate,
}

impl SweepKind {
    /// Values tried by the sweep, in the order they are trained.
    pub fn values(self) -> &'static [f64] {
        match self {
            SweepKind::ExplorationRate => &[0.05, 0.2, 0.5],
            SweepKind::LearningRate => &[0.005, 0.05, 0.1],
            SweepKind::DiscountRate => &[0.1, 0.9, 0.7],
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            SweepKind::ExplorationRate => "ε",
            SweepKind::LearningRate => "α",
            SweepKind::DiscountRate => "γ",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            SweepKind::ExplorationRate => "Exploration rate",
            SweepKind::LearningRate => "Learning rate",
            SweepKind::DiscountRate => "Discount rate",
        }
    }

    fn apply(self, base: &TrainingConfig, value: f64) -> TrainingConfig {
        let mut config = *base;
        match self {
            SweepKind::ExplorationRate => config.exploration_rate = value,
            SweepKind::LearningRate => config.learning_rate = value,
            SweepKind::DiscountRate => config.discount_rate = value,
        }
        config
    }
}

/// Which sweeps the command line asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SweepSelection {
    /// Exploration, learning and discount rate sweeps in that order
    All,
    Epsilon,
    Alpha,
    Gamma,
    /// A single run with the base configuration
    None,
}

impl SweepSelection {
    pub fn kinds(self) -> Vec<SweepKind> {
        match self {
            SweepSelection::All => vec![
                SweepKind::ExplorationRate,
                SweepKind::LearningRate,
                SweepKind::DiscountRate,
            ],
            SweepSelection::Epsilon => vec![SweepKind::ExplorationRate],
            SweepSelection::Alpha => vec![SweepKind::LearningRate],
            SweepSelection::Gamma => vec![SweepKind::DiscountRate],
            SweepSelection::None => vec![],
        }
    }
}

/// One training run inside a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepRun {
    pub label: String,
    pub config: TrainingConfig,
    /// Table entries after this run.
    pub table_size: usize,
    pub history: TrainingHistory,
}

/// A group of runs shown together on one chart.
#[derive(Debug, Clone, Serialize)]
pub struct SweepResult {
    pub title: String,
    pub kind: Option<SweepKind>,
    pub runs: Vec<SweepRun>,
}

/// Trains `learner` once per sweep value.
///
/// Unless `fresh_table` is set, every run continues from the table left by
/// the previous one.
pub fn run_sweeps<S: ActionSelector>(
    learner: &mut QLearner<S>,
    selection: SweepSelection,
    base: &TrainingConfig,
    fresh_table: bool,
) -> Vec<SweepResult> {
    let kinds = selection.kinds();
    if kinds.is_empty() {
        let run = train_once(learner, "base".to_string(), *base, fresh_table);
        return vec![SweepResult {
            title: "Base configuration".to_string(),
            kind: None,
            runs: vec![run],
        }];
    }

    kinds
        .into_iter()
        .map(|kind| {
            info!("Sweeping {}", kind.title().to_lowercase());
            let runs = kind
                .values()
                .iter()
                .map(|&value| {
                    let label = format!("{}={}", kind.symbol(), value);
                    train_once(learner, label, kind.apply(base, value), fresh_table)
                })
                .collect();
            SweepResult {
                title: kind.title().to_string(),
                kind: Some(kind),
                runs,
            }
        })
        .collect()
}

fn train_once<S: ActionSelector>(
    learner: &mut QLearner<S>,
    label: String,
    config: TrainingConfig,
    fresh_table: bool,
) -> SweepRun {
    if fresh_table {
        learner.reset_table();
    }
    info!("Run {label}");
    let history = learner.train(&config);
    SweepRun {
        label,
        config,
        table_size: learner.table().len(),
        history,
    }
}

#[cfg(test)]
mod tests {
    use maze_learning_core::{environment::Maze, map::Grid};

    use super::*;

    fn learner() -> QLearner {
        QLearner::new(Maze::new(Grid::new(3, 3).unwrap()).unwrap(), 1)
    }

    fn short() -> TrainingConfig {
        TrainingConfig {
            episodes: 10,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn all_selection_runs_three_sweeps_of_three() {
        let results = run_sweeps(&mut learner(), SweepSelection::All, &short(), false);
        assert_eq!(results.len(), 3);
        for result in &results {
            assert_eq!(result.runs.len(), 3);
            assert!(result.runs.iter().all(|run| run.history.episodes() == 10));
        }
        assert_eq!(results[0].runs[1].label, "ε=0.2");
        assert_eq!(results[2].runs[0].config.discount_rate, 0.1);
        assert_eq!(results[1].runs[0].config.learning_rate, 0.005);
        assert_eq!(results[1].runs[0].config.exploration_rate, 0.1);
    }

    #[test]
    fn none_selection_runs_base_config_once() {
        let results = run_sweeps(&mut learner(), SweepSelection::None, &short(), false);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].kind, None);
        assert_eq!(results[0].runs[0].config, short());
    }

    #[test]
    fn shared_table_accumulates_unless_fresh() {
        let mut shared = learner();
        let results = run_sweeps(&mut shared, SweepSelection::Alpha, &short(), false);
        let sizes: Vec<usize> = results[0].runs.iter().map(|r| r.table_size).collect();
        assert!(sizes.windows(2).all(|w| w[0] <= w[1]));

        let mut fresh = learner();
        fresh.train(&short());
        let results = run_sweeps(&mut fresh, SweepSelection::Epsilon, &short(), true);
        // Only the last run's entries survive
        assert_eq!(fresh.table().len(), results[0].runs[2].table_size);
        assert!(results[0].runs[0].table_size <= 36);
    }

    #[test]
    fn partial_config_file_keeps_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{ "training": { "episodes": 25 }, "rewards": { "reward_exit": 1.0 } }"#)
                .unwrap();
        assert_eq!(config.training.episodes, 25);
        assert_eq!(config.training.learning_rate, 0.1);
        assert_eq!(config.rewards.reward_exit, 1.0);
        assert_eq!(config.rewards.penalty_per_step, -0.05);
    }
}
