use approx::assert_relative_eq;
use maze_learning_core::{
    Action, Position,
    agent::{ActionSelector, EpsilonGreedy},
    environment::{Maze, Status, load_layout_from_string},
    learner::{QLearner, TrainingConfig},
    map::Grid,
    table::QTable,
};

fn open_two_by_two() -> Maze {
    let layout = load_layout_from_string("30\n04").unwrap();
    Maze::new(layout).unwrap()
}

fn single_episode(exploration_rate: f64) -> TrainingConfig {
    TrainingConfig {
        episodes: 1,
        exploration_rate,
        ..TrainingConfig::default()
    }
}

/// Wins a 2x2 maze in two moves and remembers every exploration rate it was given.
#[derive(Default)]
struct RecordingSelector {
    rates: Vec<f64>,
}

impl ActionSelector for RecordingSelector {
    fn select_action(&mut self, _: &QTable, _: Position, exploration_rate: f64) -> Action {
        let action = if self.rates.len() % 2 == 0 {
            Action::Right
        } else {
            Action::Down
        };
        self.rates.push(exploration_rate);
        action
    }
}

#[test]
fn pure_exploitation_breaks_ties_by_action_order() {
    let mut learner = QLearner::new(open_two_by_two(), 11);
    let history = learner.train(&single_episode(0.0));

    // Left bumps the edge, then the freshly penalised action loses every tie.
    assert_eq!(
        history.states[0],
        vec![
            Position::new(0, 0),
            Position::new(0, 0),
            Position::new(0, 1),
            Position::new(0, 0),
            Position::new(0, 0),
            Position::new(1, 0),
            Position::new(1, 0),
        ]
    );
    assert_eq!(history.wins, vec![false]);
    assert_relative_eq!(history.rewards[0], -2.4, epsilon = 1e-9);

    let table = learner.table();
    assert_eq!(table.len(), 6);
    assert_relative_eq!(table.get(Position::new(0, 0), Action::Left), -0.075);
    assert_relative_eq!(table.get(Position::new(0, 0), Action::Right), -0.005);
    assert_relative_eq!(table.get(Position::new(0, 0), Action::Up), -0.075);
    assert_relative_eq!(table.get(Position::new(0, 0), Action::Down), -0.005);
    assert_relative_eq!(table.get(Position::new(0, 1), Action::Left), -0.005);
    assert_relative_eq!(table.get(Position::new(1, 0), Action::Left), -0.075);
}

#[test]
fn pure_exploration_terminates_within_loss_budget() {
    for seed in 0..25 {
        let mut learner = QLearner::new(open_two_by_two(), seed);
        let history = learner.train(&TrainingConfig {
            episodes: 5,
            exploration_rate: 1.0,
            exploration_decay: 1.0,
            ..TrainingConfig::default()
        });

        for (trace, won) in history.states.iter().zip(&history.wins) {
            let steps = trace.len() - 1;
            // Every non-exit step costs at least 0.05 against a budget of 2.0
            assert!((1..=41).contains(&steps), "seed {seed}: {steps} steps");
            if *won {
                assert_eq!(trace.last(), Some(&Position::new(1, 1)));
            }
        }
    }
}

#[test]
fn exploration_rate_decays_geometrically_across_episodes() {
    let mut learner = QLearner::with_selector(open_two_by_two(), RecordingSelector::default());
    let config = TrainingConfig {
        episodes: 30,
        exploration_rate: 0.8,
        exploration_decay: 0.9,
        ..TrainingConfig::default()
    };
    let history = learner.train(&config);

    assert!(history.wins.iter().all(|won| *won));
    let rates = &learner.selector().rates;
    assert_eq!(rates.len(), 60);
    for k in 0..30 {
        let expected = 0.8 * 0.9f64.powi(k as i32);
        assert_relative_eq!(rates[2 * k], expected, max_relative = 1e-12);
        assert_relative_eq!(rates[2 * k + 1], expected, max_relative = 1e-12);
    }
    assert_relative_eq!(
        history.final_exploration_rate,
        0.8 * 0.9f64.powi(30),
        max_relative = 1e-12
    );
}

#[test]
fn exploration_rate_is_not_reset_between_episodes_of_one_run() {
    let mut learner = QLearner::with_selector(open_two_by_two(), RecordingSelector::default());
    learner.train(&TrainingConfig {
        episodes: 3,
        exploration_rate: 1.0,
        exploration_decay: 0.5,
        ..TrainingConfig::default()
    });
    assert_eq!(learner.selector().rates, vec![1.0, 1.0, 0.5, 0.5, 0.25, 0.25]);
}

#[test]
fn table_grows_only_with_visited_pairs() {
    let mut learner = QLearner::with_selector(open_two_by_two(), RecordingSelector::default());
    learner.train(&TrainingConfig {
        episodes: 10,
        ..TrainingConfig::default()
    });
    // Only (start, Right) and ((0, 1), Down) were ever taken
    assert_eq!(learner.table().len(), 2);
}

#[test]
fn learns_to_reach_exit_around_walls() {
    let layout = load_layout_from_string(
        "3000
         1110
         0000
         0114",
    )
    .unwrap();
    let maze = Maze::new(layout).unwrap();
    let mut learner = QLearner::with_selector(maze, EpsilonGreedy::new(2024));
    let history = learner.train(&TrainingConfig::default());

    assert_eq!(history.episodes(), 1000);
    assert!(history.win_count() > 0);
    let run = learner.greedy_path(100);
    assert_eq!(run.status, Status::Won);
    assert_eq!(run.path.first(), Some(&Position::new(0, 0)));
    assert_eq!(run.path.last(), Some(&Position::new(3, 3)));
    // Shortest route is 6 moves
    assert!(run.path.len() >= 7);
}

#[test]
fn sweeps_on_one_learner_share_the_table() {
    let maze = Maze::new(Grid::new(3, 3).unwrap()).unwrap();
    let mut shared = QLearner::new(maze.clone(), 5);
    let mut fresh = QLearner::new(maze, 5);
    let config = TrainingConfig {
        episodes: 50,
        ..TrainingConfig::default()
    };

    shared.train(&config);
    let first = shared.table().clone();
    shared.train(&config);
    assert_ne!(shared.table(), &first);

    fresh.train(&config);
    assert_eq!(fresh.table(), &first);
}
