use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Action, Position,
    error::Error,
    map::{Grid, GridError},
};

/// Represents the static kind of a cell in the maze grid.
///
/// The discriminants are the integer codes used by layout files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellKind {
    #[default]
    Available = 0,
    Wall = 1,
    /// Marks the agent in rendered copies of a layout. Behaves like `Available`.
    Current = 2,
    Start = 3,
    Exit = 4,
}

impl TryFrom<u8> for CellKind {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(CellKind::Available),
            1 => Ok(CellKind::Wall),
            2 => Ok(CellKind::Current),
            3 => Ok(CellKind::Start),
            4 => Ok(CellKind::Exit),
            other => Err(other),
        }
    }
}

/// Status of an episode after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Won,
    Lost,
    Ongoing,
}

impl Status {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Won | Status::Lost)
    }
}

/// Reward schedule of the maze.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Reward for stepping onto the exit.
    pub reward_exit: f64,
    /// Reward for any other successful move.
    pub penalty_per_step: f64,
    /// Reward for a move that was blocked by a wall or the grid edge.
    pub penalty_impossible_move: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            reward_exit: 10.0,
            penalty_per_step: -0.05,
            penalty_impossible_move: -0.75,
        }
    }
}

/// The result of a single call to [`Maze::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub state: Position,
    pub reward: f64,
    pub status: Status,
}

/// Represents problems found while reading a maze layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("Maze layout is empty.")]
    Empty,
    #[error("Inconsistent width at row {row}: expected {expected}, found {found}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Unknown cell code '{token}' at position ({row}, {col}).")]
    UnknownCellCode {
        token: String,
        row: usize,
        col: usize,
    },
    #[error("Multiple start cells found at {first:?} and {second:?}.")]
    MultipleStarts { first: Position, second: Position },
    #[error("Multiple exit cells found at {first:?} and {second:?}.")]
    MultipleExits { first: Position, second: Position },
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// A deterministic grid maze with a single start and a single exit.
///
/// Owns the static layout and the per-episode agent state.
#[derive(Debug, Clone)]
pub struct Maze {
    layout: Grid<CellKind>,
    rewards: RewardConfig,
    start: Position,
    exit: Position,
    loss_threshold: f64,
    current: Position,
    previous: Position,
    total_reward: f64,
}

impl Maze {
    /// Creates a maze with the default reward schedule.
    pub fn new(layout: Grid<CellKind>) -> Result<Self, LayoutError> {
        Self::with_rewards(layout, RewardConfig::default())
    }

    /// Creates a maze with a custom reward schedule.
    ///
    /// A missing start cell defaults to the top-left corner and a missing
    /// exit cell to the bottom-right corner.
    pub fn with_rewards(layout: Grid<CellKind>, rewards: RewardConfig) -> Result<Self, LayoutError> {
        if layout.is_empty() {
            return Err(LayoutError::Empty);
        }

        let mut start: Option<Position> = None;
        let mut exit: Option<Position> = None;
        for (position, cell) in layout.enumerate() {
            match cell {
                CellKind::Start => {
                    if let Some(first) = start {
                        return Err(LayoutError::MultipleStarts {
                            first,
                            second: position,
                        });
                    }
                    start = Some(position);
                }
                CellKind::Exit => {
                    if let Some(first) = exit {
                        return Err(LayoutError::MultipleExits {
                            first,
                            second: position,
                        });
                    }
                    exit = Some(position);
                }
                _ => {}
            }
        }

        let start = start.unwrap_or_else(|| {
            debug!("No start cell in layout, using top-left corner");
            Position::new(0, 0)
        });
        let exit = exit.unwrap_or_else(|| {
            debug!("No exit cell in layout, using bottom-right corner");
            Position::new(layout.rows() - 1, layout.cols() - 1)
        });
        let loss_threshold = -0.5 * layout.len() as f64;

        Ok(Maze {
            layout,
            rewards,
            start,
            exit,
            loss_threshold,
            current: start,
            previous: start,
            total_reward: 0.0,
        })
    }

    /// Puts the agent back on the start cell and clears the episode reward.
    ///
    /// Returns the start position as the initial state.
    pub fn reset(&mut self) -> Position {
        self.previous = self.start;
        self.current = self.start;
        self.total_reward = 0.0;
        self.current
    }

    /// Returns the actions that move the agent from `position` onto another
    /// cell inside the grid that is not a wall, in action index order.
    pub fn permissible_actions(&self, position: Position) -> Vec<Action> {
        Action::ALL
            .into_iter()
            .filter(|&action| {
                position
                    .offset(action, self.layout.rows(), self.layout.cols())
                    .is_some_and(|target| self.layout[target] != CellKind::Wall)
            })
            .collect()
    }

    /// Applies one action and reports the new state, its reward and the episode status.
    ///
    /// An impermissible action leaves the agent where it is and earns the
    /// impossible-move penalty.
    pub fn step(&mut self, action: Action) -> StepOutcome {
        let target = if self.permissible_actions(self.current).contains(&action) {
            self.current
                .offset(action, self.layout.rows(), self.layout.cols())
        } else {
            None
        };
        // `previous` always holds the cell the step started from.
        self.previous = self.current;
        if let Some(target) = target {
            self.current = target;
        }

        let reward = if self.current == self.exit {
            self.rewards.reward_exit
        } else if self.current == self.previous {
            self.rewards.penalty_impossible_move
        } else {
            self.rewards.penalty_per_step
        };
        self.total_reward += reward;

        StepOutcome {
            state: self.current,
            reward,
            status: self.status(),
        }
    }

    /// Same as [`Maze::step`] for a raw action index; indices outside the
    /// action set are rejected before the maze is touched.
    pub fn step_index(&mut self, index: usize) -> Result<StepOutcome, Error> {
        let action = Action::try_from(index)?;
        Ok(self.step(action))
    }

    fn status(&self) -> Status {
        if self.current == self.exit {
            Status::Won
        } else if self.total_reward < self.loss_threshold {
            Status::Lost
        } else {
            Status::Ongoing
        }
    }

    /// Open cells the agent may occupy before reaching the exit: `Available`
    /// and `Start` cells only.
    pub fn free_cells(&self) -> Vec<Position> {
        self.layout
            .enumerate()
            .filter(|&(position, cell)| {
                matches!(cell, CellKind::Available | CellKind::Start) && position != self.exit
            })
            .map(|(position, _)| position)
            .collect()
    }

    /// Returns a copy of the layout with the agent's cell marked as `Current`.
    /// An agent standing on the exit leaves the `Exit` cell in place.
    pub fn render_with_agent(&self) -> Result<Grid<CellKind>, GridError> {
        let mut grid = self.layout.clone();
        if self.current != self.exit {
            grid.set(self.current, CellKind::Current)?;
        }
        Ok(grid)
    }

    pub fn layout(&self) -> &Grid<CellKind> {
        &self.layout
    }
    pub fn start(&self) -> Position {
        self.start
    }
    pub fn exit(&self) -> Position {
        self.exit
    }
    pub fn current_position(&self) -> Position {
        self.current
    }
    pub fn previous_position(&self) -> Position {
        self.previous
    }
    pub fn total_reward(&self) -> f64 {
        self.total_reward
    }
    /// Episode reward below which the episode is lost: `-0.5` per grid cell.
    pub fn loss_threshold(&self) -> f64 {
        self.loss_threshold
    }
}

/// Loads a maze layout from its text representation.
///
/// Each non-blank line is one row. A row is either a run of single-digit
/// cell codes (`01003`) or whitespace-separated codes (`0 1 0 0 3`).
pub fn load_layout_from_string(layout: &str) -> Result<Grid<CellKind>, LayoutError> {
    let lines: Vec<&str> = layout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return Err(LayoutError::Empty);
    }

    let mut parsed_rows: Vec<Vec<CellKind>> = Vec::with_capacity(lines.len());
    for (row, line) in lines.iter().enumerate() {
        let tokens: Vec<&str> = if line.contains(char::is_whitespace) {
            line.split_whitespace().collect()
        } else {
            line.char_indices()
                .map(|(i, c)| &line[i..i + c.len_utf8()])
                .collect()
        };

        if let Some(first) = parsed_rows.first() {
            if tokens.len() != first.len() {
                return Err(LayoutError::RaggedRow {
                    row,
                    expected: first.len(),
                    found: tokens.len(),
                });
            }
        }

        let cells = tokens
            .iter()
            .enumerate()
            .map(|(col, token)| {
                token
                    .parse::<u8>()
                    .ok()
                    .and_then(|code| CellKind::try_from(code).ok())
                    .ok_or_else(|| LayoutError::UnknownCellCode {
                        token: token.to_string(),
                        row,
                        col,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        parsed_rows.push(cells);
    }

    let rows = parsed_rows.len();
    let cols = parsed_rows[0].len();
    Ok(Grid::from_generator(rows, cols, |row, col| {
        parsed_rows[row][col]
    })?)
}

/// Loads a layout and builds a maze from it in one go.
pub fn load_maze_from_string(layout: &str, rewards: RewardConfig) -> Result<Maze, Error> {
    let grid = load_layout_from_string(layout)?;
    Ok(Maze::with_rewards(grid, rewards)?)
}
