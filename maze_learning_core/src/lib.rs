use serde::{Deserialize, Serialize};

pub mod agent;
pub mod environment;
pub mod error;
pub mod learner;
pub mod map;
pub mod table;

pub use error::Error;

/// Represents a cell coordinate as `(row, col)`.
///
/// This is also the canonical state key of the value table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Position { row, col }
    }

    /// Returns the neighbouring position in the direction of `action`,
    /// or `None` if it would leave a `rows` x `cols` grid.
    pub fn offset(self, action: Action, rows: usize, cols: usize) -> Option<Position> {
        let (dr, dc) = action.delta();
        let row = self.row.checked_add_signed(dr)?;
        let col = self.col.checked_add_signed(dc)?;
        if row < rows && col < cols {
            Some(Position { row, col })
        } else {
            None
        }
    }
}

/// Canonicalizes a flattened state such as `[row, col]`.
impl TryFrom<&[usize]> for Position {
    type Error = Error;

    fn try_from(coords: &[usize]) -> Result<Self, Self::Error> {
        match *coords {
            [row, col] => Ok(Position { row, col }),
            _ => Err(Error::MalformedState { len: coords.len() }),
        }
    }
}

/// One of the four moves available to the agent.
///
/// The discriminants are the action indices used for tie-breaking, so the
/// declaration order must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    Left = 0,
    Right = 1,
    Up = 2,
    Down = 3,
}

impl Action {
    /// Every action, in index order.
    pub const ALL: [Action; 4] = [Action::Left, Action::Right, Action::Up, Action::Down];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Row and column change caused by this move.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Action::Left => (0, -1),
            Action::Right => (0, 1),
            Action::Up => (-1, 0),
            Action::Down => (1, 0),
        }
    }
}

impl TryFrom<usize> for Action {
    type Error = Error;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Action::ALL
            .get(index)
            .copied()
            .ok_or(Error::InvalidAction { index })
    }
}
