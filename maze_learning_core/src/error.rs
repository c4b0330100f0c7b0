//! Error types for the maze learning crate

use thiserror::Error;

use crate::environment::LayoutError;

/// Main error type for the maze learning crate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("action index {index} is outside the action set (expected 0-3)")]
    InvalidAction { index: usize },

    #[error("state has {len} coordinates, expected exactly 2 (row, col)")]
    MalformedState { len: usize },

    #[error("invalid maze layout: {0}")]
    InvalidLayout(#[from] LayoutError),
}
