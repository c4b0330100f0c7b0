use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::Position;

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Cell ({row}, {col}) is out of bounds for grid of {rows} rows x {cols} columns")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("Grid dimensions {rows} x {cols} overflow")]
    SizeOverflow { rows: usize, cols: usize },
}

/// A generic 2D grid structure.
///
/// Stores elements of type `T` in a flat vector using row-major order.
/// Cells are addressed by `(row, col)`, with row 0 at the top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid with the specified dimensions, filled with default values.
    pub fn new(rows: usize, cols: usize) -> Result<Self, GridError>
    where
        T: Default + Clone,
    {
        let size = rows
            .checked_mul(cols)
            .ok_or(GridError::SizeOverflow { rows, cols })?;
        Ok(Grid {
            rows,
            cols,
            cells: vec![T::default(); size],
        })
    }

    /// Creates a new grid with the specified dimensions, filled by a generator function.
    ///
    /// The generator function `f` takes `(row, col)` coordinates and returns the value for that cell.
    pub fn from_generator<F>(rows: usize, cols: usize, mut f: F) -> Result<Self, GridError>
    where
        F: FnMut(usize, usize) -> T,
    {
        let size = rows
            .checked_mul(cols)
            .ok_or(GridError::SizeOverflow { rows, cols })?;
        let mut cells = Vec::with_capacity(size);
        for row in 0..rows {
            for col in 0..cols {
                cells.push(f(row, col));
            }
        }
        Ok(Grid { rows, cols, cells })
    }

    /// Returns the number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns the total number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Converts (row, col) coordinates to a flat vector index.
    ///
    /// Returns `None` if the coordinates are out of bounds.
    #[inline]
    fn coords_to_index(&self, row: usize, col: usize) -> Option<usize> {
        if self.is_valid(row, col) {
            Some(row * self.cols + col)
        } else {
            None
        }
    }

    /// Checks if the given coordinates are within the grid boundaries.
    #[inline]
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    /// Sets the value of the cell at the given position.
    ///
    /// Returns `Err(GridError::OutOfBounds)` if the position is invalid.
    pub fn set(&mut self, position: Position, value: T) -> Result<(), GridError> {
        let index =
            self.coords_to_index(position.row, position.col)
                .ok_or(GridError::OutOfBounds {
                    row: position.row,
                    col: position.col,
                    rows: self.rows,
                    cols: self.cols,
                })?;
        self.cells[index] = value;
        Ok(())
    }

    /// Returns an iterator that yields `(Position, &T)` for each cell in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (Position, &T)> {
        let cols = self.cols;
        self.cells.iter().enumerate().map(move |(index, cell)| {
            (
                Position {
                    row: index / cols,
                    col: index % cols,
                },
                cell,
            )
        })
    }

    /// Returns an iterator over the rows of the grid.
    pub fn row_slices(&self) -> impl Iterator<Item = &[T]> {
        // `chunks` panics on zero, and a zero-column grid has no cells anyway.
        self.cells.chunks(self.cols.max(1))
    }
}

/// Indexing using Position coordinates for access
impl<T> Index<Position> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Position) -> &Self::Output {
        match self.coords_to_index(index.row, index.col) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid of {} rows x {} columns",
                index.row, index.col, self.rows, self.cols
            ),
        }
    }
}
