//! Sparse action-value table for tabular Q-learning

use std::collections::HashMap;

use crate::{Action, Position};

/// Q-table mapping (state, action) pairs to value estimates.
///
/// Pairs that were never written read as `0.0` and take no space; an entry
/// is materialized only by a write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    q_values: HashMap<(Position, Action), f64>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get Q-value for a state-action pair without materializing it
    pub fn get(&self, state: Position, action: Action) -> f64 {
        self.q_values
            .get(&(state, action))
            .copied()
            .unwrap_or(0.0)
    }

    /// Set Q-value for a state-action pair
    pub fn set(&mut self, state: Position, action: Action, value: f64) {
        self.q_values.insert((state, action), value);
    }

    /// Q-values of every action in `state`, in action index order
    pub fn action_values(&self, state: Position) -> [f64; 4] {
        Action::ALL.map(|action| self.get(state, action))
    }

    /// Maximum Q-value over all actions in a state
    pub fn max_value(&self, state: Position) -> f64 {
        self.action_values(state)
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Action with the highest Q-value in `state`.
    ///
    /// Ties go to the action with the lowest index.
    pub fn best_action(&self, state: Position) -> Action {
        let values = self.action_values(state);
        let mut best = 0;
        for (index, value) in values.iter().enumerate().skip(1) {
            if *value > values[best] {
                best = index;
            }
        }
        Action::ALL[best]
    }

    /// Q-learning update: off-policy TD control
    ///
    /// Q(s,a) ← Q(s,a) + α[r + γ max_a' Q(s',a') - Q(s,a)]
    ///
    /// Returns the new value of Q(s,a).
    pub fn q_learning_update(
        &mut self,
        state: Position,
        action: Action,
        reward: f64,
        next_state: Position,
        learning_rate: f64,
        discount_rate: f64,
    ) -> f64 {
        let current_q = *self.q_values.entry((state, action)).or_insert(0.0);
        let max_next_q = self.max_value(next_state);
        let td_target = reward + discount_rate * max_next_q;
        let new_q = current_q + learning_rate * (td_target - current_q);
        self.set(state, action, new_q);
        new_q
    }

    /// Number of materialized entries
    pub fn len(&self) -> usize {
        self.q_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q_values.is_empty()
    }

    pub fn clear(&mut self) {
        self.q_values.clear();
    }
}
