use std::collections::HashMap;

use ndarray::{Array2, Zip};
use rand::rngs::StdRng;

use crate::environment::{Movement, Pos};
use crate::problem::LearningProblem;

// Represents deterministic policy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policy {
    policy: HashMap<Pos, Movement>,
}

impl Policy {
    pub fn new() -> Self {
        Self {
            policy: HashMap::new(),
        }
    }

    /// Assigns to every non-terminal state an action drawn uniformly from
    /// its possible actions.
    pub fn random<P: LearningProblem + ?Sized>(problem: &P, rng: &mut StdRng) -> Self {
        let mut policy = Policy::new();
        for state in problem.non_terminal_states() {
            if let Some(action) = problem.random_action(state, rng) {
                policy.set_action(state, action);
            }
        }
        policy
    }

    pub fn set_action(&mut self, state: Pos, action: Movement) {
        self.policy.insert(state, action);
    }

    pub fn action(&self, state: Pos) -> Option<Movement> {
        self.policy.get(&state).copied()
    }

    pub fn len(&self) -> usize {
        self.policy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policy.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Pos, &Movement)> {
        self.policy.iter()
    }

    /// Copy of the policy where every non-terminal state without an action
    /// gets a random one.
    pub fn completed<P: LearningProblem + ?Sized>(&self, problem: &P, rng: &mut StdRng) -> Policy {
        let mut policy = self.clone();
        for state in problem.non_terminal_states() {
            if policy.action(state).is_none() {
                if let Some(action) = problem.random_action(state, rng) {
                    policy.set_action(state, action);
                }
            }
        }
        policy
    }

    /// States where the two policies choose differently, sorted.
    pub fn differences(&self, other: &Policy) -> Vec<Pos> {
        let mut states: Vec<Pos> = self
            .policy
            .keys()
            .chain(other.policy.keys())
            .copied()
            .filter(|s| self.action(*s) != other.action(*s))
            .collect();
        states.sort();
        states.dedup();
        states
    }
}

/// Expected discounted return of every state, stored on the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct UtilityTable {
    values: Array2<f64>,
}

impl UtilityTable {
    /// Terminal states start at their reward, all others at zero.
    pub fn for_problem<P: LearningProblem + ?Sized>(problem: &P) -> Self {
        let states = problem.states();
        let width = states.iter().map(|s| s.x + 1).max().unwrap_or(0);
        let height = states.iter().map(|s| s.y + 1).max().unwrap_or(0);
        let mut table = Self {
            values: Array2::zeros((width, height)),
        };
        for state in states {
            if problem.is_terminal(state) {
                table.set(state, problem.reward(state));
            }
        }
        table
    }

    pub fn get(&self, state: Pos) -> f64 {
        self.values.get([state.x, state.y]).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, state: Pos, value: f64) {
        if let Some(v) = self.values.get_mut([state.x, state.y]) {
            *v = value;
        }
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Largest absolute change between two tables of the same problem.
    pub fn max_difference(&self, other: &UtilityTable) -> f64 {
        Zip::from(&self.values)
            .and(&other.values)
            .fold(0.0, |delta: f64, a, b| delta.max((a - b).abs()))
    }
}
