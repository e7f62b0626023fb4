//! Capability interfaces the learning algorithms are written against.
//!
//! Every problem answers the queries in [`LearningProblem`]. Problems whose
//! transition model is visible also hand out a [`TransitionModel`] through
//! [`LearningProblem::model`]; value and policy iteration refuse to run
//! without one, Q-learning never asks for it.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::distribution::StateDistribution;
use crate::environment::{Maze, Movement, Pos};
use crate::error::{MdpError, Result};

pub trait LearningProblem {
    /// All states, in a fixed enumeration order.
    fn states(&self) -> Vec<Pos>;

    /// Actions that can be issued from `state`, in enumeration order.
    fn possible_actions(&self, state: Pos) -> Vec<Movement>;

    fn is_terminal(&self, state: Pos) -> bool;

    /// Reward of being in `state`.
    fn reward(&self, state: Pos) -> f64;

    /// Reward of moving from `from` to `to` with `action`.
    fn transition_reward(&self, from: Pos, action: Movement, to: Pos) -> f64;

    /// Applies `action` and draws the resulting state.
    fn sample_successor(&self, state: Pos, action: Movement, rng: &mut StdRng) -> Result<Pos>;

    /// A uniformly drawn non-terminal state, `None` when there is none.
    fn random_state(&self, rng: &mut StdRng) -> Option<Pos>;

    fn random_action(&self, state: Pos, rng: &mut StdRng) -> Option<Movement> {
        self.possible_actions(state).choose(rng).copied()
    }

    fn non_terminal_states(&self) -> Vec<Pos> {
        self.states()
            .into_iter()
            .filter(|s| !self.is_terminal(*s))
            .collect()
    }

    /// The transition model, for problems that expose it.
    fn model(&self) -> Option<&dyn TransitionModel> {
        None
    }
}

pub trait TransitionModel {
    /// Distribution over successors of `state` when `action` is applied.
    fn distribution(&self, state: Pos, action: Movement) -> Result<&StateDistribution>;
}

impl TransitionModel for Maze {
    fn distribution(&self, state: Pos, action: Movement) -> Result<&StateDistribution> {
        self.transition(state, action)
    }
}

impl LearningProblem for Maze {
    fn states(&self) -> Vec<Pos> {
        Maze::states(self).to_vec()
    }

    fn possible_actions(&self, state: Pos) -> Vec<Movement> {
        self.actions_from(state)
    }

    fn is_terminal(&self, state: Pos) -> bool {
        Maze::is_terminal(self, state)
    }

    fn reward(&self, state: Pos) -> f64 {
        self.state_reward(state)
    }

    fn transition_reward(&self, from: Pos, action: Movement, to: Pos) -> f64 {
        self.movement_cost(from, action, to)
    }

    fn sample_successor(&self, state: Pos, action: Movement, rng: &mut StdRng) -> Result<Pos> {
        Ok(self.transition(state, action)?.sample(rng))
    }

    fn random_state(&self, rng: &mut StdRng) -> Option<Pos> {
        Maze::non_terminal_states(self).choose(rng).copied()
    }

    fn non_terminal_states(&self) -> Vec<Pos> {
        Maze::non_terminal_states(self).to_vec()
    }

    fn model(&self) -> Option<&dyn TransitionModel> {
        Some(self)
    }
}

/// Hides the transition model of a problem: the wrapped problem can only be
/// sampled.
pub struct ModelFree<P> {
    inner: P,
}

impl<P: LearningProblem> ModelFree<P> {
    pub fn new(inner: P) -> Self {
        ModelFree { inner }
    }
}

impl<P: LearningProblem> LearningProblem for ModelFree<P> {
    fn states(&self) -> Vec<Pos> {
        self.inner.states()
    }

    fn possible_actions(&self, state: Pos) -> Vec<Movement> {
        self.inner.possible_actions(state)
    }

    fn is_terminal(&self, state: Pos) -> bool {
        self.inner.is_terminal(state)
    }

    fn reward(&self, state: Pos) -> f64 {
        self.inner.reward(state)
    }

    fn transition_reward(&self, from: Pos, action: Movement, to: Pos) -> f64 {
        self.inner.transition_reward(from, action, to)
    }

    fn sample_successor(&self, state: Pos, action: Movement, rng: &mut StdRng) -> Result<Pos> {
        self.inner.sample_successor(state, action, rng)
    }

    fn random_state(&self, rng: &mut StdRng) -> Option<Pos> {
        self.inner.random_state(rng)
    }

    fn non_terminal_states(&self) -> Vec<Pos> {
        self.inner.non_terminal_states()
    }
}

/// The model of `problem`, or `UnsupportedProblem` naming `algorithm`.
pub fn require_model<'a, P: LearningProblem + ?Sized>(
    problem: &'a P,
    algorithm: &'static str,
) -> Result<&'a dyn TransitionModel> {
    problem
        .model()
        .ok_or(MdpError::UnsupportedProblem { algorithm })
}
