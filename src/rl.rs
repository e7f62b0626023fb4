use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, trace, warn};

use crate::agent::{Agent, Step};
use crate::config::{check_episodes, check_learning_rate, check_max_steps, Exploration};
use crate::environment::{Movement, Pos};
use crate::error::{MdpError, Result};
use crate::policy::Policy;
use crate::problem::LearningProblem;
use crate::q_table::QTable;

pub trait ExplorationStrategy {
    /// Picks one of `actions` for `state`; `None` only if `actions` is empty.
    fn next_action(
        &mut self,
        state: Pos,
        actions: &[Movement],
        q_table: &QTable,
        rng: &mut StdRng,
    ) -> Option<Movement>;
}

/// Greedy with probability `greediness`, uniformly random otherwise. The
/// greedy choice also turns random while no action beats the default value.
pub struct EpsilonGreedy {
    greediness: f64,
}

impl EpsilonGreedy {
    pub fn new(greediness: f64) -> Self {
        EpsilonGreedy { greediness }
    }
}

impl ExplorationStrategy for EpsilonGreedy {
    fn next_action(
        &mut self,
        state: Pos,
        actions: &[Movement],
        q_table: &QTable,
        rng: &mut StdRng,
    ) -> Option<Movement> {
        if rng.gen::<f64>() < self.greediness {
            if let Some(action) = q_table.best_action(state, actions) {
                return Some(action);
            }
        }
        actions.choose(rng).copied()
    }
}

/// Boltzmann selection: P(a) proportional to exp(Q(s, a) / temperature).
pub struct SoftMaxExploration {
    temperature: f64,
}

impl SoftMaxExploration {
    pub fn new(temperature: f64) -> Self {
        SoftMaxExploration { temperature }
    }
}

impl ExplorationStrategy for SoftMaxExploration {
    fn next_action(
        &mut self,
        state: Pos,
        actions: &[Movement],
        q_table: &QTable,
        rng: &mut StdRng,
    ) -> Option<Movement> {
        let max_q = q_table.max_q_value(state, actions);
        // Shifting by the max keeps exp() from overflowing.
        let logits: Vec<f64> = actions
            .iter()
            .map(|a| ((q_table.q_value(state, *a) - max_q) / self.temperature).exp())
            .collect();
        let z: f64 = logits.iter().sum();
        let p: f64 = rng.gen::<f64>() * z;
        let mut p_sum = 0.0;
        for (action, l) in actions.iter().zip(logits.iter()) {
            p_sum += l;
            if p < p_sum {
                return Some(*action);
            }
        }
        actions.last().copied()
    }
}

pub fn exploration_strategy(exploration: Exploration) -> Box<dyn ExplorationStrategy> {
    match exploration {
        Exploration::EpsilonGreedy { greediness } => Box::new(EpsilonGreedy::new(greediness)),
        Exploration::SoftMax { temperature } => Box::new(SoftMaxExploration::new(temperature)),
    }
}

/// Settings of one Q-learning run.
#[derive(Debug, Clone, Copy)]
pub struct QLearningParams {
    pub learning_rate: f64,
    pub discount: f64,
    pub episodes: usize,
    pub max_steps: usize,
}

pub struct QLearningResult {
    pub policy: Policy,
    pub q_table: QTable,
    /// Total reward collected in each episode.
    pub episode_rewards: Vec<f64>,
    /// Episodes cut short by the step limit.
    pub truncated: usize,
}

/// Learns Q-values from simulated episodes; the transition model is never
/// consulted. Runs exactly `params.episodes` episodes, each from a random
/// non-terminal state until a terminal state is reached.
pub fn q_learning<P>(
    problem: &P,
    exploration: &mut dyn ExplorationStrategy,
    params: QLearningParams,
    rng: &mut StdRng,
) -> Result<QLearningResult>
where
    P: LearningProblem + ?Sized,
{
    if !(params.discount > 0.0 && params.discount <= 1.0) {
        return Err(MdpError::InvalidParameter {
            name: "discount",
            value: params.discount.to_string(),
            default: crate::config::DEFAULT_DISCOUNT.to_string(),
        });
    }
    let alpha = check_learning_rate(params.learning_rate)?;
    let episodes = check_episodes(params.episodes)?;
    let max_steps = check_max_steps(params.max_steps)?;
    info!(alpha, discount = params.discount, episodes, "Q-learning");

    let mut q_table = QTable::new();
    let mut episode_rewards = Vec::with_capacity(episodes);
    let mut truncated = 0;

    for episode_num in 0..episodes {
        let start = match problem.random_state(rng) {
            Some(s) => s,
            None => {
                warn!("No non-terminal state to start an episode from");
                break;
            }
        };
        let mut agent = Agent::new(start);

        // Run a full episode, ie until the agent reaches a terminal state
        while !problem.is_terminal(agent.pos) {
            if agent.steps >= max_steps {
                truncated += 1;
                debug!(episode = episode_num, start = %start, "Episode truncated");
                break;
            }
            let s = agent.pos;
            let actions = problem.possible_actions(s);
            let a = match exploration.next_action(s, &actions, &q_table, rng) {
                Some(a) => a,
                None => break,
            };
            let step = agent.r#move(problem, a, rng)?;
            update_q_table(problem, &mut q_table, &step, alpha, params.discount);
        }
        episode_rewards.push(agent.reward);

        if (episode_num + 1) % 100 == 0 {
            debug!(
                episode = episode_num + 1,
                reward = agent.reward,
                entries = q_table.len(),
                "Q-learning progress"
            );
        }
    }
    if truncated > 0 {
        warn!(truncated, max_steps, "Episodes hit the step limit");
    }

    let policy = q_table.generate_policy();
    info!(
        entries = q_table.len(),
        states = policy.len(),
        "Q-learning finished"
    );
    Ok(QLearningResult {
        policy,
        q_table,
        episode_rewards,
        truncated,
    })
}

/// Q(s, a) <- (1 - alpha) Q(s, a) + alpha (r + gamma max_a' Q(s', a')), without
/// bootstrapping past a terminal state.
fn update_q_table<P>(problem: &P, q_table: &mut QTable, step: &Step, alpha: f64, discount: f64)
where
    P: LearningProblem + ?Sized,
{
    let q = q_table.q_value(step.from, step.action);
    let target = if step.terminal {
        step.reward
    } else {
        let next_actions = problem.possible_actions(step.to);
        step.reward + discount * q_table.max_q_value(step.to, &next_actions)
    };
    let new_q = (1.0 - alpha) * q + alpha * target;
    trace!(
        state = %step.from,
        action = ?step.action,
        reward = step.reward,
        q = new_q,
        "Q-learning update"
    );
    q_table.set_q_value(step.from, step.action, new_q);
}
