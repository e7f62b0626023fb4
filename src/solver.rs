use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::config::{check_discount, recover, Params, DEFAULT_DISCOUNT};
use crate::dp::{policy_iteration, value_iteration};
use crate::error::Result;
use crate::policy::{Policy, UtilityTable};
use crate::problem::LearningProblem;
use crate::q_table::QTable;
use crate::rl::{exploration_strategy, q_learning, QLearningParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    ValueIteration,
    PolicyIteration,
    QLearning,
}

impl Algorithm {
    pub fn all() -> [Algorithm; 3] {
        [
            Algorithm::ValueIteration,
            Algorithm::PolicyIteration,
            Algorithm::QLearning,
        ]
    }

    /// Short name, used for exported file names.
    pub fn slug(self) -> &'static str {
        match self {
            Algorithm::ValueIteration => "value-iteration",
            Algorithm::PolicyIteration => "policy-iteration",
            Algorithm::QLearning => "q-learning",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Algorithm::ValueIteration => "Value Iteration",
            Algorithm::PolicyIteration => "Policy Iteration",
            Algorithm::QLearning => "Q-Learning",
        };
        write!(f, "{}", name)
    }
}

/// What a solver hands back: the policy, plus the table it was derived from.
#[derive(Debug, Clone)]
pub struct Solution {
    pub algorithm: Algorithm,
    pub policy: Policy,
    pub utilities: Option<UtilityTable>,
    pub q_table: Option<QTable>,
    /// Per-episode rewards of Q-learning.
    pub episode_rewards: Vec<f64>,
}

/// Runs `algorithm` on `problem`.
///
/// Malformed knobs (discount included) are replaced by their defaults and
/// logged; structural problems such as a missing transition model are
/// returned as errors. All randomness comes from one generator seeded with
/// `params.seed`.
pub fn solve<P>(
    problem: &P,
    algorithm: Algorithm,
    discount: f64,
    params: &Params,
) -> Result<Solution>
where
    P: LearningProblem + ?Sized,
{
    let discount = recover(check_discount(discount), DEFAULT_DISCOUNT);
    let params = params.sanitized();
    let mut rng = StdRng::seed_from_u64(params.seed);
    info!(%algorithm, discount, seed = params.seed, "Solving");

    match algorithm {
        Algorithm::ValueIteration => {
            let result = value_iteration(problem, discount, params.max_delta)?;
            Ok(Solution {
                algorithm,
                policy: result.policy,
                utilities: Some(result.utilities),
                q_table: None,
                episode_rewards: Vec::new(),
            })
        }
        Algorithm::PolicyIteration => {
            let result = policy_iteration(problem, discount, params.max_delta, &mut rng)?;
            Ok(Solution {
                algorithm,
                policy: result.policy,
                utilities: Some(result.utilities),
                q_table: None,
                episode_rewards: Vec::new(),
            })
        }
        Algorithm::QLearning => {
            let mut exploration = exploration_strategy(params.exploration);
            let q_params = QLearningParams {
                learning_rate: params.learning_rate,
                discount,
                episodes: params.episodes,
                max_steps: params.max_steps,
            };
            let result = q_learning(problem, exploration.as_mut(), q_params, &mut rng)?;
            Ok(Solution {
                algorithm,
                policy: result.policy,
                utilities: None,
                q_table: Some(result.q_table),
                episode_rewards: result.episode_rewards,
            })
        }
    }
}
