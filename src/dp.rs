//! Model-based planning: value iteration and policy iteration.
//!
//! Both use the same synchronous Bellman sweep: every new utility is computed
//! from the utilities of the previous sweep,
//!
//!   U'(s) = R(s) + max_a \sum_{s'} T(s, a, s') * [C(s, a, s') + \gamma U(s')]
//!
//! where C is the movement cost of the transition, zero when s' is terminal,
//! as for an agent moving through the maze. A fixed policy replaces
//! the max by its own action. Sweeps stop once the largest change drops below
//! `max_delta * (1 - gamma) / gamma`.

use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::config::{check_discount, check_max_delta};
use crate::environment::{Movement, Pos};
use crate::error::Result;
use crate::policy::{Policy, UtilityTable};
use crate::problem::{require_model, LearningProblem, TransitionModel};

/// Smallest gain that makes policy iteration switch action.
const IMPROVEMENT_TOLERANCE: f64 = 1e-9;

/// Outcome of a planning run.
#[derive(Debug, Clone)]
pub struct DpResult {
    pub policy: Policy,
    pub utilities: UtilityTable,
    /// Largest utility change of every sweep, in order.
    pub deltas: Vec<f64>,
    /// Evaluation/improvement rounds; zero for value iteration.
    pub iterations: usize,
}

impl DpResult {
    pub fn sweeps(&self) -> usize {
        self.deltas.len()
    }
}

/// Threshold on the per-sweep delta.
pub fn convergence_threshold(max_delta: f64, discount: f64) -> f64 {
    max_delta * (1.0 - discount) / discount
}

pub fn value_iteration<P>(problem: &P, discount: f64, max_delta: f64) -> Result<DpResult>
where
    P: LearningProblem + ?Sized,
{
    let model = require_model(problem, "ValueIteration")?;
    let discount = check_discount(discount)?;
    let threshold = convergence_threshold(check_max_delta(max_delta)?, discount);
    info!(discount, max_delta, "Value iteration");

    let mut utilities = UtilityTable::for_problem(problem);
    let deltas =
        iterate_until_converged(problem, model, None, &mut utilities, discount, threshold)?;
    let policy = greedy_policy(problem, model, &utilities, discount)?;

    info!(sweeps = deltas.len(), "Value iteration converged");
    Ok(DpResult {
        policy,
        utilities,
        deltas,
        iterations: 0,
    })
}

pub fn policy_iteration<P>(
    problem: &P,
    discount: f64,
    max_delta: f64,
    rng: &mut StdRng,
) -> Result<DpResult>
where
    P: LearningProblem + ?Sized,
{
    let model = require_model(problem, "PolicyIteration")?;
    let discount = check_discount(discount)?;
    let threshold = convergence_threshold(check_max_delta(max_delta)?, discount);
    info!(discount, max_delta, "Policy iteration");

    let mut policy = Policy::random(problem, rng);
    let mut utilities = UtilityTable::for_problem(problem);
    let mut deltas = Vec::new();
    let mut iterations = 0;

    // While the improved policy differs from the evaluated one, iterate.
    loop {
        iterations += 1;
        // Evaluation starts from the previous round's utilities.
        let sweeps = iterate_until_converged(
            problem,
            model,
            Some(&policy),
            &mut utilities,
            discount,
            threshold,
        )?;
        let improved = improve_policy(problem, model, &policy, &utilities, discount)?;
        debug!(
            iteration = iterations,
            sweeps = sweeps.len(),
            changed = improved.differences(&policy).len(),
            "Policy iteration loop"
        );
        deltas.extend(sweeps);
        if improved == policy {
            break;
        }
        policy = improved;
    }

    info!(iterations, sweeps = deltas.len(), "Policy iteration converged");
    Ok(DpResult {
        policy,
        utilities,
        deltas,
        iterations,
    })
}

/// Utilities of following `policy` forever. Non-terminal states without an
/// action in the policy are worth their own reward only.
pub fn evaluate_policy<P>(
    problem: &P,
    policy: &Policy,
    discount: f64,
    max_delta: f64,
) -> Result<UtilityTable>
where
    P: LearningProblem + ?Sized,
{
    let model = require_model(problem, "PolicyEvaluation")?;
    let discount = check_discount(discount)?;
    let threshold = convergence_threshold(check_max_delta(max_delta)?, discount);
    let mut utilities = UtilityTable::for_problem(problem);
    iterate_until_converged(problem, model, Some(policy), &mut utilities, discount, threshold)?;
    Ok(utilities)
}

/// \sum_{s'} T(s, a, s') * [C(s, a, s') + \gamma U(s')], where no movement
/// cost is charged for reaching a terminal state.
pub fn expected_utility<P>(
    problem: &P,
    model: &dyn TransitionModel,
    state: Pos,
    action: Movement,
    utilities: &UtilityTable,
    discount: f64,
) -> Result<f64>
where
    P: LearningProblem + ?Sized,
{
    let dist = model.distribution(state, action)?;
    Ok(dist.expectation(|next| {
        let cost = if problem.is_terminal(next) {
            0.0
        } else {
            problem.transition_reward(state, action, next)
        };
        cost + discount * utilities.get(next)
    }))
}

/// The possible action with the highest expected utility, ties going to the
/// first one enumerated.
fn best_action<P>(
    problem: &P,
    model: &dyn TransitionModel,
    state: Pos,
    utilities: &UtilityTable,
    discount: f64,
) -> Result<Option<(Movement, f64)>>
where
    P: LearningProblem + ?Sized,
{
    let mut best: Option<(Movement, f64)> = None;
    for action in problem.possible_actions(state) {
        let value = expected_utility(problem, model, state, action, utilities, discount)?;
        match best {
            Some((_, best_value)) if value <= best_value => {}
            _ => best = Some((action, value)),
        }
    }
    Ok(best)
}

/// Greedy policy with respect to `utilities`.
pub fn greedy_policy<P>(
    problem: &P,
    model: &dyn TransitionModel,
    utilities: &UtilityTable,
    discount: f64,
) -> Result<Policy>
where
    P: LearningProblem + ?Sized,
{
    let mut policy = Policy::new();
    for state in problem.non_terminal_states() {
        if let Some((action, _)) = best_action(problem, model, state, utilities, discount)? {
            policy.set_action(state, action);
        }
    }
    Ok(policy)
}

/// Greedy policy that keeps the current action of a state unless another
/// one is better by more than `IMPROVEMENT_TOLERANCE`.
fn improve_policy<P>(
    problem: &P,
    model: &dyn TransitionModel,
    current: &Policy,
    utilities: &UtilityTable,
    discount: f64,
) -> Result<Policy>
where
    P: LearningProblem + ?Sized,
{
    let mut policy = greedy_policy(problem, model, utilities, discount)?;
    for state in problem.non_terminal_states() {
        let (old, new) = match (current.action(state), policy.action(state)) {
            (Some(old), Some(new)) if old != new => (old, new),
            _ => continue,
        };
        let old_value = expected_utility(problem, model, state, old, utilities, discount)?;
        let new_value = expected_utility(problem, model, state, new, utilities, discount)?;
        if new_value - old_value <= IMPROVEMENT_TOLERANCE {
            policy.set_action(state, old);
        }
    }
    Ok(policy)
}

// Evaluate policy, or do value iteration by passing policy = None.
fn iterate_until_converged<P>(
    problem: &P,
    model: &dyn TransitionModel,
    policy: Option<&Policy>,
    utilities: &mut UtilityTable,
    discount: f64,
    threshold: f64,
) -> Result<Vec<f64>>
where
    P: LearningProblem + ?Sized,
{
    let states = problem.non_terminal_states();
    let mut deltas = Vec::new();
    loop {
        let next = sweep(problem, model, policy, &states, utilities, discount)?;
        let delta = next.max_difference(utilities);
        *utilities = next;
        deltas.push(delta);
        debug!(sweep = deltas.len(), delta, "Bellman sweep");
        // If the max of all changes is very small, stop.
        if delta < threshold {
            return Ok(deltas);
        }
    }
}

/// One synchronous Bellman update of every non-terminal state.
fn sweep<P>(
    problem: &P,
    model: &dyn TransitionModel,
    policy: Option<&Policy>,
    states: &[Pos],
    previous: &UtilityTable,
    discount: f64,
) -> Result<UtilityTable>
where
    P: LearningProblem + ?Sized,
{
    let mut next = previous.clone();
    for &state in states {
        let action_value = match policy {
            Some(p) => match p.action(state) {
                Some(action) => {
                    Some(expected_utility(problem, model, state, action, previous, discount)?)
                }
                None => None,
            },
            None => best_action(problem, model, state, previous, discount)?.map(|(_, v)| v),
        };
        next.set(state, problem.reward(state) + action_value.unwrap_or(0.0));
    }
    Ok(next)
}
