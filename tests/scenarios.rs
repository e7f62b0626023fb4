use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use test_case::test_case;

use maze_mdp::agent::Agent;
use maze_mdp::config::{Exploration, MazeConfig, Params};
use maze_mdp::distribution::PROB_TOLERANCE;
use maze_mdp::dp::{evaluate_policy, policy_iteration, value_iteration};
use maze_mdp::environment::{Maze, Movement, Pos};
use maze_mdp::error::MdpError;
use maze_mdp::problem::{LearningProblem, ModelFree};
use maze_mdp::solver::{solve, Algorithm};

fn maze(rows: &[&str], error_prob: f64) -> Maze {
    Maze::from_config(&MazeConfig {
        rows: rows.iter().map(|r| r.to_string()).collect(),
        error_prob,
        ..MazeConfig::default()
    })
    .unwrap()
}

fn costly_maze(rows: &[&str], move_cost: f64) -> Maze {
    Maze::from_config(&MazeConfig {
        rows: rows.iter().map(|r| r.to_string()).collect(),
        error_prob: 0.0,
        move_cost,
        ..MazeConfig::default()
    })
    .unwrap()
}

/// 3x3 grid, wall in the middle, hazard in the bottom left corner. Only the
/// terminal cells carry a reward.
fn small_grid() -> Maze {
    costly_maze(&["S..", ".#.", "C.G"], 0.0)
}

const LARGE: [&str; 4] = ["S..~.", ".#.O.", "O..#C", "~.#.G"];

#[test]
fn value_iteration_steers_away_from_hazard() {
    let m = small_grid();
    let result = value_iteration(&m, 0.9, 0.01).unwrap();
    assert_eq!(result.policy.action(Pos::new(0, 0)), Some(Movement::Right));

    let mut rng = StdRng::seed_from_u64(3);
    let mut agent = Agent::new(m.start_pos());
    let trajectory = agent.follow(&m, &result.policy, 20, &mut rng).unwrap();
    let mut distance = m.start_pos().distance(&m.goal());
    for step in trajectory.iter() {
        assert!(!m.hazards().contains(&step.to));
        let d = step.to.distance(&m.goal());
        assert!(d < distance);
        distance = d;
    }
    assert_eq!(agent.pos, m.goal());
}

#[test]
fn policy_iteration_matches_value_iteration_on_small_grid() {
    let m = small_grid();
    let vi = value_iteration(&m, 0.9, 0.01).unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    let pi = policy_iteration(&m, 0.9, 0.01, &mut rng).unwrap();
    assert_eq!(vi.policy, pi.policy);
}

#[test_case(0.0; "deterministic")]
#[test_case(0.05; "slippery")]
#[test_case(0.2; "very slippery")]
fn dynamic_programming_methods_agree(error_prob: f64) {
    let m = maze(&LARGE, error_prob);
    let vi = value_iteration(&m, 0.9, 1e-6).unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    let pi = policy_iteration(&m, 0.9, 1e-6, &mut rng).unwrap();

    for state in m.states() {
        assert_abs_diff_eq!(vi.utilities.get(*state), pi.utilities.get(*state), epsilon = 1e-3);
    }
    let vi_value = evaluate_policy(&m, &vi.policy, 0.9, 1e-6).unwrap();
    let pi_value = evaluate_policy(&m, &pi.policy, 0.9, 1e-6).unwrap();
    assert_abs_diff_eq!(
        vi_value.get(m.start_pos()),
        pi_value.get(m.start_pos()),
        epsilon = 1e-3
    );
}

#[test_case(0.0; "deterministic")]
#[test_case(0.1; "slippery")]
#[test_case(0.3; "very slippery")]
fn every_transition_is_a_distribution(error_prob: f64) {
    let m = maze(&LARGE, error_prob);
    for &state in m.states() {
        for action in m.actions_from(state) {
            let dist = m.transition(state, action).unwrap();
            let total: f64 = dist.iter().map(|(_, p)| p).sum();
            assert_abs_diff_eq!(total, 1.0, epsilon = PROB_TOLERANCE);
            for &(to, p) in dist.iter() {
                assert!(p >= 0.0);
                assert!(m.states().contains(&to));
            }
        }
    }
}

#[test]
fn dive_reaches_the_other_holes_only() {
    let m = maze(&LARGE, 0.1);
    let holes = m.holes().to_vec();
    assert_eq!(holes.len(), 2);
    for &hole in holes.iter() {
        assert!(m.actions_from(hole).contains(&Movement::Dive));
        let dist = m.transition(hole, Movement::Dive).unwrap();
        assert_eq!(dist.probability(hole), 0.0);
        assert_eq!(dist.len(), 1);
    }
    assert!(!m.actions_from(m.start_pos()).contains(&Movement::Dive));
    assert!(matches!(
        m.transition(m.start_pos(), Movement::Dive),
        Err(MdpError::InvalidAction { .. })
    ));
}

#[test_case(Algorithm::ValueIteration; "value iteration")]
#[test_case(Algorithm::PolicyIteration; "policy iteration")]
fn terminal_states_keep_their_reward(algorithm: Algorithm) {
    let m = maze(&LARGE, 0.1);
    let solution = solve(&m, algorithm, 0.9, &Params::default()).unwrap();
    let utilities = solution.utilities.unwrap();
    assert_abs_diff_eq!(utilities.get(m.goal()), 100.0);
    for hazard in m.hazards() {
        assert_abs_diff_eq!(utilities.get(*hazard), -100.0);
        assert_eq!(solution.policy.action(*hazard), None);
    }
    assert_eq!(solution.policy.action(m.goal()), None);
    for state in m.non_terminal_states() {
        assert!(solution.policy.action(*state).is_some());
    }
}

#[test]
fn q_learning_finds_the_way_down_a_corridor() {
    let m = maze(&["S....G"], 0.0);
    let params = Params {
        learning_rate: 0.5,
        episodes: 1000,
        seed: 42,
        ..Params::default()
    };
    let solution = solve(&m, Algorithm::QLearning, 0.9, &params).unwrap();
    for x in 0..5 {
        assert_eq!(solution.policy.action(Pos::new(x, 0)), Some(Movement::Right));
    }
}

#[test]
fn planning_and_learning_charge_the_same_movement_costs() {
    let rows = ["S...G"];
    let params = Params {
        learning_rate: 1.0,
        episodes: 2000,
        seed: 17,
        ..Params::default()
    };
    let solve_both = |move_cost: f64| {
        let m = costly_maze(&rows, move_cost);
        let vi = solve(&m, Algorithm::ValueIteration, 0.9, &params).unwrap();
        let ql = solve(&m, Algorithm::QLearning, 0.9, &params).unwrap();
        (m, vi.utilities.unwrap(), ql.q_table.unwrap())
    };
    let (free, free_u, free_q) = solve_both(0.0);
    let (costly, costly_u, costly_q) = solve_both(1.0);

    // Utilities discount the terminal reward once more than Q-values do, so
    // compare what the movement costs take away from each.
    for x in 0..4 {
        let s = Pos::new(x, 0);
        let u_cost = costly_u.get(s) - free_u.get(s);
        let q_cost = costly_q.max_q_value(s, &costly.actions_from(s))
            - free_q.max_q_value(s, &free.actions_from(s));
        assert_abs_diff_eq!(u_cost, q_cost, epsilon = 1e-3);
    }
    // Stepping onto the goal is free for both.
    assert_abs_diff_eq!(costly_u.get(Pos::new(3, 0)), 90.0, epsilon = 1e-3);
    assert_abs_diff_eq!(
        costly_q.q_value(Pos::new(3, 0), Movement::Right),
        100.0,
        epsilon = 1e-9
    );
}

#[test]
fn q_learning_is_reproducible_under_a_seed() {
    let m = maze(&LARGE, 0.1);
    let params = Params {
        episodes: 200,
        seed: 9,
        exploration: Exploration::SoftMax { temperature: 2.0 },
        ..Params::default()
    };
    let a = solve(&m, Algorithm::QLearning, 0.9, &params).unwrap();
    let b = solve(&m, Algorithm::QLearning, 0.9, &params).unwrap();
    assert_eq!(a.q_table, b.q_table);
    assert_eq!(a.episode_rewards, b.episode_rewards);
}

#[test]
fn planning_needs_a_transition_model() {
    let problem = ModelFree::new(small_grid());
    assert!(problem.model().is_none());
    assert!(matches!(
        solve(&problem, Algorithm::ValueIteration, 0.9, &Params::default()),
        Err(MdpError::UnsupportedProblem { .. })
    ));
    let params = Params {
        episodes: 100,
        ..Params::default()
    };
    let solution = solve(&problem, Algorithm::QLearning, 0.9, &params).unwrap();
    assert!(!solution.policy.is_empty());
}
