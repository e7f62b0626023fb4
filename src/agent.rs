use rand::rngs::StdRng;

use crate::environment::{Movement, Pos};
use crate::error::Result;
use crate::policy::Policy;
use crate::problem::LearningProblem;

/// What the agent observed after one action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub from: Pos,
    pub action: Movement,
    pub to: Pos,
    pub reward: f64,
    pub terminal: bool,
}

pub struct Agent {
    pub pos: Pos,
    pub reward: f64,
    pub steps: usize,
}

impl Agent {
    pub fn new(start: Pos) -> Self {
        Self {
            pos: start,
            reward: 0.0,
            steps: 0,
        }
    }

    /// Applies `movement` and observes the new state. The reward is the one
    /// of the reached state, plus the movement cost unless that state is
    /// terminal.
    pub fn r#move<P>(&mut self, problem: &P, movement: Movement, rng: &mut StdRng) -> Result<Step>
    where
        P: LearningProblem + ?Sized,
    {
        let from = self.pos;
        let to = problem.sample_successor(from, movement, rng)?;
        let terminal = problem.is_terminal(to);
        let mut reward = problem.reward(to);
        if !terminal {
            reward += problem.transition_reward(from, movement, to);
        }
        self.pos = to;
        self.reward += reward;
        self.steps += 1;
        Ok(Step {
            from,
            action: movement,
            to,
            reward,
            terminal,
        })
    }

    /// Follows `policy` until a terminal state, a state without an action,
    /// or `max_steps`.
    pub fn follow<P>(
        &mut self,
        problem: &P,
        policy: &Policy,
        max_steps: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<Step>>
    where
        P: LearningProblem + ?Sized,
    {
        let mut trajectory = Vec::new();
        while !problem.is_terminal(self.pos) && trajectory.len() < max_steps {
            let action = match policy.action(self.pos) {
                Some(a) => a,
                None => break,
            };
            trajectory.push(self.r#move(problem, action, rng)?);
        }
        Ok(trajectory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MazeConfig;
    use crate::environment::Maze;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;

    fn corridor() -> Maze {
        Maze::from_config(&MazeConfig {
            rows: vec!["S..G".to_string()],
            error_prob: 0.0,
            ..MazeConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn move_collects_rewards() {
        let m = corridor();
        let mut rng = StdRng::seed_from_u64(0);
        let mut agent = Agent::new(m.start_pos());

        let step = agent.r#move(&m, Movement::Right, &mut rng).unwrap();
        assert_eq!(step.to, Pos::new(1, 0));
        assert!(!step.terminal);
        assert_abs_diff_eq!(step.reward, -1.0);

        agent.r#move(&m, Movement::Right, &mut rng).unwrap();
        let step = agent.r#move(&m, Movement::Right, &mut rng).unwrap();
        // No movement cost is charged on reaching a terminal state.
        assert!(step.terminal);
        assert_abs_diff_eq!(step.reward, 100.0);
        assert_abs_diff_eq!(agent.reward, 98.0);
        assert_eq!(agent.steps, 3);
    }

    #[test]
    fn follow_stops_at_terminal_state() {
        let m = corridor();
        let mut policy = Policy::new();
        for x in 0..3 {
            policy.set_action(Pos::new(x, 0), Movement::Right);
        }
        let mut rng = StdRng::seed_from_u64(0);
        let mut agent = Agent::new(m.start_pos());
        let trajectory = agent.follow(&m, &policy, 100, &mut rng).unwrap();
        assert_eq!(trajectory.len(), 3);
        assert_eq!(agent.pos, m.goal());
    }

    #[test]
    fn follow_respects_step_limit_and_gaps() {
        let m = corridor();
        let mut policy = Policy::new();
        policy.set_action(Pos::new(0, 0), Movement::Right);
        policy.set_action(Pos::new(1, 0), Movement::Left);
        let mut rng = StdRng::seed_from_u64(0);
        let mut agent = Agent::new(m.start_pos());
        assert_eq!(agent.follow(&m, &policy, 7, &mut rng).unwrap().len(), 7);

        let mut partial = Policy::new();
        partial.set_action(Pos::new(0, 0), Movement::Right);
        let mut agent = Agent::new(m.start_pos());
        assert_eq!(agent.follow(&m, &partial, 7, &mut rng).unwrap().len(), 1);
        assert_eq!(agent.pos, Pos::new(1, 0));
    }
}
