use std::fmt::Display;
use std::path::Path;

use config_file::FromConfigFile;
use serde::Deserialize;
use tracing::warn;

use crate::error::{MdpError, Result};

pub const DEFAULT_DISCOUNT: f64 = 0.9;
pub const DEFAULT_MAX_DELTA: f64 = 0.01;
pub const DEFAULT_LEARNING_RATE: f64 = 0.1;
pub const DEFAULT_EPISODES: usize = 1000;
pub const DEFAULT_MAX_STEPS: usize = 10_000;
pub const DEFAULT_GREEDINESS: f64 = 0.9;
pub const DEFAULT_TEMPERATURE: f64 = 1.0;
pub const DEFAULT_ERROR_PROB: f64 = 0.1;

/// Hold information read from the TOML configuration file.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub discount: f64,
    pub maze: MazeConfig,
    pub params: Params,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            discount: DEFAULT_DISCOUNT,
            maze: MazeConfig::default(),
            params: Params::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        Config::from_config_file(path).map_err(|e| MdpError::Config(e.to_string()))
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MazeConfig {
    /// One string per row, see `Maze::from_config` for the cell symbols.
    pub rows: Vec<String>,
    /// Probability of slipping into each wrong direction.
    pub error_prob: f64,
    pub goal_reward: f64,
    pub hazard_reward: f64,
    /// Scale of the movement cost, 0 disables it.
    pub move_cost: f64,
}

impl Default for MazeConfig {
    fn default() -> Self {
        MazeConfig {
            rows: Vec::new(),
            error_prob: DEFAULT_ERROR_PROB,
            goal_reward: 100.0,
            hazard_reward: -100.0,
            move_cost: 1.0,
        }
    }
}

impl MazeConfig {
    pub fn sanitized(&self) -> MazeConfig {
        MazeConfig {
            rows: self.rows.clone(),
            error_prob: recover(check_error_prob(self.error_prob), DEFAULT_ERROR_PROB),
            goal_reward: self.goal_reward,
            hazard_reward: self.hazard_reward,
            move_cost: recover(check_move_cost(self.move_cost), 1.0),
        }
    }
}

/// Action selection used while learning Q-values.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Exploration {
    /// Take the greedy action with probability `greediness`.
    EpsilonGreedy { greediness: f64 },
    /// Boltzmann selection over Q-values.
    SoftMax { temperature: f64 },
}

impl Default for Exploration {
    fn default() -> Self {
        Exploration::EpsilonGreedy {
            greediness: DEFAULT_GREEDINESS,
        }
    }
}

/// Tunable knobs of the three algorithms.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Params {
    /// Convergence tolerance of value and policy iteration
    pub max_delta: f64,
    pub learning_rate: f64,
    pub episodes: usize,
    /// Steps after which a Q-learning episode is cut short
    pub max_steps: usize,
    pub seed: u64,
    pub exploration: Exploration,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            max_delta: DEFAULT_MAX_DELTA,
            learning_rate: DEFAULT_LEARNING_RATE,
            episodes: DEFAULT_EPISODES,
            max_steps: DEFAULT_MAX_STEPS,
            seed: 0,
            exploration: Exploration::default(),
        }
    }
}

impl Params {
    /// Replaces every malformed knob by its default. Each substitution is
    /// logged.
    pub fn sanitized(&self) -> Params {
        let exploration = match self.exploration {
            Exploration::EpsilonGreedy { greediness } => Exploration::EpsilonGreedy {
                greediness: recover(check_greediness(greediness), DEFAULT_GREEDINESS),
            },
            Exploration::SoftMax { temperature } => Exploration::SoftMax {
                temperature: recover(check_temperature(temperature), DEFAULT_TEMPERATURE),
            },
        };
        Params {
            max_delta: recover(check_max_delta(self.max_delta), DEFAULT_MAX_DELTA),
            learning_rate: recover(check_learning_rate(self.learning_rate), DEFAULT_LEARNING_RATE),
            episodes: recover(check_episodes(self.episodes), DEFAULT_EPISODES),
            max_steps: recover(check_max_steps(self.max_steps), DEFAULT_MAX_STEPS),
            seed: self.seed,
            exploration,
        }
    }
}

/// Use the checked value, or log why it was rejected and use the default.
pub fn recover<T>(checked: Result<T>, default: T) -> T {
    match checked {
        Ok(value) => value,
        Err(e) => {
            warn!("{}", e);
            default
        }
    }
}

fn invalid<T: Display, D: Display>(name: &'static str, value: T, default: D) -> MdpError {
    MdpError::InvalidParameter {
        name,
        value: value.to_string(),
        default: default.to_string(),
    }
}

/// The convergence bound max_delta * (1 - g) / g needs 0 < g < 1.
pub fn check_discount(discount: f64) -> Result<f64> {
    if discount > 0.0 && discount < 1.0 {
        Ok(discount)
    } else {
        Err(invalid("discount", discount, DEFAULT_DISCOUNT))
    }
}

pub fn check_max_delta(max_delta: f64) -> Result<f64> {
    if max_delta.is_finite() && max_delta > 0.0 {
        Ok(max_delta)
    } else {
        Err(invalid("max_delta", max_delta, DEFAULT_MAX_DELTA))
    }
}

pub fn check_learning_rate(alpha: f64) -> Result<f64> {
    if alpha > 0.0 && alpha <= 1.0 {
        Ok(alpha)
    } else {
        Err(invalid("learning_rate", alpha, DEFAULT_LEARNING_RATE))
    }
}

pub fn check_episodes(episodes: usize) -> Result<usize> {
    if episodes > 0 {
        Ok(episodes)
    } else {
        Err(invalid("episodes", episodes, DEFAULT_EPISODES))
    }
}

pub fn check_max_steps(max_steps: usize) -> Result<usize> {
    if max_steps > 0 {
        Ok(max_steps)
    } else {
        Err(invalid("max_steps", max_steps, DEFAULT_MAX_STEPS))
    }
}

pub fn check_greediness(greediness: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&greediness) {
        Ok(greediness)
    } else {
        Err(invalid("greediness", greediness, DEFAULT_GREEDINESS))
    }
}

pub fn check_temperature(temperature: f64) -> Result<f64> {
    if temperature.is_finite() && temperature > 0.0 {
        Ok(temperature)
    } else {
        Err(invalid("temperature", temperature, DEFAULT_TEMPERATURE))
    }
}

pub fn check_error_prob(error_prob: f64) -> Result<f64> {
    if (0.0..1.0).contains(&error_prob) {
        Ok(error_prob)
    } else {
        Err(invalid("error_prob", error_prob, DEFAULT_ERROR_PROB))
    }
}

pub fn check_move_cost(move_cost: f64) -> Result<f64> {
    if move_cost.is_finite() && move_cost >= 0.0 {
        Ok(move_cost)
    } else {
        Err(invalid("move_cost", move_cost, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_case::test_case;

    #[test_case(0.0, false; "zero")]
    #[test_case(1.0, false; "one")]
    #[test_case(-0.5, false; "negative")]
    #[test_case(f64::NAN, false; "not a number")]
    #[test_case(0.9, true; "usual")]
    #[test_case(0.999, true; "close to one")]
    fn discount_must_be_inside_unit_interval(discount: f64, accepted: bool) {
        assert_eq!(check_discount(discount).is_ok(), accepted);
    }

    #[test]
    fn malformed_params_fall_back_to_defaults() {
        let params = Params {
            max_delta: -1.0,
            learning_rate: f64::NAN,
            episodes: 0,
            max_steps: 0,
            seed: 42,
            exploration: Exploration::EpsilonGreedy { greediness: 1.5 },
        };
        let fixed = params.sanitized();
        assert_eq!(
            fixed,
            Params {
                seed: 42,
                ..Params::default()
            }
        );
    }

    #[test]
    fn valid_params_are_untouched() {
        let params = Params {
            max_delta: 0.001,
            learning_rate: 0.5,
            episodes: 20,
            max_steps: 50,
            seed: 3,
            exploration: Exploration::SoftMax { temperature: 2.0 },
        };
        assert_eq!(params.sanitized(), params);
    }

    #[test]
    fn rejected_value_is_reported() {
        let err = check_learning_rate(3.0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for learning_rate: 3 (using 0.1)"
        );
    }

    #[test]
    fn maze_config_error_prob_is_sanitized() {
        let cfg = MazeConfig {
            error_prob: 1.5,
            move_cost: -2.0,
            ..MazeConfig::default()
        };
        let fixed = cfg.sanitized();
        assert_eq!(fixed.error_prob, DEFAULT_ERROR_PROB);
        assert_eq!(fixed.move_cost, 1.0);
    }

    #[test]
    fn load_toml_config() {
        let path = std::env::temp_dir().join("maze_mdp_config_test.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
discount = 0.95

[maze]
rows = ["S.G", "..C"]
error_prob = 0.0

[params]
episodes = 250
exploration = {{ kind = "soft-max", temperature = 0.5 }}
"#
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.discount, 0.95);
        assert_eq!(config.maze.rows, vec!["S.G".to_string(), "..C".to_string()]);
        assert_eq!(config.maze.error_prob, 0.0);
        assert_eq!(config.maze.goal_reward, 100.0);
        assert_eq!(config.params.episodes, 250);
        assert_eq!(config.params.max_delta, DEFAULT_MAX_DELTA);
        assert_eq!(
            config.params.exploration,
            Exploration::SoftMax { temperature: 0.5 }
        );
    }
}
