use thiserror::Error;

use crate::environment::{Movement, Pos};

#[derive(Debug, Error)]
pub enum MdpError {
    #[error("{algorithm} can not be applied to this problem (model is not visible)")]
    UnsupportedProblem { algorithm: &'static str },

    #[error("action {action:?} is not possible from {state}")]
    InvalidAction { state: Pos, action: Movement },

    #[error("invalid value for {name}: {value} (using {default})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        default: String,
    },

    #[error("malformed distribution: {0}")]
    MalformedDistribution(String),

    #[error("cell {0} has no reachable neighbour")]
    IsolatedCell(Pos),

    #[error("invalid maze layout: {0}")]
    InvalidLayout(String),

    #[error("unable to read configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, MdpError>;
