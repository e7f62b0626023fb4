pub mod agent;
pub mod config;
pub mod distribution;
pub mod dp;
pub mod environment;
pub mod error;
pub mod policy;
pub mod problem;
pub mod q_table;
pub mod report;
pub mod rl;
pub mod solver;
