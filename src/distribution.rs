use rand::Rng;

use crate::environment::Pos;
use crate::error::{MdpError, Result};

/// Tolerance on the total probability mass of a distribution.
pub const PROB_TOLERANCE: f64 = 1e-9;

/// Discrete probability distribution over successor states.
///
/// Outcomes keep the order in which they were built, so sampling with the
/// same random source always picks the same successor.
#[derive(Debug, Clone, PartialEq)]
pub struct StateDistribution {
    outcomes: Vec<(Pos, f64)>,
}

impl StateDistribution {
    pub fn new(outcomes: Vec<(Pos, f64)>) -> Result<Self> {
        if outcomes.is_empty() {
            return Err(MdpError::MalformedDistribution(
                "no reachable successor".to_string(),
            ));
        }
        for (pos, p) in outcomes.iter() {
            if !p.is_finite() || *p < 0.0 {
                return Err(MdpError::MalformedDistribution(format!(
                    "probability {} for successor {}",
                    p, pos
                )));
            }
        }
        let total: f64 = outcomes.iter().map(|(_, p)| p).sum();
        if (total - 1.0).abs() > PROB_TOLERANCE {
            return Err(MdpError::MalformedDistribution(format!(
                "probabilities sum to {}",
                total
            )));
        }
        Ok(Self { outcomes })
    }

    /// Every outcome gets the same share of the probability mass.
    pub fn uniform(successors: Vec<Pos>) -> Result<Self> {
        let p = 1.0 / successors.len() as f64;
        Self::new(successors.into_iter().map(|pos| (pos, p)).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Pos, f64)> {
        self.outcomes.iter()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn probability(&self, pos: Pos) -> f64 {
        self.outcomes
            .iter()
            .filter(|(p, _)| *p == pos)
            .map(|(_, prob)| prob)
            .sum()
    }

    /// \sum_{s'} P(s') * f(s')
    pub fn expectation<F>(&self, mut f: F) -> f64
    where
        F: FnMut(Pos) -> f64,
    {
        self.outcomes.iter().map(|(pos, p)| p * f(*pos)).sum()
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Pos {
        let r: f64 = rng.gen();
        let mut tot_p = 0.0;
        for (new_pos, p) in self.outcomes.iter() {
            tot_p += p;
            if tot_p > r {
                return *new_pos;
            }
        }
        // Rounding can leave the cumulative mass a hair under r.
        self.outcomes[self.outcomes.len() - 1].0
    }
}
