use std::collections::HashMap;

use ordered_float::OrderedFloat;

use crate::environment::{Movement, Pos};
use crate::policy::Policy;

/// Value of pairs that were never updated.
pub const DEFAULT_Q: f64 = 0.0;

/// Estimates of the value of each (state, action) pair. Pairs are only
/// stored once they have been updated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    values: HashMap<(Pos, Movement), f64>,
}

impl QTable {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn q_value(&self, state: Pos, action: Movement) -> f64 {
        self.values
            .get(&(state, action))
            .copied()
            .unwrap_or(DEFAULT_Q)
    }

    pub fn set_q_value(&mut self, state: Pos, action: Movement, value: f64) {
        self.values.insert((state, action), value);
    }

    /// max_a Q(state, a) over `actions`, unvisited pairs counting as the
    /// default.
    pub fn max_q_value(&self, state: Pos, actions: &[Movement]) -> f64 {
        actions
            .iter()
            .map(|a| OrderedFloat(self.q_value(state, *a)))
            .max()
            .map(|q| q.into_inner())
            .unwrap_or(DEFAULT_Q)
    }

    /// The first action of `actions` with the highest Q-value, or `None`
    /// when no action improves on the default.
    pub fn best_action(&self, state: Pos, actions: &[Movement]) -> Option<Movement> {
        let (action, value) = first_max(actions.iter().map(|a| (*a, self.q_value(state, *a))))?;
        if value > DEFAULT_Q {
            Some(action)
        } else {
            None
        }
    }

    /// Greedy policy over the visited pairs. States with no visited pair get
    /// no entry.
    pub fn generate_policy(&self) -> Policy {
        let mut by_state: HashMap<Pos, Vec<(Movement, f64)>> = HashMap::new();
        for (&(state, action), &value) in self.values.iter() {
            by_state.entry(state).or_default().push((action, value));
        }
        let mut policy = Policy::new();
        for (state, mut entries) in by_state {
            entries.sort_by_key(|(action, _)| *action);
            if let Some((action, _)) = first_max(entries.into_iter()) {
                policy.set_action(state, action);
            }
        }
        policy
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Visited pairs, sorted by state and action.
    pub fn entries(&self) -> Vec<(Pos, Movement, f64)> {
        let mut entries: Vec<(Pos, Movement, f64)> = self
            .values
            .iter()
            .map(|(&(s, a), &q)| (s, a, q))
            .collect();
        entries.sort_by_key(|(s, a, _)| (*s, *a));
        entries
    }
}

/// Highest value, ties going to the earliest item.
fn first_max<I>(items: I) -> Option<(Movement, f64)>
where
    I: Iterator<Item = (Movement, f64)>,
{
    items.fold(None, |best, (a, q)| match best {
        Some((_, best_q)) if q <= best_q => best,
        _ => Some((a, q)),
    })
}
