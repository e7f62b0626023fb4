use std::collections::HashMap;
use std::fmt;

use ndarray::Array2;
use tracing::debug;

use crate::config::MazeConfig;
use crate::distribution::StateDistribution;
use crate::error::{MdpError, Result};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Wall,
    Hole,
    Slow,
}

// Action
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Movement {
    Up,
    Down,
    Left,
    Right,
    Dive,
}

impl Movement {
    /// Offset of a directional move, `None` for a dive.
    pub fn into_vector(self) -> Option<(isize, isize)> {
        match self {
            Movement::Up => Some((0, -1)),
            Movement::Down => Some((0, 1)),
            Movement::Left => Some((-1, 0)),
            Movement::Right => Some((1, 0)),
            Movement::Dive => None,
        }
    }

    pub fn directions() -> [Movement; 4] {
        [Movement::Up, Movement::Down, Movement::Left, Movement::Right]
    }

    pub fn symbol(self) -> char {
        match self {
            Movement::Up => '^',
            Movement::Down => 'v',
            Movement::Left => '<',
            Movement::Right => '>',
            Movement::Dive => '@',
        }
    }
}

/// A cell of the maze. `x` is the column, `y` the row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos {
    pub x: usize,
    pub y: usize,
}

impl Pos {
    pub fn new(x: usize, y: usize) -> Self {
        Pos { x, y }
    }

    pub fn distance(&self, other: &Pos) -> f64 {
        let dx = self.x as f64 - other.x as f64;
        let dy = self.y as f64 - other.y as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

pub struct Maze {
    cells: Array2<Cell>,
    start: Pos,
    goal: Pos,
    hazards: Vec<Pos>,
    holes: Vec<Pos>,
    error_prob: f64,
    goal_reward: f64,
    hazard_reward: f64,
    move_cost: f64,
    states: Vec<Pos>,
    non_terminal: Vec<Pos>,
    transition: HashMap<(Pos, Movement), StateDistribution>,
}

impl Maze {
    /// Builds a maze from its text layout.
    ///
    /// `.` empty, `#` wall, `O` hole, `~` slow terrain, `S` start, `G` goal
    /// and `C` hazard. Fails on malformed layouts, on cells that can not be
    /// left, and on transition distributions that do not add up.
    pub fn from_config(config: &MazeConfig) -> Result<Self> {
        let config = config.sanitized();
        let height = config.rows.len();
        let width = config.rows.first().map(|r| r.chars().count()).unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(MdpError::InvalidLayout("empty maze".to_string()));
        }

        let mut cells = Array2::from_elem((width, height), Cell::Empty);
        let mut start = None;
        let mut goal = None;
        let mut hazards = Vec::new();
        let mut holes = Vec::new();

        for (y, row) in config.rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(MdpError::InvalidLayout(format!(
                    "row {} has {} cells, expected {}",
                    y,
                    row.chars().count(),
                    width
                )));
            }
            for (x, c) in row.chars().enumerate() {
                let pos = Pos::new(x, y);
                cells[[x, y]] = match c {
                    '.' => Cell::Empty,
                    '#' => Cell::Wall,
                    'O' => {
                        holes.push(pos);
                        Cell::Hole
                    }
                    '~' => Cell::Slow,
                    'S' => {
                        if start.replace(pos).is_some() {
                            return Err(MdpError::InvalidLayout("more than one start".to_string()));
                        }
                        Cell::Empty
                    }
                    'G' => {
                        if goal.replace(pos).is_some() {
                            return Err(MdpError::InvalidLayout("more than one goal".to_string()));
                        }
                        Cell::Empty
                    }
                    'C' => {
                        hazards.push(pos);
                        Cell::Empty
                    }
                    other => {
                        return Err(MdpError::InvalidLayout(format!(
                            "unknown cell '{}' at {}",
                            other, pos
                        )))
                    }
                };
            }
        }

        let start = start.ok_or_else(|| MdpError::InvalidLayout("no start cell".to_string()))?;
        let goal = goal.ok_or_else(|| MdpError::InvalidLayout("no goal cell".to_string()))?;
        // Holes are kept in enumeration order (column by column).
        holes.sort();
        hazards.sort();

        let mut maze = Self {
            cells,
            start,
            goal,
            hazards,
            holes,
            error_prob: config.error_prob,
            goal_reward: config.goal_reward,
            hazard_reward: config.hazard_reward,
            move_cost: config.move_cost,
            states: Vec::new(),
            non_terminal: Vec::new(),
            transition: HashMap::new(),
        };
        maze.states = maze.iter().filter(|p| maze.cell(*p) != Cell::Wall).collect();
        maze.non_terminal = maze
            .states
            .iter()
            .copied()
            .filter(|p| !maze.is_terminal(*p))
            .collect();
        if maze.non_terminal.is_empty() {
            return Err(MdpError::InvalidLayout("no non-terminal cell".to_string()));
        }
        if maze.is_terminal(maze.start) {
            return Err(MdpError::InvalidLayout("start cell is terminal".to_string()));
        }
        maze.setup_transition_map()?;
        Ok(maze)
    }

    fn setup_transition_map(&mut self) -> Result<()> {
        let mut transition = HashMap::new();
        for &pos in self.states.iter() {
            let reachable = self.reachable_neighbours(pos);
            if reachable.is_empty() {
                return Err(MdpError::IsolatedCell(pos));
            }
            // Probability of error for every wrong direction.
            let k = reachable.len() as f64;
            let prob_success = 1.0 - self.error_prob * (k - 1.0);

            for &(movement, _) in reachable.iter() {
                let options = reachable
                    .iter()
                    .map(|&(m, new_pos)| {
                        let p = if m == movement { prob_success } else { self.error_prob };
                        (new_pos, p)
                    })
                    .collect();
                transition.insert((pos, movement), StateDistribution::new(options)?);
            }

            if self.can_dive(pos) {
                let targets = self.holes.iter().copied().filter(|h| *h != pos).collect();
                transition.insert((pos, Movement::Dive), StateDistribution::uniform(targets)?);
            }
        }
        debug!(
            states = self.states.len(),
            pairs = transition.len(),
            "Transition map setup"
        );
        self.transition = transition;
        Ok(())
    }

    /// Orthogonal neighbours that are inside the grid and not walls, in
    /// enumeration order.
    fn reachable_neighbours(&self, pos: Pos) -> Vec<(Movement, Pos)> {
        Movement::directions()
            .iter()
            .filter_map(|&m| self.neighbour(pos, m).map(|p| (m, p)))
            .collect()
    }

    pub fn neighbour(&self, pos: Pos, movement: Movement) -> Option<Pos> {
        let (dx, dy) = movement.into_vector()?;
        let x = pos.x as isize + dx;
        let y = pos.y as isize + dy;
        if x < 0 || y < 0 || x >= self.width() as isize || y >= self.height() as isize {
            return None;
        }
        let new_pos = Pos::new(x as usize, y as usize);
        if self.cell(new_pos) == Cell::Wall {
            None
        } else {
            Some(new_pos)
        }
    }

    fn can_dive(&self, pos: Pos) -> bool {
        self.cell(pos) == Cell::Hole && self.holes.len() >= 2
    }

    pub fn width(&self) -> usize {
        self.cells.dim().0
    }

    pub fn height(&self) -> usize {
        self.cells.dim().1
    }

    pub fn cell(&self, pos: Pos) -> Cell {
        self.cells[[pos.x, pos.y]]
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos.x < self.width() && pos.y < self.height()
    }

    pub fn start_pos(&self) -> Pos {
        self.start
    }

    pub fn goal(&self) -> Pos {
        self.goal
    }

    pub fn hazards(&self) -> &[Pos] {
        &self.hazards
    }

    pub fn holes(&self) -> &[Pos] {
        &self.holes
    }

    /// Non-wall cells, column by column.
    pub fn states(&self) -> &[Pos] {
        &self.states
    }

    pub fn non_terminal_states(&self) -> &[Pos] {
        &self.non_terminal
    }

    pub fn is_terminal(&self, pos: Pos) -> bool {
        pos == self.goal || self.hazards.contains(&pos)
    }

    pub fn state_reward(&self, pos: Pos) -> f64 {
        if self.hazards.contains(&pos) {
            self.hazard_reward
        } else if pos == self.goal {
            self.goal_reward
        } else {
            0.0
        }
    }

    pub fn actions_from(&self, pos: Pos) -> Vec<Movement> {
        if !self.contains(pos) || self.cell(pos) == Cell::Wall {
            return Vec::new();
        }
        let mut actions: Vec<Movement> = self
            .reachable_neighbours(pos)
            .into_iter()
            .map(|(m, _)| m)
            .collect();
        if self.can_dive(pos) {
            actions.push(Movement::Dive);
        }
        actions
    }

    /// Movement cost: euclidean distance, halved when diving, doubled when
    /// leaving slow terrain.
    pub fn movement_cost(&self, from: Pos, movement: Movement, to: Pos) -> f64 {
        let mut reward = from.distance(&to);
        if movement == Movement::Dive {
            reward *= 0.5;
        } else if self.cell(from) == Cell::Slow {
            reward *= 2.0;
        }
        -(reward * self.move_cost)
    }

    pub fn transition(&self, pos: Pos, movement: Movement) -> Result<&StateDistribution> {
        self.transition
            .get(&(pos, movement))
            .ok_or(MdpError::InvalidAction {
                state: pos,
                action: movement,
            })
    }

    pub fn iter(&self) -> EnvIter {
        EnvIter::new(self.width(), self.height())
    }
}

/// Iterates over every coordinate of the grid, column by column.
pub struct EnvIter {
    currx: usize,
    curry: usize,
    width: usize,
    height: usize,
}

impl EnvIter {
    fn new(width: usize, height: usize) -> EnvIter {
        EnvIter {
            currx: 0,
            curry: 0,
            width,
            height,
        }
    }
}

impl Iterator for EnvIter {
    type Item = Pos;

    fn next(&mut self) -> Option<Pos> {
        if self.currx >= self.width || self.height == 0 {
            return None;
        }
        let pos = Pos::new(self.currx, self.curry);
        self.curry += 1;
        if self.curry == self.height {
            self.curry = 0;
            self.currx += 1;
        }
        Some(pos)
    }
}
