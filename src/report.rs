use std::io;

use csv::Writer;
use serde::Serialize;

use crate::environment::{Cell, Maze, Pos};
use crate::error::Result;
use crate::policy::{Policy, UtilityTable};
use crate::q_table::QTable;

fn cell_symbol(maze: &Maze, pos: Pos) -> char {
    if pos == maze.goal() {
        'G'
    } else if maze.hazards().contains(&pos) {
        'C'
    } else if pos == maze.start_pos() {
        'S'
    } else {
        match maze.cell(pos) {
            Cell::Empty => '.',
            Cell::Wall => '#',
            Cell::Hole => 'O',
            Cell::Slow => '~',
        }
    }
}

fn render<F>(maze: &Maze, mut symbol: F) -> String
where
    F: FnMut(Pos) -> char,
{
    let mut out = String::with_capacity((maze.width() + 1) * maze.height());
    for y in 0..maze.height() {
        for x in 0..maze.width() {
            out.push(symbol(Pos::new(x, y)));
        }
        out.push('\n');
    }
    out
}

/// The maze in its layout notation.
pub fn render_maze(maze: &Maze) -> String {
    render(maze, |pos| cell_symbol(maze, pos))
}

/// The maze with every state that has an action replaced by its arrow.
pub fn render_policy(maze: &Maze, policy: &Policy) -> String {
    render(maze, |pos| match policy.action(pos) {
        Some(action) if !maze.is_terminal(pos) => action.symbol(),
        _ => cell_symbol(maze, pos),
    })
}

#[derive(Serialize)]
struct PolicyRow {
    x: usize,
    y: usize,
    action: String,
}

#[derive(Serialize)]
struct UtilityRow {
    x: usize,
    y: usize,
    utility: f64,
}

#[derive(Serialize)]
struct QRow {
    x: usize,
    y: usize,
    action: String,
    q: f64,
}

#[derive(Serialize)]
struct EpisodeRow {
    episode: usize,
    reward: f64,
}

pub fn write_policy_csv<W: io::Write>(out: W, policy: &Policy) -> Result<()> {
    let mut entries: Vec<_> = policy.iter().map(|(s, a)| (*s, *a)).collect();
    entries.sort();
    let mut wtr = Writer::from_writer(out);
    for (state, action) in entries {
        wtr.serialize(PolicyRow {
            x: state.x,
            y: state.y,
            action: format!("{:?}", action),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// One row per state of the maze, walls excluded.
pub fn write_utilities_csv<W: io::Write>(
    out: W,
    maze: &Maze,
    utilities: &UtilityTable,
) -> Result<()> {
    let mut wtr = Writer::from_writer(out);
    for &state in maze.states() {
        wtr.serialize(UtilityRow {
            x: state.x,
            y: state.y,
            utility: utilities.get(state),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_q_table_csv<W: io::Write>(out: W, q_table: &QTable) -> Result<()> {
    let mut wtr = Writer::from_writer(out);
    for (state, action, q) in q_table.entries() {
        wtr.serialize(QRow {
            x: state.x,
            y: state.y,
            action: format!("{:?}", action),
            q,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_learning_curve<W: io::Write>(out: W, episode_rewards: &[f64]) -> Result<()> {
    let mut wtr = Writer::from_writer(out);
    for (episode, &reward) in episode_rewards.iter().enumerate() {
        wtr.serialize(EpisodeRow { episode, reward })?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MazeConfig;
    use crate::environment::Movement;

    fn maze() -> Maze {
        Maze::from_config(&MazeConfig {
            rows: vec!["S.#G".to_string(), "O~.C".to_string(), "...O".to_string()],
            error_prob: 0.0,
            ..MazeConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn maze_renders_back_to_its_layout() {
        assert_eq!(render_maze(&maze()), "S.#G\nO~.C\n...O\n");
    }

    #[test]
    fn policy_arrows_replace_non_terminal_cells() {
        let m = maze();
        let mut policy = Policy::new();
        policy.set_action(Pos::new(0, 0), Movement::Right);
        policy.set_action(Pos::new(1, 0), Movement::Down);
        policy.set_action(Pos::new(0, 1), Movement::Dive);
        policy.set_action(Pos::new(3, 0), Movement::Left);
        assert_eq!(render_policy(&m, &policy), ">v#G\n@~.C\n...O\n");
    }

    #[test]
    fn policy_csv_is_sorted() {
        let mut policy = Policy::new();
        policy.set_action(Pos::new(1, 0), Movement::Up);
        policy.set_action(Pos::new(0, 2), Movement::Left);
        let mut buf = Vec::new();
        write_policy_csv(&mut buf, &policy).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "x,y,action\n0,2,Left\n1,0,Up\n"
        );
    }

    #[test]
    fn utilities_csv_has_a_row_per_state() {
        let m = maze();
        let utilities = UtilityTable::for_problem(&m);
        let mut buf = Vec::new();
        write_utilities_csv(&mut buf, &m, &utilities).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), m.states().len() + 1);
        assert!(text.starts_with("x,y,utility\n"));
        assert!(text.contains("3,0,100.0"));
    }

    #[test]
    fn q_table_and_curve_csv() {
        let mut q = QTable::new();
        q.set_q_value(Pos::new(0, 0), Movement::Right, 1.5);
        let mut buf = Vec::new();
        write_q_table_csv(&mut buf, &q).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "x,y,action,q\n0,0,Right,1.5\n");

        let mut buf = Vec::new();
        write_learning_curve(&mut buf, &[-3.0, 97.5]).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "episode,reward\n0,-3.0\n1,97.5\n"
        );
    }
}
