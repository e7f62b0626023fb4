use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, Level};

use maze_mdp::agent::Agent;
use maze_mdp::config::{check_discount, recover, Config, DEFAULT_DISCOUNT};
use maze_mdp::dp::evaluate_policy;
use maze_mdp::environment::Maze;
use maze_mdp::error::Result;
use maze_mdp::report;
use maze_mdp::solver::{solve, Algorithm, Solution};

/// Steps of the rollout printed after solving.
const ROLLOUT_STEPS: usize = 100;

/// Command line argument parser.
#[derive(Parser, Debug)]
#[command(about = "Solve maze worlds with dynamic programming and Q-learning", long_about = None)]
pub struct Args {
    /// Path to the TOML configuration file.
    config_path: PathBuf,

    /// Raise the log level, once per occurrence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Directory where the policy and value tables are exported as CSV.
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the maze.
    Show,
    /// Solve with value iteration.
    ValueIteration,
    /// Solve with policy iteration.
    PolicyIteration,
    /// Learn a policy with Q-learning.
    QLearning {
        /// Overrides the number of episodes of the configuration.
        #[arg(long)]
        episodes: Option<usize>,
    },
    /// Run every algorithm and show where their policies disagree.
    Compare,
}

fn main() {
    let args = Args::parse();
    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(&args) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    info!(path = %args.config_path.display(), "Reading configuration");
    let mut config = Config::load(&args.config_path)?;
    let maze = Maze::from_config(&config.maze)?;

    match &args.command {
        Commands::Show => {
            print!("{}", report::render_maze(&maze));
            println!(
                "{} states, {} terminal, start {}, goal {}",
                maze.states().len(),
                maze.states().len() - maze.non_terminal_states().len(),
                maze.start_pos(),
                maze.goal()
            );
        }
        Commands::ValueIteration => {
            let solution =
                solve(&maze, Algorithm::ValueIteration, config.discount, &config.params)?;
            show_solution(&maze, &config, &solution, args.csv.as_deref())?;
        }
        Commands::PolicyIteration => {
            let solution =
                solve(&maze, Algorithm::PolicyIteration, config.discount, &config.params)?;
            show_solution(&maze, &config, &solution, args.csv.as_deref())?;
        }
        Commands::QLearning { episodes } => {
            if let Some(episodes) = episodes {
                config.params.episodes = *episodes;
            }
            let solution = solve(&maze, Algorithm::QLearning, config.discount, &config.params)?;
            show_solution(&maze, &config, &solution, args.csv.as_deref())?;
        }
        Commands::Compare => {
            let mut solutions = Vec::new();
            for algorithm in Algorithm::all().iter() {
                let solution = solve(&maze, *algorithm, config.discount, &config.params)?;
                show_solution(&maze, &config, &solution, args.csv.as_deref())?;
                solutions.push(solution);
            }
            for (i, a) in solutions.iter().enumerate() {
                for b in solutions.iter().skip(i + 1) {
                    let differences = a.policy.differences(&b.policy);
                    if differences.is_empty() {
                        println!("{} and {} agree", a.algorithm, b.algorithm);
                    } else {
                        let states: Vec<String> =
                            differences.iter().map(|s| s.to_string()).collect();
                        println!(
                            "{} and {} disagree in {} states: {}",
                            a.algorithm,
                            b.algorithm,
                            differences.len(),
                            states.join(" ")
                        );
                    }
                }
            }
        }
    }
    Ok(())
}

fn show_solution(
    maze: &Maze,
    config: &Config,
    solution: &Solution,
    csv: Option<&Path>,
) -> Result<()> {
    let params = config.params.sanitized();
    let discount = recover(check_discount(config.discount), DEFAULT_DISCOUNT);
    let mut rng = StdRng::seed_from_u64(params.seed);

    println!("== {} ==", solution.algorithm);
    print!("{}", report::render_policy(maze, &solution.policy));

    let policy = solution.policy.completed(maze, &mut rng);
    let utilities = evaluate_policy(maze, &policy, discount, params.max_delta)?;
    println!(
        "Evaluation of policy from {}: {:.3}",
        maze.start_pos(),
        utilities.get(maze.start_pos())
    );

    let mut agent = Agent::new(maze.start_pos());
    for step in agent.follow(maze, &solution.policy, ROLLOUT_STEPS, &mut rng)? {
        println!("{:?} => {} {}", step.action, step.to, step.reward);
    }
    println!("Finished at {} with reward {} after {} steps", agent.pos, agent.reward, agent.steps);

    if let Some(dir) = csv {
        export(dir, maze, solution)?;
    }
    Ok(())
}

fn export(dir: &Path, maze: &Maze, solution: &Solution) -> Result<()> {
    fs::create_dir_all(dir)?;
    let slug = solution.algorithm.slug();
    let file = |name: &str| File::create(dir.join(format!("{}-{}.csv", slug, name)));

    report::write_policy_csv(file("policy")?, &solution.policy)?;
    if let Some(utilities) = &solution.utilities {
        report::write_utilities_csv(file("utilities")?, maze, utilities)?;
    }
    if let Some(q_table) = &solution.q_table {
        report::write_q_table_csv(file("q-table")?, q_table)?;
        report::write_learning_curve(file("rewards")?, &solution.episode_rewards)?;
    }
    info!(dir = %dir.display(), "Exported {}", slug);
    Ok(())
}
