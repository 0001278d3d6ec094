#![warn(clippy::pedantic)]

use clap::{Parser, Subcommand, ValueEnum};
use cube_core::{
    CubieState,
    facelet::{from_facelets, to_facelets},
    moves::{format_sequence, parse_sequence},
    scramble::random_state,
};
use cube_solver::{
    Algorithm, Config, FourPhase, Optimal, TableRepository, TwoPhase, orchestrator::Estimate,
    solve,
};
use env_logger::TimestampPrecision;
use log::{LevelFilter, error, info};
use std::{error::Error, path::PathBuf, process::ExitCode};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Solver and table settings, in TOML format.
    #[arg(long, short = 'c', value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    log_level: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, ValueEnum)]
enum AlgorithmArg {
    FourPhase,
    TwoPhase,
    Optimal,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::FourPhase => Algorithm::FourPhase(FourPhase),
            AlgorithmArg::TwoPhase => Algorithm::TwoPhase(TwoPhase),
            AlgorithmArg::Optimal => Algorithm::Optimal(Optimal),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and cache the tables an algorithm needs.
    Tables {
        /// Only this algorithm's tables. All of them when absent.
        #[arg(long, short)]
        algorithm: Option<AlgorithmArg>,
    },
    /// Solve a scrambled cube.
    Solve {
        #[arg(long, short, default_value = "two-phase")]
        algorithm: AlgorithmArg,
        /// The cube as 54 facelets in U R F D L B order.
        #[arg(long, conflicts_with_all = ["scramble", "random"])]
        facelets: Option<String>,
        /// Solve a random state generated from this seed.
        #[arg(long, conflicts_with = "scramble")]
        random: Option<u64>,
        /// The scramble to solve, e.g. "R U R' U'".
        scramble: Vec<String>,
    },
    /// Print the optimal search's lower bound for a scramble.
    Estimate {
        /// The scramble to estimate, e.g. "R U R' U'".
        scramble: Vec<String>,
    },
    /// Print the default configuration.
    Config,
}

fn parse_state(scramble: &[String]) -> Result<CubieState, Box<dyn Error>> {
    Ok(CubieState::from_moves(&parse_sequence(&scramble.join(" "))?))
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Tables { algorithm } => {
            let algorithms = match algorithm {
                Some(algorithm) => vec![algorithm.into()],
                None => Algorithm::ALL.to_vec(),
            };
            let tables = algorithms
                .into_iter()
                .fold(
                    TableRepository::builder().with_config(config.tables.clone()),
                    |builder, algorithm| builder.with_algorithm(algorithm, &config.solve),
                )
                .build()?;
            for table in tables.move_tables() {
                println!(
                    "{:<28} {:>8} entries",
                    table.name(),
                    table.data().len()
                );
            }
            for db in tables.pattern_dbs() {
                println!(
                    "{:<28} max depth {:>2}  {:?}",
                    db.kind().name(),
                    db.max_depth(),
                    &db.populations()[..=usize::from(db.max_depth())]
                );
            }
        }
        Commands::Solve {
            algorithm,
            facelets,
            random,
            scramble,
        } => {
            let state = match (facelets, random) {
                (Some(facelets), _) => from_facelets(&facelets)?,
                (None, Some(seed)) => random_state(&mut fastrand::Rng::with_seed(seed)),
                (None, None) => parse_state(&scramble)?,
            };
            info!("Solving {}", to_facelets(&state));
            let algorithm = Algorithm::from(algorithm);
            let tables = TableRepository::builder()
                .with_config(config.tables.clone())
                .with_algorithm(algorithm, &config.solve)
                .build()?;
            let solution = solve(&state, algorithm, &tables, &config.solve)?;
            println!("{solution} ({} moves, {})", solution.len(), solution.algorithm);
            for report in &solution.phases {
                println!(
                    "  {:<20} {} ({} nodes)",
                    report.phase.to_string(),
                    format_sequence(&report.moves),
                    report.nodes
                );
            }
        }
        Commands::Estimate { scramble } => {
            let state = parse_state(&scramble)?;
            let algorithm = Algorithm::Optimal(Optimal);
            let tables = TableRepository::builder()
                .with_config(config.tables.clone())
                .with_algorithm(algorithm, &config.solve)
                .build()?;
            let Estimate {
                lower_bound,
                breakdown,
            } = Optimal::estimate(&state, &tables, &config.solve)?;
            for (kind, estimate) in breakdown {
                println!("{:<20} {estimate}", kind.name());
            }
            println!("lower bound: {lower_bound}");
        }
        Commands::Config => print!("{}", toml::to_string_pretty(&config)?),
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(match cli.log_level {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
