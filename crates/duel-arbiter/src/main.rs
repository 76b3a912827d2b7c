use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;

use duel_arbiter::arena::{Arena, ScoreBoard};
use duel_arbiter::config::{DuelConfig, MatchConfig};
use duel_arbiter::protocol::Dialect;

#[derive(Parser)]
#[command(name = "duel-arbiter")]
#[command(about = "Engine-vs-engine chess match arbiter")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "duel.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a match between two engines
    Run {
        /// First engine: a name from the config file or an executable path
        engine1: String,
        /// Second engine: a name from the config file or an executable path
        engine2: String,
        /// Number of games to play
        #[arg(short, long)]
        games: Option<u32>,
        /// Per-move time limit in milliseconds
        #[arg(short = 't', long)]
        movetime: Option<u64>,
        /// Starting position as a FEN string
        #[arg(long)]
        fen: Option<String>,
        /// Random opening plies per side
        #[arg(long)]
        random_plies: Option<u32>,
        /// Color-token dialect spoken by the engines
        #[arg(long, value_enum)]
        dialect: Option<Dialect>,
        /// Echo every move and FEN line as it arrives
        #[arg(long)]
        print_moves: bool,
        /// Do not persist game transcripts
        #[arg(long)]
        no_save: bool,
        /// Directory game transcripts are written into
        #[arg(long)]
        games_dir: Option<PathBuf>,
        /// Seed for openings and color assignment (reproducible runs)
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let file = match DuelConfig::load(&cli.config) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return ExitCode::from(2);
        }
    };

    match cli.command {
        Commands::Run {
            engine1,
            engine2,
            games,
            movetime,
            fen,
            random_plies,
            dialect,
            print_moves,
            no_save,
            games_dir,
            seed,
        } => {
            let defaults = &file.defaults;
            let config = MatchConfig {
                engine1: file.resolve_engine(&engine1),
                engine2: file.resolve_engine(&engine2),
                games: games.unwrap_or(defaults.games),
                movetime_ms: movetime.unwrap_or(defaults.movetime_ms),
                timeout_margin_ms: defaults.timeout_margin_ms,
                handshake_timeout_ms: defaults.handshake_timeout_ms,
                random_plies_per_side: random_plies.unwrap_or(defaults.random_plies_per_side),
                initial_fen: fen.unwrap_or_else(|| defaults.initial_fen.clone()),
                max_plies: defaults.max_plies,
                dialect: dialect.unwrap_or(defaults.dialect),
                print_moves,
                save_games: !no_save && defaults.save_games,
                save_canceled: defaults.save_canceled,
                games_dir: games_dir.unwrap_or_else(|| defaults.games_dir.clone()),
            };

            if let Err(e) = config.validate() {
                eprintln!("Config error: {}", e);
                return ExitCode::from(2);
            }

            tracing::info!(
                games = config.games,
                engine1 = %config.engine1.display_name(),
                engine2 = %config.engine2.display_name(),
                "starting match"
            );

            let arena = Arena::new(&config);
            let score = match seed {
                Some(seed) => {
                    let mut rng = StdRng::seed_from_u64(seed);
                    arena.run(&mut rng)
                }
                None => {
                    let mut rng = rand::thread_rng();
                    arena.run(&mut rng)
                }
            };

            report(&config, &score);
            ExitCode::SUCCESS
        }
    }
}

fn report(config: &MatchConfig, score: &ScoreBoard) {
    println!("Final score:");
    println!(
        "  Wins {}: {}",
        config.engine1.display_name(),
        score.wins_engine1
    );
    println!(
        "  Wins {}: {}",
        config.engine2.display_name(),
        score.wins_engine2
    );
    println!("  Draws: {}", score.draws);
    println!("  Games canceled: {}", score.canceled);
}
