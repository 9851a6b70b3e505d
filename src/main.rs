use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bot_tournament::config::AppConfig;
use bot_tournament::executor::simulated::{SimulatedExecutor, SimulationProfile};
use bot_tournament::observer::{EventObserver, ResultLogger, TracingObserver};
use bot_tournament::storage::JsonlResultLogger;
use bot_tournament::{CancelToken, GameType, Participant, SeriesOrchestrator};

#[derive(Parser)]
#[command(name = "bot-tournament")]
#[command(about = "Group-stage tournament runner for bot competitions")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a series against simulated bots
    Simulate {
        /// Number of bots
        #[arg(long, default_value = "20")]
        bots: usize,

        /// Game types to play, in order (defaults to the configured list)
        #[arg(long, value_delimiter = ',')]
        games: Vec<String>,

        /// Seed for shuffles, coin flips and simulated outcomes
        #[arg(long)]
        seed: Option<u64>,

        /// Override max parallel matches
        #[arg(long)]
        parallel: Option<usize>,

        /// Append every recorded match to this JSONL file
        #[arg(long)]
        results: Option<PathBuf>,
    },

    /// Print the effective configuration
    ShowConfig,
}

fn load_config(path: &PathBuf) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let config = AppConfig::from_file(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;

    // Initialize tracing
    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting bot-tournament v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Simulate {
            bots,
            games,
            seed,
            parallel,
            results,
        } => {
            if seed.is_some() {
                config.tournament.seed = seed;
            }
            if let Some(parallel) = parallel {
                config.tournament.max_parallel_matches = parallel;
            }
            if !games.is_empty() {
                config.series.game_types = games;
            }
            if results.is_some() {
                config.output.results_path = results;
            }
            config.validate()?;

            let participants: Vec<Participant> = (1..=bots)
                .map(|i| Participant::new(format!("bot-{i:03}")))
                .collect();
            let game_types: Vec<GameType> = config
                .series
                .game_types
                .iter()
                .map(|g| GameType::new(g.as_str()))
                .collect();

            let executor = Arc::new(SimulatedExecutor::new(
                SimulationProfile::default(),
                config.tournament.seed,
            ));
            let observer: Arc<dyn EventObserver> = Arc::new(TracingObserver);
            let mut orchestrator =
                SeriesOrchestrator::new(executor, config.tournament.clone()).with_observer(observer);
            if let Some(path) = &config.output.results_path {
                let logger: Arc<dyn ResultLogger> = Arc::new(JsonlResultLogger::new(path.clone()));
                orchestrator = orchestrator.with_result_logger(logger);
            }

            let cancel = CancelToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, cancelling");
                    on_signal.cancel();
                }
            });

            let state = orchestrator
                .run_series(participants, game_types, &cancel)
                .await?;

            println!("\n=== Series Results ===");
            for tournament in &state.tournaments {
                println!(
                    "{:<16} champion: {}",
                    tournament.game_type,
                    tournament.champion.as_deref().unwrap_or("-")
                );
            }
            println!("\n{:<4} {:<12} {:>6} {:>5} {:>5} {:>5} {:>6}", "#", "Bot", "Score", "W", "L", "D", "Titles");
            for (i, bot) in state.leaderboard().iter().enumerate() {
                println!(
                    "{:<4} {:<12} {:>6} {:>5} {:>5} {:>5} {:>6}",
                    i + 1,
                    bot.participant,
                    bot.total_score,
                    bot.total_wins,
                    bot.total_losses,
                    bot.total_draws,
                    bot.tournament_wins
                );
            }
            println!(
                "\nSeries champion: {}",
                state.champion.as_deref().unwrap_or("-")
            );
            if let Some(path) = &config.output.results_path {
                println!("Results logged to: {}", path.display());
            }
        }

        Commands::ShowConfig => {
            config.validate()?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
