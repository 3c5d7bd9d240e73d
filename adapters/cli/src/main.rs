#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless command-line client: runs a full match between named policies,
//! paces the tick loop, and prints the final stats as JSON. In interactive
//! mode stdin doubles as a control channel carrying pause/resume/step
//! commands and action tokens for a human-controlled player.

mod config;

use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use crossbeam::channel::{unbounded, Receiver};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use blastgrid_core::{PlayerAction, PlayerId};
use blastgrid_driver::{policies, Supervisor};
use blastgrid_recorder::FileRecorder;
use blastgrid_world::{Game, Rules};

use config::MatchConfig;

/// Runs a headless Blastgrid match between the named policies.
#[derive(Debug, Parser)]
#[command(name = "blastgrid", version, about)]
struct Args {
    /// Policy names to pit against each other (at least two).
    #[arg(default_values_t = vec!["random".to_owned(), "random".to_owned()])]
    agents: Vec<String>,

    /// Map seed; a random one is drawn when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Tick cap override for this run.
    #[arg(long)]
    max_iterations: Option<u64>,

    /// Pacing between ticks in milliseconds, overriding the config file.
    #[arg(long)]
    tick_step: Option<u64>,

    /// Write the match log to this file.
    #[arg(long)]
    record: Option<PathBuf>,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Add a human-controlled player and read commands from stdin:
    /// `pause`, `resume`, `step`, `quit`, or an action token (u/d/l/r/p).
    #[arg(long, short)]
    interactive: bool,

    /// Log at debug level.
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = match &args.config {
        Some(path) => MatchConfig::load(path)?,
        None => MatchConfig::default(),
    };
    let seats = args.agents.len() + usize::from(args.interactive);
    anyhow::ensure!(
        seats >= 2,
        "a match needs at least two players, got {seats}"
    );

    let rules = Rules {
        max_iterations: args.max_iterations.or(config.max_iterations),
        ..Rules::default()
    };
    let mut game = match &args.record {
        Some(path) => {
            let recorder = FileRecorder::create(path)
                .with_context(|| format!("failed to create log {}", path.display()))?;
            Game::with_recorder(config.columns, config.rows, rules, Box::new(recorder))
        }
        None => Game::new(config.columns, config.rows, rules),
    };

    let seed = args.seed.unwrap_or_else(rand::random);
    let mut supervisor = Supervisor::new();
    for (index, name) in args.agents.iter().enumerate() {
        let policy_name = name.clone();
        let policy_seed = seed.wrapping_add(index as u64);
        let proxy = supervisor
            .spawn_agent(&format!("{name}-{index}"), move || {
                policies::from_name(&policy_name, policy_seed)
            })
            .with_context(|| format!("failed to start agent '{name}'"))?;
        let _ = game.add_agent(Box::new(proxy), Some(name));
    }

    let human = args.interactive.then(|| game.add_player(Some("you")));
    let commands = args.interactive.then(spawn_stdin_reader);

    game.generate_map(seed)?;
    info!(seed, players = seats, "match started");

    let tick_step = Duration::from_millis(args.tick_step.unwrap_or(config.tick_step_ms));
    let mut paused = false;
    'ticks: while !game.is_over() {
        if let Some(commands) = &commands {
            while let Ok(line) = commands.try_recv() {
                match line.trim() {
                    "" => {}
                    "pause" => paused = true,
                    "resume" => paused = false,
                    "step" => {
                        if paused {
                            step(&mut game);
                        }
                    }
                    "quit" => break 'ticks,
                    token => handle_token(&mut game, human, token),
                }
            }
        }
        if !paused {
            step(&mut game);
        }
        if !tick_step.is_zero() {
            std::thread::sleep(tick_step);
        } else if paused {
            std::thread::sleep(Duration::from_millis(25));
        }
    }
    game.notify_game_over();
    supervisor.stop();

    let stats = game.stats();
    info!(winner = ?stats.winner, ticks = stats.iteration, "match finished");
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn step(game: &mut Game) {
    game.tick();
    if game.tick_counter() % 50 == 0 {
        debug!(tick = game.tick_counter(), "match in progress");
    }
}

fn handle_token(game: &mut Game, human: Option<PlayerId>, token: &str) {
    let Some(pid) = human else {
        return;
    };
    match PlayerAction::from_code(token) {
        Some(action) => game.enqueue_action(pid, action),
        None => warn!(%token, "ignoring unknown command"),
    }
}

/// Reads stdin lines on a dedicated thread; the channel disconnects when
/// stdin closes.
fn spawn_stdin_reader() -> Receiver<String> {
    let (sender, receiver) = unbounded();
    let _ = std::thread::Builder::new()
        .name("stdin".to_owned())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if sender.send(line).is_err() {
                    break;
                }
            }
        });
    receiver
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
