//! Goban-Sync: keep GTP engines in step with Go positions.
//!
//! ## Usage
//!
//! - `goban-sync gtp` - Serve the built-in replay engine over stdio
//! - `goban-sync sync [MOVES]...` - Sync a main line to an engine and show its board
//! - `goban-sync demo` - Wander through random variations, syncing each step

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use goban_sync::board::Color;
use goban_sync::config::EngineConfig;
use goban_sync::constants::{DEFAULT_BOARD_SIZE, DEFAULT_KOMI, PASS};
use goban_sync::coord::encode_vertex;
use goban_sync::engine::{EngineActor, EngineController, ProcessTransport, Transport};
use goban_sync::gtp::ReplayEngine;
use goban_sync::handicap::{HandicapLayout, handicap_placement};
use goban_sync::position::MoveOptions;
use goban_sync::record::{GameRecord, NodeData, NodeId, PositionProvider};
use goban_sync::scoring::{ScoreParams, estimate_area, score};
use goban_sync::session::SyncSession;
use goban_sync::sync::{SyncTarget, Synchronizer, replay};

/// Goban-Sync: keep GTP engines in step with Go positions
#[derive(Parser)]
#[command(name = "goban-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the built-in replay engine over GTP on stdin/stdout
    Gtp,
    /// Sync a main line of moves to an engine and print the engine's board
    Sync {
        #[command(flatten)]
        engine: EngineConfig,
        /// Board size
        #[arg(long, default_value_t = DEFAULT_BOARD_SIZE)]
        size: usize,
        /// Komi
        #[arg(long, default_value_t = DEFAULT_KOMI, allow_negative_numbers = true)]
        komi: f64,
        /// Handicap stones placed as root setup
        #[arg(long, default_value_t = 0)]
        handicap: usize,
        /// Moves in GTP coordinates, alternating colors
        moves: Vec<String>,
    },
    /// Play random variations and sync every step
    Demo {
        #[command(flatten)]
        engine: EngineConfig,
        /// Board size
        #[arg(long, default_value_t = 9)]
        size: usize,
        /// Number of steps
        #[arg(long, default_value_t = 40)]
        steps: usize,
        /// RNG seed
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never mix with GTP on stdout.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Gtp) => {
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            ReplayEngine::new().run(stdin.lock(), stdout.lock())?;
        }
        Some(Commands::Sync {
            engine,
            size,
            komi,
            handicap,
            moves,
        }) => {
            let (record, node) = build_record(size, komi, handicap, &moves);
            match &engine.engine {
                Some(path) => {
                    let transport = spawn_engine(path, &engine)?;
                    let mut controller = EngineController::connect(transport).await?;
                    let result = run_sync(&mut controller, &engine, &record, node, handicap).await;
                    controller.transport_mut().quit().await;
                    result?;
                }
                None => {
                    let mut controller = EngineController::connect(ReplayEngine::new()).await?;
                    run_sync(&mut controller, &engine, &record, node, handicap).await?;
                }
            }
        }
        Some(Commands::Demo {
            engine,
            size,
            steps,
            seed,
        }) => match &engine.engine {
            Some(path) => {
                let transport = spawn_engine(path, &engine)?;
                let controller = EngineController::connect(transport).await?;
                let finished = run_demo(controller, &engine, size, steps, seed).await?;
                if let Some(mut controller) = finished {
                    controller.transport_mut().quit().await;
                }
            }
            None => {
                let controller = EngineController::connect(ReplayEngine::new()).await?;
                run_demo(controller, &engine, size, steps, seed).await?;
            }
        },
        None => {
            let controller = EngineController::connect(ReplayEngine::new()).await?;
            run_demo(controller, &EngineConfig::default(), 9, 20, 1).await?;
        }
    }
    Ok(())
}

fn spawn_engine(path: &str, config: &EngineConfig) -> Result<ProcessTransport> {
    ProcessTransport::spawn(path, &config.engine_args, config.timeout())
        .with_context(|| format!("failed to start engine {path}"))
}

/// Main line with optional handicap setup on the root.
fn build_record(size: usize, komi: f64, handicap: usize, moves: &[String]) -> (GameRecord, NodeId) {
    let stones: Vec<String> = handicap_placement(size, size, handicap, HandicapLayout::Standard)
        .into_iter()
        .filter_map(|v| encode_vertex(v, size, size))
        .collect();
    let root = NodeData {
        add_black: stones.clone(),
        komi: Some(komi),
        ..NodeData::default()
    };
    let mut record = GameRecord::new(size, size, root);
    let mut node = record.root();
    let mut color = if stones.is_empty() { Color::Black } else { Color::White };
    for mv in moves {
        node = record.add_node(node, NodeData::play(color, mv));
        color = color.opponent();
    }
    (record, node)
}

async fn run_sync<T: Transport>(
    controller: &mut EngineController<T>,
    config: &EngineConfig,
    record: &GameRecord,
    node: NodeId,
    handicap: usize,
) -> Result<()> {
    let target = SyncTarget::resolve(record, node).context("record node has no position")?;
    let outcome = Synchronizer::new(config.sync_options())
        .sync(controller, &target)
        .await?;
    println!(
        "Synchronized with {} ({} commands sent)\n",
        outcome.strategy, outcome.commands_sent
    );

    let size = target.position.width();
    let believed = replay(&controller.state().history, size);
    println!("{believed}");

    let area = estimate_area(&target.position);
    let result = score(
        &target.position,
        &area,
        ScoreParams {
            komi: target.komi,
            handicap: handicap as u32,
        },
    );
    println!(
        "Estimated score: area {:+.1}, territory {:+.1}",
        result.area_score, result.territory_score
    );
    Ok(())
}

/// Random walk over a growing record: mostly extend the line, sometimes
/// jump back to an earlier node, syncing the engine at every step.
///
/// Hands the engine back once the session has stopped.
async fn run_demo<T: Transport + 'static>(
    controller: EngineController<T>,
    config: &EngineConfig,
    size: usize,
    steps: usize,
    seed: u64,
) -> Result<Option<EngineController<T>>> {
    println!("Goban-Sync demo: {size}x{size}, {steps} steps\n");
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut record = GameRecord::new(size, size, NodeData::default());
    let mut node = record.root();
    let mut color = Color::Black;
    let mut session = SyncSession::spawn(controller, Synchronizer::new(config.sync_options()));

    for step in 0..steps {
        if step > 0 && rng.u32(0..6) == 0 {
            let ancestry = record.ancestry(node);
            node = ancestry[rng.usize(0..ancestry.len())];
        } else {
            let pos = record.resolve(node).context("demo node has no position")?;
            let strict = MoveOptions {
                prevent_overwrite: true,
                prevent_suicide: true,
            };
            let candidates: Vec<_> = (0..size as i32)
                .flat_map(|x| (0..size as i32).map(move |y| (x, y)))
                .filter(|&v| pos.try_move(color.sign(), v, strict).is_ok())
                .collect();
            let vertex = if candidates.is_empty() {
                PASS
            } else {
                candidates[rng.usize(0..candidates.len())]
            };
            let coord = encode_vertex(vertex, size, size).unwrap_or_else(|| "pass".into());
            node = record.add_node(node, NodeData::play(color, &coord));
            color = color.opponent();
        }

        let target = SyncTarget::resolve(&record, node).context("demo node has no position")?;
        session.submit(target);
        if let Some(report) = session.settle().await {
            match report.result {
                Ok(outcome) => println!(
                    "step {step:>3}: node {node:>3} -> {} ({} commands)",
                    outcome.strategy, outcome.commands_sent
                ),
                Err(e) => println!("step {step:>3}: node {node:>3} -> {e}"),
            }
        }
    }

    let controller = session.shutdown().await;
    if let Some(controller) = &controller {
        info!(history = controller.state().history.len(), "demo finished");
    }
    Ok(controller)
}
