//! Integration tests for engine synchronization.
//!
//! Engines are the built-in replay engine behind a scripted transport that
//! records every line it is sent and can refuse chosen commands.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use goban_sync::board::Color;
use goban_sync::config::SyncOptions;
use goban_sync::engine::{EngineController, Transport};
use goban_sync::error::{PreconditionError, SyncError, TransportError};
use goban_sync::gtp::{Command, ReplayEngine, Response};
use goban_sync::position::Position;
use goban_sync::record::{GameRecord, NodeData, PositionProvider};
use goban_sync::session::SyncSession;
use goban_sync::sync::{
    Strategy, SyncTarget, Synchronizer, clean_replay, full_rearrangement, replay,
};

// =============================================================================
// Scripted transport
// =============================================================================

type Log = Arc<Mutex<Vec<String>>>;

struct ScriptedTransport {
    engine: ReplayEngine,
    sent: Log,
    /// Commands starting with this prefix are refused
    reject: Option<&'static str>,
    /// Simulated engine latency
    delay: Option<Duration>,
}

impl ScriptedTransport {
    fn new(engine: ReplayEngine) -> (Self, Log) {
        let sent = Log::default();
        let transport = ScriptedTransport {
            engine,
            sent: sent.clone(),
            reject: None,
            delay: None,
        };
        (transport, sent)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn exchange(&mut self, line: &str) -> Result<Response, TransportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().unwrap().push(line.to_string());
        if self.reject.is_some_and(|prefix| line.starts_with(prefix)) {
            return Ok(Response::error("refused by script"));
        }
        Ok(self.engine.execute(line))
    }
}

async fn connect(transport: ScriptedTransport, log: &Log) -> EngineController<ScriptedTransport> {
    let controller = EngineController::connect(transport).await.unwrap();
    log.lock().unwrap().clear();
    controller
}

fn sent(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn take(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.lock().unwrap())
}

fn random_position(rng: &mut fastrand::Rng, size: usize, moves: usize) -> Position {
    let mut pos = Position::square(size);
    let mut sign = 1;
    for _ in 0..moves {
        let vertex = (rng.i32(0..size as i32), rng.i32(0..size as i32));
        if pos.get(vertex) != 0 {
            continue;
        }
        pos = pos.make_move(sign, vertex);
        sign = -sign;
    }
    pos
}

// =============================================================================
// Clean replay
// =============================================================================

#[tokio::test]
async fn test_main_line_uses_clean_replay() {
    let (transport, log) = ScriptedTransport::new(ReplayEngine::new());
    let mut controller = connect(transport, &log).await;
    let (record, node) = GameRecord::main_line(9, 6.5, &["E5", "C3", "G7", "pass", "D4"]);
    let target = SyncTarget::resolve(&record, node).unwrap();

    let outcome = Synchronizer::default()
        .sync(&mut controller, &target)
        .await
        .unwrap();

    assert_eq!(outcome.strategy, Strategy::CleanReplay);
    assert_eq!(outcome.commands_sent, 7);
    let lines = sent(&log);
    assert_eq!(lines[0], "boardsize 9");
    assert_eq!(lines[1], "komi 6.5");
    assert_eq!(lines[5], "play W pass");
    assert!(!lines.iter().any(|l| l.starts_with("clear_board")));
    assert!(controller.transport().engine.position().same_stones(&target.position));
    assert_eq!(controller.transport().engine.komi(), 6.5);
}

#[tokio::test]
async fn test_resync_to_same_node_sends_nothing() {
    let (transport, log) = ScriptedTransport::new(ReplayEngine::new());
    let mut controller = connect(transport, &log).await;
    let (record, node) = GameRecord::main_line(9, 0.0, &["E5", "C3"]);
    let target = SyncTarget::resolve(&record, node).unwrap();
    let sync = Synchronizer::default();

    sync.sync(&mut controller, &target).await.unwrap();
    take(&log);
    let outcome = sync.sync(&mut controller, &target).await.unwrap();

    assert_eq!(outcome.strategy, Strategy::CleanReplay);
    assert_eq!(outcome.commands_sent, 0);
    assert!(sent(&log).is_empty());
}

#[tokio::test]
async fn test_extending_line_sends_only_new_move() {
    let (transport, log) = ScriptedTransport::new(ReplayEngine::new());
    let mut controller = connect(transport, &log).await;
    let (mut record, node) = GameRecord::main_line(9, 0.0, &["E5", "C3"]);
    let sync = Synchronizer::default();
    sync.sync(&mut controller, &SyncTarget::resolve(&record, node).unwrap())
        .await
        .unwrap();
    take(&log);

    let next = record.add_node(node, NodeData::play(Color::Black, "G7"));
    let outcome = sync
        .sync(&mut controller, &SyncTarget::resolve(&record, next).unwrap())
        .await
        .unwrap();

    assert_eq!(outcome.commands_sent, 1);
    assert_eq!(sent(&log), ["play B G7"]);
}

#[tokio::test]
async fn test_going_back_uses_undo() {
    let (transport, log) = ScriptedTransport::new(ReplayEngine::new());
    let mut controller = connect(transport, &log).await;
    let (record, last) = GameRecord::main_line(9, 0.0, &["E5", "C3", "G7", "D4"]);
    let sync = Synchronizer::default();
    sync.sync(&mut controller, &SyncTarget::resolve(&record, last).unwrap())
        .await
        .unwrap();
    take(&log);

    let earlier = record.ancestry(last)[2];
    let target = SyncTarget::resolve(&record, earlier).unwrap();
    let outcome = sync.sync(&mut controller, &target).await.unwrap();

    assert_eq!(outcome.strategy, Strategy::CleanReplay);
    assert_eq!(sent(&log), ["undo", "undo"]);
    assert!(controller.transport().engine.position().same_stones(&target.position));
}

#[tokio::test]
async fn test_going_back_without_undo_clears_board() {
    let (transport, log) = ScriptedTransport::new(ReplayEngine::new());
    let mut controller = connect(transport, &log).await;
    let (record, last) = GameRecord::main_line(9, 0.0, &["E5", "C3", "G7", "D4"]);
    let sync = Synchronizer::new(SyncOptions {
        allow_undo: false,
        ..SyncOptions::default()
    });
    sync.sync(&mut controller, &SyncTarget::resolve(&record, last).unwrap())
        .await
        .unwrap();
    take(&log);

    let earlier = record.ancestry(last)[2];
    let target = SyncTarget::resolve(&record, earlier).unwrap();
    let outcome = sync.sync(&mut controller, &target).await.unwrap();

    assert_eq!(outcome.commands_sent, 3);
    assert_eq!(sent(&log), ["clear_board", "play B E5", "play W C3"]);
    assert!(controller.transport().engine.position().same_stones(&target.position));
}

#[tokio::test]
async fn test_handicap_setup_uses_set_free_handicap() {
    let (transport, log) = ScriptedTransport::new(ReplayEngine::new());
    let mut controller = connect(transport, &log).await;
    let mut record = GameRecord::new(19, 19, NodeData::setup(&["D4", "Q16", "Q4", "D16"], &[]));
    let node = record.add_node(record.root(), NodeData::play(Color::White, "K10"));
    let target = SyncTarget::resolve(&record, node).unwrap();

    let outcome = Synchronizer::default()
        .sync(&mut controller, &target)
        .await
        .unwrap();

    assert_eq!(outcome.strategy, Strategy::CleanReplay);
    let lines = sent(&log);
    assert_eq!(
        lines.iter().filter(|l| l.starts_with("set_free_handicap")).count(),
        1
    );
    assert_eq!(lines.iter().filter(|l| l.starts_with("play")).count(), 1);
    assert!(controller.transport().engine.position().same_stones(&target.position));
}

#[tokio::test]
async fn test_handicap_setup_without_free_handicap_plays_stones() {
    let engine = ReplayEngine::new().without_command("set_free_handicap");
    let (transport, log) = ScriptedTransport::new(engine);
    let mut controller = connect(transport, &log).await;
    let mut record = GameRecord::new(19, 19, NodeData::setup(&["D4", "Q16", "Q4", "D16"], &[]));
    let node = record.add_node(record.root(), NodeData::play(Color::White, "K10"));
    let target = SyncTarget::resolve(&record, node).unwrap();

    let outcome = Synchronizer::default()
        .sync(&mut controller, &target)
        .await
        .unwrap();

    assert_eq!(outcome.strategy, Strategy::CleanReplay);
    assert_eq!(outcome.commands_sent, 7);
    assert!(!sent(&log).iter().any(|l| l.starts_with("set_free_handicap")));
}

#[test]
fn test_clean_replay_is_deterministic() {
    let mut record = GameRecord::new(9, 9, NodeData::setup(&["C3", "G7"], &["E5"]));
    let mut node = record.root();
    for (i, mv) in ["D4", "F6", "pass", "C7"].iter().enumerate() {
        let color = if i % 2 == 0 {
            Color::White
        } else {
            Color::Black
        };
        node = record.add_node(node, NodeData::play(color, mv));
    }
    let target = SyncTarget::resolve(&record, node).unwrap();

    let first = clean_replay(&target, true).unwrap();
    let second = clean_replay(&target, true).unwrap();
    assert_eq!(first.history, second.history);
    assert_eq!(first.board, second.board);
    assert!(first.board.same_stones(&target.position));
}

// =============================================================================
// Escalation
// =============================================================================

#[tokio::test]
async fn test_setup_removal_escalates_to_incremental() {
    let (transport, log) = ScriptedTransport::new(ReplayEngine::new());
    let mut controller = connect(transport, &log).await;
    let sync = Synchronizer::default();

    // Engine already holds D4 and Q16.
    let mut start = Position::square(19);
    start.set((3, 15), 1).set((15, 3), -1);
    sync.sync(&mut controller, &SyncTarget::from_position(start, 0.0))
        .await
        .unwrap();
    take(&log);

    // Root setup places C3, a child removes it, then two more black stones.
    let mut record = GameRecord::new(19, 19, NodeData::setup(&["D4", "C3"], &["Q16"]));
    let removal = NodeData {
        add_empty: vec!["C3".to_string()],
        ..NodeData::default()
    };
    let child = record.add_node(record.root(), removal);
    let node = record.add_node(child, NodeData::setup(&["D16", "Q4"], &[]));
    let target = SyncTarget::resolve(&record, node).unwrap();

    let outcome = sync.sync(&mut controller, &target).await.unwrap();

    assert_eq!(outcome.strategy, Strategy::IncrementalRearrangement);
    assert_eq!(outcome.commands_sent, 2);
    let lines = sent(&log);
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| l.starts_with("play")));
    assert!(controller.transport().engine.position().same_stones(&target.position));
}

#[tokio::test]
async fn test_stone_removal_escalates_to_full() {
    let (transport, log) = ScriptedTransport::new(ReplayEngine::new());
    let mut controller = connect(transport, &log).await;
    let sync = Synchronizer::default();

    let mut start = Position::square(19);
    start.set((3, 15), 1).set((15, 3), -1);
    sync.sync(&mut controller, &SyncTarget::from_position(start, 0.0))
        .await
        .unwrap();
    take(&log);

    // Q16 must go away, which only a fresh board can do.
    let mut target = Position::square(19);
    target.set((3, 15), 1).set((3, 3), 1);
    let target = SyncTarget::from_position(target, 0.0);
    let outcome = sync.sync(&mut controller, &target).await.unwrap();

    assert_eq!(outcome.strategy, Strategy::FullRearrangement);
    assert_eq!(sent(&log), ["clear_board", "play B D16", "play B D4"]);
    assert!(controller.transport().engine.position().same_stones(&target.position));
}

#[tokio::test]
async fn test_refused_handicap_escalates() {
    let (mut transport, log) = ScriptedTransport::new(ReplayEngine::new());
    transport.reject = Some("set_free_handicap");
    let mut controller = connect(transport, &log).await;
    let mut record = GameRecord::new(19, 19, NodeData::setup(&["D4", "Q16", "Q4", "D16"], &[]));
    let node = record.add_node(record.root(), NodeData::play(Color::White, "K10"));
    let target = SyncTarget::resolve(&record, node).unwrap();

    let outcome = Synchronizer::default()
        .sync(&mut controller, &target)
        .await
        .unwrap();

    // boardsize and komi went through before the refusal and aren't repeated
    assert_eq!(outcome.strategy, Strategy::IncrementalRearrangement);
    assert_eq!(outcome.commands_sent, 5);
    assert!(controller.transport().engine.position().same_stones(&target.position));
}

#[tokio::test]
async fn test_unreachable_size_exhausts_all_strategies() {
    let (transport, log) = ScriptedTransport::new(ReplayEngine::new().with_max_size(13));
    let mut controller = connect(transport, &log).await;
    let (record, node) = GameRecord::main_line(19, 0.0, &["D4", "Q16"]);
    let target = SyncTarget::resolve(&record, node).unwrap();

    let err = Synchronizer::default()
        .sync(&mut controller, &target)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::Exhausted {
            last: Some(TransportError::Rejected { .. })
        }
    ));
    assert_eq!(err.to_string(), "board cannot be reproduced on this engine");
    // clean replay and full rearrangement each tried boardsize once
    assert_eq!(sent(&log), ["boardsize 19", "boardsize 19"]);
}

// =============================================================================
// Preconditions
// =============================================================================

#[tokio::test]
async fn test_oversized_board_sends_nothing() {
    let (transport, log) = ScriptedTransport::new(ReplayEngine::new());
    let mut controller = connect(transport, &log).await;
    let target = SyncTarget::from_position(Position::square(26), 0.0);

    let err = Synchronizer::default()
        .sync(&mut controller, &target)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::Precondition(PreconditionError::Oversized { size: 26, max: 25 })
    ));
    assert!(sent(&log).is_empty());
}

#[tokio::test]
async fn test_non_square_and_invalid_boards_rejected() {
    let (transport, log) = ScriptedTransport::new(ReplayEngine::new());
    let mut controller = connect(transport, &log).await;
    let sync = Synchronizer::default();

    let wide = SyncTarget::from_position(Position::new(13, 9), 0.0);
    assert!(matches!(
        sync.sync(&mut controller, &wide).await,
        Err(SyncError::Precondition(PreconditionError::NotSquare { .. }))
    ));

    let mut dead = Position::square(9);
    dead.set((0, 0), 1).set((1, 0), -1).set((0, 1), -1);
    let dead = SyncTarget::from_position(dead, 0.0);
    assert!(matches!(
        sync.sync(&mut controller, &dead).await,
        Err(SyncError::Precondition(PreconditionError::InvalidBoard))
    ));
    assert!(sent(&log).is_empty());
}

// =============================================================================
// Full rearrangement
// =============================================================================

#[test]
fn test_full_rearrangement_reproduces_random_boards() {
    for seed in 0..30 {
        let mut rng = fastrand::Rng::with_seed(seed);
        let size = rng.usize(5..=19);
        let target = random_position(&mut rng, size, size * size);
        assert!(target.is_valid());

        let plan = full_rearrangement(&SyncTarget::from_position(target.clone(), 0.0));
        assert!(plan.board.same_stones(&target), "seed {seed}");
        assert_eq!(plan.history.len(), target.stones().count(), "seed {seed}");
        assert!(
            plan.history.iter().all(|c| matches!(c, Command::Play { .. })),
            "seed {seed}"
        );
        assert!(replay(&plan.history, size).same_stones(&target), "seed {seed}");
    }
}

#[tokio::test]
async fn test_positions_without_record_reach_engine() {
    let (transport, log) = ScriptedTransport::new(ReplayEngine::new());
    let mut controller = connect(transport, &log).await;
    let sync = Synchronizer::default();

    for seed in 0..10 {
        let mut rng = fastrand::Rng::with_seed(seed);
        let target = SyncTarget::from_position(random_position(&mut rng, 9, 60), 0.0);
        sync.sync(&mut controller, &target).await.unwrap();
        assert!(
            controller.transport().engine.position().same_stones(&target.position),
            "seed {seed}"
        );
    }
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_session_drops_superseded_result() {
    let (mut transport, log) = ScriptedTransport::new(ReplayEngine::new());
    transport.delay = Some(Duration::from_millis(10));
    let controller = connect(transport, &log).await;
    let mut session = SyncSession::spawn(controller, Synchronizer::default());

    let (first, node) = GameRecord::main_line(9, 0.0, &["E5", "C3"]);
    let first = SyncTarget::resolve(&first, node).unwrap();
    let (second, node) = GameRecord::main_line(9, 0.0, &["D4", "F6", "G3"]);
    let second = SyncTarget::resolve(&second, node).unwrap();

    assert_eq!(session.submit(first), 1);
    // let the first sync start talking to the engine
    tokio::time::sleep(Duration::from_millis(15)).await;
    assert_eq!(session.submit(second.clone()), 2);

    let report = session.next_report().await.unwrap();
    assert_eq!(report.generation, 2);
    assert!(report.result.is_ok());
    assert!(sent(&log).contains(&"play B E5".to_string()));

    let controller = session.shutdown().await.unwrap();
    assert!(controller.transport().engine.position().same_stones(&second.position));
}

#[tokio::test]
async fn test_session_collapses_burst() {
    let (transport, log) = ScriptedTransport::new(ReplayEngine::new());
    let controller = connect(transport, &log).await;
    let mut session = SyncSession::spawn(controller, Synchronizer::default());

    let (record, last) = GameRecord::main_line(9, 0.0, &["E5", "C3", "G7"]);
    for node in record.ancestry(last) {
        session.submit(SyncTarget::resolve(&record, node).unwrap());
    }
    assert_eq!(session.generation(), 4);

    let report = session.settle().await.unwrap();
    assert_eq!(report.generation, 4);
    assert_eq!(report.result.unwrap().strategy, Strategy::CleanReplay);
    // only the newest target was ever synced
    assert_eq!(sent(&log).iter().filter(|l| l.starts_with("play")).count(), 3);

    let controller = session.shutdown().await.unwrap();
    let expected = record.resolve(last).unwrap();
    assert!(controller.transport().engine.position().same_stones(&expected));
}
