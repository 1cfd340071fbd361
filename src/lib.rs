//! Goban-Sync: a Go rules engine and GTP engine synchronizer.
//!
//! This crate keeps external Go engines, which speak the Go Text Protocol
//! and can't report their own board, in step with positions taken from a
//! game record.
//!
//! ## Modules
//!
//! - [`constants`] - Coordinate alphabet, board limits and defaults
//! - [`board`] - Colors, signs and vertices
//! - [`position`] - Core game logic (board state, moves, captures)
//! - [`scoring`] - Area and territory scores
//! - [`handicap`] - Conventional handicap stone layout
//! - [`coord`] - GTP coordinate encoding
//! - [`record`] - Game records and the position provider contract
//! - [`gtp`] - GTP commands, responses and a reference engine
//! - [`engine`] - Engine transports, controller and state tracking
//! - [`sync`] - The three-strategy synchronizer
//! - [`session`] - Latest-target-wins synchronization loop
//! - [`config`] - Engine and synchronizer configuration
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```
//! use goban_sync::engine::EngineController;
//! use goban_sync::gtp::ReplayEngine;
//! use goban_sync::record::GameRecord;
//! use goban_sync::sync::{Strategy, SyncTarget, Synchronizer};
//!
//! # tokio_test_main();
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn tokio_test_main() {
//! let (record, node) = GameRecord::main_line(9, 6.5, &["E5", "C3", "G7"]);
//! let target = SyncTarget::resolve(&record, node).unwrap();
//!
//! let mut engine = EngineController::connect(ReplayEngine::new()).await.unwrap();
//! let outcome = Synchronizer::default().sync(&mut engine, &target).await.unwrap();
//! assert_eq!(outcome.strategy, Strategy::CleanReplay);
//! assert!(engine.transport().position().same_stones(&target.position));
//! # }
//! ```

pub mod board;
pub mod config;
pub mod constants;
pub mod coord;
pub mod engine;
pub mod error;
pub mod gtp;
pub mod handicap;
pub mod position;
pub mod record;
pub mod scoring;
pub mod session;
pub mod sync;
