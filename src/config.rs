//! Runtime configuration: which engine to talk to and how to synchronize it.

use std::time::Duration;

use clap::Args;

/// Engine selection, shared by the CLI subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct EngineConfig {
    /// GTP engine executable. Without one, the built-in replay engine is used
    #[arg(long, env = "GOBAN_ENGINE")]
    pub engine: Option<String>,

    /// Argument passed to the engine (repeatable)
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,

    /// Per-command timeout in milliseconds
    #[arg(long, env = "GOBAN_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Never use set_free_handicap, even if the engine knows it
    #[arg(long)]
    pub no_free_handicap: bool,

    /// Never rewind the engine with undo
    #[arg(long)]
    pub no_undo: bool,
}

impl EngineConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            use_free_handicap: !self.no_free_handicap,
            allow_undo: !self.no_undo,
        }
    }
}

/// Knobs for [`Synchronizer`](crate::sync::Synchronizer).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    /// Place leading multi-stone Black setup with one `set_free_handicap`
    pub use_free_handicap: bool,
    /// Rewind with `undo` instead of `clear_board` when cheaper
    pub allow_undo: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            use_free_handicap: true,
            allow_undo: true,
        }
    }
}
