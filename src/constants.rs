//! Constants for coordinates, board limits and protocol defaults.

use crate::board::Vertex;

// =============================================================================
// Coordinates
// =============================================================================

/// Column letters used by GTP. `I` is skipped to avoid confusion with `J`.
pub const ALPHA: &[u8; 25] = b"ABCDEFGHJKLMNOPQRSTUVWXYZ";

/// Largest board side GTP coordinates can address.
pub const MAX_BOARD_SIZE: usize = ALPHA.len();

/// Pass marker. Lies outside every board.
pub const PASS: Vertex = (-1, -1);

// =============================================================================
// Handicap
// =============================================================================

/// Boards whose shorter side is at most this get no handicap layout.
pub const HANDICAP_MIN_SIZE: usize = 6;

/// Boards at least this large use the 4-4 points as "near" star points.
pub const HANDICAP_WIDE_SIZE: usize = 13;

/// Odd sides of this length get corner stones only.
pub const HANDICAP_NO_MIDDLE_SIZE: usize = 7;

// =============================================================================
// Protocol
// =============================================================================

/// Komi used when a record doesn't carry one.
pub const DEFAULT_KOMI: f64 = 0.0;

/// Default board size for the CLI.
pub const DEFAULT_BOARD_SIZE: usize = 19;
