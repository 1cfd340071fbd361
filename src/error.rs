//! Error types for the rules layer, the protocol layer and the synchronizer.

use thiserror::Error;

/// Why a checked move was refused. See [`crate::position::Position::try_move`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveError {
    #[error("Illegal move: point not EMPTY")]
    Occupied,

    #[error("Illegal move: suicide")]
    Suicide,

    #[error("Illegal move: vertex is off the board")]
    OffBoard,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordError {
    #[error("invalid coordinate: {0:?}")]
    Invalid(String),

    #[error("coordinate {coord} is outside a {width}x{height} board")]
    OutOfRange {
        coord: String,
        width: usize,
        height: usize,
    },
}

/// A board the engine protocol can't represent. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("GTP engines don't support non-square boards ({width}x{height})")]
    NotSquare { width: usize, height: usize },

    #[error("GTP engines don't support invalid board positions")]
    InvalidBoard,

    #[error("GTP engines only support board sizes that don't exceed {max} (got {size})")]
    Oversized { size: usize, max: usize },
}

/// Failure talking to an engine.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("engine rejected `{command}`: {message}")]
    Rejected { command: String, message: String },

    #[error("engine I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine closed the connection")]
    Closed,

    #[error("engine did not answer `{0}` in time")]
    Timeout(String),

    #[error("malformed engine response: {0:?}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error("board cannot be reproduced on this engine")]
    Exhausted {
        #[source]
        last: Option<TransportError>,
    },
}
