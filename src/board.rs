//! Board primitives shared by every layer: colors, signs and vertices.

use std::fmt;

/// Stone sign: `1` for Black, `-1` for White, `0` for empty.
pub type Sign = i8;

/// A board coordinate `(x, y)`, 0-indexed from the top-left corner.
///
/// Signed so that pass (`(-1, -1)`) is representable.
pub type Vertex = (i32, i32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub fn sign(self) -> Sign {
        match self {
            Color::Black => 1,
            Color::White => -1,
        }
    }

    /// Color for a non-zero sign. Zero has no color.
    pub fn from_sign(sign: Sign) -> Option<Self> {
        match sign.signum() {
            1 => Some(Color::Black),
            -1 => Some(Color::White),
            _ => None,
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    /// Parse a GTP color argument (`b`, `black`, `w`, `white`, any case).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "b" | "black" => Some(Color::Black),
            "w" | "white" => Some(Color::White),
            _ => None,
        }
    }

    /// Index into per-color arrays such as capture counters.
    pub(crate) fn index(self) -> usize {
        match self {
            Color::Black => 0,
            Color::White => 1,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Black => write!(f, "B"),
            Color::White => write!(f, "W"),
        }
    }
}
