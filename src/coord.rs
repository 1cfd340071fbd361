//! GTP coordinate encoding.
//!
//! A vertex `(x, y)` on a board of height `h` is written as a column letter
//! from [`ALPHA`] (no `I`) followed by the row number `h - y`, counted from
//! the bottom. Pass is the literal `pass`.

use crate::board::Vertex;
use crate::constants::{ALPHA, PASS};
use crate::error::CoordError;

/// Encode a vertex, or `pass` for any off-board vertex.
///
/// Returns `None` for columns beyond the alphabet.
pub fn encode_vertex((x, y): Vertex, width: usize, height: usize) -> Option<String> {
    if x < 0 || y < 0 || x as usize >= width || y as usize >= height {
        return Some("pass".into());
    }
    let letter = *ALPHA.get(x as usize)? as char;
    Some(format!("{letter}{}", height as i32 - y))
}

/// Decode a coordinate such as `D4` (any case). `pass` decodes to [`PASS`].
pub fn decode_vertex(s: &str, width: usize, height: usize) -> Result<Vertex, CoordError> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("pass") {
        return Ok(PASS);
    }

    let bytes = s.as_bytes();
    if bytes.len() < 2 || !bytes[1..].iter().all(u8::is_ascii_digit) {
        return Err(CoordError::Invalid(s.to_string()));
    }

    let col_char = bytes[0].to_ascii_uppercase();
    let x = ALPHA
        .iter()
        .position(|&c| c == col_char)
        .ok_or_else(|| CoordError::Invalid(s.to_string()))?;

    let row: usize = s[1..]
        .parse()
        .map_err(|_| CoordError::Invalid(s.to_string()))?;

    if x >= width || row == 0 || row > height {
        return Err(CoordError::OutOfRange {
            coord: s.to_string(),
            width,
            height,
        });
    }
    Ok((x as i32, (height - row) as i32))
}

/// Decode a setup entry: a single coordinate or a `A1:C3` rectangle.
///
/// Rectangles expand column by column.
pub fn decode_compressed(s: &str, width: usize, height: usize) -> Result<Vec<Vertex>, CoordError> {
    let Some((from, to)) = s.split_once(':') else {
        let v = decode_vertex(s, width, height)?;
        return Ok(if v == PASS { Vec::new() } else { vec![v] });
    };

    let (x1, y1) = decode_vertex(from, width, height)?;
    let (x2, y2) = decode_vertex(to, width, height)?;
    if (x1, y1) == PASS || (x2, y2) == PASS {
        return Err(CoordError::Invalid(s.to_string()));
    }

    let mut out = Vec::new();
    for x in x1.min(x2)..=x1.max(x2) {
        for y in y1.min(y2)..=y1.max(y2) {
            out.push((x, y));
        }
    }
    Ok(out)
}
