//! Area and territory scoring.
//!
//! [`score`] counts an externally computed area map against a position and
//! reports both rulesets at once, so callers can switch without recounting.
//! [`estimate_area`] is a plain flood-fill estimate for when no influence
//! engine is at hand: it does not detect dead stones.

use crate::board::Color;
use crate::position::{Membership, Position};

/// Ownership per vertex, indexed `[y][x]`. Only the sign of each entry counts.
pub type AreaMap = Vec<Vec<f64>>;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ScoreParams {
    pub komi: f64,
    pub handicap: u32,
}

/// Counts are indexed Black first, White second.
#[derive(Clone, Debug, PartialEq)]
pub struct Score {
    pub area: [u32; 2],
    pub territory: [u32; 2],
    pub captures: [u32; 2],
    /// Area counting: `area[B] - area[W] - komi - handicap`
    pub area_score: f64,
    /// Territory counting: `territory[B] - territory[W] + captures[B] - captures[W] - komi`
    pub territory_score: f64,
}

pub fn score(position: &Position, area_map: &[Vec<f64>], params: ScoreParams) -> Score {
    let mut area = [0u32; 2];
    let mut territory = [0u32; 2];

    for (y, row) in area_map.iter().enumerate().take(position.height()) {
        for (x, &z) in row.iter().enumerate().take(position.width()) {
            if z == 0.0 || z.is_nan() {
                continue;
            }
            let index = if z > 0.0 { 0 } else { 1 };
            area[index] += 1;
            if position.get((x as i32, y as i32)) == 0 {
                territory[index] += 1;
            }
        }
    }

    let captures = [
        position.captures(Color::Black),
        position.captures(Color::White),
    ];
    let area_score = area[0] as f64 - area[1] as f64 - params.komi - params.handicap as f64;
    let territory_score = territory[0] as f64 - territory[1] as f64 + captures[0] as f64
        - captures[1] as f64
        - params.komi;

    Score {
        area,
        territory,
        captures,
        area_score,
        territory_score,
    }
}

/// Stones own their vertex; an empty point belongs to the one color it can reach.
///
/// A color reaches every point in the [`Membership::EmptyOrSign`] group of
/// its stones. Points reached by both colors, or by neither, are neutral.
pub fn estimate_area(position: &Position) -> AreaMap {
    let (w, h) = (position.width(), position.height());
    let mut reach = [vec![vec![false; w]; h], vec![vec![false; w]; h]];

    for ((x, y), sign) in position.stones() {
        let Some(color) = Color::from_sign(sign) else {
            continue;
        };
        let reached = &mut reach[color.index()];
        if reached[y as usize][x as usize] {
            continue;
        }
        for (rx, ry) in position.connected_component((x, y), Membership::EmptyOrSign(sign)) {
            reached[ry as usize][rx as usize] = true;
        }
    }

    let mut map = vec![vec![0.0; w]; h];
    for (y, row) in map.iter_mut().enumerate() {
        for (x, owner) in row.iter_mut().enumerate() {
            let sign = position.get((x as i32, y as i32));
            *owner = match (sign, reach[0][y][x], reach[1][y][x]) {
                (0, true, false) => 1.0,
                (0, false, true) => -1.0,
                (0, _, _) => 0.0,
                (s, _, _) => s as f64,
            };
        }
    }
    map
}
