//! Conventional handicap stone placement.
//!
//! The corners come first, then (on odd boards) the side and center star
//! points. Order matters: taking the first `count` entries gives the
//! conventional placement for every handicap.

use crate::board::Vertex;
use crate::constants::{HANDICAP_MIN_SIZE, HANDICAP_NO_MIDDLE_SIZE, HANDICAP_WIDE_SIZE};

/// Corner ordering convention.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum HandicapLayout {
    #[default]
    Standard,
    /// Second pair of corners swapped, as on Tygem servers.
    Tygem,
}

/// Handicap vertices for a `width x height` board, in placement order.
pub fn handicap_placement(
    width: usize,
    height: usize,
    count: usize,
    layout: HandicapLayout,
) -> Vec<Vertex> {
    if width.min(height) <= HANDICAP_MIN_SIZE || count < 2 {
        return Vec::new();
    }

    let near = |side: usize| if side >= HANDICAP_WIDE_SIZE { 3 } else { 2 };
    let (near_x, near_y) = (near(width) as i32, near(height) as i32);
    let far_x = width as i32 - near_x - 1;
    let far_y = height as i32 - near_y - 1;
    let middle_x = (width as i32 - 1) / 2;
    let middle_y = (height as i32 - 1) / 2;

    let mut result = match layout {
        HandicapLayout::Standard => vec![
            (near_x, far_y),
            (far_x, near_y),
            (far_x, far_y),
            (near_x, near_y),
        ],
        HandicapLayout::Tygem => vec![
            (near_x, far_y),
            (far_x, near_y),
            (near_x, near_y),
            (far_x, far_y),
        ],
    };

    let odd_x = width % 2 != 0 && width != HANDICAP_NO_MIDDLE_SIZE;
    let odd_y = height % 2 != 0 && height != HANDICAP_NO_MIDDLE_SIZE;

    if odd_x && odd_y {
        if count == 5 {
            result.push((middle_x, middle_y));
        }
        result.push((near_x, middle_y));
        result.push((far_x, middle_y));
        if count == 7 {
            result.push((middle_x, middle_y));
        }
        result.push((middle_x, near_y));
        result.push((middle_x, far_y));
        result.push((middle_x, middle_y));
    } else if odd_x {
        result.push((middle_x, near_y));
        result.push((middle_x, far_y));
    } else if odd_y {
        result.push((near_x, middle_y));
        result.push((far_x, middle_y));
    }

    result.truncate(count);
    result
}
