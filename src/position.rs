//! Go position representation and move execution.
//!
//! This module provides the core rules engine:
//! - Board state as a row-major grid of signs plus capture counters
//! - Connected-component search over a closed set of membership predicates
//! - Liberty counting and the short-circuiting liberty test used after moves
//! - Stone placement with capture and suicide resolution
//! - A cheap canonical digest for equality pre-checks
//!
//! Positions are values. [`Position::make_move`] returns a new position and
//! leaves the original untouched, so positions can be compared and handed
//! across layers freely. Ko is not enforced here; callers detect repetition
//! by comparing positions with [`Position::same_stones`].

use std::fmt;

use crate::board::{Color, Sign, Vertex};
use crate::error::MoveError;

/// Which vertices a connected-component search may enter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Membership {
    /// Same sign as the start vertex: a chain (or an empty region).
    SameSign,
    /// Same sign as the start vertex, or empty: a chain with its liberty region.
    SameSignOrEmpty,
    /// Empty vertices plus stones of the given sign: an owner's territory-area group.
    EmptyOrSign(Sign),
}

impl Membership {
    fn admits(self, start: Sign, sign: Sign) -> bool {
        match self {
            Membership::SameSign => sign == start,
            Membership::SameSignOrEmpty => sign == start || sign == 0,
            Membership::EmptyOrSign(owner) => sign == 0 || sign == owner.signum(),
        }
    }
}

/// Guards for [`Position::try_move`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MoveOptions {
    pub prevent_overwrite: bool,
    pub prevent_suicide: bool,
}

/// A Go position: stone signs on a `width x height` grid and capture counts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    width: usize,
    height: usize,
    cells: Vec<Sign>,
    /// Stones captured by Black (index 0) and by White (index 1)
    captures: [u32; 2],
}

impl Position {
    /// An empty board.
    pub fn new(width: usize, height: usize) -> Self {
        Position {
            width,
            height,
            cells: vec![0; width * height],
            captures: [0, 0],
        }
    }

    /// An empty square board.
    pub fn square(size: usize) -> Self {
        Self::new(size, size)
    }

    /// Build a board from rows of signs (`rows[y][x]`). All rows must have the same length.
    pub fn from_rows(rows: &[Vec<Sign>]) -> Option<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != width) {
            return None;
        }
        let cells = rows
            .iter()
            .flat_map(|r| r.iter().map(|s| s.signum()))
            .collect();
        Some(Position {
            width,
            height,
            cells,
            captures: [0, 0],
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_square(&self) -> bool {
        self.width == self.height
    }

    /// Captures made by `color`.
    pub fn captures(&self, color: Color) -> u32 {
        self.captures[color.index()]
    }

    pub fn set_captures(&mut self, color: Color, value: u32) {
        self.captures[color.index()] = value;
    }

    /// Whether `vertex` lies on the board. Pass never does.
    pub fn has(&self, (x, y): Vertex) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    #[inline]
    fn idx(&self, (x, y): Vertex) -> usize {
        y as usize * self.width + x as usize
    }

    /// Sign at `vertex`; 0 for empty or off-board.
    pub fn get(&self, vertex: Vertex) -> Sign {
        if self.has(vertex) {
            self.cells[self.idx(vertex)]
        } else {
            0
        }
    }

    /// Write a sign directly, bypassing capture rules. Off-board writes are ignored.
    pub fn set(&mut self, vertex: Vertex, sign: Sign) -> &mut Self {
        if self.has(vertex) {
            let i = self.idx(vertex);
            self.cells[i] = sign.signum();
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|&s| s == 0)
    }

    /// All occupied vertices with their signs, row by row.
    pub fn stones(&self) -> impl Iterator<Item = (Vertex, Sign)> + '_ {
        self.cells.iter().enumerate().filter_map(|(i, &s)| {
            (s != 0).then(|| (((i % self.width) as i32, (i / self.width) as i32), s))
        })
    }

    /// Orthogonal neighbors of `vertex`, clipped to the board.
    pub fn neighbors(&self, (x, y): Vertex) -> Vec<Vertex> {
        if !self.has((x, y)) {
            return Vec::new();
        }
        [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
            .into_iter()
            .filter(|&v| self.has(v))
            .collect()
    }

    /// Vertices reachable from `start` through neighbors admitted by `membership`.
    ///
    /// Iterative depth-first traversal; each vertex is visited once.
    pub fn connected_component(&self, start: Vertex, membership: Membership) -> Vec<Vertex> {
        if !self.has(start) {
            return Vec::new();
        }
        let start_sign = self.get(start);
        let mut visited = vec![false; self.cells.len()];
        let mut stack = vec![start];
        let mut out = Vec::new();
        visited[self.idx(start)] = true;

        while let Some(v) = stack.pop() {
            out.push(v);
            for n in self.neighbors(v) {
                let ni = self.idx(n);
                if !visited[ni] && membership.admits(start_sign, self.get(n)) {
                    visited[ni] = true;
                    stack.push(n);
                }
            }
        }
        out
    }

    /// The chain containing `vertex`. Empty for empty or off-board vertices.
    pub fn chain(&self, vertex: Vertex) -> Vec<Vertex> {
        if self.get(vertex) == 0 {
            return Vec::new();
        }
        self.connected_component(vertex, Membership::SameSign)
    }

    /// Empty vertices adjacent to the chain at `vertex`, without duplicates.
    pub fn liberties(&self, vertex: Vertex) -> Vec<Vertex> {
        let mut seen = vec![false; self.cells.len()];
        let mut libs = Vec::new();
        for stone in self.chain(vertex) {
            for n in self.neighbors(stone) {
                let ni = self.idx(n);
                if self.cells[ni] == 0 && !seen[ni] {
                    seen[ni] = true;
                    libs.push(n);
                }
            }
        }
        libs
    }

    /// Whether the chain at `vertex` has a liberty.
    ///
    /// Stops at the first empty neighbor found, without listing the chain.
    pub fn has_liberties(&self, vertex: Vertex) -> bool {
        let sign = self.get(vertex);
        if sign == 0 {
            return false;
        }
        let mut visited = vec![false; self.cells.len()];
        let mut stack = vec![vertex];
        visited[self.idx(vertex)] = true;

        while let Some(v) = stack.pop() {
            for n in self.neighbors(v) {
                let ni = self.idx(n);
                match self.cells[ni] {
                    0 => return true,
                    s if s == sign && !visited[ni] => {
                        visited[ni] = true;
                        stack.push(n);
                    }
                    _ => {}
                }
            }
        }
        false
    }

    /// Whether every chain on the board has at least one liberty.
    pub fn is_valid(&self) -> bool {
        let mut checked = vec![false; self.cells.len()];
        for i in 0..self.cells.len() {
            if self.cells[i] == 0 || checked[i] {
                continue;
            }
            let v = ((i % self.width) as i32, (i / self.width) as i32);
            if !self.has_liberties(v) {
                return false;
            }
            for stone in self.chain(v) {
                let si = self.idx(stone);
                checked[si] = true;
            }
        }
        true
    }

    /// Play a stone of `sign` at `vertex` and return the resulting position.
    ///
    /// Enemy chains left without liberties are removed and credited to the
    /// mover. If nothing was captured and the mover's chain has no liberties,
    /// that chain is removed and credited to the opponent. Occupied vertices
    /// are overwritten. Sign 0 or an off-board vertex (pass) yields a copy.
    pub fn make_move(&self, sign: Sign, vertex: Vertex) -> Position {
        let mut next = self.clone();
        let Some(color) = Color::from_sign(sign) else {
            return next;
        };
        if !self.has(vertex) {
            return next;
        }
        let sign = color.sign();

        let enemies: Vec<Vertex> = self
            .neighbors(vertex)
            .into_iter()
            .filter(|&n| self.get(n) == -sign)
            .collect();

        next.set(vertex, sign);

        let mut captured = false;
        for n in enemies {
            // An earlier neighbor may already have taken this chain with it.
            if next.get(n) != -sign || next.has_liberties(n) {
                continue;
            }
            for stone in next.chain(n) {
                next.set(stone, 0);
                next.captures[color.index()] += 1;
            }
            captured = true;
        }

        if !captured && !next.has_liberties(vertex) {
            for stone in next.chain(vertex) {
                next.set(stone, 0);
                next.captures[color.opponent().index()] += 1;
            }
        }
        next
    }

    /// Like [`make_move`](Self::make_move), but refuses moves the options rule out.
    pub fn try_move(
        &self,
        sign: Sign,
        vertex: Vertex,
        options: MoveOptions,
    ) -> Result<Position, MoveError> {
        if sign == 0 {
            return Ok(self.clone());
        }
        if !self.has(vertex) {
            return Err(MoveError::OffBoard);
        }
        if options.prevent_overwrite && self.get(vertex) != 0 {
            return Err(MoveError::Occupied);
        }
        let next = self.make_move(sign, vertex);
        if options.prevent_suicide && next.get(vertex) == 0 {
            return Err(MoveError::Suicide);
        }
        Ok(next)
    }

    /// Vertices whose signs differ from `other`, column by column.
    ///
    /// `None` when the boards have different dimensions.
    pub fn diff(&self, other: &Position) -> Option<Vec<Vertex>> {
        if self.width != other.width || self.height != other.height {
            return None;
        }
        let mut out = Vec::new();
        for x in 0..self.width as i32 {
            for y in 0..self.height as i32 {
                if self.get((x, y)) != other.get((x, y)) {
                    out.push((x, y));
                }
            }
        }
        Some(out)
    }

    /// Order-dependent digest of dimensions, cells and capture counts.
    ///
    /// Equal positions hash equal; unequal ones usually don't.
    pub fn canonical_hash(&self) -> u64 {
        let h = self.stone_hash();
        self.captures
            .iter()
            .fold(h, |h, &c| h.wrapping_mul(31).wrapping_add(c as u64))
    }

    fn stone_hash(&self) -> u64 {
        let h = (self.width as u64)
            .wrapping_mul(31)
            .wrapping_add(self.height as u64);
        self.cells
            .iter()
            .fold(h, |h, &s| h.wrapping_mul(31).wrapping_add((s + 1) as u64))
    }

    /// Same dimensions and same stones. Capture counts are ignored.
    pub fn same_stones(&self, other: &Position) -> bool {
        self.stone_hash() == other.stone_hash()
            && self.width == other.width
            && self.height == other.height
            && self.cells == other.cells
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let ch = match self.get((x, y)) {
                    1 => 'X',
                    -1 => 'O',
                    _ => '.',
                };
                write!(f, "{ch} ")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
