//! Game records and the position provider contract.
//!
//! The synchronizer never walks a tree itself. It asks a
//! [`PositionProvider`] for a node's ancestry, its raw setup/move data and
//! the position at each node. [`GameRecord`] is a small in-memory provider:
//! an arena of nodes with parent links, whose positions are materialized by
//! replay and memoized in a [`PositionCache`] the record owns.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::board::{Color, Vertex};
use crate::coord::decode_compressed;
use crate::position::Position;

pub type NodeId = usize;

/// Raw node properties, as coordinate strings.
///
/// `B`/`W` carry a single move, `AB`/`AW`/`AE` carry setup entries that may
/// be `A1:C3` ranges, `KM` is komi (root only).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeData {
    pub black: Option<String>,
    pub white: Option<String>,
    pub add_black: Vec<String>,
    pub add_white: Vec<String>,
    pub add_empty: Vec<String>,
    pub komi: Option<f64>,
}

impl NodeData {
    pub fn play(color: Color, coord: &str) -> Self {
        let mut data = NodeData::default();
        match color {
            Color::Black => data.black = Some(coord.to_string()),
            Color::White => data.white = Some(coord.to_string()),
        }
        data
    }

    pub fn setup(add_black: &[&str], add_white: &[&str]) -> Self {
        NodeData {
            add_black: add_black.iter().map(|s| s.to_string()).collect(),
            add_white: add_white.iter().map(|s| s.to_string()).collect(),
            ..NodeData::default()
        }
    }

    /// Move played at this node, if any. Black wins if both are present.
    pub fn mv(&self) -> Option<(Color, &str)> {
        self.black
            .as_deref()
            .map(|c| (Color::Black, c))
            .or_else(|| self.white.as_deref().map(|c| (Color::White, c)))
    }
}

/// Expand setup entries, dropping anything that doesn't decode.
pub fn setup_vertices(entries: &[String], width: usize, height: usize) -> Vec<Vertex> {
    entries
        .iter()
        .filter_map(|e| decode_compressed(e, width, height).ok())
        .flatten()
        .collect()
}

/// Source of positions for record nodes.
pub trait PositionProvider {
    /// Position after the node's setup and move have been applied.
    fn resolve(&self, node: NodeId) -> Option<Position>;

    /// Node ids from the root down to `node`, inclusive.
    fn ancestry(&self, node: NodeId) -> Vec<NodeId>;

    fn data(&self, node: NodeId) -> Option<&NodeData>;

    /// Komi from the record root.
    fn komi(&self) -> f64;
}

/// Memoized positions keyed by node.
#[derive(Debug, Default)]
pub struct PositionCache {
    entries: Mutex<HashMap<NodeId, Position>>,
}

impl PositionCache {
    pub fn get(&self, node: NodeId) -> Option<Position> {
        self.entries.lock().ok()?.get(&node).cloned()
    }

    pub fn insert(&self, node: NodeId, position: Position) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(node, position);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |e| e.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    data: NodeData,
}

/// An in-memory game tree.
#[derive(Debug)]
pub struct GameRecord {
    width: usize,
    height: usize,
    nodes: Vec<Node>,
    cache: PositionCache,
}

impl GameRecord {
    /// A record whose root carries `root` data.
    pub fn new(width: usize, height: usize, root: NodeData) -> Self {
        GameRecord {
            width,
            height,
            nodes: vec![Node {
                parent: None,
                data: root,
            }],
            cache: PositionCache::default(),
        }
    }

    /// Build a main line of alternating moves starting with Black.
    ///
    /// Returns the record and the id of the last node.
    pub fn main_line(size: usize, komi: f64, moves: &[&str]) -> (Self, NodeId) {
        let root = NodeData {
            komi: Some(komi),
            ..NodeData::default()
        };
        let mut record = GameRecord::new(size, size, root);
        let mut node = record.root();
        let mut color = Color::Black;
        for mv in moves {
            node = record.add_node(node, NodeData::play(color, mv));
            color = color.opponent();
        }
        (record, node)
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node)?.parent
    }

    /// Append a child under `parent`. Unknown parents attach to the root.
    pub fn add_node(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let parent = if parent < self.nodes.len() { parent } else { 0 };
        self.nodes.push(Node {
            parent: Some(parent),
            data,
        });
        self.nodes.len() - 1
    }

    pub fn cache(&self) -> &PositionCache {
        &self.cache
    }

    fn apply(&self, base: &Position, data: &NodeData) -> Position {
        let mut pos = base.clone();
        for (entries, sign) in [
            (&data.add_black, 1),
            (&data.add_white, -1),
            (&data.add_empty, 0),
        ] {
            for v in setup_vertices(entries, self.width, self.height) {
                pos.set(v, sign);
            }
        }
        if let Some((color, coord)) = data.mv() {
            if let Ok(v) = crate::coord::decode_vertex(coord, self.width, self.height) {
                pos = pos.make_move(color.sign(), v);
            }
        }
        pos
    }
}

impl PositionProvider for GameRecord {
    fn resolve(&self, node: NodeId) -> Option<Position> {
        if node >= self.nodes.len() {
            return None;
        }
        if let Some(pos) = self.cache.get(node) {
            return Some(pos);
        }

        // Walk up to the nearest cached ancestor, then replay down.
        let mut pending = Vec::new();
        let mut cursor = Some(node);
        let mut pos = Position::new(self.width, self.height);
        while let Some(id) = cursor {
            if let Some(cached) = self.cache.get(id) {
                pos = cached;
                break;
            }
            pending.push(id);
            cursor = self.nodes[id].parent;
        }
        for id in pending.into_iter().rev() {
            pos = self.apply(&pos, &self.nodes[id].data);
            self.cache.insert(id, pos.clone());
        }
        Some(pos)
    }

    fn ancestry(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = (node < self.nodes.len()).then_some(node);
        while let Some(id) = cursor {
            out.push(id);
            cursor = self.nodes[id].parent;
        }
        out.reverse();
        out
    }

    fn data(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node).map(|n| &n.data)
    }

    fn komi(&self) -> f64 {
        self.nodes[0].data.komi.unwrap_or(crate::constants::DEFAULT_KOMI)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_line_resolution() {
        let (record, last) = GameRecord::main_line(9, 6.5, &["D4", "E5", "pass", "C3"]);
        let pos = record.resolve(last).unwrap();
        assert_eq!(pos.get((3, 5)), 1);
        assert_eq!(pos.get((4, 4)), -1);
        // the fourth move is White's
        assert_eq!(pos.get((2, 6)), -1);
        assert_eq!(record.komi(), 6.5);
        assert_eq!(record.ancestry(last), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_setup_and_cache() {
        let mut record = GameRecord::new(9, 9, NodeData::setup(&["A1:B2"], &["E5"]));
        let mut clear = NodeData::default();
        clear.add_empty.push("A1".into());
        let child = record.add_node(record.root(), clear);

        let pos = record.resolve(child).unwrap();
        assert_eq!(pos.stones().count(), 4);
        assert_eq!(pos.get((0, 8)), 0);
        assert_eq!(record.cache().len(), 2);

        // a second resolve is served from the cache
        assert_eq!(record.resolve(child), Some(pos));
        assert_eq!(record.cache().len(), 2);
        assert_eq!(record.resolve(99), None);
    }
}
