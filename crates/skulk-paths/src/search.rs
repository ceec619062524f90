use std::cmp::Ordering;

use skulk_core::{Point, Range, Step};

/// A position with an associated cost, returned from Dijkstra / BFS map queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathNode {
    pub pos: Point,
    pub cost: i32,
}

/// Sentinel value meaning "unreachable" in BFS / Dijkstra maps.
pub const UNREACHABLE: i32 = i32::MAX;

// ---------------------------------------------------------------------------
// Priority-queue nodes
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub(crate) struct Node {
    pub(crate) g: i32,
    pub(crate) parent: usize,
    pub(crate) generation: u32,
    pub(crate) open: bool,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            g: UNREACHABLE,
            parent: usize::MAX,
            generation: 0,
            open: false,
        }
    }
}

/// Heap entry. `BinaryHeap` is a max-heap, so the ordering is reversed:
/// lowest `f` first, then lowest `g`, then earliest push.
#[derive(Clone, Copy, Eq, PartialEq)]
pub(crate) struct NodeRef {
    pub(crate) idx: usize,
    pub(crate) f: i32,
    pub(crate) g: i32,
    pub(crate) seq: u64,
}

impl Ord for NodeRef {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.g.cmp(&self.g))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for NodeRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ---------------------------------------------------------------------------
// SearchSpace
// ---------------------------------------------------------------------------

/// Reusable scratch memory for searches over one grid rectangle.
///
/// Node arrays are invalidated lazily with generation counters, so repeated
/// queries allocate nothing after warm-up. A `SearchSpace` is not shared:
/// the navigator keeps one behind a mutex and each worker owns its own.
pub struct SearchSpace {
    pub(crate) rng: Range,
    pub(crate) width: usize,
    pub(crate) astar_nodes: Vec<Node>,
    pub(crate) astar_generation: u32,
    pub(crate) dijkstra_nodes: Vec<Node>,
    pub(crate) dijkstra_generation: u32,
    pub(crate) dijkstra_results: Vec<PathNode>,
    pub(crate) dijkstra_map: Vec<i32>,
    pub(crate) bfs_map: Vec<i32>,
    pub(crate) bfs_results: Vec<PathNode>,
    pub(crate) cc_labels: Vec<i32>,
    pub(crate) cc_stack: Vec<usize>,
    pub(crate) sbuf: Vec<Step>,
}

impl SearchSpace {
    pub fn new(rng: Range) -> Self {
        let len = rng.len();
        Self {
            rng,
            width: rng.width().max(0) as usize,
            astar_nodes: vec![Node::default(); len],
            astar_generation: 0,
            dijkstra_nodes: vec![Node::default(); len],
            dijkstra_generation: 0,
            dijkstra_results: Vec::new(),
            dijkstra_map: vec![UNREACHABLE; len],
            bfs_map: vec![UNREACHABLE; len],
            bfs_results: Vec::new(),
            cc_labels: vec![-1; len],
            cc_stack: Vec::new(),
            sbuf: Vec::with_capacity(8),
        }
    }

    /// Switch to another rectangle.
    ///
    /// If the new size fits in the existing node arrays only the generation
    /// counters are bumped. Otherwise everything is reallocated.
    pub fn set_range(&mut self, rng: Range) {
        let new_len = rng.len();
        self.rng = rng;
        self.width = rng.width().max(0) as usize;
        self.dijkstra_results.clear();
        self.bfs_results.clear();
        self.cc_stack.clear();

        if new_len <= self.astar_nodes.len() {
            self.astar_generation = self.astar_generation.wrapping_add(1);
            self.dijkstra_generation = self.dijkstra_generation.wrapping_add(1);
            return;
        }

        self.astar_nodes.clear();
        self.astar_nodes.resize(new_len, Node::default());
        self.astar_generation = 0;
        self.dijkstra_nodes.clear();
        self.dijkstra_nodes.resize(new_len, Node::default());
        self.dijkstra_generation = 0;
        self.dijkstra_map.clear();
        self.dijkstra_map.resize(new_len, UNREACHABLE);
        self.bfs_map.clear();
        self.bfs_map.resize(new_len, UNREACHABLE);
        self.cc_labels.clear();
        self.cc_labels.resize(new_len, -1);
    }

    /// Make sure the scratch covers `rng`, reallocating only on change.
    pub fn ensure_range(&mut self, rng: Range) {
        if self.rng != rng {
            self.set_range(rng);
        }
    }

    #[inline]
    pub fn range(&self) -> Range {
        self.rng
    }

    #[inline]
    pub(crate) fn idx(&self, p: Point) -> Option<usize> {
        if !self.rng.contains(p) {
            return None;
        }
        let x = (p.x - self.rng.min.x) as usize;
        let y = (p.y - self.rng.min.y) as usize;
        Some(y * self.width + x)
    }

    #[inline]
    pub(crate) fn point(&self, idx: usize) -> Point {
        let x = (idx % self.width) as i32 + self.rng.min.x;
        let y = (idx / self.width) as i32 + self.rng.min.y;
        Point::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    #[test]
    fn shrinking_keeps_capacity() {
        let mut s = SearchSpace::new(Range::new(0, 0, 20, 20));
        let cap = s.astar_nodes.len();
        let small = Range::new(0, 0, 5, 5);
        s.set_range(small);
        assert_eq!(s.range(), small);
        assert_eq!(s.astar_nodes.len(), cap);
        assert_eq!(s.width, 5);
        assert_eq!(s.astar_generation, 1);
    }

    #[test]
    fn growing_reallocates() {
        let mut s = SearchSpace::new(Range::new(0, 0, 5, 5));
        s.ensure_range(Range::new(0, 0, 20, 20));
        assert_eq!(s.astar_nodes.len(), 400);
        assert_eq!(s.bfs_map.len(), 400);
    }

    #[test]
    fn index_round_trip_with_offset() {
        let s = SearchSpace::new(Range::new(3, 4, 10, 9));
        let p = Point::new(7, 6);
        let i = s.idx(p).unwrap();
        assert_eq!(s.point(i), p);
        assert_eq!(s.idx(Point::new(10, 4)), None);
    }

    #[test]
    fn heap_breaks_ties_by_g_then_seq() {
        let mut heap = BinaryHeap::new();
        heap.push(NodeRef { idx: 0, f: 50, g: 30, seq: 0 });
        heap.push(NodeRef { idx: 1, f: 50, g: 20, seq: 1 });
        heap.push(NodeRef { idx: 2, f: 50, g: 20, seq: 2 });
        heap.push(NodeRef { idx: 3, f: 40, g: 40, seq: 3 });
        let order: Vec<usize> = std::iter::from_fn(|| heap.pop().map(|n| n.idx)).collect();
        assert_eq!(order, vec![3, 1, 2, 0]);
    }
}
