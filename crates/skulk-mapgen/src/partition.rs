//! Binary space partition of the level interior.
//!
//! The tree lives in a flat arena built and dropped inside one generation
//! attempt. Nodes are created breadth-first, so every child has a larger
//! index than its parent and a reverse walk over the arena visits the tree
//! bottom-up.

use std::collections::VecDeque;

use rand::Rng;
use skulk_core::Range;

/// Aspect ratio above which the longer axis is always split.
const SPLIT_RATIO: f64 = 1.25;

#[derive(Debug, Clone)]
pub struct PartitionNode {
    pub rect: Range,
    /// Indices of the two halves, if this node was split.
    pub children: Option<(usize, usize)>,
    /// Index into the room list, for terminal nodes.
    pub room: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct PartitionArena {
    pub nodes: Vec<PartitionNode>,
}

impl PartitionArena {
    /// Split `interior` with a FIFO work queue.
    ///
    /// A region is split while both halves keep at least `min_region` cells
    /// on the split axis. Regions that already fit a `max_region` square are
    /// left whole, except the root which is always split.
    pub fn split(interior: Range, min_region: i32, max_region: i32, rng: &mut impl Rng) -> Self {
        let mut arena = Self {
            nodes: vec![PartitionNode {
                rect: interior,
                children: None,
                room: None,
            }],
        };
        let mut queue = VecDeque::from([0usize]);
        while let Some(i) = queue.pop_front() {
            let rect = arena.nodes[i].rect;
            let fits = rect.width() <= max_region && rect.height() <= max_region;
            if i != 0 && fits {
                continue;
            }
            let Some((a, b)) = split_rect(rect, min_region, rng) else {
                continue;
            };
            let ia = arena.push(a);
            let ib = arena.push(b);
            arena.nodes[i].children = Some((ia, ib));
            queue.push_back(ia);
            queue.push_back(ib);
        }
        arena
    }

    fn push(&mut self, rect: Range) -> usize {
        self.nodes.push(PartitionNode {
            rect,
            children: None,
            room: None,
        });
        self.nodes.len() - 1
    }

    /// Indices of terminal nodes, in creation order.
    pub fn leaves(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&i| self.nodes[i].children.is_none())
            .collect()
    }

    /// Room indices below node `i`, in creation order of their leaves.
    pub fn rooms_under(&self, i: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![i];
        while let Some(n) = stack.pop() {
            match self.nodes[n].children {
                Some((a, b)) => {
                    stack.push(b);
                    stack.push(a);
                }
                None => out.extend(self.nodes[n].room),
            }
        }
        out.sort_unstable();
        out
    }

    /// Internal nodes, deepest first.
    pub fn internal_bottom_up(&self) -> impl Iterator<Item = (usize, (usize, usize))> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .rev()
            .filter_map(|(i, n)| n.children.map(|c| (i, c)))
    }
}

/// Split `rect` in two, or `None` if neither axis leaves two valid halves.
fn split_rect(rect: Range, min_region: i32, rng: &mut impl Rng) -> Option<(Range, Range)> {
    let w = rect.width();
    let h = rect.height();
    let can_v = w >= 2 * min_region;
    let can_h = h >= 2 * min_region;
    let vertical = match (can_v, can_h) {
        (false, false) => return None,
        (true, false) => true,
        (false, true) => false,
        (true, true) => {
            let (wf, hf) = (f64::from(w), f64::from(h));
            if wf / hf >= SPLIT_RATIO {
                true
            } else if hf / wf >= SPLIT_RATIO {
                false
            } else {
                rng.random_bool(0.5)
            }
        }
    };
    let extent = if vertical { w } else { h };
    let at = rng.random_range(min_region..=extent - min_region);
    let (min, max) = (rect.min, rect.max);
    Some(if vertical {
        (
            Range::new(min.x, min.y, min.x + at, max.y),
            Range::new(min.x + at, min.y, max.x, max.y),
        )
    } else {
        (
            Range::new(min.x, min.y, max.x, min.y + at),
            Range::new(min.x, min.y + at, max.x, max.y),
        )
    })
}
