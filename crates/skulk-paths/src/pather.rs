//! Adapter exposing a [`MazeGraph`] to the searches in this crate.

use std::collections::HashSet;

use skulk_core::{Capabilities, MazeGraph, Point, Step};

use crate::distance;
use crate::traits::{AstarPather, Pather};

/// A capability-filtered view of a maze, optionally with extra blocked cells.
#[derive(Clone, Copy)]
pub struct MazePather<'a> {
    graph: &'a MazeGraph,
    caps: Capabilities,
    avoid: Option<&'a HashSet<Point>>,
}

impl<'a> MazePather<'a> {
    pub fn new(graph: &'a MazeGraph, caps: Capabilities) -> Self {
        Self {
            graph,
            caps,
            avoid: None,
        }
    }

    /// Additionally treat every cell of `avoid` as blocked.
    pub fn avoiding(mut self, avoid: &'a HashSet<Point>) -> Self {
        self.avoid = Some(avoid);
        self
    }

    /// Whether an agent may stand on `p` in this view.
    pub fn passable(&self, p: Point) -> bool {
        self.graph.passable(p, self.caps) && !self.avoid.is_some_and(|a| a.contains(&p))
    }
}

impl Pather for MazePather<'_> {
    fn neighbors(&self, p: Point, buf: &mut Vec<Step>) {
        match self.avoid {
            None => self.graph.neighbors(p, self.caps, buf),
            Some(avoid) => {
                if avoid.contains(&p) {
                    return;
                }
                let start = buf.len();
                self.graph.neighbors(p, self.caps, buf);
                // Diagonals squeezing past an avoided cell are dropped too.
                let mut i = start;
                while i < buf.len() {
                    let to = buf[i].to;
                    let d = to - p;
                    let blocked = avoid.contains(&to)
                        || (d.x != 0
                            && d.y != 0
                            && (avoid.contains(&p.shift(d.x, 0))
                                || avoid.contains(&p.shift(0, d.y))));
                    if blocked {
                        buf.swap_remove(i);
                    } else {
                        i += 1;
                    }
                }
                // Keep the graph's neighbor order for deterministic ties.
                buf[start..].sort_by_key(|s| neighbor_rank(p, s.to));
            }
        }
    }
}

impl AstarPather for MazePather<'_> {
    #[inline]
    fn estimate(&self, from: Point, to: Point) -> i32 {
        distance::heuristic(self.graph.movement(), from, to)
    }
}

/// Clockwise position of `to` around `p`, starting from up.
fn neighbor_rank(p: Point, to: Point) -> usize {
    p.neighbors_8().iter().position(|&n| n == to).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{SearchSpace, UNREACHABLE};
    use skulk_core::{LevelVersion, MazeBuilder, Movement, Range};

    /// 7x5 floor with a wall column at x=3 pierced by a locked door at (3, 2).
    fn split_room() -> MazeGraph {
        let mut b = MazeBuilder::new(7, 5, Movement::Cardinal).unwrap();
        b.carve(Range::new(0, 0, 7, 5));
        for y in 0..5 {
            b.set_terrain(Point::new(3, y), skulk_core::Terrain::Wall);
        }
        b.set_terrain(Point::new(3, 2), skulk_core::Terrain::Floor);
        b.add_locked_door(Point::new(3, 2), true);
        b.build(LevelVersion::INITIAL).unwrap()
    }

    #[test]
    fn flood_fill_respects_capabilities() {
        let g = split_room();
        let mut s = SearchSpace::new(g.bounds());
        let left = s.cc_map(&MazePather::new(&g, Capabilities::NONE), Point::ZERO);
        assert_eq!(left.len(), 15);
        assert!(!s.all_reached(&[Point::new(6, 4)]));

        let all = s.cc_map(&MazePather::new(&g, Capabilities::CAN_UNLOCK), Point::ZERO);
        assert_eq!(all.len(), 31);
        assert!(s.all_reached(&[Point::new(6, 4), Point::new(3, 2)]));
    }

    #[test]
    fn dijkstra_and_bfs_agree_on_cardinal_grids() {
        let g = split_room();
        let p = MazePather::new(&g, Capabilities::CAN_UNLOCK);
        let mut s = SearchSpace::new(g.bounds());
        s.dijkstra_map(&p, &[Point::ZERO], UNREACHABLE);
        s.bfs_map(&p, &[Point::ZERO], UNREACHABLE);
        for q in g.bounds() {
            let d = s.dijkstra_at(q);
            let b = s.bfs_at(q);
            if b == UNREACHABLE {
                assert_eq!(d, UNREACHABLE);
            } else {
                assert_eq!(d, 10 * b);
            }
        }
        assert_eq!(s.bfs_at(Point::new(6, 2)), 8);
    }

    #[test]
    fn components_are_split_by_locked_door() {
        let g = split_room();
        let mut s = SearchSpace::new(g.bounds());
        s.cc_map_all(&MazePather::new(&g, Capabilities::NONE));
        let l = s.cc_at(Point::ZERO);
        let r = s.cc_at(Point::new(6, 0));
        assert!(l.is_some() && r.is_some());
        assert_ne!(l, r);
        assert_eq!(s.cc_at(Point::new(1, 4)), l);
    }

    #[test]
    fn avoid_set_blocks_cells_and_corners() {
        let mut b = MazeBuilder::new(3, 3, Movement::Octile).unwrap();
        b.carve(Range::new(0, 0, 3, 3));
        let g = b.build(LevelVersion::INITIAL).unwrap();
        let avoid: HashSet<Point> = [Point::new(1, 0)].into_iter().collect();
        let p = MazePather::new(&g, Capabilities::NONE).avoiding(&avoid);
        let mut buf = Vec::new();
        p.neighbors(Point::ZERO, &mut buf);
        let to: Vec<Point> = buf.iter().map(|s| s.to).collect();
        assert_eq!(to, vec![Point::new(0, 1)]);
        assert!(!p.passable(Point::new(1, 0)));
        buf.clear();
        p.neighbors(Point::new(1, 0), &mut buf);
        assert!(buf.is_empty());
    }
}
