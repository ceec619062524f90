use std::collections::BinaryHeap;

use skulk_core::Point;

use crate::search::{NodeRef, PathNode, SearchSpace, UNREACHABLE};
use crate::traits::Pather;

impl SearchSpace {
    /// Multi-source Dijkstra cost map.
    ///
    /// Every source starts at cost 0. Cells costlier than `max_cost` are not
    /// settled. Returns the settled cells in order of increasing cost.
    pub fn dijkstra_map<P: Pather>(
        &mut self,
        pather: &P,
        sources: &[Point],
        max_cost: i32,
    ) -> &[PathNode] {
        self.dijkstra_map.fill(UNREACHABLE);
        self.dijkstra_results.clear();
        self.dijkstra_generation = self.dijkstra_generation.wrapping_add(1);
        let cur_gen = self.dijkstra_generation;

        let mut seq: u64 = 0;
        let mut open: BinaryHeap<NodeRef> = BinaryHeap::new();
        for &src in sources {
            let Some(si) = self.idx(src) else {
                continue;
            };
            let n = &mut self.dijkstra_nodes[si];
            n.g = 0;
            n.generation = cur_gen;
            n.open = true;
            self.dijkstra_map[si] = 0;
            seq += 1;
            open.push(NodeRef {
                idx: si,
                f: 0,
                g: 0,
                seq,
            });
        }

        let mut sbuf = std::mem::take(&mut self.sbuf);

        while let Some(current) = open.pop() {
            let ci = current.idx;
            let cn = &self.dijkstra_nodes[ci];
            if cn.generation != cur_gen || !cn.open || cn.g != current.g {
                continue;
            }
            let current_g = cn.g;
            self.dijkstra_nodes[ci].open = false;
            let cp = self.point(ci);
            self.dijkstra_results.push(PathNode {
                pos: cp,
                cost: current_g,
            });

            sbuf.clear();
            pather.neighbors(cp, &mut sbuf);
            for step in sbuf.iter() {
                let Some(ni) = self.idx(step.to) else {
                    continue;
                };
                let tentative = current_g + step.cost;
                if tentative > max_cost {
                    continue;
                }
                let n = &mut self.dijkstra_nodes[ni];
                if n.generation == cur_gen {
                    if tentative >= n.g {
                        continue;
                    }
                } else {
                    n.generation = cur_gen;
                }
                n.g = tentative;
                n.open = true;
                self.dijkstra_map[ni] = tentative;
                seq += 1;
                open.push(NodeRef {
                    idx: ni,
                    f: tentative,
                    g: tentative,
                    seq,
                });
            }
        }

        self.sbuf = sbuf;
        &self.dijkstra_results
    }

    /// Cost at `p` from the last [`dijkstra_map`](Self::dijkstra_map) call,
    /// or [`UNREACHABLE`].
    pub fn dijkstra_at(&self, p: Point) -> i32 {
        match self.idx(p) {
            Some(i) => self.dijkstra_map[i],
            None => UNREACHABLE,
        }
    }
}
