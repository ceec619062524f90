use std::collections::VecDeque;

use skulk_core::Point;

use crate::search::{PathNode, SearchSpace, UNREACHABLE};
use crate::traits::Pather;

impl SearchSpace {
    /// Multi-source breadth-first distance map, counting steps and ignoring
    /// step costs. Cells farther than `max_dist` steps are not reached.
    pub fn bfs_map<P: Pather>(
        &mut self,
        pather: &P,
        sources: &[Point],
        max_dist: i32,
    ) -> &[PathNode] {
        self.bfs_map.fill(UNREACHABLE);
        self.bfs_results.clear();

        let mut queue: VecDeque<usize> = VecDeque::new();
        for &src in sources {
            let Some(si) = self.idx(src) else {
                continue;
            };
            if self.bfs_map[si] != UNREACHABLE {
                continue;
            }
            self.bfs_map[si] = 0;
            queue.push_back(si);
            self.bfs_results.push(PathNode { pos: src, cost: 0 });
        }

        let mut sbuf = std::mem::take(&mut self.sbuf);

        while let Some(ci) = queue.pop_front() {
            let nd = self.bfs_map[ci] + 1;
            if nd > max_dist {
                continue;
            }
            let cp = self.point(ci);
            sbuf.clear();
            pather.neighbors(cp, &mut sbuf);
            for step in sbuf.iter() {
                let Some(ni) = self.idx(step.to) else {
                    continue;
                };
                if self.bfs_map[ni] != UNREACHABLE {
                    continue;
                }
                self.bfs_map[ni] = nd;
                queue.push_back(ni);
                self.bfs_results.push(PathNode {
                    pos: step.to,
                    cost: nd,
                });
            }
        }

        self.sbuf = sbuf;
        &self.bfs_results
    }

    /// Step count at `p` from the last [`bfs_map`](Self::bfs_map) call, or
    /// [`UNREACHABLE`].
    pub fn bfs_at(&self, p: Point) -> i32 {
        match self.idx(p) {
            Some(i) => self.bfs_map[i],
            None => UNREACHABLE,
        }
    }
}
