use std::collections::BinaryHeap;

use skulk_core::Point;

use crate::search::{NodeRef, SearchSpace, UNREACHABLE};
use crate::traits::AstarPather;

/// Optional bounds on a single A* query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchLimits {
    /// Maximum number of nodes closed before giving up.
    pub max_expansions: Option<usize>,
    /// Paths costlier than this are not explored.
    pub max_cost: Option<i32>,
}

/// Result of an A* query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Cost-optimal path including both endpoints.
    Found { cells: Vec<Point>, cost: i32 },
    /// The goal is unreachable (within `max_cost`, if set).
    NoPath,
    /// `max_expansions` ran out before the search settled.
    BudgetExhausted,
}

impl SearchOutcome {
    pub fn found(self) -> Option<(Vec<Point>, i32)> {
        match self {
            SearchOutcome::Found { cells, cost } => Some((cells, cost)),
            _ => None,
        }
    }
}

impl SearchSpace {
    /// Shortest path from `from` to `to` using A*.
    ///
    /// The caller is responsible for rejecting impassable endpoints; this
    /// only requires that both lie in the current range. Ties on `f` are
    /// broken by lower `g`, then by insertion order, so results are
    /// deterministic.
    pub fn astar<P: AstarPather>(
        &mut self,
        pather: &P,
        from: Point,
        to: Point,
        limits: SearchLimits,
    ) -> SearchOutcome {
        let (Some(start_idx), Some(goal_idx)) = (self.idx(from), self.idx(to)) else {
            return SearchOutcome::NoPath;
        };
        if start_idx == goal_idx {
            return SearchOutcome::Found {
                cells: vec![from],
                cost: 0,
            };
        }
        let max_cost = limits.max_cost.unwrap_or(UNREACHABLE);
        let h0 = pather.estimate(from, to);
        if h0 > max_cost {
            return SearchOutcome::NoPath;
        }

        self.astar_generation = self.astar_generation.wrapping_add(1);
        let cur_gen = self.astar_generation;
        {
            let node = &mut self.astar_nodes[start_idx];
            node.g = 0;
            node.parent = usize::MAX;
            node.generation = cur_gen;
            node.open = true;
        }

        let mut seq: u64 = 0;
        let mut open: BinaryHeap<NodeRef> = BinaryHeap::new();
        open.push(NodeRef {
            idx: start_idx,
            f: h0,
            g: 0,
            seq,
        });

        let mut expansions: usize = 0;
        let mut sbuf = std::mem::take(&mut self.sbuf);

        let outcome = loop {
            let Some(current) = open.pop() else {
                break SearchOutcome::NoPath;
            };
            let ci = current.idx;
            let node = &self.astar_nodes[ci];
            // Stale heap entry: closed already or superseded by a cheaper push.
            if node.generation != cur_gen || !node.open || node.g != current.g {
                continue;
            }
            if ci == goal_idx {
                break SearchOutcome::Found {
                    cells: Vec::new(),
                    cost: current.g,
                };
            }
            if limits.max_expansions.is_some_and(|max| expansions >= max) {
                break SearchOutcome::BudgetExhausted;
            }
            expansions += 1;

            self.astar_nodes[ci].open = false;
            let current_g = current.g;
            let cp = self.point(ci);

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
                let n = &mut self.astar_nodes[ni];
                if n.generation == cur_gen {
                    if tentative >= n.g {
                        continue;
                    }
                } else {
                    n.generation = cur_gen;
                }
                n.g = tentative;
                n.parent = ci;
                n.open = true;
                seq += 1;
                open.push(NodeRef {
                    idx: ni,
                    f: tentative + pather.estimate(step.to, to),
                    g: tentative,
                    seq,
                });
            }
        };

        self.sbuf = sbuf;

        match outcome {
            SearchOutcome::Found { cost, .. } => {
                let mut cells = Vec::new();
                let mut ci = goal_idx;
                while ci != usize::MAX {
                    cells.push(self.point(ci));
                    ci = self.astar_nodes[ci].parent;
                }
                cells.reverse();
                log::trace!("astar {from} -> {to}: cost {cost}, {expansions} expansions");
                SearchOutcome::Found { cells, cost }
            }
            other => other,
        }
    }
}
