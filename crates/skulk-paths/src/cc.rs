//! Flood fill and connected-component labelling.

use skulk_core::Point;

use crate::search::SearchSpace;
use crate::traits::Pather;

impl SearchSpace {
    /// Label every cell of the range with a connected-component id.
    ///
    /// Cells with no outgoing steps end up in singleton components. Query
    /// labels with [`cc_at`](Self::cc_at).
    pub fn cc_map_all<P: Pather>(&mut self, pather: &P) {
        let len = self.rng.len();
        self.cc_labels.fill(-1);

        let mut label: i32 = 0;
        let mut sbuf = std::mem::take(&mut self.sbuf);

        for start in 0..len {
            if self.cc_labels[start] >= 0 {
                continue;
            }
            self.cc_stack.clear();
            self.cc_stack.push(start);
            self.cc_labels[start] = label;

            while let Some(ci) = self.cc_stack.pop() {
                let cp = self.point(ci);
                sbuf.clear();
                pather.neighbors(cp, &mut sbuf);
                for step in sbuf.iter() {
                    if let Some(ni) = self.idx(step.to) {
                        if self.cc_labels[ni] < 0 {
                            self.cc_labels[ni] = label;
                            self.cc_stack.push(ni);
                        }
                    }
                }
            }
            label += 1;
        }

        self.sbuf = sbuf;
    }

    /// Flood fill from `p`; returns every reached cell including `p`.
    pub fn cc_map<P: Pather>(&mut self, pather: &P, p: Point) -> Vec<Point> {
        self.cc_labels.fill(-1);

        let mut result = Vec::new();
        let Some(si) = self.idx(p) else {
            return result;
        };

        let mut sbuf = std::mem::take(&mut self.sbuf);
        self.cc_stack.clear();
        self.cc_stack.push(si);
        self.cc_labels[si] = 0;
        result.push(p);

        while let Some(ci) = self.cc_stack.pop() {
            let cp = self.point(ci);
            sbuf.clear();
            pather.neighbors(cp, &mut sbuf);
            for step in sbuf.iter() {
                if let Some(ni) = self.idx(step.to) {
                    if self.cc_labels[ni] < 0 {
                        self.cc_labels[ni] = 0;
                        self.cc_stack.push(ni);
                        result.push(step.to);
                    }
                }
            }
        }

        self.sbuf = sbuf;
        result
    }

    /// Component label of `p` after the last flood fill, if it was reached.
    pub fn cc_at(&self, p: Point) -> Option<usize> {
        let i = self.idx(p)?;
        usize::try_from(self.cc_labels[i]).ok()
    }

    /// Whether every point in `targets` was reached by the last
    /// [`cc_map`](Self::cc_map) call.
    pub fn all_reached(&self, targets: &[Point]) -> bool {
        targets.iter().all(|&t| self.cc_at(t).is_some())
    }
}
