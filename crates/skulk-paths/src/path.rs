use std::sync::Arc;

use skulk_core::Point;

/// An immutable, cheaply clonable path from start to goal (both included).
///
/// Cache hits hand out clones sharing the same cell buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    cells: Arc<[Point]>,
    cost: i32,
}

impl Path {
    /// Wrap a non-empty cell sequence and its total step cost.
    pub(crate) fn new(cells: Vec<Point>, cost: i32) -> Self {
        debug_assert!(!cells.is_empty(), "a path holds at least its start");
        Self {
            cells: cells.into(),
            cost,
        }
    }

    #[inline]
    pub fn cells(&self) -> &[Point] {
        &self.cells
    }

    #[inline]
    pub fn cost(&self) -> i32 {
        self.cost
    }

    /// Number of cells, start and goal included.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn start(&self) -> Option<Point> {
        self.cells.first().copied()
    }

    pub fn goal(&self) -> Option<Point> {
        self.cells.last().copied()
    }

    /// Whether two handles share the same cell buffer.
    pub fn ptr_eq(&self, other: &Path) -> bool {
        Arc::ptr_eq(&self.cells, &other.cells)
    }

    /// Whether the path depends on any of `cells`: it steps on one, or one
    /// is a side cell of a diagonal step, which must stay open for the step
    /// to exist.
    pub fn touches(&self, cells: &[Point]) -> bool {
        if self.cells.iter().any(|p| cells.contains(p)) {
            return true;
        }
        self.cells.windows(2).any(|w| {
            let d = w[1] - w[0];
            d.x != 0
                && d.y != 0
                && (cells.contains(&w[0].shift(d.x, 0)) || cells.contains(&w[0].shift(0, d.y)))
        })
    }

    /// The cell after `from` on this path. `None` if `from` is the goal or
    /// not on the path.
    pub fn next_step(&self, from: Point) -> Option<Point> {
        let i = self.cells.iter().position(|&p| p == from)?;
        self.cells.get(i + 1).copied()
    }

    /// Waypoints sampled evenly along the path, keeping both endpoints.
    ///
    /// Paths of at most `max_points` cells are returned whole.
    pub fn simplified(&self, max_points: usize) -> Vec<Point> {
        let n = self.cells.len();
        if n <= max_points.max(2) {
            return self.cells.to_vec();
        }
        let stride = n / max_points.max(1);
        let mut out = Vec::with_capacity(max_points + 1);
        out.push(self.cells[0]);
        out.extend(self.cells[1..n - 1].iter().skip(stride - 1).step_by(stride));
        out.push(self.cells[n - 1]);
        out
    }
}
