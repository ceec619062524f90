use skulk_core::{Point, Step};

/// Graph view consumed by the searches in this crate.
pub trait Pather {
    /// Append the traversable steps out of `p` into `buf`. The caller clears
    /// `buf` before calling. Step costs must be > 0.
    fn neighbors(&self, p: Point, buf: &mut Vec<Step>);
}

/// Pather with an admissible heuristic, required by A*.
pub trait AstarPather: Pather {
    /// Estimated cost from `from` to `to`. Must never overestimate the true
    /// cost.
    fn estimate(&self, from: Point, to: Point) -> i32;
}
