use skulk_core::{Movement, Point, DIAGONAL_COST, STEP_COST};

/// Manhattan (L1) distance between two points, in cells.
#[inline]
pub fn manhattan(a: Point, b: Point) -> i32 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

/// Octile distance in step-cost units: diagonal moves for the shorter axis,
/// straight moves for the rest.
#[inline]
pub fn octile(a: Point, b: Point) -> i32 {
    let dx = (a.x - b.x).abs();
    let dy = (a.y - b.y).abs();
    let (lo, hi) = if dx < dy { (dx, dy) } else { (dy, dx) };
    STEP_COST * hi + (DIAGONAL_COST - STEP_COST) * lo
}

/// Admissible heuristic for the given movement model, in step-cost units.
#[inline]
pub fn heuristic(movement: Movement, a: Point, b: Point) -> i32 {
    match movement {
        Movement::Cardinal => STEP_COST * manhattan(a, b),
        Movement::Octile => octile(a, b),
    }
}
