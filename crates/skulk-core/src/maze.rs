//! The maze graph: walkable cells, live door/lever permeability and the
//! level version.
//!
//! [`MazeGraph`] is the single source of truth consulted by the generator
//! when it validates a layout and by the pathfinder at query time. Every
//! runtime change that can alter reachability goes through one of its
//! mutation methods, which bump the [`LevelVersion`] and describe the
//! change as a [`Mutation`].
//!
//! Layouts are assembled with a [`MazeBuilder`], which performs no version
//! bookkeeping, and published with [`MazeBuilder::build`].

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::cell::{Capabilities, Cell, Tags, Terrain};
use crate::geom::{Point, Range};

/// Cost of a cardinal step.
pub const STEP_COST: i32 = 10;
/// Cost of a diagonal step (10·√2 rounded down, so octile distance stays
/// admissible).
pub const DIAGONAL_COST: i32 = 14;

/// Movement model of a level.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Movement {
    /// 4-directional.
    #[default]
    Cardinal,
    /// 8-directional without cutting corners.
    Octile,
}

// ---------------------------------------------------------------------------
// LevelVersion
// ---------------------------------------------------------------------------

/// Monotonic identifier of a topology/permeability snapshot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LevelVersion(pub u64);

impl LevelVersion {
    pub const INITIAL: Self = Self(1);

    #[inline]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Default for LevelVersion {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for LevelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

/// Direction of a permeability change.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MutationKind {
    /// Edges were only added.
    Opened,
    /// Edges were only removed.
    Closed,
    /// The whole graph was replaced.
    Rebuilt,
}

/// Which part of the model changed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Concern {
    LockedDoor,
    LeverGate,
    Terrain,
    Level,
}

/// Description of one version bump.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mutation {
    pub from: LevelVersion,
    pub to: LevelVersion,
    pub kind: MutationKind,
    pub concern: Concern,
    /// Cells whose permeability changed. Empty for [`MutationKind::Rebuilt`].
    pub cells: Vec<Point>,
}

impl Mutation {
    /// Whether an agent with `caps` traverses the changed cells the same way
    /// before and after the change.
    pub fn bypassed_by(&self, caps: Capabilities) -> bool {
        match self.concern {
            Concern::LockedDoor => caps.contains(Capabilities::CAN_UNLOCK),
            Concern::LeverGate => caps.contains(Capabilities::CAN_PASS_GATES),
            Concern::Terrain | Concern::Level => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MazeError {
    #[error("maze size {width}x{height} is not positive")]
    InvalidSize { width: i32, height: i32 },
    #[error("{0} is outside the maze")]
    OutOfBounds(Point),
    #[error("no locked door at {0}")]
    NotALockedDoor(Point),
    #[error("no lever with id {0}")]
    UnknownLever(usize),
    #[error("inconsistent link at {pos}: {reason}")]
    LinkConflict { pos: Point, reason: String },
    #[error("expected {expected} cells, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

// ---------------------------------------------------------------------------
// Lever links and steps
// ---------------------------------------------------------------------------

/// A lever and the gates it drives. A gate is open while its lever is on.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lever {
    pub pos: Point,
    pub on: bool,
    pub gates: Vec<Point>,
}

/// One traversable edge out of a cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub to: Point,
    pub cost: i32,
}

// ---------------------------------------------------------------------------
// MazeBuilder
// ---------------------------------------------------------------------------

/// Mutable layout under construction. No version bookkeeping.
#[derive(Clone, Debug)]
pub struct MazeBuilder {
    bounds: Range,
    cells: Vec<Cell>,
    movement: Movement,
    locked_doors: BTreeMap<Point, bool>,
    levers: Vec<Lever>,
}

impl MazeBuilder {
    /// A `width`×`height` layout of solid wall.
    pub fn new(width: i32, height: i32, movement: Movement) -> Result<Self, MazeError> {
        if width <= 0 || height <= 0 {
            return Err(MazeError::InvalidSize { width, height });
        }
        let bounds = Range::new(0, 0, width, height);
        Ok(Self {
            bounds,
            cells: vec![Cell::WALL; bounds.len()],
            movement,
            locked_doors: BTreeMap::new(),
            levers: Vec::new(),
        })
    }

    /// Rebuild a layout from persisted cells in row-major order.
    pub fn from_cells(
        width: i32,
        height: i32,
        movement: Movement,
        cells: Vec<Cell>,
    ) -> Result<Self, MazeError> {
        if width <= 0 || height <= 0 {
            return Err(MazeError::InvalidSize { width, height });
        }
        let expected = (width as usize).checked_mul(height as usize);
        if expected != Some(cells.len()) {
            return Err(MazeError::DimensionMismatch {
                expected: expected.unwrap_or(usize::MAX),
                found: cells.len(),
            });
        }
        Ok(Self {
            bounds: Range::new(0, 0, width, height),
            cells,
            movement,
            locked_doors: BTreeMap::new(),
            levers: Vec::new(),
        })
    }

    #[inline]
    pub fn bounds(&self) -> Range {
        self.bounds
    }

    #[inline]
    pub fn movement(&self) -> Movement {
        self.movement
    }

    #[inline]
    fn idx(&self, p: Point) -> Option<usize> {
        index_in(self.bounds, p)
    }

    pub fn cell(&self, p: Point) -> Option<Cell> {
        self.idx(p).map(|i| self.cells[i])
    }

    pub fn is_floor(&self, p: Point) -> bool {
        self.cell(p).is_some_and(Cell::is_floor)
    }

    /// Set terrain. Out-of-bounds points are ignored.
    pub fn set_terrain(&mut self, p: Point, terrain: Terrain) {
        if let Some(i) = self.idx(p) {
            self.cells[i].terrain = terrain;
        }
    }

    /// Carve every cell of `r` (clipped to bounds) to floor.
    pub fn carve(&mut self, r: Range) {
        for p in r.intersect(self.bounds) {
            self.set_terrain(p, Terrain::Floor);
        }
    }

    pub fn tag(&mut self, p: Point, tags: Tags) {
        if let Some(i) = self.idx(p) {
            self.cells[i].tags |= tags;
        }
    }

    pub fn untag(&mut self, p: Point, tags: Tags) {
        if let Some(i) = self.idx(p) {
            self.cells[i].tags = self.cells[i].tags.without(tags);
        }
    }

    /// Register a locked door at `p`, tagging the cell.
    pub fn add_locked_door(&mut self, p: Point, locked: bool) {
        self.tag(p, Tags::LOCKED_DOOR);
        self.locked_doors.insert(p, locked);
    }

    /// Register a lever driving `gates`, tagging all involved cells.
    /// Returns the lever id.
    pub fn add_lever(&mut self, pos: Point, on: bool, gates: Vec<Point>) -> usize {
        self.tag(pos, Tags::LEVER);
        for &g in &gates {
            self.tag(g, Tags::LEVER_GATE);
        }
        self.levers.push(Lever { pos, on, gates });
        self.levers.len() - 1
    }

    /// Validate links and publish the layout at `version`.
    pub fn build(self, version: LevelVersion) -> Result<MazeGraph, MazeError> {
        let mut gate_owner = BTreeMap::new();
        for (&p, _) in &self.locked_doors {
            let c = self.cell(p).ok_or(MazeError::OutOfBounds(p))?;
            if !c.is_floor() || !c.tags.contains(Tags::LOCKED_DOOR) {
                return Err(conflict(p, "locked door on an untagged or wall cell"));
            }
        }
        for (id, lever) in self.levers.iter().enumerate() {
            let c = self.cell(lever.pos).ok_or(MazeError::OutOfBounds(lever.pos))?;
            if !c.tags.contains(Tags::LEVER) {
                return Err(conflict(lever.pos, "lever cell is not tagged"));
            }
            if lever.gates.is_empty() {
                return Err(conflict(lever.pos, "lever controls no gate"));
            }
            for &g in &lever.gates {
                let gc = self.cell(g).ok_or(MazeError::OutOfBounds(g))?;
                if !gc.is_floor() || !gc.tags.contains(Tags::LEVER_GATE) {
                    return Err(conflict(g, "gate on an untagged or wall cell"));
                }
                if self.locked_doors.contains_key(&g) {
                    return Err(conflict(g, "cell is both a gate and a locked door"));
                }
                if gate_owner.insert(g, id).is_some() {
                    return Err(conflict(g, "gate driven by two levers"));
                }
            }
        }
        for (i, c) in self.cells.iter().enumerate() {
            let p = point_in(self.bounds, i);
            if c.tags.contains(Tags::LOCKED_DOOR) && !self.locked_doors.contains_key(&p) {
                return Err(conflict(p, "locked-door tag without a lock entry"));
            }
            if c.tags.contains(Tags::LEVER_GATE) && !gate_owner.contains_key(&p) {
                return Err(conflict(p, "gate tag without a controlling lever"));
            }
        }
        Ok(MazeGraph {
            bounds: self.bounds,
            cells: self.cells,
            movement: self.movement,
            locked_doors: self.locked_doors,
            levers: self.levers,
            gate_owner,
            version,
        })
    }
}

fn conflict(pos: Point, reason: &str) -> MazeError {
    MazeError::LinkConflict {
        pos,
        reason: reason.to_string(),
    }
}

#[inline]
fn index_in(bounds: Range, p: Point) -> Option<usize> {
    if !bounds.contains(p) {
        return None;
    }
    let x = (p.x - bounds.min.x) as usize;
    let y = (p.y - bounds.min.y) as usize;
    Some(y * bounds.width() as usize + x)
}

#[inline]
fn point_in(bounds: Range, idx: usize) -> Point {
    let w = bounds.width() as usize;
    Point::new(
        (idx % w) as i32 + bounds.min.x,
        (idx / w) as i32 + bounds.min.y,
    )
}

// ---------------------------------------------------------------------------
// MazeGraph
// ---------------------------------------------------------------------------

/// Persistent level graph with live permeability state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MazeGraph {
    bounds: Range,
    cells: Vec<Cell>,
    movement: Movement,
    locked_doors: BTreeMap<Point, bool>,
    levers: Vec<Lever>,
    gate_owner: BTreeMap<Point, usize>,
    version: LevelVersion,
}

impl MazeGraph {
    #[inline]
    pub fn bounds(&self) -> Range {
        self.bounds
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.bounds.width()
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.bounds.height()
    }

    #[inline]
    pub fn movement(&self) -> Movement {
        self.movement
    }

    #[inline]
    pub fn version(&self) -> LevelVersion {
        self.version
    }

    /// Return the layout to builder form, dropping version bookkeeping.
    pub fn into_builder(self) -> MazeBuilder {
        MazeBuilder {
            bounds: self.bounds,
            cells: self.cells,
            movement: self.movement,
            locked_doors: self.locked_doors,
            levers: self.levers,
        }
    }

    pub fn cell(&self, p: Point) -> Option<Cell> {
        index_in(self.bounds, p).map(|i| self.cells[i])
    }

    pub fn tags(&self, p: Point) -> Tags {
        self.cell(p).map(|c| c.tags).unwrap_or_default()
    }

    /// Read-only row-major enumeration of every cell, for renderers.
    pub fn cells(&self) -> impl Iterator<Item = (Point, Cell)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, &c)| (point_in(self.bounds, i), c))
    }

    /// Row-major positions of every cell carrying any of `tags`.
    pub fn positions_with(&self, tags: Tags) -> Vec<Point> {
        self.cells()
            .filter(|(_, c)| c.tags.intersects(tags))
            .map(|(p, _)| p)
            .collect()
    }

    /// Number of floor cells.
    pub fn floor_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_floor()).count()
    }

    /// Locked doors in row-major order with their lock state.
    pub fn locked_doors(&self) -> impl Iterator<Item = (Point, bool)> + '_ {
        self.locked_doors.iter().map(|(&p, &l)| (p, l))
    }

    pub fn is_locked(&self, p: Point) -> Option<bool> {
        self.locked_doors.get(&p).copied()
    }

    pub fn levers(&self) -> &[Lever] {
        &self.levers
    }

    /// Id of the lever standing at `p`.
    pub fn lever_at(&self, p: Point) -> Option<usize> {
        self.levers.iter().position(|l| l.pos == p)
    }

    /// Id of the lever driving the gate at `p`.
    pub fn gate_controller(&self, p: Point) -> Option<usize> {
        self.gate_owner.get(&p).copied()
    }

    /// Whether the gate at `p` is open. `None` if `p` is not a gate.
    pub fn gate_open(&self, p: Point) -> Option<bool> {
        self.gate_controller(p).map(|id| self.levers[id].on)
    }

    /// Whether an agent with `caps` may stand on `p`.
    pub fn passable(&self, p: Point, caps: Capabilities) -> bool {
        let Some(c) = self.cell(p) else {
            return false;
        };
        if !c.is_floor() {
            return false;
        }
        if c.tags.contains(Tags::LOCKED_DOOR)
            && self.locked_doors.get(&p).copied().unwrap_or(true)
            && !caps.contains(Capabilities::CAN_UNLOCK)
        {
            return false;
        }
        if c.tags.contains(Tags::LEVER_GATE)
            && !self.gate_open(p).unwrap_or(false)
            && !caps.contains(Capabilities::CAN_PASS_GATES)
        {
            return false;
        }
        if c.tags.contains(Tags::TRAP) && caps.contains(Capabilities::AVOID_TRAPS) {
            return false;
        }
        true
    }

    /// Append the traversable neighbors of `p` with their step costs.
    ///
    /// A blocked cell has no outgoing edges. Diagonal steps require both
    /// orthogonally adjacent cells to be passable.
    pub fn neighbors(&self, p: Point, caps: Capabilities, buf: &mut Vec<Step>) {
        if !self.passable(p, caps) {
            return;
        }
        match self.movement {
            Movement::Cardinal => {
                for n in p.neighbors_4() {
                    if self.passable(n, caps) {
                        buf.push(Step {
                            to: n,
                            cost: STEP_COST,
                        });
                    }
                }
            }
            Movement::Octile => {
                for n in p.neighbors_8() {
                    if !self.passable(n, caps) {
                        continue;
                    }
                    let d = n - p;
                    if d.x != 0 && d.y != 0 {
                        let side_a = p.shift(d.x, 0);
                        let side_b = p.shift(0, d.y);
                        if !self.passable(side_a, caps) || !self.passable(side_b, caps) {
                            continue;
                        }
                        buf.push(Step {
                            to: n,
                            cost: DIAGONAL_COST,
                        });
                    } else {
                        buf.push(Step {
                            to: n,
                            cost: STEP_COST,
                        });
                    }
                }
            }
        }
    }

    /// Cost of the single step `from -> to` between adjacent cells.
    #[inline]
    pub fn step_cost(from: Point, to: Point) -> i32 {
        if from.x != to.x && from.y != to.y {
            DIAGONAL_COST
        } else {
            STEP_COST
        }
    }

    // -----------------------------------------------------------------------
    // Runtime mutation
    // -----------------------------------------------------------------------

    fn bump(&mut self, kind: MutationKind, concern: Concern, cells: Vec<Point>) -> Mutation {
        let from = self.version;
        self.version = from.next();
        Mutation {
            from,
            to: self.version,
            kind,
            concern,
            cells,
        }
    }

    /// Mark this graph as a fresh load following a graph at `previous`.
    ///
    /// Guarantees the version is strictly greater than `previous`.
    pub fn rebase_after(&mut self, previous: LevelVersion) -> Mutation {
        let from = previous;
        if self.version <= previous {
            self.version = previous.next();
        }
        Mutation {
            from,
            to: self.version,
            kind: MutationKind::Rebuilt,
            concern: Concern::Level,
            cells: Vec::new(),
        }
    }

    fn set_lock(&mut self, p: Point, locked: bool) -> Result<Option<Mutation>, MazeError> {
        let state = self
            .locked_doors
            .get_mut(&p)
            .ok_or(MazeError::NotALockedDoor(p))?;
        if *state == locked {
            return Ok(None);
        }
        *state = locked;
        let kind = if locked {
            MutationKind::Closed
        } else {
            MutationKind::Opened
        };
        Ok(Some(self.bump(kind, Concern::LockedDoor, vec![p])))
    }

    /// Unlock the locked door at `p`.
    pub fn unlock_door(&mut self, p: Point) -> Result<Option<Mutation>, MazeError> {
        self.set_lock(p, false)
    }

    /// Re-lock the locked door at `p`.
    pub fn lock_door(&mut self, p: Point) -> Result<Option<Mutation>, MazeError> {
        self.set_lock(p, true)
    }

    /// Set lever `id` on or off, opening or closing all its gates.
    pub fn set_lever(&mut self, id: usize, on: bool) -> Result<Option<Mutation>, MazeError> {
        let lever = self.levers.get_mut(id).ok_or(MazeError::UnknownLever(id))?;
        if lever.on == on {
            return Ok(None);
        }
        lever.on = on;
        let gates = lever.gates.clone();
        let kind = if on {
            MutationKind::Opened
        } else {
            MutationKind::Closed
        };
        Ok(Some(self.bump(kind, Concern::LeverGate, gates)))
    }

    /// Flip lever `id`.
    pub fn toggle_lever(&mut self, id: usize) -> Result<Mutation, MazeError> {
        let on = !self.levers.get(id).ok_or(MazeError::UnknownLever(id))?.on;
        let m = self.set_lever(id, on)?;
        // A flip always changes state.
        m.ok_or(MazeError::UnknownLever(id))
    }

    /// Change terrain at `p`. Cells carrying link tags cannot be walled.
    pub fn set_terrain(&mut self, p: Point, terrain: Terrain) -> Result<Option<Mutation>, MazeError> {
        let i = index_in(self.bounds, p).ok_or(MazeError::OutOfBounds(p))?;
        let c = self.cells[i];
        if c.terrain == terrain {
            return Ok(None);
        }
        if terrain == Terrain::Wall
            && c.tags.intersects(Tags::LOCKED_DOOR | Tags::LEVER_GATE | Tags::LEVER)
        {
            return Err(conflict(p, "cannot wall a linked cell"));
        }
        self.cells[i].terrain = terrain;
        let kind = match terrain {
            Terrain::Floor => MutationKind::Opened,
            Terrain::Wall => MutationKind::Closed,
        };
        Ok(Some(self.bump(kind, Concern::Terrain, vec![p])))
    }

    /// Remove the key at `p`. Reachability is unchanged, so no bump.
    pub fn collect_key(&mut self, p: Point) -> Result<bool, MazeError> {
        let i = index_in(self.bounds, p).ok_or(MazeError::OutOfBounds(p))?;
        if !self.cells[i].tags.contains(Tags::KEY) {
            return Ok(false);
        }
        self.cells[i].tags = self.cells[i].tags.without(Tags::KEY);
        Ok(true)
    }
}
