//! Feature placement on a carved layout.
//!
//! Runs after rooms and corridors are dug and before the layout is built
//! into a [`MazeGraph`](skulk_core::MazeGraph). Reachability while placing
//! is checked on the plan itself through [`PlanView`], with locked doors and
//! gates treated as walls.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use log::debug;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use skulk_core::{
    DIAGONAL_COST, Lever, MazeBuilder, Movement, Point, Range, STEP_COST, Step, Tags,
};
use skulk_paths::{Pather, SearchSpace, UNREACHABLE, manhattan};

use crate::config::{GenerationConfig, ObjectKind};
use crate::generator::{Room, RoomKind};

/// Where the generator put everything.
///
/// Positions mirror the cell tags of the level. Enemy spawns and the boss
/// spawn carry no tag and only live here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectPlacements {
    pub spawn: Point,
    pub exit: Point,
    pub keys: Vec<Point>,
    pub locked_doors: Vec<Point>,
    /// Levers with their gates, in lever id order. All start off.
    pub levers: Vec<Lever>,
    pub doors: Vec<Point>,
    pub traps: Vec<Point>,
    pub hiding_spots: Vec<Point>,
    pub cameras: Vec<Point>,
    pub enemy_spawns: Vec<Point>,
    pub boss_buttons: Vec<Point>,
    pub boss_spawn: Option<Point>,
}

impl ObjectPlacements {
    /// Keys, levers and boss buttons: everything that must be reachable
    /// from spawn with every door locked and every gate closed.
    pub fn free_objectives(&self) -> Vec<Point> {
        self.keys
            .iter()
            .copied()
            .chain(self.levers.iter().map(|l| l.pos))
            .chain(self.boss_buttons.iter().copied())
            .collect()
    }

    /// Every objective including the exit.
    pub fn objectives(&self) -> Vec<Point> {
        let mut all = self.free_objectives();
        all.push(self.exit);
        all
    }
}

/// Pather over a layout still under construction. Cells in `blocked` are
/// treated as walls.
pub(crate) struct PlanView<'a> {
    plan: &'a MazeBuilder,
    blocked: &'a BTreeSet<Point>,
}

impl<'a> PlanView<'a> {
    pub(crate) fn new(plan: &'a MazeBuilder, blocked: &'a BTreeSet<Point>) -> Self {
        Self { plan, blocked }
    }

    #[inline]
    fn open(&self, p: Point) -> bool {
        self.plan.is_floor(p) && !self.blocked.contains(&p)
    }
}

impl Pather for PlanView<'_> {
    fn neighbors(&self, p: Point, buf: &mut Vec<Step>) {
        if !self.open(p) {
            return;
        }
        match self.plan.movement() {
            Movement::Cardinal => {
                for n in p.neighbors_4() {
                    if self.open(n) {
                        buf.push(Step {
                            to: n,
                            cost: STEP_COST,
                        });
                    }
                }
            }
            Movement::Octile => {
                for n in p.neighbors_8() {
                    if !self.open(n) {
                        continue;
                    }
                    let d = n - p;
                    let cost = if d.x != 0 && d.y != 0 {
                        if !self.open(p.shift(d.x, 0)) || !self.open(p.shift(0, d.y)) {
                            continue;
                        }
                        DIAGONAL_COST
                    } else {
                        STEP_COST
                    };
                    buf.push(Step { to: n, cost });
                }
            }
        }
    }
}

/// A floor cell with walls on two opposite sides and floor on the other two.
pub(crate) fn is_chokepoint(plan: &MazeBuilder, p: Point) -> bool {
    if !plan.is_floor(p) {
        return false;
    }
    let [up, right, down, left] = p.neighbors_4().map(|n| plan.is_floor(n));
    (up && down && !left && !right) || (left && right && !up && !down)
}

fn walls_around(plan: &MazeBuilder, p: Point) -> usize {
    p.neighbors_4()
        .into_iter()
        .filter(|&n| !plan.is_floor(n))
        .count()
}

/// Floor cell with no feature yet.
fn bare(plan: &MazeBuilder, p: Point) -> bool {
    plan.cell(p)
        .is_some_and(|c| c.is_floor() && c.tags.is_empty())
}

fn near_any(points: &[Point], p: Point) -> bool {
    points.iter().any(|&q| q == p || q.is_adjacent(p))
}

/// Button cells and boss spawn for a boss arena.
///
/// Buttons go on the corners of the arena inset by one when the arena is at
/// least 5 cells on its short side, on the arena corners otherwise.
pub(crate) fn boss_layout(
    arena: Range,
    buttons: usize,
    reserved: &BTreeSet<Point>,
) -> (Vec<Point>, Point) {
    let inner = if arena.width().min(arena.height()) >= 5 {
        arena.inset(1)
    } else {
        arena
    };
    let boss = arena.center();
    let corners = [
        inner.min,
        Point::new(inner.max.x - 1, inner.min.y),
        Point::new(inner.min.x, inner.max.y - 1),
        Point::new(inner.max.x - 1, inner.max.y - 1),
    ];
    let mut out = Vec::with_capacity(buttons);
    for c in corners {
        if out.len() >= buttons {
            break;
        }
        if c != boss && !reserved.contains(&c) && !out.contains(&c) {
            out.push(c);
        }
    }
    (out, boss)
}

/// Pick up to `n` cells of `candidates`, each at least `spacing` (Manhattan)
/// from every anchor and from each other. The spacing is relaxed one step
/// at a time when the candidates run out. Picked cells become anchors.
pub(crate) fn pick_spaced(
    candidates: &[Point],
    n: usize,
    spacing: i32,
    anchors: &mut Vec<Point>,
    reserved: &BTreeSet<Point>,
) -> Vec<Point> {
    let mut picked = Vec::with_capacity(n);
    let mut spacing = spacing.max(0);
    while picked.len() < n {
        for &c in candidates {
            if picked.len() >= n {
                break;
            }
            if reserved.contains(&c) || picked.contains(&c) {
                continue;
            }
            if anchors.iter().all(|&a| manhattan(a, c) >= spacing) {
                picked.push(c);
                anchors.push(c);
            }
        }
        if spacing == 0 {
            break;
        }
        spacing -= 1;
    }
    picked
}

/// Placement state for one attempt.
struct Placer<'a> {
    config: &'a GenerationConfig,
    rooms: &'a [Room],
    area: usize,
    space: SearchSpace,
    objects: ObjectPlacements,
    /// Cells no other object may take.
    reserved: BTreeSet<Point>,
    /// Locked doors and gates, walls for the spawn-side flood fill.
    blocked: BTreeSet<Point>,
    /// Every door-like cell placed so far, locked or not.
    barriers: Vec<Point>,
}

impl Placer<'_> {
    fn count(&self, kind: ObjectKind) -> usize {
        self.config.object_density.count(kind, self.area)
    }

    /// Block `p` if spawn keeps `free_needed` cells and the boss buttons.
    fn try_block(&mut self, plan: &MazeBuilder, p: Point, free_needed: usize) -> bool {
        self.blocked.insert(p);
        let region = self
            .space
            .cc_map(&PlanView::new(plan, &self.blocked), self.objects.spawn);
        if region.len() >= free_needed && self.space.all_reached(&self.objects.boss_buttons) {
            return true;
        }
        self.blocked.remove(&p);
        false
    }

    fn boss(&mut self, plan: &mut MazeBuilder) {
        let Some(arena) = self.rooms.iter().find(|r| r.kind == RoomKind::BossArena) else {
            return;
        };
        let (buttons, boss) = boss_layout(arena.rect, self.config.boss_buttons, &self.reserved);
        for &b in &buttons {
            plan.tag(b, Tags::BOSS_BUTTON);
            self.reserved.insert(b);
        }
        self.reserved.insert(boss);
        self.objects.boss_buttons = buttons;
        self.objects.boss_spawn = Some(boss);
    }

    /// Locked doors, then gate groups, then plain doors, all on chokepoints.
    /// Returns the gate groups still waiting for a lever.
    fn barriers(
        &mut self,
        plan: &mut MazeBuilder,
        chokepoints: &[Point],
        rng: &mut impl Rng,
    ) -> Vec<Vec<Point>> {
        let doors = self.count(ObjectKind::LockedDoor);
        let levers = self.count(ObjectKind::Lever);
        let free_needed = self.count(ObjectKind::Key).max(doors)
            + levers
            + self.objects.boss_buttons.len()
            + 2;

        for &p in chokepoints {
            if self.objects.locked_doors.len() >= doors {
                break;
            }
            if near_any(&self.barriers, p) || !self.try_block(plan, p, free_needed) {
                continue;
            }
            plan.add_locked_door(p, true);
            self.objects.locked_doors.push(p);
            self.barriers.push(p);
        }

        let mut groups = Vec::new();
        for _ in 0..levers {
            let want = rng.random_range(1..=2usize);
            let mut gates = Vec::with_capacity(want);
            for &p in chokepoints {
                if gates.len() >= want {
                    break;
                }
                if near_any(&self.barriers, p) || !self.try_block(plan, p, free_needed) {
                    continue;
                }
                gates.push(p);
                self.barriers.push(p);
            }
            if gates.is_empty() {
                break;
            }
            groups.push(gates);
        }

        let plain = self.count(ObjectKind::Door);
        for &p in chokepoints {
            if self.objects.doors.len() >= plain {
                break;
            }
            if near_any(&self.barriers, p) {
                continue;
            }
            plan.tag(p, Tags::DOOR);
            self.objects.doors.push(p);
            self.barriers.push(p);
        }
        groups
    }

    /// Keys and levers inside the region spawn reaches with every door
    /// locked and every gate closed.
    fn objectives(
        &mut self,
        plan: &mut MazeBuilder,
        groups: Vec<Vec<Point>>,
        rng: &mut impl Rng,
    ) -> Result<(), String> {
        let mut free = self
            .space
            .cc_map(&PlanView::new(plan, &self.blocked), self.objects.spawn);
        free.sort_unstable();
        free.retain(|p| !self.reserved.contains(p) && !self.barriers.contains(p));
        free.shuffle(rng);

        let spacing = self.config.min_object_spacing;
        let mut anchors = vec![self.objects.spawn, self.objects.exit];
        anchors.extend(self.objects.boss_buttons.iter().copied());

        let wanted = self.count(ObjectKind::Key).max(self.objects.locked_doors.len());
        let keys = pick_spaced(&free, wanted, spacing, &mut anchors, &self.reserved);
        let needed = self.objects.locked_doors.len().max(1);
        if keys.len() < needed {
            return Err(format!(
                "only {} free cells for {needed} keys",
                keys.len()
            ));
        }
        for &k in &keys {
            plan.tag(k, Tags::KEY);
            self.reserved.insert(k);
        }
        self.objects.keys = keys;

        for gates in groups {
            let pick = pick_spaced(&free, 1, spacing, &mut anchors, &self.reserved);
            match pick.first() {
                Some(&pos) => {
                    self.reserved.insert(pos);
                    plan.add_lever(pos, false, gates.clone());
                    self.objects.levers.push(Lever {
                        pos,
                        on: false,
                        gates,
                    });
                }
                None => {
                    for g in &gates {
                        self.blocked.remove(g);
                    }
                }
            }
        }
        Ok(())
    }

    fn hazards(&mut self, plan: &mut MazeBuilder, chokepoints: &BTreeSet<Point>, rng: &mut impl Rng) {
        let interior = plan.bounds().inset(1);
        let open = |plan: &MazeBuilder, reserved: &BTreeSet<Point>, p: Point| {
            bare(plan, p) && !reserved.contains(&p) && !chokepoints.contains(&p)
        };

        let mut traps: Vec<Point> = interior
            .iter()
            .filter(|&p| {
                open(plan, &self.reserved, p) && self.rooms.iter().any(|r| r.rect.contains(p))
            })
            .collect();
        traps.shuffle(rng);
        traps.truncate(self.count(ObjectKind::Trap));
        for &p in &traps {
            plan.tag(p, Tags::TRAP);
        }
        self.objects.traps = traps;

        let mut spots: Vec<Point> = interior
            .iter()
            .filter(|&p| open(plan, &self.reserved, p) && walls_around(plan, p) >= 2)
            .collect();
        spots.shuffle(rng);
        spots.truncate(self.count(ObjectKind::HidingSpot));
        for &p in &spots {
            plan.tag(p, Tags::HIDING_SPOT);
        }
        self.objects.hiding_spots = spots;

        let mut cameras: Vec<Point> = interior
            .iter()
            .filter(|&p| open(plan, &self.reserved, p) && walls_around(plan, p) >= 1)
            .collect();
        cameras.shuffle(rng);
        cameras.truncate(self.count(ObjectKind::Camera));
        for &p in &cameras {
            plan.tag(p, Tags::CAMERA);
        }
        self.objects.cameras = cameras;
    }

    /// Enemy spawns on the cells farthest from spawn, outside the spawn room.
    fn enemies(&mut self, plan: &MazeBuilder) {
        let nothing = BTreeSet::new();
        let spawn = self.objects.spawn;
        self.space
            .dijkstra_map(&PlanView::new(plan, &nothing), &[spawn], UNREACHABLE);
        let spawn_room = self.rooms.iter().find(|r| r.kind == RoomKind::Spawn);
        let mut far: Vec<(i32, Point)> = plan
            .bounds()
            .iter()
            .filter(|&p| bare(plan, p) && !self.reserved.contains(&p))
            .filter(|&p| !spawn_room.is_some_and(|r| r.rect.contains(p)))
            .map(|p| (self.space.dijkstra_at(p), p))
            .filter(|&(cost, _)| cost != UNREACHABLE)
            .collect();
        far.sort_unstable_by_key(|&(cost, p)| (Reverse(cost), p));
        let candidates: Vec<Point> = far.into_iter().map(|(_, p)| p).collect();
        let mut anchors = vec![spawn];
        let enemies = pick_spaced(
            &candidates,
            self.count(ObjectKind::Enemy),
            self.config.min_object_spacing,
            &mut anchors,
            &self.reserved,
        );
        self.reserved.extend(enemies.iter().copied());
        self.objects.enemy_spawns = enemies;
    }
}

/// Place every feature on `plan`. Spawn and exit must already be chosen.
pub(crate) fn place_features(
    plan: &mut MazeBuilder,
    config: &GenerationConfig,
    rooms: &[Room],
    spawn: Point,
    exit: Point,
    rng: &mut impl Rng,
) -> Result<ObjectPlacements, String> {
    plan.tag(spawn, Tags::SPAWN);
    plan.tag(exit, Tags::EXIT);
    let mut placer = Placer {
        config,
        rooms,
        area: plan.bounds().len(),
        space: SearchSpace::new(plan.bounds()),
        objects: ObjectPlacements {
            spawn,
            exit,
            ..ObjectPlacements::default()
        },
        reserved: BTreeSet::from([spawn, exit]),
        blocked: BTreeSet::new(),
        barriers: Vec::new(),
    };

    placer.boss(plan);

    let all_chokepoints: Vec<Point> = plan
        .bounds()
        .iter()
        .filter(|&p| is_chokepoint(plan, p))
        .collect();
    let mut candidates: Vec<Point> = all_chokepoints
        .iter()
        .copied()
        .filter(|p| !placer.reserved.contains(p))
        .collect();
    candidates.shuffle(rng);

    let groups = placer.barriers(plan, &candidates, rng);
    placer.objectives(plan, groups, rng)?;
    placer.enemies(plan);
    let choke_set: BTreeSet<Point> = all_chokepoints.into_iter().collect();
    placer.hazards(plan, &choke_set, rng);

    let o = &placer.objects;
    debug!(
        "placed {} keys, {} locked doors, {} levers, {} doors, {} traps, {} enemies",
        o.keys.len(),
        o.locked_doors.len(),
        o.levers.len(),
        o.doors.len(),
        o.traps.len(),
        o.enemy_spawns.len()
    );
    Ok(placer.objects)
}
