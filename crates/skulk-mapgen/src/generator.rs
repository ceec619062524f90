//! BSP maze generation with validation and seeded retries.

use std::collections::BTreeSet;

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use skulk_core::{LevelVersion, MazeBuilder, MazeGraph, Point, Range};
use skulk_paths::{SearchSpace, UNREACHABLE, manhattan};

use crate::config::GenerationConfig;
use crate::error::GenerationError;
use crate::partition::PartitionArena;
use crate::placement::{ObjectPlacements, PlanView, place_features};
use crate::validate::check_level;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomKind {
    Normal,
    Spawn,
    BossArena,
}

/// A carved room. Kept as generation metadata only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub rect: Range,
    pub kind: RoomKind,
}

/// A validated level, ready to hand to a
/// [`Navigator`](skulk_paths::Navigator).
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedLevel {
    pub graph: MazeGraph,
    pub objects: ObjectPlacements,
    pub rooms: Vec<Room>,
    pub version: LevelVersion,
    /// The configured seed.
    pub seed: u64,
    /// Attempts used, 1 when the first one validated.
    pub attempts: u32,
}

/// Generate a level from `config`.
///
/// The configuration is checked first and rejected without any attempt if
/// no level could satisfy it. Each attempt that fails validation is logged
/// and retried with a seed derived from the configured one, up to
/// `generation_retry_limit` extra attempts.
pub fn generate(config: &GenerationConfig) -> Result<GeneratedLevel, GenerationError> {
    config.validate()?;
    let mut last_failure = String::new();
    for attempt in 0..=config.generation_retry_limit {
        let seed = attempt_seed(config.seed, attempt);
        debug!(
            "generation attempt {attempt} for seed {} (rng seed {seed:#018x}, {}x{})",
            config.seed, config.width, config.height
        );
        let mut rng = StdRng::seed_from_u64(seed);
        match build_level(config, &mut rng) {
            Ok((graph, objects, rooms)) => {
                debug!(
                    "level accepted after {} attempt(s): {} rooms, {} floor cells",
                    attempt + 1,
                    rooms.len(),
                    graph.floor_count()
                );
                return Ok(GeneratedLevel {
                    version: graph.version(),
                    graph,
                    objects,
                    rooms,
                    seed: config.seed,
                    attempts: attempt + 1,
                });
            }
            Err(reason) => {
                warn!("generation attempt {attempt} for seed {} rejected: {reason}", config.seed);
                last_failure = reason;
            }
        }
    }
    Err(GenerationError::RetriesExhausted {
        attempts: config.generation_retry_limit + 1,
        last_failure,
    })
}

/// [`generate`] with `seed` in place of the configured seed.
pub fn generate_with_seed(
    seed: u64,
    config: &GenerationConfig,
) -> Result<GeneratedLevel, GenerationError> {
    let config = GenerationConfig {
        seed,
        ..config.clone()
    };
    generate(&config)
}

/// RNG seed of attempt `attempt`. Attempt 0 uses `seed` unchanged.
pub fn attempt_seed(seed: u64, attempt: u32) -> u64 {
    if attempt == 0 {
        return seed;
    }
    splitmix64(seed.wrapping_add(u64::from(attempt).wrapping_mul(0x9E37_79B9_7F4A_7C15)))
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

type Attempt = (MazeGraph, ObjectPlacements, Vec<Room>);

/// One generation attempt. Errors carry the reason for the retry log.
fn build_level(config: &GenerationConfig, rng: &mut StdRng) -> Result<Attempt, String> {
    let mut plan = MazeBuilder::new(config.width, config.height, config.movement())
        .map_err(|e| e.to_string())?;
    let interior = Range::new(1, 1, config.width - 1, config.height - 1);

    let mut arena = PartitionArena::split(
        interior,
        config.min_region(),
        config.max_room_size + 2,
        rng,
    );
    let mut rooms = Vec::new();
    for leaf in arena.leaves() {
        let rect = carve_room(arena.nodes[leaf].rect, config, rng);
        plan.carve(rect);
        arena.nodes[leaf].room = Some(rooms.len());
        rooms.push(Room {
            rect,
            kind: RoomKind::Normal,
        });
    }
    if rooms.len() < 2 {
        return Err(format!("partition produced {} room(s)", rooms.len()));
    }

    let internal: Vec<(usize, (usize, usize))> = arena.internal_bottom_up().collect();
    for (_, (a, b)) in internal {
        let left = arena.rooms_under(a);
        let right = arena.rooms_under(b);
        let Some((ra, rb)) = closest_pair(&rooms, &left, &right) else {
            continue;
        };
        let (from, to) = (rooms[ra].rect.center(), rooms[rb].rect.center());
        dig_corridor(&mut plan, from, to, config, interior, rng);
        if rng.random_bool(config.loop_chance) {
            let ra = left[rng.random_range(0..left.len())];
            let rb = right[rng.random_range(0..right.len())];
            let (from, to) = (rooms[ra].rect.center(), rooms[rb].rect.center());
            dig_corridor(&mut plan, from, to, config, interior, rng);
        }
    }
    drop(arena);

    assign_kinds(&mut rooms, config.boss_arena);
    let spawn = rooms[0].rect.center();
    let exit = pick_exit(&plan, &rooms, spawn)?;
    let objects = place_features(&mut plan, config, &rooms, spawn, exit, rng)?;
    let graph = plan
        .build(LevelVersion::INITIAL)
        .map_err(|e| format!("invalid links: {e}"))?;
    check_level(&graph, &objects)?;
    Ok((graph, objects, rooms))
}

/// Room inside `region`, leaving at least one wall cell on every side.
fn carve_room(region: Range, config: &GenerationConfig, rng: &mut impl Rng) -> Range {
    let w = rng.random_range(config.min_room_size..=config.max_room_size.min(region.width() - 2));
    let h = rng.random_range(config.min_room_size..=config.max_room_size.min(region.height() - 2));
    let x = region.min.x + rng.random_range(1..=region.width() - 1 - w);
    let y = region.min.y + rng.random_range(1..=region.height() - 1 - h);
    Range::with_size(Point::new(x, y), w, h)
}

/// Closest pair of rooms by center distance, one from each side. Ties go to
/// the lowest room indices.
fn closest_pair(rooms: &[Room], left: &[usize], right: &[usize]) -> Option<(usize, usize)> {
    left.iter()
        .flat_map(|&a| right.iter().map(move |&b| (a, b)))
        .min_by_key(|&(a, b)| (manhattan(rooms[a].rect.center(), rooms[b].rect.center()), a, b))
}

/// L-shaped corridor between two points. `corridor_width` 2 adds a parallel
/// line on the right or lower side, clipped to the interior.
fn dig_corridor(
    plan: &mut MazeBuilder,
    from: Point,
    to: Point,
    config: &GenerationConfig,
    interior: Range,
    rng: &mut impl Rng,
) {
    let w = config.corridor_width;
    if rng.random_bool(0.5) {
        plan.carve(run_x(from.y, from.x, to.x, w).intersect(interior));
        plan.carve(run_y(to.x, from.y, to.y, w).intersect(interior));
    } else {
        plan.carve(run_y(from.x, from.y, to.y, w).intersect(interior));
        plan.carve(run_x(to.y, from.x, to.x, w).intersect(interior));
    }
}

/// Horizontal run along row `y`, `w` rows thick, both ends included.
fn run_x(y: i32, x0: i32, x1: i32, w: i32) -> Range {
    Range::new(x0.min(x1), y, x0.max(x1) + 1, y + w)
}

/// Vertical run along column `x`, `w` columns thick, both ends included.
fn run_y(x: i32, y0: i32, y1: i32, w: i32) -> Range {
    Range::new(x, y0.min(y1), x + w, y0.max(y1) + 1)
}

/// First room becomes the spawn room. With a boss arena requested and at
/// least three rooms, the largest other room becomes the arena.
fn assign_kinds(rooms: &mut [Room], boss_arena: bool) {
    rooms[0].kind = RoomKind::Spawn;
    if !boss_arena || rooms.len() < 3 {
        return;
    }
    let largest = (1..rooms.len())
        .max_by_key(|&i| (rooms[i].rect.len(), std::cmp::Reverse(i)));
    if let Some(i) = largest {
        rooms[i].kind = RoomKind::BossArena;
    }
}

/// Center of the normal room farthest from spawn by path cost.
fn pick_exit(plan: &MazeBuilder, rooms: &[Room], spawn: Point) -> Result<Point, String> {
    let nothing = BTreeSet::new();
    let mut space = SearchSpace::new(plan.bounds());
    space.dijkstra_map(&PlanView::new(plan, &nothing), &[spawn], UNREACHABLE);
    rooms
        .iter()
        .enumerate()
        .filter(|(_, r)| r.kind == RoomKind::Normal)
        .map(|(i, r)| (space.dijkstra_at(r.rect.center()), i, r.rect.center()))
        .filter(|&(cost, _, _)| cost != UNREACHABLE)
        .max_by_key(|&(cost, i, _)| (cost, std::cmp::Reverse(i)))
        .map(|(_, _, p)| p)
        .ok_or_else(|| "no room reachable from spawn for the exit".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skulk_core::{Capabilities, Tags};

    #[test]
    fn attempt_seeds_are_stable_and_distinct() {
        assert_eq!(attempt_seed(42, 0), 42);
        let a = attempt_seed(42, 1);
        let b = attempt_seed(42, 2);
        assert_ne!(a, 42);
        assert_ne!(a, b);
        assert_eq!(a, attempt_seed(42, 1));
        assert_eq!(splitmix64(0), 0xE220_A839_7B1D_CDAF);
    }

    #[test]
    fn rooms_respect_margins_and_sizes() {
        let config = GenerationConfig::default();
        let mut rng = StdRng::seed_from_u64(8);
        let region = Range::new(1, 1, 11, 9);
        for _ in 0..50 {
            let r = carve_room(region, &config, &mut rng);
            assert!(r.width() >= config.min_room_size && r.width() <= 8);
            assert!(r.height() >= config.min_room_size && r.height() <= 6);
            assert!(r.min.x > region.min.x && r.max.x < region.max.x);
            assert!(r.min.y > region.min.y && r.max.y < region.max.y);
        }
    }

    #[test]
    fn closest_pair_breaks_ties_by_index() {
        let room = |x: i32, y: i32| Room {
            rect: Range::with_size(Point::new(x, y), 3, 3),
            kind: RoomKind::Normal,
        };
        let rooms = vec![room(0, 0), room(0, 10), room(10, 0), room(10, 10)];
        assert_eq!(closest_pair(&rooms, &[0, 1], &[2, 3]), Some((0, 2)));
        assert_eq!(closest_pair(&rooms, &[1], &[2, 3]), Some((1, 3)));
        assert_eq!(closest_pair(&rooms, &[], &[2]), None);
    }

    #[test]
    fn wide_corridors_are_two_cells() {
        let mut plan = MazeBuilder::new(20, 20, skulk_core::Movement::Cardinal).unwrap();
        let config = GenerationConfig {
            corridor_width: 2,
            ..GenerationConfig::default()
        };
        let interior = Range::new(1, 1, 19, 19);
        let mut rng = StdRng::seed_from_u64(0);
        dig_corridor(&mut plan, Point::new(3, 3), Point::new(15, 3), &config, interior, &mut rng);
        for x in 3..=15 {
            assert!(plan.is_floor(Point::new(x, 3)));
            assert!(plan.is_floor(Point::new(x, 4)));
        }
        assert!(!plan.is_floor(Point::new(9, 5)));
    }

    #[test]
    fn boss_arena_is_the_largest_other_room() {
        let room = |w: i32| Room {
            rect: Range::with_size(Point::ZERO, w, w),
            kind: RoomKind::Normal,
        };
        let mut rooms = vec![room(9), room(4), room(6), room(6)];
        assign_kinds(&mut rooms, true);
        assert_eq!(rooms[0].kind, RoomKind::Spawn);
        assert_eq!(rooms[2].kind, RoomKind::BossArena);
        assert_eq!(rooms[3].kind, RoomKind::Normal);

        let mut two = vec![room(4), room(6)];
        assign_kinds(&mut two, true);
        assert_eq!(two[1].kind, RoomKind::Normal);
    }

    #[test]
    fn generated_level_is_tagged_and_reachable() {
        let level = generate(&GenerationConfig::campaign(4)).unwrap();
        let g = &level.graph;
        let o = &level.objects;
        assert_eq!(level.version, LevelVersion::INITIAL);
        assert!(g.tags(o.spawn).contains(Tags::SPAWN));
        assert!(g.tags(o.exit).contains(Tags::EXIT));
        assert_eq!(g.positions_with(Tags::KEY), {
            let mut k = o.keys.clone();
            k.sort();
            k
        });
        assert!(o.keys.len() >= o.locked_doors.len());
        assert!(g.passable(o.spawn, Capabilities::NONE));
        assert_eq!(level.rooms[0].kind, RoomKind::Spawn);
        assert!(level.rooms[0].rect.contains(o.spawn));
    }
}
