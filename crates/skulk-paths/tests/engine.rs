use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use skulk_core::{
    Capabilities, LevelVersion, MazeBuilder, MazeGraph, Movement, Point, Range, Step, Terrain,
};
use skulk_paths::{
    EngineConfig, MazePather, Navigator, Path, PathOutcome, PathWorkers, PoolConfig, SearchSpace,
    UNREACHABLE,
};

fn random_grid(seed: u64, size: i32, movement: Movement, wall_chance: f64) -> MazeGraph {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut b = MazeBuilder::new(size, size, movement).unwrap();
    b.carve(Range::new(0, 0, size, size));
    for p in Range::new(0, 0, size, size) {
        if rng.random_bool(wall_chance) {
            b.set_terrain(p, Terrain::Wall);
        }
    }
    b.build(LevelVersion::INITIAL).unwrap()
}

fn check_against_dijkstra(movement: Movement) {
    for seed in 0..20 {
        let g = random_grid(seed, 16, movement, 0.3);
        let floors: Vec<Point> = g.positions_with_floor();
        if floors.len() < 2 {
            continue;
        }
        let nav = Navigator::new(g.clone(), EngineConfig::default());
        let mut oracle = SearchSpace::new(g.bounds());
        let start = floors[0];
        oracle.dijkstra_map(&MazePather::new(&g, Capabilities::NONE), &[start], UNREACHABLE);
        for &goal in floors.iter().step_by(7) {
            let expected = oracle.dijkstra_at(goal);
            match nav.find_path(start, goal, Capabilities::NONE) {
                Some(path) => {
                    assert_eq!(path.cost(), expected, "seed {seed} goal {goal}");
                    let walked: i32 = path
                        .cells()
                        .windows(2)
                        .map(|w| MazeGraph::step_cost(w[0], w[1]))
                        .sum();
                    assert_eq!(walked, path.cost());
                    assert_eq!(path.start(), Some(start));
                    assert_eq!(path.goal(), Some(goal));
                }
                None => assert_eq!(expected, UNREACHABLE, "seed {seed} goal {goal}"),
            }
        }
    }
}

/// Whether every step of `path` is an edge of `g` for `caps`.
fn walks(g: &MazeGraph, path: &Path, caps: Capabilities) -> bool {
    let Some(start) = path.start() else {
        return false;
    };
    let mut buf: Vec<Step> = Vec::new();
    g.passable(start, caps)
        && path.cells().windows(2).all(|w| {
            buf.clear();
            g.neighbors(w[0], caps, &mut buf);
            buf.iter().any(|s| s.to == w[1])
        })
}

trait FloorCells {
    fn positions_with_floor(&self) -> Vec<Point>;
}

impl FloorCells for MazeGraph {
    fn positions_with_floor(&self) -> Vec<Point> {
        self.cells()
            .filter(|(_, c)| c.is_floor())
            .map(|(p, _)| p)
            .collect()
    }
}

#[test]
fn cardinal_costs_match_oracle() {
    check_against_dijkstra(Movement::Cardinal);
}

#[test]
fn octile_costs_match_oracle() {
    check_against_dijkstra(Movement::Octile);
}

#[test]
fn cache_stays_bounded_across_queries_and_bumps() {
    let mut b = MazeBuilder::new(12, 12, Movement::Cardinal).unwrap();
    b.carve(Range::new(0, 0, 12, 12));
    b.set_terrain(Point::new(6, 6), Terrain::Wall);
    let g = b.build(LevelVersion::INITIAL).unwrap();
    let nav = Navigator::new(
        g,
        EngineConfig {
            cache_capacity: 16,
            ..EngineConfig::default()
        },
    );
    let mut rng = StdRng::seed_from_u64(7);
    for i in 0..400 {
        let a = Point::new(rng.random_range(0..12), rng.random_range(0..12));
        let z = Point::new(rng.random_range(0..12), rng.random_range(0..12));
        nav.find_path(a, z, Capabilities::NONE);
        assert!(nav.cache_len() <= 16);
        if i % 50 == 0 {
            let t = if i % 100 == 0 { Terrain::Floor } else { Terrain::Wall };
            nav.set_terrain(Point::new(6, 6), t).unwrap();
            assert!(nav.cache_len() <= 16);
        }
    }
}

#[test]
fn bump_never_serves_an_invalidated_path() {
    // Two routes from A to B: a short one through (5, 2) and a long detour.
    let mut b = MazeBuilder::new(11, 7, Movement::Cardinal).unwrap();
    b.carve(Range::new(0, 2, 11, 3));
    b.carve(Range::new(0, 2, 1, 7));
    b.carve(Range::new(0, 6, 11, 7));
    b.carve(Range::new(10, 2, 11, 7));
    let g = b.build(LevelVersion::INITIAL).unwrap();
    let nav = Navigator::new(g, EngineConfig::default());
    let a = Point::new(0, 2);
    let z = Point::new(10, 2);

    let short = nav.find_path(a, z, Capabilities::NONE).unwrap();
    assert_eq!(short.cost(), 100);
    nav.set_terrain(Point::new(5, 2), Terrain::Wall).unwrap();
    let detour = nav.find_path(a, z, Capabilities::NONE).unwrap();
    assert!(!detour.cells().contains(&Point::new(5, 2)));
    assert_eq!(detour.cost(), 10 * (4 + 10 + 4));
    assert!(!detour.ptr_eq(&short));

    // Re-opening must not keep serving the detour.
    nav.set_terrain(Point::new(5, 2), Terrain::Floor).unwrap();
    assert_eq!(nav.find_path(a, z, Capabilities::NONE).unwrap().cost(), 100);
}

#[test]
fn locked_door_on_the_only_corridor() {
    // Two 10x4 halves joined by a single corridor cell holding a locked door.
    let mut b = MazeBuilder::new(10, 10, Movement::Cardinal).unwrap();
    b.carve(Range::new(0, 0, 10, 4));
    b.carve(Range::new(0, 6, 10, 10));
    b.carve(Range::new(5, 4, 6, 6));
    b.add_locked_door(Point::new(5, 5), true);
    let g = b.build(LevelVersion::INITIAL).unwrap();
    let nav = Navigator::new(g, EngineConfig::default());
    let a = Point::new(0, 0);
    let z = Point::new(9, 9);

    assert!(nav.find_path(a, z, Capabilities::NONE).is_none());
    let p = nav.find_path(a, z, Capabilities::CAN_UNLOCK).unwrap();
    assert_eq!(p.cost(), 10 * (9 + 9));
    assert!(p.cells().contains(&Point::new(5, 5)));
    assert!(p.cells().contains(&Point::new(5, 4)));
}

#[test]
fn worker_results_agree_with_inline_queries() {
    let g = random_grid(99, 20, Movement::Octile, 0.2);
    let nav = Arc::new(Navigator::new(g.clone(), EngineConfig::default()));
    let workers = PathWorkers::new(
        Arc::clone(&nav),
        PoolConfig {
            workers: 4,
            queue_capacity: 64,
        },
    )
    .unwrap();
    let floors = g.positions_with_floor();
    let start = floors[0];
    let goals: Vec<Point> = floors.iter().copied().step_by(11).collect();
    let handles: Vec<_> = goals
        .iter()
        .map(|&z| workers.submit(start, z, Capabilities::NONE).unwrap())
        .collect();
    let mut oracle = SearchSpace::new(g.bounds());
    oracle.dijkstra_map(&MazePather::new(&g, Capabilities::NONE), &[start], UNREACHABLE);
    for (h, &z) in handles.into_iter().zip(&goals) {
        match h.wait() {
            PathOutcome::Found(p) => assert_eq!(p.cost(), oracle.dijkstra_at(z)),
            PathOutcome::NoPath => assert_eq!(oracle.dijkstra_at(z), UNREACHABLE),
            PathOutcome::Cancelled => panic!("nothing was cancelled"),
        }
    }
}

#[test]
fn walling_a_diagonal_side_cell_drops_the_cached_path() {
    let mut b = MazeBuilder::new(3, 3, Movement::Octile).unwrap();
    b.carve(Range::new(0, 0, 3, 3));
    let nav = Navigator::new(b.build(LevelVersion::INITIAL).unwrap(), EngineConfig::default());
    let a = Point::new(0, 0);
    let z = Point::new(2, 2);

    let diagonal = nav.find_path(a, z, Capabilities::NONE).unwrap();
    assert_eq!(diagonal.cells(), &[a, Point::new(1, 1), z]);
    assert_eq!(diagonal.cost(), 28);

    // (1, 0) is not on the path but the first diagonal step cuts past it.
    nav.set_terrain(Point::new(1, 0), Terrain::Wall).unwrap();
    let after = nav.find_path(a, z, Capabilities::NONE).unwrap();
    assert!(!after.ptr_eq(&diagonal));
    assert_eq!(after.cost(), 34);
    assert!(walks(&nav.snapshot(), &after, Capabilities::NONE));
    assert_eq!(nav.cache_version(), nav.version());
}

#[test]
fn worker_results_survive_concurrent_mutations() {
    let g = random_grid(5, 40, Movement::Octile, 0.15);
    let nav = Arc::new(Navigator::new(g.clone(), EngineConfig::default()));
    let workers = PathWorkers::new(
        Arc::clone(&nav),
        PoolConfig {
            workers: 4,
            queue_capacity: 1024,
        },
    )
    .unwrap();
    let floors = g.positions_with_floor();
    let start = floors[0];
    let goals: Vec<Point> = floors.iter().copied().skip(1).step_by(37).collect();
    let toggles: Vec<Point> = (1..39).map(|y| Point::new(20, y)).collect();

    // Every level the workers could have seen, by version.
    let mut history = vec![nav.snapshot()];
    let mut handles = Vec::new();
    for round in 0..30 {
        handles.extend(
            goals
                .iter()
                .filter_map(|&z| workers.submit(start, z, Capabilities::NONE).ok()),
        );
        let cell = toggles[round % toggles.len()];
        let terrain = if round % 2 == 0 { Terrain::Wall } else { Terrain::Floor };
        if nav.set_terrain(cell, terrain).unwrap().is_some() {
            history.push(nav.snapshot());
        }
        assert_eq!(nav.cache_version(), nav.version());

        // Inline queries see whatever the workers cached so far.
        let live = nav.snapshot();
        for &z in goals.iter().step_by(3) {
            if let Some(p) = nav.find_path(start, z, Capabilities::NONE) {
                assert!(walks(&live, &p, Capabilities::NONE), "round {round} goal {z}");
            }
        }
    }

    for h in handles {
        if let PathOutcome::Found(p) = h.wait() {
            assert!(
                history.iter().any(|g| walks(g, &p, Capabilities::NONE)),
                "worker path fits no level version"
            );
        }
    }

    let last = nav.snapshot();
    assert_eq!(last.version(), nav.version());
    assert_eq!(nav.cache_version(), nav.version());
    for &z in &goals {
        if let Some(p) = nav.find_path(start, z, Capabilities::NONE) {
            assert!(walks(&last, &p, Capabilities::NONE));
        }
    }
}
