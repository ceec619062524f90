use skulk_core::{Capabilities, MazeGraph, Point, Tags};
use skulk_mapgen::{
    GenerationConfig, GenerationError, RoomKind, check_level, generate, generate_with_seed,
    persist,
};
use skulk_paths::{MazePather, SearchSpace};

fn reached(g: &MazeGraph, caps: Capabilities, from: Point, targets: &[Point]) -> bool {
    let mut space = SearchSpace::new(g.bounds());
    space.cc_map(&MazePather::new(g, caps), from);
    space.all_reached(targets)
}

fn assert_playable(config: &GenerationConfig) {
    let level = generate(config).unwrap_or_else(|e| panic!("seed {}: {e}", config.seed));
    let g = &level.graph;
    let o = &level.objects;

    assert!(reached(g, Capabilities::PERMEATE_ALL, o.spawn, &o.objectives()));
    assert!(reached(g, Capabilities::NONE, o.spawn, &o.free_objectives()));
    assert_eq!(check_level(g, o), Ok(()));

    assert!(o.keys.len() >= o.locked_doors.len());
    let mut doors: Vec<Point> = g.locked_doors().map(|(p, _)| p).collect();
    doors.sort();
    let mut placed = o.locked_doors.clone();
    placed.sort();
    assert_eq!(doors, placed);
    for (id, lever) in g.levers().iter().enumerate() {
        for &gate in &lever.gates {
            assert_eq!(g.gate_controller(gate), Some(id));
            assert!(!g.tags(gate).contains(Tags::DOOR));
        }
    }
    for &t in &o.traps {
        assert!(g.tags(t).contains(Tags::TRAP));
        assert!(level.rooms.iter().any(|r| r.rect.contains(t)));
    }
}

#[test]
fn accepted_levels_are_playable() {
    for seed in 0..12 {
        assert_playable(&GenerationConfig {
            seed,
            ..GenerationConfig::default()
        });
    }
}

#[test]
fn octile_and_wide_corridor_levels_are_playable() {
    for seed in 100..106 {
        assert_playable(&GenerationConfig {
            seed,
            diagonal_movement: true,
            ..GenerationConfig::default()
        });
        assert_playable(&GenerationConfig {
            seed,
            corridor_width: 2,
            loop_chance: 0.5,
            ..GenerationConfig::default()
        });
    }
}

#[test]
fn presets_generate() {
    for level in [1, 4, 7, 10] {
        assert_playable(&GenerationConfig::campaign(level));
    }
    for floor in [0, 3, 10] {
        assert_playable(&GenerationConfig::endless(floor));
    }
}

#[test]
fn boss_floor_has_arena_buttons_and_boss() {
    let level = generate(&GenerationConfig::endless(10)).unwrap();
    let arena = level
        .rooms
        .iter()
        .find(|r| r.kind == RoomKind::BossArena)
        .expect("boss arena");
    let o = &level.objects;
    assert_eq!(o.boss_spawn, Some(arena.rect.center()));
    assert!(!o.boss_buttons.is_empty() && o.boss_buttons.len() <= 4);
    for &b in &o.boss_buttons {
        assert!(arena.rect.contains(b));
        assert!(level.graph.tags(b).contains(Tags::BOSS_BUTTON));
    }
    assert!(!arena.rect.contains(o.exit));
}

#[test]
fn same_seed_same_level() {
    let config = GenerationConfig::campaign(8);
    let a = generate(&config).unwrap();
    let b = generate(&config).unwrap();
    assert_eq!(a, b);
    let c = generate_with_seed(config.seed + 1, &config).unwrap();
    assert_ne!(a.graph, c.graph);
}

#[test]
fn infeasible_config_fails_before_any_attempt() {
    let config = GenerationConfig {
        width: 9,
        height: 9,
        ..GenerationConfig::default()
    };
    assert!(matches!(
        generate(&config),
        Err(GenerationError::InvalidConfig(_))
    ));
}

#[test]
fn persisted_level_loads_identically() {
    let level = generate(&GenerationConfig {
        seed: 77,
        boss_arena: true,
        width: 40,
        height: 32,
        ..GenerationConfig::default()
    })
    .unwrap();
    let json = persist::to_json(&level.graph, &level.objects).unwrap();
    let saved = persist::from_json(&json).unwrap();
    assert_eq!(saved.graph, level.graph);
    assert_eq!(saved.objects, level.objects);
    assert_eq!(saved.graph.version(), level.version);
}
