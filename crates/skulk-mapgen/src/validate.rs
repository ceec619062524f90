//! Post-generation reachability checks.

use skulk_core::{Capabilities, MazeGraph, Point};
use skulk_paths::{MazePather, SearchSpace};

use crate::placement::ObjectPlacements;

/// Check that `graph` is a playable level for `objects`.
///
/// From spawn, with every permeable feature treated as open, the walkable
/// cells must form one component holding every objective. With every door
/// locked and every gate closed, keys, levers and boss buttons must still be
/// reachable. The error names the first violation.
pub fn check_level(graph: &MazeGraph, objects: &ObjectPlacements) -> Result<(), String> {
    let spawn = objects.spawn;
    if !graph.passable(spawn, Capabilities::NONE) {
        return Err(format!("spawn {spawn} is not walkable"));
    }
    let mut space = SearchSpace::new(graph.bounds());

    let open = space.cc_map(&MazePather::new(graph, Capabilities::PERMEATE_ALL), spawn);
    let floor = graph.floor_count();
    if open.len() != floor {
        return Err(format!(
            "spawn reaches {} of {floor} floor cells",
            open.len()
        ));
    }
    if let Some(p) = first_missed(&space, &objects.objectives()) {
        return Err(format!("objective {p} is cut off from spawn"));
    }

    space.cc_map(&MazePather::new(graph, Capabilities::NONE), spawn);
    if let Some(p) = first_missed(&space, &objects.free_objectives()) {
        return Err(format!("objective {p} sits behind a locked door or gate"));
    }
    Ok(())
}

fn first_missed(space: &SearchSpace, targets: &[Point]) -> Option<Point> {
    targets.iter().copied().find(|&t| space.cc_at(t).is_none())
}
