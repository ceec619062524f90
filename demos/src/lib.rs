//! Shared demo model used by the `skulk-demo` binary.
//!
//! Provides an ASCII renderer for levels and a small heist simulation: a
//! thief collects every key, pulls every lever and heads for the exit while
//! guards patrol between their spawn and the exit. The thief plans inline,
//! guards plan on the worker pool, and every door or lever change is
//! broadcast to all agents as a level change.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use log::{debug, info};
use skulk_core::{Capabilities, MazeGraph, Mutation, Point, Tags};
use skulk_mapgen::ObjectPlacements;
use skulk_paths::{
    EngineConfig, NavAgent, NavCommand, NavEvent, NavStats, Navigator, PathWorkers, PoolConfig,
    Router,
};

pub const LEGEND: &str = "\
#  wall            .  floor          S  spawn          E  exit
k  key             L  locked door    '  unlocked door  +  door
/  lever           G  closed gate    :  open gate      B  boss button
^  trap            c  camera         h  hiding spot    @  thief    g  guard";

/// Glyph for one cell, most specific feature first.
pub fn glyph(graph: &MazeGraph, p: Point) -> char {
    let Some(cell) = graph.cell(p) else {
        return ' ';
    };
    if !cell.is_floor() {
        return '#';
    }
    let t = cell.tags;
    if t.contains(Tags::SPAWN) {
        'S'
    } else if t.contains(Tags::EXIT) {
        'E'
    } else if t.contains(Tags::KEY) {
        'k'
    } else if t.contains(Tags::LOCKED_DOOR) {
        if graph.is_locked(p) == Some(false) { '\'' } else { 'L' }
    } else if t.contains(Tags::LEVER_GATE) {
        if graph.gate_open(p) == Some(true) { ':' } else { 'G' }
    } else if t.contains(Tags::LEVER) {
        '/'
    } else if t.contains(Tags::BOSS_BUTTON) {
        'B'
    } else if t.contains(Tags::DOOR) {
        '+'
    } else if t.contains(Tags::TRAP) {
        '^'
    } else if t.contains(Tags::CAMERA) {
        'c'
    } else if t.contains(Tags::HIDING_SPOT) {
        'h'
    } else {
        '.'
    }
}

/// Render `graph` one line per row, with `actors` drawn over the cells.
/// Later actors win on shared cells.
pub fn render(graph: &MazeGraph, actors: &[(Point, char)]) -> String {
    let mut out = String::with_capacity(((graph.width() + 1) * graph.height()) as usize);
    for y in 0..graph.height() {
        for x in 0..graph.width() {
            let p = Point::new(x, y);
            let ch = actors
                .iter()
                .rev()
                .find(|(a, _)| *a == p)
                .map_or_else(|| glyph(graph, p), |&(_, c)| c);
            out.push(ch);
        }
        out.push('\n');
    }
    out
}

// ---------------------------------------------------------------------------
// Heist
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Objective {
    Key(Point),
    Lever(usize, Point),
    Exit(Point),
}

impl Objective {
    fn pos(self) -> Point {
        match self {
            Objective::Key(p) | Objective::Lever(_, p) | Objective::Exit(p) => p,
        }
    }
}

/// How a heist ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Escaped { turns: u32 },
    /// The thief ran out of reachable objectives before the exit.
    Stuck { turns: u32 },
    OutOfTime,
}

struct Guard {
    agent: NavAgent,
    route: [Point; 2],
    leg: usize,
}

pub struct Heist {
    navigator: Arc<Navigator>,
    thief: NavAgent,
    plan: VecDeque<Objective>,
    keys_held: usize,
    keys_needed: usize,
    /// Set once the thief gives up on avoiding traps.
    reckless: bool,
    guards: Vec<Guard>,
    turn: u32,
    log: Vec<String>,
}

impl Heist {
    pub fn new(
        graph: MazeGraph,
        objects: &ObjectPlacements,
        engine: EngineConfig,
        pool: PoolConfig,
    ) -> io::Result<Self> {
        let navigator = Arc::new(Navigator::new(graph, engine));
        let workers = Arc::new(PathWorkers::new(Arc::clone(&navigator), pool)?);

        let mut plan: VecDeque<Objective> =
            objects.keys.iter().map(|&k| Objective::Key(k)).collect();
        plan.extend(
            objects
                .levers
                .iter()
                .enumerate()
                .map(|(id, l)| Objective::Lever(id, l.pos)),
        );
        plan.push_back(Objective::Exit(objects.exit));

        let guards = objects
            .enemy_spawns
            .iter()
            .map(|&spawn| {
                let mut agent = NavAgent::new(
                    spawn,
                    Capabilities::PERMEATE_ALL,
                    Router::Pooled(Arc::clone(&workers)),
                );
                agent.handle(NavEvent::SetGoal(objects.exit));
                Guard {
                    agent,
                    route: [spawn, objects.exit],
                    leg: 1,
                }
            })
            .collect();

        let mut heist = Self {
            thief: NavAgent::new(
                objects.spawn,
                Capabilities::AVOID_TRAPS,
                Router::Inline(Arc::clone(&navigator)),
            ),
            navigator,
            plan,
            keys_held: 0,
            keys_needed: objects.locked_doors.len(),
            reckless: false,
            guards,
            turn: 0,
            log: Vec::new(),
        };
        heist.aim();
        Ok(heist)
    }

    pub fn navigator(&self) -> &Arc<Navigator> {
        &self.navigator
    }

    pub fn stats(&self) -> NavStats {
        self.navigator.stats()
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn thief(&self) -> Point {
        self.thief.pos()
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// Current level with the thief and guards drawn in.
    pub fn render(&self) -> String {
        let mut actors: Vec<(Point, char)> =
            self.guards.iter().map(|g| (g.agent.pos(), 'g')).collect();
        actors.push((self.thief.pos(), '@'));
        self.navigator.with_graph(|g| render(g, &actors))
    }

    /// Play until the thief escapes, gets stuck, or `max_turns` pass.
    pub fn run(&mut self, max_turns: u32) -> Outcome {
        while self.turn < max_turns {
            if let Some(outcome) = self.tick() {
                return outcome;
            }
        }
        Outcome::OutOfTime
    }

    /// Advance one turn.
    pub fn tick(&mut self) -> Option<Outcome> {
        self.turn += 1;
        let outcome = self.tick_thief();
        self.tick_guards();
        outcome
    }

    fn caps(&self) -> Capabilities {
        let mut caps = Capabilities::NONE;
        if !self.reckless {
            caps = caps | Capabilities::AVOID_TRAPS;
        }
        if self.keys_held >= self.keys_needed {
            caps = caps | Capabilities::CAN_UNLOCK;
        }
        caps
    }

    /// Point the thief at the next objective, rebuilding the agent when its
    /// capabilities changed.
    fn aim(&mut self) {
        let Some(next) = self.plan.front().copied() else {
            return;
        };
        let caps = self.caps();
        if caps != self.thief.caps() {
            self.thief = NavAgent::new(
                self.thief.pos(),
                caps,
                Router::Inline(Arc::clone(&self.navigator)),
            );
        }
        self.thief.handle(NavEvent::SetGoal(next.pos()));
    }

    fn note(&mut self, msg: String) {
        debug!("turn {}: {msg}", self.turn);
        self.log.push(msg);
    }

    fn broadcast(&mut self, m: &Mutation) {
        self.note(format!("level {} -> {} ({:?} {:?})", m.from, m.to, m.kind, m.concern));
        self.thief.handle(NavEvent::LevelChanged);
        for g in &mut self.guards {
            g.agent.handle(NavEvent::LevelChanged);
        }
    }

    fn walkable(&self, p: Point, caps: Capabilities) -> bool {
        self.navigator.with_graph(|g| g.passable(p, caps))
    }

    fn tick_thief(&mut self) -> Option<Outcome> {
        match self.thief.handle(NavEvent::Tick) {
            NavCommand::Wait => None,
            NavCommand::MoveTo(p) => {
                let caps = self.thief.caps();
                if caps.contains(Capabilities::CAN_UNLOCK)
                    && self.navigator.with_graph(|g| g.is_locked(p)) == Some(true)
                {
                    if let Ok(Some(m)) = self.navigator.unlock_door(p) {
                        self.note(format!("thief unlocks the door at {p}"));
                        self.broadcast(&m);
                    }
                }
                if !self.walkable(p, caps) {
                    self.thief.handle(NavEvent::Blocked);
                }
                None
            }
            NavCommand::Stop => self.reach_objective(),
            NavCommand::GiveUp => {
                if !self.reckless {
                    self.reckless = true;
                    self.note("thief risks the traps".to_string());
                } else if let Some(skipped) = self.plan.pop_front() {
                    self.note(format!("thief abandons {skipped:?}"));
                }
                if self.plan.is_empty() {
                    return Some(Outcome::Stuck { turns: self.turn });
                }
                self.aim();
                None
            }
        }
    }

    fn reach_objective(&mut self) -> Option<Outcome> {
        let here = self.thief.pos();
        let next = self.plan.front().copied()?;
        if next.pos() != here {
            self.aim();
            return None;
        }
        self.plan.pop_front();
        match next {
            Objective::Key(p) => {
                if let Ok(true) = self.navigator.collect_key(p) {
                    self.keys_held += 1;
                    self.note(format!("thief picks up the key at {p} ({} held)", self.keys_held));
                }
            }
            Objective::Lever(id, p) => {
                if let Ok(Some(m)) = self.navigator.set_lever(id, true) {
                    self.note(format!("thief pulls the lever at {p}"));
                    self.broadcast(&m);
                }
            }
            Objective::Exit(_) => {
                info!("thief escaped after {} turns", self.turn);
                return Some(Outcome::Escaped { turns: self.turn });
            }
        }
        self.aim();
        None
    }

    fn tick_guards(&mut self) {
        for i in 0..self.guards.len() {
            let cmd = self.guards[i].agent.handle(NavEvent::Tick);
            match cmd {
                NavCommand::MoveTo(p) => {
                    if !self.walkable(p, Capabilities::PERMEATE_ALL) {
                        self.guards[i].agent.handle(NavEvent::Blocked);
                    }
                }
                NavCommand::Stop => {
                    let g = &mut self.guards[i];
                    g.leg ^= 1;
                    let goal = g.route[g.leg];
                    g.agent.handle(NavEvent::SetGoal(goal));
                }
                NavCommand::GiveUp => {
                    let at = self.guards[i].agent.pos();
                    self.note(format!("guard at {at} has no route"));
                }
                NavCommand::Wait => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skulk_core::{LevelVersion, MazeBuilder, Movement, Range};
    use skulk_mapgen::{GenerationConfig, generate};

    /// Corridor: spawn (0, 1), locked door (4, 1), exit (8, 1); the key sits
    /// in an alcove at (2, 0).
    fn vault() -> (MazeGraph, ObjectPlacements) {
        let mut b = MazeBuilder::new(9, 3, Movement::Cardinal).unwrap();
        b.carve(Range::new(0, 1, 9, 2));
        b.carve(Range::new(2, 0, 3, 1));
        b.add_locked_door(Point::new(4, 1), true);
        b.tag(Point::new(2, 0), Tags::KEY);
        b.tag(Point::new(0, 1), Tags::SPAWN);
        b.tag(Point::new(8, 1), Tags::EXIT);
        let objects = ObjectPlacements {
            spawn: Point::new(0, 1),
            exit: Point::new(8, 1),
            keys: vec![Point::new(2, 0)],
            locked_doors: vec![Point::new(4, 1)],
            enemy_spawns: vec![Point::new(7, 1)],
            ..ObjectPlacements::default()
        };
        (b.build(LevelVersion::INITIAL).unwrap(), objects)
    }

    fn pool() -> PoolConfig {
        PoolConfig {
            workers: 1,
            queue_capacity: 8,
        }
    }

    #[test]
    fn renders_features() {
        let (g, _) = vault();
        let text = render(&g, &[(Point::new(1, 1), '@')]);
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows, vec!["##k######", "S@..L...E", "#########"]);
    }

    #[test]
    fn thief_takes_the_key_then_the_door() {
        let (g, o) = vault();
        let mut heist = Heist::new(g, &o, EngineConfig::default(), pool()).unwrap();
        let outcome = heist.run(100);
        assert!(matches!(outcome, Outcome::Escaped { .. }), "{outcome:?}");
        assert_eq!(heist.thief(), Point::new(8, 1));
        let nav = Arc::clone(heist.navigator());
        nav.with_graph(|g| {
            assert_eq!(g.is_locked(Point::new(4, 1)), Some(false));
            assert!(!g.tags(Point::new(2, 0)).contains(Tags::KEY));
            assert!(g.version() > LevelVersion::INITIAL);
        });
        assert!(heist.log().iter().any(|l| l.contains("unlocks")));
    }

    #[test]
    fn generated_heist_escapes() {
        let mut config = GenerationConfig::campaign(5);
        config.object_density.levers = 1.0;
        let level = generate(&config).unwrap();
        let mut heist =
            Heist::new(level.graph, &level.objects, config.engine_config(), pool()).unwrap();
        let outcome = heist.run(10_000);
        assert!(matches!(outcome, Outcome::Escaped { .. }), "{outcome:?}");
        assert!(heist.stats().total_calls > 0);
    }
}
