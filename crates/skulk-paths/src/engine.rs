//! The pathfinding engine shared by every agent of a level.
//!
//! [`Navigator`] owns the live [`MazeGraph`], the [`PathCache`] and one
//! search scratch for synchronous queries. Locks are always taken in the
//! order scratch, graph, cache. A query holds the graph read lock from the
//! moment it reads the level version until its result is cached, so a
//! mutation (graph write lock, then cache revalidation) never interleaves
//! with it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard};

use log::{debug, info};
use skulk_core::{Capabilities, LevelVersion, MazeError, MazeGraph, Mutation, Point, Range, Terrain};

use crate::astar::{SearchLimits, SearchOutcome};
use crate::cache::{DEFAULT_CACHE_CAPACITY, PathCache, PathKey};
use crate::path::Path;
use crate::pather::MazePather;
use crate::search::SearchSpace;

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Maximum number of cached paths. 0 disables the cache.
    pub cache_capacity: usize,
    /// Give up after closing this many nodes.
    pub max_expansions: Option<usize>,
    /// Ignore paths costlier than this.
    pub max_cost: Option<i32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            max_expansions: None,
            max_cost: None,
        }
    }
}

impl EngineConfig {
    pub fn limits(&self) -> SearchLimits {
        SearchLimits {
            max_expansions: self.max_expansions,
            max_cost: self.max_cost,
        }
    }
}

/// Snapshot of the engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NavStats {
    pub total_calls: u64,
    pub cache_hits: u64,
    pub computed: u64,
    pub no_path: u64,
    pub budget_failures: u64,
}

impl NavStats {
    /// Fraction of calls answered from the cache.
    pub fn hit_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_calls as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    total_calls: AtomicU64,
    cache_hits: AtomicU64,
    computed: AtomicU64,
    no_path: AtomicU64,
    budget_failures: AtomicU64,
}

impl Counters {
    fn bump(c: &AtomicU64) {
        c.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> NavStats {
        NavStats {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            computed: self.computed.load(Ordering::Relaxed),
            no_path: self.no_path.load(Ordering::Relaxed),
            budget_failures: self.budget_failures.load(Ordering::Relaxed),
        }
    }
}

/// Result of one query, as seen by the worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathOutcome {
    Found(Path),
    NoPath,
    Cancelled,
}

impl PathOutcome {
    pub fn into_path(self) -> Option<Path> {
        match self {
            PathOutcome::Found(p) => Some(p),
            _ => None,
        }
    }
}

/// Versioned, cache-backed pathfinding over one level.
pub struct Navigator {
    config: EngineConfig,
    graph: RwLock<MazeGraph>,
    cache: Mutex<PathCache>,
    scratch: Mutex<SearchSpace>,
    counters: Counters,
}

impl Navigator {
    pub fn new(graph: MazeGraph, config: EngineConfig) -> Self {
        let cache = PathCache::new(config.cache_capacity, graph.version());
        let scratch = SearchSpace::new(graph.bounds());
        info!(
            "navigator ready: {}x{} at {}, cache capacity {}",
            graph.width(),
            graph.height(),
            graph.version(),
            config.cache_capacity
        );
        Self {
            config,
            graph: RwLock::new(graph),
            cache: Mutex::new(cache),
            scratch: Mutex::new(scratch),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    fn read_graph(&self) -> RwLockReadGuard<'_, MazeGraph> {
        self.graph.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn graph_write_for_tests(&self) -> std::sync::RwLockWriteGuard<'_, MazeGraph> {
        self.graph.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current level version.
    pub fn version(&self) -> LevelVersion {
        self.read_graph().version()
    }

    pub fn bounds(&self) -> Range {
        self.read_graph().bounds()
    }

    /// Run `f` against the live graph under the read lock.
    pub fn with_graph<R>(&self, f: impl FnOnce(&MazeGraph) -> R) -> R {
        f(&self.read_graph())
    }

    /// Clone of the live graph.
    pub fn snapshot(&self) -> MazeGraph {
        self.read_graph().clone()
    }

    pub fn stats(&self) -> NavStats {
        self.counters.snapshot()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Version the cache currently serves.
    pub fn cache_version(&self) -> LevelVersion {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).version()
    }

    /// Shortest path from `start` to `goal` for an agent with `caps`.
    ///
    /// `None` when either endpoint is blocked for `caps`, the goal is
    /// unreachable, or the search budget ran out.
    pub fn find_path(&self, start: Point, goal: Point, caps: Capabilities) -> Option<Path> {
        let mut space = self.scratch.lock().unwrap_or_else(PoisonError::into_inner);
        self.resolve(&mut space, PathKey::new(start, goal, caps), None)
            .into_path()
    }

    /// Movement request from an agent. Same as [`find_path`](Self::find_path).
    pub fn request_path(&self, start: Point, goal: Point, caps: Capabilities) -> Option<Path> {
        self.find_path(start, goal, caps)
    }

    /// Shortest path treating every cell of `avoid` as blocked. Never cached.
    pub fn find_path_avoiding(
        &self,
        start: Point,
        goal: Point,
        caps: Capabilities,
        avoid: &HashSet<Point>,
    ) -> Option<Path> {
        Counters::bump(&self.counters.total_calls);
        // Scratch before graph, as in `find_path`.
        let mut space = self.scratch.lock().unwrap_or_else(PoisonError::into_inner);
        let graph = self.read_graph();
        let pather = MazePather::new(&graph, caps).avoiding(avoid);
        if !pather.passable(start) || !pather.passable(goal) {
            Counters::bump(&self.counters.no_path);
            return None;
        }
        space.ensure_range(graph.bounds());
        let outcome = space.astar(&pather, start, goal, self.config.limits());
        self.settle(outcome).map(|(cells, cost)| Path::new(cells, cost))
    }

    fn settle(&self, outcome: SearchOutcome) -> Option<(Vec<Point>, i32)> {
        match outcome {
            SearchOutcome::Found { cells, cost } => {
                Counters::bump(&self.counters.computed);
                Some((cells, cost))
            }
            SearchOutcome::NoPath => {
                Counters::bump(&self.counters.no_path);
                None
            }
            SearchOutcome::BudgetExhausted => {
                Counters::bump(&self.counters.budget_failures);
                None
            }
        }
    }

    /// Answer one query using `space` as scratch.
    ///
    /// When `cancel` is set before the search or before the insert, the
    /// result is dropped and the cache is left untouched.
    pub(crate) fn resolve(
        &self,
        space: &mut SearchSpace,
        key: PathKey,
        cancel: Option<&AtomicBool>,
    ) -> PathOutcome {
        let cancelled = || cancel.is_some_and(|c| c.load(Ordering::Acquire));
        Counters::bump(&self.counters.total_calls);

        let graph = self.read_graph();
        let version = graph.version();
        {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(path) = cache.get(&key, version) {
                Counters::bump(&self.counters.cache_hits);
                return PathOutcome::Found(path);
            }
        }

        if !graph.passable(key.start, key.caps) || !graph.passable(key.goal, key.caps) {
            Counters::bump(&self.counters.no_path);
            return PathOutcome::NoPath;
        }
        if cancelled() {
            return PathOutcome::Cancelled;
        }

        space.ensure_range(graph.bounds());
        let pather = MazePather::new(&graph, key.caps);
        let outcome = space.astar(&pather, key.start, key.goal, self.config.limits());
        if outcome == SearchOutcome::BudgetExhausted {
            debug!(
                "search budget exhausted for {} -> {} at {version}",
                key.start, key.goal
            );
        }
        let Some((cells, cost)) = self.settle(outcome) else {
            return PathOutcome::NoPath;
        };
        let path = Path::new(cells, cost);

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if cancelled() {
            return PathOutcome::Cancelled;
        }
        cache.insert(key, version, path.clone());
        drop(cache);
        drop(graph);
        PathOutcome::Found(path)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    fn mutate(
        &self,
        f: impl FnOnce(&mut MazeGraph) -> Result<Option<Mutation>, MazeError>,
    ) -> Result<Option<Mutation>, MazeError> {
        let mut graph = self.graph.write().unwrap_or_else(PoisonError::into_inner);
        let m = f(&mut graph)?;
        if let Some(m) = &m {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            cache.revalidate(m);
        }
        Ok(m)
    }

    pub fn unlock_door(&self, p: Point) -> Result<Option<Mutation>, MazeError> {
        self.mutate(|g| g.unlock_door(p))
    }

    pub fn lock_door(&self, p: Point) -> Result<Option<Mutation>, MazeError> {
        self.mutate(|g| g.lock_door(p))
    }

    pub fn set_lever(&self, id: usize, on: bool) -> Result<Option<Mutation>, MazeError> {
        self.mutate(|g| g.set_lever(id, on))
    }

    pub fn toggle_lever(&self, id: usize) -> Result<Mutation, MazeError> {
        self.mutate(|g| g.toggle_lever(id).map(Some))?
            .ok_or(MazeError::UnknownLever(id))
    }

    pub fn set_terrain(&self, p: Point, terrain: Terrain) -> Result<Option<Mutation>, MazeError> {
        self.mutate(|g| g.set_terrain(p, terrain))
    }

    /// Pick up the key at `p`. Does not touch the version or the cache.
    pub fn collect_key(&self, p: Point) -> Result<bool, MazeError> {
        let mut graph = self.graph.write().unwrap_or_else(PoisonError::into_inner);
        graph.collect_key(p)
    }

    /// Install a freshly generated or loaded level.
    ///
    /// The new graph's version is raised above the current one if needed,
    /// and the cache is purged.
    pub fn load_level(&self, mut level: MazeGraph) -> Mutation {
        let mut graph = self.graph.write().unwrap_or_else(PoisonError::into_inner);
        let m = level.rebase_after(graph.version());
        info!(
            "loading level {}x{} at {} (was {})",
            level.width(),
            level.height(),
            m.to,
            m.from
        );
        *graph = level;
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.purge_all(m.to);
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skulk_core::{MazeBuilder, Movement, MutationKind};

    /// 9x5 room split by a wall column at x=4, with a locked door at (4, 2)
    /// and a lever gate at (4, 4). The lever sits at (0, 0).
    fn level() -> MazeGraph {
        let mut b = MazeBuilder::new(9, 5, Movement::Cardinal).unwrap();
        b.carve(Range::new(0, 0, 9, 5));
        for y in 0..5 {
            b.set_terrain(Point::new(4, y), Terrain::Wall);
        }
        b.set_terrain(Point::new(4, 2), Terrain::Floor);
        b.set_terrain(Point::new(4, 4), Terrain::Floor);
        b.add_locked_door(Point::new(4, 2), true);
        b.add_lever(Point::new(0, 0), false, vec![Point::new(4, 4)]);
        b.build(LevelVersion::INITIAL).unwrap()
    }

    const A: Point = Point::new(0, 2);
    const B: Point = Point::new(8, 2);

    #[test]
    fn capabilities_filter_edges() {
        let nav = Navigator::new(level(), EngineConfig::default());
        assert!(nav.find_path(A, B, Capabilities::NONE).is_none());
        let p = nav.find_path(A, B, Capabilities::CAN_UNLOCK).unwrap();
        assert_eq!(p.cost(), 80);
        assert!(p.cells().contains(&Point::new(4, 2)));
        let q = nav.find_path(A, B, Capabilities::CAN_PASS_GATES).unwrap();
        assert!(q.cells().contains(&Point::new(4, 4)));
        assert_eq!(q.cost(), 120);
    }

    #[test]
    fn hits_share_the_cached_path() {
        let nav = Navigator::new(level(), EngineConfig::default());
        let a = nav.find_path(A, B, Capabilities::CAN_UNLOCK).unwrap();
        let b = nav.request_path(A, B, Capabilities::CAN_UNLOCK).unwrap();
        assert!(a.ptr_eq(&b));
        let s = nav.stats();
        assert_eq!(s.total_calls, 2);
        assert_eq!(s.cache_hits, 1);
        assert_eq!(s.computed, 1);
    }

    #[test]
    fn endpoints_are_checked() {
        let nav = Navigator::new(level(), EngineConfig::default());
        let wall = Point::new(4, 0);
        assert!(nav.find_path(A, wall, Capabilities::PERMEATE_ALL).is_none());
        assert!(nav.find_path(A, Point::new(40, 2), Capabilities::NONE).is_none());
        let single = nav.find_path(A, A, Capabilities::NONE).unwrap();
        assert_eq!(single.cells(), &[A]);
        assert_eq!(single.cost(), 0);
        assert_eq!(nav.stats().no_path, 2);
    }

    #[test]
    fn unlocking_invalidates_and_reroutes() {
        let nav = Navigator::new(level(), EngineConfig::default());
        let gated = nav.find_path(A, B, Capabilities::CAN_PASS_GATES).unwrap();
        assert_eq!(gated.cost(), 120);
        let m = nav.unlock_door(Point::new(4, 2)).unwrap().unwrap();
        assert_eq!(m.kind, MutationKind::Opened);
        assert_eq!(nav.version(), LevelVersion(2));
        let fresh = nav.find_path(A, B, Capabilities::CAN_PASS_GATES).unwrap();
        assert_eq!(fresh.cost(), 80);
        assert!(!fresh.ptr_eq(&gated));
        assert!(nav.find_path(A, B, Capabilities::NONE).is_some());
    }

    #[test]
    fn closing_an_unused_gate_keeps_the_entry() {
        let nav = Navigator::new(level(), EngineConfig::default());
        nav.toggle_lever(0).unwrap();
        let through_door = nav.find_path(A, B, Capabilities::CAN_UNLOCK).unwrap();
        let through_gate = nav.find_path(A, B, Capabilities::NONE).unwrap();
        assert_eq!(nav.cache_len(), 2);
        let m = nav.toggle_lever(0).unwrap();
        assert_eq!(m.kind, MutationKind::Closed);
        assert_eq!(nav.cache_len(), 1);
        let again = nav.find_path(A, B, Capabilities::CAN_UNLOCK).unwrap();
        assert!(again.ptr_eq(&through_door));
        assert!(nav.find_path(A, B, Capabilities::NONE).is_none());
        assert!(through_gate.cells().contains(&Point::new(4, 4)));
    }

    #[test]
    fn avoiding_bypasses_cache() {
        let nav = Navigator::new(level(), EngineConfig::default());
        let avoid: HashSet<Point> = [Point::new(4, 2)].into_iter().collect();
        assert!(nav
            .find_path_avoiding(A, B, Capabilities::CAN_UNLOCK, &avoid)
            .is_none());
        let p = nav
            .find_path_avoiding(A, B, Capabilities::PERMEATE_ALL, &avoid)
            .unwrap();
        assert_eq!(p.cost(), 120);
        assert_eq!(nav.cache_len(), 0);
    }

    #[test]
    fn load_level_purges_and_advances_version() {
        let nav = Navigator::new(level(), EngineConfig::default());
        nav.find_path(A, B, Capabilities::CAN_UNLOCK);
        nav.unlock_door(Point::new(4, 2)).unwrap();
        let m = nav.load_level(level());
        assert_eq!(m.kind, MutationKind::Rebuilt);
        assert_eq!(nav.version(), LevelVersion(3));
        assert_eq!(nav.cache_len(), 0);
        assert!(nav.find_path(A, B, Capabilities::NONE).is_none());
    }

    #[test]
    fn budget_failures_are_counted_and_not_cached() {
        let config = EngineConfig {
            max_expansions: Some(2),
            ..EngineConfig::default()
        };
        let nav = Navigator::new(level(), config);
        assert!(nav.find_path(A, B, Capabilities::CAN_UNLOCK).is_none());
        assert_eq!(nav.stats().budget_failures, 1);
        assert_eq!(nav.cache_len(), 0);
    }
}
