//! Pathfinding for skulk mazes.
//!
//! Low-level searches run on a reusable [`SearchSpace`]:
//!
//! - **A\*** shortest path with deterministic tie-breaking ([`SearchSpace::astar`])
//! - **Dijkstra** multi-source cost maps ([`SearchSpace::dijkstra_map`])
//! - **BFS** step-count maps ([`SearchSpace::bfs_map`])
//! - **Flood fill** and connected components ([`SearchSpace::cc_map`],
//!   [`SearchSpace::cc_map_all`])
//!
//! On top of those, [`Navigator`] serves capability-aware queries against
//! a live [`MazeGraph`](skulk_core::MazeGraph) through a bounded,
//! versioned [`PathCache`]. [`PathWorkers`] answers queries on a thread
//! pool with cancellable [`PathHandle`]s, and [`NavAgent`] drives a single
//! agent from goal to arrival.
//!
//! # Trait hierarchy
//!
//! | Trait | Required for |
//! |---|---|
//! | [`Pather`] | BFS, Dijkstra, flood fill |
//! | [`AstarPather`] : [`Pather`] | A* |

mod agent;
mod astar;
mod bfs;
mod cache;
mod cc;
mod dijkstra;
mod distance;
mod engine;
mod path;
mod pather;
mod pool;
mod search;
mod traits;

pub use agent::{NavAgent, NavCommand, NavEvent, NavState, Router};
pub use astar::{SearchLimits, SearchOutcome};
pub use cache::{DEFAULT_CACHE_CAPACITY, PathCache, PathKey, Revalidation};
pub use distance::{heuristic, manhattan, octile};
pub use engine::{EngineConfig, NavStats, Navigator, PathOutcome};
pub use path::Path;
pub use pather::MazePather;
pub use pool::{PathHandle, PathWorkers, PoolConfig, SubmitError};
pub use search::{PathNode, SearchSpace, UNREACHABLE};
pub use traits::{AstarPather, Pather};
