//! Level generation for skulk.
//!
//! [`generate`] partitions the level with a binary space partition, carves
//! one room per region, joins sibling regions with L-shaped corridors and
//! places doors, keys, levers and the rest of the features. Every level is
//! checked for reachability before it is returned; failed attempts are
//! retried with derived seeds.
//!
//! ```no_run
//! use skulk_mapgen::{GenerationConfig, generate, persist};
//!
//! let level = generate(&GenerationConfig::campaign(3)).unwrap();
//! let json = persist::to_json(&level.graph, &level.objects).unwrap();
//! let saved = persist::from_json(&json).unwrap();
//! assert_eq!(saved.graph, level.graph);
//! ```

mod config;
mod error;
mod generator;
mod partition;
pub mod persist;
mod placement;
mod validate;

pub use config::{GenerationConfig, MAX_DIMENSION, ObjectDensity, ObjectKind};
pub use error::GenerationError;
pub use generator::{GeneratedLevel, Room, RoomKind, attempt_seed, generate, generate_with_seed};
pub use persist::{LevelDocument, LevelFormatError, SavedLevel};
pub use placement::ObjectPlacements;
pub use validate::check_level;
