//! Generation parameters and presets.

use serde::{Deserialize, Serialize};
use skulk_core::Movement;
use skulk_paths::{DEFAULT_CACHE_CAPACITY, EngineConfig};

use crate::error::GenerationError;

/// Largest accepted width or height.
pub const MAX_DIMENSION: i32 = 512;

/// Object counts per 100 grid cells. Each kind is clamped to its own
/// minimum and maximum; a density of 0 disables the kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectDensity {
    pub keys: f64,
    pub locked_doors: f64,
    pub levers: f64,
    pub doors: f64,
    pub enemies: f64,
    pub traps: f64,
    pub cameras: f64,
    pub hiding_spots: f64,
}

impl Default for ObjectDensity {
    fn default() -> Self {
        Self {
            keys: 0.67,
            locked_doors: 0.4,
            levers: 0.25,
            doors: 0.5,
            enemies: 1.0,
            traps: 0.5,
            cameras: 0.4,
            hiding_spots: 0.83,
        }
    }
}

/// Placeable object kinds, for count lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Key,
    LockedDoor,
    Lever,
    Door,
    Enemy,
    Trap,
    Camera,
    HidingSpot,
}

impl ObjectKind {
    const ALL: [ObjectKind; 8] = [
        ObjectKind::Key,
        ObjectKind::LockedDoor,
        ObjectKind::Lever,
        ObjectKind::Door,
        ObjectKind::Enemy,
        ObjectKind::Trap,
        ObjectKind::Camera,
        ObjectKind::HidingSpot,
    ];

    /// (minimum, maximum) count when the kind is enabled.
    fn bounds(self) -> (usize, usize) {
        match self {
            ObjectKind::Key => (1, 5),
            ObjectKind::LockedDoor => (0, 4),
            ObjectKind::Lever => (0, 3),
            ObjectKind::Door => (0, 6),
            ObjectKind::Enemy => (2, 8),
            ObjectKind::Trap => (1, 4),
            ObjectKind::Camera => (0, 3),
            ObjectKind::HidingSpot => (2, 6),
        }
    }

    fn name(self) -> &'static str {
        match self {
            ObjectKind::Key => "keys",
            ObjectKind::LockedDoor => "locked_doors",
            ObjectKind::Lever => "levers",
            ObjectKind::Door => "doors",
            ObjectKind::Enemy => "enemies",
            ObjectKind::Trap => "traps",
            ObjectKind::Camera => "cameras",
            ObjectKind::HidingSpot => "hiding_spots",
        }
    }
}

impl ObjectDensity {
    pub fn get(&self, kind: ObjectKind) -> f64 {
        match kind {
            ObjectKind::Key => self.keys,
            ObjectKind::LockedDoor => self.locked_doors,
            ObjectKind::Lever => self.levers,
            ObjectKind::Door => self.doors,
            ObjectKind::Enemy => self.enemies,
            ObjectKind::Trap => self.traps,
            ObjectKind::Camera => self.cameras,
            ObjectKind::HidingSpot => self.hiding_spots,
        }
    }

    /// Target count of `kind` for a grid of `area` cells.
    pub fn count(&self, kind: ObjectKind, area: usize) -> usize {
        let d = self.get(kind);
        if d <= 0.0 {
            return 0;
        }
        let (lo, hi) = kind.bounds();
        let raw = (area as f64 * d / 100.0).floor() as usize;
        raw.clamp(lo, hi)
    }

    fn validate(&self) -> Result<(), String> {
        for kind in ObjectKind::ALL {
            let d = self.get(kind);
            if !d.is_finite() || d < 0.0 {
                return Err(format!(
                    "object density for {} must be finite and >= 0, got {d}",
                    kind.name()
                ));
            }
        }
        Ok(())
    }
}

/// Everything the generator needs to build one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub seed: u64,
    pub width: i32,
    pub height: i32,
    pub min_room_size: i32,
    pub max_room_size: i32,
    /// 1 or 2.
    pub corridor_width: i32,
    /// Chance per partition split of an extra corridor between its halves.
    pub loop_chance: f64,
    pub object_density: ObjectDensity,
    /// Minimum Manhattan distance between placed objectives and from spawn.
    pub min_object_spacing: i32,
    pub boss_arena: bool,
    /// Buttons placed in the boss arena, at most 4.
    pub boss_buttons: usize,
    pub diagonal_movement: bool,
    pub path_cache_capacity: usize,
    /// Extra attempts after the first one fails validation.
    pub generation_retry_limit: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            width: 30,
            height: 30,
            min_room_size: 4,
            max_room_size: 8,
            corridor_width: 1,
            loop_chance: 0.15,
            object_density: ObjectDensity::default(),
            min_object_spacing: 3,
            boss_arena: false,
            boss_buttons: 4,
            diagonal_movement: false,
            path_cache_capacity: DEFAULT_CACHE_CAPACITY,
            generation_retry_limit: 8,
        }
    }
}

impl GenerationConfig {
    /// Campaign level `level` (1-based). Levels grow from 15x15 to 40x40
    /// and are seeded from the level number.
    pub fn campaign(level: u32) -> Self {
        let size = match level {
            0..=2 => 15,
            3..=5 => 20,
            6..=8 => 30,
            _ => 40,
        };
        Self {
            seed: u64::from(level) * 12345,
            width: size,
            height: size,
            ..Self::default()
        }
    }

    /// Endless-mode floor. Every 10th floor holds a boss arena.
    pub fn endless(floor: u32) -> Self {
        let boss = floor > 0 && floor % 10 == 0;
        let size = 25 + floor.saturating_mul(2).min(15) as i32;
        Self {
            seed: u64::from(floor).wrapping_mul(12345) ^ 0x00E1_D1E5,
            width: size,
            height: size,
            loop_chance: 0.3,
            boss_arena: boss,
            ..Self::default()
        }
    }

    /// Smallest region a room fits in, margin included.
    #[inline]
    pub fn min_region(&self) -> i32 {
        self.min_room_size + 2
    }

    pub fn movement(&self) -> Movement {
        if self.diagonal_movement {
            Movement::Octile
        } else {
            Movement::Cardinal
        }
    }

    /// Engine tuning matching this level.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            cache_capacity: self.path_cache_capacity,
            ..EngineConfig::default()
        }
    }

    /// Reject configurations no attempt could satisfy.
    pub fn validate(&self) -> Result<(), GenerationError> {
        self.check().map_err(GenerationError::InvalidConfig)
    }

    fn check(&self) -> Result<(), String> {
        if self.min_room_size < 2 {
            return Err(format!("min_room_size must be >= 2, got {}", self.min_room_size));
        }
        if self.min_room_size > self.max_room_size {
            return Err(format!(
                "min_room_size {} exceeds max_room_size {}",
                self.min_room_size, self.max_room_size
            ));
        }
        let min_side = self.min_region() + 2;
        if self.width < min_side || self.height < min_side {
            return Err(format!(
                "level {}x{} is smaller than {min_side}x{min_side}",
                self.width, self.height
            ));
        }
        if self.width > MAX_DIMENSION || self.height > MAX_DIMENSION {
            return Err(format!(
                "level {}x{} exceeds {MAX_DIMENSION}x{MAX_DIMENSION}",
                self.width, self.height
            ));
        }
        let interior_w = self.width - 2;
        let interior_h = self.height - 2;
        if interior_w < 2 * self.min_region() && interior_h < 2 * self.min_region() {
            return Err(format!(
                "interior {interior_w}x{interior_h} cannot be split into two rooms of size {}",
                self.min_room_size
            ));
        }
        if !(1..=2).contains(&self.corridor_width) {
            return Err(format!(
                "corridor_width must be 1 or 2, got {}",
                self.corridor_width
            ));
        }
        if !self.loop_chance.is_finite() || !(0.0..=1.0).contains(&self.loop_chance) {
            return Err(format!("loop_chance must be in [0, 1], got {}", self.loop_chance));
        }
        if self.min_object_spacing < 0 {
            return Err(format!(
                "min_object_spacing must be >= 0, got {}",
                self.min_object_spacing
            ));
        }
        if self.boss_buttons > 4 {
            return Err(format!("boss_buttons must be <= 4, got {}", self.boss_buttons));
        }
        if self.path_cache_capacity == 0 {
            return Err("path_cache_capacity must be > 0".to_string());
        }
        self.object_density.validate()
    }
}

impl From<&GenerationConfig> for EngineConfig {
    fn from(config: &GenerationConfig) -> Self {
        config.engine_config()
    }
}
