//! JSON persistence for generated levels.
//!
//! A [`LevelDocument`] stores the grid as row-major `u16` bitfields (bit 0
//! is floor, tag bits follow), the placement record, the controller link
//! tables and the Level Version. Loading rebuilds the graph through
//! [`MazeBuilder`], so every link is validated again.

use serde::{Deserialize, Serialize};
use skulk_core::{
    Cell, LevelVersion, Lever, MazeBuilder, MazeError, MazeGraph, Movement, Point, Tags,
};
use thiserror::Error;

use crate::generator::GeneratedLevel;
use crate::placement::ObjectPlacements;

/// Document format written by this version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum LevelFormatError {
    #[error("malformed level document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported level format {0}, expected {FORMAT_VERSION}")]
    UnsupportedFormat(u32),
    #[error("cell {index} has unknown bits {bits:#06x}")]
    InvalidCell { index: usize, bits: u16 },
    #[error(transparent)]
    Maze(#[from] MazeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    pub pos: Point,
    pub locked: bool,
}

/// Serialized form of a level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDocument {
    pub format: u32,
    pub width: i32,
    pub height: i32,
    pub movement: Movement,
    pub cells: Vec<u16>,
    pub objects: ObjectPlacements,
    pub locked_doors: Vec<LockEntry>,
    pub levers: Vec<Lever>,
    pub version: u64,
}

/// A level read back from a document.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedLevel {
    pub graph: MazeGraph,
    pub objects: ObjectPlacements,
}

impl From<GeneratedLevel> for SavedLevel {
    fn from(level: GeneratedLevel) -> Self {
        Self {
            graph: level.graph,
            objects: level.objects,
        }
    }
}

pub fn to_document(graph: &MazeGraph, objects: &ObjectPlacements) -> LevelDocument {
    LevelDocument {
        format: FORMAT_VERSION,
        width: graph.width(),
        height: graph.height(),
        movement: graph.movement(),
        cells: graph.cells().map(|(_, c)| c.to_bits()).collect(),
        objects: objects.clone(),
        locked_doors: graph
            .locked_doors()
            .map(|(pos, locked)| LockEntry { pos, locked })
            .collect(),
        levers: graph.levers().to_vec(),
        version: graph.version().0,
    }
}

pub fn from_document(doc: LevelDocument) -> Result<SavedLevel, LevelFormatError> {
    if doc.format != FORMAT_VERSION {
        return Err(LevelFormatError::UnsupportedFormat(doc.format));
    }
    let cells = doc
        .cells
        .iter()
        .enumerate()
        .map(|(index, &bits)| {
            Cell::from_bits(bits).ok_or(LevelFormatError::InvalidCell { index, bits })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let mut plan = MazeBuilder::from_cells(doc.width, doc.height, doc.movement, cells)?;

    for entry in &doc.locked_doors {
        require_tag(
            &plan,
            entry.pos,
            Tags::LOCKED_DOOR,
            "lock entry on a cell without a locked door",
        )?;
        plan.add_locked_door(entry.pos, entry.locked);
    }
    for lever in doc.levers {
        require_tag(&plan, lever.pos, Tags::LEVER, "lever entry on a cell without a lever")?;
        for &g in &lever.gates {
            require_tag(&plan, g, Tags::LEVER_GATE, "gate entry on a cell without a gate")?;
        }
        plan.add_lever(lever.pos, lever.on, lever.gates);
    }

    let bounds = plan.bounds();
    let o = &doc.objects;
    let positions = o
        .objectives()
        .into_iter()
        .chain([o.spawn])
        .chain(o.locked_doors.iter().copied())
        .chain(o.doors.iter().copied())
        .chain(o.traps.iter().copied())
        .chain(o.hiding_spots.iter().copied())
        .chain(o.cameras.iter().copied())
        .chain(o.enemy_spawns.iter().copied())
        .chain(o.boss_spawn);
    for p in positions {
        if !bounds.contains(p) {
            return Err(MazeError::OutOfBounds(p).into());
        }
    }

    let graph = plan.build(LevelVersion(doc.version))?;
    Ok(SavedLevel {
        graph,
        objects: doc.objects,
    })
}

fn require_tag(plan: &MazeBuilder, p: Point, tag: Tags, reason: &str) -> Result<(), MazeError> {
    let cell = plan.cell(p).ok_or(MazeError::OutOfBounds(p))?;
    if cell.tags.contains(tag) {
        Ok(())
    } else {
        Err(MazeError::LinkConflict {
            pos: p,
            reason: reason.to_string(),
        })
    }
}

pub fn to_json(graph: &MazeGraph, objects: &ObjectPlacements) -> Result<String, LevelFormatError> {
    Ok(serde_json::to_string_pretty(&to_document(graph, objects))?)
}

pub fn from_json(json: &str) -> Result<SavedLevel, LevelFormatError> {
    from_document(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::generator::generate;

    fn level() -> SavedLevel {
        let mut config = GenerationConfig::campaign(7);
        config.object_density.levers = 1.0;
        generate(&config).unwrap().into()
    }

    #[test]
    fn json_round_trip_is_identical() {
        let saved = level();
        let json = to_json(&saved.graph, &saved.objects).unwrap();
        let back = from_json(&json).unwrap();
        assert_eq!(back, saved);
        assert_eq!(back.graph.version(), LevelVersion::INITIAL);
    }

    #[test]
    fn live_state_survives_a_round_trip() {
        let mut saved = level();
        if !saved.graph.levers().is_empty() {
            saved.graph.toggle_lever(0).unwrap();
        }
        if let Some(&door) = saved.objects.locked_doors.first() {
            saved.graph.unlock_door(door).unwrap();
        }
        let back = from_document(to_document(&saved.graph, &saved.objects)).unwrap();
        assert_eq!(back.graph.version(), saved.graph.version());
        assert_eq!(back.graph, saved.graph);
    }

    #[test]
    fn rejects_foreign_formats_and_bits() {
        let saved = level();
        let mut doc = to_document(&saved.graph, &saved.objects);
        doc.format = 2;
        assert!(matches!(
            from_document(doc.clone()),
            Err(LevelFormatError::UnsupportedFormat(2))
        ));

        doc.format = FORMAT_VERSION;
        doc.cells[5] = 0xF000;
        assert!(matches!(
            from_document(doc),
            Err(LevelFormatError::InvalidCell { index: 5, bits: 0xF000 })
        ));
    }

    #[test]
    fn rejects_broken_links_and_sizes() {
        let saved = level();
        let mut doc = to_document(&saved.graph, &saved.objects);
        doc.locked_doors.push(LockEntry {
            pos: saved.objects.spawn,
            locked: true,
        });
        assert!(matches!(
            from_document(doc),
            Err(LevelFormatError::Maze(MazeError::LinkConflict { .. }))
        ));

        let mut doc = to_document(&saved.graph, &saved.objects);
        doc.cells.pop();
        assert!(matches!(
            from_document(doc),
            Err(LevelFormatError::Maze(MazeError::DimensionMismatch { .. }))
        ));

        let mut doc = to_document(&saved.graph, &saved.objects);
        doc.objects.exit = Point::new(-1, 0);
        assert!(matches!(
            from_document(doc),
            Err(LevelFormatError::Maze(MazeError::OutOfBounds(_)))
        ));

        assert!(matches!(from_json("{"), Err(LevelFormatError::Json(_))));
    }

    #[test]
    fn oversized_dimensions_are_an_error() {
        let saved = level();
        let mut doc = to_document(&saved.graph, &saved.objects);
        doc.width = 2_000_000_000;
        doc.height = 2_000_000_000;
        doc.cells.clear();
        let json = serde_json::to_string(&doc).unwrap();
        assert!(matches!(
            from_json(&json),
            Err(LevelFormatError::Maze(MazeError::DimensionMismatch { .. }))
        ));
    }
}
