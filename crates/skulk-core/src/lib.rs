//! **skulk-core** — Core types for the skulk navigation stack.
//!
//! This crate provides the foundational types shared by the generator and
//! the pathfinder: geometry primitives, per-cell terrain and tags, agent
//! capabilities, and the versioned [`MazeGraph`].

pub mod cell;
pub mod geom;
pub mod maze;

pub use cell::{Capabilities, Cell, Tags, Terrain};
pub use geom::{Point, Range};
pub use maze::{
    Concern, LevelVersion, Lever, MazeBuilder, MazeError, MazeGraph, Movement, Mutation,
    MutationKind, Step, DIAGONAL_COST, STEP_COST,
};
