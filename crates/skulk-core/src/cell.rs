//! Per-cell state: [`Terrain`], feature [`Tags`] and agent [`Capabilities`].

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Static terrain of a cell.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Terrain {
    #[default]
    Wall,
    Floor,
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Bitmask of features present on a cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tags(pub u16);

impl Tags {
    pub const NONE: Self = Self(0);
    /// Plain door. Any agent opens it, so it never blocks planning.
    pub const DOOR: Self = Self(1 << 0);
    /// Door whose lock state lives in the maze's locked-door table.
    pub const LOCKED_DOOR: Self = Self(1 << 1);
    /// Gate opened and closed by a lever.
    pub const LEVER_GATE: Self = Self(1 << 2);
    pub const KEY: Self = Self(1 << 3);
    pub const TRAP: Self = Self(1 << 4);
    pub const HIDING_SPOT: Self = Self(1 << 5);
    pub const CAMERA: Self = Self(1 << 6);
    pub const BOSS_BUTTON: Self = Self(1 << 7);
    pub const SPAWN: Self = Self(1 << 8);
    pub const EXIT: Self = Self(1 << 9);
    /// Lever controlling one or more gates.
    pub const LEVER: Self = Self(1 << 10);

    /// Every defined tag bit.
    pub const ALL: Self = Self((1 << 11) - 1);

    /// Tags marking objectives that must stay reachable from spawn.
    pub const OBJECTIVES: Self = Self(Self::KEY.0 | Self::EXIT.0 | Self::BOSS_BUTTON.0 | Self::LEVER.0);

    /// Whether this mask contains all the bits from `other`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Whether this mask shares at least one bit with `other`.
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for Tags {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Tags {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Tags {
    type Output = Self;
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Per-agent traversal permissions.
///
/// Capabilities decide which edges an agent may use. They never change
/// the cost of an edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Capabilities(pub u8);

impl Capabilities {
    pub const NONE: Self = Self(0);
    /// May pass locked doors.
    pub const CAN_UNLOCK: Self = Self(1 << 0);
    /// May pass closed lever gates.
    pub const CAN_PASS_GATES: Self = Self(1 << 1);
    /// Refuses to step on traps.
    pub const AVOID_TRAPS: Self = Self(1 << 2);

    /// Everything that opens edges; the "all features permeable" view.
    pub const PERMEATE_ALL: Self = Self(Self::CAN_UNLOCK.0 | Self::CAN_PASS_GATES.0);

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Capabilities {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for Capabilities {
    type Output = Self;
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::CAN_UNLOCK, "unlock"),
            (Self::CAN_PASS_GATES, "gates"),
            (Self::AVOID_TRAPS, "avoid-traps"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str("+")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// Terrain plus tags for one grid position.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Cell {
    pub terrain: Terrain,
    pub tags: Tags,
}

impl Cell {
    pub const WALL: Self = Self {
        terrain: Terrain::Wall,
        tags: Tags::NONE,
    };

    pub const FLOOR: Self = Self {
        terrain: Terrain::Floor,
        tags: Tags::NONE,
    };

    #[inline]
    pub fn is_floor(self) -> bool {
        self.terrain == Terrain::Floor
    }

    /// Pack into the persisted bitfield: bit 0 is floor, tags follow.
    #[inline]
    pub fn to_bits(self) -> u16 {
        let floor = u16::from(self.is_floor());
        (self.tags.0 << 1) | floor
    }

    /// Unpack a persisted bitfield. Returns `None` when unknown bits are set.
    pub fn from_bits(bits: u16) -> Option<Self> {
        let tags = Tags(bits >> 1);
        if tags.without(Tags::ALL) != Tags::NONE {
            return None;
        }
        let terrain = if bits & 1 == 1 {
            Terrain::Floor
        } else {
            Terrain::Wall
        };
        Some(Self { terrain, tags })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_mask_ops() {
        let t = Tags::KEY | Tags::TRAP;
        assert!(t.contains(Tags::KEY));
        assert!(!t.contains(Tags::EXIT));
        assert!(t.intersects(Tags::OBJECTIVES));
        assert_eq!(t.without(Tags::KEY), Tags::TRAP);
        assert_eq!(t & Tags::TRAP, Tags::TRAP);
    }

    #[test]
    fn capabilities_display() {
        assert_eq!(Capabilities::NONE.to_string(), "none");
        assert_eq!(Capabilities::PERMEATE_ALL.to_string(), "unlock+gates");
    }

    #[test]
    fn cell_bits_round_trip() {
        let c = Cell {
            terrain: Terrain::Floor,
            tags: Tags::LOCKED_DOOR | Tags::EXIT,
        };
        assert_eq!(Cell::from_bits(c.to_bits()), Some(c));
        assert_eq!(Cell::from_bits(0), Some(Cell::WALL));
    }

    #[test]
    fn cell_bits_reject_unknown() {
        assert_eq!(Cell::from_bits(1 << 15), None);
    }
}
