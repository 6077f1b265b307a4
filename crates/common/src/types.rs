use std::num::NonZeroU32;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Sim-space position handed out for entities that have no place in space.
///
/// Far enough outside any realistic region that it never lands inside bounds.
pub const INVALID_POSITION: Vec2 = Vec2::new(100_000.0, 100_000.0);

/// Stable identity of a persistent entity record.
///
/// Zero is reserved as the "empty" marker of the region hash table, so it can
/// never name a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct StorageIndex(NonZeroU32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("storage index 0 is reserved")]
pub struct ZeroStorageIndex;

impl StorageIndex {
    pub fn new(index: u32) -> Option<Self> {
        NonZeroU32::new(index).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    pub fn as_usize(self) -> usize {
        self.0.get() as usize
    }
}

impl TryFrom<u32> for StorageIndex {
    type Error = ZeroStorageIndex;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(ZeroStorageIndex)
    }
}

impl From<StorageIndex> for u32 {
    fn from(index: StorageIndex) -> Self {
        index.get()
    }
}

impl std::fmt::Display for StorageIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bit set of per-entity flags shared by the stored and simulated copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EntityFlags(u32);

impl EntityFlags {
    pub const NONE: Self = Self(0);
    /// Other movers stop against this entity; when set on the mover it also
    /// strips velocity along the contact normal.
    pub const COLLIDES: Self = Self(1 << 1);
    /// The entity has no meaningful position (picked up, spent, removed).
    pub const NONSPATIAL: Self = Self(1 << 2);
    /// Set on the stored record while a region holds a live copy of it.
    pub const SIMMING: Self = Self(1 << 30);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for EntityFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Entity kinds. The declaration order is the canonical order used when a
/// colliding pair is sorted before dispatch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum EntityType {
    #[default]
    Null,
    Hero,
    Wall,
    Familiar,
    Monster,
    Sword,
}

/// One of four cardinal facings, numbered counter-clockwise from +X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum FacingDirection {
    #[default]
    Right = 0,
    Up = 1,
    Left = 2,
    Down = 3,
}
