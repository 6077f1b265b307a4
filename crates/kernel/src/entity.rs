use glam::Vec2;
use serde::{Deserialize, Serialize};
use simspace_common::{EntityFlags, EntityType, FacingDirection, INVALID_POSITION, StorageIndex};

use crate::coords::{ChunkPosition, WorldGeometry};

/// Slot of an entity inside the entity array of one simulation region.
///
/// Only meaningful while that region is alive; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle(usize);

impl EntityHandle {
    pub fn new(slot: usize) -> Self {
        Self(slot)
    }

    pub fn slot(self) -> usize {
        self.0
    }
}

/// A link from one entity to another.
///
/// Stored records carry only the stable `index`. Inside a region the link is
/// also resolved to a `handle`, which is dropped again before the record is
/// written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityReference {
    pub index: Option<StorageIndex>,
    #[serde(skip)]
    pub handle: Option<EntityHandle>,
}

impl EntityReference {
    pub fn to(index: StorageIndex) -> Self {
        Self {
            index: Some(index),
            handle: None,
        }
    }

    pub fn is_set(&self) -> bool {
        self.index.is_some()
    }
}

/// Simulation state of one entity.
///
/// The persistent store keeps a copy of this as the record's snapshot; a
/// region works on its own copy for the duration of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEntity {
    pub storage_index: StorageIndex,
    pub entity_type: EntityType,
    pub flags: EntityFlags,

    /// Sim-space position relative to the owning region's origin.
    pub position: Vec2,
    pub velocity: Vec2,
    /// Height above the ground plane.
    pub z: f32,
    pub dz: f32,

    pub width: f32,
    pub height: f32,

    pub facing: FacingDirection,
    /// Remaining travel budget; zero means unlimited.
    pub distance_limit: f32,
    pub hit_point_max: u32,

    pub sword: EntityReference,

    /// Inside the region's update bounds. Region-local.
    #[serde(skip)]
    pub updatable: bool,
}

impl SimEntity {
    pub fn new(storage_index: StorageIndex, entity_type: EntityType) -> Self {
        Self {
            storage_index,
            entity_type,
            flags: EntityFlags::NONE,
            position: INVALID_POSITION,
            velocity: Vec2::ZERO,
            z: 0.0,
            dz: 0.0,
            width: 0.0,
            height: 0.0,
            facing: FacingDirection::default(),
            distance_limit: 0.0,
            hit_point_max: 0,
            sword: EntityReference::default(),
            updatable: false,
        }
    }

    pub fn is_set(&self, flag: EntityFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn is_spatial(&self) -> bool {
        !self.is_set(EntityFlags::NONSPATIAL)
    }

    pub fn make_nonspatial(&mut self) {
        self.flags.insert(EntityFlags::NONSPATIAL);
        self.position = INVALID_POSITION;
    }

    pub fn make_spatial(&mut self, position: Vec2, velocity: Vec2) {
        self.flags.remove(EntityFlags::NONSPATIAL);
        self.position = position;
        self.velocity = velocity;
    }
}

/// A long-lived record in the persistent entity store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowEntity {
    /// `None` for records that are not placed in any chunk.
    pub position: Option<ChunkPosition>,
    pub sim: SimEntity,
}

impl LowEntity {
    /// Position of this record relative to `origin`, or `None` when the record
    /// is non-spatial or unplaced.
    pub fn sim_space_position(
        &self,
        geometry: &WorldGeometry,
        origin: &ChunkPosition,
    ) -> Option<Vec2> {
        if !self.sim.is_spatial() {
            return None;
        }
        self.position
            .as_ref()
            .map(|p| geometry.subtract(p, origin).dxy)
    }

    pub fn is_simming(&self) -> bool {
        self.sim.is_set(EntityFlags::SIMMING)
    }
}
