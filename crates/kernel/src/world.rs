use std::collections::BTreeMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use simspace_common::{EntityFlags, EntityType, StorageIndex};

use crate::coords::{ChunkCoord, ChunkPosition, WorldGeometry, are_in_same_chunk};
use crate::entity::{EntityReference, LowEntity, SimEntity};

/// Maximum number of entity indices held by one block of a chunk.
pub const ENTITY_BLOCK_CAPACITY: usize = 16;

/// Errors from entity store operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("no entity with storage index {0}")]
    UnknownEntity(StorageIndex),
    #[error("entity {index} is not listed in chunk {chunk:?}")]
    MissingFromChunk { index: StorageIndex, chunk: ChunkCoord },
}

/// An event record produced by every structural mutation of the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    /// A record was created, optionally already placed.
    EntityAdded {
        index: StorageIndex,
        entity_type: EntityType,
        position: Option<ChunkPosition>,
    },
    /// A record changed chunk membership (including entering or leaving space).
    EntityRelocated {
        index: StorageIndex,
        from: Option<ChunkCoord>,
        to: Option<ChunkCoord>,
    },
}

/// A fixed-size run of entity indices inside one chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityBlock {
    indices: Vec<StorageIndex>,
}

impl EntityBlock {
    pub fn indices(&self) -> &[StorageIndex] {
        &self.indices
    }

    pub fn is_full(&self) -> bool {
        self.indices.len() >= ENTITY_BLOCK_CAPACITY
    }
}

/// One cell of the persistent world grid and the records placed in it.
///
/// The first block is the only one that may be partially filled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldChunk {
    coord: ChunkCoord,
    blocks: Vec<EntityBlock>,
}

impl WorldChunk {
    fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            blocks: Vec::new(),
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn blocks(&self) -> &[EntityBlock] {
        &self.blocks
    }

    /// Every index placed in this chunk, block by block.
    pub fn entity_indices(&self) -> impl Iterator<Item = StorageIndex> + '_ {
        self.blocks.iter().flat_map(|b| b.indices.iter().copied())
    }

    pub fn entity_count(&self) -> usize {
        self.blocks.iter().map(|b| b.indices.len()).sum()
    }

    fn insert(&mut self, index: StorageIndex) {
        if self.blocks.first().is_none_or(EntityBlock::is_full) {
            self.blocks.insert(
                0,
                EntityBlock {
                    indices: Vec::with_capacity(ENTITY_BLOCK_CAPACITY),
                },
            );
        }
        self.blocks[0].indices.push(index);
    }

    /// Remove `index`, back-filling the hole from the first block.
    fn remove(&mut self, index: StorageIndex) -> bool {
        let found = self.blocks.iter().enumerate().find_map(|(bi, block)| {
            block
                .indices
                .iter()
                .position(|&i| i == index)
                .map(|si| (bi, si))
        });
        let Some((bi, si)) = found else {
            return false;
        };

        if let Some(last) = self.blocks[0].indices.pop() {
            if last != index {
                self.blocks[bi].indices[si] = last;
            }
        }
        if self.blocks[0].indices.is_empty() && self.blocks.len() > 1 {
            self.blocks.remove(0);
        }
        true
    }
}

/// The persistent world: every long-lived entity record plus the chunk grid
/// that lists which records sit where.
///
/// Chunks live in a BTreeMap so iteration is deterministic across platforms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct World {
    geometry: WorldGeometry,
    /// Record for storage index `i` lives at `low_entities[i - 1]`.
    low_entities: Vec<LowEntity>,
    chunks: BTreeMap<ChunkCoord, WorldChunk>,
    #[serde(skip)]
    event_log: Vec<WorldEvent>,
}

impl World {
    pub fn new(geometry: WorldGeometry) -> Self {
        Self {
            geometry,
            ..Default::default()
        }
    }

    /// Tile and chunk dimensions of this world.
    pub fn geometry(&self) -> &WorldGeometry {
        &self.geometry
    }

    /// Number of stored entity records.
    pub fn low_entity_count(&self) -> usize {
        self.low_entities.len()
    }

    /// Number of chunks that have ever held an entity.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Events recorded since the last drain.
    pub fn events(&self) -> &[WorldEvent] {
        &self.event_log
    }

    /// Take every recorded event, leaving the log empty.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Stored record for `index`.
    pub fn low_entity(&self, index: StorageIndex) -> Result<&LowEntity, WorldError> {
        self.low_entities
            .get(index.as_usize() - 1)
            .ok_or(WorldError::UnknownEntity(index))
    }

    /// Mutable stored record for `index`.
    pub fn low_entity_mut(&mut self, index: StorageIndex) -> Result<&mut LowEntity, WorldError> {
        self.low_entities
            .get_mut(index.as_usize() - 1)
            .ok_or(WorldError::UnknownEntity(index))
    }

    /// All records in storage order.
    pub fn low_entities(&self) -> impl Iterator<Item = (StorageIndex, &LowEntity)> {
        self.low_entities.iter().map(|low| (low.sim.storage_index, low))
    }

    /// Chunk at the given chunk coordinate, if it was ever populated.
    pub fn chunk(&self, chunk_x: i32, chunk_y: i32, chunk_z: i32) -> Option<&WorldChunk> {
        self.chunks.get(&ChunkCoord::new(chunk_x, chunk_y, chunk_z))
    }

    /// Create a record of `entity_type`, placed at `position` if given.
    pub fn add_low_entity(
        &mut self,
        entity_type: EntityType,
        position: Option<ChunkPosition>,
    ) -> StorageIndex {
        let raw = u32::try_from(self.low_entities.len() + 1)
            .expect("entity store exceeded u32 storage indices");
        let Some(index) = StorageIndex::new(raw) else {
            unreachable!("storage indices start at 1");
        };

        let mut sim = SimEntity::new(index, entity_type);
        sim.flags.insert(EntityFlags::NONSPATIAL);
        self.low_entities.push(LowEntity {
            position: None,
            sim,
        });
        self.event_log.push(WorldEvent::EntityAdded {
            index,
            entity_type,
            position,
        });

        if let Some(p) = position {
            self.place(index, None, Some(p));
            self.low_entities[index.as_usize() - 1].position = Some(p);
            self.low_entities[index.as_usize() - 1]
                .sim
                .flags
                .remove(EntityFlags::NONSPATIAL);
        }
        index
    }

    /// Move a record to `new_position`, updating chunk membership.
    ///
    /// A `None` position takes the record out of space and marks it
    /// non-spatial; a `Some` position clears that flag.
    pub fn change_entity_location(
        &mut self,
        index: StorageIndex,
        new_position: Option<ChunkPosition>,
    ) -> Result<(), WorldError> {
        let old_position = self.low_entity(index)?.position;

        let same_chunk = match (&old_position, &new_position) {
            (Some(old), Some(new)) => are_in_same_chunk(old, new),
            (None, None) => true,
            _ => false,
        };
        if !same_chunk {
            if let Some(old) = old_position {
                let chunk = old.chunk_coord();
                let removed = self
                    .chunks
                    .get_mut(&chunk)
                    .is_some_and(|c| c.remove(index));
                if !removed {
                    return Err(WorldError::MissingFromChunk { index, chunk });
                }
            }
            self.place(index, old_position, new_position);
        }

        let low = self.low_entity_mut(index)?;
        low.position = new_position;
        match new_position {
            Some(_) => low.sim.flags.remove(EntityFlags::NONSPATIAL),
            None => low.sim.flags.insert(EntityFlags::NONSPATIAL),
        }
        Ok(())
    }

    fn place(
        &mut self,
        index: StorageIndex,
        from: Option<ChunkPosition>,
        to: Option<ChunkPosition>,
    ) {
        if let Some(p) = to {
            let coord = p.chunk_coord();
            self.chunks
                .entry(coord)
                .or_insert_with(|| WorldChunk::new(coord))
                .insert(index);
        }
        let from = from.map(|p| p.chunk_coord());
        let to = to.map(|p| p.chunk_coord());
        tracing::trace!(%index, ?from, ?to, "entity changed chunk");
        self.event_log.push(WorldEvent::EntityRelocated { index, from, to });
    }

    // --- authoring helpers ---

    pub fn add_wall(&mut self, tile_x: i32, tile_y: i32, tile_z: i32) -> StorageIndex {
        let p = self.geometry.chunk_position_from_tile(tile_x, tile_y, tile_z);
        let side = self.geometry.tile_side_in_meters;
        let index = self.add_low_entity(EntityType::Wall, Some(p));
        let sim = &mut self.low_entities[index.as_usize() - 1].sim;
        sim.width = side;
        sim.height = side;
        sim.flags.insert(EntityFlags::COLLIDES);
        index
    }

    /// A hero with its own (initially unplaced) sword.
    pub fn add_hero(&mut self, position: ChunkPosition) -> StorageIndex {
        let index = self.add_low_entity(EntityType::Hero, Some(position));
        let sword = self.add_sword();
        let sim = &mut self.low_entities[index.as_usize() - 1].sim;
        sim.width = 1.0;
        sim.height = 0.5;
        sim.hit_point_max = 3;
        sim.flags.insert(EntityFlags::COLLIDES);
        sim.sword = EntityReference::to(sword);
        index
    }

    pub fn add_sword(&mut self) -> StorageIndex {
        let index = self.add_low_entity(EntityType::Sword, None);
        let sim = &mut self.low_entities[index.as_usize() - 1].sim;
        sim.width = 1.0;
        sim.height = 0.5;
        index
    }

    pub fn add_monster(&mut self, position: ChunkPosition) -> StorageIndex {
        let index = self.add_low_entity(EntityType::Monster, Some(position));
        let sim = &mut self.low_entities[index.as_usize() - 1].sim;
        sim.width = 1.0;
        sim.height = 0.5;
        sim.hit_point_max = 3;
        sim.flags.insert(EntityFlags::COLLIDES);
        index
    }

    pub fn add_familiar(&mut self, position: ChunkPosition) -> StorageIndex {
        let index = self.add_low_entity(EntityType::Familiar, Some(position));
        let sim = &mut self.low_entities[index.as_usize() - 1].sim;
        sim.width = 1.0;
        sim.height = 0.5;
        sim.flags.insert(EntityFlags::COLLIDES);
        index
    }

    /// Deterministic hash of every record, in storage order.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325; // FNV offset basis
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        let mix_vec = |h: &mut u64, v: Vec2| {
            mix(h, &v.x.to_le_bytes());
            mix(h, &v.y.to_le_bytes());
        };
        for low in &self.low_entities {
            mix(&mut h, &low.sim.storage_index.get().to_le_bytes());
            mix(&mut h, &[low.sim.entity_type as u8, low.sim.facing as u8]);
            mix(&mut h, &low.sim.flags.bits().to_le_bytes());
            mix(&mut h, &low.sim.hit_point_max.to_le_bytes());
            mix_vec(&mut h, low.sim.velocity);
            mix(&mut h, &low.sim.distance_limit.to_le_bytes());
            if let Some(p) = low.position {
                mix(&mut h, &p.chunk_x.to_le_bytes());
                mix(&mut h, &p.chunk_y.to_le_bytes());
                mix(&mut h, &p.chunk_z.to_le_bytes());
                mix_vec(&mut h, p.offset);
            }
        }
        h
    }
}
