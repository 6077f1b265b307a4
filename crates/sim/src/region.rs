use glam::Vec2;
use simspace_common::{EntityFlags, EntityType, INVALID_POSITION, Rect2, StorageIndex};
use simspace_kernel::{ChunkPosition, EntityHandle, EntityReference, LowEntity, SimEntity, World};

use crate::config::SimConfig;

/// One slot of the storage-index hash table. An empty `index` marks a free slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HashSlot {
    pub index: Option<StorageIndex>,
    pub handle: Option<EntityHandle>,
}

/// Backing memory for simulation regions.
///
/// Owned by the driving loop and lent to one region at a time. Storage is
/// reserved once up front; starting a new region wipes it wholesale, which is
/// the only way anything in it is ever freed.
#[derive(Debug)]
pub struct SimArena {
    entities: Vec<SimEntity>,
    hash: Vec<HashSlot>,
}

impl SimArena {
    pub fn new(config: &SimConfig) -> Self {
        assert!(
            config.hash_size.is_power_of_two(),
            "hash_size must be a power of two"
        );
        Self {
            entities: Vec::with_capacity(config.max_entity_count),
            hash: vec![HashSlot::default(); config.hash_size],
        }
    }

    fn reset(&mut self) {
        self.entities.clear();
        self.hash.fill(HashSlot::default());
    }
}

/// The bounded working set of entities simulated in one step.
///
/// Entities are copies of persistent records, addressed by [`EntityHandle`]
/// for the lifetime of the region and by [`StorageIndex`] through the hash
/// table. Handles are slots in the entity array, so they stay valid until the
/// region is dropped.
#[derive(Debug)]
pub struct SimRegion<'a> {
    origin: ChunkPosition,
    update_bounds: Rect2,
    bounds: Rect2,
    pub(crate) config: SimConfig,
    entities: &'a mut Vec<SimEntity>,
    hash: &'a mut [HashSlot],
}

impl<'a> SimRegion<'a> {
    /// An empty region over `arena`. Load bounds are the update bounds grown
    /// by the configured safety margin.
    pub fn new(
        arena: &'a mut SimArena,
        config: &SimConfig,
        origin: ChunkPosition,
        update_bounds: Rect2,
    ) -> Self {
        arena.reset();
        let margin = config.update_safety_margin;
        Self {
            origin,
            update_bounds,
            bounds: update_bounds.add_radius(Vec2::splat(margin)),
            config: *config,
            entities: &mut arena.entities,
            hash: &mut arena.hash,
        }
    }

    /// World position that sim-space `(0, 0)` maps to.
    pub fn origin(&self) -> ChunkPosition {
        self.origin
    }

    /// Entities inside this rectangle are updated this frame.
    pub fn update_bounds(&self) -> Rect2 {
        self.update_bounds
    }

    /// Update bounds grown by the safety margin; everything inside is loaded.
    pub fn bounds(&self) -> Rect2 {
        self.bounds
    }

    /// Maximum number of entities the region can hold.
    pub fn capacity(&self) -> usize {
        self.config.max_entity_count
    }

    /// Number of entities loaded so far.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Loaded entities in insertion order.
    pub fn entities(&self) -> &[SimEntity] {
        self.entities
    }

    pub(crate) fn entities_mut(&mut self) -> &mut [SimEntity] {
        self.entities
    }

    /// Entity behind `handle`. Panics if the handle is out of range.
    pub fn entity(&self, handle: EntityHandle) -> &SimEntity {
        &self.entities[handle.slot()]
    }

    /// Mutable entity behind `handle`.
    pub fn entity_mut(&mut self, handle: EntityHandle) -> &mut SimEntity {
        &mut self.entities[handle.slot()]
    }

    /// Handles of every entity currently in the region, in array order.
    pub fn handles(&self) -> impl Iterator<Item = EntityHandle> + use<> {
        (0..self.entities.len()).map(EntityHandle::new)
    }

    /// Handles of entities inside the update bounds.
    pub fn updatable_handles(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.updatable)
            .map(|(slot, _)| EntityHandle::new(slot))
    }

    pub fn updatable_count(&self) -> usize {
        self.entities.iter().filter(|e| e.updatable).count()
    }

    /// Linear probe for `storage_index`: the slot holding it, or the first
    /// empty slot on its probe path.
    fn probe(&self, storage_index: StorageIndex) -> usize {
        let mask = self.hash.len() - 1;
        let hash_value = storage_index.as_usize();
        for offset in 0..self.hash.len() {
            let slot = (hash_value + offset) & mask;
            match self.hash[slot].index {
                None => return slot,
                Some(i) if i == storage_index => return slot,
                Some(_) => {}
            }
        }
        panic!(
            "sim region hash table is full ({} slots) looking up {storage_index}",
            self.hash.len()
        );
    }

    /// The hash slot for `storage_index`, ready to be filled if it is empty.
    pub fn lookup(&mut self, storage_index: StorageIndex) -> &mut HashSlot {
        let slot = self.probe(storage_index);
        &mut self.hash[slot]
    }

    pub fn get_entity_by_storage_index(&self, storage_index: StorageIndex) -> Option<EntityHandle> {
        self.hash[self.probe(storage_index)].handle
    }

    /// Insert the entity for `storage_index`, or return the one already here.
    ///
    /// With a `source` world the stored snapshot is copied in, its sword
    /// reference resolved and the stored record marked as simulating.
    pub fn add_raw(
        &mut self,
        source: Option<&mut World>,
        storage_index: StorageIndex,
    ) -> EntityHandle {
        self.insert(source, storage_index).0
    }

    /// [`add_raw`](Self::add_raw), then place the entity.
    ///
    /// An explicit `sim_position` is used as is; otherwise the position is
    /// derived from the stored chunk position. Either way `updatable` is set
    /// from membership in the update bounds. Entities already present are
    /// returned untouched.
    pub fn add(
        &mut self,
        mut source: Option<&mut World>,
        storage_index: StorageIndex,
        sim_position: Option<Vec2>,
    ) -> EntityHandle {
        let (handle, inserted) = self.insert(source.as_deref_mut(), storage_index);
        if !inserted {
            return handle;
        }

        let position = sim_position.or_else(|| {
            let world = source?;
            let geometry = *world.geometry();
            stored(world, storage_index).sim_space_position(&geometry, &self.origin)
        });

        let update_bounds = self.update_bounds;
        let entity = self.entity_mut(handle);
        match position {
            Some(p) => {
                entity.position = p;
                entity.updatable = update_bounds.contains(p);
            }
            None => {
                entity.position = INVALID_POSITION;
                entity.updatable = false;
            }
        }
        handle
    }

    fn insert(
        &mut self,
        source: Option<&mut World>,
        storage_index: StorageIndex,
    ) -> (EntityHandle, bool) {
        let slot = self.probe(storage_index);
        if let Some(existing) = self.hash[slot].handle {
            return (existing, false);
        }
        assert!(
            self.entities.len() < self.config.max_entity_count,
            "sim region capacity ({}) exceeded adding {storage_index}",
            self.config.max_entity_count
        );

        let handle = EntityHandle::new(self.entities.len());
        self.hash[slot] = HashSlot {
            index: Some(storage_index),
            handle: Some(handle),
        };

        match source {
            Some(world) => {
                let low = stored_mut(world, storage_index);
                assert!(
                    !low.is_simming(),
                    "entity {storage_index} is already being simulated"
                );
                let mut entity = low.sim.clone();
                low.sim.flags.insert(EntityFlags::SIMMING);

                entity.storage_index = storage_index;
                entity.updatable = false;
                self.entities.push(entity);

                let mut sword = self.entities[handle.slot()].sword;
                self.load_entity_reference(world, &mut sword);
                self.entities[handle.slot()].sword = sword;
            }
            None => {
                self.entities
                    .push(SimEntity::new(storage_index, EntityType::Null));
            }
        }
        (handle, true)
    }

    /// Bind `reference` to its target, pulling the target in from `world`
    /// if it is not resident yet.
    pub fn load_entity_reference(&mut self, world: &mut World, reference: &mut EntityReference) {
        if let Some(index) = reference.index {
            let handle = match self.get_entity_by_storage_index(index) {
                Some(handle) => handle,
                None => self.add(Some(world), index, None),
            };
            reference.handle = Some(handle);
        }
    }

    /// Collapse `reference` back to a storage index for persistence.
    pub fn store_entity_reference(&self, reference: &mut EntityReference) {
        reference.index = reference
            .handle
            .take()
            .map(|h| self.entities[h.slot()].storage_index);
    }

    pub fn make_entity_nonspatial(&mut self, handle: EntityHandle) {
        self.entity_mut(handle).make_nonspatial();
    }

    /// Put an entity back into space. It stays non-updatable until the next
    /// region picks it up.
    pub fn make_entity_spatial(&mut self, handle: EntityHandle, position: Vec2, velocity: Vec2) {
        self.entity_mut(handle).make_spatial(position, velocity);
    }
}

pub(crate) fn stored(world: &World, index: StorageIndex) -> &LowEntity {
    match world.low_entity(index) {
        Ok(low) => low,
        Err(e) => panic!("sim region: {e}"),
    }
}

pub(crate) fn stored_mut(world: &mut World, index: StorageIndex) -> &mut LowEntity {
    match world.low_entity_mut(index) {
        Ok(low) => low,
        Err(e) => panic!("sim region: {e}"),
    }
}
