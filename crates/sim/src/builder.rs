use glam::Vec2;
use simspace_common::{EntityFlags, Rect2, StorageIndex};
use simspace_kernel::{ChunkPosition, World};

use crate::config::SimConfig;
use crate::region::{SimArena, SimRegion, stored, stored_mut};

/// Where the view is, and which entity (if any) it tracks.
///
/// Updated by [`end_simulation`] when the followed entity is flushed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Camera {
    pub following: Option<StorageIndex>,
    pub position: ChunkPosition,
    /// Keeps the camera on this chunk layer regardless of the followed entity.
    pub pinned_chunk_z: Option<i32>,
}

impl Camera {
    pub fn following(index: StorageIndex, position: ChunkPosition) -> Self {
        Self {
            following: Some(index),
            position,
            pinned_chunk_z: None,
        }
    }

    fn track(&mut self, target: ChunkPosition) {
        let chunk_z = self.pinned_chunk_z.unwrap_or(target.chunk_z);
        self.position = ChunkPosition { chunk_z, ..target };
    }
}

/// Build a region around `origin` from every spatial record whose position
/// falls inside the load bounds.
///
/// Records outside the load bounds, and non-spatial ones, are left alone;
/// the latter can still be pulled in through references.
pub fn begin_simulation<'a>(
    arena: &'a mut SimArena,
    world: &mut World,
    config: &SimConfig,
    origin: ChunkPosition,
    update_bounds: Rect2,
) -> SimRegion<'a> {
    let _span = tracing::info_span!("begin_simulation").entered();

    let mut region = SimRegion::new(arena, config, origin, update_bounds);
    let geometry = *world.geometry();
    let bounds = region.bounds();

    let min_chunk = geometry.map_into_chunk_space(origin, bounds.min);
    let max_chunk = geometry.map_into_chunk_space(origin, bounds.max);

    let mut candidates: Vec<(StorageIndex, Vec2)> = Vec::new();
    for chunk_y in min_chunk.chunk_y..=max_chunk.chunk_y {
        for chunk_x in min_chunk.chunk_x..=max_chunk.chunk_x {
            let Some(chunk) = world.chunk(chunk_x, chunk_y, origin.chunk_z) else {
                continue;
            };
            candidates.extend(chunk.entity_indices().filter_map(|index| {
                let low = stored(world, index);
                let p = low.sim_space_position(&geometry, &origin)?;
                bounds.contains(p).then_some((index, p))
            }));
        }
    }

    for (index, p) in candidates {
        region.add(Some(&mut *world), index, Some(p));
    }

    tracing::debug!(
        loaded = region.entity_count(),
        updatable = region.updatable_count(),
        chunks_x = max_chunk.chunk_x - min_chunk.chunk_x + 1,
        chunks_y = max_chunk.chunk_y - min_chunk.chunk_y + 1,
        "sim region populated"
    );
    region
}

/// Write every entity of `region` back to `world` and move it to its new chunk.
///
/// Returns the number of records flushed.
///
/// # Panics
/// If an entity's stored record is not marked as simulating.
pub fn end_simulation(region: SimRegion<'_>, world: &mut World, camera: &mut Camera) -> usize {
    let _span = tracing::info_span!("end_simulation").entered();

    let geometry = *world.geometry();
    let origin = region.origin();

    for entity in region.entities() {
        let index = entity.storage_index;

        let mut snapshot = entity.clone();
        snapshot.flags.remove(EntityFlags::SIMMING);
        snapshot.updatable = false;
        region.store_entity_reference(&mut snapshot.sword);

        let new_position = snapshot
            .is_spatial()
            .then(|| geometry.map_into_chunk_space(origin, snapshot.position));

        let low = stored_mut(world, index);
        assert!(
            low.is_simming(),
            "entity {index} flushed without being marked simming"
        );
        low.sim = snapshot;

        if let Err(e) = world.change_entity_location(index, new_position) {
            panic!("end_simulation: {e}");
        }

        if camera.following == Some(index) {
            if let Some(p) = new_position {
                camera.track(p);
                tracing::debug!(?p, "camera follows {index}");
            }
        }
    }

    region.entity_count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use simspace_common::{EntityType, INVALID_POSITION};
    use simspace_kernel::WorldGeometry;

    fn config() -> SimConfig {
        SimConfig {
            max_entity_count: 64,
            hash_size: 128,
            ..SimConfig::default()
        }
    }

    fn geometry() -> WorldGeometry {
        WorldGeometry {
            tile_side_in_meters: 1.0,
            tiles_per_chunk: 10,
        }
    }

    fn at(chunk_x: i32, chunk_y: i32, x: f32, y: f32) -> ChunkPosition {
        ChunkPosition::new(chunk_x, chunk_y, 0, Vec2::new(x, y))
    }

    fn update_bounds() -> Rect2 {
        Rect2::from_center_dim(Vec2::ZERO, Vec2::new(16.0, 8.0))
    }

    fn begin<'a>(
        arena: &'a mut SimArena,
        world: &mut World,
        config: &SimConfig,
        origin: ChunkPosition,
    ) -> SimRegion<'a> {
        begin_simulation(arena, world, config, origin, update_bounds())
    }

    #[test]
    fn sweep_loads_entities_inside_bounds_only() {
        let config = config();
        let mut world = World::new(geometry());
        let near = world.add_monster(at(0, 0, 3.0, 1.0));
        let margin = world.add_monster(at(1, 0, -1.5, 0.0)); // x = 8.5, inside the 1m margin
        let far = world.add_monster(at(3, 0, 0.0, 0.0));
        let other_layer = world.add_monster(ChunkPosition::new(0, 0, 1, Vec2::ZERO));

        let mut arena = SimArena::new(&config);
        let region = begin(&mut arena, &mut world, &config, at(0, 0, 0.0, 0.0));

        assert_eq!(region.entity_count(), 2);
        let h_near = region.get_entity_by_storage_index(near).unwrap();
        let h_margin = region.get_entity_by_storage_index(margin).unwrap();
        assert!(region.entity(h_near).updatable);
        assert!(!region.entity(h_margin).updatable);
        assert!((region.entity(h_margin).position.x - 8.5).abs() < 1e-5);
        assert!(region.get_entity_by_storage_index(far).is_none());
        assert!(region.get_entity_by_storage_index(other_layer).is_none());
    }

    #[test]
    fn sweep_skips_nonspatial_but_references_pull_them_in() {
        let config = config();
        let mut world = World::new(geometry());
        let hero = world.add_hero(at(0, 0, 0.0, 0.0));
        let sword = world.low_entity(hero).unwrap().sim.sword.index.unwrap();
        let loose_sword = world.add_sword();

        let mut arena = SimArena::new(&config);
        let region = begin(&mut arena, &mut world, &config, at(0, 0, 0.0, 0.0));

        assert!(region.get_entity_by_storage_index(loose_sword).is_none());
        let h = region.get_entity_by_storage_index(sword).unwrap();
        assert_eq!(region.entity(h).position, INVALID_POSITION);
        assert!(!world.low_entity(loose_sword).unwrap().is_simming());
    }

    #[test]
    fn origin_offset_shifts_sim_positions() {
        let config = config();
        let mut world = World::new(geometry());
        let id = world.add_monster(at(5, 5, 2.0, -1.0));

        let mut arena = SimArena::new(&config);
        let region = begin(&mut arena, &mut world, &config, at(5, 5, 1.0, 0.0));
        let h = region.get_entity_by_storage_index(id).unwrap();
        assert!((region.entity(h).position - Vec2::new(1.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn end_clears_simming_and_relocates() {
        let config = config();
        let mut world = World::new(geometry());
        let id = world.add_monster(at(0, 0, 3.0, 0.0));
        let mut camera = Camera::default();

        let mut arena = SimArena::new(&config);
        let mut region = begin(&mut arena, &mut world, &config, at(0, 0, 0.0, 0.0));
        assert!(world.low_entity(id).unwrap().is_simming());

        let h = region.get_entity_by_storage_index(id).unwrap();
        region.entity_mut(h).position = Vec2::new(7.0, 0.0);
        region.entity_mut(h).hit_point_max = 1;

        let flushed = end_simulation(region, &mut world, &mut camera);
        assert_eq!(flushed, 1);

        let low = world.low_entity(id).unwrap();
        assert!(!low.is_simming());
        assert_eq!(low.sim.hit_point_max, 1);
        let p = low.position.unwrap();
        assert_eq!((p.chunk_x, p.chunk_y), (1, 0));
        assert!((p.offset.x + 3.0).abs() < 1e-5);
        assert_eq!(world.chunk(0, 0, 0).unwrap().entity_count(), 0);
        assert_eq!(world.chunk(1, 0, 0).unwrap().entity_count(), 1);
    }

    #[test]
    fn end_unplaces_nonspatial_entities() {
        let config = config();
        let mut world = World::new(geometry());
        let id = world.add_monster(at(0, 0, 0.0, 0.0));
        let mut camera = Camera::default();

        let mut arena = SimArena::new(&config);
        let mut region = begin(&mut arena, &mut world, &config, at(0, 0, 0.0, 0.0));
        let h = region.get_entity_by_storage_index(id).unwrap();
        region.make_entity_nonspatial(h);
        end_simulation(region, &mut world, &mut camera);

        let low = world.low_entity(id).unwrap();
        assert!(low.position.is_none());
        assert!(low.sim.is_set(EntityFlags::NONSPATIAL));
        assert_eq!(world.chunk(0, 0, 0).unwrap().entity_count(), 0);
    }

    #[test]
    fn end_collapses_references() {
        let config = config();
        let mut world = World::new(geometry());
        let hero = world.add_hero(at(0, 0, 0.0, 0.0));
        let sword = world.low_entity(hero).unwrap().sim.sword.index.unwrap();
        let mut camera = Camera::default();

        let mut arena = SimArena::new(&config);
        let region = begin(&mut arena, &mut world, &config, at(0, 0, 0.0, 0.0));
        assert_eq!(end_simulation(region, &mut world, &mut camera), 2);

        let stored_ref = world.low_entity(hero).unwrap().sim.sword;
        assert_eq!(stored_ref.index, Some(sword));
        assert_eq!(stored_ref.handle, None);
        assert!(!world.low_entity(sword).unwrap().is_simming());
        assert!(world.low_entity(sword).unwrap().position.is_none());
    }

    #[test]
    fn camera_follows_target_and_respects_pinned_layer() {
        let config = config();
        let mut world = World::new(geometry());
        let hero = world.add_hero(at(0, 0, 0.0, 0.0));
        let mut camera = Camera::following(hero, at(0, 0, 0.0, 0.0));
        camera.pinned_chunk_z = Some(4);

        let mut arena = SimArena::new(&config);
        let mut region = begin(&mut arena, &mut world, &config, at(0, 0, 0.0, 0.0));
        let h = region.get_entity_by_storage_index(hero).unwrap();
        region.entity_mut(h).position = Vec2::new(6.0, 0.0);
        end_simulation(region, &mut world, &mut camera);

        assert_eq!(camera.position.chunk_x, 1);
        assert_eq!(camera.position.chunk_z, 4);
        assert!((camera.position.offset.x + 4.0).abs() < 1e-5);

        camera.pinned_chunk_z = None;
        let region = begin(&mut arena, &mut world, &config, at(1, 0, -4.0, 0.0));
        end_simulation(region, &mut world, &mut camera);
        assert_eq!(camera.position.chunk_z, 0);
    }

    #[test]
    #[should_panic(expected = "without being marked simming")]
    fn flushing_unmarked_entity_is_fatal() {
        let config = config();
        let mut world = World::new(geometry());
        let id = world.add_monster(at(0, 0, 0.0, 0.0));
        let mut camera = Camera::default();

        let mut arena = SimArena::new(&config);
        let mut region = SimRegion::new(&mut arena, &config, at(0, 0, 0.0, 0.0), update_bounds());
        // Inserted without a source, so the stored record was never marked.
        region.add(None, id, Some(Vec2::ZERO));
        end_simulation(region, &mut world, &mut camera);
    }

    #[test]
    fn frames_round_trip_positions() {
        let config = config();
        let mut world = World::new(geometry());
        let id = world.add_familiar(at(0, 0, 2.25, -3.5));
        let before = world.low_entity(id).unwrap().position.unwrap();
        let mut camera = Camera::default();
        let mut arena = SimArena::new(&config);

        for _ in 0..3 {
            let region = begin(&mut arena, &mut world, &config, at(0, 0, 0.0, 0.0));
            end_simulation(region, &mut world, &mut camera);
        }
        let after = world.low_entity(id).unwrap();
        let p = after.position.unwrap();
        assert_eq!(p.chunk_coord(), before.chunk_coord());
        assert!((p.offset - before.offset).length() < 1e-5);
        assert_eq!(after.sim.entity_type, EntityType::Familiar);
    }
}
