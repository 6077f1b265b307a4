use std::fmt;
use std::time::{Duration, Instant};

use glam::Vec2;
use simspace_common::{EntityType, Rect2, StorageIndex};
use simspace_kernel::{ChunkPosition, EntityHandle, World, WorldEvent};

use crate::builder::{Camera, begin_simulation, end_simulation};
use crate::config::{ConfigError, SimConfig};
use crate::movement::{MoveSpec, move_entity};
use crate::region::{SimArena, SimRegion};

/// Update bounds span this many tiles around the camera.
const UPDATE_TILES: Vec2 = Vec2::new(17.0 * 3.0, 9.0 * 3.0);

const HERO_MOVE: MoveSpec = MoveSpec {
    speed: 50.0,
    drag: 8.0,
    unit_max_accel_vector: true,
};
const HERO_JUMP_SPEED: f32 = 3.0;

const SWORD_SPEED: f32 = 5.0;
const SWORD_RANGE: f32 = 5.0;
/// Distance from the hero's center at which a thrown sword appears.
const SWORD_SPAWN_OFFSET: f32 = 1.5;

const FAMILIAR_SIGHT: f32 = 10.0;
const FAMILIAR_COMFORT: f32 = 3.0;

/// Player intent for one frame. Drives the hero the camera follows.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    pub acceleration: Vec2,
    pub jump: bool,
    /// Throw direction, if the sword is thrown this frame.
    pub sword: Option<Vec2>,
}

/// Per-frame simulation statistics for instrumentation.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    pub frame: u64,
    pub entities_loaded: usize,
    pub entities_updatable: usize,
    pub entities_moved: usize,
    pub collisions: u32,
    /// Records that changed chunk or entered or left space during the flush.
    pub relocations: usize,
    pub frame_time: Duration,
}

impl fmt::Display for FrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {:>5}: loaded {:>4}, updatable {:>4}, moved {:>4}, collisions {:>3}, \
             relocated {:>3}, {:>8.1?}",
            self.frame,
            self.entities_loaded,
            self.entities_updatable,
            self.entities_moved,
            self.collisions,
            self.relocations,
            self.frame_time
        )
    }
}

/// Everything that persists between frames.
pub struct GameState {
    world: World,
    camera: Camera,
    config: SimConfig,
    arena: SimArena,
    frame_index: u64,
}

impl GameState {
    pub fn new(world: World, config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            world,
            camera: Camera::default(),
            arena: SimArena::new(&config),
            config,
            frame_index: 0,
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Add a hero. The first hero spawned becomes the camera's target.
    pub fn spawn_hero(&mut self, position: ChunkPosition) -> StorageIndex {
        let index = self.world.add_hero(position);
        if self.camera.following.is_none() {
            self.camera = Camera::following(index, position);
        }
        index
    }

    /// Update bounds in sim space, centered on the camera.
    pub fn update_bounds(&self) -> Rect2 {
        let side = self.world.geometry().tile_side_in_meters;
        Rect2::from_center_dim(Vec2::ZERO, side * UPDATE_TILES)
    }

    /// Run one frame: load a region around the camera, move every updatable
    /// entity by its kind, and write the region back.
    pub fn update_and_simulate(&mut self, input: &FrameInput, dt: f32) -> FrameStats {
        let _span = tracing::info_span!("frame", index = self.frame_index).entered();
        let frame_start = Instant::now();

        let update_bounds = self.update_bounds();
        let mut region = begin_simulation(
            &mut self.arena,
            &mut self.world,
            &self.config,
            self.camera.position,
            update_bounds,
        );

        let mut stats = FrameStats {
            frame: self.frame_index,
            entities_loaded: region.entity_count(),
            entities_updatable: region.updatable_count(),
            ..FrameStats::default()
        };

        let updatable: Vec<EntityHandle> = region.updatable_handles().collect();
        for handle in updatable {
            let entity = region.entity(handle);
            if !entity.is_spatial() {
                continue;
            }
            let entity_type = entity.entity_type;
            let controlled = self.camera.following == Some(entity.storage_index);
            let hits = match entity_type {
                EntityType::Hero => {
                    let input = if controlled { *input } else { FrameInput::default() };
                    Some(update_hero(&mut region, handle, &input, dt))
                }
                EntityType::Familiar => Some(update_familiar(&mut region, handle, dt)),
                EntityType::Sword => Some(update_sword(&mut region, handle, dt)),
                EntityType::Monster | EntityType::Wall | EntityType::Null => None,
            };
            if let Some(hits) = hits {
                stats.entities_moved += 1;
                stats.collisions += hits;
            }
        }

        end_simulation(region, &mut self.world, &mut self.camera);
        // The world log holds only this frame's events.
        stats.relocations = self
            .world
            .drain_events()
            .iter()
            .filter(|e| matches!(e, WorldEvent::EntityRelocated { .. }))
            .count();
        self.frame_index += 1;
        stats.frame_time = frame_start.elapsed();

        tracing::trace!(
            loaded = stats.entities_loaded,
            moved = stats.entities_moved,
            collisions = stats.collisions,
            relocations = stats.relocations,
            "frame complete"
        );
        stats
    }
}

fn update_hero(
    region: &mut SimRegion<'_>,
    handle: EntityHandle,
    input: &FrameInput,
    dt: f32,
) -> u32 {
    if input.jump {
        region.entity_mut(handle).dz = HERO_JUMP_SPEED;
    }

    let direction = input
        .sword
        .map(Vec2::normalize_or_zero)
        .filter(|d| *d != Vec2::ZERO);
    if let Some(direction) = direction {
        let hero = region.entity(handle);
        let spawn_at = hero.position + SWORD_SPAWN_OFFSET * direction;
        // A sword already in flight stays where it is.
        let idle_sword = hero.sword.handle.filter(|&s| !region.entity(s).is_spatial());
        if let Some(sword) = idle_sword {
            region.make_entity_spatial(sword, spawn_at, SWORD_SPEED * direction);
            region.entity_mut(sword).distance_limit = SWORD_RANGE;
            tracing::debug!(sword = %region.entity(sword).storage_index, "sword thrown");
        }
    }

    move_entity(region, handle, dt, &HERO_MOVE, input.acceleration)
}

/// Drift toward the closest hero in sight until within comfort range.
fn update_familiar(region: &mut SimRegion<'_>, handle: EntityHandle, dt: f32) -> u32 {
    let position = region.entity(handle).position;
    let closest = region
        .entities()
        .iter()
        .filter(|e| e.entity_type == EntityType::Hero && e.is_spatial())
        .map(|e| ((e.position - position).length_squared(), e.position))
        .filter(|&(d_sq, _)| d_sq < FAMILIAR_SIGHT * FAMILIAR_SIGHT)
        .min_by(|a, b| a.0.total_cmp(&b.0));

    let acceleration = match closest {
        Some((d_sq, hero)) if d_sq > FAMILIAR_COMFORT * FAMILIAR_COMFORT => {
            (0.5 / d_sq.sqrt()) * (hero - position)
        }
        _ => Vec2::ZERO,
    };
    move_entity(region, handle, dt, &HERO_MOVE, acceleration)
}

/// Fly until the travel budget runs out, then leave space.
fn update_sword(region: &mut SimRegion<'_>, handle: EntityHandle, dt: f32) -> u32 {
    let hits = move_entity(region, handle, dt, &MoveSpec::default(), Vec2::ZERO);
    let sword = region.entity(handle);
    if sword.is_spatial() && sword.distance_limit == 0.0 {
        region.make_entity_nonspatial(handle);
    }
    hits
}

/// Rolling window of frame durations.
#[derive(Debug)]
pub struct FrameTimer {
    history: Vec<Duration>,
    capacity: usize,
    index: usize,
    filled: bool,
}

impl FrameTimer {
    /// A timer over the last `capacity` frames.
    ///
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "frame timer needs room for at least one frame");
        Self {
            history: vec![Duration::ZERO; capacity],
            capacity,
            index: 0,
            filled: false,
        }
    }

    pub fn record(&mut self, dt: Duration) {
        self.history[self.index] = dt;
        self.index = (self.index + 1) % self.capacity;
        if self.index == 0 {
            self.filled = true;
        }
    }

    fn recorded(&self) -> &[Duration] {
        let count = if self.filled { self.capacity } else { self.index };
        &self.history[..count]
    }

    pub fn average(&self) -> Duration {
        let recorded = self.recorded();
        if recorded.is_empty() {
            return Duration::ZERO;
        }
        recorded.iter().sum::<Duration>() / recorded.len() as u32
    }

    pub fn max(&self) -> Duration {
        self.recorded().iter().copied().max().unwrap_or(Duration::ZERO)
    }
}
