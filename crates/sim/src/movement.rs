use glam::Vec2;
use serde::{Deserialize, Serialize};
use simspace_common::{EntityFlags, FacingDirection};
use simspace_kernel::{EntityHandle, SimEntity};

use crate::collision::handle_collision;
use crate::region::SimRegion;

/// Per-call movement tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveSpec {
    pub speed: f32,
    pub drag: f32,
    /// Rescale accelerations longer than one to unit length before applying `speed`.
    pub unit_max_accel_vector: bool,
}

impl Default for MoveSpec {
    fn default() -> Self {
        Self {
            speed: 1.0,
            drag: 0.0,
            unit_max_accel_vector: false,
        }
    }
}

/// Crossing of the mover's path with the line `x = wall_x` (in the frame
/// where the wall is vertical). Shrinks `t_min` and returns true when the
/// crossing lies inside `[min_y, max_y]` and earlier than `t_min`.
#[allow(clippy::too_many_arguments)]
fn test_wall(
    wall_x: f32,
    rel_x: f32,
    rel_y: f32,
    delta_x: f32,
    delta_y: f32,
    t_min: &mut f32,
    min_y: f32,
    max_y: f32,
    epsilon: f32,
) -> bool {
    if delta_x == 0.0 {
        return false;
    }
    let t = (wall_x - rel_x) / delta_x;
    if t < 0.0 || t >= *t_min {
        return false;
    }
    let y = rel_y + t * delta_y;
    if y < min_y || y > max_y {
        return false;
    }
    *t_min = (t - epsilon).max(0.0);
    true
}

/// Earliest wall of `other`'s Minkowski-expanded box crossed by `mover`
/// travelling `delta`. Walls are tested left, right, bottom, top.
fn sweep_against(
    mover: &SimEntity,
    other: &SimEntity,
    delta: Vec2,
    t_min: &mut f32,
    epsilon: f32,
) -> Option<Vec2> {
    let diameter = Vec2::new(other.width + mover.width, other.height + mover.height);
    let min_corner = -0.5 * diameter;
    let max_corner = 0.5 * diameter;
    let rel = mover.position - other.position;

    let flip = |v: Vec2| Vec2::new(v.y, v.x);
    let walls = [
        (min_corner.x, rel, delta, min_corner.y, max_corner.y, Vec2::new(-1.0, 0.0)),
        (max_corner.x, rel, delta, min_corner.y, max_corner.y, Vec2::new(1.0, 0.0)),
        (min_corner.y, flip(rel), flip(delta), min_corner.x, max_corner.x, Vec2::new(0.0, -1.0)),
        (max_corner.y, flip(rel), flip(delta), min_corner.x, max_corner.x, Vec2::new(0.0, 1.0)),
    ];

    let mut normal = None;
    for (wall, r, d, min_span, max_span, wall_normal) in walls {
        if test_wall(wall, r.x, r.y, d.x, d.y, t_min, min_span, max_span, epsilon) {
            normal = Some(wall_normal);
        }
    }
    normal
}

/// Integrate one entity over `dt` and resolve its contacts against every
/// colliding entity in the region.
///
/// Returns the number of contacts resolved.
///
/// # Panics
/// If the entity is non-spatial.
pub fn move_entity(
    region: &mut SimRegion<'_>,
    handle: EntityHandle,
    dt: f32,
    move_spec: &MoveSpec,
    mut acceleration: Vec2,
) -> u32 {
    let config = region.config;
    let entities = region.entities_mut();
    let slot = handle.slot();
    assert!(
        entities[slot].is_spatial(),
        "cannot move non-spatial entity {}",
        entities[slot].storage_index
    );

    if move_spec.unit_max_accel_vector {
        let length_sq = acceleration.length_squared();
        if length_sq > 1.0 {
            acceleration *= 1.0 / length_sq.sqrt();
        }
    }
    acceleration *= move_spec.speed;

    let entity = &mut entities[slot];
    // Linear drag approximation.
    acceleration += -move_spec.drag * entity.velocity;

    let mut delta = 0.5 * acceleration * dt * dt + entity.velocity * dt;
    entity.velocity += acceleration * dt;

    let ddz = config.gravity;
    entity.z += 0.5 * ddz * dt * dt + entity.dz * dt;
    entity.dz += ddz * dt;
    if entity.z < 0.0 {
        entity.z = 0.0;
        entity.dz = 0.0;
    }

    let mut distance_remaining = if entity.distance_limit == 0.0 {
        config.unlimited_distance
    } else {
        entity.distance_limit
    };

    let mut hits = 0;
    for _ in 0..config.collision_iterations {
        let delta_length = delta.length();
        if delta_length <= 0.0 || !entities[slot].is_spatial() {
            break;
        }

        let mut t_min = 1.0;
        let budget_limited = delta_length > distance_remaining;
        if budget_limited {
            t_min = distance_remaining / delta_length;
        }

        let mover = &entities[slot];
        let desired_position = mover.position + delta;
        let stops_on_collision = mover.is_set(EntityFlags::COLLIDES);

        let mut hit: Option<(usize, Vec2)> = None;
        for (other_slot, other) in entities.iter().enumerate() {
            if other_slot == slot
                || !other.is_set(EntityFlags::COLLIDES)
                || other.is_set(EntityFlags::NONSPATIAL)
            {
                continue;
            }
            let epsilon = config.wall_epsilon;
            if let Some(normal) = sweep_against(mover, other, delta, &mut t_min, epsilon) {
                hit = Some((other_slot, normal));
            }
        }

        let entity = &mut entities[slot];
        entity.position += t_min * delta;

        let Some((other_slot, normal)) = hit else {
            distance_remaining = if budget_limited {
                0.0
            } else {
                distance_remaining - t_min * delta_length
            };
            break;
        };
        distance_remaining -= t_min * delta_length;
        hits += 1;

        delta = desired_position - entity.position;
        if stops_on_collision {
            entity.velocity -= entity.velocity.dot(normal) * normal;
            delta -= delta.dot(normal) * normal;
        }

        handle_collision(entities, slot, other_slot);
    }

    let entity = &mut entities[slot];
    if entity.distance_limit != 0.0 {
        entity.distance_limit = distance_remaining;
    }
    update_facing(entity);
    hits
}

/// Point along the dominant velocity axis; horizontal wins ties. A
/// motionless entity keeps its facing.
fn update_facing(entity: &mut SimEntity) {
    let v = entity.velocity;
    if v.x == 0.0 && v.y == 0.0 {
        return;
    }
    entity.facing = if v.x.abs() >= v.y.abs() {
        if v.x > 0.0 {
            FacingDirection::Right
        } else {
            FacingDirection::Left
        }
    } else if v.y > 0.0 {
        FacingDirection::Up
    } else {
        FacingDirection::Down
    };
}
