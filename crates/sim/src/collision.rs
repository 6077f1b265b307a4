//! Pairwise collision responses.
//!
//! Responses are keyed on the canonical `(lower, higher)` type pair, so the
//! outcome does not depend on which of the two entities was moving.

use simspace_common::EntityType;
use simspace_kernel::SimEntity;

/// What happens when two entity kinds touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionResponse {
    None,
    /// The monster loses one max hit point; the sword leaves space.
    StrikeMonster,
}

/// Response for a pair of entity types, in either order.
pub fn collision_response(a: EntityType, b: EntityType) -> CollisionResponse {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    match (lo, hi) {
        (EntityType::Monster, EntityType::Sword) => CollisionResponse::StrikeMonster,
        _ => CollisionResponse::None,
    }
}

/// Sort the pair at slots `a` and `b` by type and apply their response.
pub(crate) fn handle_collision(
    entities: &mut [SimEntity],
    a: usize,
    b: usize,
) -> CollisionResponse {
    let (lo, hi) = if entities[a].entity_type <= entities[b].entity_type {
        (a, b)
    } else {
        (b, a)
    };
    let response = collision_response(entities[lo].entity_type, entities[hi].entity_type);

    if response == CollisionResponse::StrikeMonster {
        let (monster, sword) = pair_mut(entities, lo, hi);
        monster.hit_point_max = monster.hit_point_max.saturating_sub(1);
        sword.make_nonspatial();
    }

    tracing::trace!(
        a = %entities[lo].storage_index,
        b = %entities[hi].storage_index,
        ?response,
        "collision"
    );
    response
}

fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b, "an entity cannot collide with itself");
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
