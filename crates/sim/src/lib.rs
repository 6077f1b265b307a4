//! Simulation regions: cut a bounded working set out of the world, move and
//! collide it for one frame, then flush it back.
//!
//! # Invariants
//! - A stored record is loaded into at most one live region; loading marks it
//!   simulating and flushing clears the mark.
//! - Handles are valid only for the region that issued them and never reach
//!   the persistent store.
//! - A region never holds more than `max_entity_count` entities. Exceeding it,
//!   or filling the hash table, is a fatal invariant violation.
//! - Collision responses depend only on the unordered pair of entity types.

mod builder;
mod collision;
mod config;
mod game;
mod movement;
mod region;

pub use builder::{Camera, begin_simulation, end_simulation};
pub use collision::{CollisionResponse, collision_response};
pub use config::{ConfigError, SimConfig};
pub use game::{FrameInput, FrameStats, FrameTimer, GameState};
pub use movement::{MoveSpec, move_entity};
pub use region::{HashSlot, SimArena, SimRegion};

pub fn crate_info() -> &'static str {
    "simspace-sim v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("sim"));
    }
}
