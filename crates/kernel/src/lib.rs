//! World Kernel: the persistent chunked world that simulation regions are cut from.
//!
//! # Invariants
//! - Every stored position is either canonical (offset within half a chunk of
//!   the chunk centre) or absent.
//! - A record is listed in exactly one chunk block iff it has a position.
//! - Storage index 0 is never handed out.

pub mod coords;
pub mod entity;
pub mod world;

pub use coords::{ChunkCoord, ChunkPosition, WorldDifference, WorldGeometry};
pub use entity::{EntityHandle, EntityReference, LowEntity, SimEntity};
pub use world::{ENTITY_BLOCK_CAPACITY, EntityBlock, World, WorldChunk, WorldError, WorldEvent};
