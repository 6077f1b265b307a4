//! Shared leaf types for the simspace workspace.
//!
//! Nothing in here depends on world or region state; the kernel and the
//! simulation crates both build on these.

mod rect;
mod types;

pub use rect::Rect2;
pub use types::{
    EntityFlags, EntityType, FacingDirection, INVALID_POSITION, StorageIndex, ZeroStorageIndex,
};
