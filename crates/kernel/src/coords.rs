use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Integer address of one chunk of the persistent world grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// A location in the persistent world: coarse chunk address plus a real
/// offset (meters) from that chunk's centre.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChunkPosition {
    pub chunk_x: i32,
    pub chunk_y: i32,
    pub chunk_z: i32,
    pub offset: Vec2,
}

impl ChunkPosition {
    pub fn new(chunk_x: i32, chunk_y: i32, chunk_z: i32, offset: Vec2) -> Self {
        Self {
            chunk_x,
            chunk_y,
            chunk_z,
            offset,
        }
    }

    pub fn chunk_coord(&self) -> ChunkCoord {
        ChunkCoord::new(self.chunk_x, self.chunk_y, self.chunk_z)
    }
}

/// Result of subtracting two chunk positions, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorldDifference {
    pub dxy: Vec2,
    pub dz: f32,
}

/// Fixed dimensions of the chunk grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldGeometry {
    pub tile_side_in_meters: f32,
    pub tiles_per_chunk: i32,
}

impl Default for WorldGeometry {
    fn default() -> Self {
        Self {
            tile_side_in_meters: 1.4,
            tiles_per_chunk: 16,
        }
    }
}

impl WorldGeometry {
    pub fn chunk_side_in_meters(&self) -> f32 {
        self.tile_side_in_meters * self.tiles_per_chunk as f32
    }

    fn is_canonical(&self, rel: f32) -> bool {
        let half = 0.5 * self.chunk_side_in_meters();
        let epsilon = 0.0001 * self.chunk_side_in_meters();
        rel >= -(half + epsilon) && rel <= half + epsilon
    }

    /// Fold whole chunk steps out of `rel` into `chunk`.
    fn recanonicalize_coord(&self, chunk: &mut i32, rel: &mut f32) {
        let side = self.chunk_side_in_meters();
        let steps = (*rel / side).round() as i32;
        *chunk += steps;
        *rel -= steps as f32 * side;

        debug_assert!(self.is_canonical(*rel), "offset {rel} not canonical");
    }

    /// Offset `base` by `offset` meters and normalise the result.
    pub fn map_into_chunk_space(&self, base: ChunkPosition, offset: Vec2) -> ChunkPosition {
        let mut result = base;
        result.offset += offset;
        self.recanonicalize_coord(&mut result.chunk_x, &mut result.offset.x);
        self.recanonicalize_coord(&mut result.chunk_y, &mut result.offset.y);
        result
    }

    /// `a - b` expressed in meters.
    pub fn subtract(&self, a: &ChunkPosition, b: &ChunkPosition) -> WorldDifference {
        let side = self.chunk_side_in_meters();
        let chunk_delta = Vec2::new(
            (a.chunk_x - b.chunk_x) as f32,
            (a.chunk_y - b.chunk_y) as f32,
        );
        WorldDifference {
            dxy: side * chunk_delta + (a.offset - b.offset),
            dz: side * (a.chunk_z - b.chunk_z) as f32,
        }
    }

    /// Centre of an absolute tile, expressed in chunk space. `tile_z` selects
    /// the chunk layer directly.
    pub fn chunk_position_from_tile(&self, tile_x: i32, tile_y: i32, tile_z: i32) -> ChunkPosition {
        let offset = self.tile_side_in_meters * Vec2::new(tile_x as f32, tile_y as f32);
        let mut result = self.map_into_chunk_space(ChunkPosition::default(), offset);
        result.chunk_z = tile_z;
        result
    }
}

pub fn are_in_same_chunk(a: &ChunkPosition, b: &ChunkPosition) -> bool {
    a.chunk_coord() == b.chunk_coord()
}
