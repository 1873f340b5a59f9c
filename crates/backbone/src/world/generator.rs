//! Chunk generators used to fill missing chunks on demand.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{AIR, BLOCK_COUNT, BlockId, CHUNK_HEIGHT, CHUNK_WIDTH, ChunkCoord, ChunkData};

/// Block id for the solid ground layer.
pub const STONE: BlockId = 1;
/// Block id for the topmost ground cell of a column.
pub const GRASS: BlockId = 2;

/// Produces chunk contents for coordinates that have never been stored.
///
/// Implementations must be deterministic enough for their callers; the world
/// storage calls `generate` at most once per coordinate.
pub trait ChunkGenerator: Send + Sync {
    /// Returns a human-readable name for this generator (used in logging).
    fn name(&self) -> &'static str;

    fn generate(&self, coord: ChunkCoord) -> ChunkData;
}

/// Fills every cell with the same block.
#[derive(Debug, Clone, Copy)]
pub struct FlatGenerator {
    pub block: BlockId,
}

impl ChunkGenerator for FlatGenerator {
    fn name(&self) -> &'static str {
        "flat"
    }

    fn generate(&self, coord: ChunkCoord) -> ChunkData {
        ChunkData::filled(coord, self.block)
    }
}

/// Deterministic terrain: each column gets a surface height derived from
/// `(seed, x, y)`, stone below it, grass on top and air above.
#[derive(Debug, Clone, Copy)]
pub struct LayeredGenerator {
    pub seed: u64,
}

impl LayeredGenerator {
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn rng_for(&self, coord: ChunkCoord) -> StdRng {
        // Pack both coordinates into one word so neighbouring chunks diverge.
        let packed = ((coord.x as u32 as u64) << 32) | coord.y as u32 as u64;
        StdRng::seed_from_u64(self.seed ^ packed.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }
}

impl Default for LayeredGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ChunkGenerator for LayeredGenerator {
    fn name(&self) -> &'static str {
        "layered"
    }

    fn generate(&self, coord: ChunkCoord) -> ChunkData {
        let mut rng = self.rng_for(coord);
        let mut blocks = vec![AIR; BLOCK_COUNT];

        for cx in 0..CHUNK_WIDTH {
            let surface = rng.gen_range(CHUNK_HEIGHT / 4..CHUNK_HEIGHT * 3 / 4);
            for cy in 0..=surface {
                blocks[cy * CHUNK_WIDTH + cx] = if cy == surface { GRASS } else { STONE };
            }
        }

        ChunkData::from_raw(coord, blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layered_is_deterministic() {
        let generator = LayeredGenerator::new(1234);
        let coord = ChunkCoord::new(5, -9);
        assert_eq!(generator.generate(coord), generator.generate(coord));
    }

    #[test]
    fn test_layered_columns_have_ground_below_air() {
        let chunk = LayeredGenerator::new(7).generate(ChunkCoord::new(0, 0));
        for cx in 0..CHUNK_WIDTH {
            assert_eq!(chunk.block(cx, 0), Some(STONE));
            assert_eq!(chunk.block(cx, CHUNK_HEIGHT - 1), Some(AIR));
            let grass = (0..CHUNK_HEIGHT)
                .filter(|&cy| chunk.block(cx, cy) == Some(GRASS))
                .count();
            assert_eq!(grass, 1);
        }
    }

    #[test]
    fn test_flat_fills_every_cell() {
        let chunk = FlatGenerator { block: 9 }.generate(ChunkCoord::new(3, 3));
        assert!(chunk.blocks().iter().all(|&b| b == 9));
    }
}
