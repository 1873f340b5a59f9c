//! Chunk coordinates and block storage.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::CodecError;

/// Block identifier stored in a chunk cell.
pub type BlockId = i32;

/// Block id used for empty cells.
pub const AIR: BlockId = 0;

/// Number of cells along a chunk's x axis.
pub const CHUNK_WIDTH: usize = 16;

/// Number of cells along a chunk's y axis.
pub const CHUNK_HEIGHT: usize = 16;

/// Number of cells in every chunk.
pub const BLOCK_COUNT: usize = CHUNK_WIDTH * CHUNK_HEIGHT;

/// Integer coordinate identifying a chunk in the world grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A fixed-size region of the world's cell grid.
///
/// Cells are stored row-major: the cell at local `(cx, cy)` lives at index
/// `cy * CHUNK_WIDTH + cx`. The block vector always holds exactly
/// [`BLOCK_COUNT`] entries; deserialization goes through [`ChunkData::new`]
/// and rejects any other length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkData {
    coord: ChunkCoord,
    blocks: Vec<BlockId>,
}

impl ChunkData {
    /// Builds a chunk from a row-major block vector.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::BlockCount`] if `blocks` does not hold exactly
    /// [`BLOCK_COUNT`] entries.
    pub fn new(coord: ChunkCoord, blocks: Vec<BlockId>) -> Result<Self, CodecError> {
        if blocks.len() != BLOCK_COUNT {
            return Err(CodecError::BlockCount {
                expected: BLOCK_COUNT,
                actual: blocks.len(),
            });
        }
        Ok(Self { coord, blocks })
    }

    /// Builds a chunk from a vector the caller sized with [`BLOCK_COUNT`].
    pub(crate) fn from_raw(coord: ChunkCoord, blocks: Vec<BlockId>) -> Self {
        debug_assert_eq!(blocks.len(), BLOCK_COUNT);
        Self { coord, blocks }
    }

    /// Builds a chunk with every cell set to `block`.
    pub fn filled(coord: ChunkCoord, block: BlockId) -> Self {
        Self {
            coord,
            blocks: vec![block; BLOCK_COUNT],
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    /// Returns the block at local cell `(cx, cy)`, or `None` when out of range.
    pub fn block(&self, cx: usize, cy: usize) -> Option<BlockId> {
        Self::index(cx, cy).map(|idx| self.blocks[idx])
    }

    /// Overwrites the block at local cell `(cx, cy)`.
    ///
    /// Returns the previous block, or `None` (and leaves the chunk untouched)
    /// when the cell is out of range.
    pub fn set_block(&mut self, cx: usize, cy: usize, block: BlockId) -> Option<BlockId> {
        let idx = Self::index(cx, cy)?;
        Some(std::mem::replace(&mut self.blocks[idx], block))
    }

    fn index(cx: usize, cy: usize) -> Option<usize> {
        (cx < CHUNK_WIDTH && cy < CHUNK_HEIGHT).then(|| cy * CHUNK_WIDTH + cx)
    }
}

impl<'de> Deserialize<'de> for ChunkData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct RawChunkData {
            coord: ChunkCoord,
            blocks: Vec<BlockId>,
        }

        let raw = RawChunkData::deserialize(deserializer)?;
        ChunkData::new(raw.coord, raw.blocks).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_wrong_block_count() {
        let err = ChunkData::new(ChunkCoord::new(0, 0), vec![AIR; BLOCK_COUNT - 1]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::BlockCount {
                expected: BLOCK_COUNT,
                actual
            } if actual == BLOCK_COUNT - 1
        ));
    }

    #[test]
    fn test_blocks_are_row_major() {
        let mut chunk = ChunkData::filled(ChunkCoord::new(1, 2), AIR);
        assert_eq!(chunk.set_block(3, 1, 7), Some(AIR));
        assert_eq!(chunk.blocks()[CHUNK_WIDTH + 3], 7);
        assert_eq!(chunk.block(3, 1), Some(7));
    }

    #[test]
    fn test_out_of_range_cells_are_ignored() {
        let mut chunk = ChunkData::filled(ChunkCoord::new(0, 0), 1);
        assert_eq!(chunk.block(CHUNK_WIDTH, 0), None);
        assert_eq!(chunk.set_block(0, CHUNK_HEIGHT, 9), None);
        assert!(chunk.blocks().iter().all(|&b| b == 1));
    }

    #[test]
    fn test_deserialize_rejects_wrong_block_count() {
        let short = r#"{"coord":{"x":1,"y":2},"blocks":[7,8,9]}"#;
        let err = serde_json::from_str::<ChunkData>(short).unwrap_err();
        assert!(err.to_string().contains("exactly 256 blocks"), "{err}");
    }

    #[test]
    fn test_serde_round_trip_keeps_chunk() {
        let mut chunk = ChunkData::filled(ChunkCoord::new(-3, 5), AIR);
        chunk.set_block(2, 2, 4);

        let json = serde_json::to_string(&chunk).unwrap();
        assert_eq!(serde_json::from_str::<ChunkData>(&json).unwrap(), chunk);
    }
}
