//! World chunk data: coordinates, storage, generation and the wire codec.

mod chunk;
pub mod codec;
mod generator;
mod storage;

pub use chunk::{AIR, BLOCK_COUNT, BlockId, CHUNK_HEIGHT, CHUNK_WIDTH, ChunkCoord, ChunkData};
pub use codec::{CodecError, ENCODED_LEN, decode, encode};
pub use generator::{ChunkGenerator, FlatGenerator, GRASS, LayeredGenerator, STONE};
pub use storage::World;
