//! Fixed-layout binary encoding for [`ChunkData`].
//!
//! The layout carries no version tag; changing it breaks every peer:
//!
//! ```text
//! [i32 BE chunk x][i32 BE chunk y][i32 BE block id] * BLOCK_COUNT
//! ```
//!
//! Block ids are written row-major. Decoding is tolerant of trailing bytes and
//! reads exactly `BLOCK_COUNT` ids.

use thiserror::Error;

use super::{BLOCK_COUNT, BlockId, ChunkCoord, ChunkData};

/// Size of the coordinate header in bytes.
pub const HEADER_LEN: usize = 8;

/// Exact size of an encoded chunk.
pub const ENCODED_LEN: usize = HEADER_LEN + 4 * BLOCK_COUNT;

/// Errors raised while building or decoding chunk records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated chunk data: expected at least {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("chunk must hold exactly {expected} blocks, got {actual}")]
    BlockCount { expected: usize, actual: usize },
}

/// Encodes a chunk into exactly [`ENCODED_LEN`] bytes.
pub fn encode(chunk: &ChunkData) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(ENCODED_LEN);
    let coord = chunk.coord();
    buffer.extend_from_slice(&coord.x.to_be_bytes());
    buffer.extend_from_slice(&coord.y.to_be_bytes());
    for block in chunk.blocks() {
        buffer.extend_from_slice(&block.to_be_bytes());
    }
    debug_assert_eq!(buffer.len(), ENCODED_LEN);
    buffer
}

/// Decodes a chunk from the front of `bytes`.
///
/// # Errors
///
/// Returns [`CodecError::Truncated`] when fewer than [`ENCODED_LEN`] bytes are
/// available. Anything past `ENCODED_LEN` is ignored.
pub fn decode(bytes: &[u8]) -> Result<ChunkData, CodecError> {
    if bytes.len() < ENCODED_LEN {
        return Err(CodecError::Truncated {
            expected: ENCODED_LEN,
            actual: bytes.len(),
        });
    }

    let (header, body) = bytes.split_at(HEADER_LEN);
    let coord = ChunkCoord::new(read_i32(&header[0..4]), read_i32(&header[4..8]));
    let blocks: Vec<BlockId> = body
        .chunks_exact(4)
        .take(BLOCK_COUNT)
        .map(read_i32)
        .collect();

    ChunkData::new(coord, blocks)
}

fn read_i32(word: &[u8]) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(word);
    i32::from_be_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{CHUNK_WIDTH, ChunkCoord};

    fn sample_chunk() -> ChunkData {
        let blocks = (0..BLOCK_COUNT as i32).map(|i| i * 3 - 100).collect();
        ChunkData::new(ChunkCoord::new(-7, 42), blocks).unwrap()
    }

    #[test]
    fn test_encoded_length() {
        assert_eq!(encode(&sample_chunk()).len(), 8 + 4 * BLOCK_COUNT);
    }

    #[test]
    fn test_header_is_big_endian() {
        let bytes = encode(&ChunkData::filled(ChunkCoord::new(1, -1), 0x0102_0304));
        assert_eq!(&bytes[0..4], &[0, 0, 0, 1]);
        assert_eq!(&bytes[4..8], &[0xff, 0xff, 0xff, 0xff]);
        assert_eq!(&bytes[8..12], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_roundtrip() {
        let chunk = sample_chunk();
        assert_eq!(decode(&encode(&chunk)).unwrap(), chunk);

        let extremes = ChunkData::filled(ChunkCoord::new(i32::MIN, i32::MAX), i32::MIN);
        assert_eq!(decode(&encode(&extremes)).unwrap(), extremes);
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        let bytes = encode(&sample_chunk());
        for len in [0, 4, HEADER_LEN, ENCODED_LEN - 1] {
            assert_eq!(
                decode(&bytes[..len]),
                Err(CodecError::Truncated {
                    expected: ENCODED_LEN,
                    actual: len
                })
            );
        }
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let chunk = sample_chunk();
        let mut bytes = encode(&chunk);
        bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x01]);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, chunk);
        assert_eq!(decoded.block(CHUNK_WIDTH - 1, 0), chunk.block(CHUNK_WIDTH - 1, 0));
    }
}
