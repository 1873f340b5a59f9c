//! In-memory chunk storage with lazy generation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use super::{ChunkCoord, ChunkData, ChunkGenerator, LayeredGenerator};

/// Shared chunk store backing the world-data commands.
///
/// Cloning is cheap and yields a handle to the same storage. Reads take a
/// shared lock; generation and insertion take the exclusive lock.
#[derive(Clone)]
pub struct World {
    chunks: Arc<RwLock<HashMap<ChunkCoord, ChunkData>>>,
    generator: Arc<dyn ChunkGenerator>,
}

impl World {
    pub fn new(generator: impl ChunkGenerator + 'static) -> Self {
        Self {
            chunks: Arc::new(RwLock::new(HashMap::new())),
            generator: Arc::new(generator),
        }
    }

    /// Creates a world backed by [`LayeredGenerator`] with the given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self::new(LayeredGenerator::new(seed))
    }

    /// Returns a copy of the stored chunk, if any. Never generates.
    pub fn get(&self, coord: ChunkCoord) -> Option<ChunkData> {
        self.read().get(&coord).cloned()
    }

    /// Stores `chunk`, returning whatever was previously at its coordinate.
    pub fn insert(&self, chunk: ChunkData) -> Option<ChunkData> {
        self.write().insert(chunk.coord(), chunk)
    }

    /// Returns the chunk at `coord`, generating and storing it on a miss.
    ///
    /// Generation happens under the write lock, so concurrent callers for the
    /// same coordinate observe a single generated chunk.
    pub fn get_or_generate(&self, coord: ChunkCoord) -> ChunkData {
        if let Some(chunk) = self.get(coord) {
            return chunk;
        }

        let mut chunks = self.write();
        chunks
            .entry(coord)
            .or_insert_with(|| {
                debug!(
                    target: "backbone::world",
                    %coord,
                    generator = self.generator.name(),
                    "Generating missing chunk"
                );
                self.generator.generate(coord)
            })
            .clone()
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.read().contains_key(&coord)
    }

    /// Number of chunks currently stored.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panicking writer cannot leave a half-built chunk in the map (entries
    // are inserted whole), so poisoned locks are recovered rather than
    // propagated.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<ChunkCoord, ChunkData>> {
        self.chunks.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ChunkCoord, ChunkData>> {
        self.chunks.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(LayeredGenerator::default())
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("chunks", &self.len())
            .field("generator", &self.generator.name())
            .finish()
    }
}
