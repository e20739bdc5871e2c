//! Core primitives.
//!
//! Placements, chunk areas, the seeded PRNG used for spawn-pool draws and the
//! snapshot hasher. Nothing in here touches I/O or the async runtime.

pub mod placement;
pub mod region;
pub mod rng;
pub mod hash;

// Re-export core types
pub use placement::Placement;
pub use region::ChunkArea;
pub use rng::DeterministicRng;
pub use hash::{StateHash, StateHasher};
