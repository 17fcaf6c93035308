#![forbid(unsafe_code)]

pub mod config;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod stats;

pub mod chunking {
    pub mod planner;
}

pub mod codec;

pub mod crypto {
    pub mod cfb;
    pub mod key;
}

pub mod container {
    pub mod identity;
    pub mod manifest;
    pub mod store;
    pub mod trailer;
}

pub mod pack {
    pub mod splitter;
}

pub mod parity;

pub mod read {
    pub mod combiner;
    pub mod verify;
}

// Re-exports: stable API surface
pub use chunking::planner::{SizePlan, plan};
pub use config::{ChunkBounds, CombineOptions, RepairPolicy, SplitOptions};
pub use crypto::key::CipherKey;
pub use domain::{Chunk, ChunkKind, ChunkSet};
pub use error::{Result, VaultError};
pub use pack::splitter::split_file;
pub use parity::{ParityBackend, ParityManager};
pub use read::combiner::{combine_chunks, combine_set};
pub use read::verify::verify_chunks;
