// chunkvault_core/src/domain.rs
use crate::config::ChunkBounds;
use crate::container::manifest::SourceMeta;
use crate::container::trailer::{self, TRAILER_LEN};
use crate::error::{Result, VaultError};
use crate::stats::SplitStats;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkKind {
    Data,
    Parity,
}

/// One persisted chunk file. Never modified in place once written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub sequence: u64,
    pub kind: ChunkKind,
    pub path: PathBuf,
    pub payload_len: u64,
    pub crc32: u32,
}

impl Chunk {
    /// Wrap an existing chunk file, reading its trailer.
    pub fn open(path: &Path, sequence: u64, kind: ChunkKind) -> Result<Self> {
        let check = trailer::check_file(path)?;
        Ok(Self {
            sequence,
            kind,
            path: path.to_path_buf(),
            payload_len: check.payload_len,
            crc32: check.stored,
        })
    }

    pub fn is_parity(&self) -> bool {
        self.kind == ChunkKind::Parity
    }

    pub fn file_size(&self) -> u64 {
        self.payload_len + TRAILER_LEN
    }

    pub fn file_name(&self) -> Result<&str> {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| VaultError::Format(format!("bad chunk path {}", self.path.display())))
    }

    /// The trailer must match the payload, and both must match the CRC
    /// recorded for this chunk. The latter catches a valid chunk file sitting
    /// in the wrong slot.
    fn check_crc(&self, stored: u32, computed: u32) -> Result<()> {
        if computed != stored {
            return Err(VaultError::Checksum {
                path: self.path.clone(),
                stored,
                computed,
            });
        }
        if stored != self.crc32 {
            return Err(VaultError::Checksum {
                path: self.path.clone(),
                stored: self.crc32,
                computed,
            });
        }
        Ok(())
    }

    /// Recompute the CRC over the stored payload.
    pub fn verify(&self) -> Result<()> {
        let check = trailer::check_file(&self.path)?;
        self.check_crc(check.stored, check.computed)
    }

    /// Read the payload, verifying it against the trailer and the recorded CRC.
    pub fn load(&self) -> Result<Vec<u8>> {
        let mut bytes = fs::read(&self.path)?;
        let (payload, stored) = trailer::split_trailer(&bytes)?;
        self.check_crc(stored, trailer::checksum(payload))?;
        bytes.truncate(bytes.len() - TRAILER_LEN as usize);
        Ok(bytes)
    }
}

/// Data chunks in sequence order plus any parity chunks, and the metadata
/// needed to reverse the split.
#[derive(Clone, Debug)]
pub struct ChunkSet {
    pub dir: PathBuf,
    pub prefix: String,
    /// Next free ordinal for this prefix; parity chunks draw from it too.
    pub next_ordinal: u64,
    pub data: Vec<Chunk>,
    pub parity: Vec<Chunk>,
    pub source: SourceMeta,
    pub compressed: bool,
    pub encrypted: bool,
    pub bounds: ChunkBounds,
    /// Name of the backend that produced `parity`, once parity exists.
    pub parity_backend: Option<String>,
}

impl ChunkSet {
    /// Data chunks followed by parity chunks, the order `combine_chunks` takes.
    pub fn chunks(&self) -> Vec<Chunk> {
        self.data.iter().chain(self.parity.iter()).cloned().collect()
    }

    pub fn transformed_size(&self) -> u64 {
        self.data.iter().map(|c| c.payload_len).sum()
    }

    pub fn stats(&self) -> SplitStats {
        SplitStats::new(self.source.size, self.transformed_size(), self.data.len())
    }
}
