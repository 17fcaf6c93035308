use crate::container::identity::{self, chunk_name};
use crate::container::trailer::write_with_trailer;
use crate::domain::{Chunk, ChunkKind};
use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes chunk files under one prefix, handing out ordinals from an
/// explicit counter instead of rescanning the directory per chunk.
pub struct ChunkStore {
    dir: PathBuf,
    prefix: String,
    next: u64,
}

impl ChunkStore {
    /// Start after the highest ordinal already present for `prefix`.
    pub fn open(dir: &Path, prefix: &str) -> Result<Self> {
        let next = identity::next_ordinal(dir, prefix)?;
        Ok(Self::with_start(dir, prefix, next))
    }

    pub fn with_start(dir: &Path, prefix: &str, next: u64) -> Self {
        Self {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            next,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn next_ordinal(&self) -> u64 {
        self.next
    }

    /// Persist `payload ++ crc32` under the next ordinal.
    pub fn create(&mut self, payload: &[u8], kind: ChunkKind) -> Result<Chunk> {
        let ordinal = self.next;
        let path = self.dir.join(chunk_name(&self.prefix, ordinal)?);
        let mut w = BufWriter::new(File::create(&path)?);
        let crc32 = write_with_trailer(&mut w, payload)?;
        w.flush()?;
        self.next += 1;
        debug!(path = %path.display(), len = payload.len(), ?kind, "chunk persisted");
        Ok(Chunk {
            sequence: ordinal,
            kind,
            path,
            payload_len: payload.len() as u64,
            crc32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_are_contiguous() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ChunkStore::open(dir.path(), "chunk").unwrap();
        let a = store.create(b"a", ChunkKind::Data).unwrap();
        let b = store.create(b"bb", ChunkKind::Data).unwrap();
        assert_eq!((a.sequence, b.sequence), (1, 2));
        assert_eq!(store.next_ordinal(), 3);
        assert!(b.path.ends_with("chunk_000000002"));
        assert_eq!(std::fs::metadata(&b.path).unwrap().len(), 6);

        let reopened = ChunkStore::open(dir.path(), "chunk").unwrap();
        assert_eq!(reopened.next_ordinal(), 3);
    }
}
