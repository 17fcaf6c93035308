use crate::config::ChunkBounds;
use crate::domain::{Chunk, ChunkKind, ChunkSet};
use crate::error::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const MANIFEST_VERSION: u16 = 1;
pub const MANIFEST_SUFFIX: &str = "manifest";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChunkRecord {
    pub sequence: u64,
    pub name: String,
    pub kind: ChunkKind,
    pub payload_len: u64,
    pub crc32: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMeta {
    pub name: String,
    pub size: u64,
    /// Hex BLAKE3 of the original bytes.
    pub blake3: String,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct Meta {
    pub created: i64,
    pub tool: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChunkSetManifest {
    pub version: u16,
    pub meta: Meta,
    pub prefix: String,
    pub next_ordinal: u64,
    pub compressed: bool,
    pub encrypted: bool,
    pub transformed_size: u64,
    pub bounds: ChunkBounds,
    pub source: SourceMeta,
    #[serde(default)]
    pub parity_backend: Option<String>,
    pub chunks: Vec<ChunkRecord>,
}

pub fn manifest_path(dir: &Path, prefix: &str) -> PathBuf {
    dir.join(format!("{prefix}.{MANIFEST_SUFFIX}"))
}

impl ChunkSetManifest {
    pub fn from_set(set: &ChunkSet, created: i64) -> Result<Self> {
        let chunks = set
            .data
            .iter()
            .chain(set.parity.iter())
            .map(|c| {
                Ok(ChunkRecord {
                    sequence: c.sequence,
                    name: c.file_name()?.to_string(),
                    kind: c.kind,
                    payload_len: c.payload_len,
                    crc32: c.crc32,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            version: MANIFEST_VERSION,
            meta: Meta {
                created,
                tool: concat!("chunkvault-core/", env!("CARGO_PKG_VERSION")).to_string(),
            },
            prefix: set.prefix.clone(),
            next_ordinal: set.next_ordinal,
            compressed: set.compressed,
            encrypted: set.encrypted,
            transformed_size: set.transformed_size(),
            bounds: set.bounds,
            source: set.source.clone(),
            parity_backend: set.parity_backend.clone(),
            chunks,
        })
    }

    pub fn into_set(self, dir: &Path) -> Result<ChunkSet> {
        if self.version != MANIFEST_VERSION {
            return Err(VaultError::Format(format!(
                "unsupported manifest version {}",
                self.version
            )));
        }
        let mut data = Vec::new();
        let mut parity = Vec::new();
        for r in self.chunks {
            let chunk = Chunk {
                sequence: r.sequence,
                kind: r.kind,
                path: dir.join(&r.name),
                payload_len: r.payload_len,
                crc32: r.crc32,
            };
            match r.kind {
                ChunkKind::Data => data.push(chunk),
                ChunkKind::Parity => parity.push(chunk),
            }
        }
        data.sort_by_key(|c| c.sequence);
        Ok(ChunkSet {
            dir: dir.to_path_buf(),
            prefix: self.prefix,
            next_ordinal: self.next_ordinal,
            data,
            parity,
            source: self.source,
            compressed: self.compressed,
            encrypted: self.encrypted,
            bounds: self.bounds,
            parity_backend: self.parity_backend,
        })
    }

    /// Replace the manifest atomically.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut w = BufWriter::new(tmp.as_file_mut());
            ciborium::ser::into_writer(self, &mut w)
                .map_err(|e| VaultError::Format(format!("manifest encode: {e}")))?;
            w.flush()?;
        }
        tmp.persist(manifest_path(dir, &self.prefix))
            .map_err(|e| VaultError::Io(e.error))?;
        Ok(())
    }

    pub fn read_from(dir: &Path, prefix: &str) -> Result<Self> {
        let f = File::open(manifest_path(dir, prefix))?;
        ciborium::de::from_reader(BufReader::new(f))
            .map_err(|e| VaultError::Format(format!("manifest decode: {e}")))
    }
}

impl ChunkSet {
    pub fn save(&self) -> Result<()> {
        let created = time::OffsetDateTime::now_utc().unix_timestamp();
        ChunkSetManifest::from_set(self, created)?.write_to(&self.dir)
    }

    pub fn load(dir: &Path, prefix: &str) -> Result<Self> {
        ChunkSetManifest::read_from(dir, prefix)?.into_set(dir)
    }

    pub fn remove_manifest(&self) -> Result<()> {
        fs::remove_file(manifest_path(&self.dir, &self.prefix))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::store::ChunkStore;

    #[test]
    fn manifest_restores_chunk_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ChunkStore::open(dir.path(), "chunk").unwrap();
        let d1 = store.create(b"one", ChunkKind::Data).unwrap();
        let d2 = store.create(b"two", ChunkKind::Data).unwrap();
        let p1 = store.create(b"par", ChunkKind::Parity).unwrap();
        let set = ChunkSet {
            dir: dir.path().to_path_buf(),
            prefix: "chunk".into(),
            next_ordinal: store.next_ordinal(),
            data: vec![d1, d2],
            parity: vec![p1],
            source: SourceMeta {
                name: "src.bin".into(),
                size: 6,
                blake3: blake3::hash(b"onetwo").to_hex().to_string(),
            },
            compressed: false,
            encrypted: false,
            bounds: ChunkBounds::default(),
            parity_backend: Some("reed-solomon".into()),
        };
        set.save().unwrap();

        let back = ChunkSet::load(dir.path(), "chunk").unwrap();
        assert_eq!(back.data, set.data);
        assert_eq!(back.parity, set.parity);
        assert_eq!(back.next_ordinal, 4);
        assert_eq!(back.source, set.source);
        assert_eq!(back.parity_backend.as_deref(), Some("reed-solomon"));
        assert_eq!(back.transformed_size(), 6);
    }

    #[test]
    fn missing_manifest_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ChunkSet::load(dir.path(), "chunk"),
            Err(VaultError::Io(_))
        ));
    }
}
