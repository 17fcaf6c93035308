use crate::chunking::planner::SizePlan;
use crate::config::SplitOptions;
use crate::container::identity::{self, PROVISIONAL_PREFIX};
use crate::container::manifest::{SourceMeta, manifest_path};
use crate::container::store::ChunkStore;
use crate::domain::{Chunk, ChunkKind, ChunkSet};
use crate::error::{Result, VaultError};
use crate::pipeline::ForwardPipeline;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

const READ_BUF: usize = 1 << 16;

/// Where the bytes currently being sliced end up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Fixed `max`-sized staging chunks, used while the compressed size is unknown.
    Provisional,
    /// Chunks cut to the size plan under the final prefix.
    Final,
}

enum Sizing {
    Fixed(u64),
    Planned(VecDeque<u64>),
}

/// Cuts a byte stream into chunks as bytes arrive.
struct Slicer<'a> {
    store: &'a mut ChunkStore,
    stage: Stage,
    sizing: Sizing,
    target: Option<u64>,
    current: Vec<u8>,
    chunks: Vec<Chunk>,
}

impl<'a> Slicer<'a> {
    fn fixed(store: &'a mut ChunkStore, size: u64) -> Self {
        Self::new(store, Stage::Provisional, Sizing::Fixed(size))
    }

    fn planned(store: &'a mut ChunkStore, plan: SizePlan) -> Self {
        Self::new(store, Stage::Final, Sizing::Planned(plan.into_sizes().into()))
    }

    fn new(store: &'a mut ChunkStore, stage: Stage, mut sizing: Sizing) -> Self {
        let target = Self::next_target(&mut sizing);
        Self {
            store,
            stage,
            sizing,
            target,
            current: Vec::new(),
            chunks: Vec::new(),
        }
    }

    fn next_target(sizing: &mut Sizing) -> Option<u64> {
        match sizing {
            Sizing::Fixed(n) => Some(*n),
            Sizing::Planned(q) => q.pop_front(),
        }
    }

    fn push(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            let Some(target) = self.target else {
                return Err(VaultError::SizeInvariant {
                    invariant: "bytes-beyond-plan",
                    expected: 0,
                    observed: bytes.len() as u64,
                });
            };
            let room = (target as usize).saturating_sub(self.current.len());
            let take = room.min(bytes.len());
            self.current.extend_from_slice(&bytes[..take]);
            bytes = &bytes[take..];
            if self.current.len() as u64 == target {
                self.flush()?;
                self.target = Self::next_target(&mut self.sizing);
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let payload = std::mem::take(&mut self.current);
        let chunk = self.store.create(&payload, ChunkKind::Data)?;
        debug!(stage = ?self.stage, seq = chunk.sequence, len = chunk.payload_len, "sliced");
        self.chunks.push(chunk);
        Ok(())
    }

    /// Persist the short tail, if any. An empty stream still yields one chunk.
    fn finish(mut self) -> Result<Vec<Chunk>> {
        if !self.current.is_empty() || self.chunks.is_empty() {
            self.flush()?;
        }
        Ok(self.chunks)
    }
}

/// Read `src` through the pipeline, handing every produced byte to `sink`.
/// Returns the BLAKE3 of the raw source bytes and how many there were.
fn pump(
    src: &Path,
    pipeline: &mut ForwardPipeline,
    mut sink: impl FnMut(&[u8]) -> Result<()>,
) -> Result<(blake3::Hash, u64)> {
    let mut f = File::open(src)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; READ_BUF];
    let mut read = 0u64;
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        read += n as u64;
        hasher.update(&buf[..n]);
        let out = pipeline.update(&buf[..n])?;
        sink(&out)?;
    }
    let tail = pipeline.finish()?;
    sink(&tail)?;
    Ok((hasher.finalize(), read))
}

/// Move the staged chunks into `out_dir`. If a move fails, the chunks
/// already moved are removed again so `out_dir` keeps its previous contents.
fn commit(staged: Vec<Chunk>, out_dir: &Path) -> Result<Vec<Chunk>> {
    let mut moved: Vec<Chunk> = Vec::with_capacity(staged.len());
    for c in staged {
        let dest = out_dir.join(c.file_name()?);
        if let Err(e) = fs::rename(&c.path, &dest) {
            for m in &moved {
                if let Err(undo) = fs::remove_file(&m.path) {
                    warn!(path = %m.path.display(), error = %undo, "rollback left a chunk behind");
                }
            }
            return Err(e.into());
        }
        moved.push(Chunk { path: dest, ..c });
    }
    Ok(moved)
}

fn check_total(invariant: &'static str, chunks: &[Chunk], expected: u64) -> Result<()> {
    let observed: u64 = chunks.iter().map(|c| c.payload_len).sum();
    if observed != expected {
        return Err(VaultError::SizeInvariant {
            invariant,
            expected,
            observed,
        });
    }
    Ok(())
}

/// Split `src` into checksummed chunks in `out_dir`.
///
/// Chunks are written into a staging directory inside `out_dir` and only
/// moved into place once the whole set is consistent, so a failed split
/// leaves `out_dir` as it was. The chunk-set manifest is written last; a
/// directory that already holds a manifest for the prefix is refused.
pub fn split_file(src: &Path, out_dir: &Path, opts: &SplitOptions) -> Result<ChunkSet> {
    opts.bounds.validate()?;
    let key = opts.cipher_key()?;
    fs::create_dir_all(out_dir)?;

    let manifest = manifest_path(out_dir, &opts.prefix);
    if manifest.exists() {
        return Err(VaultError::Format(format!(
            "{} already describes a chunk set; split into another directory or prefix",
            manifest.display()
        )));
    }
    let file_size = fs::metadata(src)?.len();
    let first = identity::next_ordinal(out_dir, &opts.prefix)?;
    let staging = tempfile::Builder::new()
        .prefix(".chunkvault-staging-")
        .tempdir_in(out_dir)?;
    let mut pipeline = ForwardPipeline::new(opts.compress, key)?;
    let mut store = ChunkStore::with_start(staging.path(), &opts.prefix, first);

    let (digest, read, staged) = if opts.compress {
        // Output size is unknown until deflate finishes: stage at max size, then re-cut.
        let mut provisional = ChunkStore::with_start(staging.path(), PROVISIONAL_PREFIX, 1);
        let mut slicer = Slicer::fixed(&mut provisional, opts.bounds.max);
        let (digest, read) = pump(src, &mut pipeline, |b| slicer.push(b))?;
        let temp_chunks = slicer.finish()?;

        let total: u64 = temp_chunks.iter().map(|c| c.payload_len).sum();
        let plan = opts.bounds.plan(total);
        debug!(total, chunks = plan.len(), "re-slicing provisional chunks");

        let mut slicer = Slicer::planned(&mut store, plan);
        for tc in &temp_chunks {
            let payload = tc.load()?;
            slicer.push(&payload)?;
            fs::remove_file(&tc.path)?;
        }
        let chunks = slicer.finish()?;
        check_total("restaged-payload-sum", &chunks, total)?;
        (digest, read, chunks)
    } else {
        let total = file_size + pipeline.header_len();
        let plan = opts.bounds.plan(total);
        let mut slicer = Slicer::planned(&mut store, plan);
        let (digest, read) = pump(src, &mut pipeline, |b| slicer.push(b))?;
        let chunks = slicer.finish()?;
        check_total("chunk-payload-sum", &chunks, read + pipeline.header_len())?;
        (digest, read, chunks)
    };

    if read != file_size {
        return Err(VaultError::SizeInvariant {
            invariant: "source-size",
            expected: file_size,
            observed: read,
        });
    }

    let data = commit(staged, out_dir)?;

    let set = ChunkSet {
        dir: out_dir.to_path_buf(),
        prefix: opts.prefix.clone(),
        next_ordinal: store.next_ordinal(),
        data,
        parity: Vec::new(),
        source: SourceMeta {
            name: src
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            size: file_size,
            blake3: digest.to_hex().to_string(),
        },
        compressed: opts.compress,
        encrypted: key.is_some(),
        bounds: opts.bounds,
        parity_backend: None,
    };
    set.save()?;

    let stats = set.stats();
    info!(
        src = %src.display(),
        chunks = stats.data_chunks,
        source_size = stats.source_size,
        transformed_size = stats.transformed_size,
        ratio = format_args!("{:.3}", stats.compression_ratio),
        "split complete"
    );
    Ok(set)
}
