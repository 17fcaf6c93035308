//! Forward-error-correction parity for finished chunk sets.
//!
//! The [`ParityBackend`] trait is the seam between chunk bookkeeping and the
//! code that actually computes redundancy:
//!
//! - [`Par2Cli`]: shells out to a `par2` binary found on `PATH`
//! - [`ReedSolomonBackend`]: in-process Reed–Solomon over GF(2^8)
//!
//! Backends work on whole chunk files (payload plus trailer). Their output
//! files are wrapped as parity chunks with their own trailers, so a parity
//! chunk is verified the same way as a data chunk.

use crate::container::store::ChunkStore;
use crate::domain::{Chunk, ChunkKind, ChunkSet};
use crate::error::{Result, VaultError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

mod par2;
mod reed_solomon;

pub use par2::Par2Cli;
pub use reed_solomon::ReedSolomonBackend;

pub const DEFAULT_PARITY_RATIO: f64 = 0.07;
/// Suffix the repair tool recognises parity files by.
pub const PARITY_FILE_SUFFIX: &str = "par2";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParityLayout {
    /// Largest data chunk file, rounded up to a multiple of 4.
    pub block_size: u64,
    /// Recovery blocks to compute.
    pub block_count: u32,
    /// Recovery files to spread them over.
    pub file_count: u32,
}

pub trait ParityBackend {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Compute redundancy for `data` (chunk files inside `dir`) and return the
    /// paths of the files produced. Transient artifacts are removed.
    fn create(&self, dir: &Path, data: &[PathBuf], layout: &ParityLayout) -> Result<Vec<PathBuf>>;

    /// Restore missing or damaged files among `data` in place using the
    /// prepared parity files.
    fn repair(&self, dir: &Path, data: &[PathBuf], parity: &[PathBuf]) -> Result<()>;
}

/// Round to nearest, halves away from zero.
fn parity_count(ratio: f64, data_chunks: usize) -> u32 {
    (ratio * data_chunks as f64).round().max(0.0) as u32
}

pub struct ParityManager<'a> {
    backend: &'a dyn ParityBackend,
    ratio: f64,
}

impl<'a> ParityManager<'a> {
    pub fn new(backend: &'a dyn ParityBackend) -> Self {
        Self {
            backend,
            ratio: DEFAULT_PARITY_RATIO,
        }
    }

    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn backend(&self) -> &dyn ParityBackend {
        self.backend
    }

    /// `None` when the set is too small for even one parity chunk.
    pub fn layout_for(&self, data: &[Chunk]) -> Option<ParityLayout> {
        let count = parity_count(self.ratio, data.len());
        if count < 1 {
            return None;
        }
        let largest = data.iter().map(Chunk::file_size).max().unwrap_or(0);
        Some(ParityLayout {
            block_size: largest.div_ceil(4) * 4,
            block_count: count,
            file_count: count,
        })
    }

    /// Compute parity for the set's data chunks and append the resulting
    /// parity chunks. Returns the chunks added; empty when skipped.
    pub fn add_parity(&self, set: &mut ChunkSet) -> Result<Vec<Chunk>> {
        if !self.backend.is_available() {
            info!(backend = self.backend.name(), "parity backend unavailable, skipping");
            return Ok(Vec::new());
        }
        if !set.parity.is_empty() {
            warn!(dir = %set.dir.display(), "chunk set already has parity, skipping");
            return Ok(Vec::new());
        }
        let Some(layout) = self.layout_for(&set.data) else {
            info!(chunks = set.data.len(), "too few chunks for parity, skipping");
            return Ok(Vec::new());
        };

        let data_paths: Vec<PathBuf> = set.data.iter().map(|c| c.path.clone()).collect();
        let produced = self.backend.create(&set.dir, &data_paths, &layout)?;

        let mut store = ChunkStore::with_start(&set.dir, &set.prefix, set.next_ordinal);
        let mut added = Vec::with_capacity(produced.len());
        for p in &produced {
            let bytes = fs::read(p)?;
            added.push(store.create(&bytes, ChunkKind::Parity)?);
            fs::remove_file(p)?;
        }
        set.next_ordinal = store.next_ordinal();
        set.parity.extend(added.iter().cloned());
        set.parity_backend = Some(self.backend.name().to_string());
        set.save()?;

        info!(
            backend = self.backend.name(),
            block_size = layout.block_size,
            parity_chunks = added.len(),
            "parity added"
        );
        Ok(added)
    }

    /// Parity files are only meaningful to the backend that wrote them.
    /// `recorded` is the backend name stored with the chunk set, if known.
    pub fn check_backend(&self, recorded: Option<&str>) -> Result<()> {
        match recorded {
            Some(name) if name != self.backend.name() => Err(VaultError::Format(format!(
                "parity was produced by `{name}`, cannot repair with `{}`",
                self.backend.name()
            ))),
            _ => Ok(()),
        }
    }

    /// Hand the parity chunks to the backend to restore damaged data chunks.
    ///
    /// Each intact parity payload is written next to the data as
    /// `<chunk name>.par2`; those files are removed again afterwards, as are
    /// the `.1` backups par2 leaves for files it rewrote.
    pub fn repair(&self, data: &[Chunk], parity: &[Chunk]) -> Result<()> {
        let Some(dir) = data.first().and_then(|c| c.path.parent()) else {
            return Ok(());
        };
        let mut prepared = Vec::with_capacity(parity.len());
        for pc in parity {
            match pc.load() {
                Ok(payload) => {
                    let p = dir.join(format!("{}.{PARITY_FILE_SUFFIX}", pc.file_name()?));
                    fs::write(&p, payload)?;
                    prepared.push(p);
                }
                Err(e) => warn!(chunk = %pc.path.display(), error = %e, "damaged parity chunk ignored"),
            }
        }
        let data_paths: Vec<PathBuf> = data.iter().map(|c| c.path.clone()).collect();
        let outcome = if prepared.is_empty() {
            warn!("no intact parity chunks, repair skipped");
            Ok(())
        } else {
            self.backend.repair(dir, &data_paths, &prepared)
        };

        for p in prepared
            .iter()
            .cloned()
            .chain(data_paths.iter().map(|d| backup_path(d)))
        {
            if let Err(e) = fs::remove_file(&p) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(e.into());
                }
            }
        }
        outcome
    }
}

fn backup_path(p: &Path) -> PathBuf {
    let mut s = p.as_os_str().to_owned();
    s.push(".1");
    PathBuf::from(s)
}
