use crate::config::{CombineOptions, RepairPolicy};
use crate::crypto::key::CipherKey;
use crate::domain::{Chunk, ChunkSet};
use crate::error::{Result, VaultError};
use crate::parity::ParityManager;
use crate::pipeline::InversePipeline;
use crate::read::verify::verify_chunks;
use crate::stats::CombineReport;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Per-chunk progress through the combine. `Failed` aborts the whole run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    Unverified,
    Verified,
    Decrypted,
    Decompressed,
    Appended,
    Failed,
}

/// Split off the parity chunks trailing the data chunks.
fn partition(chunks: &[Chunk]) -> Result<(&[Chunk], &[Chunk])> {
    let data_end = chunks
        .iter()
        .rposition(|c| !c.is_parity())
        .map_or(0, |i| i + 1);
    let (data, parity) = chunks.split_at(data_end);
    if let Some(stray) = data.iter().find(|c| c.is_parity()) {
        return Err(VaultError::Format(format!(
            "parity chunk {} precedes data chunks",
            stray.path.display()
        )));
    }
    for w in data.windows(2) {
        if w[1].sequence != w[0].sequence + 1 {
            return Err(VaultError::Format(format!(
                "data chunks out of sequence: {} followed by {}",
                w[0].sequence, w[1].sequence
            )));
        }
    }
    Ok((data, parity))
}

fn maybe_repair(
    data: &[Chunk],
    parity: &[Chunk],
    policy: RepairPolicy,
    manager: Option<&ParityManager<'_>>,
    parity_backend: Option<&str>,
) -> Result<bool> {
    if parity.is_empty() || policy == RepairPolicy::Never {
        return Ok(false);
    }
    let Some(m) = manager.filter(|m| m.backend().is_available()) else {
        warn!("parity present but no repair backend available");
        return Ok(false);
    };
    m.check_backend(parity_backend)?;
    if policy == RepairPolicy::OnChecksumFailure && verify_chunks(data)?.is_clean() {
        return Ok(false);
    }
    m.repair(data, parity)?;
    Ok(true)
}

fn combine_into(
    chunks: &[Chunk],
    out: &Path,
    opts: &CombineOptions,
    manager: Option<&ParityManager<'_>>,
    recorded: Option<&ChunkSet>,
) -> Result<CombineReport> {
    let key = opts.cipher_key()?;
    let (data, parity) = partition(chunks)?;
    if data.is_empty() {
        return Err(VaultError::Format("no data chunks to combine".into()));
    }
    let repaired = maybe_repair(
        data,
        parity,
        opts.repair,
        manager,
        recorded.and_then(|s| s.parity_backend.as_deref()),
    )?;

    let parent = match out.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = tempfile::NamedTempFile::new_in(parent)?;
    let mut w = BufWriter::new(tmp.as_file());
    let mut pipeline = InversePipeline::new(opts.decompress, key);
    let mut hasher = blake3::Hasher::new();
    let mut written = 0u64;

    for c in data {
        let mut state = ChunkState::Unverified;
        let step = (|| -> Result<()> {
            let payload = c.load()?;
            state = ChunkState::Verified;
            let plain = pipeline.decrypt(&payload)?;
            state = ChunkState::Decrypted;
            let bytes = pipeline.decompress(plain)?;
            state = ChunkState::Decompressed;
            w.write_all(&bytes)?;
            hasher.update(&bytes);
            written += bytes.len() as u64;
            state = ChunkState::Appended;
            Ok(())
        })();
        if let Err(e) = step {
            warn!(seq = c.sequence, last_state = ?state, next = ?ChunkState::Failed, error = %e, "combine aborted");
            return Err(e);
        }
        debug!(seq = c.sequence, ?state, "chunk appended");
    }

    let tail = pipeline.finish()?;
    w.write_all(&tail)?;
    hasher.update(&tail);
    written += tail.len() as u64;
    w.flush()?;
    drop(w);

    let digest = hasher.finalize().to_hex().to_string();
    let expected = recorded
        .map(|s| s.source.blake3.as_str())
        .filter(|d| !d.is_empty());
    if let Some(expected) = expected {
        if expected != digest {
            return Err(VaultError::Integrity {
                expected: expected.to_string(),
                computed: digest,
            });
        }
    }
    tmp.persist(out).map_err(|e| VaultError::Io(e.error))?;

    info!(out = %out.display(), bytes = written, chunks = data.len(), repaired, "combine complete");
    Ok(CombineReport {
        bytes_written: written,
        data_chunks: data.len(),
        blake3: digest,
        repaired,
    })
}

/// Reassemble the original byte stream from `chunks` into `out`.
///
/// `chunks` holds the data chunks in ascending sequence order, optionally
/// followed by parity chunks. The output file only appears once every chunk
/// verified and decoded cleanly.
pub fn combine_chunks(
    chunks: &[Chunk],
    out: &Path,
    opts: &CombineOptions,
    parity: Option<&ParityManager<'_>>,
) -> Result<CombineReport> {
    combine_into(chunks, out, opts, parity, None)
}

/// Combine a chunk set loaded from its manifest, checking the result
/// against the recorded source digest. Repair is refused when `parity`
/// is not the backend that produced the set's parity chunks.
pub fn combine_set(
    set: &ChunkSet,
    out: &Path,
    key: Option<&CipherKey>,
    repair: RepairPolicy,
    parity: Option<&ParityManager<'_>>,
) -> Result<CombineReport> {
    let opts = CombineOptions {
        decompress: set.compressed,
        decrypt: set.encrypted,
        key: key.cloned(),
        repair,
    };
    combine_into(&set.chunks(), out, &opts, parity, Some(set))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChunkKind;
    use std::path::PathBuf;

    fn chunk(seq: u64, kind: ChunkKind) -> Chunk {
        Chunk {
            sequence: seq,
            kind,
            path: PathBuf::from(format!("chunk_{seq:09}")),
            payload_len: 1,
            crc32: 0,
        }
    }

    #[test]
    fn partition_pops_trailing_parity() {
        let chunks = vec![
            chunk(1, ChunkKind::Data),
            chunk(2, ChunkKind::Data),
            chunk(3, ChunkKind::Parity),
        ];
        let (d, p) = partition(&chunks).unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn partition_rejects_gaps_and_stray_parity() {
        let gap = vec![chunk(1, ChunkKind::Data), chunk(3, ChunkKind::Data)];
        assert!(partition(&gap).is_err());
        let stray = vec![
            chunk(1, ChunkKind::Parity),
            chunk(2, ChunkKind::Data),
        ];
        assert!(partition(&stray).is_err());
    }
}
