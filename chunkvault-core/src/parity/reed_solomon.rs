use super::{ParityBackend, ParityLayout};
use crate::container::trailer;
use crate::error::{Result, VaultError};
use reed_solomon_erasure::galois_8::ReedSolomon;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const RS_MAGIC: &[u8; 4] = b"CVRS";
pub const RS_VERSION: u16 = 1;
/// GF(2^8) caps data + parity shards.
pub const MAX_SHARDS: usize = 256;

/// Header in front of each parity shard.
#[derive(Clone, Debug, PartialEq, Eq)]
struct ShardHeader {
    parity_index: u32,
    data_count: u32,
    parity_count: u32,
    shard_size: u64,
    /// On-disk length of every data chunk file, in sequence order.
    data_lens: Vec<u64>,
}

impl ShardHeader {
    fn write_to(&self, mut w: impl Write) -> io::Result<()> {
        w.write_all(RS_MAGIC)?;
        w.write_all(&RS_VERSION.to_le_bytes())?;
        w.write_all(&self.parity_index.to_le_bytes())?;
        w.write_all(&self.data_count.to_le_bytes())?;
        w.write_all(&self.parity_count.to_le_bytes())?;
        w.write_all(&self.shard_size.to_le_bytes())?;
        for l in &self.data_lens {
            w.write_all(&l.to_le_bytes())?;
        }
        Ok(())
    }

    fn read_from(mut r: impl Read) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != RS_MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad parity magic"));
        }
        let mut v = [0u8; 2];
        r.read_exact(&mut v)?;
        if u16::from_le_bytes(v) != RS_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "unsupported parity version",
            ));
        }
        let mut b4 = [0u8; 4];
        let mut b8 = [0u8; 8];
        r.read_exact(&mut b4)?;
        let parity_index = u32::from_le_bytes(b4);
        r.read_exact(&mut b4)?;
        let data_count = u32::from_le_bytes(b4);
        r.read_exact(&mut b4)?;
        let parity_count = u32::from_le_bytes(b4);
        r.read_exact(&mut b8)?;
        let shard_size = u64::from_le_bytes(b8);
        if data_count as usize + parity_count as usize > MAX_SHARDS || parity_index >= parity_count
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "parity header out of range",
            ));
        }
        let mut data_lens = Vec::with_capacity(data_count as usize);
        for _ in 0..data_count {
            r.read_exact(&mut b8)?;
            let len = u64::from_le_bytes(b8);
            if len > shard_size {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "data length exceeds parity shard size",
                ));
            }
            data_lens.push(len);
        }
        Ok(Self {
            parity_index,
            data_count,
            parity_count,
            shard_size,
            data_lens,
        })
    }

    fn same_set(&self, other: &Self) -> bool {
        self.data_count == other.data_count
            && self.parity_count == other.parity_count
            && self.shard_size == other.shard_size
            && self.data_lens == other.data_lens
    }
}

/// In-process Reed–Solomon: one shard per data chunk file, zero-padded to
/// the block size.
#[derive(Clone, Debug, Default)]
pub struct ReedSolomonBackend;

impl ReedSolomonBackend {
    pub fn new() -> Self {
        Self
    }

    fn failure(reason: impl Into<String>) -> VaultError {
        VaultError::ExternalTool {
            tool: "reed-solomon".into(),
            reason: reason.into(),
        }
    }

    fn codec(data: usize, parity: usize) -> Result<ReedSolomon> {
        if data + parity > MAX_SHARDS {
            return Err(Self::failure(format!(
                "{data} data + {parity} parity shards exceeds {MAX_SHARDS}"
            )));
        }
        ReedSolomon::new(data, parity).map_err(|e| Self::failure(format!("{e:?}")))
    }
}

fn read_padded(path: &Path, shard_size: usize) -> Result<Vec<u8>> {
    let mut bytes = fs::read(path)?;
    if bytes.len() > shard_size {
        return Err(VaultError::SizeInvariant {
            invariant: "parity-block-size",
            expected: shard_size as u64,
            observed: bytes.len() as u64,
        });
    }
    bytes.resize(shard_size, 0);
    Ok(bytes)
}

/// Intact means present, the recorded length, and a matching trailer.
fn intact(path: &Path, expected_len: u64) -> bool {
    match fs::metadata(path) {
        Ok(md) if md.len() == expected_len => {
            trailer::check_file(path).is_ok_and(|c| c.is_valid())
        }
        _ => false,
    }
}

impl ParityBackend for ReedSolomonBackend {
    fn name(&self) -> &str {
        "reed-solomon"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn create(&self, dir: &Path, data: &[PathBuf], layout: &ParityLayout) -> Result<Vec<PathBuf>> {
        let parity_count = layout.block_count as usize;
        let rs = Self::codec(data.len(), parity_count)?;
        let shard_size = layout.block_size as usize;

        let mut data_lens = Vec::with_capacity(data.len());
        let mut shards = Vec::with_capacity(data.len() + parity_count);
        for p in data {
            data_lens.push(fs::metadata(p)?.len());
            shards.push(read_padded(p, shard_size)?);
        }
        shards.extend((0..parity_count).map(|_| vec![0u8; shard_size]));
        rs.encode(&mut shards)
            .map_err(|e| Self::failure(format!("{e:?}")))?;

        let mut produced = Vec::with_capacity(parity_count);
        for (i, shard) in shards[data.len()..].iter().enumerate() {
            let header = ShardHeader {
                parity_index: i as u32,
                data_count: data.len() as u32,
                parity_count: parity_count as u32,
                shard_size: shard_size as u64,
                data_lens: data_lens.clone(),
            };
            let path = dir.join(format!("rs-parity-{i:03}.bin"));
            let mut w = io::BufWriter::new(fs::File::create(&path)?);
            header.write_to(&mut w)?;
            w.write_all(shard)?;
            w.flush()?;
            produced.push(path);
        }
        debug!(shards = shards.len(), shard_size, "reed-solomon parity computed");
        Ok(produced)
    }

    fn repair(&self, _dir: &Path, data: &[PathBuf], parity: &[PathBuf]) -> Result<()> {
        let mut header: Option<ShardHeader> = None;
        let mut parity_shards: Vec<(usize, Vec<u8>)> = Vec::with_capacity(parity.len());
        for p in parity {
            let bytes = fs::read(p)?;
            let mut r = &bytes[..];
            let h = ShardHeader::read_from(&mut r)
                .map_err(|e| VaultError::Format(format!("{}: {e}", p.display())))?;
            if r.len() as u64 != h.shard_size {
                return Err(VaultError::SizeInvariant {
                    invariant: "parity-shard-size",
                    expected: h.shard_size,
                    observed: r.len() as u64,
                });
            }
            if let Some(first) = &header {
                if !first.same_set(&h) {
                    return Err(VaultError::Format(format!(
                        "{} belongs to a different parity set",
                        p.display()
                    )));
                }
            }
            parity_shards.push((h.parity_index as usize, r.to_vec()));
            header.get_or_insert(h);
        }
        let Some(h) = header else {
            return Ok(());
        };
        if data.len() != h.data_count as usize {
            return Err(VaultError::SizeInvariant {
                invariant: "parity-data-count",
                expected: u64::from(h.data_count),
                observed: data.len() as u64,
            });
        }

        let damaged: Vec<usize> = (0..data.len())
            .filter(|&i| !intact(&data[i], h.data_lens[i]))
            .collect();
        if damaged.is_empty() {
            debug!("all data chunks intact, nothing to repair");
            return Ok(());
        }

        let shard_size = h.shard_size as usize;
        let mut shards: Vec<Option<Vec<u8>>> =
            vec![None; h.data_count as usize + h.parity_count as usize];
        for (i, p) in data.iter().enumerate() {
            if !damaged.contains(&i) {
                shards[i] = Some(read_padded(p, shard_size)?);
            }
        }
        for (idx, shard) in parity_shards {
            shards[data.len() + idx] = Some(shard);
        }

        let rs = Self::codec(h.data_count as usize, h.parity_count as usize)?;
        rs.reconstruct_data(&mut shards)
            .map_err(|e| Self::failure(format!("{e:?} ({} chunks damaged)", damaged.len())))?;

        for &i in &damaged {
            let Some(shard) = shards[i].as_ref() else {
                return Err(Self::failure(format!("shard {i} not reconstructed")));
            };
            fs::write(&data[i], &shard[..h.data_lens[i] as usize])?;
        }
        info!(restored = damaged.len(), "reed-solomon repair complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let h = ShardHeader {
            parity_index: 1,
            data_count: 3,
            parity_count: 2,
            shard_size: 1024,
            data_lens: vec![1024, 1000, 12],
        };
        let mut buf = Vec::new();
        h.write_to(&mut buf).unwrap();
        assert_eq!(ShardHeader::read_from(&buf[..]).unwrap(), h);
    }

    #[test]
    fn header_rejects_lengths_beyond_shard() {
        let h = ShardHeader {
            parity_index: 0,
            data_count: 2,
            parity_count: 1,
            shard_size: 1024,
            data_lens: vec![1024, 2000],
        };
        let mut buf = Vec::new();
        h.write_to(&mut buf).unwrap();
        let err = ShardHeader::read_from(&buf[..]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn header_rejects_garbage() {
        assert!(ShardHeader::read_from(&b"XXXX\x01\x00"[..]).is_err());
    }

    #[test]
    fn too_many_shards_is_rejected() {
        assert!(ReedSolomonBackend::codec(250, 10).is_err());
        assert!(ReedSolomonBackend::codec(246, 10).is_ok());
    }
}
