use crate::container::trailer;
use crate::domain::Chunk;
use crate::error::Result;
use std::io::ErrorKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkStatus {
    Ok,
    Corrupt { stored: u32, computed: u32 },
    Missing,
}

#[derive(Clone, Debug, Default)]
pub struct VerifyReport {
    pub entries: Vec<(Chunk, ChunkStatus)>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.entries.iter().all(|(_, s)| *s == ChunkStatus::Ok)
    }

    pub fn damaged(&self) -> impl Iterator<Item = &(Chunk, ChunkStatus)> {
        self.entries.iter().filter(|(_, s)| *s != ChunkStatus::Ok)
    }
}

/// Check every chunk's trailer, and its CRC against the one recorded for the
/// chunk, without stopping at the first failure.
/// Only I/O errors other than a missing file abort the scan.
pub fn verify_chunks(chunks: &[Chunk]) -> Result<VerifyReport> {
    let mut report = VerifyReport::default();
    for c in chunks {
        let status = match trailer::check_file(&c.path) {
            Ok(check) if !check.is_valid() => ChunkStatus::Corrupt {
                stored: check.stored,
                computed: check.computed,
            },
            // intact file, but not the one recorded for this slot
            Ok(check) if check.stored != c.crc32 => ChunkStatus::Corrupt {
                stored: c.crc32,
                computed: check.computed,
            },
            Ok(_) => ChunkStatus::Ok,
            Err(e) if e.kind() == ErrorKind::NotFound => ChunkStatus::Missing,
            // shorter than a trailer: nothing left to checksum
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => ChunkStatus::Corrupt {
                stored: 0,
                computed: 0,
            },
            Err(e) => return Err(e.into()),
        };
        report.entries.push((c.clone(), status));
    }
    Ok(report)
}
