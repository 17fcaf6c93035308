//! Per-chunk integrity trailer: `payload ++ crc32(payload)` little-endian.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

pub const TRAILER_LEN: u64 = 4;

pub fn checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Write `payload` followed by its trailer; returns the CRC written.
pub fn write_with_trailer<W: Write>(mut w: W, payload: &[u8]) -> io::Result<u32> {
    let crc = checksum(payload);
    w.write_all(payload)?;
    w.write_all(&crc.to_le_bytes())?;
    Ok(crc)
}

/// Outcome of checking one stored chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrailerCheck {
    pub stored: u32,
    pub computed: u32,
    pub payload_len: u64,
}

impl TrailerCheck {
    pub fn is_valid(&self) -> bool {
        self.stored == self.computed
    }
}

/// Split a whole chunk file into payload and stored CRC.
pub fn split_trailer(bytes: &[u8]) -> io::Result<(&[u8], u32)> {
    if (bytes.len() as u64) < TRAILER_LEN {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "file too small for checksum trailer",
        ));
    }
    let (payload, tail) = bytes.split_at(bytes.len() - TRAILER_LEN as usize);
    let mut crc = [0u8; 4];
    crc.copy_from_slice(tail);
    Ok((payload, u32::from_le_bytes(crc)))
}

/// Stream the file through a CRC32 without holding it in memory.
pub fn check_file(path: &Path) -> io::Result<TrailerCheck> {
    let mut f = File::open(path)?;
    let len = f.metadata()?.len();
    if len < TRAILER_LEN {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "file too small for checksum trailer",
        ));
    }
    let payload_len = len - TRAILER_LEN;
    let mut hasher = crc32fast::Hasher::new();
    let mut left = payload_len;
    let mut buf = vec![0u8; 1 << 16];
    while left > 0 {
        let n = buf.len().min(left as usize);
        f.read_exact(&mut buf[..n])?;
        hasher.update(&buf[..n]);
        left -= n as u64;
    }
    let mut crc = [0u8; 4];
    f.read_exact(&mut crc)?;
    Ok(TrailerCheck {
        stored: u32::from_le_bytes(crc),
        computed: hasher.finalize(),
        payload_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailer_is_little_endian_crc() {
        let mut buf = Vec::new();
        let crc = write_with_trailer(&mut buf, b"hello").unwrap();
        assert_eq!(crc, crc32fast::hash(b"hello"));
        assert_eq!(&buf[5..], &crc.to_le_bytes());
        let (payload, stored) = split_trailer(&buf).unwrap();
        assert_eq!(payload, b"hello");
        assert_eq!(stored, crc);
    }

    #[test]
    fn empty_payload_is_trailer_only() {
        let mut buf = Vec::new();
        write_with_trailer(&mut buf, b"").unwrap();
        assert_eq!(buf.len(), 4);
        assert!(split_trailer(&buf[..3]).is_err());
    }

    #[test]
    fn check_file_detects_flipped_byte() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("c");
        let mut buf = Vec::new();
        write_with_trailer(&mut buf, &vec![7u8; 100_000]).unwrap();
        std::fs::write(&p, &buf).unwrap();
        let ok = check_file(&p).unwrap();
        assert!(ok.is_valid());
        assert_eq!(ok.payload_len, 100_000);

        buf[500] ^= 0x01;
        std::fs::write(&p, &buf).unwrap();
        assert!(!check_file(&p).unwrap().is_valid());
    }
}
