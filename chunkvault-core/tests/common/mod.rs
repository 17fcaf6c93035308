#![allow(dead_code)]

use chunkvault_core::{ChunkBounds, CipherKey};
use std::fs;
use std::path::{Path, PathBuf};

/// Small bounds so a few tens of KiB span many chunks.
pub fn small_bounds() -> ChunkBounds {
    ChunkBounds::new(1000, 1500, 2000).unwrap()
}

pub fn test_key() -> CipherKey {
    CipherKey::from_base64("AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=").unwrap()
}

/// Deterministic bytes: a xorshift stream with repeated runs mixed in so
/// deflate has something to do.
pub fn sample_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut x = seed | 1;
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        if x % 4 == 0 {
            let run = (x >> 8) as usize % 64;
            out.extend(std::iter::repeat_n(b'a' + (x % 26) as u8, run));
        } else {
            out.extend_from_slice(&x.to_le_bytes());
        }
    }
    out.truncate(len);
    out
}

pub fn write_source(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let p = dir.join(name);
    fs::write(&p, data).unwrap();
    p
}
