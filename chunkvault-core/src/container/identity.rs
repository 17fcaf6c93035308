use crate::error::{Result, VaultError};
use std::path::Path;
use walkdir::WalkDir;

pub const DEFAULT_PREFIX: &str = "chunk";
/// Staging prefix for provisional chunks; never parses as a `chunk_` ordinal.
pub const PROVISIONAL_PREFIX: &str = "tmp_chunk";
pub const ORDINAL_WIDTH: usize = 9;
pub const MAX_ORDINAL: u64 = 999_999_999;

/// `{prefix}_{ordinal}` with the ordinal zero-padded so names sort numerically.
pub fn chunk_name(prefix: &str, ordinal: u64) -> Result<String> {
    if ordinal == 0 || ordinal > MAX_ORDINAL {
        return Err(VaultError::Format(format!(
            "chunk ordinal {ordinal} outside 1..={MAX_ORDINAL}"
        )));
    }
    Ok(format!("{prefix}_{ordinal:0width$}", width = ORDINAL_WIDTH))
}

pub fn parse_ordinal(prefix: &str, name: &str) -> Option<u64> {
    let digits = name.strip_prefix(prefix)?.strip_prefix('_')?;
    if digits.len() != ORDINAL_WIDTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `1 + max(existing ordinals for prefix)`, or 1 for a fresh directory.
pub fn next_ordinal(dir: &Path, prefix: &str) -> Result<u64> {
    if !dir.exists() {
        return Ok(1);
    }
    let mut max = 0u64;
    for e in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let e = e.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        if !e.file_type().is_file() {
            continue;
        }
        if let Some(n) = e.file_name().to_str().and_then(|s| parse_ordinal(prefix, s)) {
            max = max.max(n);
        }
    }
    Ok(max + 1)
}
