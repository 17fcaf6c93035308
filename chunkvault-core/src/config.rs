use crate::chunking::planner::{SizePlan, plan};
use crate::container::identity::DEFAULT_PREFIX;
use crate::container::trailer::TRAILER_LEN;
use crate::crypto::key::CipherKey;
use crate::error::{Result, VaultError};
use serde::{Deserialize, Serialize};

/// Payload size bounds for data chunks. The defaults leave room for the
/// checksum trailer so on-disk files land on round sizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkBounds {
    pub min: u64,
    pub target: u64,
    pub max: u64,
}

impl Default for ChunkBounds {
    fn default() -> Self {
        Self {
            min: 1_000_000 - TRAILER_LEN,
            target: 1_500_000 - TRAILER_LEN,
            max: 2_000_000 - TRAILER_LEN,
        }
    }
}

impl ChunkBounds {
    pub fn new(min: u64, target: u64, max: u64) -> Result<Self> {
        let b = Self { min, target, max };
        b.validate()?;
        Ok(b)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min == 0 || self.min >= self.target || self.target >= self.max {
            return Err(VaultError::Bounds(format!(
                "require 0 < min < target < max, got min={} target={} max={}",
                self.min, self.target, self.max
            )));
        }
        Ok(())
    }

    pub fn plan(&self, data_size: u64) -> SizePlan {
        plan(data_size, self.min, self.target, self.max)
    }
}

/// When the combiner hands a chunk set with parity to the repair tool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepairPolicy {
    /// Repair whenever parity chunks are present, before any verification.
    #[default]
    Always,
    /// Verify first; repair only if some data chunk is missing or corrupt.
    OnChecksumFailure,
    /// Never repair; a damaged chunk aborts the combine.
    Never,
}

#[derive(Clone, Debug)]
pub struct SplitOptions {
    pub compress: bool,
    pub encrypt: bool,
    /// Required when `encrypt` is set.
    pub key: Option<CipherKey>,
    pub bounds: ChunkBounds,
    /// Name prefix for the final chunk files.
    pub prefix: String,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            compress: false,
            encrypt: false,
            key: None,
            bounds: ChunkBounds::default(),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

impl SplitOptions {
    /// The key to encrypt with, or `None` when encryption is off.
    pub fn cipher_key(&self) -> Result<Option<&CipherKey>> {
        resolve_key(self.encrypt, self.key.as_ref())
    }
}

#[derive(Clone, Debug, Default)]
pub struct CombineOptions {
    pub decompress: bool,
    pub decrypt: bool,
    pub key: Option<CipherKey>,
    pub repair: RepairPolicy,
}

impl CombineOptions {
    pub fn cipher_key(&self) -> Result<Option<&CipherKey>> {
        resolve_key(self.decrypt, self.key.as_ref())
    }
}

fn resolve_key(enabled: bool, key: Option<&CipherKey>) -> Result<Option<&CipherKey>> {
    match (enabled, key) {
        (false, _) => Ok(None),
        (true, Some(k)) => Ok(Some(k)),
        (true, None) => Err(VaultError::Key(
            "encryption requested but no key supplied".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bounds_are_valid() {
        let b = ChunkBounds::default();
        b.validate().unwrap();
        assert_eq!(b.min, 999_996);
    }

    #[test]
    fn rejects_unordered_bounds() {
        assert!(ChunkBounds::new(10, 10, 20).is_err());
        assert!(ChunkBounds::new(10, 15, 15).is_err());
        assert!(ChunkBounds::new(0, 1, 2).is_err());
        assert!(ChunkBounds::new(1, 2, 3).is_ok());
    }

    #[test]
    fn encrypt_without_key_is_an_error() {
        let opts = SplitOptions {
            encrypt: true,
            ..Default::default()
        };
        assert!(matches!(opts.cipher_key(), Err(VaultError::Key(_))));
        assert!(SplitOptions::default().cipher_key().unwrap().is_none());
    }
}
