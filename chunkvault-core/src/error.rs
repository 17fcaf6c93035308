use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    /// A chunk's stored CRC32 does not match its payload.
    #[error("checksum mismatch in {}: stored {stored:08x}, computed {computed:08x}", path.display())]
    Checksum {
        path: PathBuf,
        stored: u32,
        computed: u32,
    },

    /// Produced or consumed byte counts disagree with what the plan promised.
    #[error("size invariant `{invariant}` violated: expected {expected}, observed {observed}")]
    SizeInvariant {
        invariant: &'static str,
        expected: u64,
        observed: u64,
    },

    #[error("parity tool `{tool}` failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    /// A stream stage returned bytes from `finish()` that it must not buffer.
    #[error("transform stage `{stage}` left {leftover} bytes at finalization")]
    TransformFinalization { stage: &'static str, leftover: usize },

    #[error("compression stream error: {0}")]
    Compression(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("invalid chunk bounds: {0}")]
    Bounds(String),

    #[error("reconstructed stream digest {computed} does not match recorded {expected}")]
    Integrity { expected: String, computed: String },
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_invariant_names_the_invariant() {
        let err = VaultError::SizeInvariant {
            invariant: "chunk-payload-sum",
            expected: 10,
            observed: 7,
        };
        assert_eq!(
            err.to_string(),
            "size invariant `chunk-payload-sum` violated: expected 10, observed 7"
        );
    }

    #[test]
    fn checksum_error_shows_both_values() {
        let err = VaultError::Checksum {
            path: PathBuf::from("chunk_000000001"),
            stored: 0xdead_beef,
            computed: 0x0000_0001,
        };
        let msg = err.to_string();
        assert!(msg.contains("chunk_000000001"));
        assert!(msg.contains("deadbeef"));
        assert!(msg.contains("00000001"));
    }
}
