use super::Transform;
use crate::error::{Result, VaultError};
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::Write;

const OUT_STEP: usize = 64 * 1024;

/// zlib-wrapped deflate at the best compression level.
pub struct DeflateCompressor {
    inner: ZlibEncoder<Vec<u8>>,
    finished: bool,
}

impl DeflateCompressor {
    pub fn new() -> Self {
        Self {
            inner: ZlibEncoder::new(Vec::new(), Compression::best()),
            finished: false,
        }
    }
}

impl Default for DeflateCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for DeflateCompressor {
    fn stage(&self) -> &'static str {
        "deflate"
    }

    fn update(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        self.inner.write_all(input)?;
        Ok(std::mem::take(self.inner.get_mut()))
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        if self.finished {
            return Ok(Vec::new());
        }
        self.inner.try_finish()?;
        self.finished = true;
        Ok(std::mem::take(self.inner.get_mut()))
    }
}

/// Inflate side. Counts bytes that arrive after the end of the zlib stream
/// so `finish` can reject trailing data.
pub struct DeflateDecompressor {
    inner: Decompress,
    ended: bool,
    trailing: u64,
}

impl DeflateDecompressor {
    pub fn new() -> Self {
        Self {
            inner: Decompress::new(true),
            ended: false,
            trailing: 0,
        }
    }

    pub fn trailing_bytes(&self) -> u64 {
        self.trailing
    }
}

impl Default for DeflateDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for DeflateDecompressor {
    fn stage(&self) -> &'static str {
        "inflate"
    }

    fn update(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(input.len().saturating_mul(2).max(OUT_STEP));
        let mut rest = input;
        loop {
            if self.ended {
                self.trailing += rest.len() as u64;
                break;
            }
            if rest.is_empty() && out.len() < out.capacity() {
                break;
            }
            if out.len() == out.capacity() {
                out.reserve(OUT_STEP);
            }
            let in_before = self.inner.total_in();
            let out_before = out.len();
            let status = self
                .inner
                .decompress_vec(rest, &mut out, FlushDecompress::None)
                .map_err(|e| VaultError::Compression(e.to_string()))?;
            let consumed = (self.inner.total_in() - in_before) as usize;
            rest = &rest[consumed..];
            if status == Status::StreamEnd {
                self.ended = true;
                continue;
            }
            if consumed == 0 && out.len() == out_before {
                if rest.is_empty() {
                    break;
                }
                return Err(VaultError::Compression("inflate made no progress".into()));
            }
        }
        Ok(out)
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        if !self.ended {
            return Err(VaultError::Compression(
                "deflate stream ended early (truncated input)".into(),
            ));
        }
        if self.trailing != 0 {
            return Err(VaultError::SizeInvariant {
                invariant: "inflate-unconsumed-tail",
                expected: 0,
                observed: self.trailing,
            });
        }
        Ok(Vec::new())
    }
}
