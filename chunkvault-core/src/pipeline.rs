//! Order-preserving byte transforms applied between the source file and the
//! chunk payloads.
//!
//! Forward: deflate (optional) then AES-CFB (optional). When encrypting, the
//! IV is emitted ahead of the first ciphertext byte so it lands at the start
//! of the first chunk. Inverse: peel the IV, decrypt, inflate.

use crate::codec::Transform;
use crate::codec::deflate::{DeflateCompressor, DeflateDecompressor};
use crate::crypto::cfb::{CfbDecryptor, CfbEncryptor};
use crate::crypto::key::{CipherKey, IV_LEN, random_iv};
use crate::error::{Result, VaultError};

/// A cipher stage has no business holding bytes back.
fn finish_stream_cipher(stage: &mut dyn Transform) -> Result<()> {
    let leftover = stage.finish()?;
    if !leftover.is_empty() {
        return Err(VaultError::TransformFinalization {
            stage: stage.stage(),
            leftover: leftover.len(),
        });
    }
    Ok(())
}

pub struct ForwardPipeline {
    compressor: Option<DeflateCompressor>,
    encryptor: Option<CfbEncryptor>,
    pending_iv: Option<[u8; IV_LEN]>,
}

impl ForwardPipeline {
    pub fn new(compress: bool, key: Option<&CipherKey>) -> Result<Self> {
        match key {
            Some(k) => Self::with_iv(compress, Some((k, random_iv()?))),
            None => Self::with_iv(compress, None),
        }
    }

    /// Build with a caller-chosen IV.
    pub fn with_iv(compress: bool, cipher: Option<(&CipherKey, [u8; IV_LEN])>) -> Result<Self> {
        let (encryptor, pending_iv) = match cipher {
            Some((key, iv)) => (Some(CfbEncryptor::new(key, &iv)?), Some(iv)),
            None => (None, None),
        };
        Ok(Self {
            compressor: compress.then(DeflateCompressor::new),
            encryptor,
            pending_iv,
        })
    }

    /// Bytes the stream grows by regardless of content.
    pub fn header_len(&self) -> u64 {
        if self.encryptor.is_some() {
            IV_LEN as u64
        } else {
            0
        }
    }

    fn emit(&mut self, data: Vec<u8>) -> Result<Vec<u8>> {
        let body = match self.encryptor.as_mut() {
            Some(enc) => enc.update(&data)?,
            None => data,
        };
        match self.pending_iv.take() {
            Some(iv) => {
                let mut out = Vec::with_capacity(IV_LEN + body.len());
                out.extend_from_slice(&iv);
                out.extend_from_slice(&body);
                Ok(out)
            }
            None => Ok(body),
        }
    }

    pub fn update(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let data = match self.compressor.as_mut() {
            Some(c) => c.update(input)?,
            None => input.to_vec(),
        };
        self.emit(data)
    }

    pub fn finish(&mut self) -> Result<Vec<u8>> {
        let data = match self.compressor.as_mut() {
            Some(c) => c.finish()?,
            None => Vec::new(),
        };
        let out = self.emit(data)?;
        if let Some(enc) = self.encryptor.as_mut() {
            finish_stream_cipher(enc)?;
        }
        Ok(out)
    }
}

pub struct InversePipeline {
    key: Option<CipherKey>,
    iv: Vec<u8>,
    decryptor: Option<CfbDecryptor>,
    decompressor: Option<DeflateDecompressor>,
}

impl InversePipeline {
    pub fn new(decompress: bool, key: Option<&CipherKey>) -> Self {
        Self {
            key: key.cloned(),
            iv: Vec::with_capacity(IV_LEN),
            decryptor: None,
            decompressor: decompress.then(DeflateDecompressor::new),
        }
    }

    /// Strip the IV (first bytes of the stream) and decrypt the rest.
    /// Pass-through when no key was given.
    pub fn decrypt(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let Some(key) = self.key.as_ref() else {
            return Ok(input.to_vec());
        };
        let mut rest = input;
        if self.decryptor.is_none() {
            let take = (IV_LEN - self.iv.len()).min(rest.len());
            self.iv.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.iv.len() < IV_LEN {
                return Ok(Vec::new());
            }
            self.decryptor = Some(CfbDecryptor::new(key, &self.iv)?);
        }
        match self.decryptor.as_mut() {
            Some(dec) => dec.update(rest),
            None => Ok(Vec::new()),
        }
    }

    pub fn decompress(&mut self, input: Vec<u8>) -> Result<Vec<u8>> {
        match self.decompressor.as_mut() {
            Some(d) => d.update(&input),
            None => Ok(input),
        }
    }

    pub fn update(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let plain = self.decrypt(input)?;
        self.decompress(plain)
    }

    pub fn finish(&mut self) -> Result<Vec<u8>> {
        if self.key.is_some() {
            match self.decryptor.as_mut() {
                Some(dec) => finish_stream_cipher(dec)?,
                None => {
                    return Err(VaultError::SizeInvariant {
                        invariant: "iv-prefix",
                        expected: IV_LEN as u64,
                        observed: self.iv.len() as u64,
                    });
                }
            }
        }
        match self.decompressor.as_mut() {
            Some(d) => d.finish(),
            None => Ok(Vec::new()),
        }
    }
}
