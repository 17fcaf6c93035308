//! AES in CFB-128 mode. A stream mode: output length equals input length and
//! nothing is buffered across `finish`.

use crate::codec::Transform;
use crate::crypto::key::{CipherKey, IV_LEN};
use crate::error::{Result, VaultError};
use aes::{Aes128, Aes192, Aes256};
use cfb_mode::cipher::KeyIvInit;
use cfb_mode::{BufDecryptor, BufEncryptor};

enum Enc {
    Aes128(BufEncryptor<Aes128>),
    Aes192(BufEncryptor<Aes192>),
    Aes256(BufEncryptor<Aes256>),
}

enum Dec {
    Aes128(BufDecryptor<Aes128>),
    Aes192(BufDecryptor<Aes192>),
    Aes256(BufDecryptor<Aes256>),
}

fn bad_key(e: impl std::fmt::Display) -> VaultError {
    VaultError::Key(format!("cipher init: {e}"))
}

pub struct CfbEncryptor(Enc);

impl CfbEncryptor {
    pub fn new(key: &CipherKey, iv: &[u8; IV_LEN]) -> Result<Self> {
        let k = key.as_bytes();
        let enc = match k.len() {
            16 => Enc::Aes128(BufEncryptor::new_from_slices(k, iv).map_err(bad_key)?),
            24 => Enc::Aes192(BufEncryptor::new_from_slices(k, iv).map_err(bad_key)?),
            _ => Enc::Aes256(BufEncryptor::new_from_slices(k, iv).map_err(bad_key)?),
        };
        Ok(Self(enc))
    }
}

impl Transform for CfbEncryptor {
    fn stage(&self) -> &'static str {
        "aes-cfb-encrypt"
    }

    fn update(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut buf = input.to_vec();
        match &mut self.0 {
            Enc::Aes128(c) => c.encrypt(&mut buf),
            Enc::Aes192(c) => c.encrypt(&mut buf),
            Enc::Aes256(c) => c.encrypt(&mut buf),
        }
        Ok(buf)
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

pub struct CfbDecryptor(Dec);

impl CfbDecryptor {
    pub fn new(key: &CipherKey, iv: &[u8]) -> Result<Self> {
        if iv.len() != IV_LEN {
            return Err(VaultError::Format(format!(
                "IV must be {IV_LEN} bytes, got {}",
                iv.len()
            )));
        }
        let k = key.as_bytes();
        let dec = match k.len() {
            16 => Dec::Aes128(BufDecryptor::new_from_slices(k, iv).map_err(bad_key)?),
            24 => Dec::Aes192(BufDecryptor::new_from_slices(k, iv).map_err(bad_key)?),
            _ => Dec::Aes256(BufDecryptor::new_from_slices(k, iv).map_err(bad_key)?),
        };
        Ok(Self(dec))
    }
}

impl Transform for CfbDecryptor {
    fn stage(&self) -> &'static str {
        "aes-cfb-decrypt"
    }

    fn update(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut buf = input.to_vec();
        match &mut self.0 {
            Dec::Aes128(c) => c.decrypt(&mut buf),
            Dec::Aes192(c) => c.decrypt(&mut buf),
            Dec::Aes256(c) => c.decrypt(&mut buf),
        }
        Ok(buf)
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}
