use crate::error::{Result, VaultError};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

pub const IV_LEN: usize = 16;

/// Symmetric key as handed over by key management: base64 text decoding to
/// 16, 24 or 32 bytes (AES-128/192/256).
#[derive(Clone, PartialEq, Eq)]
pub struct CipherKey(Vec<u8>);

impl CipherKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            16 | 24 | 32 => Ok(Self(bytes.to_vec())),
            n => Err(VaultError::Key(format!(
                "expected a 16, 24 or 32 byte key, got {n} bytes"
            ))),
        }
    }

    pub fn from_base64(text: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| VaultError::Key(format!("invalid base64: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Hex form, as printed by most key tools.
    pub fn from_hex(text: &str) -> Result<Self> {
        let bytes =
            hex::decode(text.trim()).map_err(|e| VaultError::Key(format!("invalid hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// Never print key material.
impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CipherKey({} bits)", self.0.len() * 8)
    }
}

/// Fresh random IV for one split.
pub fn random_iv() -> Result<[u8; IV_LEN]> {
    let mut iv = [0u8; IV_LEN];
    getrandom::getrandom(&mut iv).map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(iv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_round_trip() {
        let k = CipherKey::from_bytes(&[9u8; 32]).unwrap();
        let text = k.to_base64();
        assert_eq!(CipherKey::from_base64(&format!(" {text}\n")).unwrap(), k);
    }

    #[test]
    fn hex_and_base64_agree() {
        let k = CipherKey::from_hex(&"0f".repeat(24)).unwrap();
        assert_eq!(k.as_bytes().len(), 24);
        assert_eq!(CipherKey::from_base64(&k.to_base64()).unwrap(), k);
        assert!(CipherKey::from_hex("zz").is_err());
    }

    #[test]
    fn rejects_bad_lengths_and_text() {
        assert!(CipherKey::from_bytes(&[0u8; 20]).is_err());
        assert!(matches!(
            CipherKey::from_base64("not base64!!"),
            Err(VaultError::Key(_))
        ));
    }

    #[test]
    fn debug_hides_material() {
        let k = CipherKey::from_bytes(&[0xAB; 16]).unwrap();
        assert_eq!(format!("{k:?}"), "CipherKey(128 bits)");
    }

    #[test]
    fn ivs_differ() {
        assert_ne!(random_iv().unwrap(), random_iv().unwrap());
    }
}
