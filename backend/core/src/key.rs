//! Private key loading.
//!
//! Vehicle keys are NIST P-256 keys stored as PEM, either SEC1
//! (`EC PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`).

use std::fmt;
use std::path::Path;

use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::DecodePrivateKey;
use p256::SecretKey;

use crate::error::KeyError;

/// The client's private key. Never printed.
#[derive(Clone)]
pub struct PrivateKey {
    secret: SecretKey,
}

impl PrivateKey {
    pub fn from_pem(pem: &str) -> Result<Self, String> {
        SecretKey::from_sec1_pem(pem)
            .or_else(|_| SecretKey::from_pkcs8_pem(pem))
            .map(|secret| Self { secret })
            .map_err(|e| e.to_string())
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    /// Uncompressed SEC1 encoding of the public half (65 bytes).
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.secret
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// Short hex prefix of the public key, safe for logs.
    pub fn fingerprint(&self) -> String {
        let bytes = self.public_key_bytes();
        hex::encode(&bytes[1..9])
    }
}

impl From<SecretKey> for PrivateKey {
    fn from(secret: SecretKey) -> Self {
        Self { secret }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({})", self.fingerprint())
    }
}

/// Read and parse a PEM private key from disk.
pub fn load_private_key(path: &Path) -> Result<PrivateKey, KeyError> {
    let pem = std::fs::read_to_string(path).map_err(|source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    PrivateKey::from_pem(&pem).map_err(|message| KeyError::Invalid {
        path: path.to_path_buf(),
        message,
    })
}

#[cfg(test)]
pub(crate) fn test_key_pem() -> String {
    use p256::pkcs8::LineEnding;

    let secret = SecretKey::from_slice(&[7u8; 32]).unwrap();
    secret.to_sec1_pem(LineEnding::LF).unwrap().as_str().to_owned()
}
