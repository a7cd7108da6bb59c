//! Password-protected PEM key handling.
//!
//! Private keys are stored as PKCS#8, normally encrypted. The curve is
//! selected by the caller since key files segregate wallet and node keys.

use pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rand::rngs::OsRng;

use crate::ecdsa::{CurveKind, KeyPair};
use crate::errors::{CryptoError, CryptoResult};

const ENCRYPTED_LABEL: &str = "ENCRYPTED PRIVATE KEY";

/// Parse a PKCS#8 PEM blob into a keypair on the given curve.
///
/// Encrypted blobs (`BEGIN ENCRYPTED PRIVATE KEY`) are decrypted with the
/// supplied password; unencrypted blobs ignore it.
pub fn decrypt_key_pem(pem: &str, password: &str, curve: CurveKind) -> CryptoResult<KeyPair> {
    let encrypted = pem.contains(ENCRYPTED_LABEL);
    match curve {
        CurveKind::Wallet => {
            let key = if encrypted {
                k256::ecdsa::SigningKey::from_pkcs8_encrypted_pem(pem, password.as_bytes())
                    .map_err(|e| CryptoError::KeyDecrypt(e.to_string()))?
            } else {
                k256::ecdsa::SigningKey::from_pkcs8_pem(pem)
                    .map_err(|e| CryptoError::KeyDecode(e.to_string()))?
            };
            Ok(KeyPair::Wallet(key))
        }
        CurveKind::Node => {
            let key = if encrypted {
                p384::ecdsa::SigningKey::from_pkcs8_encrypted_pem(pem, password.as_bytes())
                    .map_err(|e| CryptoError::KeyDecrypt(e.to_string()))?
            } else {
                p384::ecdsa::SigningKey::from_pkcs8_pem(pem)
                    .map_err(|e| CryptoError::KeyDecode(e.to_string()))?
            };
            Ok(KeyPair::Node(key))
        }
    }
}

/// Serialize a keypair as an encrypted PKCS#8 PEM blob.
pub fn encrypt_key_pem(key: &KeyPair, password: &str) -> CryptoResult<String> {
    let pem = match key {
        KeyPair::Wallet(sk) => sk
            .to_pkcs8_encrypted_pem(&mut OsRng, password.as_bytes(), LineEnding::LF)
            .map_err(|e| CryptoError::KeyDecode(e.to_string()))?,
        KeyPair::Node(sk) => sk
            .to_pkcs8_encrypted_pem(&mut OsRng, password.as_bytes(), LineEnding::LF)
            .map_err(|e| CryptoError::KeyDecode(e.to_string()))?,
    };
    Ok(pem.to_string())
}
