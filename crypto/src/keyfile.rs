//! Base58 key files holding the node identity.
//!
//! Two files: the public key (Base58 of 32 bytes) and the private key
//! (Base58 of 64 bytes). Reading distinguishes "files missing" and "files
//! present but unusable" so the caller can decide whether to prompt the
//! operator for regeneration.

use conclave_types::{KeyPair, PrivateKey, PublicKey};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyfileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of attempting to read the key files.
pub enum KeyfileStatus {
    /// Both files present, decoded, and self-consistent.
    Loaded(KeyPair),
    /// One or both files missing.
    Missing,
    /// Files present but the content is not usable (bad encoding, wrong
    /// length, or the pair fails a sign/verify round trip).
    Invalid(&'static str),
}

/// Read and decode the key files.
pub fn read_keys(public_path: &Path, private_path: &Path) -> Result<KeyfileStatus, KeyfileError> {
    if !public_path.exists() || !private_path.exists() {
        return Ok(KeyfileStatus::Missing);
    }

    let pub58 = std::fs::read_to_string(public_path)?;
    let priv58 = std::fs::read_to_string(private_path)?;

    let Ok(pub_bytes) = bs58::decode(pub58.trim()).into_vec() else {
        return Ok(KeyfileStatus::Invalid("public key is not valid Base58"));
    };
    let Ok(priv_bytes) = bs58::decode(priv58.trim()).into_vec() else {
        return Ok(KeyfileStatus::Invalid("private key is not valid Base58"));
    };

    let Ok(pub_arr) = <[u8; 32]>::try_from(pub_bytes.as_slice()) else {
        return Ok(KeyfileStatus::Invalid("public key has wrong length"));
    };
    let Ok(priv_arr) = <[u8; 64]>::try_from(priv_bytes.as_slice()) else {
        return Ok(KeyfileStatus::Invalid("private key has wrong length"));
    };

    let keypair = KeyPair {
        public: PublicKey(pub_arr),
        private: PrivateKey(priv_arr),
    };

    if !crate::keys::validate_keypair(&keypair) {
        return Ok(KeyfileStatus::Invalid("keys fail the signature check"));
    }

    Ok(KeyfileStatus::Loaded(keypair))
}

/// Write a key pair back to disk in the same Base58 encoding.
pub fn write_keys(
    keypair: &KeyPair,
    public_path: &Path,
    private_path: &Path,
) -> Result<(), KeyfileError> {
    std::fs::write(
        public_path,
        bs58::encode(keypair.public.as_bytes()).into_string(),
    )?;
    std::fs::write(
        private_path,
        bs58::encode(&keypair.private.0[..]).into_string(),
    )?;
    Ok(())
}
