//! Ed25519 message signing and verification.

use conclave_types::{PrivateKey, PublicKey, Signature};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

/// Sign a message with a private key, returning the signature.
///
/// Returns `None` if the 64-byte keypair material is inconsistent (the
/// public half does not match the seed).
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Option<Signature> {
    let signing_key = SigningKey::from_keypair_bytes(&private_key.0).ok()?;
    let sig = signing_key.sign(message);
    Some(Signature(sig.to_bytes()))
}

/// Verify a signature against a message and public key.
///
/// Returns `true` if the signature is valid, `false` otherwise.
/// Also rejects non-canonical public keys.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &dalek_sig).is_ok()
}
