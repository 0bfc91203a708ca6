//! Ed25519 key-pair generation and consistency checks.

use conclave_types::{KeyPair, PrivateKey, PublicKey};
use ed25519_dalek::SigningKey;

/// Generate a fresh random key pair from OS entropy.
pub fn generate_keypair() -> KeyPair {
    let signing = SigningKey::generate(&mut rand::rngs::OsRng);
    keypair_from_signing(signing)
}

/// Derive a key pair deterministically from a 32-byte seed.
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    keypair_from_signing(SigningKey::from_bytes(seed))
}

/// Extract the public half from 64-byte private key material.
///
/// Returns `None` if the material is not a valid Ed25519 keypair.
pub fn public_from_private(private: &PrivateKey) -> Option<PublicKey> {
    let signing = SigningKey::from_keypair_bytes(&private.0).ok()?;
    Some(PublicKey(signing.verifying_key().to_bytes()))
}

/// Sanity-check a loaded key pair with a sign/verify round trip.
pub fn validate_keypair(keypair: &KeyPair) -> bool {
    const PROBE: [u8; 5] = [255, 0, 0, 0, 255];
    match crate::sign::sign_message(&PROBE, &keypair.private) {
        Some(sig) => crate::sign::verify_signature(&PROBE, &sig, &keypair.public),
        None => false,
    }
}

fn keypair_from_signing(signing: SigningKey) -> KeyPair {
    KeyPair {
        public: PublicKey(signing.verifying_key().to_bytes()),
        private: PrivateKey(signing.to_keypair_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keypair_validates() {
        assert!(validate_keypair(&generate_keypair()));
    }

    #[test]
    fn seed_derivation_is_deterministic() {
        let kp1 = keypair_from_seed(&[7u8; 32]);
        let kp2 = keypair_from_seed(&[7u8; 32]);
        assert_eq!(kp1.public, kp2.public);
        assert_eq!(kp1.private.0, kp2.private.0);
    }

    #[test]
    fn public_recoverable_from_private() {
        let kp = keypair_from_seed(&[42u8; 32]);
        assert_eq!(public_from_private(&kp.private), Some(kp.public));
    }

    #[test]
    fn mismatched_keypair_fails_validation() {
        let kp1 = keypair_from_seed(&[1u8; 32]);
        let kp2 = keypair_from_seed(&[2u8; 32]);
        let frankenstein = KeyPair {
            public: kp2.public,
            private: conclave_types::PrivateKey(kp1.private.0),
        };
        assert!(!validate_keypair(&frankenstein));
    }
}
