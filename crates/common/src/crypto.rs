//! Key-pair generation and parsing for `ActivityPub` HTTP signatures.
//!
//! Actors may hold either an RSA or an Ed25519 key (spec §4.2); both are
//! supported end to end rather than just RSA, since the wider fediverse
//! already mixes both algorithms.

use ed25519_dalek::pkcs8::{DecodePrivateKey as Ed25519DecodePrivateKey, DecodePublicKey as Ed25519DecodePublicKey, EncodePrivateKey as Ed25519EncodePrivateKey, EncodePublicKey as Ed25519EncodePublicKey};
use ed25519_dalek::{SigningKey as Ed25519SigningKey, VerifyingKey as Ed25519VerifyingKey};
use rsa::{
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding},
    RsaPrivateKey, RsaPublicKey,
};

use crate::{AppError, AppResult};

/// Which signing algorithm an actor's key pair uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAlgorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256 (`rsa-sha256` / `hs2019` with an RSA key).
    Rsa,
    /// Ed25519 (`hs2019` with an Ed25519 key).
    Ed25519,
}

/// A generated key pair in PEM format, tagged with its algorithm.
#[derive(Debug, Clone)]
pub struct Keypair {
    /// Which algorithm produced this pair.
    pub algorithm: KeyAlgorithm,
    /// Public key, PEM-encoded `SubjectPublicKeyInfo`.
    pub public_key_pem: String,
    /// Private key, PEM-encoded PKCS#8.
    pub private_key_pem: String,
}

/// Backwards-compatible alias kept for RSA-only call sites.
pub type RsaKeypair = Keypair;

const RSA_KEY_SIZE: usize = 2048;

/// Generate a new key pair for the given algorithm.
///
/// # Errors
/// Returns an error if key generation or PEM encoding fails.
pub fn generate_keypair(algorithm: KeyAlgorithm) -> AppResult<Keypair> {
    match algorithm {
        KeyAlgorithm::Rsa => generate_rsa_keypair(),
        KeyAlgorithm::Ed25519 => generate_ed25519_keypair(),
    }
}

/// Generate a new RSA key pair (2048 bit).
///
/// # Errors
/// Returns an error if key generation fails.
pub fn generate_rsa_keypair() -> AppResult<Keypair> {
    let mut rng = rand::thread_rng();

    let private_key = RsaPrivateKey::new(&mut rng, RSA_KEY_SIZE)
        .map_err(|e| AppError::Internal(format!("failed to generate RSA key: {e}")))?;
    let public_key = RsaPublicKey::from(&private_key);

    let private_key_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| AppError::Internal(format!("failed to encode private key: {e}")))?
        .to_string();
    let public_key_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| AppError::Internal(format!("failed to encode public key: {e}")))?;

    Ok(Keypair {
        algorithm: KeyAlgorithm::Rsa,
        public_key_pem,
        private_key_pem,
    })
}

/// Generate a new Ed25519 key pair.
///
/// # Errors
/// Returns an error if PEM encoding fails.
pub fn generate_ed25519_keypair() -> AppResult<Keypair> {
    let mut rng = rand::rngs::OsRng;
    let signing_key = Ed25519SigningKey::generate(&mut rng);
    let verifying_key = signing_key.verifying_key();

    let private_key_pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| AppError::Internal(format!("failed to encode private key: {e}")))?
        .to_string();
    let public_key_pem = verifying_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| AppError::Internal(format!("failed to encode public key: {e}")))?;

    Ok(Keypair {
        algorithm: KeyAlgorithm::Ed25519,
        public_key_pem,
        private_key_pem,
    })
}

/// Parse an RSA private key from PEM.
pub fn parse_private_key(pem: &str) -> AppResult<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .map_err(|e| AppError::Internal(format!("failed to parse RSA private key: {e}")))
}

/// Parse an RSA public key from PEM.
pub fn parse_public_key(pem: &str) -> AppResult<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem)
        .map_err(|e| AppError::Internal(format!("failed to parse RSA public key: {e}")))
}

/// Parse an Ed25519 private key from PEM.
pub fn parse_ed25519_private_key(pem: &str) -> AppResult<Ed25519SigningKey> {
    Ed25519SigningKey::from_pkcs8_pem(pem)
        .map_err(|e| AppError::Internal(format!("failed to parse Ed25519 private key: {e}")))
}

/// Parse an Ed25519 public key from PEM.
pub fn parse_ed25519_public_key(pem: &str) -> AppResult<Ed25519VerifyingKey> {
    Ed25519VerifyingKey::from_public_key_pem(pem)
        .map_err(|e| AppError::Internal(format!("failed to parse Ed25519 public key: {e}")))
}

/// SHA-256 hex digest of a DER-encoded certificate (spec §B: the natural
/// reading of "certificate fingerprint" given this crate already depends on
/// `sha2` for HTTP digesting).
#[must_use]
pub fn fingerprint_der(der: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(der);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_and_parse_rsa() {
        let keypair = generate_keypair(KeyAlgorithm::Rsa).unwrap();
        assert_eq!(keypair.algorithm, KeyAlgorithm::Rsa);
        parse_private_key(&keypair.private_key_pem).unwrap();
        parse_public_key(&keypair.public_key_pem).unwrap();
    }

    #[test]
    fn generate_and_parse_ed25519() {
        let keypair = generate_keypair(KeyAlgorithm::Ed25519).unwrap();
        assert_eq!(keypair.algorithm, KeyAlgorithm::Ed25519);
        parse_ed25519_private_key(&keypair.private_key_pem).unwrap();
        parse_ed25519_public_key(&keypair.public_key_pem).unwrap();
    }

    #[test]
    fn fingerprint_is_stable_and_hex() {
        let a = fingerprint_der(b"not really a certificate");
        let b = fingerprint_der(b"not really a certificate");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
