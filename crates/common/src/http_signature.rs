//! HTTP Signature primitives for `ActivityPub`.
//!
//! Implements the header parsing, signature-string construction and
//! raw sign/verify operations used by HTTP Signatures. See
//! <https://datatracker.ietf.org/doc/html/draft-cavage-http-signatures>.
//! Key lookup and the request-level orchestration (which headers to sign,
//! clock-skew checks) belong to `tootik-federation`; this module only knows
//! about bytes and keys.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature as Ed25519Signature, Signer as Ed25519Signer, Verifier as Ed25519Verifier};
use rsa::{
    pkcs1v15::{Signature as RsaSignature, SigningKey, VerifyingKey},
    sha2::Sha256,
    signature::{SignatureEncoding, Signer, Verifier},
    RsaPrivateKey, RsaPublicKey,
};
use sha2::{Digest, Sha256 as Sha256Hasher};
use std::collections::HashMap;

use crate::crypto::KeyAlgorithm;
use crate::{AppError, AppResult};

/// A parsed `Signature` header value.
#[derive(Debug, Clone)]
pub struct HttpSignature {
    /// Key id, conventionally `<actorId>#main-key`.
    pub key_id: String,
    /// Algorithm token as presented on the wire (`rsa-sha256`, `hs2019`, ...).
    pub algorithm: String,
    /// Headers covered by the signature, in order.
    pub headers: Vec<String>,
    /// Base64-encoded signature bytes.
    pub signature: String,
}

impl HttpSignature {
    /// Parse a `Signature` (or legacy `Authorization: Signature ...`) header.
    ///
    /// Format: `keyId="...",algorithm="...",headers="...",signature="..."`
    pub fn parse(header: &str) -> AppResult<Self> {
        let mut key_id = None;
        let mut algorithm = None;
        let mut headers = None;
        let mut signature = None;

        for part in header.split(',') {
            let part = part.trim();
            if let Some((key, value)) = part.split_once('=') {
                let value = value.trim_matches('"');
                match key.trim() {
                    "keyId" => key_id = Some(value.to_string()),
                    "algorithm" => algorithm = Some(value.to_string()),
                    "headers" => headers = Some(value.to_string()),
                    "signature" => signature = Some(value.to_string()),
                    _ => {}
                }
            }
        }

        Ok(Self {
            key_id: key_id.ok_or_else(|| AppError::SignatureInvalid("missing keyId".into()))?,
            algorithm: algorithm.unwrap_or_else(|| "hs2019".to_string()),
            headers: headers
                .unwrap_or_else(|| "date".to_string())
                .split(' ')
                .map(str::to_string)
                .collect(),
            signature: signature
                .ok_or_else(|| AppError::SignatureInvalid("missing signature".into()))?,
        })
    }
}

/// Build the canonical string that gets signed, by concatenating
/// `"{header}: {value}"` lines for each header in `signed_headers`.
pub fn build_signature_string(
    method: &str,
    path: &str,
    headers: &HashMap<String, String>,
    signed_headers: &[String],
) -> AppResult<String> {
    let mut parts = Vec::new();

    for header_name in signed_headers {
        let value = if header_name == "(request-target)" {
            format!("{} {}", method.to_lowercase(), path)
        } else {
            headers
                .get(&header_name.to_lowercase())
                .cloned()
                .ok_or_else(|| AppError::SignatureInvalid(format!("missing header: {header_name}")))?
        };

        parts.push(format!("{header_name}: {value}"));
    }

    Ok(parts.join("\n"))
}

/// Sign `sig_string` with an RSA private key, returning raw signature bytes.
pub fn sign_rsa(private_key: &RsaPrivateKey, sig_string: &str) -> Vec<u8> {
    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    signing_key.sign(sig_string.as_bytes()).to_vec()
}

/// Verify an RSA signature over `sig_string`.
pub fn verify_rsa(public_key: &RsaPublicKey, sig_string: &str, sig_bytes: &[u8]) -> bool {
    let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
    match RsaSignature::try_from(sig_bytes) {
        Ok(signature) => verifying_key.verify(sig_string.as_bytes(), &signature).is_ok(),
        Err(_) => false,
    }
}

/// Sign `sig_string` with an Ed25519 private key, returning raw signature bytes.
pub fn sign_ed25519(signing_key: &ed25519_dalek::SigningKey, sig_string: &str) -> Vec<u8> {
    signing_key.sign(sig_string.as_bytes()).to_bytes().to_vec()
}

/// Verify an Ed25519 signature over `sig_string`.
pub fn verify_ed25519(
    verifying_key: &ed25519_dalek::VerifyingKey,
    sig_string: &str,
    sig_bytes: &[u8],
) -> bool {
    let Ok(sig_bytes): Result<[u8; 64], _> = sig_bytes.try_into() else {
        return false;
    };
    let signature = Ed25519Signature::from_bytes(&sig_bytes);
    verifying_key.verify(sig_string.as_bytes(), &signature).is_ok()
}

/// Base64-encode raw signature bytes for inclusion in a `Signature` header.
#[must_use]
pub fn encode_signature(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode a base64 signature field back into raw bytes.
pub fn decode_signature(encoded: &str) -> AppResult<Vec<u8>> {
    BASE64
        .decode(encoded)
        .map_err(|e| AppError::SignatureInvalid(format!("invalid signature encoding: {e}")))
}

/// The wire algorithm token conventionally used for each key algorithm.
#[must_use]
pub const fn algorithm_token(algorithm: KeyAlgorithm) -> &'static str {
    match algorithm {
        KeyAlgorithm::Rsa => "rsa-sha256",
        KeyAlgorithm::Ed25519 => "hs2019",
    }
}

/// Calculate the `Digest` header value (SHA-256) for a request body.
#[must_use]
pub fn calculate_digest(body: &[u8]) -> String {
    let mut hasher = Sha256Hasher::new();
    hasher.update(body);
    let hash = hasher.finalize();
    format!("SHA-256={}", BASE64.encode(hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{generate_keypair, parse_ed25519_private_key, parse_ed25519_public_key, parse_private_key, parse_public_key};

    #[test]
    fn parse_signature_header() {
        let header = r#"keyId="https://example.com/users/test#main-key",algorithm="rsa-sha256",headers="(request-target) host date digest",signature="abc123==""#;
        let sig = HttpSignature::parse(header).unwrap();
        assert_eq!(sig.key_id, "https://example.com/users/test#main-key");
        assert_eq!(sig.headers, vec!["(request-target)", "host", "date", "digest"]);
    }

    #[test]
    fn build_signature_string_includes_request_target() {
        let mut headers = HashMap::new();
        headers.insert("host".to_string(), "example.com".to_string());
        let signed = vec!["(request-target)".to_string(), "host".to_string()];
        let sig_string = build_signature_string("POST", "/inbox", &headers, &signed).unwrap();
        assert!(sig_string.contains("(request-target): post /inbox"));
        assert!(sig_string.contains("host: example.com"));
    }

    #[test]
    fn rsa_sign_and_verify_roundtrip() {
        let keypair = generate_keypair(KeyAlgorithm::Rsa).unwrap();
        let private = parse_private_key(&keypair.private_key_pem).unwrap();
        let public = parse_public_key(&keypair.public_key_pem).unwrap();

        let sig_string = "(request-target): post /inbox\nhost: example.com";
        let sig_bytes = sign_rsa(&private, sig_string);
        assert!(verify_rsa(&public, sig_string, &sig_bytes));
        assert!(!verify_rsa(&public, "tampered", &sig_bytes));
    }

    #[test]
    fn ed25519_sign_and_verify_roundtrip() {
        let keypair = generate_keypair(KeyAlgorithm::Ed25519).unwrap();
        let private = parse_ed25519_private_key(&keypair.private_key_pem).unwrap();
        let public = parse_ed25519_public_key(&keypair.public_key_pem).unwrap();

        let sig_string = "(request-target): post /inbox\nhost: example.com";
        let sig_bytes = sign_ed25519(&private, sig_string);
        assert!(verify_ed25519(&public, sig_string, &sig_bytes));
        assert!(!verify_ed25519(&public, "tampered", &sig_bytes));
    }

    #[test]
    fn digest_has_sha256_prefix() {
        let digest = calculate_digest(b"hello world");
        assert!(digest.starts_with("SHA-256="));
    }
}
