//! Request-level HTTP Signature orchestration (spec §4.2): which headers get
//! signed, clock-skew checking, and dispatch between the RSA and Ed25519
//! primitives in `tootik_common::http_signature` depending on the signing
//! actor's key algorithm. The byte-level signing/verification and header
//! parsing live in `tootik_common`; this module only decides what to sign
//! and whether a signature is still acceptable to act on.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tootik_common::crypto::{
    parse_ed25519_private_key, parse_ed25519_public_key, parse_private_key, parse_public_key, KeyAlgorithm,
};
use tootik_common::http_signature::{
    algorithm_token, build_signature_string, calculate_digest, decode_signature, encode_signature, sign_ed25519, sign_rsa,
    verify_ed25519, verify_rsa, HttpSignature,
};
use tootik_common::{AppError, AppResult};

/// Headers covered by every signature this instance produces (spec §4.2:
/// `(request-target)`, `host`, `date`, `digest`).
const SIGNED_HEADERS: [&str; 4] = ["(request-target)", "host", "date", "digest"];

/// Maximum allowed clock skew between the `Date` header and local time
/// (spec §4.2: "verify the date is within a ±12h skew window").
const MAX_CLOCK_SKEW: chrono::Duration = chrono::Duration::hours(12);

/// A signed request ready to have its headers attached.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub signature_header: String,
    pub digest_header: Option<String>,
    pub date_header: String,
}

/// Sign a request addressed to `host` and `path`, with `key_id` (conventionally
/// `<actorId>#main-key`) and the signing actor's private key.
///
/// # Errors
/// Returns an error if the private key PEM cannot be parsed.
pub fn sign_request(
    algorithm: KeyAlgorithm,
    private_key_pem: &str,
    key_id: &str,
    method: &str,
    host: &str,
    path: &str,
    body: &[u8],
) -> AppResult<SignedRequest> {
    let date_header = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
    let digest_header = if body.is_empty() { None } else { Some(calculate_digest(body)) };

    let mut headers = HashMap::new();
    headers.insert("host".to_string(), host.to_string());
    headers.insert("date".to_string(), date_header.clone());
    if let Some(digest) = &digest_header {
        headers.insert("digest".to_string(), digest.clone());
    }

    let signed_headers: Vec<String> = if digest_header.is_some() {
        SIGNED_HEADERS.iter().map(|s| (*s).to_string()).collect()
    } else {
        SIGNED_HEADERS.iter().filter(|h| **h != "digest").map(|s| (*s).to_string()).collect()
    };

    let sig_string = build_signature_string(method, path, &headers, &signed_headers)?;

    let sig_bytes = match algorithm {
        KeyAlgorithm::Rsa => {
            let private = parse_private_key(private_key_pem)?;
            sign_rsa(&private, &sig_string)
        }
        KeyAlgorithm::Ed25519 => {
            let private = parse_ed25519_private_key(private_key_pem)?;
            sign_ed25519(&private, &sig_string)
        }
    };

    let signature_header = format!(
        r#"keyId="{key_id}",algorithm="{}",headers="{}",signature="{}""#,
        algorithm_token(algorithm),
        signed_headers.join(" "),
        encode_signature(&sig_bytes),
    );

    Ok(SignedRequest { signature_header, digest_header, date_header })
}

/// Verify an inbound request's `Signature` header against the purported
/// signer's public key, and that the `Date` header falls within the
/// allowed clock skew.
///
/// # Errors
/// Returns an error when the signature, date header or public key are
/// malformed, or when verification fails.
pub fn verify_request(
    signature_header: &str,
    public_key_pem: &str,
    algorithm: KeyAlgorithm,
    method: &str,
    path: &str,
    headers: &HashMap<String, String>,
) -> AppResult<()> {
    let parsed = HttpSignature::parse(signature_header)?;
    check_clock_skew(headers)?;

    let sig_string = build_signature_string(method, path, headers, &parsed.headers)?;
    let sig_bytes = decode_signature(&parsed.signature)?;

    let ok = match algorithm {
        KeyAlgorithm::Rsa => {
            let public = parse_public_key(public_key_pem)?;
            verify_rsa(&public, &sig_string, &sig_bytes)
        }
        KeyAlgorithm::Ed25519 => {
            let public = parse_ed25519_public_key(public_key_pem)?;
            verify_ed25519(&public, &sig_string, &sig_bytes)
        }
    };

    if ok {
        Ok(())
    } else {
        Err(AppError::SignatureInvalid("signature verification failed".into()))
    }
}

/// Verify the `Digest` header against the actual body bytes, when present.
#[must_use]
pub fn verify_digest(body: &[u8], digest_header: Option<&str>) -> bool {
    match digest_header {
        Some(header) => calculate_digest(body) == header,
        None => body.is_empty(),
    }
}

/// Parse an HTTP-date header value, accepting the handful of formats seen in
/// the wild (RFC 7231, RFC 850, asctime) in addition to RFC 2822.
fn parse_http_date(date_str: &str) -> AppResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(date_str) {
        return Ok(dt.with_timezone(&Utc));
    }

    const FORMATS: [&str; 4] = [
        "%a, %d %b %Y %H:%M:%S GMT",
        "%a, %d %b %Y %H:%M:%S %z",
        "%A, %d-%b-%y %H:%M:%S GMT",
        "%a %b %d %H:%M:%S %Y",
    ];
    for format in FORMATS {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(date_str, format) {
            return Ok(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
        }
    }

    Err(AppError::SignatureInvalid(format!("invalid date header: {date_str}")))
}

fn check_clock_skew(headers: &HashMap<String, String>) -> AppResult<()> {
    let date = headers
        .get("date")
        .ok_or_else(|| AppError::SignatureInvalid("missing date header".into()))?;
    let parsed = parse_http_date(date)?;
    let skew = Utc::now().signed_duration_since(parsed);
    if skew.abs() > MAX_CLOCK_SKEW {
        return Err(AppError::SignatureInvalid(format!("date header outside allowed skew ({}s)", skew.num_seconds())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tootik_common::crypto::generate_keypair;

    #[test]
    fn rsa_sign_then_verify_roundtrip() {
        let keypair = generate_keypair(KeyAlgorithm::Rsa).unwrap();
        let body = br#"{"type":"Follow"}"#;
        let signed = sign_request(
            KeyAlgorithm::Rsa,
            &keypair.private_key_pem,
            "https://a.example/user/alice#main-key",
            "POST",
            "b.example",
            "/inbox",
            body,
        )
        .unwrap();

        let mut headers = HashMap::new();
        headers.insert("host".to_string(), "b.example".to_string());
        headers.insert("date".to_string(), signed.date_header.clone());
        if let Some(digest) = &signed.digest_header {
            headers.insert("digest".to_string(), digest.clone());
        }

        verify_request(&signed.signature_header, &keypair.public_key_pem, KeyAlgorithm::Rsa, "POST", "/inbox", &headers)
            .unwrap();
    }

    #[test]
    fn ed25519_sign_then_verify_roundtrip() {
        let keypair = generate_keypair(KeyAlgorithm::Ed25519).unwrap();
        let signed = sign_request(
            KeyAlgorithm::Ed25519,
            &keypair.private_key_pem,
            "https://a.example/user/alice#main-key",
            "GET",
            "b.example",
            "/user/bob",
            b"",
        )
        .unwrap();

        let mut headers = HashMap::new();
        headers.insert("host".to_string(), "b.example".to_string());
        headers.insert("date".to_string(), signed.date_header.clone());

        verify_request(&signed.signature_header, &keypair.public_key_pem, KeyAlgorithm::Ed25519, "GET", "/user/bob", &headers)
            .unwrap();
    }

    #[test]
    fn rejects_expired_date() {
        let mut headers = HashMap::new();
        headers.insert("host".to_string(), "b.example".to_string());
        headers.insert(
            "date".to_string(),
            (Utc::now() - chrono::Duration::hours(24)).format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        );
        assert!(check_clock_skew(&headers).is_err());
    }

    #[test]
    fn digest_roundtrip() {
        let body = b"hello";
        let header = calculate_digest(body);
        assert!(verify_digest(body, Some(&header)));
        assert!(!verify_digest(b"tampered", Some(&header)));
    }
}
