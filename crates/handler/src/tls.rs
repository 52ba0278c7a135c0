//! TLS listener configuration (spec §4.5, §6): the line protocol requests,
//! but does not require, a client certificate, and binds trust to a
//! certificate's fingerprint rather than a CA chain (TOFU, spec §9) — there
//! is no certificate authority in this deployment model, every client is
//! expected to show up with a self-signed certificate.
//!
//! No repository example wires up a `rustls` server with client-certificate
//! support, so this module is grounded directly in `rustls`'s own public
//! `ClientCertVerifier` contract rather than a corpus precedent; see
//! `DESIGN.md`.

use std::sync::Arc;

use rustls::client::danger::HandshakeSignatureValid;
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{DigitallySignedStruct, DistinguishedName, Error as TlsError, ServerConfig, SignatureScheme};
use tootik_common::{AppError, AppResult};

/// Load a [`ServerConfig`] that requests but never requires a client
/// certificate, and performs no chain validation on whatever certificate is
/// presented — acceptance/rejection based on the fingerprint happens at the
/// application layer in [`crate::session`].
///
/// # Errors
/// Returns [`AppError::Config`] if the certificate/key files can't be read
/// or parsed.
pub fn load_server_config(cert_path: &str, key_path: &str) -> AppResult<ServerConfig> {
    let cert_chain = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let verifier: Arc<dyn ClientCertVerifier> = Arc::new(TofuClientCertVerifier::new());

    let mut config = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(cert_chain, key)
        .map_err(|e| AppError::Config(format!("invalid TLS certificate/key: {e}")))?;
    config.alpn_protocols = Vec::new();
    Ok(config)
}

fn load_certs(path: &str) -> AppResult<Vec<CertificateDer<'static>>> {
    let file = std::fs::File::open(path).map_err(|e| AppError::Config(format!("cannot open {path}: {e}")))?;
    let mut reader = std::io::BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Config(format!("cannot parse certificate chain {path}: {e}")))
}

fn load_key(path: &str) -> AppResult<rustls::pki_types::PrivateKeyDer<'static>> {
    let file = std::fs::File::open(path).map_err(|e| AppError::Config(format!("cannot open {path}: {e}")))?;
    let mut reader = std::io::BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| AppError::Config(format!("cannot parse private key {path}: {e}")))?
        .ok_or_else(|| AppError::Config(format!("no private key found in {path}")))
}

/// A permissive client-certificate verifier: it never rejects a presented
/// certificate at the TLS layer (no chain, no expiry check) beyond
/// verifying the handshake signature itself is cryptographically valid.
/// Trust in *who* a fingerprint belongs to is established above TLS, by
/// [`crate::session::authenticate`] looking the fingerprint up in the
/// certificate binding table.
#[derive(Debug)]
struct TofuClientCertVerifier {
    provider: Arc<CryptoProvider>,
}

impl TofuClientCertVerifier {
    fn new() -> Self {
        Self { provider: Arc::new(rustls::crypto::ring::default_provider()) }
    }
}

impl ClientCertVerifier for TofuClientCertVerifier {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        false
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, TlsError> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

