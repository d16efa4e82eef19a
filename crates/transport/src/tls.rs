//! Default TLS material for QUIC sessions (§4.J, `QUIC-TLS-CONFIG`).
//!
//! QUIC requires TLS 1.3; this crate's job is wire-level transport, not
//! peer authentication (that's left to whatever runs over the pipe — see
//! the non-goals in §1), so the default server presents a self-signed
//! certificate and the default client skips verification entirely. Either
//! half can be overridden with a real certificate chain via
//! `OptionsStore::set(QUIC_TLS_CONFIG, ..)` when the deployment needs
//! actual peer authentication at the TLS layer.

use std::sync::Arc;
use std::time::Duration;

use quic_mux_types::TransportError;

fn io_err(msg: impl std::fmt::Display) -> TransportError {
    TransportError::Io(std::io::Error::other(msg.to_string()))
}

/// Generate an ephemeral self-signed certificate for `localhost`.
fn generate_self_signed_cert() -> Result<
    (
        rustls::pki_types::CertificateDer<'static>,
        rustls::pki_types::PrivatePkcs8KeyDer<'static>,
    ),
    TransportError,
> {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".into()])
        .map_err(|e| io_err(format!("certificate generation failed: {e}")))?;
    let cert_der = rustls::pki_types::CertificateDer::from(cert.cert);
    let key_der = rustls::pki_types::PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());
    Ok((cert_der, key_der))
}

/// Build the default server-side QUIC configuration: a fresh self-signed
/// certificate plus a short keep-alive interval to reclaim idle sessions
/// promptly.
pub fn default_server_config() -> Result<quinn::ServerConfig, TransportError> {
    let (cert_der, key_der) = generate_self_signed_cert()?;
    let mut server_config = quinn::ServerConfig::with_single_cert(vec![cert_der], key_der.into())
        .map_err(|e| io_err(format!("QUIC server config error: {e}")))?;

    let transport = Arc::get_mut(&mut server_config.transport).expect("fresh Arc, uniquely owned");
    transport.keep_alive_interval(Some(Duration::from_secs(15)));

    Ok(server_config)
}

/// Build the default client-side QUIC configuration: TLS 1.3 with server
/// certificate verification disabled.
pub fn default_client_config() -> Result<quinn::ClientConfig, TransportError> {
    let crypto = rustls::ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| io_err(format!("TLS client config error: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(SkipServerVerification))
        .with_no_client_auth();

    let quic_crypto = quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
        .map_err(|e| io_err(format!("QUIC client config error: {e}")))?;

    Ok(quinn::ClientConfig::new(Arc::new(quic_crypto)))
}

/// Accepts any certificate. TLS here provides wire encryption only; the
/// spec places peer authentication out of scope (§1 non-goals).
#[derive(Debug)]
struct SkipServerVerification;

impl rustls::client::danger::ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_server_config_builds() {
        default_server_config().unwrap();
    }

    #[test]
    fn default_client_config_builds() {
        default_client_config().unwrap();
    }
}
