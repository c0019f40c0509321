//! TLS construction for broker connections.

use crate::errors::EdgeflowError;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// Loads a PEM certificate/key pair for client authentication.
pub(crate) fn load_client_identity(
    cert_file: &Path,
    key_file: &Path,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), EdgeflowError> {
    let mut cert_reader = BufReader::new(File::open(cert_file).map_err(|err| {
        EdgeflowError::Initialization(format!(
            "failed to read certificate {}: {err}",
            cert_file.display()
        ))
    })?);
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| {
            EdgeflowError::Initialization(format!(
                "invalid certificate {}: {err}",
                cert_file.display()
            ))
        })?;
    if certs.is_empty() {
        return Err(EdgeflowError::Initialization(format!(
            "no certificates found in {}",
            cert_file.display()
        )));
    }

    let mut key_reader = BufReader::new(File::open(key_file).map_err(|err| {
        EdgeflowError::Initialization(format!(
            "failed to read private key {}: {err}",
            key_file.display()
        ))
    })?);
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|err| {
            EdgeflowError::Initialization(format!(
                "invalid private key {}: {err}",
                key_file.display()
            ))
        })?
        .ok_or_else(|| {
            EdgeflowError::Initialization(format!(
                "no private key found in {}",
                key_file.display()
            ))
        })?;

    Ok((certs, key))
}

/// Builds the client TLS configuration.
///
/// Server certificate verification stays on unless explicitly disabled
/// through the export options.
pub(crate) fn client_config(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    verify_certificates: bool,
) -> Result<ClientConfig, EdgeflowError> {
    let config = if verify_certificates {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_client_auth_cert(certs, key)
    } else {
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerification))
            .with_client_auth_cert(certs, key)
    };

    config.map_err(|err| EdgeflowError::Initialization(format!("invalid client certificate: {err}")))
}

/// Accepts any server certificate. Only installed when verification was
/// explicitly disabled.
#[derive(Debug)]
struct NoVerification;

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_unreadable_certificate_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.pem");
        let key = dir.path().join("key.pem");

        let err = load_client_identity(&missing, &key).unwrap_err();
        assert!(matches!(err, EdgeflowError::Initialization(_)));
        assert!(err.to_string().contains("missing.pem"));
    }

    #[test]
    fn test_garbage_certificate_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        let mut file = File::create(&cert).expect("create");
        file.write_all(b"this is not pem").expect("write");
        let mut file = File::create(&key).expect("create");
        file.write_all(b"neither is this").expect("write");

        let err = load_client_identity(&cert, &key).unwrap_err();
        assert!(matches!(err, EdgeflowError::Initialization(_)));
    }
}
