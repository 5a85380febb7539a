use crate::error::{CertificateError, ProxyError};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// ALPN protocol offered to clients; the listener speaks HTTP/1.1 only
const ALPN_HTTP11: &[u8] = b"http/1.1";

/// Crypto provider used for both the listener and the upstream client
pub fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::aws_lc_rs::default_provider())
}

/// Read every certificate from a PEM file
pub fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, CertificateError> {
    let bytes = std::fs::read(path).map_err(|source| CertificateError::Read {
        kind: "certificate",
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = BufReader::new(bytes.as_slice());
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| CertificateError::Read {
            kind: "certificate",
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(CertificateError::NoCertificates {
            path: path.to_path_buf(),
        });
    }

    Ok(certs)
}

/// Read the first private key (PKCS#8, PKCS#1 or SEC1) from a PEM file
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, CertificateError> {
    let bytes = std::fs::read(path).map_err(|source| CertificateError::Read {
        kind: "key",
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = BufReader::new(bytes.as_slice());
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| CertificateError::Read {
            kind: "key",
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| CertificateError::NoPrivateKey {
            path: path.to_path_buf(),
        })
}

/// Build the listener's TLS configuration from a certificate chain and key
pub fn create_server_config(
    cert_file: Option<&Path>,
    key_file: Option<&Path>,
) -> Result<ServerConfig, ProxyError> {
    let cert_file = cert_file.ok_or(CertificateError::NotConfigured {
        kind: "certificate",
    })?;
    let key_file = key_file.ok_or(CertificateError::NotConfigured { kind: "key" })?;

    let certs = load_certificates(cert_file)?;
    let key = load_private_key(key_file)?;
    debug!(
        "Loaded {} certificate(s) from {} and key from {}",
        certs.len(),
        cert_file.display(),
        key_file.display()
    );

    let mut config = ServerConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(ProxyError::Tls)?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(CertificateError::Invalid)?;

    config.alpn_protocols = vec![ALPN_HTTP11.to_vec()];

    Ok(config)
}

/// Build the client TLS configuration used to reach https upstreams.
///
/// Trust anchors come from the platform store; unreadable entries are logged
/// and skipped.
pub fn create_client_config() -> Result<ClientConfig, ProxyError> {
    let native = rustls_native_certs::load_native_certs();
    for error in &native.errors {
        warn!("Failed to load a platform root certificate: {}", error);
    }

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    debug!(
        "Loaded {} platform root certificates ({} ignored)",
        added, ignored
    );
    if roots.is_empty() {
        warn!("No platform root certificates found; https upstreams will fail verification");
    }

    let config = ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(ProxyError::Tls)?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(config)
}
