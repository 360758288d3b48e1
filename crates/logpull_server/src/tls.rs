//! Mutual-TLS setup.

use crate::config::TlsConfig;
use crate::error::{ServerError, ServerResult};
use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// Builds a rustls server configuration that refuses clients without a
/// certificate chaining to `config.client_ca_path`.
///
/// # Errors
///
/// [`ServerError::Tls`] if any file is unreadable, holds no usable PEM
/// items, or the key does not match the certificate.
pub fn load_server_tls(config: &TlsConfig) -> ServerResult<rustls::ServerConfig> {
    let provider: Arc<CryptoProvider> = Arc::new(ring::default_provider());

    let chain = load_certs(&config.cert_path)?;
    let key = load_key(&config.key_path)?;
    let roots = load_roots(&config.client_ca_path)?;

    let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
        .build()
        .map_err(|e| ServerError::Tls(format!("client verifier: {e}")))?;

    let mut server = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ServerError::Tls(format!("protocol versions: {e}")))?
        .with_client_cert_verifier(verifier)
        .with_single_cert(chain, key)
        .map_err(|e| ServerError::Tls(format!("server certificate: {e}")))?;
    server.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    tracing::debug!(
        cert = %config.cert_path.display(),
        client_ca = %config.client_ca_path.display(),
        "TLS configured"
    );
    Ok(server)
}

fn open(path: &Path) -> ServerResult<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| ServerError::Tls(format!("could not open {}: {e}", path.display())))
}

fn load_certs(path: &Path) -> ServerResult<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Tls(format!("could not parse {}: {e}", path.display())))?;
    if certs.is_empty() {
        return Err(ServerError::Tls(format!(
            "no certificates in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> ServerResult<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|e| ServerError::Tls(format!("could not parse {}: {e}", path.display())))?
        .ok_or_else(|| ServerError::Tls(format!("no private key in {}", path.display())))
}

fn load_roots(path: &Path) -> ServerResult<RootCertStore> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(path)? {
        roots
            .add(cert)
            .map_err(|e| ServerError::Tls(format!("bad CA in {}: {e}", path.display())))?;
    }
    Ok(roots)
}
