//! TLS certificate loading for a listener.

use std::io;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

/// Load the PEM certificate chain and private key for the listener on
/// `address`.
///
/// The returned error keeps the underlying [`io::ErrorKind`] (a missing file
/// stays `NotFound`) and names the listener and both paths.
pub async fn load_tls_config(address: &str, cert_path: &Path, key_path: &Path) -> io::Result<RustlsConfig> {
    RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|err| {
            io::Error::new(
                err.kind(),
                format!(
                    "listener {address}: cannot load TLS material (cert {}, key {}): {err}",
                    cert_path.display(),
                    key_path.display()
                ),
            )
        })
}
