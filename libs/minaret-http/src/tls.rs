//! rustls setup. The OS root store is read once per process.

use std::sync::{Arc, OnceLock};

use rustls::RootCertStore;
use rustls::crypto::CryptoProvider;

static NATIVE_ROOTS: OnceLock<Arc<RootCertStore>> = OnceLock::new();

/// The installed process default, else aws-lc-rs.
pub fn crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

fn native_roots() -> Arc<RootCertStore> {
    NATIVE_ROOTS
        .get_or_init(|| {
            let loaded = rustls_native_certs::load_native_certs();
            for err in &loaded.errors {
                tracing::warn!(error = %err, "skipping unreadable native root certificate");
            }

            let mut store = RootCertStore::empty();
            let (added, ignored) = store.add_parsable_certificates(loaded.certs);
            if ignored > 0 {
                tracing::warn!(added, ignored, "some native root certificates did not parse");
            }
            tracing::debug!(added, "native root store loaded");
            Arc::new(store)
        })
        .clone()
}

/// Client config over the OS roots.
///
/// # Errors
/// When the OS store yields no usable root.
pub fn native_roots_client_config() -> Result<rustls::ClientConfig, String> {
    let roots = native_roots();
    if roots.is_empty() {
        return Err("no usable root certificates in the OS store".to_owned());
    }

    let config = rustls::ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| format!("TLS protocol versions unavailable: {e}"))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(config)
}
