//! TLS client configuration for backend connections.
//!
//! Used for `https` forwarding and `wss` dials. Trust roots are the bundled
//! Mozilla set from `webpki-roots`.

use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};

/// Build the client configuration shared by every backend dial.
pub fn client_config() -> Result<Arc<ClientConfig>, rustls::Error> {
    let roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_without_alpn() {
        let config = client_config().unwrap();
        assert!(config.alpn_protocols.is_empty());
    }
}
