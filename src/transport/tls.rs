//! Client TLS setup for the gateway connection.
//!
//! The certificate file is a PEM bundle holding the client certificate chain
//! followed by its private key. Encrypted PKCS#8 keys are unlocked with the
//! connection's passphrase.

use super::TransportError;
use rustls::pki_types::pem::{self as pki_pem, PemObject};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;

const ALPN_H2: &[u8] = b"h2";

#[derive(Debug)]
pub struct ClientIdentity {
    pub certs: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

impl ClientIdentity {
    pub fn load(cert_path: &str, cert_pass: &str) -> Result<Self, TransportError> {
        let contents = std::fs::read(cert_path).map_err(|e| identity_error(cert_path, e))?;
        Self::from_pem(&contents, cert_pass).map_err(|reason| TransportError::Identity {
            path: cert_path.to_string(),
            reason,
        })
    }

    pub fn from_pem(contents: &[u8], cert_pass: &str) -> Result<Self, String> {
        let certs = CertificateDer::pem_slice_iter(contents)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;
        if certs.is_empty() {
            return Err("no certificate found".to_string());
        }

        let key = match PrivateKeyDer::from_pem_slice(contents) {
            Ok(key) => key,
            Err(pki_pem::Error::NoItemsFound) => {
                encrypted_key(contents, cert_pass)?.ok_or_else(|| "no private key found".to_string())?
            }
            Err(e) => return Err(e.to_string()),
        };

        Ok(Self { certs, key })
    }
}

/// The first `ENCRYPTED PRIVATE KEY` block, unlocked with `cert_pass`.
fn encrypted_key(contents: &[u8], cert_pass: &str) -> Result<Option<PrivateKeyDer<'static>>, String> {
    let blocks = pem::parse_many(contents).map_err(|e| e.to_string())?;
    let Some(block) = blocks.iter().find(|b| b.tag() == "ENCRYPTED PRIVATE KEY") else {
        return Ok(None);
    };
    tracing::debug!("Decrypting PKCS#8 private key");
    decrypt_pkcs8(block.contents(), cert_pass).map(|key| Some(PrivateKeyDer::Pkcs8(key)))
}

fn decrypt_pkcs8(der: &[u8], cert_pass: &str) -> Result<PrivatePkcs8KeyDer<'static>, String> {
    let info = pkcs8::EncryptedPrivateKeyInfo::try_from(der).map_err(|e| e.to_string())?;
    let document = info.decrypt(cert_pass).map_err(|e| format!("cannot decrypt private key: {e}"))?;
    Ok(PrivatePkcs8KeyDer::from(document.as_bytes().to_vec()))
}

fn identity_error(path: &str, error: impl std::fmt::Display) -> TransportError {
    TransportError::Identity { path: path.to_string(), reason: error.to_string() }
}

/// Builds a rustls client config that presents `identity`, trusts the
/// platform's roots, and negotiates HTTP/2.
pub fn client_config(identity: ClientIdentity) -> Result<ClientConfig, TransportError> {
    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(rustls_native_certs::load_native_certs()?);
    tracing::debug!(added, ignored, "Loaded native root certificates");

    let mut config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_client_auth_cert(identity.certs, identity.key)?;
    config.alpn_protocols = vec![ALPN_H2.to_vec()];

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pem_block(tag: &str, contents: &[u8]) -> String {
        pem::encode(&pem::Pem::new(tag, contents.to_vec()))
    }

    #[test]
    fn test_certificate_and_pkcs8_key() {
        let bundle = format!("{}{}", pem_block("CERTIFICATE", &[1, 2, 3]), pem_block("PRIVATE KEY", &[4, 5, 6]));

        let identity = ClientIdentity::from_pem(bundle.as_bytes(), "").unwrap();
        assert_eq!(identity.certs.len(), 1);
        assert_eq!(&identity.certs[0][..], &[1u8, 2, 3]);
        assert!(matches!(identity.key, PrivateKeyDer::Pkcs8(_)));
    }

    #[test]
    fn test_chain_with_rsa_key_and_unknown_blocks() {
        let bundle = format!(
            "{}{}{}{}",
            pem_block("CERTIFICATE", &[1]),
            pem_block("CERTIFICATE", &[2]),
            pem_block("X509 CRL", &[3]),
            pem_block("RSA PRIVATE KEY", &[4]),
        );

        let identity = ClientIdentity::from_pem(bundle.as_bytes(), "").unwrap();
        assert_eq!(identity.certs.len(), 2);
        assert!(matches!(identity.key, PrivateKeyDer::Pkcs1(_)));
    }

    #[test]
    fn test_sec1_key_after_certificate() {
        let bundle = format!("{}{}", pem_block("CERTIFICATE", &[1]), pem_block("EC PRIVATE KEY", &[2]));

        let identity = ClientIdentity::from_pem(bundle.as_bytes(), "").unwrap();
        assert!(matches!(identity.key, PrivateKeyDer::Sec1(_)));
    }

    #[test]
    fn test_missing_key() {
        let bundle = pem_block("CERTIFICATE", &[1, 2, 3]);
        let err = ClientIdentity::from_pem(bundle.as_bytes(), "").unwrap_err();
        assert_eq!(err, "no private key found");
    }

    #[test]
    fn test_missing_certificate() {
        let bundle = pem_block("EC PRIVATE KEY", &[1, 2, 3]);
        let err = ClientIdentity::from_pem(bundle.as_bytes(), "").unwrap_err();
        assert_eq!(err, "no certificate found");
    }

    #[test]
    fn test_garbage_encrypted_key_is_rejected() {
        let bundle = format!(
            "{}{}",
            pem_block("CERTIFICATE", &[1]),
            pem_block("ENCRYPTED PRIVATE KEY", &[0xde, 0xad, 0xbe, 0xef]),
        );
        assert!(ClientIdentity::from_pem(bundle.as_bytes(), "secret").is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let err = ClientIdentity::load("/non-existant.pem", "").unwrap_err();
        match err {
            TransportError::Identity { path, .. } => assert_eq!(path, "/non-existant.pem"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
