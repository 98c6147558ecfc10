//! RSA key material loading.
//!
//! Merchant private keys arrive as PKCS#8 PEM (text or file); platform
//! public keys are extracted from the X.509 certificates delivered by the
//! certificate bootstrap endpoint.

use std::path::Path;

use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use x509_cert::der::DecodePem;
use x509_cert::Certificate;

use crate::{Error, Result};

/// Load an RSA private key from PKCS#8 PEM text.
pub fn private_key_from_pem(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .map_err(|e| Error::invalid_config(format!("invalid private key: {}", e)))
}

/// Load an RSA private key from a PKCS#8 PEM file.
pub fn private_key_from_file(path: &Path) -> Result<RsaPrivateKey> {
    let pem = std::fs::read_to_string(path).map_err(|e| {
        Error::invalid_config(format!(
            "cannot read private key {}: {}",
            path.display(),
            e
        ))
    })?;
    private_key_from_pem(&pem)
}

/// Extract the RSA public key from a PEM-encoded X.509 certificate.
///
/// Used on the plaintext obtained by decrypting a platform certificate
/// blob, so failures surface as internal errors rather than
/// configuration errors.
pub fn public_key_from_cert_pem(pem: &[u8]) -> Result<RsaPublicKey> {
    let cert = Certificate::from_pem(pem)
        .map_err(|e| Error::internal(format!("invalid platform certificate: {}", e)))?;

    let spki = &cert.tbs_certificate.subject_public_key_info;
    let key_bytes = spki
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| Error::internal("platform certificate has an unaligned public key"))?;

    RsaPublicKey::from_pkcs1_der(key_bytes)
        .map_err(|e| Error::internal(format!("certificate does not carry an RSA key: {}", e)))
}
