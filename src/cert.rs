//! Platform certificate bootstrap and cache.
//!
//! The platform signs every response with one of a rotating set of RSA
//! keys, identified by certificate serial. Certificates are fetched from
//! a dedicated endpoint, delivered AEAD-encrypted under the merchant
//! APIv3 secret, and cached serial → public key with a single freshness
//! deadline. The cache is the only shared mutable state in the client.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};

use crate::sign::{aes_gcm, keys};
use crate::{Error, Result};

/// Response shape of the certificate bootstrap endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CertificatesResponse {
    /// All currently valid platform certificates.
    #[serde(rename = "data")]
    pub certificates: Vec<Certificate>,
}

/// One platform certificate entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Certificate {
    /// Hex serial identifying the certificate.
    pub serial_no: String,
    /// RFC3339 time the certificate becomes valid.
    pub effective_time: String,
    /// RFC3339 time the certificate expires.
    pub expire_time: String,
    /// The AEAD-wrapped certificate itself.
    pub encrypt_certificate: EncryptedCertificate,
}

/// The encrypted blob wrapping an X.509 certificate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedCertificate {
    /// Always `AEAD_AES_256_GCM` in the supported protocol.
    pub algorithm: String,
    /// 12-byte ASCII nonce.
    pub nonce: String,
    /// Associated-data string, `certificate` in practice.
    pub associated_data: String,
    /// Base64 ciphertext.
    pub ciphertext: String,
}

impl Certificate {
    /// Decrypt the embedded blob with the merchant APIv3 secret and
    /// extract the certificate's RSA public key.
    pub fn decrypt(&self, secret: &[u8]) -> Result<RsaPublicKey> {
        let pem = aes_gcm::decrypt(
            secret,
            self.encrypt_certificate.nonce.as_bytes(),
            self.encrypt_certificate.associated_data.as_bytes(),
            &self.encrypt_certificate.ciphertext,
        )?;
        keys::public_key_from_cert_pem(&pem)
    }
}

/// Request against the certificate bootstrap endpoint. The endpoint
/// takes no parameters; fetching it also installs the delivered keys
/// into the client's cache.
#[derive(Clone, Copy, Debug, Default)]
pub struct CertificatesRequest;

impl CertificatesRequest {
    /// Fetch and decode the current platform certificates.
    pub async fn send(&self, client: &crate::Client) -> Result<CertificatesResponse> {
        let url = client.options().cert_url.clone();
        client
            .execute::<()>(reqwest::Method::GET, &url, None)
            .await
            .scan()
    }
}

#[derive(Debug)]
struct CacheInner {
    keys: HashMap<String, RsaPublicKey>,
    deadline: Instant,
}

/// Thread-safe mapping from certificate serial to RSA public key with a
/// single freshness deadline.
///
/// One refresh replaces the deadline and upserts every delivered key;
/// readers always see either the old set or the fully installed new one.
/// The lock is held only across in-memory operations.
#[derive(Debug)]
pub struct CertificateCache {
    inner: RwLock<CacheInner>,
}

impl CertificateCache {
    /// Create an empty, immediately stale cache.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                keys: HashMap::new(),
                deadline: Instant::now(),
            }),
        }
    }

    /// True iff the deadline has passed or no keys are cached.
    ///
    /// A poisoned lock reads as stale so a crashed writer cannot wedge
    /// verification into trusting leftover state.
    pub fn is_stale(&self) -> bool {
        self.inner
            .read()
            .map(|inner| inner.keys.is_empty() || inner.deadline <= Instant::now())
            .unwrap_or(true)
    }

    /// Insert or overwrite a key and push the deadline to `now + ttl`.
    pub fn add(&self, serial_no: &str, key: RsaPublicKey, ttl: Duration) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| Error::internal("certificate cache lock poisoned"))?;
        inner.keys.insert(serial_no.to_string(), key);
        inner.deadline = Instant::now() + ttl;
        Ok(())
    }

    /// Look up the public key for a serial.
    pub fn get(&self, serial_no: &str) -> Option<RsaPublicKey> {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.keys.get(serial_no).cloned())
    }

    /// Drop all keys and expire the deadline.
    pub fn clear(&self) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| Error::internal("certificate cache lock poisoned"))?;
        inner.keys.clear();
        inner.deadline = Instant::now();
        Ok(())
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.keys.len()).unwrap_or(0)
    }

    /// True if no keys are cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CertificateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rsa::pkcs8::DecodePrivateKey;
    use rsa::RsaPrivateKey;

    use super::*;

    const PRIVATE_KEY_PEM: &str = include_str!("../tests/fixtures/mock_private_key_pkcs8.pem");
    const PLATFORM_CERT_PEM: &str = include_str!("../tests/fixtures/mock_platform_cert.pem");
    const SECRET: &[u8] = b"AES256Key-32Characters1234567890";
    const SERIAL: &str = "477ED0046A54F0360A72A63A8F2816312AAEAB53";

    fn public_key() -> RsaPublicKey {
        RsaPrivateKey::from_pkcs8_pem(PRIVATE_KEY_PEM)
            .unwrap()
            .to_public_key()
    }

    #[test]
    fn test_fresh_cache_is_stale_until_populated() {
        let cache = CertificateCache::new();
        assert!(cache.is_stale());
        assert!(cache.is_empty());

        cache
            .add(SERIAL, public_key(), Duration::from_secs(600))
            .unwrap();
        assert!(!cache.is_stale());
        assert_eq!(cache.len(), 1);
        assert!(cache.get(SERIAL).is_some());
        assert!(cache.get("unknown").is_none());
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let cache = CertificateCache::new();
        cache.add(SERIAL, public_key(), Duration::ZERO).unwrap();
        assert!(cache.is_stale());
        // expired entries are still readable until the next refresh
        assert!(cache.get(SERIAL).is_some());
    }

    #[test]
    fn test_clear_empties_and_expires() {
        let cache = CertificateCache::new();
        cache
            .add(SERIAL, public_key(), Duration::from_secs(600))
            .unwrap();
        cache.clear().unwrap();
        assert!(cache.is_stale());
        assert!(cache.get(SERIAL).is_none());
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let cache = Arc::new(CertificateCache::new());
        let key = public_key();

        let mut handles = Vec::new();
        for i in 0..4 {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            handles.push(std::thread::spawn(move || {
                for round in 0..50 {
                    let serial = format!("serial-{}-{}", i, round % 3);
                    cache.add(&serial, key.clone(), Duration::from_secs(60)).unwrap();
                    let _ = cache.get(&serial);
                    let _ = cache.is_stale();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(!cache.is_stale());
    }

    #[test]
    fn test_certificate_decrypt_round_trip() {
        let nonce = b"eabb3e044577";
        let ciphertext =
            aes_gcm::encrypt(SECRET, nonce, b"certificate", PLATFORM_CERT_PEM.as_bytes()).unwrap();

        let cert = Certificate {
            serial_no: SERIAL.to_string(),
            effective_time: "2020-09-17T14:26:23+08:00".to_string(),
            expire_time: "2025-09-16T14:26:23+08:00".to_string(),
            encrypt_certificate: EncryptedCertificate {
                algorithm: aes_gcm::ALGORITHM_AES_256_GCM.to_string(),
                nonce: String::from_utf8(nonce.to_vec()).unwrap(),
                associated_data: "certificate".to_string(),
                ciphertext,
            },
        };

        let key = cert.decrypt(SECRET).unwrap();
        assert_eq!(key, public_key());
    }

    #[test]
    fn test_certificate_decrypt_with_wrong_secret_fails() {
        let nonce = b"eabb3e044577";
        let ciphertext =
            aes_gcm::encrypt(SECRET, nonce, b"certificate", PLATFORM_CERT_PEM.as_bytes()).unwrap();

        let cert = Certificate {
            serial_no: SERIAL.to_string(),
            effective_time: String::new(),
            expire_time: String::new(),
            encrypt_certificate: EncryptedCertificate {
                algorithm: aes_gcm::ALGORITHM_AES_256_GCM.to_string(),
                nonce: String::from_utf8(nonce.to_vec()).unwrap(),
                associated_data: "certificate".to_string(),
                ciphertext,
            },
        };

        let err = cert.decrypt(b"00000000000000000000000000000000").unwrap_err();
        assert!(matches!(err, Error::BadCiphertext(_)));
    }

    #[test]
    fn test_bootstrap_payload_shape() {
        let body = r#"{"data":[{"serial_no":"ABC","effective_time":"2020-09-17T14:26:23+08:00","expire_time":"2025-09-16T14:26:23+08:00","encrypt_certificate":{"algorithm":"AEAD_AES_256_GCM","nonce":"eabb3e044577","associated_data":"certificate","ciphertext":"AAAA"}}]}"#;
        let resp: CertificatesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.certificates.len(), 1);
        assert_eq!(resp.certificates[0].serial_no, "ABC");
        assert_eq!(
            resp.certificates[0].encrypt_certificate.algorithm,
            aes_gcm::ALGORITHM_AES_256_GCM
        );
    }
}
