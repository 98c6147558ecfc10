//! Request and response signing for the WeChat Pay v3 protocol.
//!
//! Outgoing requests are canonicalized into the byte string
//! `METHOD \n path[?query] \n timestamp \n nonce \n body \n`, hashed with
//! SHA-256 and signed with RSA-PKCS1v1.5. Inbound responses are verified
//! over `timestamp \n nonce \n body \n` against a platform public key.
//! The canonicalization is byte-exact: no trimming, no case folding.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use rsa::pkcs1v15::SigningKey;
use rsa::sha2::Sha256;
use rsa::RsaPublicKey;

use crate::{Error, Result};

pub mod aes_gcm;
pub mod keys;

/// Signature information for an outgoing request.
///
/// Fields are public so tests can pin the timestamp and nonce; production
/// code goes through [`RequestSignature::new`], which stamps the current
/// time and a fresh nonce.
#[derive(Clone, Debug)]
pub struct RequestSignature {
    /// HTTP method, e.g. `GET`.
    pub method: String,
    /// Absolute request URL.
    pub url: String,
    /// UNIX timestamp in seconds, captured at build time.
    pub timestamp: i64,
    /// 32-character uppercase hex nonce, fresh per request.
    pub nonce: String,
    /// Raw request body, empty for GET.
    pub body: Vec<u8>,
}

impl RequestSignature {
    /// Build a request signature with a fresh timestamp and nonce.
    pub fn new(method: &str, url: &str, body: Vec<u8>) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            nonce: nonce_hex(),
            body,
        }
    }

    /// Produce the canonical signing payload.
    ///
    /// The URL's path and raw query are what get canonicalized; the host
    /// is deliberately excluded. Fails with a bad-url error if the URL
    /// cannot be parsed.
    pub fn marshal(&self) -> Result<Vec<u8>> {
        let parsed = url::Url::parse(&self.url)?;
        let mut uri = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            if !query.is_empty() {
                uri.push('?');
                uri.push_str(query);
            }
        }

        let mut out = Vec::with_capacity(self.body.len() + uri.len() + 64);
        out.extend_from_slice(self.method.as_bytes());
        out.push(b'\n');
        out.extend_from_slice(uri.as_bytes());
        out.push(b'\n');
        out.extend_from_slice(self.timestamp.to_string().as_bytes());
        out.push(b'\n');
        out.extend_from_slice(self.nonce.as_bytes());
        out.push(b'\n');
        if !self.body.is_empty() {
            out.extend_from_slice(&self.body);
        }
        out.push(b'\n');

        Ok(out)
    }
}

/// Signature information extracted from a platform response or
/// notification: `timestamp \n nonce \n body \n`.
#[derive(Clone, Copy, Debug)]
pub struct ResponseSignature<'a> {
    /// UNIX timestamp from the `Wechatpay-Timestamp` header.
    pub timestamp: i64,
    /// Nonce from the `Wechatpay-Nonce` header.
    pub nonce: &'a str,
    /// Raw response body.
    pub body: &'a [u8],
}

impl ResponseSignature<'_> {
    /// Produce the canonical verification payload.
    pub fn marshal(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + self.nonce.len() + 24);
        out.extend_from_slice(self.timestamp.to_string().as_bytes());
        out.push(b'\n');
        out.extend_from_slice(self.nonce.as_bytes());
        out.push(b'\n');
        if !self.body.is_empty() {
            out.extend_from_slice(self.body);
        }
        out.push(b'\n');
        out
    }
}

/// Sign a request and assemble the authorization pairs.
///
/// Returns the comma-separated `key="value"` sequence in the fixed order
/// `mchid`, `nonce_str`, `signature`, `timestamp`, `serial_no`. The
/// scheme label is prefixed by the caller.
pub fn generate_authorization(
    signing_key: &SigningKey<Sha256>,
    req_sign: &RequestSignature,
    mch_id: &str,
    serial_no: &str,
) -> Result<String> {
    let payload = req_sign.marshal()?;
    let signature = sign_sha256(signing_key, &payload)?;

    Ok(format!(
        "mchid=\"{}\",nonce_str=\"{}\",signature=\"{}\",timestamp=\"{}\",serial_no=\"{}\"",
        mch_id, req_sign.nonce, signature, req_sign.timestamp, serial_no
    ))
}

/// Verify a platform signature over a response canonicalization.
pub fn verify_response(
    public_key: &RsaPublicKey,
    resp_sign: &ResponseSignature<'_>,
    signature: &str,
) -> Result<()> {
    let payload = resp_sign.marshal();
    verify_sha256(public_key, signature, &payload)
}

/// Hash `plain` with SHA-256, sign with RSA-PKCS1v1.5 and base64-encode
/// the signature.
pub fn sign_sha256(signing_key: &SigningKey<Sha256>, plain: &[u8]) -> Result<String> {
    use rsa::signature::{SignatureEncoding, Signer};

    let signature = signing_key
        .try_sign(plain)
        .map_err(|e| Error::internal(format!("rsa signing failed: {}", e)))?;
    Ok(BASE64.encode(signature.to_bytes()))
}

/// Verify a base64 RSA-PKCS1v1.5 signature over the SHA-256 hash of
/// `plain`.
pub fn verify_sha256(public_key: &RsaPublicKey, signature: &str, plain: &[u8]) -> Result<()> {
    use rsa::pkcs1v15::{Signature, VerifyingKey};
    use rsa::signature::Verifier;

    let raw = BASE64
        .decode(signature)
        .map_err(|e| Error::BadSignature(format!("signature is not valid base64: {}", e)))?;
    let signature = Signature::try_from(raw.as_slice())
        .map_err(|e| Error::BadSignature(format!("malformed signature: {}", e)))?;

    VerifyingKey::<Sha256>::new(public_key.clone())
        .verify(plain, &signature)
        .map_err(|_| Error::BadSignature("rsa verification failed".to_string()))
}

/// Generate a 32-character uppercase hex nonce from the thread CSPRNG.
pub fn nonce_hex() -> String {
    let mut buf = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut buf);
    let mut out = String::with_capacity(32);
    for b in buf {
        out.push_str(&format!("{:02X}", b));
    }
    out
}

/// Decode a base64 string with the standard alphabet.
pub(crate) fn base64_decode(input: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(input)
}

/// Encode bytes as base64 with the standard alphabet.
pub(crate) fn base64_encode(input: &[u8]) -> String {
    BASE64.encode(input)
}

#[cfg(test)]
mod tests {
    use rsa::pkcs1v15::SigningKey;
    use rsa::pkcs8::DecodePrivateKey;
    use rsa::RsaPrivateKey;

    use super::*;

    const PRIVATE_KEY_PEM: &str =
        include_str!("../../tests/fixtures/mock_private_key_pkcs8.pem");
    const MOCK_TIMESTAMP: i64 = 1611368330;
    const MOCK_NONCE: &str = "AF1404CC2980FB414C99C0B98883BD42";

    fn signing_key() -> SigningKey<Sha256> {
        let key = RsaPrivateKey::from_pkcs8_pem(PRIVATE_KEY_PEM).unwrap();
        SigningKey::new(key)
    }

    fn fixed_signature(method: &str, url: &str, body: &[u8]) -> RequestSignature {
        RequestSignature {
            method: method.to_string(),
            url: url.to_string(),
            timestamp: MOCK_TIMESTAMP,
            nonce: MOCK_NONCE.to_string(),
            body: body.to_vec(),
        }
    }

    #[test]
    fn test_marshal_get_with_empty_body() {
        let sig = fixed_signature("GET", "https://api.mch.weixin.qq.com/v3/certificates", b"");
        let payload = sig.marshal().unwrap();
        assert_eq!(
            payload,
            b"GET\n/v3/certificates\n1611368330\nAF1404CC2980FB414C99C0B98883BD42\n\n"
        );
    }

    #[test]
    fn test_marshal_post_with_body() {
        let body = br#"{"appid":"wx81be3101902f7cb2","description":"for testing"}"#;
        let sig = fixed_signature(
            "POST",
            "https://api.mch.weixin.qq.com/v3/pay/transactions/native",
            body,
        );
        let payload = sig.marshal().unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(
            b"POST\n/v3/pay/transactions/native\n1611368330\nAF1404CC2980FB414C99C0B98883BD42\n",
        );
        expected.extend_from_slice(body);
        expected.push(b'\n');
        assert_eq!(payload, expected);
    }

    #[test]
    fn test_marshal_keeps_raw_query() {
        let sig = fixed_signature(
            "GET",
            "https://api.mch.weixin.qq.com/v3/bill/tradebill?bill_date=2021-01-28&bill_type=ALL",
            b"",
        );
        let payload = sig.marshal().unwrap();
        let text = String::from_utf8(payload).unwrap();
        assert!(text.starts_with("GET\n/v3/bill/tradebill?bill_date=2021-01-28&bill_type=ALL\n"));
    }

    #[test]
    fn test_marshal_is_deterministic() {
        let sig = fixed_signature("GET", "https://host/v3/certificates", b"");
        assert_eq!(sig.marshal().unwrap(), sig.marshal().unwrap());
    }

    #[test]
    fn test_marshal_rejects_bad_url() {
        let sig = fixed_signature("GET", "://not-a-url", b"");
        assert!(matches!(sig.marshal(), Err(Error::BadUrl(_))));
    }

    #[test]
    fn test_response_marshal_empty_body_keeps_trailing_newline() {
        let sig = ResponseSignature {
            timestamp: MOCK_TIMESTAMP,
            nonce: MOCK_NONCE,
            body: b"",
        };
        assert_eq!(
            sig.marshal(),
            b"1611368330\nAF1404CC2980FB414C99C0B98883BD42\n\n"
        );
    }

    #[test]
    fn test_authorization_pair_order() {
        let key = signing_key();
        let sig = fixed_signature("GET", "https://host/v3/certificates", b"");
        let auth = generate_authorization(&key, &sig, "1230000109", "SERIAL123").unwrap();

        assert!(auth.starts_with("mchid=\"1230000109\",nonce_str=\""));
        let signature_at = auth.find(",signature=\"").unwrap();
        let timestamp_at = auth.find(",timestamp=\"1611368330\"").unwrap();
        let serial_at = auth.find(",serial_no=\"SERIAL123\"").unwrap();
        assert!(signature_at < timestamp_at);
        assert!(timestamp_at < serial_at);
        assert!(auth.ends_with('"'));
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let key = RsaPrivateKey::from_pkcs8_pem(PRIVATE_KEY_PEM).unwrap();
        let public_key = key.to_public_key();
        let signing_key = SigningKey::new(key);

        let body = br#"{"code_url":"weixin://wxpay/bizpayurl"}"#;
        let resp = ResponseSignature {
            timestamp: MOCK_TIMESTAMP,
            nonce: MOCK_NONCE,
            body,
        };
        let signature = sign_sha256(&signing_key, &resp.marshal()).unwrap();

        verify_response(&public_key, &resp, &signature).unwrap();
    }

    #[test]
    fn test_verify_detects_tampered_body() {
        let key = RsaPrivateKey::from_pkcs8_pem(PRIVATE_KEY_PEM).unwrap();
        let public_key = key.to_public_key();
        let signing_key = SigningKey::new(key);

        let resp = ResponseSignature {
            timestamp: MOCK_TIMESTAMP,
            nonce: MOCK_NONCE,
            body: b"{\"trade_state\":\"SUCCESS\"}",
        };
        let signature = sign_sha256(&signing_key, &resp.marshal()).unwrap();

        let tampered = ResponseSignature {
            timestamp: MOCK_TIMESTAMP,
            nonce: MOCK_NONCE,
            body: b"{\"trade_state\":\"REFUND\"}",
        };
        let err = verify_response(&public_key, &tampered, &signature).unwrap_err();
        assert!(matches!(err, Error::BadSignature(_)));
    }

    #[test]
    fn test_nonce_shape() {
        let nonce = nonce_hex();
        assert_eq!(nonce.len(), 32);
        assert!(nonce
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_ne!(nonce, nonce_hex());
    }

    #[test]
    fn test_new_stamps_time_and_nonce() {
        let sig = RequestSignature::new("GET", "https://host/v3/certificates", Vec::new());
        assert!(sig.timestamp > 1600000000);
        assert_eq!(sig.nonce.len(), 32);
        assert!(sig.body.is_empty());
    }
}
