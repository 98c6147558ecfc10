//! AES-256-GCM open and seal for encrypted platform payloads.
//!
//! The platform wraps certificates and notification resources with
//! AES-256-GCM, keyed by the merchant APIv3 secret, with a 12-byte ASCII
//! nonce and an associated-data string. Ciphertexts travel base64-encoded.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::{Error, Result};

/// Algorithm tag the platform puts on AEAD-wrapped payloads.
pub const ALGORITHM_AES_256_GCM: &str = "AEAD_AES_256_GCM";

/// GCM nonce size in bytes.
const NONCE_SIZE: usize = 12;

/// Open a base64 ciphertext with AES-256-GCM.
///
/// Fails with a bad-ciphertext error on base64 decoding problems, a
/// wrong-sized nonce, or authentication failure.
pub fn decrypt(key: &[u8], nonce: &[u8], associated_data: &[u8], ciphertext: &str) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| Error::internal("AEAD key must be 32 bytes"))?;

    if nonce.len() != NONCE_SIZE {
        return Err(Error::bad_ciphertext(format!(
            "nonce must be {} bytes, got {}",
            NONCE_SIZE,
            nonce.len()
        )));
    }

    let raw = super::base64_decode(ciphertext)
        .map_err(|e| Error::bad_ciphertext(format!("ciphertext is not valid base64: {}", e)))?;

    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: &raw,
                aad: associated_data,
            },
        )
        .map_err(|_| Error::bad_ciphertext("authentication failed"))
}

/// Seal a plaintext with AES-256-GCM and base64-encode the result.
pub fn encrypt(key: &[u8], nonce: &[u8], associated_data: &[u8], plaintext: &[u8]) -> Result<String> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| Error::internal("AEAD key must be 32 bytes"))?;

    if nonce.len() != NONCE_SIZE {
        return Err(Error::bad_ciphertext(format!(
            "nonce must be {} bytes, got {}",
            NONCE_SIZE,
            nonce.len()
        )));
    }

    let sealed = cipher
        .encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad: associated_data,
            },
        )
        .map_err(|e| Error::internal(format!("AEAD sealing failed: {}", e)))?;

    Ok(super::base64_encode(&sealed))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"AES256Key-32Characters1234567890";
    const NONCE: &[u8] = b"eabb3e044577";

    // Ciphertext captured from a real TRANSACTION.SUCCESS notification,
    // sealed with the mock merchant secret above.
    const TRANSACTION_NONCE: &[u8] = b"fG1l57vn9BCX";
    const TRANSACTION_CIPHERTEXT: &str = "yuKJXXxnqVMulBUy5NoriSab/S9aen3wXNYLqGdvBfxsWmN9JAFAMXO3LgDFPqNeZMrkSmQyFa981IVxLvWHzwrzlBtJk+hOwnxTgDxc8SsGt39QkRBbfGR8rutMr3Goiq03ygWjMA6I+n6qhqQ/zS0/bMIB1dQoFZBSCKiLp8VHbGDLirh9MqYRa7MKJEYziPF2DmdtRHvXie4AWSxcV6hq8Ufao9FQooLOA2gD/9JA+L6BqquOPOnStExxH26cK7QgFFAf22GP7JKXnMH0LF3lJrK6ZMQ7iTXvVxv/q6j3SwUbyWVKmXdMJTqnXtU4H90DjRC6It4cOavr3Gz6xeVyv4S3i1qdAD8rAqgjjF1QWnUQtIm4/TdOw3ro0L73VI07H8c9O6VX/U0TcGMJJrAKMJ/yBZlD6owliffy/pzceEG/MV27euHDS5VW/m23tokNy2G1XJu1T3sUzEUsNil7vngBLYHGEGNw6brOYxwxXEUI2n0tSJOG8upiSGmN0fOnWbPoN9YqtuIhvY4xKOJpKwQrNJSm+ybNrugAwbLf/HMATxK6dGk9RQK8Nn9PHSRSPmTU5sci6zzFGAEHKQ==";

    #[test]
    fn test_round_trip() {
        let plaintext = b"{\"serial_no\":\"477ED0046A54F0360A72A63A8F2816312AAEAB53\"}";
        let sealed = encrypt(KEY, NONCE, b"certificate", plaintext).unwrap();
        let opened = decrypt(KEY, NONCE, b"certificate", &sealed).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_decrypt_known_transaction() {
        let plain = decrypt(KEY, TRANSACTION_NONCE, b"transaction", TRANSACTION_CIPHERTEXT).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&plain).unwrap();
        assert_eq!(value["trade_state"], "SUCCESS");
        assert_eq!(value["appid"], "wx81be3101902f7cb2");
    }

    #[test]
    fn test_tampered_ciphertext_fails_authentication() {
        let mut raw = crate::sign::base64_decode(TRANSACTION_CIPHERTEXT).unwrap();
        raw[0] ^= 1;
        let tampered = crate::sign::base64_encode(&raw);

        let err = decrypt(KEY, TRANSACTION_NONCE, b"transaction", &tampered).unwrap_err();
        assert!(matches!(err, Error::BadCiphertext(_)));
    }

    #[test]
    fn test_wrong_associated_data_fails() {
        let err =
            decrypt(KEY, TRANSACTION_NONCE, b"certificate", TRANSACTION_CIPHERTEXT).unwrap_err();
        assert!(matches!(err, Error::BadCiphertext(_)));
    }

    #[test]
    fn test_invalid_base64_is_bad_ciphertext() {
        let err = decrypt(KEY, NONCE, b"certificate", "@@not-base64@@").unwrap_err();
        assert!(matches!(err, Error::BadCiphertext(_)));
    }

    #[test]
    fn test_wrong_nonce_size_rejected() {
        let err = decrypt(KEY, b"short", b"certificate", "AAAA").unwrap_err();
        assert!(matches!(err, Error::BadCiphertext(_)));
    }

    #[test]
    fn test_empty_plaintext_round_trip() {
        let sealed = encrypt(KEY, NONCE, b"", b"").unwrap();
        let opened = decrypt(KEY, NONCE, b"", &sealed).unwrap();
        assert!(opened.is_empty());
    }
}
