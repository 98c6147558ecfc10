//! Shared helpers for the end-to-end suite: a mock platform that signs
//! its responses with the fixture key and serves that same key back
//! through the encrypted certificate bootstrap.

use std::time::Duration;

use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::sha2::Sha256;
use rsa::RsaPrivateKey;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wechatpay::sign::{aes_gcm, sign_sha256, ResponseSignature};
use wechatpay::{CertSuite, Client, ClientOptions, Config, PrivateKey};

pub const APP_ID: &str = "wxd678efh567hg6787";
pub const MCH_ID: &str = "1230000109";
pub const API_SECRET: &str = "AES256Key-32Characters1234567890";
pub const SERIAL_NO: &str = "477ED0046A54F0360A72A63A8F2816312AAEAB53";
pub const TIMESTAMP: i64 = 1611368330;
pub const NONCE: &str = "AF1404CC2980FB414C99C0B98883BD42";
pub const CERT_NONCE: &str = "eabb3e044577";

pub const PRIVATE_KEY_PEM: &str = include_str!("../fixtures/mock_private_key_pkcs8.pem");
pub const PLATFORM_CERT_PEM: &str = include_str!("../fixtures/mock_platform_cert.pem");

/// Sign a mock response body the way the platform does.
pub fn sign_body(body: &[u8]) -> String {
    let key = RsaPrivateKey::from_pkcs8_pem(PRIVATE_KEY_PEM).expect("fixture key");
    let signing_key = SigningKey::<Sha256>::new(key);
    let resp_sign = ResponseSignature {
        timestamp: TIMESTAMP,
        nonce: NONCE,
        body,
    };
    sign_sha256(&signing_key, &resp_sign.marshal()).expect("sign mock response")
}

/// A response template carrying the four platform headers and a
/// signature over the body.
pub fn signed_template(status: u16, body: &str) -> ResponseTemplate {
    let signature = sign_body(body.as_bytes());
    let template = ResponseTemplate::new(status)
        .insert_header("Wechatpay-Nonce", NONCE)
        .insert_header("Wechatpay-Signature", signature.as_str())
        .insert_header("Wechatpay-Timestamp", TIMESTAMP.to_string().as_str())
        .insert_header("Wechatpay-Serial", SERIAL_NO);
    if body.is_empty() {
        template
    } else {
        template.set_body_raw(body.as_bytes().to_vec(), "application/json")
    }
}

/// The certificate bootstrap body: the fixture certificate sealed with
/// the mock APIv3 secret.
pub fn cert_bootstrap_body() -> String {
    let ciphertext = aes_gcm::encrypt(
        API_SECRET.as_bytes(),
        CERT_NONCE.as_bytes(),
        b"certificate",
        PLATFORM_CERT_PEM.as_bytes(),
    )
    .expect("seal fixture certificate");

    serde_json::json!({
        "data": [{
            "serial_no": SERIAL_NO,
            "effective_time": "2020-09-17T14:26:23+08:00",
            "expire_time": "2025-09-16T14:26:23+08:00",
            "encrypt_certificate": {
                "algorithm": "AEAD_AES_256_GCM",
                "nonce": CERT_NONCE,
                "associated_data": "certificate",
                "ciphertext": ciphertext,
            },
        }]
    })
    .to_string()
}

/// Mount the certificate bootstrap endpoint.
pub async fn mount_certificates(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v3/certificates"))
        .respond_with(signed_template(200, &cert_bootstrap_body()))
        .mount(server)
        .await;
}

/// A client pointed at the mock platform.
pub fn mock_client(server: &MockServer) -> Client {
    Client::with_options(
        Config {
            app_id: APP_ID.to_string(),
            mch_id: MCH_ID.to_string(),
            api_secret: API_SECRET.to_string(),
            cert: CertSuite {
                serial_no: SERIAL_NO.to_string(),
                private_key: PrivateKey::Pem(PRIVATE_KEY_PEM.to_string()),
            },
        },
        ClientOptions::default()
            .with_domain(server.uri())
            .with_timeout(Duration::from_secs(60))
            .with_cert_refresh_interval(Duration::from_secs(600)),
    )
    .expect("mock client")
}
