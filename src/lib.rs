//! Merchant-side client for the WeChat Pay v3 API.
//!
//! The crate covers the secure transport core of the API: every outgoing
//! call is canonicalized and signed with the merchant's RSA key, every
//! inbound message is verified against the platform's rotating public
//! certificates, and encrypted payloads (certificates, server-push
//! notifications) are opened with AES-256-GCM using the merchant API
//! secret. Bill files are fetched through the platform's two-step URL
//! handoff and decoded into typed records.
//!
//! The [`Client`] is a thread-safe shared object; certificate refresh is
//! on-demand and concurrent callers are safe. The client never retries.
//!
//! # Quick start
//!
//! ```ignore
//! use wechatpay::{CertSuite, Client, Config, PrivateKey};
//! use wechatpay::pay::{PayAmount, PayRequest, TradeType};
//!
//! let client = Client::new(Config {
//!     app_id: "wxd678efh567hg6787".into(),
//!     mch_id: "1230000109".into(),
//!     api_secret: "<32-byte APIv3 secret>".into(),
//!     cert: CertSuite {
//!         serial_no: "477ED0046A54F0360A72A63A8F2816312AAEAB53".into(),
//!         private_key: PrivateKey::Path("apiclient_key.pem".into()),
//!     },
//! })?;
//!
//! let req = PayRequest {
//!     description: "for testing".into(),
//!     out_trade_no: "S20210119074247105778399200".into(),
//!     notify_url: "https://example.com/notify".into(),
//!     amount: PayAmount { total: 1, currency: Some("CNY".into()) },
//!     trade_type: TradeType::Native,
//!     ..Default::default()
//! };
//! let resp = req.send(&client).await?;
//! println!("code url: {}", resp.code_url);
//! # wechatpay::Result::Ok(())
//! ```

pub mod bill;
pub mod cert;
pub mod close;
pub mod combine;
pub mod errors;
pub mod notify;
pub mod pay;
pub mod query;
pub mod refund;
pub mod result;
pub mod sign;

mod client;

pub use client::{CertSuite, Client, ClientOptions, Config, PrivateKey};
pub use errors::Error;
pub use notify::{Notification, NotificationAnswer, PayNotification, RefundNotification};
pub use result::ApiResult;

/// HTTP method type, re-exported from the underlying HTTP client.
pub use reqwest::Method;

/// Common result alias for WeChat Pay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Shared client fixture for module tests, wired to the mock merchant
/// credentials used across the test suite.
#[cfg(test)]
pub(crate) fn client_for_tests() -> Client {
    Client::new(Config {
        app_id: "wxd678efh567hg6787".to_string(),
        mch_id: "1230000109".to_string(),
        api_secret: "AES256Key-32Characters1234567890".to_string(),
        cert: CertSuite {
            serial_no: "477ED0046A54F0360A72A63A8F2816312AAEAB53".to_string(),
            private_key: PrivateKey::Pem(
                include_str!("../tests/fixtures/mock_private_key_pkcs8.pem").to_string(),
            ),
        },
    })
    .expect("test client")
}
