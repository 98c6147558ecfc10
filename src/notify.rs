//! Server-push notification decoding.
//!
//! The platform delivers payment and refund events as signed HTTP
//! requests whose body is a JSON envelope wrapping an AEAD-encrypted
//! resource. Decoding verifies the signature against the cached platform
//! certificates, opens the resource with the merchant APIv3 secret, and
//! unmarshals the plaintext into the event's transaction type.

use serde::{Deserialize, Serialize};

use crate::query::QueryResponse;
use crate::refund::RefundAmountInNotify;
use crate::{ApiResult, Client, Result};

/// Event type for a successful payment.
pub const EVENT_TRANSACTION_SUCCESS: &str = "TRANSACTION.SUCCESS";
/// Event type for a successful refund.
pub const EVENT_REFUND_SUCCESS: &str = "REFUND.SUCCESS";
/// Event type for an abnormal refund.
pub const EVENT_REFUND_ABNORMAL: &str = "REFUND.ABNORMAL";
/// Event type for a closed refund.
pub const EVENT_REFUND_CLOSED: &str = "REFUND.CLOSED";

/// The only resource type the v3 protocol delivers.
pub const RESOURCE_TYPE_ENCRYPT: &str = "encrypt-resource";

/// The outer JSON wrapper of a server-initiated notification.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Notification {
    /// Unique notification id.
    pub id: String,
    /// RFC3339 creation time.
    pub create_time: String,
    /// Always `encrypt-resource`.
    pub resource_type: String,
    /// Event type, e.g. `TRANSACTION.SUCCESS`.
    pub event_type: String,
    /// Human-readable summary.
    pub summary: String,
    /// The encrypted event payload.
    pub resource: EncryptedResource,
}

/// The AEAD-wrapped payload inside a notification.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptedResource {
    /// Plaintext type, e.g. `transaction` or `refund`.
    pub original_type: String,
    /// Always `AEAD_AES_256_GCM`.
    pub algorithm: String,
    /// Base64 ciphertext.
    pub ciphertext: String,
    /// Associated-data string.
    pub associated_data: String,
    /// 12-byte ASCII nonce.
    pub nonce: String,
}

/// The small JSON acknowledgement the platform expects back from the
/// merchant's notification handler.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NotificationAnswer {
    /// Result code; empty means accepted.
    pub code: String,
    /// Result message.
    pub message: String,
}

impl NotificationAnswer {
    /// Build an answer with the given code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Render as `{"code":"…","message":"…"}`.
    pub fn to_json(&self) -> String {
        format!(
            "{{\"code\":{},\"message\":{}}}",
            serde_json::Value::from(self.code.as_str()),
            serde_json::Value::from(self.message.as_str())
        )
    }

    /// Render as a byte body for the HTTP answer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.to_json().into_bytes()
    }
}

/// The transaction carried by a payment notification: the same shape as
/// a transaction query response.
pub type PayNotifyTransaction = QueryResponse;

/// A decoded payment notification.
#[derive(Clone, Debug)]
pub struct PayNotification(pub Notification);

impl PayNotification {
    /// Decode a payment notification from the parts of the inbound HTTP
    /// request: the four `Wechatpay-*` headers plus the raw body.
    pub async fn from_http_parts(
        client: &Client,
        nonce: &str,
        signature: &str,
        timestamp: &str,
        serial_no: &str,
        body: Vec<u8>,
    ) -> Result<(Self, PayNotifyTransaction)> {
        let result = ApiResult::from_http_parts(nonce, signature, timestamp, serial_no, body)?;
        Self::parse(client, &result).await
    }

    /// Verify and decrypt a pre-built carrier into the envelope and the
    /// decrypted transaction.
    pub async fn parse(
        client: &Client,
        result: &ApiResult,
    ) -> Result<(Self, PayNotifyTransaction)> {
        let (notification, plaintext) = client.parse_notification(result).await?;
        let transaction: PayNotifyTransaction = serde_json::from_slice(&plaintext)?;
        Ok((Self(notification), transaction))
    }
}

/// The transaction carried by a refund notification.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefundNotifyTransaction {
    #[serde(rename = "mchid")]
    pub mch_id: String,
    pub out_trade_no: String,
    pub transaction_id: String,
    pub out_refund_no: String,
    pub refund_id: String,
    pub refund_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_time: Option<chrono::DateTime<chrono::FixedOffset>>,
    pub user_received_account: String,
    pub amount: RefundAmountInNotify,
}

/// A decoded refund notification.
#[derive(Clone, Debug)]
pub struct RefundNotification(pub Notification);

impl RefundNotification {
    /// Decode a refund notification from the parts of the inbound HTTP
    /// request.
    pub async fn from_http_parts(
        client: &Client,
        nonce: &str,
        signature: &str,
        timestamp: &str,
        serial_no: &str,
        body: Vec<u8>,
    ) -> Result<(Self, RefundNotifyTransaction)> {
        let result = ApiResult::from_http_parts(nonce, signature, timestamp, serial_no, body)?;
        Self::parse(client, &result).await
    }

    /// Verify and decrypt a pre-built carrier.
    pub async fn parse(
        client: &Client,
        result: &ApiResult,
    ) -> Result<(Self, RefundNotifyTransaction)> {
        let (notification, plaintext) = client.parse_notification(result).await?;
        let transaction: RefundNotifyTransaction = serde_json::from_slice(&plaintext)?;
        Ok((Self(notification), transaction))
    }
}
