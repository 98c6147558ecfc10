//! Refund and refund-query endpoints.

use chrono::{DateTime, FixedOffset};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::{Client, Error, Result};

/// Request to refund a paid transaction. Identify the original payment
/// by `transaction_id` or `out_trade_no`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RefundRequest {
    pub transaction_id: String,
    pub out_trade_no: String,
    pub out_refund_no: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notify_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub funds_account: String,
    pub amount: RefundAmount,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub goods_detail: Vec<RefundGoodDetail>,
}

/// Amount to refund.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RefundAmount {
    pub refund: i64,
    pub total: i64,
    pub currency: String,
}

/// One good in the refund.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefundGoodDetail {
    pub merchant_goods_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub wechatpay_goods_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub goods_name: String,
    pub unit_price: i64,
    pub refund_amount: i64,
    pub refund_quantity: i64,
}

/// Response to a refund request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefundResponse {
    pub refund_id: String,
    pub out_refund_no: String,
    pub transaction_id: String,
    pub out_trade_no: String,
    pub channel: String,
    pub user_received_account: String,
    pub success_time: Option<DateTime<FixedOffset>>,
    pub create_time: Option<DateTime<FixedOffset>>,
    pub status: String,
    pub funds_account: String,
    pub amount: RefundAmountDetail,
    #[serde(rename = "promotion_detail")]
    pub promotion: Option<RefundPromotionDetail>,
}

/// Settled refund amounts.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefundAmountDetail {
    pub total: i64,
    pub refund: i64,
    pub payer_total: i64,
    pub payer_refund: i64,
    pub settlement_total: i64,
    pub settlement_refund: i64,
    pub discount_refund: i64,
    pub currency: String,
}

/// Promotion information about a refund.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefundPromotionDetail {
    pub promotion_id: i64,
    pub scope: String,
    #[serde(rename = "type")]
    pub promotion_type: String,
    pub amount: i64,
    pub refund_amount: i64,
    pub goods_detail: Vec<RefundGoodDetail>,
}

/// Refund amounts carried by a refund notification.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefundAmountInNotify {
    pub total: i64,
    pub refund: i64,
    pub payer_total: i64,
    pub payer_refund: i64,
}

impl RefundRequest {
    /// Send the refund request and decode the response.
    pub async fn send(&self, client: &Client) -> Result<RefundResponse> {
        if self.transaction_id.is_empty() && self.out_trade_no.is_empty() {
            return Err(Error::invalid_input(
                "transaction_id",
                "either transaction_id or out_trade_no is required",
            ));
        }
        if self.out_refund_no.is_empty() {
            return Err(Error::invalid_input("out_refund_no", "must not be empty"));
        }

        let url = format!("{}/v3/refund/domestic/refunds", client.options().domain);
        client.execute(Method::POST, &url, Some(self)).await.scan()
    }
}

/// Request to query one refund by merchant refund number.
#[derive(Clone, Debug, Default)]
pub struct RefundQueryRequest {
    pub out_refund_no: String,
}

/// Response to a refund query.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefundQueryResponse {
    pub refund_id: String,
    pub out_refund_no: String,
    pub transaction_id: String,
    pub out_trade_no: String,
    pub channel: String,
    pub user_received_account: String,
    pub success_time: Option<DateTime<FixedOffset>>,
    pub create_time: Option<DateTime<FixedOffset>>,
    pub status: String,
    pub funds_account: String,
    pub amount: Option<RefundQueryAmount>,
    #[serde(rename = "promotion_detail")]
    pub promotion: Vec<RefundQueryPromotionDetail>,
}

/// Amounts of the queried refund.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefundQueryAmount {
    pub total: i64,
    pub refund: i64,
    pub payer_total: i64,
    pub payer_refund: i64,
    pub settlement_refund: i64,
    pub settlement_total: i64,
    pub discount_refund: i64,
    pub currency: String,
}

/// Promotion details of the queried refund.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefundQueryPromotionDetail {
    pub promotion_id: String,
    pub scope: String,
    #[serde(rename = "type")]
    pub promotion_type: String,
    pub amount: i64,
    pub refund_amount: i64,
    pub goods_detail: Vec<GoodsDetail>,
}

/// Goods detail in a refund query.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoodsDetail {
    pub merchant_goods_id: String,
    pub wechatpay_goods_id: String,
    pub goods_name: String,
    pub unit_price: i64,
    pub refund_amount: i64,
    pub refund_quantity: i64,
}

impl RefundQueryRequest {
    /// Send the refund query and decode the response.
    pub async fn send(&self, client: &Client) -> Result<RefundQueryResponse> {
        if self.out_refund_no.is_empty() {
            return Err(Error::invalid_input("out_refund_no", "must not be empty"));
        }

        let url = format!(
            "{}/v3/refund/domestic/refunds/{}",
            client.options().domain,
            self.out_refund_no
        );
        client.execute::<()>(Method::GET, &url, None).await.scan()
    }
}
