//! Transaction query endpoint.

use chrono::{DateTime, FixedOffset};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::pay::TradeType;
use crate::{Client, Result};

pub const TRADE_STATE_SUCCESS: &str = "SUCCESS";
pub const TRADE_STATE_REFUND: &str = "REFUND";
pub const TRADE_STATE_NOT_PAY: &str = "NOTPAY";
pub const TRADE_STATE_CLOSED: &str = "CLOSED";
pub const TRADE_STATE_REVOKED: &str = "REVOKED";
pub const TRADE_STATE_USER_PAYING: &str = "USERPAYING";
pub const TRADE_STATE_PAY_ERROR: &str = "PAYERROR";
pub const TRADE_STATE_ACCEPT: &str = "ACCEPT";

/// Request to query one transaction, by platform transaction id when set,
/// by merchant order number otherwise.
#[derive(Clone, Debug, Default)]
pub struct QueryRequest {
    /// Merchant id; defaults from the client configuration.
    pub mch_id: String,
    /// Merchant order number.
    pub out_trade_no: String,
    /// Platform transaction id; takes precedence when non-empty.
    pub transaction_id: String,
}

impl QueryRequest {
    /// Send the query and decode the transaction.
    pub async fn send(&self, client: &Client) -> Result<QueryResponse> {
        let mut req = self.clone();
        if req.mch_id.is_empty() {
            req.mch_id = client.config().mch_id.clone();
        }

        let url = req.url(&client.options().domain);
        client.execute::<()>(Method::GET, &url, None).await.scan()
    }

    fn url(&self, domain: &str) -> String {
        if !self.transaction_id.is_empty() {
            format!(
                "{}/v3/pay/transactions/id/{}?mchid={}",
                domain, self.transaction_id, self.mch_id
            )
        } else {
            format!(
                "{}/v3/pay/transactions/out-trade-no/{}?mchid={}",
                domain, self.out_trade_no, self.mch_id
            )
        }
    }
}

/// A queried transaction. Also the decrypted payload of a payment
/// notification.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryResponse {
    #[serde(rename = "appid")]
    pub app_id: String,
    #[serde(rename = "mchid")]
    pub mch_id: String,
    pub out_trade_no: String,
    pub transaction_id: String,
    pub trade_type: Option<TradeType>,
    pub trade_state: String,
    pub trade_state_desc: String,
    pub bank_type: String,
    pub attach: String,
    pub success_time: Option<DateTime<FixedOffset>>,
    pub payer: Payer,
    pub amount: TransactionAmount,
    pub scene_info: Option<TransactionSceneInfo>,
    #[serde(rename = "promotion_detail")]
    pub promotion: Vec<PromotionDetail>,
}

impl QueryResponse {
    /// True when the transaction reached the `SUCCESS` trade state.
    pub fn is_success(&self) -> bool {
        self.trade_state == TRADE_STATE_SUCCESS
    }
}

/// The payer of a transaction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Payer {
    #[serde(rename = "openid", default)]
    pub open_id: String,
}

/// Settled amounts of a transaction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionAmount {
    pub total: i64,
    pub payer_total: i64,
    pub currency: String,
    pub payer_currency: String,
}

/// Scene information attached to a transaction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionSceneInfo {
    pub device_id: String,
}

/// Coupon usage attached to a transaction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionDetail {
    pub coupon_id: String,
    pub name: String,
    pub scope: String,
    #[serde(rename = "type")]
    pub promotion_type: String,
    pub amount: i64,
    pub stock_id: String,
    pub wechatpay_contribute: i64,
    pub merchant_contribute: i64,
    pub other_contribute: i64,
    pub currency: String,
    pub goods_detail: Vec<TransactionGoodDetail>,
}

/// Goods covered by a promotion.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionGoodDetail {
    pub goods_id: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub discount_amount: i64,
    pub goods_remark: String,
}
