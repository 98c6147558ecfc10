//! Payment endpoint.
//!
//! One request shape serves the four trade types; the trade type picks
//! the URL suffix and decides which response field carries the result
//! (`code_url` for NATIVE, `prepay_id` for JSAPI/APP, `h5_url` for H5).

use chrono::{DateTime, FixedOffset};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::query::Payer;
use crate::{Client, Error, Result};

/// Trade type as defined by the platform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    Jsapi,
    App,
    H5,
    #[default]
    Native,
}

impl TradeType {
    /// URL path segment for this trade type.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Jsapi => "jsapi",
            Self::App => "app",
            Self::H5 => "h5",
            Self::Native => "native",
        }
    }
}

/// Amount to collect.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PayAmount {
    /// Amount in the currency's minor unit (cents).
    pub total: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Promotion information attached to the order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PayDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_price: Option<i64>,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub invoice_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub goods_detail: Vec<GoodDetail>,
}

/// One good in the order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GoodDetail {
    pub merchant_goods_id: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub wechatpay_goods_id: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub goods_name: String,
    pub quantity: i64,
    pub unit_price: i64,
}

/// Scene information about the paying device.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PaySceneInfo {
    pub payer_client_ip: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_info: Option<StoreInfo>,
}

/// The store the payment happened in.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreInfo {
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub area_code: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub address: String,
}

/// Request to start a payment.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PayRequest {
    /// Application id; defaults from the client configuration.
    #[serde(rename = "appid")]
    pub app_id: String,
    /// Merchant id; defaults from the client configuration.
    #[serde(rename = "mchid")]
    pub mch_id: String,
    pub description: String,
    pub out_trade_no: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_expire: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub attach: String,
    pub notify_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub goods_tag: String,
    pub amount: PayAmount,
    /// Required for JSAPI, forbidden for the other trade types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<Payer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<PayDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_info: Option<PaySceneInfo>,
    #[serde(skip)]
    pub trade_type: TradeType,
}

/// Response to a payment request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PayResponse {
    /// Returned for NATIVE trades.
    pub code_url: String,
    /// Returned for JSAPI and APP trades.
    pub prepay_id: String,
    /// Returned for H5 trades.
    pub h5_url: String,
}

impl PayRequest {
    /// Send the payment request and decode the response.
    pub async fn send(&self, client: &Client) -> Result<PayResponse> {
        let mut req = self.clone();
        if req.app_id.is_empty() {
            req.app_id = client.config().app_id.clone();
        }
        if req.mch_id.is_empty() {
            req.mch_id = client.config().mch_id.clone();
        }

        match req.trade_type {
            TradeType::Jsapi => {
                if req.payer.as_ref().map_or(true, |p| p.open_id.is_empty()) {
                    return Err(Error::invalid_input("payer", "payer is required for JSAPI"));
                }
            }
            other => {
                if req.payer.is_some() {
                    return Err(Error::invalid_input(
                        "payer",
                        format!("don't set payer for {:?}", other),
                    ));
                }
            }
        }

        let url = req.url(&client.options().domain);
        client.execute(Method::POST, &url, Some(&req)).await.scan()
    }

    fn url(&self, domain: &str) -> String {
        format!(
            "{}/v3/pay/transactions/{}",
            domain,
            self.trade_type.endpoint()
        )
    }
}
