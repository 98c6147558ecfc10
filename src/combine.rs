//! Combined transaction endpoints: one payment collecting several
//! sub-orders, plus the matching query and close operations.

use chrono::{DateTime, FixedOffset};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::pay::{PaySceneInfo, TradeType};
use crate::query::Payer;
use crate::{Client, Error, Result};

/// Amount of one sub-order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CombinePayAmount {
    #[serde(rename = "total_amount")]
    pub total: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Settlement information for a sub-order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SettleInfo {
    pub profit_sharing: bool,
    pub subsidy_amount: bool,
}

/// One order under the combined transaction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SubOrder {
    #[serde(rename = "mchid")]
    pub mch_id: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub attach: String,
    pub amount: CombinePayAmount,
    pub out_trade_no: String,
    pub description: String,
}

/// Request to start a combined payment.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CombinePayRequest {
    /// Application id; defaults from the client configuration.
    #[serde(rename = "combine_appid")]
    pub app_id: String,
    /// Merchant id; defaults from the client configuration.
    #[serde(rename = "combine_mchid")]
    pub mch_id: String,
    #[serde(rename = "combine_out_trade_no")]
    pub out_trade_no: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_expire: Option<DateTime<FixedOffset>>,
    pub notify_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_info: Option<PaySceneInfo>,
    #[serde(rename = "combine_payer_info", skip_serializing_if = "Option::is_none")]
    pub payer: Option<Payer>,
    #[serde(rename = "sub_orders", skip_serializing_if = "Vec::is_empty")]
    pub orders: Vec<SubOrder>,
    #[serde(skip)]
    pub trade_type: TradeType,
}

/// Response to a combined payment request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CombinePayResponse {
    /// Returned for NATIVE trades.
    pub code_url: String,
    /// Returned for JSAPI and APP trades.
    pub prepay_id: String,
    /// Returned for H5 trades.
    pub h5_url: String,
}

impl CombinePayRequest {
    /// Send the combined payment request and decode the response.
    pub async fn send(&self, client: &Client) -> Result<CombinePayResponse> {
        let mut req = self.clone();
        if req.app_id.is_empty() {
            req.app_id = client.config().app_id.clone();
        }
        if req.mch_id.is_empty() {
            req.mch_id = client.config().mch_id.clone();
        }

        if req.orders.is_empty() {
            return Err(Error::invalid_input("sub_orders", "orders is required"));
        }
        if req.trade_type == TradeType::Jsapi
            && req.payer.as_ref().map_or(true, |p| p.open_id.is_empty())
        {
            return Err(Error::invalid_input("payer", "payer is required for JSAPI"));
        }

        let url = req.url(&client.options().domain);
        client.execute(Method::POST, &url, Some(&req)).await.scan()
    }

    fn url(&self, domain: &str) -> String {
        format!(
            "{}/v3/combine-transactions/{}",
            domain,
            self.trade_type.endpoint()
        )
    }
}

/// Request to query a combined transaction by the combined order number.
#[derive(Clone, Debug, Default)]
pub struct CombineQueryRequest {
    pub out_trade_no: String,
}

/// Response to a combined transaction query.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineQueryResponse {
    #[serde(rename = "combine_appid")]
    pub app_id: String,
    #[serde(rename = "combine_mchid")]
    pub mch_id: String,
    #[serde(rename = "combine_out_trade_no")]
    pub out_trade_no: String,
    pub scene_info: Option<crate::query::TransactionSceneInfo>,
    pub sub_orders: Vec<SubOrderInQuery>,
    #[serde(rename = "combine_payer_info")]
    pub payer: Option<Payer>,
}

/// State of one sub-order in a combined transaction query.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubOrderInQuery {
    #[serde(rename = "mchid")]
    pub mch_id: String,
    pub trade_type: Option<TradeType>,
    pub trade_state: String,
    pub bank_type: String,
    pub attach: String,
    pub success_time: Option<DateTime<FixedOffset>>,
    pub transaction_id: String,
    pub out_trade_no: String,
    pub amount: CombineQueryAmount,
}

/// Amounts of one queried sub-order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineQueryAmount {
    pub total_amount: i64,
    pub currency: String,
    pub payer_amount: i64,
    pub payer_currency: String,
}

impl CombineQueryRequest {
    /// Send the combined query and decode the response.
    pub async fn send(&self, client: &Client) -> Result<CombineQueryResponse> {
        if self.out_trade_no.is_empty() {
            return Err(Error::invalid_input(
                "combine_out_trade_no",
                "must not be empty",
            ));
        }

        let url = format!(
            "{}/v3/combine-transactions/out-trade-no/{}",
            client.options().domain,
            self.out_trade_no
        );
        client.execute::<()>(Method::GET, &url, None).await.scan()
    }
}

/// One sub-order in a combined close request.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CloseSubOrder {
    #[serde(rename = "mchid")]
    pub mch_id: String,
    pub out_trade_no: String,
}

/// Request to close a combined transaction. Answers HTTP 204.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CombineCloseRequest {
    /// Application id; defaults from the client configuration.
    #[serde(rename = "combine_appid")]
    pub app_id: String,
    #[serde(rename = "combine_out_trade_no")]
    pub out_trade_no: String,
    #[serde(rename = "sub_orders", skip_serializing_if = "Vec::is_empty")]
    pub orders: Vec<CloseSubOrder>,
}

impl CombineCloseRequest {
    /// Send the combined close request.
    pub async fn send(&self, client: &Client) -> Result<()> {
        let mut req = self.clone();
        if req.app_id.is_empty() {
            req.app_id = client.config().app_id.clone();
        }

        if req.orders.is_empty() {
            return Err(Error::invalid_input("sub_orders", "orders is required"));
        }

        let url = format!(
            "{}/v3/combine-transactions/out-trade-no/{}/close",
            client.options().domain,
            req.out_trade_no
        );
        client.execute(Method::POST, &url, Some(&req)).await.error()
    }
}
