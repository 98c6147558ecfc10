//! Transaction close endpoint.

use reqwest::Method;
use serde::Serialize;

use crate::{Client, Error, Result};

/// Request to close an unpaid transaction. A successful close answers
/// with HTTP 204 and no body.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CloseRequest {
    /// Merchant id; defaults from the client configuration.
    #[serde(rename = "mchid")]
    pub mch_id: String,
    /// Merchant order number, carried in the URL.
    #[serde(skip)]
    pub out_trade_no: String,
}

impl CloseRequest {
    /// Send the close request.
    pub async fn send(&self, client: &Client) -> Result<()> {
        if self.out_trade_no.is_empty() {
            return Err(Error::invalid_input("out_trade_no", "must not be empty"));
        }

        let mut req = self.clone();
        if req.mch_id.is_empty() {
            req.mch_id = client.config().mch_id.clone();
        }

        let url = req.url(&client.options().domain);
        client.execute(Method::POST, &url, Some(&req)).await.error()
    }

    fn url(&self, domain: &str) -> String {
        format!(
            "{}/v3/pay/transactions/out-trade-no/{}/close",
            domain, self.out_trade_no
        )
    }
}
