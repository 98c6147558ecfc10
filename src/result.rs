//! The carrier returned by the HTTP core.
//!
//! An [`ApiResult`] holds everything needed to verify and decode one
//! platform message: the raw body, the four signature headers, and any
//! error picked up along the send pipeline. Endpoint value objects
//! consume it through [`ApiResult::scan`] or [`ApiResult::error`].

use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// Result of one `Client::execute` call, or an inbound notification
/// repackaged through [`ApiResult::from_http_parts`].
#[derive(Debug, Default)]
pub struct ApiResult {
    /// Raw response body, empty on HTTP 204.
    pub body: Vec<u8>,
    /// UNIX timestamp from `Wechatpay-Timestamp`.
    pub timestamp: i64,
    /// Nonce from `Wechatpay-Nonce`.
    pub nonce: String,
    /// Base64 signature from `Wechatpay-Signature`.
    pub signature: String,
    /// Certificate serial from `Wechatpay-Serial`.
    pub serial_no: String,
    /// Error carried from the send pipeline, if any.
    pub err: Option<Error>,
}

impl ApiResult {
    /// Wrap a pipeline failure.
    pub(crate) fn from_error(err: Error) -> Self {
        Self {
            err: Some(err),
            ..Default::default()
        }
    }

    /// Build a carrier from the parts of an inbound HTTP request.
    ///
    /// Header extraction matches the client's own response handling: an
    /// empty timestamp reads as zero, a non-numeric one is a bad-header
    /// error.
    pub fn from_http_parts(
        nonce: &str,
        signature: &str,
        timestamp: &str,
        serial_no: &str,
        body: Vec<u8>,
    ) -> Result<Self> {
        let timestamp = parse_timestamp(timestamp)?;
        Ok(Self {
            body,
            timestamp,
            nonce: nonce.to_string(),
            signature: signature.to_string(),
            serial_no: serial_no.to_string(),
            err: None,
        })
    }

    /// Surface the carried error, then JSON-decode the body into `T`.
    ///
    /// An empty body (HTTP 204) is a successful no-op yielding
    /// `T::default()`.
    pub fn scan<T>(self) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        if let Some(err) = self.err {
            return Err(err);
        }
        if self.body.is_empty() {
            return Ok(T::default());
        }
        serde_json::from_slice(&self.body).map_err(Error::from)
    }

    /// Surface only the carried error; used by endpoints whose success
    /// response has no body.
    pub fn error(self) -> Result<()> {
        match self.err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Parse a `Wechatpay-Timestamp` header value.
pub(crate) fn parse_timestamp(value: &str) -> Result<i64> {
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse::<i64>()
        .map_err(|_| Error::bad_header(format!("non-numeric timestamp {:?}", value)))
}
