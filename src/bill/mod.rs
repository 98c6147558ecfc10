//! Bill download and stream decoding.
//!
//! Bill retrieval is a two-hop protocol: a signed GET against the
//! bill-indexing endpoint returns a small descriptor with a time-limited
//! download URL, and a second signed GET streams the file itself. Files
//! are optionally gzip-compressed and decode into fixed-schema records
//! where every CSV field carries a single back-tick prefix.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub mod fundflow;
pub mod trade;

pub use fundflow::{FundFlowBill, FundFlowBillRequest, FundFlowBillResponse, FundFlowBillSummary};
pub use trade::{
    AllTradeBill, RefundTradeBill, SuccessTradeBill, TradeBillRequest, TradeBillResponse,
    TradeBillSummary,
};

/// Descriptor returned by a bill-indexing endpoint: integrity hash plus
/// the download URL for the second hop.
///
/// The hash fields are propagated to the caller but not enforced by the
/// client; the server does not document the hash scheme.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileUrl {
    pub hash_type: String,
    pub hash_value: String,
    pub download_url: String,
}

/// Compression applied to the bill stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TarType {
    /// Plain CSV stream.
    #[default]
    DataStream,
    /// Gzip-compressed stream.
    Gzip,
}

impl TarType {
    /// Wire value for the `tar_type` query parameter; empty for the
    /// plain stream, which omits the parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataStream => "",
            Self::Gzip => "GZIP",
        }
    }
}

/// Trade bill flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BillType {
    All,
    Success,
    Refund,
}

impl BillType {
    /// Wire value for the `bill_type` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Success => "SUCCESS",
            Self::Refund => "REFUND",
        }
    }
}

/// Fund-flow account flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountType {
    Basic,
    Operation,
    Fees,
}

impl AccountType {
    /// Wire value for the `account_type` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "BASIC",
            Self::Operation => "OPERATION",
            Self::Fees => "FEES",
        }
    }
}

/// Validate a `bill_date` request field.
pub(crate) fn validate_bill_date(bill_date: &str) -> Result<()> {
    if bill_date.is_empty() {
        return Err(Error::invalid_input("bill_date", "bill date is required"));
    }
    chrono::NaiveDate::parse_from_str(bill_date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| Error::invalid_input("bill_date", "invalid bill date, the format: YYYY-MM-DD"))
}

/// Gunzip the stream in memory when the request asked for GZIP,
/// otherwise hand the bytes back verbatim.
pub(crate) fn decompress(tar_type: TarType, data: Vec<u8>) -> Result<Vec<u8>> {
    match tar_type {
        TarType::DataStream => Ok(data),
        TarType::Gzip => {
            let mut decoder = flate2::read::GzDecoder::new(data.as_slice());
            let mut uncompressed = Vec::new();
            decoder
                .read_to_end(&mut uncompressed)
                .map_err(|e| Error::invalid_bill(format!("gzip: {}", e)))?;
            Ok(uncompressed)
        }
    }
}

/// Strip the back-tick prefix the platform puts on every data field.
pub(crate) fn field(values: &[&str], idx: usize) -> String {
    let value = values[idx];
    value.strip_prefix('`').unwrap_or(value).to_string()
}

/// Parse an amount column, locale-neutral decimal point.
pub(crate) fn parse_amount(values: &[&str], idx: usize) -> Result<f64> {
    let value = values[idx];
    let value = value.strip_prefix('`').unwrap_or(value);
    value
        .parse::<f64>()
        .map_err(|_| Error::invalid_bill(format!("column {}: invalid amount {:?}", idx, value)))
}

/// Parse a count column.
pub(crate) fn parse_count(values: &[&str], idx: usize) -> Result<i64> {
    let value = values[idx];
    let value = value.strip_prefix('`').unwrap_or(value);
    value
        .parse::<i64>()
        .map_err(|_| Error::invalid_bill(format!("column {}: invalid count {:?}", idx, value)))
}
