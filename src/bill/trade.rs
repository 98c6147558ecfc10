//! Trade bill retrieval and decoding.

use reqwest::Method;
use url::form_urlencoded;

use super::{
    decompress, field, parse_amount, parse_count, validate_bill_date, BillType, FileUrl, TarType,
};
use crate::{Client, Error, Result};

const ALL_COLUMNS: usize = 27;
const REFUND_COLUMNS: usize = 29;
const SUCCESS_COLUMNS: usize = 20;
const SUMMARY_COLUMNS: usize = 7;

/// Request for a trade bill.
#[derive(Clone, Debug, Default)]
pub struct TradeBillRequest {
    /// Billing day, `YYYY-MM-DD`. Required.
    pub bill_date: String,
    /// Bill flavor; the server defaults to ALL when absent.
    pub bill_type: Option<BillType>,
    /// Stream compression.
    pub tar_type: TarType,
}

/// A decoded trade bill. Only the vector matching the requested bill
/// type is populated.
#[derive(Clone, Debug, Default)]
pub struct TradeBillResponse {
    pub summary: TradeBillSummary,
    pub all: Vec<AllTradeBill>,
    pub refund: Vec<RefundTradeBill>,
    pub success: Vec<SuccessTradeBill>,
}

/// The summary row closing every trade bill.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TradeBillSummary {
    pub total_number_of_transactions: i64,
    pub total_settlement_fee: f64,
    pub total_refund_fee: f64,
    pub total_coupon_fee: f64,
    pub total_commission_fee: f64,
    pub total_apply_refund_fee: f64,
    pub total_amount: f64,
}

/// One record of an ALL trade bill.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AllTradeBill {
    pub trade_time: String,
    pub app_id: String,
    pub mch_id: String,
    pub special_mch_id: String,
    pub device_id: String,
    pub transaction_id: String,
    pub out_trade_no: String,
    pub open_id: String,
    pub trade_type: String,
    pub trade_state: String,
    pub bank_type: String,
    pub currency: String,
    pub settlement_total_fee: f64,
    pub coupon_amount: f64,
    pub payer_refund_id: String,
    pub merchant_refund_id: String,
    pub refund_amount: f64,
    pub coupon_refund_amount: f64,
    pub refund_type: String,
    pub refund_status: String,
    pub good_name: String,
    pub attach: String,
    pub commission_fee: f64,
    pub rate: String,
    pub amount: f64,
    pub refund_apply_amount: f64,
    pub rate_comment: String,
}

/// One record of a REFUND trade bill.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RefundTradeBill {
    pub trade_time: String,
    pub app_id: String,
    pub mch_id: String,
    pub special_mch_id: String,
    pub device_id: String,
    pub transaction_id: String,
    pub out_trade_no: String,
    pub open_id: String,
    pub trade_type: String,
    pub trade_state: String,
    pub bank_type: String,
    pub currency: String,
    pub settlement_total_fee: f64,
    pub coupon_amount: f64,
    pub refund_apply_time: String,
    pub refund_success_time: String,
    pub payer_refund_id: String,
    pub merchant_refund_id: String,
    pub refund_amount: f64,
    pub coupon_refund_amount: f64,
    pub refund_type: String,
    pub refund_status: String,
    pub good_name: String,
    pub attach: String,
    pub commission_fee: f64,
    pub rate: String,
    pub amount: f64,
    pub refund_apply_amount: f64,
    pub rate_comment: String,
}

/// One record of a SUCCESS trade bill.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SuccessTradeBill {
    pub trade_time: String,
    pub app_id: String,
    pub mch_id: String,
    pub special_mch_id: String,
    pub device_id: String,
    pub transaction_id: String,
    pub out_trade_no: String,
    pub open_id: String,
    pub trade_type: String,
    pub trade_state: String,
    pub bank_type: String,
    pub currency: String,
    pub settlement_total_fee: f64,
    pub coupon_amount: f64,
    pub good_name: String,
    pub attach: String,
    pub commission_fee: f64,
    pub rate: String,
    pub amount: f64,
    pub rate_comment: String,
}

impl TradeBillRequest {
    /// Resolve the bill descriptor: validate, then signed GET against
    /// the bill-indexing endpoint.
    pub async fn send(&self, client: &Client) -> Result<FileUrl> {
        validate_bill_date(&self.bill_date)?;

        let url = self.url(&client.options().domain);
        client.execute::<()>(Method::GET, &url, None).await.scan()
    }

    /// Download the raw bill bytes, decompressed when GZIP was asked
    /// for.
    pub async fn download(&self, client: &Client) -> Result<Vec<u8>> {
        let file_url = self.send(client).await?;
        let data = client.download(&file_url).await?;
        decompress(self.tar_type, data)
    }

    /// Download and decode the bill into typed records.
    pub async fn download_decoded(&self, client: &Client) -> Result<TradeBillResponse> {
        let data = self.download(client).await?;
        decode_trade_bill(self.bill_type, &data)
    }

    fn url(&self, domain: &str) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("bill_date", &self.bill_date);
        if let Some(bill_type) = self.bill_type {
            query.append_pair("bill_type", bill_type.as_str());
        }
        if self.tar_type != TarType::DataStream {
            query.append_pair("tar_type", self.tar_type.as_str());
        }
        format!("{}/v3/bill/tradebill?{}", domain, query.finish())
    }
}

/// Decode trade bill bytes.
///
/// The first line is a header. Records are split on `,` with a back-tick
/// prefix per field; the summary is the first seven-column line after its
/// own header and terminates the decode. A widened record schema that
/// reaches seven columns would misclassify here; the wire format offers
/// no version hint.
pub fn decode_trade_bill(bill_type: Option<BillType>, data: &[u8]) -> Result<TradeBillResponse> {
    if data.is_empty() {
        return Err(Error::invalid_bill("empty bill data"));
    }
    let text = std::str::from_utf8(data)
        .map_err(|_| Error::invalid_bill("bill stream is not valid UTF-8"))?;

    let mut resp = TradeBillResponse::default();
    let mut first = true;
    for (i, line) in text.lines().enumerate() {
        if i == 0 {
            continue;
        }
        let values: Vec<&str> = line.split(',').collect();

        if values.len() == SUMMARY_COLUMNS {
            if first {
                first = false;
                continue;
            }
            resp.summary = decode_summary(&values)?;
            break;
        }

        match bill_type.unwrap_or(BillType::All) {
            BillType::All => resp.all.push(decode_all(&values)?),
            BillType::Refund => resp.refund.push(decode_refund(&values)?),
            BillType::Success => resp.success.push(decode_success(&values)?),
        }
    }

    Ok(resp)
}

fn decode_summary(values: &[&str]) -> Result<TradeBillSummary> {
    if values.len() != SUMMARY_COLUMNS {
        return Err(Error::invalid_bill(format!(
            "summary row has {} columns, want {}",
            values.len(),
            SUMMARY_COLUMNS
        )));
    }

    Ok(TradeBillSummary {
        total_number_of_transactions: parse_count(values, 0)?,
        total_settlement_fee: parse_amount(values, 1)?,
        total_refund_fee: parse_amount(values, 2)?,
        total_coupon_fee: parse_amount(values, 3)?,
        total_commission_fee: parse_amount(values, 4)?,
        total_apply_refund_fee: parse_amount(values, 5)?,
        total_amount: parse_amount(values, 6)?,
    })
}

fn decode_all(values: &[&str]) -> Result<AllTradeBill> {
    if values.len() != ALL_COLUMNS {
        return Err(Error::invalid_bill(format!(
            "ALL record has {} columns, want {}",
            values.len(),
            ALL_COLUMNS
        )));
    }

    Ok(AllTradeBill {
        trade_time: field(values, 0),
        app_id: field(values, 1),
        mch_id: field(values, 2),
        special_mch_id: field(values, 3),
        device_id: field(values, 4),
        transaction_id: field(values, 5),
        out_trade_no: field(values, 6),
        open_id: field(values, 7),
        trade_type: field(values, 8),
        trade_state: field(values, 9),
        bank_type: field(values, 10),
        currency: field(values, 11),
        settlement_total_fee: parse_amount(values, 12)?,
        coupon_amount: parse_amount(values, 13)?,
        payer_refund_id: field(values, 14),
        merchant_refund_id: field(values, 15),
        refund_amount: parse_amount(values, 16)?,
        coupon_refund_amount: parse_amount(values, 17)?,
        refund_type: field(values, 18),
        refund_status: field(values, 19),
        good_name: field(values, 20),
        attach: field(values, 21),
        commission_fee: parse_amount(values, 22)?,
        rate: field(values, 23),
        amount: parse_amount(values, 24)?,
        refund_apply_amount: parse_amount(values, 25)?,
        rate_comment: field(values, 26),
    })
}

fn decode_refund(values: &[&str]) -> Result<RefundTradeBill> {
    if values.len() != REFUND_COLUMNS {
        return Err(Error::invalid_bill(format!(
            "REFUND record has {} columns, want {}",
            values.len(),
            REFUND_COLUMNS
        )));
    }

    Ok(RefundTradeBill {
        trade_time: field(values, 0),
        app_id: field(values, 1),
        mch_id: field(values, 2),
        special_mch_id: field(values, 3),
        device_id: field(values, 4),
        transaction_id: field(values, 5),
        out_trade_no: field(values, 6),
        open_id: field(values, 7),
        trade_type: field(values, 8),
        trade_state: field(values, 9),
        bank_type: field(values, 10),
        currency: field(values, 11),
        settlement_total_fee: parse_amount(values, 12)?,
        coupon_amount: parse_amount(values, 13)?,
        refund_apply_time: field(values, 14),
        refund_success_time: field(values, 15),
        payer_refund_id: field(values, 16),
        merchant_refund_id: field(values, 17),
        refund_amount: parse_amount(values, 18)?,
        coupon_refund_amount: parse_amount(values, 19)?,
        refund_type: field(values, 20),
        refund_status: field(values, 21),
        good_name: field(values, 22),
        attach: field(values, 23),
        commission_fee: parse_amount(values, 24)?,
        rate: field(values, 25),
        amount: parse_amount(values, 26)?,
        refund_apply_amount: parse_amount(values, 27)?,
        rate_comment: field(values, 28),
    })
}

fn decode_success(values: &[&str]) -> Result<SuccessTradeBill> {
    if values.len() != SUCCESS_COLUMNS {
        return Err(Error::invalid_bill(format!(
            "SUCCESS record has {} columns, want {}",
            values.len(),
            SUCCESS_COLUMNS
        )));
    }

    Ok(SuccessTradeBill {
        trade_time: field(values, 0),
        app_id: field(values, 1),
        mch_id: field(values, 2),
        special_mch_id: field(values, 3),
        device_id: field(values, 4),
        transaction_id: field(values, 5),
        out_trade_no: field(values, 6),
        open_id: field(values, 7),
        trade_type: field(values, 8),
        trade_state: field(values, 9),
        bank_type: field(values, 10),
        currency: field(values, 11),
        settlement_total_fee: parse_amount(values, 12)?,
        coupon_amount: parse_amount(values, 13)?,
        good_name: field(values, 14),
        attach: field(values, 15),
        commission_fee: parse_amount(values, 16)?,
        rate: field(values, 17),
        amount: parse_amount(values, 18)?,
        rate_comment: field(values, 19),
    })
}
