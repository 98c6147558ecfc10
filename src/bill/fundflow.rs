//! Fund-flow bill retrieval and decoding.

use reqwest::Method;
use url::form_urlencoded;

use super::{
    decompress, field, parse_amount, parse_count, validate_bill_date, AccountType, FileUrl,
    TarType,
};
use crate::{Client, Error, Result};

const BILL_COLUMNS: usize = 11;
const SUMMARY_COLUMNS: usize = 5;

/// Request for a fund-flow bill.
#[derive(Clone, Debug, Default)]
pub struct FundFlowBillRequest {
    /// Billing day, `YYYY-MM-DD`. Required.
    pub bill_date: String,
    /// Account flavor; the server defaults to BASIC when absent.
    pub account_type: Option<AccountType>,
    /// Stream compression.
    pub tar_type: TarType,
}

/// A decoded fund-flow bill.
#[derive(Clone, Debug, Default)]
pub struct FundFlowBillResponse {
    pub summary: FundFlowBillSummary,
    pub bill: Vec<FundFlowBill>,
}

/// The summary row closing every fund-flow bill.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FundFlowBillSummary {
    pub total_number: i64,
    pub total_number_of_income: i64,
    pub income_amount: f64,
    pub total_number_of_outcome: i64,
    pub outcome_amount: f64,
}

/// One fund movement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FundFlowBill {
    pub accounting_time: String,
    pub transaction_id: String,
    pub order_no: String,
    pub business_name: String,
    pub business_type: String,
    pub in_outcome_type: String,
    pub in_outcome_amount: f64,
    pub account_balance: f64,
    pub fund_change_applicant: String,
    pub remark: String,
    pub business_number: String,
}

impl FundFlowBillRequest {
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
    pub async fn download_decoded(&self, client: &Client) -> Result<FundFlowBillResponse> {
        let data = self.download(client).await?;
        decode_fund_flow_bill(&data)
    }

    // Parameters in lexical order, the canonical form the indexing
    // endpoint signs.
    fn url(&self, domain: &str) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        if let Some(account_type) = self.account_type {
            query.append_pair("account_type", account_type.as_str());
        }
        query.append_pair("bill_date", &self.bill_date);
        if self.tar_type != TarType::DataStream {
            query.append_pair("tar_type", self.tar_type.as_str());
        }
        format!("{}/v3/bill/fundflowbill?{}", domain, query.finish())
    }
}

/// Decode fund-flow bill bytes.
///
/// Same framing as trade bills: title line, back-tick-prefixed fields,
/// summary detected as the first five-column line after its header.
pub fn decode_fund_flow_bill(data: &[u8]) -> Result<FundFlowBillResponse> {
    if data.is_empty() {
        return Err(Error::invalid_bill("empty bill data"));
    }
    let text = std::str::from_utf8(data)
        .map_err(|_| Error::invalid_bill("bill stream is not valid UTF-8"))?;

    let mut resp = FundFlowBillResponse::default();
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

        resp.bill.push(decode_bill(&values)?);
    }

    Ok(resp)
}

fn decode_summary(values: &[&str]) -> Result<FundFlowBillSummary> {
    if values.len() != SUMMARY_COLUMNS {
        return Err(Error::invalid_bill(format!(
            "summary row has {} columns, want {}",
            values.len(),
            SUMMARY_COLUMNS
        )));
    }

    Ok(FundFlowBillSummary {
        total_number: parse_count(values, 0)?,
        total_number_of_income: parse_count(values, 1)?,
        income_amount: parse_amount(values, 2)?,
        total_number_of_outcome: parse_count(values, 3)?,
        outcome_amount: parse_amount(values, 4)?,
    })
}

fn decode_bill(values: &[&str]) -> Result<FundFlowBill> {
    if values.len() != BILL_COLUMNS {
        return Err(Error::invalid_bill(format!(
            "fund-flow record has {} columns, want {}",
            values.len(),
            BILL_COLUMNS
        )));
    }

    Ok(FundFlowBill {
        accounting_time: field(values, 0),
        transaction_id: field(values, 1),
        order_no: field(values, 2),
        business_name: field(values, 3),
        business_type: field(values, 4),
        in_outcome_type: field(values, 5),
        in_outcome_amount: parse_amount(values, 6)?,
        account_balance: parse_amount(values, 7)?,
        fund_change_applicant: field(values, 8),
        remark: field(values, 9),
        business_number: field(values, 10),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const FUND_FLOW_CSV: &str = "记账时间,微信支付业务单号,资金流水单号,业务名称,业务类型,收支类型,收支金额(元),账户结余(元),资金变更提交申请人,备注,业务凭证号\n`2021-02-01 13:54:01,`50300806962021020105978994968,`4200000920202101197964319284,`退款,`退款,`支出,`0.01,`0.22,`1601959334API,`退款总金额0.01元;含手续费0.00元,`S20210201135356381941\n`2021-02-01 14:00:45,`50300907032021020105978998710,`4200000846202101197461830397,`退款,`退款,`支出,`0.01,`0.21,`1601959334API,`退款总金额0.01元;含手续费0.00元,`S20210201140044552846\n资金流水总笔数,收入笔数,收入金额,支出笔数,支出金额\n`3,`1,`0.01,`2,`0.02\n";

    #[test]
    fn test_decode_fund_flow_bill() {
        let resp = decode_fund_flow_bill(FUND_FLOW_CSV.as_bytes()).unwrap();
        assert_eq!(resp.bill.len(), 2);

        let first = &resp.bill[0];
        assert_eq!(first.accounting_time, "2021-02-01 13:54:01");
        assert_eq!(first.transaction_id, "50300806962021020105978994968");
        assert_eq!(first.in_outcome_type, "支出");
        assert_eq!(first.in_outcome_amount, 0.01);
        assert_eq!(first.account_balance, 0.22);
        assert_eq!(first.business_number, "S20210201135356381941");

        assert_eq!(resp.summary.total_number, 3);
        assert_eq!(resp.summary.total_number_of_income, 1);
        assert_eq!(resp.summary.income_amount, 0.01);
        assert_eq!(resp.summary.total_number_of_outcome, 2);
        assert_eq!(resp.summary.outcome_amount, 0.02);
    }

    #[test]
    fn test_decode_gzipped_matches_plain() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(FUND_FLOW_CSV.as_bytes()).unwrap();
        let gz = encoder.finish().unwrap();

        let data = decompress(TarType::Gzip, gz).unwrap();
        let resp = decode_fund_flow_bill(&data).unwrap();
        let plain = decode_fund_flow_bill(FUND_FLOW_CSV.as_bytes()).unwrap();
        assert_eq!(resp.bill, plain.bill);
        assert_eq!(resp.summary, plain.summary);
    }

    #[test]
    fn test_decode_rejects_bad_balance() {
        let broken = FUND_FLOW_CSV.replace("`0.22", "`balance");
        let err = decode_fund_flow_bill(broken.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::InvalidBill(_)));
    }

    #[test]
    fn test_url_building() {
        let req = FundFlowBillRequest {
            bill_date: "2021-02-01".to_string(),
            account_type: Some(AccountType::Basic),
            tar_type: TarType::Gzip,
        };
        assert_eq!(
            req.url("https://api.mch.weixin.qq.com"),
            "https://api.mch.weixin.qq.com/v3/bill/fundflowbill?account_type=BASIC&bill_date=2021-02-01&tar_type=GZIP"
        );

        let req = FundFlowBillRequest {
            bill_date: "2021-02-01".to_string(),
            account_type: None,
            tar_type: TarType::DataStream,
        };
        assert_eq!(
            req.url("https://host"),
            "https://host/v3/bill/fundflowbill?bill_date=2021-02-01"
        );
    }

    #[tokio::test]
    async fn test_send_validates_bill_date() {
        let client = crate::client_for_tests();
        let err = FundFlowBillRequest::default()
            .send(&client)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }
}
