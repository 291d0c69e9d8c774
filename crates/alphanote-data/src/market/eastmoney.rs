//! Eastmoney 일봉 (1차 소스).
//!
//! 심볼 표기: `secid = <시장>.<코드>` (상하이 1, 선전/베이징 0).
//! kline 행은 `날짜,시가,종가,고가,저가,거래량,거래대금` 순서의 CSV 문자열입니다.

use std::str::FromStr;
use std::time::Duration;

use alphanote_core::{DailyQuote, Exchange, Instrument};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use super::QuoteSource;
use crate::{DataError, Result};

const DEFAULT_BASE_URL: &str = "https://push2his.eastmoney.com";

/// Eastmoney 심볼 표기.
pub fn secid(instrument: &Instrument) -> String {
    let market = match instrument.exchange() {
        Exchange::Shanghai => 1,
        Exchange::Shenzhen | Exchange::Beijing => 0,
    };
    format!("{}.{}", market, instrument.symbol)
}

#[derive(Debug, Deserialize)]
struct KlineResponse {
    #[serde(default)]
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    #[serde(default)]
    klines: Vec<String>,
}

pub struct EastmoneySource {
    client: reqwest::Client,
    base_url: String,
}

impl EastmoneySource {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

fn parse_decimal(field: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim())
        .map_err(|e| DataError::QuoteParse(format!("{} '{}': {}", field, raw, e)))
}

/// kline 행 하나를 파싱합니다.
pub(crate) fn parse_kline(symbol: &str, line: &str) -> Result<DailyQuote> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 6 {
        return Err(DataError::QuoteParse(format!("short kline row: {}", line)));
    }

    let date = NaiveDate::parse_from_str(fields[0], "%Y-%m-%d")
        .map_err(|e| DataError::QuoteParse(format!("date '{}': {}", fields[0], e)))?;
    let volume = fields[5]
        .trim()
        .parse::<f64>()
        .ok()
        .map(|v| v.round() as i64);
    let turnover = fields
        .get(6)
        .and_then(|raw| Decimal::from_str(raw.trim()).ok());

    Ok(DailyQuote {
        symbol: symbol.to_string(),
        date,
        open: parse_decimal("open", fields[1])?,
        close: parse_decimal("close", fields[2])?,
        high: parse_decimal("high", fields[3])?,
        low: parse_decimal("low", fields[4])?,
        volume,
        turnover,
    })
}

#[async_trait]
impl QuoteSource for EastmoneySource {
    fn name(&self) -> &str {
        "eastmoney"
    }

    async fn fetch_daily(
        &self,
        instrument: &Instrument,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyQuote>> {
        let url = format!("{}/api/qt/stock/kline/get", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[
                ("secid", secid(instrument)),
                ("fields1", "f1,f2,f3,f4,f5,f6".to_string()),
                ("fields2", "f51,f52,f53,f54,f55,f56,f57".to_string()),
                ("klt", "101".to_string()),
                ("fqt", "1".to_string()),
                ("beg", start.format("%Y%m%d").to_string()),
                ("end", end.format("%Y%m%d").to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DataError::QuoteFetch(format!(
                "eastmoney HTTP {} for {}",
                response.status(),
                instrument.symbol
            )));
        }

        let body: KlineResponse = response.json().await?;
        let Some(data) = body.data else {
            return Err(DataError::QuoteFetch(format!(
                "eastmoney returned no data for {}",
                instrument.symbol
            )));
        };

        let quotes = data
            .klines
            .iter()
            .map(|line| parse_kline(&instrument.symbol, line))
            .collect::<Result<Vec<_>>>()?;

        debug!(symbol = %instrument.symbol, count = quotes.len(), "Eastmoney klines fetched");
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_secid_encoding() {
        assert_eq!(secid(&Instrument::new("600519", "贵州茅台")), "1.600519");
        assert_eq!(secid(&Instrument::new("510300", "沪深300ETF")), "1.510300");
        assert_eq!(secid(&Instrument::new("000001", "平安银行")), "0.000001");
        assert_eq!(secid(&Instrument::new("159915", "创业板ETF")), "0.159915");
    }

    #[test]
    fn test_parse_kline_field_order() {
        let quote = parse_kline("600519", "2024-01-02,1715.00,1685.01,1718.19,1680.00,32156,5450000000.00")
            .unwrap();
        assert_eq!(quote.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(quote.open, dec!(1715.00));
        assert_eq!(quote.close, dec!(1685.01));
        assert_eq!(quote.high, dec!(1718.19));
        assert_eq!(quote.low, dec!(1680.00));
        assert_eq!(quote.volume, Some(32156));
        assert_eq!(quote.turnover, Some(dec!(5450000000.00)));
    }

    #[test]
    fn test_parse_kline_rejects_garbage() {
        assert!(parse_kline("600519", "2024-01-02,1,2").is_err());
        assert!(parse_kline("600519", "not-a-date,1,2,3,4,5").is_err());
    }
}
