//! Yahoo chart API 일봉 (2차 소스).
//!
//! 심볼 표기: 상하이 `<코드>.SS`, 선전 `<코드>.SZ`, 베이징 `<코드>.BJ`.

use std::time::Duration;

use alphanote_core::{time, DailyQuote, Exchange, Instrument};
use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use super::QuoteSource;
use crate::{DataError, Result};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Yahoo 심볼 표기.
pub fn yahoo_ticker(instrument: &Instrument) -> String {
    let suffix = match instrument.exchange() {
        Exchange::Shanghai => "SS",
        Exchange::Shenzhen => "SZ",
        Exchange::Beijing => "BJ",
    };
    format!("{}.{}", instrument.symbol, suffix)
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

pub struct YahooChartSource {
    client: reqwest::Client,
    base_url: String,
    timezone: Tz,
}

impl YahooChartSource {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent("Mozilla/5.0")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            timezone: time::DEFAULT_TIMEZONE,
        })
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }
}

fn price(values: &[Option<f64>], index: usize) -> Option<Decimal> {
    values
        .get(index)
        .copied()
        .flatten()
        .and_then(Decimal::from_f64)
        .map(|d| d.round_dp(4))
}

fn to_quotes(symbol: &str, result: ChartResult, tz: Tz) -> Vec<DailyQuote> {
    let series = result.indicators.quote.into_iter().next().unwrap_or_default();

    result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            // 휴장/결측 행은 가격이 null로 온다
            Some(DailyQuote {
                symbol: symbol.to_string(),
                date: time::timestamp_to_date(*ts, tz)?,
                open: price(&series.open, i)?,
                high: price(&series.high, i)?,
                low: price(&series.low, i)?,
                close: price(&series.close, i)?,
                volume: series.volume.get(i).copied().flatten().map(|v| v.round() as i64),
                turnover: None,
            })
        })
        .collect()
}

#[async_trait]
impl QuoteSource for YahooChartSource {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn fetch_daily(
        &self,
        instrument: &Instrument,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyQuote>> {
        let ticker = yahoo_ticker(instrument);
        let url = format!(
            "{}/v8/finance/chart/{}",
            self.base_url.trim_end_matches('/'),
            ticker
        );
        let period1 = time::date_start_timestamp(start, self.timezone);
        let period2 = time::date_end_exclusive_timestamp(end, self.timezone);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DataError::QuoteFetch(format!(
                "yahoo HTTP {} for {}",
                response.status(),
                ticker
            )));
        }

        let body: ChartResponse = response.json().await?;
        if let Some(error) = body.chart.error.filter(|e| !e.is_null()) {
            return Err(DataError::QuoteFetch(format!("yahoo error for {}: {}", ticker, error)));
        }
        let Some(result) = body.chart.result.and_then(|r| r.into_iter().next()) else {
            return Err(DataError::QuoteFetch(format!("yahoo returned no result for {}", ticker)));
        };

        let quotes = to_quotes(&instrument.symbol, result, self.timezone);
        debug!(symbol = %instrument.symbol, ticker = %ticker, count = quotes.len(), "Yahoo chart fetched");
        Ok(quotes)
    }
}
