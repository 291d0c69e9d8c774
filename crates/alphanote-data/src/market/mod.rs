//! 일봉 시세 증분 갱신.
//!
//! # 동작 흐름
//!
//! ```text
//! 종목별
//!   ├─ 시작일 = 마지막 저장일 + 1 (없으면 오늘 - lookback)
//!   ├─ 1차 소스 (Eastmoney) ── 실패 시 지수 백오프 재시도
//!   ├─ 2차 소스 (Yahoo, 다른 심볼 표기) ── 1회 시도
//!   └─ 모두 실패 → 경고 후 다음 종목
//! ```

pub mod eastmoney;
pub mod yahoo;

use std::sync::Arc;

use alphanote_core::{time, DailyQuote, Instrument, ProgressTracker};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::retry::{with_retry, RetryConfig};
use crate::store::Store;
use crate::Result;

pub use eastmoney::EastmoneySource;
pub use yahoo::YahooChartSource;

/// 일봉 데이터 소스.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &str;

    /// `[start, end]` 구간의 일봉 (날짜 오름차순).
    async fn fetch_daily(
        &self,
        instrument: &Instrument,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyQuote>>;
}

/// 갱신 설정.
#[derive(Debug, Clone)]
pub struct MarketUpdateConfig {
    /// 저장된 시세가 없을 때 가져올 기간 (일)
    pub lookback_days: i64,
    /// 1차 소스 재시도
    pub retry: RetryConfig,
    /// 날짜 계산 시간대
    pub timezone: Tz,
}

impl Default for MarketUpdateConfig {
    fn default() -> Self {
        Self {
            lookback_days: 365,
            retry: RetryConfig::default(),
            timezone: time::DEFAULT_TIMEZONE,
        }
    }
}

/// 갱신 결과 통계.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketUpdateStats {
    pub instruments: usize,
    pub updated: usize,
    pub up_to_date: usize,
    pub failed: usize,
    pub rows: usize,
    pub fallback_used: usize,
    pub failed_symbols: Vec<String>,
}

/// 증분 시세 갱신기.
pub struct MarketUpdater {
    store: Arc<dyn Store>,
    primary: Arc<dyn QuoteSource>,
    secondary: Option<Arc<dyn QuoteSource>>,
    config: MarketUpdateConfig,
}

enum FetchOutcome {
    Primary(Vec<DailyQuote>),
    Secondary(Vec<DailyQuote>),
}

impl MarketUpdater {
    pub fn new(
        store: Arc<dyn Store>,
        primary: Arc<dyn QuoteSource>,
        secondary: Option<Arc<dyn QuoteSource>>,
        config: MarketUpdateConfig,
    ) -> Self {
        Self {
            store,
            primary,
            secondary,
            config,
        }
    }

    /// 종목의 조회 시작일.
    pub async fn start_date_for(&self, symbol: &str, today: NaiveDate) -> Result<NaiveDate> {
        Ok(match self.store.latest_quote_date(symbol).await? {
            Some(latest) => latest + Duration::days(1),
            None => today - Duration::days(self.config.lookback_days),
        })
    }

    /// 대상 종목 전체(또는 `symbols`만)를 갱신합니다.
    ///
    /// 종목 하나의 실패는 전체를 중단시키지 않습니다.
    pub async fn run(&self, symbols: Option<&[String]>) -> Result<MarketUpdateStats> {
        let today = time::today(self.config.timezone);
        self.run_until(symbols, today).await
    }

    pub async fn run_until(
        &self,
        symbols: Option<&[String]>,
        today: NaiveDate,
    ) -> Result<MarketUpdateStats> {
        let known = self.store.list_instruments().await?;
        let instruments: Vec<Instrument> = match symbols {
            Some(wanted) => wanted
                .iter()
                .map(|symbol| {
                    known
                        .iter()
                        .find(|i| &i.symbol == symbol)
                        .cloned()
                        .unwrap_or_else(|| Instrument::new(symbol.clone(), symbol.clone()))
                })
                .collect(),
            None => known,
        };

        let mut stats = MarketUpdateStats {
            instruments: instruments.len(),
            ..Default::default()
        };
        info!(count = instruments.len(), "시세 갱신 시작");

        let mut tracker = ProgressTracker::new(instruments.len());
        for (index, instrument) in instruments.iter().enumerate() {
            self.update_instrument(instrument, today, &mut stats).await;
            if let Some(progress) = tracker.advance() {
                info!(progress, done = index + 1, total = instruments.len(), "시세 갱신 진행");
            }
        }

        info!(
            updated = stats.updated,
            up_to_date = stats.up_to_date,
            failed = stats.failed,
            rows = stats.rows,
            "시세 갱신 완료"
        );
        Ok(stats)
    }

    async fn update_instrument(
        &self,
        instrument: &Instrument,
        today: NaiveDate,
        stats: &mut MarketUpdateStats,
    ) {
        let start = match self.start_date_for(&instrument.symbol, today).await {
            Ok(start) => start,
            Err(e) => {
                warn!(symbol = %instrument.symbol, error = %e, "Failed to read watermark");
                stats.failed += 1;
                stats.failed_symbols.push(instrument.symbol.clone());
                return;
            }
        };
        if start > today {
            debug!(symbol = %instrument.symbol, "Already up to date");
            stats.up_to_date += 1;
            return;
        }

        let quotes = match self.fetch_with_fallback(instrument, start, today).await {
            Some(FetchOutcome::Primary(quotes)) => quotes,
            Some(FetchOutcome::Secondary(quotes)) => {
                stats.fallback_used += 1;
                quotes
            }
            None => {
                stats.failed += 1;
                stats.failed_symbols.push(instrument.symbol.clone());
                return;
            }
        };

        let fresh: Vec<DailyQuote> = quotes
            .into_iter()
            .filter(|q| q.date >= start && q.date <= today)
            .collect();
        if fresh.is_empty() {
            stats.up_to_date += 1;
            return;
        }

        match self.store.upsert_quotes(&fresh).await {
            Ok(rows) => {
                stats.updated += 1;
                stats.rows += rows;
            }
            Err(e) => {
                warn!(symbol = %instrument.symbol, error = %e, "Failed to store quotes");
                stats.failed += 1;
                stats.failed_symbols.push(instrument.symbol.clone());
            }
        }
    }

    async fn fetch_with_fallback(
        &self,
        instrument: &Instrument,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<FetchOutcome> {
        let label = format!("{}:{}", self.primary.name(), instrument.symbol);
        let primary = with_retry(&self.config.retry, &label, || {
            self.primary.fetch_daily(instrument, start, end)
        })
        .await;

        let primary_error = match primary {
            Ok(quotes) => return Some(FetchOutcome::Primary(quotes)),
            Err(e) => e,
        };

        let Some(secondary) = &self.secondary else {
            warn!(symbol = %instrument.symbol, error = %primary_error, "Primary source exhausted, skipping");
            return None;
        };

        warn!(
            symbol = %instrument.symbol,
            error = %primary_error,
            fallback = secondary.name(),
            "1차 소스 실패, 2차 소스로 Fallback"
        );
        match secondary.fetch_daily(instrument, start, end).await {
            Ok(quotes) => Some(FetchOutcome::Secondary(quotes)),
            Err(e) => {
                warn!(symbol = %instrument.symbol, error = %e, "All sources failed, skipping");
                None
            }
        }
    }
}
