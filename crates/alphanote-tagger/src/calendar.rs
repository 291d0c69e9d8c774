//! 거래일 달력.

use std::collections::BTreeSet;

use alphanote_data::MarketStore;
use chrono::{Duration, NaiveDate};
use tracing::info;

use crate::Result;

/// 거래일을 찾아 거슬러 올라가는 최대 일수.
pub const MAX_LOOKBACK_DAYS: i64 = 10;

/// 시세가 존재하는 날짜 집합.
#[derive(Debug, Clone, Default)]
pub struct TradingCalendar {
    days: BTreeSet<NaiveDate>,
}

impl TradingCalendar {
    pub fn new(days: BTreeSet<NaiveDate>) -> Self {
        Self { days }
    }

    pub async fn load<S: MarketStore + ?Sized>(store: &S) -> Result<Self> {
        let days = store.trading_days().await?;
        info!(days = days.len(), "거래일 로드");
        Ok(Self::new(days))
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.days.contains(&date)
    }

    /// 날짜를 가장 가까운 이전 거래일로 맞춥니다.
    ///
    /// 거래일이면 그대로, 아니면 최대 `MAX_LOOKBACK_DAYS`일 전까지 찾습니다.
    /// 찾지 못하거나 달력이 비어 있으면 원래 날짜를 반환합니다.
    pub fn align(&self, date: NaiveDate) -> NaiveDate {
        let floor = date - Duration::days(MAX_LOOKBACK_DAYS);
        self.days
            .range(floor..=date)
            .next_back()
            .copied()
            .unwrap_or(date)
    }
}
