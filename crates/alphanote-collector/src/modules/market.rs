//! 일봉 시세 증분 갱신 작업.

use std::sync::Arc;
use std::time::Instant;

use alphanote_data::{
    EastmoneySource, MarketUpdateConfig, MarketUpdater, QuoteSource, Store, YahooChartSource,
};

use crate::stats::RunSummary;
use crate::Result;

/// Eastmoney(1차) → Yahoo(2차) 순서로 시세를 갱신합니다.
///
/// `symbols`가 없으면 등록된 종목 전체가 대상입니다.
pub async fn update_market(
    store: Arc<dyn Store>,
    config: MarketUpdateConfig,
    symbols: Option<Vec<String>>,
) -> Result<RunSummary> {
    let primary: Arc<dyn QuoteSource> = Arc::new(EastmoneySource::new()?);
    let secondary: Arc<dyn QuoteSource> = Arc::new(YahooChartSource::new()?.with_timezone(config.timezone));
    update_market_with(store, primary, Some(secondary), config, symbols).await
}

pub async fn update_market_with(
    store: Arc<dyn Store>,
    primary: Arc<dyn QuoteSource>,
    secondary: Option<Arc<dyn QuoteSource>>,
    config: MarketUpdateConfig,
    symbols: Option<Vec<String>>,
) -> Result<RunSummary> {
    let started = Instant::now();
    let updater = MarketUpdater::new(store, primary, secondary, config);
    let result = updater.run(symbols.as_deref()).await?;

    if !result.failed_symbols.is_empty() {
        tracing::warn!(symbols = ?result.failed_symbols, "시세 갱신 실패 종목");
    }

    let mut summary = RunSummary::from(&result);
    summary.elapsed = started.elapsed();
    Ok(summary)
}
