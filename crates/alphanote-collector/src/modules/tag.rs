//! 콘텐츠 태깅 작업.

use std::sync::Arc;
use std::time::Instant;

use alphanote_core::Association;
use alphanote_data::Store;
use alphanote_tagger::TaggingEngine;
use chrono_tz::Tz;

use crate::stats::RunSummary;
use crate::Result;

/// 미태깅 콘텐츠(`retag_all`이면 전체)를 태깅합니다.
pub async fn tag_articles(store: Arc<dyn Store>, retag_all: bool, timezone: Tz) -> Result<RunSummary> {
    let started = Instant::now();
    let engine = TaggingEngine::new(store).with_timezone(timezone);
    let tagging = engine.run(retag_all).await?;

    let mut summary = RunSummary::from(&tagging);
    summary.elapsed = started.elapsed();
    Ok(summary)
}

/// 콘텐츠 하나의 연관을 지정한 종목들로 교체합니다.
pub async fn tag_manual(
    store: Arc<dyn Store>,
    content_id: &str,
    symbols: &[String],
    timezone: Tz,
) -> Result<Vec<Association>> {
    let engine = TaggingEngine::new(store).with_timezone(timezone);
    Ok(engine.manual_override(content_id, symbols).await?)
}
