//! 태깅 실행과 수동 지정.
//!
//! # 동작 흐름
//!
//! ```text
//! 키워드 사전 + 거래일 로드
//!   ├─ (전체 재태깅) 연관/태깅 여부 초기화 ── 완료 후에만 쓰기 시작
//!   └─ 콘텐츠별
//!        ├─ 점수 계산 → 임계값 이상 종목
//!        ├─ 원래 날짜 → 거래일 정렬
//!        └─ 연관 교체 + 태깅 완료 표시 (한 트랜잭션, 매칭이 없어도)
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use alphanote_core::{time, Association, Content, ProgressTracker, MANUAL_KEYWORD, MANUAL_SCORE};
use alphanote_data::Store;
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::calendar::TradingCalendar;
use crate::dictionary::KeywordDictionary;
use crate::scoring::{score_content, ScoringConfig};
use crate::{Result, TaggerError};

/// 태깅 실행 통계.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaggingStats {
    /// 대상 콘텐츠 수
    pub scanned: usize,
    /// 태깅 완료 표시된 콘텐츠 수
    pub tagged: usize,
    /// 연관이 하나 이상 생긴 콘텐츠 수
    pub matched: usize,
    /// 저장된 연관 수
    pub associations: usize,
    /// 저장 실패 콘텐츠 수
    pub failed: usize,
}

pub struct TaggingEngine {
    store: Arc<dyn Store>,
    scoring: ScoringConfig,
    timezone: Tz,
}

impl TaggingEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            scoring: ScoringConfig::default(),
            timezone: time::DEFAULT_TIMEZONE,
        }
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// 콘텐츠 날짜. 생성 시각이 없으면 오늘.
    fn content_date(&self, content: &Content) -> NaiveDate {
        time::timestamp_to_date(content.created_time, self.timezone)
            .unwrap_or_else(|| time::today(self.timezone))
    }

    /// 콘텐츠 하나의 연관을 계산합니다. 저장하지 않습니다.
    pub fn associate(
        &self,
        content: &Content,
        dictionary: &KeywordDictionary,
        calendar: &TradingCalendar,
    ) -> Vec<Association> {
        let original_date = self.content_date(content);
        let display_date = calendar.align(original_date);

        score_content(dictionary, &self.scoring, &content.title, &content.body)
            .into_iter()
            .map(|scored| Association {
                content_id: content.content_id.clone(),
                symbol: scored.symbol,
                display_date,
                original_date,
                match_keyword: scored.keyword,
                match_score: scored.score,
            })
            .collect()
    }

    /// 미태깅 콘텐츠(`retag_all`이면 전체)를 태깅합니다.
    ///
    /// 콘텐츠 하나의 저장 실패는 로그만 남기고 다음으로 넘어갑니다.
    /// 실패한 콘텐츠는 연관도 태깅 완료 표시도 남지 않아 다음 실행에서
    /// 처음부터 다시 처리됩니다.
    pub async fn run(&self, retag_all: bool) -> Result<TaggingStats> {
        let dictionary = KeywordDictionary::load(self.store.as_ref()).await?;
        if dictionary.is_empty() {
            warn!("키워드 사전이 비어 있습니다. 종목 정보를 먼저 등록하세요");
            return Ok(TaggingStats::default());
        }
        let calendar = TradingCalendar::load(self.store.as_ref()).await?;

        if retag_all {
            self.store.reset_tagging().await?;
            info!("기존 연관 초기화 완료");
        }

        let contents = self.store.contents_for_tagging(retag_all).await?;
        info!(count = contents.len(), retag_all = retag_all, "태깅 시작");

        let mut stats = TaggingStats {
            scanned: contents.len(),
            ..Default::default()
        };

        let mut tracker = ProgressTracker::new(contents.len());
        for (index, content) in contents.iter().enumerate() {
            let associations = self.associate(content, &dictionary, &calendar);
            let result = self
                .store
                .replace_associations(&content.content_id, &associations)
                .await;
            if let Some(progress) = tracker.advance() {
                info!(progress, done = index + 1, total = stats.scanned, "태깅 진행");
            }
            match result {
                Ok(()) => {
                    stats.tagged += 1;
                    if !associations.is_empty() {
                        stats.matched += 1;
                        stats.associations += associations.len();
                        debug!(
                            content_id = %content.content_id,
                            symbols = associations.len(),
                            "연관 저장"
                        );
                    }
                }
                Err(e) => {
                    warn!(content_id = %content.content_id, error = %e, "태깅 저장 실패");
                    stats.failed += 1;
                }
            }
        }

        info!(
            scanned = stats.scanned,
            tagged = stats.tagged,
            matched = stats.matched,
            associations = stats.associations,
            failed = stats.failed,
            "태깅 완료"
        );
        Ok(stats)
    }

    /// 콘텐츠의 연관 전체를 지정한 종목들로 교체합니다.
    ///
    /// 심볼은 공백 제거 후 중복/빈 값을 버립니다. 점수는 `MANUAL_SCORE`,
    /// 키워드는 `MANUAL_KEYWORD`로 고정됩니다.
    pub async fn manual_override(
        &self,
        content_id: &str,
        symbols: &[String],
    ) -> Result<Vec<Association>> {
        let content = self
            .store
            .get_content(content_id)
            .await?
            .ok_or_else(|| TaggerError::ContentNotFound(content_id.to_string()))?;

        let calendar = TradingCalendar::load(self.store.as_ref()).await?;
        let original_date = self.content_date(&content);
        let display_date = calendar.align(original_date);

        let mut seen = BTreeSet::new();
        let associations: Vec<Association> = symbols
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty() && seen.insert(s.to_string()))
            .map(|symbol| Association {
                content_id: content.content_id.clone(),
                symbol: symbol.to_string(),
                display_date,
                original_date,
                match_keyword: MANUAL_KEYWORD.to_string(),
                match_score: MANUAL_SCORE,
            })
            .collect();

        self.store
            .replace_associations(&content.content_id, &associations)
            .await?;
        info!(
            content_id = %content.content_id,
            symbols = associations.len(),
            "수동 연관 지정"
        );
        Ok(associations)
    }
}
