//! 작업 실행 요약.
//!
//! 수집/태깅/시세 작업의 결과를 같은 모양으로 모아 CLI 종료 로그로 남깁니다.
//! 오케스트레이터가 띄운 작업에서는 이 로그가 작업 상태 로그의 마지막 요약이 됩니다.

use std::time::Duration;

use alphanote_data::MarketUpdateStats;
use alphanote_tagger::TaggingStats;
use tracing::{info, warn};

/// 요약이 세는 대상.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryUnit {
    Creators,
    Contents,
    Instruments,
}

impl SummaryUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryUnit::Creators => "creators",
            SummaryUnit::Contents => "contents",
            SummaryUnit::Instruments => "instruments",
        }
    }
}

/// 작업 한 번의 결과 요약.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub unit: SummaryUnit,
    /// 대상 수
    pub total: usize,
    /// 에러 없이 처리된 대상 수 (`unchanged` 포함)
    pub succeeded: usize,
    pub failed: usize,
    /// 처리했지만 새로 쓸 것이 없던 대상 수
    pub unchanged: usize,
    /// 새로 쓴 행 수: 콘텐츠, 연관, 시세 행
    pub written: usize,
    /// 시간 필터나 기준점으로 건너뛴 콘텐츠 수 (수집 작업만)
    pub skipped_items: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn new(unit: SummaryUnit) -> Self {
        Self {
            unit,
            total: 0,
            succeeded: 0,
            failed: 0,
            unchanged: 0,
            written: 0,
            skipped_items: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn log_summary(&self, operation: &str) {
        info!(
            operation,
            unit = self.unit.as_str(),
            total = self.total,
            succeeded = self.succeeded,
            failed = self.failed,
            unchanged = self.unchanged,
            written = self.written,
            skipped_items = self.skipped_items,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "작업 요약"
        );
        if self.failed > 0 {
            warn!(
                operation,
                unit = self.unit.as_str(),
                failed = self.failed,
                "일부 대상을 처리하지 못했습니다"
            );
        }
    }
}

impl From<&TaggingStats> for RunSummary {
    fn from(stats: &TaggingStats) -> Self {
        Self {
            total: stats.scanned,
            succeeded: stats.tagged,
            failed: stats.failed,
            // 매칭 없음도 태깅 완료
            unchanged: stats.tagged.saturating_sub(stats.matched),
            written: stats.associations,
            ..Self::new(SummaryUnit::Contents)
        }
    }
}

impl From<&MarketUpdateStats> for RunSummary {
    fn from(stats: &MarketUpdateStats) -> Self {
        Self {
            total: stats.instruments,
            succeeded: stats.updated + stats.up_to_date,
            failed: stats.failed,
            unchanged: stats.up_to_date,
            written: stats.rows,
            ..Self::new(SummaryUnit::Instruments)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tagging_stats() {
        let summary = RunSummary::from(&TaggingStats {
            scanned: 10,
            tagged: 9,
            matched: 4,
            associations: 6,
            failed: 1,
        });
        assert_eq!(summary.unit, SummaryUnit::Contents);
        assert_eq!(summary.total, 10);
        assert_eq!(summary.succeeded, 9);
        assert_eq!(summary.unchanged, 5);
        assert_eq!(summary.written, 6);
        assert_eq!(summary.skipped_items, 0);
    }

    #[test]
    fn test_from_market_stats() {
        let summary = RunSummary::from(&MarketUpdateStats {
            instruments: 5,
            updated: 2,
            up_to_date: 2,
            failed: 1,
            rows: 40,
            fallback_used: 1,
            failed_symbols: vec!["688981".to_string()],
        });
        assert_eq!(summary.unit, SummaryUnit::Instruments);
        assert_eq!(summary.succeeded, 4);
        assert_eq!(summary.unchanged, 2);
        assert_eq!(summary.written, 40);
        assert_eq!(summary.elapsed, Duration::ZERO);
    }
}
