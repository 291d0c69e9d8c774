//! 콘텐츠-종목 연관.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 수동 지정 연관의 키워드 표시.
pub const MANUAL_KEYWORD: &str = "manual";

/// 수동 지정 연관의 고정 점수.
pub const MANUAL_SCORE: i32 = 100;

/// 콘텐츠 한 건과 종목 하나의 점수화된 연결.
///
/// `(content_id, symbol)` 쌍은 유일합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub content_id: String,
    #[serde(rename = "stock_symbol")]
    pub symbol: String,
    /// 거래일로 정렬된 표시 날짜
    pub display_date: NaiveDate,
    /// 콘텐츠 원래 날짜
    pub original_date: NaiveDate,
    pub match_keyword: String,
    pub match_score: i32,
}

impl Association {
    pub fn is_manual(&self) -> bool {
        self.match_keyword == MANUAL_KEYWORD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let assoc = Association {
            content_id: "123".to_string(),
            symbol: "600519".to_string(),
            display_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            original_date: NaiveDate::from_ymd_opt(2024, 1, 6).unwrap(),
            match_keyword: "贵州茅台".to_string(),
            match_score: 21,
        };

        let json = serde_json::to_value(&assoc).unwrap();
        assert_eq!(json["stock_symbol"], "600519");
        assert_eq!(json["display_date"], "2024-01-05");
        assert_eq!(json["original_date"], "2024-01-06");
        assert_eq!(json["match_score"], 21);
        assert!(!assoc.is_manual());
    }
}
