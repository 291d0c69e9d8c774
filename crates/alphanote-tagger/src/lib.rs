//! 콘텐츠-종목 연관 엔진.
//!
//! 종목 코드/이름/별칭으로 키워드 사전을 만들고, 콘텐츠 제목과 본문의
//! 키워드 출현 횟수에 가중치를 곱해 종목별 점수를 계산합니다.
//! 콘텐츠 날짜는 거래일 달력에 맞춰 정렬됩니다.

pub mod calendar;
pub mod dictionary;
pub mod engine;
pub mod error;
pub mod scoring;

pub use calendar::TradingCalendar;
pub use dictionary::KeywordDictionary;
pub use engine::{TaggingEngine, TaggingStats};
pub use error::{Result, TaggerError};
pub use scoring::{score_content, ScoringConfig, SymbolScore};
