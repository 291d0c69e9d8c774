//! # AlphaNote Collector
//!
//! Zhihu 콘텐츠 수집, 종목 태깅, 시세 갱신 작업과
//! 이들을 한 번에 하나씩 실행하는 작업 오케스트레이터를 제공합니다.
//!
//! - `modules`: 각 작업의 실제 워크플로우
//! - `orchestrator`: 공유 작업 상태 기반 단일 실행 보장
//! - `api`: 작업 제어 HTTP 엔드포인트

pub mod api;
pub mod config;
pub mod error;
pub mod modules;
pub mod orchestrator;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use stats::{RunSummary, SummaryUnit};
