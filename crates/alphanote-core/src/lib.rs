//! # AlphaNote Core
//!
//! 콘텐츠 수집 및 종목 연관 파이프라인의 핵심 도메인 모델을 제공합니다.
//!
//! - 크리에이터 / 콘텐츠 / 연관(Association) 레코드
//! - 종목 및 별칭, 일봉 시세
//! - 공유 작업 상태 (Job State)
//! - 시간대 기반 날짜 변환
//! - 로깅 인프라

pub mod domain;
pub mod error;
pub mod logging;
pub mod time;

pub use domain::*;
pub use error::*;
pub use logging::*;
