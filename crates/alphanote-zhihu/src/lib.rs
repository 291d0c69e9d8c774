//! Zhihu 콘텐츠 API 클라이언트.
//!
//! - `Signer`: 요청 경로 + 세션 쿠키로 인증 헤더를 계산하는 교체 가능한 기능
//! - `RequestGovernor`: 요청 간격 유지 및 연속 403 시 차단(trip)
//! - `ZhihuClient`: 크리에이터 프로필 조회, 유형별 목록 페이지 조회

pub mod client;
pub mod error;
pub mod governor;
pub mod html;
pub mod signer;
pub mod types;

pub use client::{ContentPage, ZhihuClient, ZhihuConfig};
pub use error::{Result, ZhihuError};
pub use governor::{GovernorConfig, GovernorMetrics, GovernorState, RequestGovernor};
pub use signer::{CommandSigner, HeaderSet, NoopSigner, Signer};
