//! 데이터 저장 및 시세 갱신.
//!
//! 이 crate는 다음을 제공합니다:
//! - 크리에이터/콘텐츠/연관/종목/설정 저장소 (PostgreSQL, 인메모리)
//! - 프로세스 간 공유되는 작업 상태 저장소
//! - 지수 백오프 재시도
//! - 일봉 시세 증분 갱신 (Eastmoney, Yahoo)

pub mod error;
pub mod job_state;
pub mod market;
pub mod retry;
pub mod store;

pub use error::{DataError, Result};

pub use job_state::{
    FileJobStateStore, JobMutation, JobStateStore, MemoryJobStateStore, PgJobStateStore,
};
pub use market::{
    EastmoneySource, MarketUpdateConfig, MarketUpdateStats, MarketUpdater, QuoteSource,
    YahooChartSource,
};
pub use retry::{with_retry, RetryConfig};
pub use store::postgres::DatabaseConfig;
pub use store::{
    AssociationStore, ContentStore, CreatorStore, MarketStore, MemoryStore, PgStore,
    SettingsStore, Store, UpsertOutcome, ZHIHU_COOKIES_KEY,
};
