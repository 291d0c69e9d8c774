//! 저장소 인터페이스.
//!
//! 각 쓰기는 행 단위로 독립적이며 저장소의 upsert 원자성에 의존합니다.
//! 운영은 `PgStore`, 테스트는 `MemoryStore`를 사용합니다.

pub mod memory;
pub mod postgres;

use std::collections::BTreeSet;

use alphanote_core::{
    Association, Content, ContentTimeRange, Creator, DailyQuote, Instrument, InstrumentAlias,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::Result;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// 쿠키가 저장되는 설정 키.
pub const ZHIHU_COOKIES_KEY: &str = "zhihu_cookies";

/// upsert 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// 크리에이터 저장소.
#[async_trait]
pub trait CreatorStore: Send + Sync {
    /// `url_token` 기준 upsert. 임시 `user_id`는 실제 id로 교체됩니다.
    async fn upsert_creator(&self, creator: &Creator) -> Result<Creator>;

    /// 별칭으로 등록합니다. 같은 `url_token`이 있으면 `AlreadyExists`.
    async fn register_creator(&self, creator: &Creator) -> Result<()>;

    async fn get_creator(&self, url_token: &str) -> Result<Option<Creator>>;

    async fn get_creator_by_user_id(&self, user_id: &str) -> Result<Option<Creator>>;

    async fn list_creators(&self, active_only: bool) -> Result<Vec<Creator>>;

    /// 활성 여부를 설정합니다. 없으면 `NotFound`.
    async fn set_creator_active(&self, url_token: &str, active: bool) -> Result<()>;

    async fn touch_creator_crawled(&self, url_token: &str, at: DateTime<Utc>) -> Result<()>;
}

/// 콘텐츠 저장소.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// `content_id` 기준 upsert. id, 최초 `created_time`, 태깅 여부는 유지됩니다.
    async fn upsert_content(&self, content: &Content) -> Result<UpsertOutcome>;

    async fn get_content(&self, content_id: &str) -> Result<Option<Content>>;

    /// 작성자의 최대 `created_time` (증분 수집 기준점).
    async fn latest_created_time(&self, author_id: &str) -> Result<Option<i64>>;

    async fn count_by_author(&self, author_id: &str) -> Result<i64>;

    async fn content_time_range(&self) -> Result<ContentTimeRange>;

    /// 태깅 대상. `include_tagged`면 전체.
    async fn contents_for_tagging(&self, include_tagged: bool) -> Result<Vec<Content>>;

    /// 모든 연결을 지우고 태깅 여부를 초기화합니다 (한 트랜잭션).
    async fn reset_tagging(&self) -> Result<()>;
}

/// 콘텐츠-종목 연결 저장소.
#[async_trait]
pub trait AssociationStore: Send + Sync {
    /// 콘텐츠 하나의 연결 전체를 교체하고 태깅 완료로 표시합니다 (한 트랜잭션).
    async fn replace_associations(
        &self,
        content_id: &str,
        associations: &[Association],
    ) -> Result<()>;

    async fn associations_for(&self, content_id: &str) -> Result<Vec<Association>>;
}

/// 종목/시세 저장소.
#[async_trait]
pub trait MarketStore: Send + Sync {
    async fn list_instruments(&self) -> Result<Vec<Instrument>>;

    async fn list_aliases(&self) -> Result<Vec<InstrumentAlias>>;

    /// 시세가 존재하는 날짜 집합 (거래일).
    async fn trading_days(&self) -> Result<BTreeSet<NaiveDate>>;

    /// 종목의 마지막 시세 날짜 (증분 갱신 기준점).
    async fn latest_quote_date(&self, symbol: &str) -> Result<Option<NaiveDate>>;

    async fn upsert_quotes(&self, quotes: &[DailyQuote]) -> Result<usize>;
}

/// 크롤러 설정 저장소.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;

    async fn list_settings(&self) -> Result<Vec<(String, String)>>;

    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    async fn delete_setting(&self, key: &str) -> Result<()>;
}

/// 전체 저장소.
pub trait Store: CreatorStore + ContentStore + AssociationStore + MarketStore + SettingsStore {}

impl<T> Store for T where
    T: CreatorStore + ContentStore + AssociationStore + MarketStore + SettingsStore
{
}
