//! 메모리 저장소 (테스트 및 단독 실행용).

use std::collections::{BTreeMap, BTreeSet, HashSet};

use alphanote_core::{
    Association, Content, ContentTimeRange, Creator, DailyQuote, Instrument, InstrumentAlias,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use super::{
    AssociationStore, ContentStore, CreatorStore, MarketStore, SettingsStore, UpsertOutcome,
};
use crate::{DataError, Result};

#[derive(Default)]
struct Inner {
    /// url_token → 크리에이터 (등록 순서 보존용 seq 포함)
    creators: BTreeMap<String, (u64, Creator)>,
    next_seq: u64,
    contents: BTreeMap<String, Content>,
    associations: BTreeMap<(String, String), Association>,
    instruments: BTreeMap<String, Instrument>,
    aliases: BTreeSet<(String, String)>,
    quotes: BTreeMap<(String, NaiveDate), DailyQuote>,
    settings: BTreeMap<String, String>,
    /// 쓰기 실패를 흉내 낼 content_id
    failing_content_ids: HashSet<String>,
}

/// `PgStore`와 같은 의미를 갖는 메모리 저장소.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_instrument(&self, instrument: Instrument) {
        let mut inner = self.inner.write().await;
        inner
            .instruments
            .insert(instrument.symbol.clone(), instrument);
    }

    pub async fn add_alias(&self, symbol: &str, alias: &str) {
        let mut inner = self.inner.write().await;
        inner
            .aliases
            .insert((symbol.to_string(), alias.to_string()));
    }

    /// 연관 행을 그대로 넣습니다. 태깅 여부는 건드리지 않습니다.
    pub async fn seed_association(&self, association: Association) {
        let mut inner = self.inner.write().await;
        inner.associations.insert(
            (association.content_id.clone(), association.symbol.clone()),
            association,
        );
    }

    /// 해당 콘텐츠의 콘텐츠 upsert와 연관 교체가 실패하도록 설정합니다.
    pub async fn fail_writes_for(&self, content_id: &str) {
        let mut inner = self.inner.write().await;
        inner.failing_content_ids.insert(content_id.to_string());
    }

    pub async fn all_contents(&self) -> Vec<Content> {
        self.inner.read().await.contents.values().cloned().collect()
    }

    pub async fn all_associations(&self) -> Vec<Association> {
        self.inner
            .read()
            .await
            .associations
            .values()
            .cloned()
            .collect()
    }

    pub async fn quotes_for(&self, symbol: &str) -> Vec<DailyQuote> {
        self.inner
            .read()
            .await
            .quotes
            .values()
            .filter(|q| q.symbol == symbol)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CreatorStore for MemoryStore {
    async fn upsert_creator(&self, creator: &Creator) -> Result<Creator> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let merged = match inner.creators.get(&creator.url_token) {
            Some((seq, existing)) => (*seq, existing.merged_with(creator)),
            None => {
                inner.next_seq += 1;
                (inner.next_seq, creator.clone())
            }
        };
        let result = merged.1.clone();
        inner.creators.insert(creator.url_token.clone(), merged);
        Ok(result)
    }

    async fn register_creator(&self, creator: &Creator) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.creators.contains_key(&creator.url_token) {
            return Err(DataError::AlreadyExists(format!(
                "creator {} already exists",
                creator.url_token
            )));
        }
        inner.next_seq += 1;
        let seq = inner.next_seq;
        inner
            .creators
            .insert(creator.url_token.clone(), (seq, creator.clone()));
        Ok(())
    }

    async fn get_creator(&self, url_token: &str) -> Result<Option<Creator>> {
        let inner = self.inner.read().await;
        Ok(inner.creators.get(url_token).map(|(_, c)| c.clone()))
    }

    async fn get_creator_by_user_id(&self, user_id: &str) -> Result<Option<Creator>> {
        let inner = self.inner.read().await;
        Ok(inner
            .creators
            .values()
            .filter(|(_, c)| c.user_id == user_id)
            .min_by_key(|(seq, _)| *seq)
            .map(|(_, c)| c.clone()))
    }

    async fn list_creators(&self, active_only: bool) -> Result<Vec<Creator>> {
        let inner = self.inner.read().await;
        let mut creators: Vec<&(u64, Creator)> = inner
            .creators
            .values()
            .filter(|(_, c)| !active_only || c.is_active)
            .collect();
        creators.sort_by_key(|(seq, _)| *seq);
        Ok(creators.into_iter().map(|(_, c)| c.clone()).collect())
    }

    async fn set_creator_active(&self, url_token: &str, active: bool) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.creators.get_mut(url_token) {
            Some((_, creator)) => {
                creator.is_active = active;
                Ok(())
            }
            None => Err(DataError::NotFound(format!("creator {}", url_token))),
        }
    }

    async fn touch_creator_crawled(&self, url_token: &str, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some((_, creator)) = inner.creators.get_mut(url_token) {
            creator.last_crawled_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn upsert_content(&self, content: &Content) -> Result<UpsertOutcome> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if inner.failing_content_ids.contains(&content.content_id) {
            return Err(DataError::Query(format!(
                "simulated write failure for {}",
                content.content_id
            )));
        }

        match inner.contents.get(&content.content_id) {
            Some(existing) => {
                let merged = existing.merged_with(content);
                inner.contents.insert(content.content_id.clone(), merged);
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let mut fresh = content.clone();
                fresh.is_tagged = false;
                inner.contents.insert(content.content_id.clone(), fresh);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn get_content(&self, content_id: &str) -> Result<Option<Content>> {
        Ok(self.inner.read().await.contents.get(content_id).cloned())
    }

    async fn latest_created_time(&self, author_id: &str) -> Result<Option<i64>> {
        let inner = self.inner.read().await;
        Ok(inner
            .contents
            .values()
            .filter(|c| c.author_id == author_id && c.created_time > 0)
            .map(|c| c.created_time)
            .max())
    }

    async fn count_by_author(&self, author_id: &str) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .contents
            .values()
            .filter(|c| c.author_id == author_id)
            .count() as i64)
    }

    async fn content_time_range(&self) -> Result<ContentTimeRange> {
        let inner = self.inner.read().await;
        let times = || {
            inner
                .contents
                .values()
                .map(|c| c.created_time)
                .filter(|t| *t > 0)
        };
        Ok(ContentTimeRange {
            oldest_time: times().min(),
            newest_time: times().max(),
            total_count: inner.contents.len() as i64,
        })
    }

    async fn contents_for_tagging(&self, include_tagged: bool) -> Result<Vec<Content>> {
        let inner = self.inner.read().await;
        let mut contents: Vec<Content> = inner
            .contents
            .values()
            .filter(|c| include_tagged || !c.is_tagged)
            .cloned()
            .collect();
        contents.sort_by(|a, b| b.created_time.cmp(&a.created_time));
        Ok(contents)
    }

    async fn reset_tagging(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.associations.clear();
        for content in inner.contents.values_mut() {
            content.is_tagged = false;
        }
        Ok(())
    }
}

#[async_trait]
impl AssociationStore for MemoryStore {
    async fn replace_associations(
        &self,
        content_id: &str,
        associations: &[Association],
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.contents.contains_key(content_id) {
            return Err(DataError::InvalidData(format!(
                "content {} does not exist",
                content_id
            )));
        }
        if inner.failing_content_ids.contains(content_id) {
            return Err(DataError::Query(format!(
                "simulated write failure for {}",
                content_id
            )));
        }
        inner.associations.retain(|(id, _), _| id != content_id);
        for a in associations {
            inner
                .associations
                .insert((a.content_id.clone(), a.symbol.clone()), a.clone());
        }
        if let Some(content) = inner.contents.get_mut(content_id) {
            content.is_tagged = true;
        }
        Ok(())
    }

    async fn associations_for(&self, content_id: &str) -> Result<Vec<Association>> {
        let inner = self.inner.read().await;
        let mut result: Vec<Association> = inner
            .associations
            .values()
            .filter(|a| a.content_id == content_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| {
            b.match_score
                .cmp(&a.match_score)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        Ok(result)
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn list_instruments(&self) -> Result<Vec<Instrument>> {
        Ok(self.inner.read().await.instruments.values().cloned().collect())
    }

    async fn list_aliases(&self) -> Result<Vec<InstrumentAlias>> {
        Ok(self
            .inner
            .read()
            .await
            .aliases
            .iter()
            .map(|(symbol, alias)| InstrumentAlias {
                symbol: symbol.clone(),
                alias: alias.clone(),
            })
            .collect())
    }

    async fn trading_days(&self) -> Result<BTreeSet<NaiveDate>> {
        Ok(self
            .inner
            .read()
            .await
            .quotes
            .keys()
            .map(|(_, date)| *date)
            .collect())
    }

    async fn latest_quote_date(&self, symbol: &str) -> Result<Option<NaiveDate>> {
        Ok(self
            .inner
            .read()
            .await
            .quotes
            .keys()
            .filter(|(s, _)| s == symbol)
            .map(|(_, date)| *date)
            .max())
    }

    async fn upsert_quotes(&self, quotes: &[DailyQuote]) -> Result<usize> {
        let mut inner = self.inner.write().await;
        for quote in quotes {
            inner
                .quotes
                .insert((quote.symbol.clone(), quote.date), quote.clone());
        }
        Ok(quotes.len())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.read().await.settings.get(key).cloned())
    }

    async fn list_settings(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .inner
            .read()
            .await
            .settings
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.settings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete_setting(&self, key: &str) -> Result<()> {
        self.inner.write().await.settings.remove(key);
        Ok(())
    }
}
