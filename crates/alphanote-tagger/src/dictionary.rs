//! 키워드 → 종목 사전.

use std::collections::BTreeMap;

use alphanote_core::{Instrument, InstrumentAlias};
use alphanote_data::MarketStore;
use tracing::info;

use crate::Result;

/// 매칭에 쓰는 키워드의 최소 글자 수.
pub const MIN_KEYWORD_CHARS: usize = 2;

/// 종목 코드, 이름, 별칭을 종목 심볼로 매핑합니다.
///
/// 키워드 하나가 여러 종목을 가리킬 수 있습니다.
#[derive(Debug, Clone, Default)]
pub struct KeywordDictionary {
    entries: BTreeMap<String, Vec<String>>,
}

impl KeywordDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// 키워드를 추가합니다. 너무 짧은 키워드는 무시하고 `false`를 반환합니다.
    pub fn insert(&mut self, keyword: &str, symbol: &str) -> bool {
        let keyword = keyword.trim();
        if keyword.chars().count() < MIN_KEYWORD_CHARS {
            return false;
        }
        let symbols = self.entries.entry(keyword.to_string()).or_default();
        if !symbols.iter().any(|s| s == symbol) {
            symbols.push(symbol.to_string());
        }
        true
    }

    pub fn build(instruments: &[Instrument], aliases: &[InstrumentAlias]) -> Self {
        let mut dictionary = Self::new();
        for instrument in instruments {
            dictionary.insert(&instrument.symbol, &instrument.symbol);
            dictionary.insert(&instrument.name, &instrument.symbol);
        }
        for alias in aliases {
            dictionary.insert(&alias.alias, &alias.symbol);
        }
        dictionary
    }

    /// 저장소의 종목/별칭 전체로 사전을 만듭니다.
    pub async fn load<S: MarketStore + ?Sized>(store: &S) -> Result<Self> {
        let instruments = store.list_instruments().await?;
        let aliases = store.list_aliases().await?;
        let dictionary = Self::build(&instruments, &aliases);
        info!(
            keywords = dictionary.len(),
            symbols = dictionary.symbol_count(),
            "키워드 사전 로드"
        );
        Ok(dictionary)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 사전이 가리키는 서로 다른 종목 수.
    pub fn symbol_count(&self) -> usize {
        let mut symbols: Vec<&String> = self.entries.values().flatten().collect();
        symbols.sort();
        symbols.dedup();
        symbols.len()
    }

    pub fn symbols_for(&self, keyword: &str) -> &[String] {
        self.entries.get(keyword).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(keyword, symbols)| (keyword.as_str(), symbols.as_slice()))
    }
}
