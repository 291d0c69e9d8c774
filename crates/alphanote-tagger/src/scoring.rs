//! 키워드 출현 기반 종목 점수.
//!
//! 종목 점수 = Σ(키워드별 `제목 출현 × 제목 가중치 + 본문 출현 × 본문 가중치`).
//! 대표 키워드는 기여도가 가장 큰 키워드입니다 (동점이면 긴 키워드, 그다음 사전순).

use std::collections::BTreeMap;

use crate::dictionary::KeywordDictionary;

/// 점수 가중치와 임계값.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringConfig {
    pub title_weight: i32,
    pub body_weight: i32,
    /// 이 점수 미만의 종목은 버립니다
    pub min_score: i32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            title_weight: 10,
            body_weight: 1,
            min_score: 2,
        }
    }
}

/// 종목 하나의 최종 점수.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolScore {
    pub symbol: String,
    pub score: i32,
    pub keyword: String,
}

/// 겹치지 않는 출현 횟수.
pub fn count_occurrences(text: &str, keyword: &str) -> usize {
    if keyword.is_empty() {
        return 0;
    }
    text.matches(keyword).count()
}

fn weighted(count: usize, weight: i32) -> i32 {
    i32::try_from(count)
        .unwrap_or(i32::MAX)
        .saturating_mul(weight)
}

/// `candidate`가 현재 대표 키워드보다 우선하는지.
fn outranks(candidate: (&str, i32), current: (&str, i32)) -> bool {
    let (candidate_keyword, candidate_score) = candidate;
    let (current_keyword, current_score) = current;
    candidate_score
        .cmp(&current_score)
        .then_with(|| {
            candidate_keyword
                .chars()
                .count()
                .cmp(&current_keyword.chars().count())
        })
        .then_with(|| current_keyword.cmp(candidate_keyword))
        .is_gt()
}

struct Accumulator<'a> {
    total: i32,
    keyword: &'a str,
    keyword_score: i32,
}

/// 제목/본문을 점수화해 임계값 이상인 종목을 반환합니다.
///
/// 결과는 점수 내림차순, 같은 점수는 심볼 오름차순입니다.
pub fn score_content(
    dictionary: &KeywordDictionary,
    config: &ScoringConfig,
    title: &str,
    body: &str,
) -> Vec<SymbolScore> {
    let mut by_symbol: BTreeMap<&str, Accumulator<'_>> = BTreeMap::new();

    for (keyword, symbols) in dictionary.iter() {
        let contribution = weighted(count_occurrences(title, keyword), config.title_weight)
            .saturating_add(weighted(count_occurrences(body, keyword), config.body_weight));
        if contribution == 0 {
            continue;
        }

        for symbol in symbols {
            by_symbol
                .entry(symbol.as_str())
                .and_modify(|acc| {
                    acc.total = acc.total.saturating_add(contribution);
                    if outranks((keyword, contribution), (acc.keyword, acc.keyword_score)) {
                        acc.keyword = keyword;
                        acc.keyword_score = contribution;
                    }
                })
                .or_insert(Accumulator {
                    total: contribution,
                    keyword,
                    keyword_score: contribution,
                });
        }
    }

    let mut scores: Vec<SymbolScore> = by_symbol
        .into_iter()
        .filter(|(_, acc)| acc.total >= config.min_score)
        .map(|(symbol, acc)| SymbolScore {
            symbol: symbol.to_string(),
            score: acc.total,
            keyword: acc.keyword.to_string(),
        })
        .collect();
    scores.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.symbol.cmp(&b.symbol)));
    scores
}
