//! 콘텐츠 크리에이터.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 크리에이터 성별 (플랫폼 코드 1/0/기타).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Gender {
    /// 플랫폼 API의 정수 코드에서 변환.
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(1) => Gender::Male,
            Some(0) => Gender::Female,
            _ => Gender::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "male" => Gender::Male,
            "female" => Gender::Female,
            _ => Gender::Unknown,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 모니터링 대상 크리에이터.
///
/// `url_token`이 논리적 식별자입니다. 별칭으로 먼저 등록된 크리에이터는
/// `user_id == url_token`인 임시 레코드이며, 크롤러가 실제 `user_id`를
/// 발견하면 같은 레코드에 반영됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub user_id: String,
    pub url_token: String,
    pub nickname: String,
    pub avatar_url: Option<String>,
    pub profile_url: String,
    pub gender: Gender,
    pub follower_count: i64,
    pub following_count: i64,
    pub answer_count: i64,
    pub article_count: i64,
    pub voteup_count: i64,
    pub is_active: bool,
    pub last_crawled_at: Option<DateTime<Utc>>,
}

impl Creator {
    /// 프로필 링크만으로 임시 레코드를 생성합니다.
    pub fn placeholder(url_token: impl Into<String>, profile_url: impl Into<String>) -> Self {
        let url_token = url_token.into();
        Self {
            user_id: url_token.clone(),
            nickname: url_token.clone(),
            url_token,
            avatar_url: None,
            profile_url: profile_url.into(),
            gender: Gender::Unknown,
            follower_count: 0,
            following_count: 0,
            answer_count: 0,
            article_count: 0,
            voteup_count: 0,
            is_active: true,
            last_crawled_at: None,
        }
    }

    /// 아직 실제 `user_id`가 확인되지 않은 임시 레코드인지.
    pub fn is_placeholder(&self) -> bool {
        self.user_id == self.url_token
    }

    /// 저장된 레코드에 새로 수집한 프로필을 병합합니다.
    ///
    /// 식별자는 `url_token` 기준으로 유지되며, 임시 `user_id`는 실제 id로
    /// 교체됩니다. 활성 여부와 마지막 수집 시각은 저장된 값을 유지합니다.
    pub fn merged_with(&self, incoming: &Creator) -> Creator {
        let user_id = if self.is_placeholder() && !incoming.is_placeholder() {
            incoming.user_id.clone()
        } else {
            self.user_id.clone()
        };

        Creator {
            user_id,
            url_token: self.url_token.clone(),
            is_active: self.is_active,
            last_crawled_at: self.last_crawled_at,
            ..incoming.clone()
        }
    }
}

/// 프로필 링크 또는 토큰에서 `url_token`을 추출합니다.
///
/// `https://www.zhihu.com/people/foo/` → `foo`
pub fn url_token_from_link(link: &str) -> Option<String> {
    let token = link
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()?
        .split(['?', '#'])
        .next()?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
