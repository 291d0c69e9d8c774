//! 수집 콘텐츠.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// 콘텐츠 유형.
///
/// 유형별 목록 엔드포인트와 추출 방식은 클라이언트 쪽에서 이 열거형
/// 하나로 분기합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// 질문에 대한 답변
    Answer,
    /// 칼럼 글
    Article,
    /// 동영상
    #[serde(rename = "zvideo")]
    Video,
}

impl ContentKind {
    /// 기본 크롤링 대상 유형.
    pub const CRAWLED: [ContentKind; 2] = [ContentKind::Answer, ContentKind::Article];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Answer => "answer",
            ContentKind::Article => "article",
            ContentKind::Video => "zvideo",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "answer" | "answers" => Ok(ContentKind::Answer),
            "article" | "articles" => Ok(ContentKind::Article),
            "zvideo" | "video" | "videos" => Ok(ContentKind::Video),
            other => Err(CoreError::Parse(format!("알 수 없는 콘텐츠 유형: {}", other))),
        }
    }
}

/// 수집된 콘텐츠 한 건.
///
/// `content_id`와 최초 `created_time`은 한 번 저장되면 바뀌지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub content_id: String,
    pub kind: ContentKind,
    pub title: String,
    pub body: String,
    pub url: String,
    /// 생성 시각 (epoch 초, 0 = 미상)
    pub created_time: i64,
    /// 수정 시각 (epoch 초)
    pub updated_time: i64,
    pub voteup_count: i64,
    pub comment_count: i64,
    pub author_id: String,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub is_tagged: bool,
}

impl Content {
    /// 재수집된 페이로드를 저장된 레코드에 반영합니다.
    ///
    /// 식별자, 최초 생성 시각, 태깅 여부는 저장된 값을 유지합니다.
    /// 저장된 생성 시각이 미상(0)이면 새 값으로 채웁니다.
    pub fn merged_with(&self, incoming: &Content) -> Content {
        let created_time = if self.created_time > 0 {
            self.created_time
        } else {
            incoming.created_time
        };

        Content {
            content_id: self.content_id.clone(),
            created_time,
            is_tagged: self.is_tagged,
            ..incoming.clone()
        }
    }
}

/// 콘텐츠 시간 범위 요약.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTimeRange {
    pub oldest_time: Option<i64>,
    pub newest_time: Option<i64>,
    pub total_count: i64,
}
