//! Zhihu API 응답 타입과 도메인 변환.
//!
//! 콘텐츠 유형별 추출은 `extract_content` 한 곳에서 분기합니다.

use alphanote_core::{Content, ContentKind, Creator, Gender};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::html::html_to_text;

/// 공개 웹 주소 (링크 생성용).
pub const ZHIHU_WEB_URL: &str = "https://www.zhihu.com";
/// 칼럼 주소.
pub const ZHUANLAN_WEB_URL: &str = "https://zhuanlan.zhihu.com";

/// 크리에이터 프로필 링크.
pub fn profile_url(url_token: &str) -> String {
    format!("{}/people/{}", ZHIHU_WEB_URL, url_token)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

/// 숫자/문자열 어느 쪽이든 문자열 id로 받습니다.
fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RawId::deserialize(deserializer).map(String::from)
}

fn de_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Option::<RawId>::deserialize(deserializer).map(|raw| raw.map(String::from))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// 목록 응답.
#[derive(Debug, Default, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

impl ListResponse {
    /// 마지막 페이지 여부. 페이징 정보가 없으면 끝으로 간주합니다.
    pub fn is_end(&self) -> bool {
        self.paging
            .as_ref()
            .and_then(|p| p.is_end)
            .unwrap_or(true)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub is_end: Option<bool>,
    #[serde(default)]
    pub totals: Option<i64>,
}

/// 작성자 참조.
#[derive(Debug, Default, Deserialize)]
pub struct ApiAuthor {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiQuestion {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// 답변 항목.
#[derive(Debug, Deserialize)]
pub struct ApiAnswer {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub question: Option<ApiQuestion>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub created_time: Option<i64>,
    #[serde(default)]
    pub updated_time: Option<i64>,
    #[serde(default)]
    pub voteup_count: Option<i64>,
    #[serde(default)]
    pub comment_count: Option<i64>,
    #[serde(default)]
    pub author: Option<ApiAuthor>,
}

/// 칼럼 글 항목. 시각 필드는 `created_time` 또는 `created`로 옵니다.
#[derive(Debug, Deserialize)]
pub struct ApiArticle {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub created_time: Option<i64>,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub updated_time: Option<i64>,
    #[serde(default)]
    pub updated: Option<i64>,
    #[serde(default)]
    pub voteup_count: Option<i64>,
    #[serde(default)]
    pub comment_count: Option<i64>,
    #[serde(default)]
    pub author: Option<ApiAuthor>,
}

/// 동영상 항목.
#[derive(Debug, Deserialize)]
pub struct ApiVideo {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub published_at: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub voteup_count: Option<i64>,
    #[serde(default)]
    pub comment_count: Option<i64>,
    #[serde(default)]
    pub author: Option<ApiAuthor>,
}

struct AuthorFields {
    id: String,
    name: String,
    avatar: Option<String>,
}

fn author_fields(author: Option<ApiAuthor>) -> AuthorFields {
    let author = author.unwrap_or_default();
    AuthorFields {
        id: author.id.unwrap_or_default(),
        name: author.name.unwrap_or_default(),
        avatar: non_empty(author.avatar_url),
    }
}

impl ApiAnswer {
    pub fn into_content(self) -> Content {
        let question = self.question.unwrap_or_default();
        let question_id = question.id.unwrap_or_default();
        let title = non_empty(question.title).or(self.title).unwrap_or_default();
        let body = non_empty(self.content).or(self.excerpt).unwrap_or_default();
        let author = author_fields(self.author);

        Content {
            url: format!("{}/question/{}/answer/{}", ZHIHU_WEB_URL, question_id, self.id),
            content_id: self.id,
            kind: ContentKind::Answer,
            title: html_to_text(&title),
            body: html_to_text(&body),
            created_time: self.created_time.unwrap_or(0),
            updated_time: self.updated_time.unwrap_or(0),
            voteup_count: self.voteup_count.unwrap_or(0),
            comment_count: self.comment_count.unwrap_or(0),
            author_id: author.id,
            author_name: author.name,
            author_avatar: author.avatar,
            is_tagged: false,
        }
    }
}

impl ApiArticle {
    pub fn into_content(self) -> Content {
        let body = non_empty(self.content).or(self.excerpt).unwrap_or_default();
        let author = author_fields(self.author);
        let created = self.created_time.filter(|t| *t > 0).or(self.created);
        let updated = self.updated_time.filter(|t| *t > 0).or(self.updated);

        Content {
            url: format!("{}/p/{}", ZHUANLAN_WEB_URL, self.id),
            content_id: self.id,
            kind: ContentKind::Article,
            title: html_to_text(self.title.as_deref().unwrap_or_default()),
            body: html_to_text(&body),
            created_time: created.unwrap_or(0),
            updated_time: updated.unwrap_or(0),
            voteup_count: self.voteup_count.unwrap_or(0),
            comment_count: self.comment_count.unwrap_or(0),
            author_id: author.id,
            author_name: author.name,
            author_avatar: author.avatar,
            is_tagged: false,
        }
    }
}

impl ApiVideo {
    pub fn into_content(self) -> Content {
        let author = author_fields(self.author);
        let created = self.published_at.filter(|t| *t > 0).or(self.created_at);

        Content {
            url: format!("{}/zvideo/{}", ZHIHU_WEB_URL, self.id),
            content_id: self.id,
            kind: ContentKind::Video,
            title: html_to_text(self.title.as_deref().unwrap_or_default()),
            body: html_to_text(self.description.as_deref().unwrap_or_default()),
            created_time: created.unwrap_or(0),
            updated_time: self.updated_at.unwrap_or(0),
            voteup_count: self.voteup_count.unwrap_or(0),
            comment_count: self.comment_count.unwrap_or(0),
            author_id: author.id,
            author_name: author.name,
            author_avatar: author.avatar,
            is_tagged: false,
        }
    }
}

/// 목록 항목 하나를 유형에 맞게 `Content`로 변환합니다.
pub fn extract_content(kind: ContentKind, item: Value) -> serde_json::Result<Content> {
    match kind {
        ContentKind::Answer => serde_json::from_value::<ApiAnswer>(item).map(ApiAnswer::into_content),
        ContentKind::Article => {
            serde_json::from_value::<ApiArticle>(item).map(ApiArticle::into_content)
        }
        ContentKind::Video => serde_json::from_value::<ApiVideo>(item).map(ApiVideo::into_content),
    }
}

/// 크리에이터 프로필.
///
/// API는 snake_case, 프로필 페이지 초기 데이터는 camelCase로 같은 필드를 줍니다.
#[derive(Debug, Deserialize)]
pub struct ApiMember {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<String>,
    #[serde(default, alias = "urlToken")]
    pub url_token: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "avatarUrl")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub gender: Option<i64>,
    #[serde(default, alias = "followerCount")]
    pub follower_count: Option<i64>,
    #[serde(default, alias = "followingCount")]
    pub following_count: Option<i64>,
    #[serde(default, alias = "answerCount")]
    pub answer_count: Option<i64>,
    #[serde(default, alias = "articlesCount")]
    pub articles_count: Option<i64>,
    #[serde(default, alias = "voteupCount")]
    pub voteup_count: Option<i64>,
}

impl ApiMember {
    /// 요청한 `url_token` 기준으로 `Creator`를 만듭니다. id가 없으면 `None`.
    pub fn into_creator(self, requested_token: &str) -> Option<Creator> {
        let user_id = non_empty(self.id)?;
        let url_token = non_empty(self.url_token).unwrap_or_else(|| requested_token.to_string());

        Some(Creator {
            user_id,
            nickname: self.name.unwrap_or_default(),
            avatar_url: non_empty(self.avatar_url),
            profile_url: profile_url(requested_token),
            gender: Gender::from_code(self.gender),
            follower_count: self.follower_count.unwrap_or(0),
            following_count: self.following_count.unwrap_or(0),
            answer_count: self.answer_count.unwrap_or(0),
            article_count: self.articles_count.unwrap_or(0),
            voteup_count: self.voteup_count.unwrap_or(0),
            is_active: true,
            last_crawled_at: None,
            url_token,
        })
    }
}
