//! Zhihu API 클라이언트.

use std::sync::Arc;
use std::time::Duration;

use alphanote_core::{Content, ContentKind, Creator};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, USER_AGENT,
};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::governor::{GovernorConfig, RequestGovernor};
use crate::html::initial_user_entity;
use crate::signer::{NoopSigner, Signer};
use crate::types::{extract_content, ApiMember, ListResponse};
use crate::{Result, ZhihuError};

const DEFAULT_BASE_URL: &str = "https://www.zhihu.com";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36";
const API_VERSION: &str = "3.0.91";

const MEMBER_INCLUDE: &str = "follower_count,following_count,answer_count,articles_count,voteup_count";
const ANSWER_INCLUDE: &str = "data[*].is_normal,comment_count,content,voteup_count,created_time,updated_time;data[*].question.title;data[*].author.name,avatar_url";
const ARTICLE_INCLUDE: &str = "data[*].comment_count,content,voteup_count,created,updated;data[*].author.name,avatar_url";
const VIDEO_INCLUDE: &str = "data[*].comment_count,voteup_count,published_at,description;data[*].author.name,avatar_url";

/// 클라이언트 설정.
#[derive(Debug, Clone)]
pub struct ZhihuConfig {
    /// API/웹 기본 주소 (테스트에서 목 서버로 교체)
    pub base_url: String,
    /// 페이지 크기
    pub page_size: u32,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    pub user_agent: String,
    pub governor: GovernorConfig,
}

impl Default for ZhihuConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: 20,
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            governor: GovernorConfig::default(),
        }
    }
}

/// 목록 한 페이지.
#[derive(Debug, Clone, Default)]
pub struct ContentPage {
    /// 정규화에 성공한 항목 (최신순)
    pub items: Vec<Content>,
    /// 응답에 포함된 원본 항목 수
    pub raw_count: usize,
    /// 마지막 페이지 여부
    pub is_end: bool,
}

/// 서명 + 요청 관리가 적용된 Zhihu 클라이언트.
pub struct ZhihuClient {
    http: reqwest::Client,
    config: ZhihuConfig,
    cookies: Option<SecretString>,
    signer: Arc<dyn Signer>,
    governor: Arc<RequestGovernor>,
}

impl ZhihuClient {
    pub fn new(
        config: ZhihuConfig,
        cookies: Option<SecretString>,
        signer: Arc<dyn Signer>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ZhihuError::Config(e.to_string()))?;
        let governor = Arc::new(RequestGovernor::new(config.governor.clone()));
        let cookies = cookies.filter(|c| !c.expose_secret().trim().is_empty());

        Ok(Self {
            http,
            config,
            cookies,
            signer,
            governor,
        })
    }

    /// 쿠키와 서명 없이 생성합니다.
    pub fn anonymous(config: ZhihuConfig) -> Result<Self> {
        Self::new(config, None, Arc::new(NoopSigner))
    }

    pub fn has_cookies(&self) -> bool {
        self.cookies.is_some()
    }

    pub fn governor(&self) -> &RequestGovernor {
        &self.governor
    }

    pub fn page_size(&self) -> u32 {
        self.config.page_size
    }

    /// 크리에이터 프로필을 조회합니다.
    ///
    /// API가 실패하면 프로필 페이지의 초기 데이터로 대체합니다. 차단기
    /// 에러는 대체 없이 그대로 반환합니다.
    pub async fn get_creator(&self, url_token: &str) -> Result<Option<Creator>> {
        match self.fetch_member(url_token).await {
            Ok(Some(creator)) => return Ok(Some(creator)),
            Ok(None) => debug!(url_token, "Member API returned no id, trying profile page"),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!(url_token, error = %e, "Member API failed, trying profile page"),
        }

        match self.fetch_member_from_profile(url_token).await {
            Ok(creator) => Ok(creator),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(url_token, error = %e, "Profile page fallback failed");
                Ok(None)
            }
        }
    }

    async fn fetch_member(&self, url_token: &str) -> Result<Option<Creator>> {
        let url = self.build_url(
            &format!("/api/v4/members/{}", url_token),
            &[("include", MEMBER_INCLUDE.to_string())],
        )?;
        let member: ApiMember = self.send(url).await?.json().await?;
        Ok(member.into_creator(url_token))
    }

    async fn fetch_member_from_profile(&self, url_token: &str) -> Result<Option<Creator>> {
        let url = self.build_url(&format!("/people/{}", url_token), &[])?;
        let html = self.send(url).await?.text().await?;

        let Some(entity) = initial_user_entity(&html, url_token)? else {
            return Ok(None);
        };
        let member: ApiMember = serde_json::from_value(entity)?;
        Ok(member.into_creator(url_token))
    }

    /// 유형별 목록 한 페이지를 조회합니다 (최신순).
    ///
    /// 정규화에 실패한 항목은 경고 후 건너뜁니다.
    pub async fn list_page(
        &self,
        kind: ContentKind,
        url_token: &str,
        offset: u32,
    ) -> Result<ContentPage> {
        let (endpoint, include) = match kind {
            ContentKind::Answer => ("answers", ANSWER_INCLUDE),
            ContentKind::Article => ("articles", ARTICLE_INCLUDE),
            ContentKind::Video => ("zvideos", VIDEO_INCLUDE),
        };
        let url = self.build_url(
            &format!("/api/v4/members/{}/{}", url_token, endpoint),
            &[
                ("include", include.to_string()),
                ("offset", offset.to_string()),
                ("limit", self.config.page_size.to_string()),
                ("sort_by", "created".to_string()),
            ],
        )?;

        let response: ListResponse = self.send(url).await?.json().await?;
        let is_end = response.is_end();
        let raw_count = response.data.len();

        let mut items = Vec::with_capacity(raw_count);
        for item in response.data {
            match extract_content(kind, item) {
                Ok(content) => items.push(content),
                Err(e) => warn!(url_token, kind = %kind, offset, error = %e, "Skipping malformed item"),
            }
        }

        debug!(url_token, kind = %kind, offset, items = items.len(), is_end, "Page fetched");
        Ok(ContentPage {
            items,
            raw_count,
            is_end,
        })
    }

    fn build_url(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let base = self.config.base_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{}{}", base, path))
            .map_err(|e| ZhihuError::Config(format!("invalid url {}{}: {}", base, path, e)))?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    async fn headers_for(&self, url: &Url) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.9"));
        headers.insert("x-api-version", HeaderValue::from_static(API_VERSION));
        headers.insert("x-app-za", HeaderValue::from_static("OS=Web"));
        headers.insert("x-requested-with", HeaderValue::from_static("fetch"));
        if let Ok(agent) = HeaderValue::from_str(&self.config.user_agent) {
            headers.insert(USER_AGENT, agent);
        }

        let Some(cookies) = &self.cookies else {
            return headers;
        };
        let cookies = cookies.expose_secret();
        match HeaderValue::from_str(cookies) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(_) => warn!("Cookie contains invalid header characters, omitting"),
        }

        let signed = self.signer.sign(&path_with_query(url), cookies).await;
        for (name, value) in signed {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(header = %name, "Signer produced an invalid header, skipping"),
            }
        }
        headers
    }

    /// 차단기 확인 → 간격 대기 → 서명 → 요청 → 상태 기록.
    async fn send(&self, url: Url) -> Result<reqwest::Response> {
        self.governor.acquire().await?;

        let headers = self.headers_for(&url).await;
        let response = self.http.get(url.clone()).headers(headers).send().await?;
        let status = response.status();
        self.governor.record_status(status.as_u16())?;

        if !status.is_success() {
            return Err(ZhihuError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

/// 서명 대상: 도메인을 뺀 경로 + 쿼리.
fn path_with_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_with_query_strips_domain() {
        let url = Url::parse("https://www.zhihu.com/api/v4/members/foo/answers?offset=20&limit=20")
            .unwrap();
        assert_eq!(
            path_with_query(&url),
            "/api/v4/members/foo/answers?offset=20&limit=20"
        );

        let url = Url::parse("https://www.zhihu.com/people/foo").unwrap();
        assert_eq!(path_with_query(&url), "/people/foo");
    }

    #[test]
    fn test_blank_cookie_is_treated_as_absent() {
        let client = ZhihuClient::new(
            ZhihuConfig::default(),
            Some(SecretString::from("   ".to_string())),
            Arc::new(NoopSigner),
        )
        .unwrap();
        assert!(!client.has_cookies());
    }
}
