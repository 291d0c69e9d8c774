//! Zhihu 크리에이터 콘텐츠 수집.
//!
//! # 동작 흐름
//!
//! ```text
//! 크리에이터별 (순차)
//!   ├─ 프로필 조회 (API → 프로필 페이지) → upsert
//!   ├─ 기준점 = 저장된 최대 created_time (증분 모드, 시작일 미지정 시)
//!   ├─ 답변 → 글 순서로 페이지 조회 (최신순)
//!   │    ├─ 일시적 실패(네트워크, 429, 5xx)는 같은 페이지를 한 번 더 요청
//!   │    ├─ 항목마다 즉시 저장
//!   │    └─ 기준점/시작일보다 오래된 항목을 만나면 현재 페이지까지만 처리
//!   └─ 마지막 수집 시각 갱신
//! 연속 403으로 차단되면 실행 전체를 중단
//! ```

use std::sync::Arc;
use std::time::Instant;

use alphanote_core::{time, url_token_from_link, Content, ContentKind, ProgressTracker};
use alphanote_data::{SettingsStore, Store, UpsertOutcome, ZHIHU_COOKIES_KEY};
use alphanote_zhihu::{CommandSigner, ContentPage, NoopSigner, Signer, ZhihuClient};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use secrecy::SecretString;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::CollectorConfig;
use crate::error::CollectorError;
use crate::stats::{RunSummary, SummaryUnit};
use crate::Result;

/// 일시적 에러로 실패한 페이지를 다시 요청하는 횟수.
const PAGE_RETRIES: u32 = 1;

/// 수집 대상 크리에이터 선택.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatorSelection {
    /// 프로필 링크 또는 url_token 목록
    Links(Vec<String>),
    /// 저장된 크리에이터의 user_id 목록
    UserIds(Vec<String>),
    /// 활성 크리에이터 전체
    AllActive,
}

/// 항목 단위 시간 필터. 양 끝은 epoch 초, 끝은 배타적.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<i64>,
    pub end_exclusive: Option<i64>,
}

impl TimeWindow {
    /// 날짜 필터를 만듭니다. 종료일은 그날 전체를 포함합니다.
    pub fn from_dates(start: Option<NaiveDate>, end: Option<NaiveDate>, tz: Tz) -> Self {
        Self {
            start: start.map(|d| time::date_start_timestamp(d, tz)),
            end_exclusive: end.map(|d| time::date_end_exclusive_timestamp(d, tz)),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end_exclusive.is_none()
    }
}

/// 수집 옵션.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub selection: CreatorSelection,
    pub window: TimeWindow,
    /// 기준점을 무시하고 끝까지 수집
    pub full: bool,
    /// 유형별 연속 페이지 실패 허용 횟수
    pub max_page_failures: u32,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            selection: CreatorSelection::AllActive,
            window: TimeWindow::default(),
            full: false,
            max_page_failures: 3,
        }
    }
}

/// 항목 처리 결정.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemDecision {
    /// 저장
    Store,
    /// 건너뛰고 계속
    Skip,
    /// 건너뛰고, 현재 페이지 이후로는 조회하지 않음
    Stop,
}

/// 최신순 목록의 항목 하나를 어떻게 처리할지 결정합니다.
///
/// 시간 필터가 기준점보다 우선합니다. 생성 시각을 모르는 항목은 필터가
/// 없을 때만 저장합니다.
pub fn decide(created_time: i64, watermark: Option<i64>, window: &TimeWindow) -> ItemDecision {
    if created_time <= 0 {
        return if window.is_unbounded() {
            ItemDecision::Store
        } else {
            ItemDecision::Skip
        };
    }
    if window.end_exclusive.is_some_and(|end| created_time >= end) {
        return ItemDecision::Skip;
    }
    if window.start.is_some_and(|start| created_time < start) {
        return ItemDecision::Stop;
    }
    if watermark.is_some_and(|w| created_time <= w) {
        return ItemDecision::Stop;
    }
    ItemDecision::Store
}

/// 크리에이터 한 명의 수집 결과.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreatorReport {
    pub url_token: String,
    pub nickname: String,
    /// 수집 전 저장되어 있던 콘텐츠 수
    pub existing: i64,
    /// 사용한 기준점
    pub watermark: Option<i64>,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub pages: usize,
    pub failed_pages: usize,
    pub write_failures: usize,
}

/// 실행 전체 결과.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub summary: RunSummary,
    pub creators: Vec<CreatorReport>,
}

/// 설정 또는 저장소에서 쿠키를 찾습니다.
pub async fn resolve_cookies<S: SettingsStore + ?Sized>(
    configured: Option<SecretString>,
    store: &S,
) -> Result<Option<SecretString>> {
    if configured.is_some() {
        return Ok(configured);
    }
    let stored = store
        .get_setting(ZHIHU_COOKIES_KEY)
        .await?
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from);
    if stored.is_some() {
        debug!("Using cookies from crawler_config");
    }
    Ok(stored)
}

/// 설정으로 클라이언트를 만듭니다.
pub fn build_client(config: &CollectorConfig, cookies: Option<SecretString>) -> Result<ZhihuClient> {
    let signer: Arc<dyn Signer> = match config
        .signer_command
        .as_deref()
        .and_then(CommandSigner::from_command_line)
    {
        Some(signer) => Arc::new(signer),
        None => Arc::new(NoopSigner),
    };

    if cookies.is_none() {
        warn!("Zhihu 쿠키가 없습니다. 인증 없이 요청합니다");
    }
    info!(signer = signer.name(), "Zhihu client ready");

    Ok(ZhihuClient::new(config.crawl.zhihu_config(), cookies, signer)?)
}

async fn resolve_creators(store: &dyn Store, selection: &CreatorSelection) -> Result<Vec<String>> {
    let tokens = match selection {
        CreatorSelection::Links(links) => links
            .iter()
            .filter_map(|link| {
                let token = url_token_from_link(link);
                if token.is_none() {
                    warn!(link = %link, "Invalid creator link");
                }
                token
            })
            .collect(),
        CreatorSelection::UserIds(ids) => {
            let mut tokens = Vec::with_capacity(ids.len());
            for id in ids {
                match store.get_creator_by_user_id(id).await? {
                    Some(creator) => tokens.push(creator.url_token),
                    None => warn!(user_id = %id, "Unknown creator id"),
                }
            }
            info!(selected = tokens.len(), requested = ids.len(), "Selected creators");
            tokens
        }
        CreatorSelection::AllActive => store
            .list_creators(true)
            .await?
            .into_iter()
            .map(|c| c.url_token)
            .collect(),
    };
    Ok(tokens)
}

/// 선택된 크리에이터들을 순서대로 수집합니다.
///
/// 크리에이터 하나의 실패는 로그 후 다음으로 넘어갑니다. 차단기가
/// 열리면 즉시 실행 전체를 중단하고 에러를 반환합니다.
pub async fn crawl_zhihu(
    client: &ZhihuClient,
    store: &dyn Store,
    options: &CrawlOptions,
) -> Result<CrawlReport> {
    let started = Instant::now();
    let tokens = resolve_creators(store, &options.selection).await?;

    let mut report = CrawlReport {
        summary: RunSummary::new(SummaryUnit::Creators),
        creators: Vec::new(),
    };
    if tokens.is_empty() {
        warn!("수집할 크리에이터가 없습니다. 먼저 크리에이터를 등록하세요");
        return Ok(report);
    }

    info!(
        creators = tokens.len(),
        mode = if options.full { "full" } else { "incremental" },
        start = ?options.window.start,
        end = ?options.window.end_exclusive,
        "Zhihu 수집 시작"
    );

    let mut tracker = ProgressTracker::new(tokens.len());
    for url_token in &tokens {
        report.summary.total += 1;
        let result = crawl_creator(client, store, url_token, options).await;
        if let Some(progress) = tracker.advance() {
            info!(progress, done = report.summary.total, total = tokens.len(), "수집 진행");
        }
        match result {
            Ok(creator) => {
                report.summary.succeeded += 1;
                report.summary.written += creator.inserted;
                report.summary.skipped_items += creator.skipped;
                if creator.inserted == 0 {
                    report.summary.unchanged += 1;
                }
                report.creators.push(creator);
            }
            Err(e) if e.is_fatal() => {
                error!(url_token = %url_token, error = %e, "수집 중단");
                return Err(e);
            }
            Err(e) => {
                warn!(url_token = %url_token, error = %e, "Creator crawl failed");
                report.summary.failed += 1;
            }
        }
    }

    report.summary.elapsed = started.elapsed();
    Ok(report)
}

/// 크리에이터 한 명을 수집합니다.
pub async fn crawl_creator(
    client: &ZhihuClient,
    store: &dyn Store,
    url_token: &str,
    options: &CrawlOptions,
) -> Result<CreatorReport> {
    let profile = client
        .get_creator(url_token)
        .await?
        .ok_or_else(|| CollectorError::CreatorNotFound(url_token.to_string()))?;
    let creator = store.upsert_creator(&profile).await?;

    let watermark = if options.full || options.window.start.is_some() {
        None
    } else {
        store.latest_created_time(&creator.user_id).await?
    };
    let existing = store.count_by_author(&creator.user_id).await?;

    info!(
        url_token = %creator.url_token,
        nickname = %creator.nickname,
        answers = creator.answer_count,
        articles = creator.article_count,
        existing,
        watermark = ?watermark,
        "Crawling creator"
    );

    let mut report = CreatorReport {
        url_token: creator.url_token.clone(),
        nickname: creator.nickname.clone(),
        existing,
        watermark,
        ..Default::default()
    };

    for kind in ContentKind::CRAWLED {
        crawl_kind(client, store, &creator.url_token, kind, watermark, options, &mut report).await?;
    }

    store
        .touch_creator_crawled(&creator.url_token, Utc::now())
        .await?;

    info!(
        url_token = %report.url_token,
        inserted = report.inserted,
        updated = report.updated,
        skipped = report.skipped,
        failed_pages = report.failed_pages,
        "Creator done"
    );
    Ok(report)
}

async fn crawl_kind(
    client: &ZhihuClient,
    store: &dyn Store,
    url_token: &str,
    kind: ContentKind,
    watermark: Option<i64>,
    options: &CrawlOptions,
    report: &mut CreatorReport,
) -> Result<()> {
    let page_size = client.page_size();
    let mut offset = 0u32;
    let mut consecutive_failures = 0u32;

    loop {
        let page = match fetch_page(client, url_token, kind, offset).await {
            Ok(page) => {
                consecutive_failures = 0;
                page
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                report.failed_pages += 1;
                consecutive_failures += 1;
                warn!(url_token, kind = %kind, offset, error = %e, "Page failed, skipping");
                if consecutive_failures >= options.max_page_failures.max(1) {
                    warn!(url_token, kind = %kind, "Too many failed pages, giving up on this kind");
                    return Ok(());
                }
                offset += page_size;
                continue;
            }
        };
        report.pages += 1;

        if page.raw_count == 0 {
            break;
        }

        let mut stop = false;
        for item in &page.items {
            match decide(item.created_time, watermark, &options.window) {
                ItemDecision::Store => save_item(store, item, report).await,
                ItemDecision::Skip => report.skipped += 1,
                ItemDecision::Stop => {
                    report.skipped += 1;
                    stop = true;
                }
            }
        }

        if page.is_end || stop {
            break;
        }
        offset += page_size;
    }
    Ok(())
}

/// 페이지 하나를 조회합니다. 일시적 에러면 `PAGE_RETRIES`번까지 다시 요청합니다.
async fn fetch_page(
    client: &ZhihuClient,
    url_token: &str,
    kind: ContentKind,
    offset: u32,
) -> alphanote_zhihu::Result<ContentPage> {
    let mut attempt = 0;
    loop {
        match client.list_page(kind, url_token, offset).await {
            Err(e) if e.is_retryable() && attempt < PAGE_RETRIES => {
                attempt += 1;
                debug!(url_token, kind = %kind, offset, attempt, error = %e, "Retrying page");
            }
            result => return result,
        }
    }
}

async fn save_item(store: &dyn Store, item: &Content, report: &mut CreatorReport) {
    match store.upsert_content(item).await {
        Ok(UpsertOutcome::Inserted) => report.inserted += 1,
        Ok(UpsertOutcome::Updated) => report.updated += 1,
        Err(e) => {
            report.write_failures += 1;
            warn!(content_id = %item.content_id, error = %e, "Failed to store content");
        }
    }
}
