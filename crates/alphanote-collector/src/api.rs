//! 작업 제어 HTTP 엔드포인트.
//!
//! - `GET /sync/status`, `POST /sync/{crawl,tag,market,stop}`
//! - `GET /sync/article-time-range`
//! - `GET|PUT /sync/config`, `GET|DELETE /sync/config/{key}`
//! - `PUT /articles/{content_id}/stocks`

use std::sync::Arc;

use alphanote_core::{time, Association, JobState};
use alphanote_data::Store;
use alphanote_tagger::TaggerError;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::modules;
use crate::orchestrator::{CrawlArgs, JobOrchestrator, JobTask, StartOutcome};
use crate::CollectorError;

/// API 공유 상태.
pub struct ApiState {
    pub orchestrator: JobOrchestrator,
    pub store: Arc<dyn Store>,
    pub timezone: Tz,
}

/// API 에러 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn internal(err: impl std::fmt::Display) -> (StatusCode, Json<ApiError>) {
    error!(error = %err, "Request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError::new("INTERNAL_ERROR", err.to_string())),
    )
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError::new("INVALID_INPUT", message)),
    )
}

/// 작업 제어 라우터를 생성합니다.
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/sync/status", get(get_status))
        .route("/sync/crawl", post(start_crawl))
        .route("/sync/tag", post(start_tag))
        .route("/sync/market", post(start_market))
        .route("/sync/stop", post(stop_job))
        .route("/sync/article-time-range", get(article_time_range))
        .route("/sync/config", get(list_config).put(put_config))
        .route("/sync/config/{key}", get(get_config).delete(delete_config))
        .route("/articles/{content_id}/stocks", put(put_article_stocks))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ==================== 작업 제어 ====================

/// GET /sync/status
async fn get_status(State(state): State<Arc<ApiState>>) -> ApiResult<JobState> {
    state.orchestrator.status().await.map(Json).map_err(internal)
}

async fn start_task(state: &ApiState, task: JobTask) -> ApiResult<StartOutcome> {
    let outcome = state.orchestrator.start(task).await.map_err(internal)?;
    if let StartOutcome::Rejected { current_task } = &outcome {
        return Err((
            StatusCode::CONFLICT,
            Json(ApiError::new(
                "ALREADY_RUNNING",
                format!(
                    "Task already running: {}",
                    current_task.as_deref().unwrap_or("unknown")
                ),
            )),
        ));
    }
    Ok(Json(outcome))
}

/// POST /sync/crawl
///
/// 본문은 생략 가능하며, 있으면 `CrawlArgs` JSON입니다.
async fn start_crawl(State(state): State<Arc<ApiState>>, body: Bytes) -> ApiResult<StartOutcome> {
    let args = if body.iter().all(u8::is_ascii_whitespace) {
        CrawlArgs::default()
    } else {
        serde_json::from_slice::<CrawlArgs>(&body).map_err(|e| bad_request(e.to_string()))?
    };
    args.validate().map_err(|e| bad_request(e.to_string()))?;

    start_task(&state, JobTask::CrawlZhihu(args)).await
}

#[derive(Debug, Default, Deserialize)]
struct TagQuery {
    #[serde(default)]
    retag_all: bool,
}

/// POST /sync/tag?retag_all=bool
async fn start_tag(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<TagQuery>,
) -> ApiResult<StartOutcome> {
    let task = if query.retag_all {
        JobTask::TagArticlesAll
    } else {
        JobTask::TagArticles
    };
    start_task(&state, task).await
}

/// POST /sync/market
async fn start_market(State(state): State<Arc<ApiState>>) -> ApiResult<StartOutcome> {
    start_task(&state, JobTask::UpdateMarket).await
}

/// POST /sync/stop
async fn stop_job(State(state): State<Arc<ApiState>>) -> ApiResult<JobState> {
    state.orchestrator.stop().await.map(Json).map_err(internal)
}

// ==================== 조회 ====================

#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleTimeRangeResponse {
    pub oldest_time: Option<i64>,
    pub newest_time: Option<i64>,
    pub oldest_date: Option<NaiveDate>,
    pub newest_date: Option<NaiveDate>,
    pub total_count: i64,
}

/// GET /sync/article-time-range
async fn article_time_range(
    State(state): State<Arc<ApiState>>,
) -> ApiResult<ArticleTimeRangeResponse> {
    let range = state.store.content_time_range().await.map_err(internal)?;
    let tz = state.timezone;

    Ok(Json(ArticleTimeRangeResponse {
        oldest_date: range.oldest_time.and_then(|t| time::timestamp_to_date(t, tz)),
        newest_date: range.newest_time.and_then(|t| time::timestamp_to_date(t, tz)),
        oldest_time: range.oldest_time,
        newest_time: range.newest_time,
        total_count: range.total_count,
    }))
}

// ==================== 크롤러 설정 ====================

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: Option<String>,
}

/// GET /sync/config
async fn list_config(State(state): State<Arc<ApiState>>) -> ApiResult<Vec<ConfigEntry>> {
    let settings = state.store.list_settings().await.map_err(internal)?;
    Ok(Json(
        settings
            .into_iter()
            .map(|(key, value)| ConfigEntry {
                key,
                value: Some(value),
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
struct ConfigUpdate {
    key: String,
    value: String,
}

/// PUT /sync/config
async fn put_config(
    State(state): State<Arc<ApiState>>,
    Json(update): Json<ConfigUpdate>,
) -> ApiResult<ConfigEntry> {
    let key = update.key.trim();
    if key.is_empty() {
        return Err(bad_request("key must not be empty"));
    }
    state
        .store
        .set_setting(key, &update.value)
        .await
        .map_err(internal)?;

    Ok(Json(ConfigEntry {
        key: key.to_string(),
        value: Some(update.value),
    }))
}

/// GET /sync/config/{key}
async fn get_config(
    State(state): State<Arc<ApiState>>,
    Path(key): Path<String>,
) -> ApiResult<ConfigEntry> {
    let value = state.store.get_setting(&key).await.map_err(internal)?;
    Ok(Json(ConfigEntry { key, value }))
}

/// DELETE /sync/config/{key}
async fn delete_config(
    State(state): State<Arc<ApiState>>,
    Path(key): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    state.store.delete_setting(&key).await.map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

// ==================== 수동 연관 ====================

#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleStocksResponse {
    pub content_id: String,
    pub stocks: Vec<Association>,
}

/// PUT /articles/{content_id}/stocks
///
/// 본문은 종목 코드 배열이며, 콘텐츠의 연관을 이 목록으로 교체합니다.
async fn put_article_stocks(
    State(state): State<Arc<ApiState>>,
    Path(content_id): Path<String>,
    Json(symbols): Json<Vec<String>>,
) -> ApiResult<ArticleStocksResponse> {
    match modules::tag_manual(state.store.clone(), &content_id, &symbols, state.timezone).await {
        Ok(stocks) => Ok(Json(ArticleStocksResponse { content_id, stocks })),
        Err(CollectorError::Tagger(TaggerError::ContentNotFound(id))) => Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::new("NOT_FOUND", format!("Article not found: {}", id))),
        )),
        Err(e) => Err(internal(e)),
    }
}
