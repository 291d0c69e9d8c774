//! 환경변수 기반 설정 모듈.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alphanote_core::time;
use alphanote_data::{MarketUpdateConfig, RetryConfig};
use alphanote_zhihu::{GovernorConfig, ZhihuConfig};
use chrono_tz::Tz;
use secrecy::SecretString;

use crate::error::CollectorError;
use crate::Result;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL (DB를 쓰는 명령에서만 필수)
    pub database_url: Option<String>,
    /// Zhihu 세션 쿠키. 없으면 `crawler_config` 테이블에서 읽는다
    pub zhihu_cookies: Option<SecretString>,
    /// 외부 서명 프로그램 명령줄
    pub signer_command: Option<String>,
    /// 크롤링 설정
    pub crawl: CrawlConfig,
    /// 작업 상태 설정
    pub job: JobConfig,
    /// 시세 갱신 설정
    pub market: MarketConfig,
    /// 날짜 변환 시간대
    pub timezone: Tz,
    /// HTTP 제어 API 바인드 주소
    pub api_bind: SocketAddr,
}

/// 크롤링 설정
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// 요청 간 최소 간격 (밀리초)
    pub request_interval_ms: u64,
    /// 차단기를 여는 연속 403 횟수
    pub max_forbidden: u32,
    /// 페이지 크기
    pub page_size: u32,
    /// HTTP 타임아웃 (초)
    pub http_timeout_secs: u64,
    /// 유형별 연속 페이지 실패 허용 횟수
    pub max_page_failures: u32,
}

/// 작업 상태 저장 위치
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStateBackend {
    File,
    Postgres,
}

impl FromStr for JobStateBackend {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "postgres" | "pg" => Ok(Self::Postgres),
            other => Err(CollectorError::Config(format!(
                "JOB_STATE_BACKEND는 file 또는 postgres여야 합니다: {}",
                other
            ))),
        }
    }
}

/// 작업 상태 설정
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub backend: JobStateBackend,
    /// 파일 백엔드의 상태 파일 경로
    pub state_path: PathBuf,
    /// 로그 버퍼에 반영하는 줄 단위
    pub log_flush_lines: usize,
}

/// 시세 갱신 설정
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// 저장된 시세가 없을 때 조회 기간 (일)
    pub lookback_days: i64,
    /// 1차 소스 시도 횟수
    pub retry_attempts: u32,
    /// 재시도 기본 지연 (밀리초)
    pub retry_base_ms: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            request_interval_ms: 3000,
            max_forbidden: 3,
            page_size: 20,
            http_timeout_secs: 30,
            max_page_failures: 3,
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            backend: JobStateBackend::File,
            state_path: PathBuf::from("data/sync_state.json"),
            log_flush_lines: 5,
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            lookback_days: 365,
            retry_attempts: 3,
            retry_base_ms: 1000,
        }
    }
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드 (`.env` 포함)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 키 조회 함수로 설정을 만듭니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timezone = match non_empty("MARKET_TIMEZONE") {
            Some(name) => time::parse_timezone(&name)?,
            None => time::DEFAULT_TIMEZONE,
        };

        let api_bind = non_empty("API_BIND")
            .unwrap_or_else(|| "127.0.0.1:8600".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| CollectorError::Config(format!("API_BIND: {}", e)))?;

        let backend = match non_empty("JOB_STATE_BACKEND") {
            Some(value) => value.parse()?,
            None => JobStateBackend::File,
        };

        let crawl_defaults = CrawlConfig::default();
        let job_defaults = JobConfig::default();
        let market_defaults = MarketConfig::default();

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            zhihu_cookies: non_empty("ZHIHU_COOKIES").map(SecretString::from),
            signer_command: non_empty("ZHIHU_SIGNER_COMMAND"),
            crawl: CrawlConfig {
                request_interval_ms: parse_or(
                    &lookup,
                    "CRAWL_REQUEST_INTERVAL_MS",
                    crawl_defaults.request_interval_ms,
                ),
                max_forbidden: parse_or(&lookup, "CRAWL_MAX_FORBIDDEN", crawl_defaults.max_forbidden),
                page_size: parse_or(&lookup, "CRAWL_PAGE_SIZE", crawl_defaults.page_size),
                http_timeout_secs: parse_or(
                    &lookup,
                    "CRAWL_HTTP_TIMEOUT_SECS",
                    crawl_defaults.http_timeout_secs,
                ),
                max_page_failures: parse_or(
                    &lookup,
                    "CRAWL_MAX_PAGE_FAILURES",
                    crawl_defaults.max_page_failures,
                ),
            },
            job: JobConfig {
                backend,
                state_path: non_empty("JOB_STATE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(job_defaults.state_path),
                log_flush_lines: parse_or(&lookup, "JOB_LOG_FLUSH_LINES", job_defaults.log_flush_lines)
                    .max(1),
            },
            market: MarketConfig {
                lookback_days: parse_or(&lookup, "MARKET_LOOKBACK_DAYS", market_defaults.lookback_days),
                retry_attempts: parse_or(&lookup, "MARKET_RETRY_ATTEMPTS", market_defaults.retry_attempts),
                retry_base_ms: parse_or(&lookup, "MARKET_RETRY_BASE_MS", market_defaults.retry_base_ms),
            },
            timezone,
            api_bind,
        })
    }

    /// DB URL을 요구합니다.
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            CollectorError::Config("DATABASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })
    }
}

impl CrawlConfig {
    /// 요청 간 최소 간격을 Duration으로 반환
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    /// Zhihu 클라이언트 설정으로 변환합니다.
    pub fn zhihu_config(&self) -> ZhihuConfig {
        ZhihuConfig {
            page_size: self.page_size.max(1),
            timeout_secs: self.http_timeout_secs,
            governor: GovernorConfig::new(self.max_forbidden, self.request_interval_ms),
            ..Default::default()
        }
    }
}

impl MarketConfig {
    pub fn update_config(&self, timezone: Tz) -> MarketUpdateConfig {
        MarketUpdateConfig {
            lookback_days: self.lookback_days,
            retry: RetryConfig::new(self.retry_attempts, self.retry_base_ms),
            timezone,
        }
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
