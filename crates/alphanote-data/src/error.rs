//! 저장소, 공유 작업 상태, 시세 소스 에러.

use thiserror::Error;

/// 데이터 계층 에러.
#[derive(Debug, Error)]
pub enum DataError {
    /// Postgres 연결 실패
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// 연결 풀에서 제한 시간 안에 연결을 얻지 못함
    #[error("Database pool timed out")]
    PoolTimedOut,

    /// 쿼리 실패
    #[error("Database query failed: {0}")]
    Query(String),

    /// `init-db` 스키마 마이그레이션 실패
    #[error("Schema migration failed: {0}")]
    Migration(String),

    /// 대상 레코드 없음 (예: 등록되지 않은 크리에이터)
    #[error("Not found: {0}")]
    NotFound(String),

    /// 이미 등록됨 (예: 같은 url_token의 크리에이터)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// 참조 대상이 없거나 형식이 맞지 않아 저장할 수 없음
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 작업 상태 파일 읽기/쓰기/잠금 실패
    #[error("Job state error: {0}")]
    JobState(String),

    /// 시세 소스 요청 실패
    #[error("Quote fetch failed: {0}")]
    QuoteFetch(String),

    /// 시세 응답을 해석할 수 없음
    #[error("Malformed quote data: {0}")]
    QuoteParse(String),
}

/// PostgreSQL unique_violation
const PG_UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL foreign_key_violation
const PG_FOREIGN_KEY_VIOLATION: &str = "23503";

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("row".to_string()),
            sqlx::Error::PoolTimedOut => DataError::PoolTimedOut,
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some(PG_UNIQUE_VIOLATION) => DataError::AlreadyExists(db_err.message().to_string()),
                // 없는 콘텐츠에 연관을 쓰는 경우
                Some(PG_FOREIGN_KEY_VIOLATION) => {
                    DataError::InvalidData(db_err.message().to_string())
                }
                _ => DataError::Query(db_err.message().to_string()),
            },
            _ => DataError::Query(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DataError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DataError::Migration(err.to_string())
    }
}

// 아래 두 변환은 파일 작업 상태 저장소에서만 일어난다
impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::JobState(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::JobState(format!("state encoding: {}", err))
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        DataError::QuoteFetch(err.to_string())
    }
}

impl From<alphanote_core::CoreError> for DataError {
    fn from(err: alphanote_core::CoreError) -> Self {
        DataError::InvalidData(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
