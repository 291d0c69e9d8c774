//! 에러 타입 정의.

use alphanote_data::DataError;
use alphanote_tagger::TaggerError;
use alphanote_zhihu::ZhihuError;
use thiserror::Error;

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 저장소 에러
    #[error("Database error: {0}")]
    Data(#[from] DataError),

    /// Zhihu 요청 에러
    #[error("Zhihu error: {0}")]
    Zhihu(#[from] ZhihuError),

    /// 태깅 에러
    #[error("Tagging error: {0}")]
    Tagger(#[from] TaggerError),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 잘못된 입력 (링크, 날짜 등)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 프로필을 찾을 수 없는 크리에이터
    #[error("Creator not found: {0}")]
    CreatorNotFound(String),

    /// 작업 실행 에러 (서브프로세스 등)
    #[error("Job error: {0}")]
    Job(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollectorError {
    /// 실행 전체를 중단해야 하는 에러인지.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CollectorError::Zhihu(e) if e.is_fatal())
    }
}

impl From<alphanote_core::CoreError> for CollectorError {
    fn from(err: alphanote_core::CoreError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
