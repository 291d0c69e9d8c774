//! 태깅 에러 타입.

use alphanote_data::DataError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaggerError {
    /// 저장소 에러
    #[error("저장소 에러: {0}")]
    Store(#[from] DataError),

    /// 대상 콘텐츠 없음
    #[error("콘텐츠를 찾을 수 없습니다: {0}")]
    ContentNotFound(String),
}

pub type Result<T> = std::result::Result<T, TaggerError>;
