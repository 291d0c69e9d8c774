//! 클라이언트 에러 타입.

use thiserror::Error;

/// Zhihu API 요청 에러.
#[derive(Debug, Error)]
pub enum ZhihuError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    Network(String),

    /// 요청 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 200이 아닌 HTTP 응답
    #[error("HTTP {status}: {url}")]
    Http { status: u16, url: String },

    /// 연속 403으로 차단됨. 실행 전체를 중단해야 한다.
    #[error("{consecutive}회 연속 403 Forbidden: 쿠키가 만료되었거나 요청이 제한되었습니다. 설정에서 Zhihu 쿠키를 갱신한 뒤 다시 시도하세요")]
    CircuitTripped { consecutive: u32 },

    /// 응답 파싱 에러
    #[error("Parse error: {0}")]
    Parse(String),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ZhihuError {
    /// 실행 전체를 중단해야 하는 에러인지.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ZhihuError::CircuitTripped { .. })
    }

    /// 같은 요청을 다시 시도해 볼 만한 에러인지.
    pub fn is_retryable(&self) -> bool {
        match self {
            ZhihuError::Network(_) | ZhihuError::Timeout(_) => true,
            ZhihuError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ZhihuError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ZhihuError::Timeout(err.to_string())
        } else if err.is_decode() {
            ZhihuError::Parse(err.to_string())
        } else {
            ZhihuError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ZhihuError {
    fn from(err: serde_json::Error) -> Self {
        ZhihuError::Parse(err.to_string())
    }
}

/// 클라이언트 Result 타입.
pub type Result<T> = std::result::Result<T, ZhihuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ZhihuError::CircuitTripped { consecutive: 3 }.is_fatal());
        assert!(!ZhihuError::Network("reset".into()).is_fatal());

        assert!(ZhihuError::Timeout("30s".into()).is_retryable());
        assert!(ZhihuError::Http { status: 502, url: "/x".into() }.is_retryable());
        assert!(!ZhihuError::Http { status: 403, url: "/x".into() }.is_retryable());
        assert!(!ZhihuError::Parse("bad json".into()).is_retryable());
    }
}
