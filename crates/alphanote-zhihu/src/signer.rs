//! 요청 서명 기능.
//!
//! Zhihu의 자동화 방지 계층은 요청 경로(쿼리 포함)와 세션 쿠키로 계산한
//! 헤더(`x-zst-81`, `x-zse-96`)를 요구합니다. 알고리즘은 플랫폼이 정의하므로
//! 교체 가능한 `Signer`로 분리하고, 서명을 못 하면 빈 헤더를 돌려줍니다.
//! 빈 헤더로 계속 진행할지는 호출자가 결정합니다.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// 서명 결과 헤더 (이름 → 값).
pub type HeaderSet = BTreeMap<String, String>;

/// 요청 서명기.
#[async_trait]
pub trait Signer: Send + Sync {
    /// 서명기 이름 (로그용).
    fn name(&self) -> &str;

    /// `path_with_query`(도메인 제외)와 쿠키로 서명 헤더를 계산합니다.
    ///
    /// 실패해도 에러를 내지 않고 빈 헤더를 반환합니다.
    async fn sign(&self, path_with_query: &str, cookies: &str) -> HeaderSet;
}

/// 서명 모듈이 없을 때 쓰는 기본 구현.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSigner;

#[async_trait]
impl Signer for NoopSigner {
    fn name(&self) -> &str {
        "noop"
    }

    async fn sign(&self, _path_with_query: &str, _cookies: &str) -> HeaderSet {
        HeaderSet::new()
    }
}

#[derive(Serialize)]
struct SignRequest<'a> {
    url: &'a str,
    cookies: &'a str,
}

/// 외부 프로그램으로 서명합니다.
///
/// 프로그램은 stdin으로 `{"url": ..., "cookies": ...}`를 받고 stdout에
/// 헤더 JSON 객체를 출력해야 합니다.
#[derive(Debug, Clone)]
pub struct CommandSigner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSigner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: Duration::from_secs(10),
        }
    }

    /// 공백으로 구분된 명령줄 문자열에서 생성합니다 (예: "node sign.js").
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, path_with_query: &str, cookies: &str) -> Result<HeaderSet, String> {
        let payload = serde_json::to_vec(&SignRequest {
            url: path_with_query,
            cookies,
        })
        .map_err(|e| e.to_string())?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("spawn {}: {}", self.program, e))?;

        // 입력 쓰기와 출력 대기 모두 시간 제한 안에서
        let exchange = async {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(&payload).await?;
            }
            child.wait_with_output().await
        };

        let output = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| format!("timed out after {:?}", self.timeout))?
            .map_err(|e| e.to_string())?;

        if !output.status.success() {
            return Err(format!("exited with {}", output.status));
        }

        serde_json::from_slice::<HeaderSet>(&output.stdout).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Signer for CommandSigner {
    fn name(&self) -> &str {
        &self.program
    }

    async fn sign(&self, path_with_query: &str, cookies: &str) -> HeaderSet {
        match self.run(path_with_query, cookies).await {
            Ok(headers) => {
                debug!(signer = %self.program, count = headers.len(), "Request signed");
                headers
            }
            Err(e) => {
                warn!(signer = %self.program, error = %e, "Signing failed, sending unsigned request");
                HeaderSet::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_signer_returns_empty_headers() {
        let headers = NoopSigner.sign("/api/v4/members/foo", "z_c0=abc").await;
        assert!(headers.is_empty());
    }

    #[test]
    fn test_command_line_parsing() {
        let signer = CommandSigner::from_command_line("node scripts/sign.js --fast").unwrap();
        assert_eq!(signer.program, "node");
        assert_eq!(signer.args, vec!["scripts/sign.js", "--fast"]);

        assert!(CommandSigner::from_command_line("   ").is_none());
    }

    #[tokio::test]
    async fn test_missing_program_degrades_to_empty_headers() {
        let signer = CommandSigner::new("alphanote-signer-that-does-not-exist", vec![]);
        let headers = signer.sign("/api/v4/members/foo", "z_c0=abc").await;
        assert!(headers.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_signer_reads_headers_from_stdout() {
        let signer = CommandSigner::new(
            "sh",
            vec![
                "-c".to_string(),
                r#"cat > /dev/null; echo '{"x-zst-81":"a","x-zse-96":"2.0_b"}'"#.to_string(),
            ],
        );
        let headers = signer.sign("/api/v4/members/foo?offset=0", "d_c0=xyz").await;
        assert_eq!(headers.get("x-zst-81").map(String::as_str), Some("a"));
        assert_eq!(headers.get("x-zse-96").map(String::as_str), Some("2.0_b"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signer_ignoring_stdin_times_out() {
        let signer = CommandSigner::new("sh", vec!["-c".to_string(), "sleep 5".to_string()])
            .with_timeout(Duration::from_millis(200));
        // 파이프 버퍼보다 큰 입력이라 쓰기 자체가 막힌다
        let cookies = "z".repeat(1024 * 1024);

        let started = std::time::Instant::now();
        let headers = signer.sign("/api/v4/members/foo", &cookies).await;

        assert!(headers.is_empty());
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
