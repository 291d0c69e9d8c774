//! tracing 구독자 설정.
//!
//! collector 바이너리는 두 가지 모드로 로그를 냅니다.
//! 사람이 직접 실행할 때는 pretty/json/compact 중 하나를 고르고,
//! 오케스트레이터가 작업 프로세스로 띄울 때는 [`LogConfig::job_output`]을 씁니다.
//! 이 모드의 출력은 줄 단위로 작업 상태 로그에 쌓이고, `progress=N` 필드는
//! 상태의 진행률로 옮겨집니다 ([`crate::parse_progress`]).

use std::fmt;

use tracing::Subscriber;
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, EnvFilter};

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 여러 줄, 개발용
    Pretty,
    /// 한 줄 JSON, 로그 수집기용
    Json,
    /// 한 줄 `key=value`
    #[default]
    Compact,
}

impl LogFormat {
    pub const ALL: [LogFormat; 3] = [LogFormat::Pretty, LogFormat::Json, LogFormat::Compact];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
            LogFormat::Compact => "compact",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown log format '{}' (expected pretty, json or compact)", s))
    }
}

/// 구독자 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `EnvFilter` 지시어 (예: "info", "alphanote_zhihu=debug")
    pub level: String,
    pub format: LogFormat,
    /// 모듈 경로 출력
    pub with_target: bool,
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            with_target: false,
            with_ansi: true,
        }
    }
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// 작업 프로세스 출력: compact, 색상 없음, 모듈 경로 없음.
    pub fn job_output(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::Compact,
            with_target: false,
            with_ansi: false,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }

    /// `LOG_FORMAT`이 유효하면 형식을 덮어씁니다.
    pub fn with_env_format(mut self) -> Self {
        if let Some(format) = std::env::var("LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.format = format;
        }
        self
    }

    /// 비어 있지 않은 `RUST_LOG`가 있으면 레벨 대신 씁니다.
    pub fn with_env_filter(mut self) -> Self {
        if let Ok(directives) = std::env::var("RUST_LOG") {
            if !directives.trim().is_empty() {
                self.level = directives;
            }
        }
        self
    }
}

pub type LogInitError = Box<dyn std::error::Error + Send + Sync>;

/// 설정대로 구독자를 만듭니다. 전역으로 등록하지 않습니다.
pub fn build_subscriber<W>(
    config: &LogConfig,
    writer: W,
) -> Result<Box<dyn Subscriber + Send + Sync>, LogInitError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_new(&config.level)?;
    let registry = tracing_subscriber::registry().with(filter);
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(config.with_ansi)
        .with_target(config.with_target);

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.format {
        LogFormat::Pretty => Box::new(registry.with(layer.pretty())),
        LogFormat::Json => Box::new(registry.with(layer.json())),
        LogFormat::Compact => Box::new(registry.with(layer.compact())),
    };
    Ok(subscriber)
}

/// stdout으로 쓰는 전역 구독자를 등록합니다. `RUST_LOG`가 `config.level`보다 우선합니다.
pub fn init_logging(config: LogConfig) -> Result<(), LogInitError> {
    let config = config.with_env_filter();
    let subscriber = build_subscriber(&config, std::io::stdout)?;
    tracing::subscriber::set_global_default(subscriber)?;

    tracing::debug!(format = %config.format, level = %config.level, "Logging initialized");
    Ok(())
}
