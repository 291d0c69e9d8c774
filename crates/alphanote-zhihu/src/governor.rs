//! 요청 간격 및 403 차단기.
//!
//! # 상태 전이
//!
//! ```text
//! Open ──[연속 403 임계치 도달]──> Tripped
//!  ↑  │
//!  └──┘ [403 이외 응답: 연속 카운트 0으로]
//! ```
//!
//! Tripped는 자격 증명 자체의 문제를 뜻하므로 자동 복구하지 않습니다.
//! 이후 모든 요청은 `ZhihuError::CircuitTripped`로 거부되고, 크롤링 실행
//! 전체가 중단됩니다.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{Result, ZhihuError};

/// 차단기 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernorState {
    /// 요청 허용
    Open,
    /// 모든 요청 거부
    Tripped,
}

impl std::fmt::Display for GovernorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GovernorState::Open => write!(f, "open"),
            GovernorState::Tripped => write!(f, "tripped"),
        }
    }
}

/// 차단기 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// 차단까지 허용하는 연속 403 횟수
    #[serde(default = "default_max_consecutive_forbidden")]
    pub max_consecutive_forbidden: u32,
    /// 요청 간 최소 간격 (ms)
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

fn default_max_consecutive_forbidden() -> u32 {
    3
}
fn default_min_interval_ms() -> u64 {
    3_000
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_consecutive_forbidden: default_max_consecutive_forbidden(),
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

impl GovernorConfig {
    pub fn new(max_consecutive_forbidden: u32, min_interval_ms: u64) -> Self {
        Self {
            max_consecutive_forbidden: max_consecutive_forbidden.max(1),
            min_interval_ms,
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// 요청 간격을 유지하고 연속 403에서 차단하는 관리자.
///
/// 한 번의 크롤링 실행에서 모든 요청이 같은 인스턴스를 공유합니다.
pub struct RequestGovernor {
    config: GovernorConfig,
    tripped: AtomicBool,
    consecutive_forbidden: AtomicU32,
    /// 다음 요청이 나갈 수 있는 가장 이른 시각
    next_slot: Mutex<Option<Instant>>,
    total_requests: AtomicU64,
    total_forbidden: AtomicU64,
}

impl RequestGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            tripped: AtomicBool::new(false),
            consecutive_forbidden: AtomicU32::new(0),
            next_slot: Mutex::new(None),
            total_requests: AtomicU64::new(0),
            total_forbidden: AtomicU64::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(GovernorConfig::default())
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// 현재 상태.
    pub fn state(&self) -> GovernorState {
        if self.tripped.load(Ordering::SeqCst) {
            GovernorState::Tripped
        } else {
            GovernorState::Open
        }
    }

    /// 요청 가능 여부를 확인합니다. Tripped면 치명적 에러를 반환합니다.
    pub fn check(&self) -> Result<()> {
        if self.tripped.load(Ordering::SeqCst) {
            return Err(ZhihuError::CircuitTripped {
                consecutive: self.consecutive_forbidden.load(Ordering::SeqCst),
            });
        }
        Ok(())
    }

    /// 요청 슬롯을 확보합니다.
    ///
    /// 직전 요청 이후 최소 간격이 지날 때까지 현재 태스크만 대기합니다.
    /// 슬롯은 락 안에서 예약하고 대기는 락 밖에서 하므로 동시 호출도
    /// 간격을 지킵니다.
    pub async fn acquire(&self) -> Result<()> {
        self.check()?;

        let wait_until = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next_slot {
                Some(next) if next > now => next,
                _ => now,
            };
            *next_slot = Some(slot + self.config.min_interval());
            slot
        };

        tokio::time::sleep_until(wait_until).await;

        // 대기 중에 다른 요청이 차단시켰을 수 있다
        self.check()?;
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// 응답 상태 코드를 기록합니다.
    ///
    /// 403이면 연속 카운트를 올리고, 임계치에 도달하면 차단 후 에러를
    /// 반환합니다. 그 외 응답은 연속 카운트를 0으로 되돌립니다.
    pub fn record_status(&self, status: u16) -> Result<()> {
        if status != 403 {
            self.consecutive_forbidden.store(0, Ordering::SeqCst);
            return Ok(());
        }

        self.total_forbidden.fetch_add(1, Ordering::Relaxed);
        let count = self.consecutive_forbidden.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::warn!(
            count = count,
            max = self.config.max_consecutive_forbidden,
            "403 Forbidden"
        );

        if count >= self.config.max_consecutive_forbidden {
            if !self.tripped.swap(true, Ordering::SeqCst) {
                tracing::error!(
                    consecutive = count,
                    "Request governor tripped: Open -> Tripped"
                );
            }
            return Err(ZhihuError::CircuitTripped { consecutive: count });
        }
        Ok(())
    }

    pub fn metrics(&self) -> GovernorMetrics {
        GovernorMetrics {
            state: self.state(),
            consecutive_forbidden: self.consecutive_forbidden.load(Ordering::SeqCst),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_forbidden: self.total_forbidden.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for RequestGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGovernor")
            .field("state", &self.state())
            .field(
                "consecutive_forbidden",
                &self.consecutive_forbidden.load(Ordering::SeqCst),
            )
            .field("config", &self.config)
            .finish()
    }
}

/// 차단기 메트릭.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernorMetrics {
    /// 현재 상태
    pub state: GovernorState,
    /// 현재 연속 403 횟수
    pub consecutive_forbidden: u32,
    /// 총 요청 수
    pub total_requests: u64,
    /// 총 403 응답 수
    pub total_forbidden: u64,
}
