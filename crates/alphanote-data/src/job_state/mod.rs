//! 공유 작업 상태 저장소.
//!
//! 여러 서버 프로세스가 같은 상태를 읽고 쓰므로 모든 변경은 저장소 안에서
//! 직렬화된 read-modify-write로 수행합니다. 프로세스 메모리에 상태를 두지
//! 않습니다.

pub mod file;
pub mod memory;
pub mod postgres;

use alphanote_core::JobState;
use async_trait::async_trait;

use crate::Result;

pub use file::FileJobStateStore;
pub use memory::MemoryJobStateStore;
pub use postgres::PgJobStateStore;

/// 상태 변경 함수.
pub type JobMutation = Box<dyn FnOnce(&mut JobState) + Send + 'static>;

/// 작업 상태 저장소.
#[async_trait]
pub trait JobStateStore: Send + Sync {
    /// 현재 상태. 저장된 값이 없으면 기본값.
    async fn load(&self) -> Result<JobState>;

    /// 잠금 아래에서 읽고, `mutate`를 적용하고, 전체를 다시 씁니다.
    ///
    /// 변경 후 상태를 반환합니다.
    async fn update(&self, mutate: JobMutation) -> Result<JobState>;
}
