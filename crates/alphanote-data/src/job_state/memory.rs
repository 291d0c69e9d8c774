//! 단일 프로세스용 작업 상태 저장소.

use alphanote_core::JobState;
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{JobMutation, JobStateStore};
use crate::Result;

#[derive(Default)]
pub struct MemoryJobStateStore {
    state: Mutex<JobState>,
}

impl MemoryJobStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStateStore for MemoryJobStateStore {
    async fn load(&self) -> Result<JobState> {
        Ok(self.state.lock().await.clone())
    }

    async fn update(&self, mutate: JobMutation) -> Result<JobState> {
        let mut state = self.state.lock().await;
        mutate(&mut state);
        Ok(state.clone())
    }
}
