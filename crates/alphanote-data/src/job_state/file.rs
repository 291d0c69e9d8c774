//! 파일 기반 작업 상태 저장소.
//!
//! 상태 파일 옆의 `.lock` 파일에 OS 배타 잠금을 걸고 읽기-변경-쓰기를
//! 수행합니다. 쓰기는 임시 파일 작성 후 rename으로 교체합니다.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use alphanote_core::JobState;
use async_trait::async_trait;
use fs4::fs_std::FileExt;
use tracing::warn;

use super::{JobMutation, JobStateStore};
use crate::{DataError, Result};

/// JSON 파일 작업 상태 저장소.
#[derive(Debug, Clone)]
pub struct FileJobStateStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileJobStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_lock(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.lock_path)?)
    }

    fn read_state(&self) -> Result<JobState> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(JobState::default()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(JobState::default());
        }
        match serde_json::from_str(&raw) {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Job state file is corrupt, starting from empty state");
                Ok(JobState::default())
            }
        }
    }

    fn write_state(&self, state: &JobState) -> Result<()> {
        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let mut file = File::create(&tmp_path)?;
        file.write_all(serde_json::to_string_pretty(state)?.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn load_blocking(&self) -> Result<JobState> {
        let lock = self.open_lock()?;
        FileExt::lock_shared(&lock)?;
        let state = self.read_state();
        FileExt::unlock(&lock)?;
        state
    }

    fn update_blocking(&self, mutate: JobMutation) -> Result<JobState> {
        let lock = self.open_lock()?;
        FileExt::lock_exclusive(&lock)?;
        let result = self.read_state().and_then(|mut state| {
            mutate(&mut state);
            self.write_state(&state)?;
            Ok(state)
        });
        FileExt::unlock(&lock)?;
        result
    }
}

#[async_trait]
impl JobStateStore for FileJobStateStore {
    async fn load(&self) -> Result<JobState> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.load_blocking())
            .await
            .map_err(|e| DataError::JobState(format!("job state task failed: {}", e)))?
    }

    async fn update(&self, mutate: JobMutation) -> Result<JobState> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.update_blocking(mutate))
            .await
            .map_err(|e| DataError::JobState(format!("job state task failed: {}", e)))?
    }
}
