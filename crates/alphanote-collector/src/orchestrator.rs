//! 작업 오케스트레이터.
//!
//! 공유 작업 상태를 기준으로 한 번에 하나의 작업만 실행합니다.
//! 실행 중 출력은 몇 줄씩 모아서 상태의 로그 버퍼에 덧붙이고,
//! 출력에 `progress=N` 필드가 있으면 진행률도 함께 반영합니다.
//! 상태 소유권을 잃은 실행(중지 요청 이후)의 출력과 종료 기록은 버립니다.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use alphanote_core::{parse_progress, time, JobState};
use alphanote_data::JobStateStore;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{CollectorError, Result};

/// 크롤링 작업 인자.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlArgs {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    /// 대상 크리에이터 user_id 목록 (비어 있으면 활성 크리에이터 전체)
    #[serde(default)]
    pub creator_ids: Vec<String>,
    #[serde(default)]
    pub full: bool,
}

impl CrawlArgs {
    /// 날짜 형식을 검사합니다.
    pub fn validate(&self) -> Result<()> {
        for date in [&self.start_date, &self.end_date].into_iter().flatten() {
            time::parse_date(date)?;
        }
        Ok(())
    }
}

/// 오케스트레이터가 실행하는 작업 종류.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobTask {
    CrawlZhihu(CrawlArgs),
    TagArticles,
    TagArticlesAll,
    UpdateMarket,
}

impl JobTask {
    /// 상태에 기록되는 작업 이름.
    pub fn name(&self) -> &'static str {
        match self {
            JobTask::CrawlZhihu(_) => "crawl_zhihu",
            JobTask::TagArticles => "tag_articles",
            JobTask::TagArticlesAll => "tag_articles_all",
            JobTask::UpdateMarket => "update_market",
        }
    }

    /// 시작 시 로그 버퍼에 남기는 첫 줄.
    pub fn intro(&self) -> &'static str {
        match self {
            JobTask::CrawlZhihu(_) => "[INFO] Starting Zhihu crawler...\n",
            JobTask::TagArticles => "[INFO] Starting article tagging...\n",
            JobTask::TagArticlesAll => "[INFO] Re-tagging all articles...\n",
            JobTask::UpdateMarket => "[INFO] Starting market data update...\n",
        }
    }

    /// 작업을 실행하는 CLI 서브커맨드 인자.
    pub fn cli_args(&self) -> Vec<String> {
        match self {
            JobTask::CrawlZhihu(args) => {
                let mut out = vec!["crawl".to_string()];
                if let Some(start) = &args.start_date {
                    out.push("--start-date".to_string());
                    out.push(start.clone());
                }
                if let Some(end) = &args.end_date {
                    out.push("--end-date".to_string());
                    out.push(end.clone());
                }
                if !args.creator_ids.is_empty() {
                    out.push("--creator-ids".to_string());
                    out.push(args.creator_ids.join(","));
                }
                if args.full {
                    out.push("--full".to_string());
                }
                out
            }
            JobTask::TagArticles => vec!["tag".to_string()],
            JobTask::TagArticlesAll => vec!["tag".to_string(), "--all".to_string()],
            JobTask::UpdateMarket => vec!["update-market".to_string()],
        }
    }

    /// 이름으로 작업을 찾습니다. 크롤링 인자는 `crawl_zhihu`에만 쓰입니다.
    pub fn from_name(name: &str, crawl: CrawlArgs) -> Option<Self> {
        match name {
            "crawl_zhihu" => Some(JobTask::CrawlZhihu(crawl)),
            "tag_articles" => Some(JobTask::TagArticles),
            "tag_articles_all" => Some(JobTask::TagArticlesAll),
            "update_market" => Some(JobTask::UpdateMarket),
            _ => None,
        }
    }
}

/// 작업 시작 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StartOutcome {
    Accepted { run_id: Uuid, task: String },
    Rejected { current_task: Option<String> },
}

impl StartOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, StartOutcome::Accepted { .. })
    }
}

/// 실행 출력을 모아 작업 상태 로그에 덧붙입니다.
pub struct LogSink {
    store: Arc<dyn JobStateStore>,
    run_id: Uuid,
    flush_lines: usize,
    buffer: String,
    pending: usize,
    progress: Option<i32>,
    owner: bool,
}

impl LogSink {
    pub fn new(store: Arc<dyn JobStateStore>, run_id: Uuid, flush_lines: usize) -> Self {
        Self {
            store,
            run_id,
            flush_lines: flush_lines.max(1),
            buffer: String::new(),
            pending: 0,
            progress: None,
            owner: true,
        }
    }

    /// 한 줄을 버퍼에 넣고, 모인 줄 수가 기준에 닿으면 flush합니다.
    pub async fn line(&mut self, line: &str) {
        if !self.owner {
            return;
        }
        if let Some(progress) = parse_progress(line) {
            self.progress = Some(progress);
        }
        self.buffer.push_str(line);
        self.buffer.push('\n');
        self.pending += 1;
        if self.pending >= self.flush_lines {
            self.flush().await;
        }
    }

    /// 버퍼를 비웁니다. 실행이 아직 상태 소유자인지 반환합니다.
    pub async fn flush(&mut self) -> bool {
        self.pending = 0;
        if self.buffer.is_empty() || !self.owner {
            self.buffer.clear();
            return self.owner;
        }

        let chunk = std::mem::take(&mut self.buffer);
        let progress = self.progress.take();
        let run_id = self.run_id;
        let result = self
            .store
            .update(Box::new(move |state: &mut JobState| {
                if state.append_log_if_owner(run_id, &chunk) {
                    if let Some(progress) = progress {
                        state.set_progress_if_owner(run_id, progress);
                    }
                }
            }))
            .await;

        match result {
            Ok(state) => self.owner = state.is_owned_by(run_id),
            Err(e) => warn!(error = %e, "Failed to flush job log"),
        }
        self.owner
    }

    pub fn is_owner(&self) -> bool {
        self.owner
    }
}

/// 작업 실행기.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// 작업을 끝까지 실행하고 성공 여부를 반환합니다.
    async fn run(&self, task: &JobTask, log: &mut LogSink) -> Result<bool>;
}

/// 작업마다 collector 바이너리를 서브프로세스로 띄우는 실행기.
///
/// stdout과 stderr를 줄 단위로 합쳐 로그로 보냅니다.
pub struct ProcessRunner {
    program: PathBuf,
    base_args: Vec<String>,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }

    /// 현재 실행 파일을 작업 출력 모드(`--job-output`)로 실행합니다.
    pub fn current_exe() -> Result<Self> {
        let program = std::env::current_exe()?;
        Ok(Self::new(program, vec!["--job-output".to_string()]))
    }
}

#[async_trait]
impl JobRunner for ProcessRunner {
    async fn run(&self, task: &JobTask, log: &mut LogSink) -> Result<bool> {
        let mut child = Command::new(&self.program)
            .args(&self.base_args)
            .args(task.cli_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CollectorError::Job(format!("failed to spawn {}: {}", task.name(), e)))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_line_reader(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_line_reader(stderr, tx.clone()));
        }
        drop(tx);

        while let Some(line) = rx.recv().await {
            log.line(&line).await;
        }

        let status = child.wait().await?;
        for reader in readers {
            let _ = reader.await;
        }

        if !status.success() {
            log.line(&format!("[ERROR] Process exited with {}", status)).await;
        }
        Ok(status.success())
    }
}

fn spawn_line_reader<R>(reader: R, tx: mpsc::UnboundedSender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = tx.send(format!("[ERROR] Failed to read output: {}", e));
                    break;
                }
            }
        }
    })
}

/// 단일 실행 작업 오케스트레이터.
#[derive(Clone)]
pub struct JobOrchestrator {
    store: Arc<dyn JobStateStore>,
    runner: Arc<dyn JobRunner>,
    flush_lines: usize,
}

impl JobOrchestrator {
    pub fn new(store: Arc<dyn JobStateStore>, runner: Arc<dyn JobRunner>, flush_lines: usize) -> Self {
        Self {
            store,
            runner,
            flush_lines,
        }
    }

    /// 현재 작업 상태.
    pub async fn status(&self) -> Result<JobState> {
        Ok(self.store.load().await?)
    }

    /// 작업을 백그라운드로 시작합니다. 이미 실행 중이면 `Rejected`.
    pub async fn start(&self, task: JobTask) -> Result<StartOutcome> {
        let outcome = self.begin(&task).await?;
        if let StartOutcome::Accepted { run_id, .. } = &outcome {
            let this = self.clone();
            let run_id = *run_id;
            tokio::spawn(async move {
                this.execute(task, run_id).await;
            });
        }
        Ok(outcome)
    }

    /// 작업을 현재 태스크에서 끝까지 실행합니다.
    pub async fn run(&self, task: JobTask) -> Result<StartOutcome> {
        let outcome = self.begin(&task).await?;
        if let StartOutcome::Accepted { run_id, .. } = &outcome {
            self.execute(task, *run_id).await;
        }
        Ok(outcome)
    }

    /// 실행 플래그를 내립니다. 실행 중인 작업 자체는 끝까지 돌지만
    /// 이후 출력과 종료 기록은 상태에 반영되지 않습니다.
    pub async fn stop(&self) -> Result<JobState> {
        let state = self
            .store
            .update(Box::new(|state: &mut JobState| state.request_stop()))
            .await?;
        info!("Job stop requested");
        Ok(state)
    }

    async fn begin(&self, task: &JobTask) -> Result<StartOutcome> {
        let run_id = Uuid::new_v4();
        let name = task.name();
        let intro = task.intro();

        let state = self
            .store
            .update(Box::new(move |state: &mut JobState| {
                state.try_begin(name, run_id, intro);
            }))
            .await?;

        if state.is_owned_by(run_id) {
            info!(task = name, run_id = %run_id, "Job started");
            Ok(StartOutcome::Accepted {
                run_id,
                task: name.to_string(),
            })
        } else {
            warn!(
                task = name,
                current = ?state.current_task,
                "Job rejected: another task is running"
            );
            Ok(StartOutcome::Rejected {
                current_task: state.current_task,
            })
        }
    }

    async fn execute(&self, task: JobTask, run_id: Uuid) {
        let mut log = LogSink::new(self.store.clone(), run_id, self.flush_lines);

        let success = match self.runner.run(&task, &mut log).await {
            Ok(success) => success,
            Err(e) => {
                error!(task = task.name(), error = %e, "Job failed");
                log.line(&format!("[ERROR] Task failed: {}", e)).await;
                false
            }
        };
        log.flush().await;

        let result = self
            .store
            .update(Box::new(move |state: &mut JobState| {
                state.complete(run_id, success, Utc::now());
            }))
            .await;

        match result {
            Ok(_) if log.is_owner() => info!(task = task.name(), success, "Job finished"),
            Ok(_) => info!(task = task.name(), "Job finished after stop, result discarded"),
            Err(e) => error!(task = task.name(), error = %e, "Failed to record job completion"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alphanote_data::{JobMutation, MemoryJobStateStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct ScriptedRunner {
        lines: usize,
        success: bool,
    }

    #[async_trait]
    impl JobRunner for ScriptedRunner {
        async fn run(&self, _task: &JobTask, log: &mut LogSink) -> Result<bool> {
            for i in 0..self.lines {
                log.line(&format!("line {}", i)).await;
            }
            Ok(self.success)
        }
    }

    struct FailingRunner;

    #[async_trait]
    impl JobRunner for FailingRunner {
        async fn run(&self, _task: &JobTask, _log: &mut LogSink) -> Result<bool> {
            Err(CollectorError::Job("boom".to_string()))
        }
    }

    /// 해제될 때까지 대기한 뒤 한 줄을 남기는 실행기.
    struct GatedRunner {
        started: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl JobRunner for GatedRunner {
        async fn run(&self, _task: &JobTask, log: &mut LogSink) -> Result<bool> {
            self.started.notify_one();
            self.release.notified().await;
            log.line("late output").await;
            log.flush().await;
            Ok(true)
        }
    }

    /// 진행률 줄을 남기고 flush 직후의 상태를 기록하는 실행기.
    struct ProgressRunner {
        store: Arc<MemoryJobStateStore>,
        seen: std::sync::Mutex<Vec<Option<i32>>>,
    }

    #[async_trait]
    impl JobRunner for ProgressRunner {
        async fn run(&self, _task: &JobTask, log: &mut LogSink) -> Result<bool> {
            log.line("INFO alphanote_collector::modules::crawl: 진행 progress=33 url_token=foo").await;
            log.line("plain line").await;
            let state = self.store.load().await?;
            self.seen.lock().unwrap().push(state.progress);

            log.line("INFO 진행 progress=66").await;
            log.flush().await;
            let state = self.store.load().await?;
            self.seen.lock().unwrap().push(state.progress);
            Ok(true)
        }
    }

    #[derive(Default)]
    struct CountingStore {
        inner: MemoryJobStateStore,
        updates: AtomicUsize,
    }

    #[async_trait]
    impl JobStateStore for CountingStore {
        async fn load(&self) -> alphanote_data::Result<JobState> {
            self.inner.load().await
        }

        async fn update(&self, mutate: JobMutation) -> alphanote_data::Result<JobState> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            self.inner.update(mutate).await
        }
    }

    async fn wait_until_idle(orchestrator: &JobOrchestrator) -> JobState {
        for _ in 0..200 {
            let state = orchestrator.status().await.unwrap();
            if !state.is_running {
                return state;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("job did not finish");
    }

    #[test]
    fn test_task_names_and_args() {
        let crawl = JobTask::CrawlZhihu(CrawlArgs {
            start_date: Some("2024-01-01".to_string()),
            end_date: None,
            creator_ids: vec!["u1".to_string(), "u2".to_string()],
            full: true,
        });
        assert_eq!(crawl.name(), "crawl_zhihu");
        assert_eq!(
            crawl.cli_args(),
            vec!["crawl", "--start-date", "2024-01-01", "--creator-ids", "u1,u2", "--full"]
        );
        assert_eq!(JobTask::TagArticlesAll.cli_args(), vec!["tag", "--all"]);
        assert_eq!(
            JobTask::from_name("update_market", CrawlArgs::default()),
            Some(JobTask::UpdateMarket)
        );
        assert_eq!(JobTask::from_name("sync_everything", CrawlArgs::default()), None);
    }

    #[test]
    fn test_crawl_args_validation() {
        let mut args = CrawlArgs::default();
        assert!(args.validate().is_ok());
        args.end_date = Some("2024/01/01".to_string());
        assert!(args.validate().is_err());
    }

    #[tokio::test]
    async fn test_run_success_records_completion() {
        let store = Arc::new(MemoryJobStateStore::new());
        let orchestrator = JobOrchestrator::new(
            store.clone(),
            Arc::new(ScriptedRunner { lines: 3, success: true }),
            5,
        );

        let outcome = orchestrator.run(JobTask::TagArticles).await.unwrap();
        assert!(outcome.is_accepted());

        let state = store.load().await.unwrap();
        assert!(!state.is_running);
        assert_eq!(state.current_task, None);
        assert_eq!(state.progress, Some(100));
        assert!(state.last_sync_at.is_some());
        assert!(state.log_output.starts_with("[INFO] Starting article tagging...\n"));
        assert!(state.log_output.contains("line 0\nline 1\nline 2\n"));
        assert!(state.log_output.ends_with("[INFO] Task completed successfully!"));
    }

    #[tokio::test]
    async fn test_unsuccessful_run_keeps_last_sync() {
        let store = Arc::new(MemoryJobStateStore::new());
        let orchestrator = JobOrchestrator::new(
            store.clone(),
            Arc::new(ScriptedRunner { lines: 1, success: false }),
            5,
        );

        orchestrator.run(JobTask::UpdateMarket).await.unwrap();

        let state = store.load().await.unwrap();
        assert!(!state.is_running);
        assert_eq!(state.last_sync_at, None);
        assert!(state.log_output.contains("[WARN] Task completed with errors."));
    }

    #[tokio::test]
    async fn test_runner_error_is_logged() {
        let store = Arc::new(MemoryJobStateStore::new());
        let orchestrator = JobOrchestrator::new(store.clone(), Arc::new(FailingRunner), 5);

        orchestrator.run(JobTask::TagArticlesAll).await.unwrap();

        let state = store.load().await.unwrap();
        assert!(state.log_output.contains("[ERROR] Task failed: Job error: boom"));
        assert!(state.log_output.contains("[WARN] Task completed with errors."));
    }

    #[tokio::test]
    async fn test_log_is_flushed_in_chunks() {
        let store = Arc::new(CountingStore::default());
        let orchestrator = JobOrchestrator::new(
            store.clone(),
            Arc::new(ScriptedRunner { lines: 12, success: true }),
            5,
        );

        orchestrator.run(JobTask::TagArticles).await.unwrap();

        // begin + 5줄, 5줄, 남은 2줄 + complete
        assert_eq!(store.updates.load(Ordering::SeqCst), 5);
        let state = store.load().await.unwrap();
        assert!(state.log_output.contains("line 11\n"));
    }

    #[tokio::test]
    async fn test_progress_lines_update_state() {
        let store = Arc::new(MemoryJobStateStore::new());
        let runner = Arc::new(ProgressRunner {
            store: store.clone(),
            seen: std::sync::Mutex::new(Vec::new()),
        });
        let orchestrator = JobOrchestrator::new(store.clone(), runner.clone(), 2);

        orchestrator.run(JobTask::CrawlZhihu(CrawlArgs::default())).await.unwrap();

        assert_eq!(*runner.seen.lock().unwrap(), vec![Some(33), Some(66)]);
        let state = store.load().await.unwrap();
        assert_eq!(state.progress, Some(100));
        assert!(state.log_output.contains("progress=66\n"));
    }

    #[tokio::test]
    async fn test_start_rejected_while_running() {
        let store = Arc::new(MemoryJobStateStore::new());
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let orchestrator = JobOrchestrator::new(
            store.clone(),
            Arc::new(GatedRunner {
                started: started.clone(),
                release: release.clone(),
            }),
            5,
        );

        let first = orchestrator
            .start(JobTask::CrawlZhihu(CrawlArgs::default()))
            .await
            .unwrap();
        assert!(first.is_accepted());
        started.notified().await;

        let second = orchestrator.start(JobTask::TagArticles).await.unwrap();
        assert_eq!(
            second,
            StartOutcome::Rejected {
                current_task: Some("crawl_zhihu".to_string())
            }
        );
        let state = store.load().await.unwrap();
        assert_eq!(state.current_task.as_deref(), Some("crawl_zhihu"));

        release.notify_one();
        let state = wait_until_idle(&orchestrator).await;
        assert!(state.last_sync_at.is_some());
        assert!(state.log_output.contains("late output"));
    }

    #[tokio::test]
    async fn test_stopped_run_cannot_overwrite_state() {
        let store = Arc::new(MemoryJobStateStore::new());
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let orchestrator = JobOrchestrator::new(
            store.clone(),
            Arc::new(GatedRunner {
                started: started.clone(),
                release: release.clone(),
            }),
            1,
        );

        orchestrator.start(JobTask::UpdateMarket).await.unwrap();
        started.notified().await;

        let stopped = orchestrator.stop().await.unwrap();
        assert!(!stopped.is_running);
        assert!(stopped.log_output.ends_with("[WARN] Stop requested by user"));

        // 중지 직후 새 작업을 시작할 수 있다
        let next = JobOrchestrator::new(
            store.clone(),
            Arc::new(ScriptedRunner { lines: 0, success: false }),
            1,
        );
        release.notify_one();
        next.run(JobTask::TagArticles).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let state = store.load().await.unwrap();
        assert!(!state.is_running);
        assert_eq!(state.last_sync_at, None);
        assert!(!state.log_output.contains("late output"));
        assert!(state.log_output.contains("[INFO] Starting article tagging..."));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_merges_output() {
        let store = Arc::new(MemoryJobStateStore::new());
        let runner = ProcessRunner::new(
            "sh",
            vec!["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()],
        );
        let orchestrator = JobOrchestrator::new(store.clone(), Arc::new(runner), 1);

        orchestrator.run(JobTask::UpdateMarket).await.unwrap();

        let state = store.load().await.unwrap();
        assert!(state.log_output.contains("out\n"));
        assert!(state.log_output.contains("err\n"));
        assert!(state.log_output.contains("[ERROR] Process exited with"));
        assert!(state.log_output.contains("[WARN] Task completed with errors."));
    }
}
