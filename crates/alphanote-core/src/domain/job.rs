//! 공유 작업 상태.
//!
//! 여러 서버 프로세스가 같은 레코드를 읽고 쓰므로, 모든 변경은 저장소의
//! 읽기-수정-쓰기 사이클 안에서 이 타입의 메서드로만 이루어집니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 로그 버퍼 최대 크기 (바이트). 넘치면 앞부분부터 버립니다.
pub const MAX_LOG_BYTES: usize = 64 * 1024;

/// 작업 출력에서 진행률을 나타내는 로그 필드 (`progress=40`).
pub const PROGRESS_FIELD: &str = "progress";

/// 단일 작업 상태 레코드.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobState {
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub current_task: Option<String>,
    #[serde(default)]
    pub progress: Option<i32>,
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub log_output: String,
    /// 현재 실행 소유자. 중지 후 늦게 끝난 작업이 새 작업 상태를 덮어쓰지 않게 한다.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
}

impl JobState {
    /// 작업 시작을 시도합니다. 이미 실행 중이면 아무것도 바꾸지 않고 `false`.
    pub fn try_begin(&mut self, task: &str, run_id: Uuid, intro: &str) -> bool {
        if self.is_running {
            return false;
        }
        self.is_running = true;
        self.current_task = Some(task.to_string());
        self.progress = Some(0);
        self.run_id = Some(run_id);
        self.log_output.clear();
        self.append_log(intro);
        true
    }

    /// 해당 실행이 아직 상태의 소유자인지.
    pub fn is_owned_by(&self, run_id: Uuid) -> bool {
        self.is_running && self.run_id == Some(run_id)
    }

    /// 로그를 덧붙입니다.
    pub fn append_log(&mut self, chunk: &str) {
        self.log_output.push_str(chunk);
        trim_front(&mut self.log_output, MAX_LOG_BYTES);
    }

    /// 소유자일 때만 로그를 덧붙이고, 소유 여부를 반환합니다.
    pub fn append_log_if_owner(&mut self, run_id: Uuid, chunk: &str) -> bool {
        if !self.is_owned_by(run_id) {
            return false;
        }
        self.append_log(chunk);
        true
    }

    /// 진행률을 갱신합니다 (0..=100).
    pub fn set_progress_if_owner(&mut self, run_id: Uuid, progress: i32) -> bool {
        if !self.is_owned_by(run_id) {
            return false;
        }
        self.progress = Some(progress.clamp(0, 100));
        true
    }

    /// 작업 종료를 기록합니다. 소유자가 아니면 무시하고 `false`.
    pub fn complete(&mut self, run_id: Uuid, success: bool, now: DateTime<Utc>) -> bool {
        if !self.is_owned_by(run_id) {
            return false;
        }
        if success {
            self.append_log("\n[INFO] Task completed successfully!");
            self.last_sync_at = Some(now);
        } else {
            self.append_log("\n[WARN] Task completed with errors.");
        }
        self.progress = Some(100);
        self.release();
        true
    }

    /// 중지 요청. 실행 플래그만 내리며 실행 중인 작업을 강제로 끊지 않습니다.
    pub fn request_stop(&mut self) {
        self.append_log("\n[WARN] Stop requested by user");
        self.release();
    }

    fn release(&mut self) {
        self.is_running = false;
        self.current_task = None;
        self.run_id = None;
    }
}

/// 작업 출력 한 줄에서 `progress=N` 필드를 찾습니다.
pub fn parse_progress(line: &str) -> Option<i32> {
    line.split_whitespace().find_map(|token| {
        token
            .strip_prefix(PROGRESS_FIELD)?
            .strip_prefix('=')?
            .parse::<i32>()
            .ok()
    })
}

/// 처리 개수를 일정 간격의 진행률로 바꿉니다.
///
/// 100%는 보고하지 않습니다. 완료 기록이 진행률을 100으로 올립니다.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: usize,
    done: usize,
    step: i32,
    reported: i32,
}

impl ProgressTracker {
    /// 10% 간격.
    pub fn new(total: usize) -> Self {
        Self::with_step(total, 10)
    }

    pub fn with_step(total: usize, step: i32) -> Self {
        Self {
            total,
            done: 0,
            step: step.clamp(1, 100),
            reported: 0,
        }
    }

    /// 하나를 처리했음을 기록합니다. 다음 간격을 넘었으면 새 진행률.
    pub fn advance(&mut self) -> Option<i32> {
        if self.total == 0 {
            return None;
        }
        self.done = (self.done + 1).min(self.total);
        let percent = (self.done * 100 / self.total) as i32;
        if percent >= 100 || percent / self.step <= self.reported / self.step {
            return None;
        }
        self.reported = percent;
        Some(percent)
    }
}

fn trim_front(buffer: &mut String, max_bytes: usize) {
    if buffer.len() <= max_bytes {
        return;
    }
    let mut cut = buffer.len() - max_bytes;
    while !buffer.is_char_boundary(cut) {
        cut += 1;
    }
    buffer.drain(..cut);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_begin_rejected_while_running() {
        let mut state = JobState::default();
        let first = Uuid::new_v4();
        assert!(state.try_begin("crawl_zhihu", first, "[INFO] start\n"));
        assert_eq!(state.progress, Some(0));

        assert!(!state.try_begin("tag_articles", Uuid::new_v4(), "x"));
        assert_eq!(state.current_task.as_deref(), Some("crawl_zhihu"));
        assert_eq!(state.run_id, Some(first));
    }

    #[test]
    fn test_complete_success_sets_last_sync() {
        let mut state = JobState::default();
        let run = Uuid::new_v4();
        state.try_begin("tag_articles", run, "");
        let now = Utc::now();

        assert!(state.complete(run, true, now));
        assert!(!state.is_running);
        assert_eq!(state.current_task, None);
        assert_eq!(state.progress, Some(100));
        assert_eq!(state.last_sync_at, Some(now));
        assert!(state.log_output.contains("completed successfully"));
    }

    #[test]
    fn test_complete_failure_keeps_last_sync() {
        let mut state = JobState::default();
        let run = Uuid::new_v4();
        state.try_begin("update_market", run, "");

        assert!(state.complete(run, false, Utc::now()));
        assert_eq!(state.last_sync_at, None);
        assert!(state.log_output.contains("[WARN]"));
    }

    #[test]
    fn test_stale_run_cannot_touch_new_run() {
        let mut state = JobState::default();
        let old = Uuid::new_v4();
        state.try_begin("crawl_zhihu", old, "");
        state.request_stop();

        let new = Uuid::new_v4();
        assert!(state.try_begin("tag_articles", new, ""));
        assert!(!state.append_log_if_owner(old, "late output"));
        assert!(!state.complete(old, true, Utc::now()));
        assert!(state.is_running);
        assert_eq!(state.current_task.as_deref(), Some("tag_articles"));
        assert!(!state.log_output.contains("late output"));
    }

    #[test]
    fn test_progress_only_for_owner() {
        let mut state = JobState::default();
        let run = Uuid::new_v4();
        state.try_begin("crawl_zhihu", run, "");

        assert!(state.set_progress_if_owner(run, 140));
        assert_eq!(state.progress, Some(100));
        assert!(!state.set_progress_if_owner(Uuid::new_v4(), 10));
        assert_eq!(state.progress, Some(100));
    }

    #[test]
    fn test_parse_progress() {
        assert_eq!(
            parse_progress("2024-01-01T00:00:00Z  INFO alphanote_collector: 크리에이터 진행 progress=40 url_token=foo"),
            Some(40)
        );
        assert_eq!(parse_progress("[INFO] step progress=7"), Some(7));
        assert_eq!(parse_progress("progress: 40"), None);
        assert_eq!(parse_progress("in_progress=3"), None);
        assert_eq!(parse_progress("progress=abc"), None);
    }

    #[test]
    fn test_progress_tracker_steps() {
        let mut tracker = ProgressTracker::new(3);
        assert_eq!(tracker.advance(), Some(33));
        assert_eq!(tracker.advance(), Some(66));
        assert_eq!(tracker.advance(), None);
        assert_eq!(tracker.advance(), None);

        let mut tracker = ProgressTracker::new(40);
        let reported: Vec<i32> = (0..40).filter_map(|_| tracker.advance()).collect();
        assert_eq!(reported, vec![10, 20, 30, 40, 50, 60, 70, 80, 90]);

        assert_eq!(ProgressTracker::new(0).advance(), None);
    }

    #[test]
    fn test_deserialize_missing_fields() {
        let state: JobState = serde_json::from_str(r#"{"is_running": true}"#).unwrap();
        assert!(state.is_running);
        assert_eq!(state.log_output, "");
        assert_eq!(state.run_id, None);
    }

    proptest! {
        #[test]
        fn prop_log_buffer_is_bounded(chunks in prop::collection::vec(".{0,4096}", 0..64)) {
            let mut state = JobState::default();
            for chunk in &chunks {
                state.append_log(chunk);
            }
            prop_assert!(state.log_output.len() <= MAX_LOG_BYTES);
            let joined: String = chunks.concat();
            prop_assert!(joined.ends_with(&state.log_output));
        }
    }
}
