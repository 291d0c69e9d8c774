//! PostgreSQL 기반 작업 상태 저장소.
//!
//! `sync_job_state`의 단일 행을 `SELECT ... FOR UPDATE`로 잠그고
//! 트랜잭션 안에서 읽기-변경-쓰기를 수행합니다.

use alphanote_core::JobState;
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::types::Json;

use super::{JobMutation, JobStateStore};
use crate::Result;

#[derive(Clone)]
pub struct PgJobStateStore {
    pool: PgPool,
}

impl PgJobStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStateStore for PgJobStateStore {
    async fn load(&self) -> Result<JobState> {
        let state: Option<Json<JobState>> =
            sqlx::query_scalar("SELECT state FROM sync_job_state WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(state.map(|Json(s)| s).unwrap_or_default())
    }

    async fn update(&self, mutate: JobMutation) -> Result<JobState> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO sync_job_state (id, state) VALUES (1, $1) ON CONFLICT (id) DO NOTHING",
        )
        .bind(Json(JobState::default()))
        .execute(&mut *tx)
        .await?;

        let Json(mut state): Json<JobState> =
            sqlx::query_scalar("SELECT state FROM sync_job_state WHERE id = 1 FOR UPDATE")
                .fetch_one(&mut *tx)
                .await?;

        mutate(&mut state);

        sqlx::query("UPDATE sync_job_state SET state = $1, updated_at = NOW() WHERE id = 1")
            .bind(Json(&state))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(state)
    }
}
