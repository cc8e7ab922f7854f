// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{DbError, Result};

/// Longest error message persisted on a failed job.
const MAX_ERROR_MSG_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	Pending,
	Processing,
	Done,
	Failed,
}

impl JobStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			JobStatus::Pending => "pending",
			JobStatus::Processing => "processing",
			JobStatus::Done => "done",
			JobStatus::Failed => "failed",
		}
	}
}

impl std::str::FromStr for JobStatus {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"pending" => Ok(JobStatus::Pending),
			"processing" => Ok(JobStatus::Processing),
			"done" => Ok(JobStatus::Done),
			"failed" => Ok(JobStatus::Failed),
			_ => Err(format!("unknown job status: {s}")),
		}
	}
}

/// Closed set of work the worker pool knows how to dispatch.
///
/// Unknown `job_type` strings round-trip through `Unsupported` instead of
/// failing the row decode; dispatch rejects them with a typed error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
	ScipIndex,
	GraphBuild,
	GitMine,
	Unsupported(String),
}

impl JobKind {
	pub fn as_str(&self) -> &str {
		match self {
			JobKind::ScipIndex => "scip_index",
			JobKind::GraphBuild => "graph_build",
			JobKind::GitMine => "git_mine",
			JobKind::Unsupported(s) => s,
		}
	}

	pub fn parse(s: &str) -> JobKind {
		match s {
			"scip_index" => JobKind::ScipIndex,
			"graph_build" => JobKind::GraphBuild,
			"git_mine" => JobKind::GitMine,
			other => JobKind::Unsupported(other.to_string()),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexJob {
	pub id: i64,
	pub user_id: i64,
	pub repo_url: String,
	pub status: JobStatus,
	pub kind: JobKind,
	pub payload_path: Option<String>,
	pub payload: Option<String>,
	pub error_msg: Option<String>,
	pub created_at: DateTime<Utc>,
	pub started_at: Option<DateTime<Utc>>,
	pub finished_at: Option<DateTime<Utc>>,
}

type JobRow = (
	i64,
	i64,
	String,
	String,
	String,
	Option<String>,
	Option<String>,
	Option<String>,
	DateTime<Utc>,
	Option<DateTime<Utc>>,
	Option<DateTime<Utc>>,
);

const JOB_COLUMNS: &str = "id, user_id, repo_url, status, job_type, payload_path, payload, \
	error_msg, created_at, started_at, finished_at";

fn job_from_row(row: JobRow) -> Result<IndexJob> {
	let (
		id,
		user_id,
		repo_url,
		status,
		job_type,
		payload_path,
		payload,
		error_msg,
		created_at,
		started_at,
		finished_at,
	) = row;
	Ok(IndexJob {
		id,
		user_id,
		repo_url,
		status: status.parse().map_err(DbError::Internal)?,
		kind: JobKind::parse(&job_type),
		payload_path,
		payload,
		error_msg,
		created_at,
		started_at,
		finished_at,
	})
}

/// Keep the first line of a failure message, capped at a sane length.
fn truncate_error(msg: &str) -> String {
	let first_line = msg.lines().next().unwrap_or("");
	first_line.chars().take(MAX_ERROR_MSG_LEN).collect()
}

#[derive(Clone)]
pub struct JobRepository {
	pool: SqlitePool,
}

impl JobRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, payload, payload_path), fields(kind = %kind.as_str()))]
	pub async fn enqueue(
		&self,
		user_id: i64,
		repo_url: &str,
		kind: JobKind,
		payload: Option<&str>,
		payload_path: Option<&str>,
	) -> Result<i64> {
		if repo_url.is_empty() || repo_url.len() > 1000 {
			return Err(DbError::InvalidInput(
				"repo_url must be between 1 and 1000 characters".to_string(),
			));
		}
		if let JobKind::Unsupported(ref s) = kind {
			return Err(DbError::InvalidInput(format!("unsupported job type: {s}")));
		}

		let row: (i64,) = sqlx::query_as(
			r#"
			INSERT INTO index_jobs (user_id, repo_url, status, job_type, payload_path, payload, created_at)
			VALUES (?, ?, 'pending', ?, ?, ?, ?)
			RETURNING id
			"#,
		)
		.bind(user_id)
		.bind(repo_url)
		.bind(kind.as_str())
		.bind(payload_path)
		.bind(payload)
		.bind(Utc::now())
		.fetch_one(&self.pool)
		.await?;

		tracing::info!(job_id = row.0, "job enqueued");
		Ok(row.0)
	}

	/// Atomically claim the oldest pending job matching the kind filter.
	///
	/// The claim flips the row to `processing` and stamps `started_at` in
	/// the same statement that selects it, so two concurrent claimers can
	/// never observe the same pending row. An empty filter claims any kind.
	#[tracing::instrument(skip(self, kinds))]
	pub async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<IndexJob>> {
		let filter = if kinds.is_empty() {
			String::new()
		} else {
			let placeholders = vec!["?"; kinds.len()].join(", ");
			format!("AND job_type IN ({placeholders})")
		};

		let sql = format!(
			r#"
			UPDATE index_jobs
			SET status = 'processing', started_at = ?
			WHERE id = (
				SELECT id FROM index_jobs
				WHERE status = 'pending' {filter}
				ORDER BY created_at ASC, id ASC
				LIMIT 1
			)
			RETURNING {JOB_COLUMNS}
			"#
		);

		let mut query = sqlx::query_as::<_, JobRow>(&sql).bind(Utc::now());
		for kind in kinds {
			query = query.bind(kind.as_str().to_string());
		}

		let row = query.fetch_optional(&self.pool).await?;
		row.map(job_from_row).transpose()
	}

	/// Record the terminal status of a claimed job.
	#[tracing::instrument(skip(self, error_msg))]
	pub async fn complete(&self, id: i64, status: JobStatus, error_msg: Option<&str>) -> Result<()> {
		if !matches!(status, JobStatus::Done | JobStatus::Failed) {
			return Err(DbError::InvalidInput(format!(
				"complete() requires a terminal status, got {}",
				status.as_str()
			)));
		}

		let error_msg = error_msg.map(truncate_error);
		let result = sqlx::query(
			"UPDATE index_jobs SET status = ?, error_msg = ?, finished_at = ? WHERE id = ?",
		)
		.bind(status.as_str())
		.bind(error_msg)
		.bind(Utc::now())
		.bind(id)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("job {id}")));
		}
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get(&self, user_id: i64, id: i64) -> Result<Option<IndexJob>> {
		let sql = format!("SELECT {JOB_COLUMNS} FROM index_jobs WHERE user_id = ? AND id = ?");
		let row = sqlx::query_as::<_, JobRow>(&sql)
			.bind(user_id)
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;
		row.map(job_from_row).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_for_repo(
		&self,
		user_id: i64,
		repo_url: &str,
		limit: u32,
	) -> Result<Vec<IndexJob>> {
		let sql = format!(
			"SELECT {JOB_COLUMNS} FROM index_jobs \
			 WHERE user_id = ? AND repo_url = ? ORDER BY created_at DESC, id DESC LIMIT ?"
		);
		let rows = sqlx::query_as::<_, JobRow>(&sql)
			.bind(user_id)
			.bind(repo_url)
			.bind(limit as i64)
			.fetch_all(&self.pool)
			.await?;
		rows.into_iter().map(job_from_row).collect()
	}

	/// Return rows stuck in `processing` since before the cutoff to `pending`.
	///
	/// Run once at worker startup: a claim only outlives the claiming
	/// process in the database, so a crash mid-job leaves the row
	/// `processing` until this sweep.
	#[tracing::instrument(skip(self))]
	pub async fn release_stale(&self, older_than: DateTime<Utc>) -> Result<u64> {
		let result = sqlx::query(
			"UPDATE index_jobs SET status = 'pending', started_at = NULL \
			 WHERE status = 'processing' AND started_at < ?",
		)
		.bind(older_than)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() > 0 {
			tracing::warn!(released = result.rows_affected(), "released stale jobs");
		}
		Ok(result.rows_affected())
	}

	/// Attach result metadata to a job, e.g. `{"edges": 42}` after a graph build.
	#[tracing::instrument(skip(self, payload))]
	pub async fn set_result_payload(&self, id: i64, payload: &str) -> Result<()> {
		let result = sqlx::query("UPDATE index_jobs SET payload = ? WHERE id = ?")
			.bind(payload)
			.bind(id)
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("job {id}")));
		}
		Ok(())
	}
}

#[async_trait]
pub trait JobStore: Send + Sync {
	async fn enqueue(
		&self,
		user_id: i64,
		repo_url: &str,
		kind: JobKind,
		payload: Option<&str>,
		payload_path: Option<&str>,
	) -> Result<i64>;
	async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<IndexJob>>;
	async fn complete(&self, id: i64, status: JobStatus, error_msg: Option<&str>) -> Result<()>;
	async fn get(&self, user_id: i64, id: i64) -> Result<Option<IndexJob>>;
	async fn release_stale(&self, older_than: DateTime<Utc>) -> Result<u64>;
	async fn set_result_payload(&self, id: i64, payload: &str) -> Result<()>;
}

#[async_trait]
impl JobStore for JobRepository {
	async fn enqueue(
		&self,
		user_id: i64,
		repo_url: &str,
		kind: JobKind,
		payload: Option<&str>,
		payload_path: Option<&str>,
	) -> Result<i64> {
		self
			.enqueue(user_id, repo_url, kind, payload, payload_path)
			.await
	}

	async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<IndexJob>> {
		self.claim_next(kinds).await
	}

	async fn complete(&self, id: i64, status: JobStatus, error_msg: Option<&str>) -> Result<()> {
		self.complete(id, status, error_msg).await
	}

	async fn get(&self, user_id: i64, id: i64) -> Result<Option<IndexJob>> {
		self.get(user_id, id).await
	}

	async fn release_stale(&self, older_than: DateTime<Utc>) -> Result<u64> {
		self.release_stale(older_than).await
	}

	async fn set_result_payload(&self, id: i64, payload: &str) -> Result<()> {
		self.set_result_payload(id, payload).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;

	#[tokio::test]
	async fn test_enqueue_claim_complete_lifecycle() {
		let pool = create_test_pool().await;
		let repo = JobRepository::new(pool);

		let id = repo
			.enqueue(1, "https://example.com/r.git", JobKind::GraphBuild, None, None)
			.await
			.unwrap();

		let claimed = repo.claim_next(&[]).await.unwrap().unwrap();
		assert_eq!(claimed.id, id);
		assert_eq!(claimed.status, JobStatus::Processing);
		assert_eq!(claimed.kind, JobKind::GraphBuild);
		assert!(claimed.started_at.is_some());

		repo.complete(id, JobStatus::Done, None).await.unwrap();

		let done = repo.get(1, id).await.unwrap().unwrap();
		assert_eq!(done.status, JobStatus::Done);
		assert!(done.error_msg.is_none());
		assert!(done.finished_at.unwrap() >= done.started_at.unwrap());
		assert!(done.started_at.unwrap() >= done.created_at);
	}

	#[tokio::test]
	async fn test_claim_is_fifo_by_created_at() {
		let pool = create_test_pool().await;
		let repo = JobRepository::new(pool);

		let first = repo
			.enqueue(1, "https://example.com/a.git", JobKind::GitMine, None, None)
			.await
			.unwrap();
		let second = repo
			.enqueue(1, "https://example.com/b.git", JobKind::GitMine, None, None)
			.await
			.unwrap();

		assert_eq!(repo.claim_next(&[]).await.unwrap().unwrap().id, first);
		assert_eq!(repo.claim_next(&[]).await.unwrap().unwrap().id, second);
		assert!(repo.claim_next(&[]).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_claim_respects_kind_filter() {
		let pool = create_test_pool().await;
		let repo = JobRepository::new(pool);

		repo
			.enqueue(1, "https://example.com/a.git", JobKind::GitMine, None, None)
			.await
			.unwrap();
		let graph_id = repo
			.enqueue(1, "https://example.com/b.git", JobKind::GraphBuild, None, None)
			.await
			.unwrap();

		let claimed = repo.claim_next(&[JobKind::GraphBuild]).await.unwrap().unwrap();
		assert_eq!(claimed.id, graph_id);

		assert!(repo.claim_next(&[JobKind::GraphBuild]).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_concurrent_claims_return_single_winner() {
		let pool = create_test_pool().await;
		let repo = std::sync::Arc::new(JobRepository::new(pool));

		repo
			.enqueue(1, "https://example.com/r.git", JobKind::ScipIndex, None, None)
			.await
			.unwrap();

		let a = {
			let repo = repo.clone();
			tokio::spawn(async move { repo.claim_next(&[]).await.unwrap() })
		};
		let b = {
			let repo = repo.clone();
			tokio::spawn(async move { repo.claim_next(&[]).await.unwrap() })
		};

		let results = [a.await.unwrap(), b.await.unwrap()];
		let winners = results.iter().filter(|r| r.is_some()).count();
		assert_eq!(winners, 1);
	}

	#[tokio::test]
	async fn test_failed_job_keeps_first_line_of_error() {
		let pool = create_test_pool().await;
		let repo = JobRepository::new(pool);

		let id = repo
			.enqueue(1, "https://example.com/r.git", JobKind::GitMine, None, None)
			.await
			.unwrap();
		repo.claim_next(&[]).await.unwrap().unwrap();
		repo
			.complete(id, JobStatus::Failed, Some("clone failed: auth\nstack line 1\nstack line 2"))
			.await
			.unwrap();

		let job = repo.get(1, id).await.unwrap().unwrap();
		assert_eq!(job.status, JobStatus::Failed);
		assert_eq!(job.error_msg.as_deref(), Some("clone failed: auth"));
		assert!(job.finished_at.is_some());
	}

	#[tokio::test]
	async fn test_error_message_is_capped() {
		let long = "x".repeat(2000);
		assert_eq!(truncate_error(&long).len(), 500);
	}

	#[tokio::test]
	async fn test_enqueue_rejects_invalid_input() {
		let pool = create_test_pool().await;
		let repo = JobRepository::new(pool);

		let empty = repo.enqueue(1, "", JobKind::GitMine, None, None).await;
		assert!(matches!(empty, Err(DbError::InvalidInput(_))));

		let oversized = "https://example.com/".to_string() + &"a".repeat(1000);
		let too_long = repo.enqueue(1, &oversized, JobKind::GitMine, None, None).await;
		assert!(matches!(too_long, Err(DbError::InvalidInput(_))));

		let unknown = repo
			.enqueue(
				1,
				"https://example.com/r.git",
				JobKind::Unsupported("reticulate".to_string()),
				None,
				None,
			)
			.await;
		assert!(matches!(unknown, Err(DbError::InvalidInput(_))));
	}

	#[tokio::test]
	async fn test_get_is_scoped_by_user() {
		let pool = create_test_pool().await;
		let repo = JobRepository::new(pool);

		let id = repo
			.enqueue(1, "https://example.com/r.git", JobKind::GitMine, None, None)
			.await
			.unwrap();

		assert!(repo.get(1, id).await.unwrap().is_some());
		assert!(repo.get(2, id).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_release_stale_returns_old_processing_rows() {
		let pool = create_test_pool().await;
		let repo = JobRepository::new(pool.clone());

		let id = repo
			.enqueue(1, "https://example.com/r.git", JobKind::GitMine, None, None)
			.await
			.unwrap();
		repo.claim_next(&[]).await.unwrap().unwrap();

		// Backdate the claim past the stale threshold.
		sqlx::query("UPDATE index_jobs SET started_at = ? WHERE id = ?")
			.bind(Utc::now() - chrono::Duration::hours(1))
			.bind(id)
			.execute(&pool)
			.await
			.unwrap();

		let released = repo
			.release_stale(Utc::now() - chrono::Duration::minutes(30))
			.await
			.unwrap();
		assert_eq!(released, 1);

		let job = repo.get(1, id).await.unwrap().unwrap();
		assert_eq!(job.status, JobStatus::Pending);
		assert!(job.started_at.is_none());
	}

	#[tokio::test]
	async fn test_release_stale_keeps_fresh_claims() {
		let pool = create_test_pool().await;
		let repo = JobRepository::new(pool);

		repo
			.enqueue(1, "https://example.com/r.git", JobKind::GitMine, None, None)
			.await
			.unwrap();
		repo.claim_next(&[]).await.unwrap().unwrap();

		let released = repo
			.release_stale(Utc::now() - chrono::Duration::minutes(30))
			.await
			.unwrap();
		assert_eq!(released, 0);
	}

	#[tokio::test]
	async fn test_set_result_payload() {
		let pool = create_test_pool().await;
		let repo = JobRepository::new(pool);

		let id = repo
			.enqueue(1, "https://example.com/r.git", JobKind::GraphBuild, None, None)
			.await
			.unwrap();
		repo.set_result_payload(id, r#"{"edges": 12}"#).await.unwrap();

		let job = repo.get(1, id).await.unwrap().unwrap();
		assert_eq!(job.payload.as_deref(), Some(r#"{"edges": 12}"#));
	}

	#[tokio::test]
	async fn test_unknown_job_type_decodes_as_unsupported() {
		let pool = create_test_pool().await;
		let repo = JobRepository::new(pool.clone());

		sqlx::query(
			"INSERT INTO index_jobs (user_id, repo_url, status, job_type, created_at) \
			 VALUES (1, 'https://example.com/r.git', 'pending', 'reticulate', ?)",
		)
		.bind(Utc::now())
		.execute(&pool)
		.await
		.unwrap();

		let job = repo.claim_next(&[]).await.unwrap().unwrap();
		assert_eq!(job.kind, JobKind::Unsupported("reticulate".to_string()));
	}
}
