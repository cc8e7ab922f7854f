// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::Result;

/// Raw per-commit summary, written once and never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitStat {
	pub id: i64,
	pub user_id: i64,
	pub repo_url: String,
	pub commit_hash: String,
	pub author_email: String,
	pub message: String,
	pub committed_at: DateTime<Utc>,
	pub files_changed: i64,
	pub insertions: i64,
	pub deletions: i64,
	pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCommitStat {
	pub commit_hash: String,
	pub author_email: String,
	pub message: String,
	pub committed_at: DateTime<Utc>,
	pub files_changed: i64,
	pub insertions: i64,
	pub deletions: i64,
}

#[derive(Clone)]
pub struct CommitStatRepository {
	pool: SqlitePool,
}

impl CommitStatRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self))]
	pub async fn exists(&self, user_id: i64, repo_url: &str, commit_hash: &str) -> Result<bool> {
		let row: (i64,) = sqlx::query_as(
			"SELECT COUNT(*) FROM commit_stats WHERE user_id = ? AND repo_url = ? AND commit_hash = ?",
		)
		.bind(user_id)
		.bind(repo_url)
		.bind(commit_hash)
		.fetch_one(&self.pool)
		.await?;
		Ok(row.0 > 0)
	}

	/// Insert a commit summary once; a hash already recorded for this
	/// `(user_id, repo_url)` is left untouched.
	#[tracing::instrument(skip(self, stat), fields(commit = %stat.commit_hash))]
	pub async fn insert(&self, user_id: i64, repo_url: &str, stat: &NewCommitStat) -> Result<bool> {
		let result = sqlx::query(
			r#"
			INSERT OR IGNORE INTO commit_stats
				(user_id, repo_url, commit_hash, author_email, message, committed_at,
				 files_changed, insertions, deletions, recorded_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(user_id)
		.bind(repo_url)
		.bind(&stat.commit_hash)
		.bind(&stat.author_email)
		.bind(&stat.message)
		.bind(stat.committed_at)
		.bind(stat.files_changed)
		.bind(stat.insertions)
		.bind(stat.deletions)
		.bind(Utc::now())
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_recent(
		&self,
		user_id: i64,
		repo_url: &str,
		limit: u32,
	) -> Result<Vec<CommitStat>> {
		let rows = sqlx::query_as::<
			_,
			(
				i64,
				i64,
				String,
				String,
				String,
				String,
				DateTime<Utc>,
				i64,
				i64,
				i64,
				DateTime<Utc>,
			),
		>(
			"SELECT id, user_id, repo_url, commit_hash, author_email, message, committed_at, \
			 files_changed, insertions, deletions, recorded_at \
			 FROM commit_stats WHERE user_id = ? AND repo_url = ? \
			 ORDER BY committed_at DESC LIMIT ?",
		)
		.bind(user_id)
		.bind(repo_url)
		.bind(limit as i64)
		.fetch_all(&self.pool)
		.await?;

		Ok(
			rows
				.into_iter()
				.map(
					|(
						id,
						user_id,
						repo_url,
						commit_hash,
						author_email,
						message,
						committed_at,
						files_changed,
						insertions,
						deletions,
						recorded_at,
					)| CommitStat {
						id,
						user_id,
						repo_url,
						commit_hash,
						author_email,
						message,
						committed_at,
						files_changed,
						insertions,
						deletions,
						recorded_at,
					},
				)
				.collect(),
		)
	}
}

#[async_trait]
pub trait CommitStore: Send + Sync {
	async fn exists(&self, user_id: i64, repo_url: &str, commit_hash: &str) -> Result<bool>;
	async fn insert(&self, user_id: i64, repo_url: &str, stat: &NewCommitStat) -> Result<bool>;
}

#[async_trait]
impl CommitStore for CommitStatRepository {
	async fn exists(&self, user_id: i64, repo_url: &str, commit_hash: &str) -> Result<bool> {
		self.exists(user_id, repo_url, commit_hash).await
	}

	async fn insert(&self, user_id: i64, repo_url: &str, stat: &NewCommitStat) -> Result<bool> {
		self.insert(user_id, repo_url, stat).await
	}
}
