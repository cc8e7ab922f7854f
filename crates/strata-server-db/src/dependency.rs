// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::Result;

/// One import edge between two files of the same repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDependency {
	pub id: i64,
	pub user_id: i64,
	pub repo_url: String,
	pub source_file: String,
	pub target_file: String,
	pub kind: String,
}

/// Edge about to be written by the extractor, before it has a row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFileDependency {
	pub source_file: String,
	pub target_file: String,
	pub kind: String,
}

impl NewFileDependency {
	pub fn import(source_file: impl Into<String>, target_file: impl Into<String>) -> Self {
		Self {
			source_file: source_file.into(),
			target_file: target_file.into(),
			kind: "import".to_string(),
		}
	}
}

#[derive(Clone)]
pub struct FileDependencyRepository {
	pool: SqlitePool,
}

impl FileDependencyRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Replace the whole edge set for `(user_id, repo_url)` in one transaction.
	///
	/// Delete-then-insert keeps concurrent graph builds last-writer-wins
	/// without ever exposing a mixed edge set to readers.
	#[tracing::instrument(skip(self, edges), fields(edge_count = edges.len()))]
	pub async fn replace_all(
		&self,
		user_id: i64,
		repo_url: &str,
		edges: &[NewFileDependency],
	) -> Result<usize> {
		let mut tx = self.pool.begin().await?;

		sqlx::query("DELETE FROM file_dependencies WHERE user_id = ? AND repo_url = ?")
			.bind(user_id)
			.bind(repo_url)
			.execute(&mut *tx)
			.await?;

		for edge in edges {
			sqlx::query(
				"INSERT INTO file_dependencies (user_id, repo_url, source_file, target_file, kind) \
				 VALUES (?, ?, ?, ?, ?)",
			)
			.bind(user_id)
			.bind(repo_url)
			.bind(&edge.source_file)
			.bind(&edge.target_file)
			.bind(&edge.kind)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;
		tracing::info!(edges = edges.len(), "replaced dependency edges");
		Ok(edges.len())
	}

	#[tracing::instrument(skip(self))]
	pub async fn list(&self, user_id: i64, repo_url: &str) -> Result<Vec<FileDependency>> {
		let rows = sqlx::query_as::<_, (i64, i64, String, String, String, String)>(
			"SELECT id, user_id, repo_url, source_file, target_file, kind \
			 FROM file_dependencies WHERE user_id = ? AND repo_url = ? ORDER BY id ASC",
		)
		.bind(user_id)
		.bind(repo_url)
		.fetch_all(&self.pool)
		.await?;

		Ok(
			rows
				.into_iter()
				.map(
					|(id, user_id, repo_url, source_file, target_file, kind)| FileDependency {
						id,
						user_id,
						repo_url,
						source_file,
						target_file,
						kind,
					},
				)
				.collect(),
		)
	}
}

#[async_trait]
pub trait DependencyStore: Send + Sync {
	async fn replace_all(
		&self,
		user_id: i64,
		repo_url: &str,
		edges: &[NewFileDependency],
	) -> Result<usize>;
	async fn list(&self, user_id: i64, repo_url: &str) -> Result<Vec<FileDependency>>;
}

#[async_trait]
impl DependencyStore for FileDependencyRepository {
	async fn replace_all(
		&self,
		user_id: i64,
		repo_url: &str,
		edges: &[NewFileDependency],
	) -> Result<usize> {
		self.replace_all(user_id, repo_url, edges).await
	}

	async fn list(&self, user_id: i64, repo_url: &str) -> Result<Vec<FileDependency>> {
		self.list(user_id, repo_url).await
	}
}
