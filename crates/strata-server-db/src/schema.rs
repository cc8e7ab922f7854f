// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Idempotent schema setup, run once at process startup.

use sqlx::SqlitePool;

use crate::error::Result;

const STATEMENTS: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS index_jobs (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		user_id INTEGER NOT NULL,
		repo_url TEXT NOT NULL CHECK (length(repo_url) <= 1000),
		status TEXT NOT NULL DEFAULT 'pending'
			CHECK (status IN ('pending', 'processing', 'done', 'failed')),
		job_type TEXT NOT NULL,
		payload_path TEXT,
		payload TEXT,
		error_msg TEXT,
		created_at TEXT NOT NULL,
		started_at TEXT,
		finished_at TEXT
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_index_jobs_claim ON index_jobs (status, created_at)",
	r#"
	CREATE TABLE IF NOT EXISTS file_dependencies (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		user_id INTEGER NOT NULL,
		repo_url TEXT NOT NULL,
		source_file TEXT NOT NULL,
		target_file TEXT NOT NULL,
		kind TEXT NOT NULL DEFAULT 'import'
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_file_dependencies_scope ON file_dependencies (user_id, repo_url)",
	r#"
	CREATE TABLE IF NOT EXISTS commit_stats (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		user_id INTEGER NOT NULL,
		repo_url TEXT NOT NULL,
		commit_hash TEXT NOT NULL,
		author_email TEXT NOT NULL,
		message TEXT NOT NULL,
		committed_at TEXT NOT NULL,
		files_changed INTEGER NOT NULL DEFAULT 0,
		insertions INTEGER NOT NULL DEFAULT 0,
		deletions INTEGER NOT NULL DEFAULT 0,
		recorded_at TEXT NOT NULL,
		UNIQUE (user_id, repo_url, commit_hash)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS file_churn_stats (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		user_id INTEGER NOT NULL,
		repo_url TEXT NOT NULL,
		file_path TEXT NOT NULL,
		week_start TEXT NOT NULL,
		lines_added INTEGER NOT NULL DEFAULT 0,
		lines_deleted INTEGER NOT NULL DEFAULT 0,
		commit_count INTEGER NOT NULL DEFAULT 0,
		churn_rate REAL NOT NULL DEFAULT 0,
		UNIQUE (user_id, repo_url, file_path, week_start)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS scip_documents (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		user_id INTEGER NOT NULL,
		repo_url TEXT NOT NULL,
		relative_path TEXT NOT NULL,
		language TEXT,
		indexed_at TEXT NOT NULL,
		UNIQUE (user_id, repo_url, relative_path)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS scip_occurrences (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		document_id INTEGER NOT NULL REFERENCES scip_documents(id) ON DELETE CASCADE,
		symbol TEXT NOT NULL,
		start_line INTEGER NOT NULL,
		start_char INTEGER NOT NULL,
		end_line INTEGER NOT NULL,
		end_char INTEGER NOT NULL,
		role_flags INTEGER NOT NULL DEFAULT 0
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_scip_occurrences_document ON scip_occurrences (document_id)",
	"CREATE INDEX IF NOT EXISTS idx_scip_occurrences_symbol ON scip_occurrences (symbol)",
	r#"
	CREATE TABLE IF NOT EXISTS scip_symbols (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		user_id INTEGER NOT NULL,
		repo_url TEXT NOT NULL,
		symbol TEXT NOT NULL,
		display_name TEXT,
		signature_doc TEXT,
		documentation TEXT,
		UNIQUE (user_id, repo_url, symbol)
	)
	"#,
];

/// Create every table and index this crate relies on, if missing.
#[tracing::instrument(skip(pool))]
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
	for statement in STATEMENTS {
		sqlx::query(statement).execute(pool).await?;
	}
	tracing::debug!("schema ensured");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_ensure_schema_is_idempotent() {
		let pool = SqlitePool::connect(":memory:").await.unwrap();
		ensure_schema(&pool).await.unwrap();
		ensure_schema(&pool).await.unwrap();

		let tables: Vec<(String,)> = sqlx::query_as(
			"SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
		)
		.fetch_all(&pool)
		.await
		.unwrap();

		let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
		assert!(names.contains(&"index_jobs"));
		assert!(names.contains(&"file_dependencies"));
		assert!(names.contains(&"commit_stats"));
		assert!(names.contains(&"file_churn_stats"));
		assert!(names.contains(&"scip_documents"));
		assert!(names.contains(&"scip_occurrences"));
		assert!(names.contains(&"scip_symbols"));
	}
}
