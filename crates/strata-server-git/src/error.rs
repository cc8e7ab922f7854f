// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum GitError {
	#[error("Clone failed: {0}")]
	Clone(String),

	#[error("Repository not cached: {0}")]
	NotCached(String),

	#[error("Git error: {0}")]
	Git(#[from] git2::Error),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Database error: {0}")]
	Db(#[from] strata_server_db::DbError),

	#[error("Task join error: {0}")]
	Join(String),
}

pub type Result<T> = std::result::Result<T, GitError>;
