// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
	#[error("Git error: {0}")]
	Git(#[from] strata_server_git::GitError),

	#[error("Database error: {0}")]
	Db(#[from] strata_server_db::DbError),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Task join error: {0}")]
	Join(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
