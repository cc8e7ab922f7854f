// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum JobError {
	#[error("Database error: {0}")]
	Db(#[from] strata_server_db::DbError),

	#[error("{0}")]
	Failed(String),

	#[error("Unsupported job type: {0}")]
	Unsupported(String),
}

impl JobError {
	/// Wrap any engine error as a job failure, keeping its display text.
	pub fn failed(error: impl std::fmt::Display) -> Self {
		JobError::Failed(error.to_string())
	}
}

pub type Result<T> = std::result::Result<T, JobError>;
