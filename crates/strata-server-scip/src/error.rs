// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum ScipError {
	#[error("Truncated index data")]
	Truncated,

	#[error("Malformed index: {0}")]
	Malformed(String),

	#[error("Unsupported wire type: {0}")]
	UnsupportedWireType(u8),

	#[error("No document in the index could be ingested")]
	NoDocuments,

	#[error("Database error: {0}")]
	Db(#[from] strata_server_db::DbError),
}

pub type Result<T> = std::result::Result<T, ScipError>;
