// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
	#[error("Database error: {0}")]
	Db(#[from] strata_server_db::DbError),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
