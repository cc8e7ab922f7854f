// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::schema::ensure_schema;

/// Create an in-memory pool with the full schema applied.
///
/// The pool is capped at a single connection so every query sees the same
/// in-memory database.
pub async fn create_test_pool() -> SqlitePool {
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect(":memory:")
		.await
		.unwrap();
	ensure_schema(&pool).await.unwrap();
	pool
}
