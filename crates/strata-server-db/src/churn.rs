// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::Result;

/// Weekly churn bucket for one file. `week_start` is the Monday of the ISO
/// week, and `churn_rate` is the floor-bounded percentage heuristic:
/// `round((lines_added + lines_deleted) * 100 / max(lines_added, 50), 2)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChurnStat {
	pub id: i64,
	pub user_id: i64,
	pub repo_url: String,
	pub file_path: String,
	pub week_start: NaiveDate,
	pub lines_added: i64,
	pub lines_deleted: i64,
	pub commit_count: i64,
	pub churn_rate: f64,
}

type ChurnRow = (i64, i64, String, String, NaiveDate, i64, i64, i64, f64);

const CHURN_COLUMNS: &str = "id, user_id, repo_url, file_path, week_start, lines_added, \
	lines_deleted, commit_count, churn_rate";

fn churn_from_row(row: ChurnRow) -> FileChurnStat {
	let (id, user_id, repo_url, file_path, week_start, lines_added, lines_deleted, commit_count, churn_rate) =
		row;
	FileChurnStat {
		id,
		user_id,
		repo_url,
		file_path,
		week_start,
		lines_added,
		lines_deleted,
		commit_count,
		churn_rate,
	}
}

#[derive(Clone)]
pub struct FileChurnStatRepository {
	pool: SqlitePool,
}

impl FileChurnStatRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Add a bucket's deltas to the stored weekly row, creating it if absent.
	///
	/// The whole accumulate-and-recompute runs as one statement, so the
	/// operation is commutative: feeding the same stream in two chunks lands
	/// on the same stored totals as a single pass.
	#[tracing::instrument(skip(self))]
	pub async fn accumulate(
		&self,
		user_id: i64,
		repo_url: &str,
		file_path: &str,
		week_start: NaiveDate,
		lines_added: i64,
		lines_deleted: i64,
		commit_count: i64,
	) -> Result<()> {
		sqlx::query(
			r#"
			INSERT INTO file_churn_stats
				(user_id, repo_url, file_path, week_start, lines_added, lines_deleted, commit_count, churn_rate)
			VALUES (?, ?, ?, ?, ?, ?, ?, ROUND((? + ?) * 100.0 / MAX(?, 50), 2))
			ON CONFLICT (user_id, repo_url, file_path, week_start) DO UPDATE SET
				lines_added = file_churn_stats.lines_added + excluded.lines_added,
				lines_deleted = file_churn_stats.lines_deleted + excluded.lines_deleted,
				commit_count = file_churn_stats.commit_count + excluded.commit_count,
				churn_rate = ROUND(
					(file_churn_stats.lines_added + excluded.lines_added
						+ file_churn_stats.lines_deleted + excluded.lines_deleted) * 100.0
					/ MAX(file_churn_stats.lines_added + excluded.lines_added, 50), 2)
			"#,
		)
		.bind(user_id)
		.bind(repo_url)
		.bind(file_path)
		.bind(week_start)
		.bind(lines_added)
		.bind(lines_deleted)
		.bind(commit_count)
		.bind(lines_added)
		.bind(lines_deleted)
		.bind(lines_added)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	/// Override the stored churn rate for a bucket.
	///
	/// Used by aggregators that know the real file size instead of the
	/// lines-added proxy.
	#[tracing::instrument(skip(self))]
	pub async fn set_churn_rate(
		&self,
		user_id: i64,
		repo_url: &str,
		file_path: &str,
		week_start: NaiveDate,
		churn_rate: f64,
	) -> Result<()> {
		sqlx::query(
			"UPDATE file_churn_stats SET churn_rate = ? \
			 WHERE user_id = ? AND repo_url = ? AND file_path = ? AND week_start = ?",
		)
		.bind(churn_rate)
		.bind(user_id)
		.bind(repo_url)
		.bind(file_path)
		.bind(week_start)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_bucket(
		&self,
		user_id: i64,
		repo_url: &str,
		file_path: &str,
		week_start: NaiveDate,
	) -> Result<Option<FileChurnStat>> {
		let sql = format!(
			"SELECT {CHURN_COLUMNS} FROM file_churn_stats \
			 WHERE user_id = ? AND repo_url = ? AND file_path = ? AND week_start = ?"
		);
		let row = sqlx::query_as::<_, ChurnRow>(&sql)
			.bind(user_id)
			.bind(repo_url)
			.bind(file_path)
			.bind(week_start)
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.map(churn_from_row))
	}

	/// Rows above the churn threshold within the window, highest churn first.
	#[tracing::instrument(skip(self))]
	pub async fn find_hotspots(
		&self,
		user_id: i64,
		repo_url: &str,
		since: NaiveDate,
		threshold: f64,
	) -> Result<Vec<FileChurnStat>> {
		let sql = format!(
			"SELECT {CHURN_COLUMNS} FROM file_churn_stats \
			 WHERE user_id = ? AND repo_url = ? AND week_start >= ? AND churn_rate > ? \
			 ORDER BY churn_rate DESC"
		);
		let rows = sqlx::query_as::<_, ChurnRow>(&sql)
			.bind(user_id)
			.bind(repo_url)
			.bind(since)
			.bind(threshold)
			.fetch_all(&self.pool)
			.await?;
		Ok(rows.into_iter().map(churn_from_row).collect())
	}

	/// Week-by-week churn for a single file, oldest week first.
	#[tracing::instrument(skip(self))]
	pub async fn find_file_trend(
		&self,
		user_id: i64,
		repo_url: &str,
		file_path: &str,
		since: NaiveDate,
	) -> Result<Vec<FileChurnStat>> {
		let sql = format!(
			"SELECT {CHURN_COLUMNS} FROM file_churn_stats \
			 WHERE user_id = ? AND repo_url = ? AND file_path = ? AND week_start >= ? \
			 ORDER BY week_start ASC"
		);
		let rows = sqlx::query_as::<_, ChurnRow>(&sql)
			.bind(user_id)
			.bind(repo_url)
			.bind(file_path)
			.bind(since)
			.fetch_all(&self.pool)
			.await?;
		Ok(rows.into_iter().map(churn_from_row).collect())
	}
}

#[async_trait]
pub trait ChurnStore: Send + Sync {
	#[allow(clippy::too_many_arguments)]
	async fn accumulate(
		&self,
		user_id: i64,
		repo_url: &str,
		file_path: &str,
		week_start: NaiveDate,
		lines_added: i64,
		lines_deleted: i64,
		commit_count: i64,
	) -> Result<()>;
	async fn set_churn_rate(
		&self,
		user_id: i64,
		repo_url: &str,
		file_path: &str,
		week_start: NaiveDate,
		churn_rate: f64,
	) -> Result<()>;
	async fn get_bucket(
		&self,
		user_id: i64,
		repo_url: &str,
		file_path: &str,
		week_start: NaiveDate,
	) -> Result<Option<FileChurnStat>>;
	async fn find_hotspots(
		&self,
		user_id: i64,
		repo_url: &str,
		since: NaiveDate,
		threshold: f64,
	) -> Result<Vec<FileChurnStat>>;
	async fn find_file_trend(
		&self,
		user_id: i64,
		repo_url: &str,
		file_path: &str,
		since: NaiveDate,
	) -> Result<Vec<FileChurnStat>>;
}

#[async_trait]
impl ChurnStore for FileChurnStatRepository {
	async fn accumulate(
		&self,
		user_id: i64,
		repo_url: &str,
		file_path: &str,
		week_start: NaiveDate,
		lines_added: i64,
		lines_deleted: i64,
		commit_count: i64,
	) -> Result<()> {
		self
			.accumulate(
				user_id,
				repo_url,
				file_path,
				week_start,
				lines_added,
				lines_deleted,
				commit_count,
			)
			.await
	}

	async fn set_churn_rate(
		&self,
		user_id: i64,
		repo_url: &str,
		file_path: &str,
		week_start: NaiveDate,
		churn_rate: f64,
	) -> Result<()> {
		self
			.set_churn_rate(user_id, repo_url, file_path, week_start, churn_rate)
			.await
	}

	async fn get_bucket(
		&self,
		user_id: i64,
		repo_url: &str,
		file_path: &str,
		week_start: NaiveDate,
	) -> Result<Option<FileChurnStat>> {
		self.get_bucket(user_id, repo_url, file_path, week_start).await
	}

	async fn find_hotspots(
		&self,
		user_id: i64,
		repo_url: &str,
		since: NaiveDate,
		threshold: f64,
	) -> Result<Vec<FileChurnStat>> {
		self.find_hotspots(user_id, repo_url, since, threshold).await
	}

	async fn find_file_trend(
		&self,
		user_id: i64,
		repo_url: &str,
		file_path: &str,
		since: NaiveDate,
	) -> Result<Vec<FileChurnStat>> {
		self.find_file_trend(user_id, repo_url, file_path, since).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;

	const REPO: &str = "https://example.com/r.git";

	fn monday() -> NaiveDate {
		NaiveDate::from_ymd_opt(2024, 3, 18).unwrap()
	}

	#[tokio::test]
	async fn test_accumulate_creates_bucket_with_churn_rate() {
		let pool = create_test_pool().await;
		let repo = FileChurnStatRepository::new(pool);

		repo
			.accumulate(1, REPO, "f.ts", monday(), 10, 3, 1)
			.await
			.unwrap();

		let bucket = repo.get_bucket(1, REPO, "f.ts", monday()).await.unwrap().unwrap();
		assert_eq!(bucket.lines_added, 10);
		assert_eq!(bucket.lines_deleted, 3);
		assert_eq!(bucket.commit_count, 1);
		// (10 + 3) * 100 / max(10, 50) = 1300 / 50 = 26.00
		assert_eq!(bucket.churn_rate, 26.00);
	}

	#[tokio::test]
	async fn test_accumulate_is_additive() {
		let pool = create_test_pool().await;
		let repo = FileChurnStatRepository::new(pool);

		repo
			.accumulate(1, REPO, "f.ts", monday(), 40, 10, 2)
			.await
			.unwrap();
		repo
			.accumulate(1, REPO, "f.ts", monday(), 60, 20, 3)
			.await
			.unwrap();

		let bucket = repo.get_bucket(1, REPO, "f.ts", monday()).await.unwrap().unwrap();
		assert_eq!(bucket.lines_added, 100);
		assert_eq!(bucket.lines_deleted, 30);
		assert_eq!(bucket.commit_count, 5);
		// (100 + 30) * 100 / max(100, 50) = 130.00
		assert_eq!(bucket.churn_rate, 130.00);
	}

	#[tokio::test]
	async fn test_denominator_floor_applies_to_small_files() {
		let pool = create_test_pool().await;
		let repo = FileChurnStatRepository::new(pool);

		repo.accumulate(1, REPO, "f.ts", monday(), 1, 0, 1).await.unwrap();

		let bucket = repo.get_bucket(1, REPO, "f.ts", monday()).await.unwrap().unwrap();
		// 1 * 100 / max(1, 50) = 2.00
		assert_eq!(bucket.churn_rate, 2.00);
	}

	#[tokio::test]
	async fn test_find_hotspots_filters_and_orders() {
		let pool = create_test_pool().await;
		let repo = FileChurnStatRepository::new(pool);
		let since = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

		// churn 26.00
		repo.accumulate(1, REPO, "hot.ts", monday(), 10, 3, 1).await.unwrap();
		// churn 2.00, below threshold
		repo.accumulate(1, REPO, "cold.ts", monday(), 1, 0, 1).await.unwrap();
		// churn 130.00
		repo
			.accumulate(1, REPO, "hotter.ts", monday(), 100, 30, 4)
			.await
			.unwrap();
		// hot file, but outside the window
		repo
			.accumulate(
				1,
				REPO,
				"old.ts",
				NaiveDate::from_ymd_opt(2023, 6, 5).unwrap(),
				100,
				30,
				4,
			)
			.await
			.unwrap();

		let rows = repo.find_hotspots(1, REPO, since, 25.0).await.unwrap();
		let files: Vec<&str> = rows.iter().map(|r| r.file_path.as_str()).collect();
		assert_eq!(files, vec!["hotter.ts", "hot.ts"]);
	}

	#[tokio::test]
	async fn test_find_file_trend_orders_by_week() {
		let pool = create_test_pool().await;
		let repo = FileChurnStatRepository::new(pool);
		let since = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

		let week2 = NaiveDate::from_ymd_opt(2024, 3, 25).unwrap();
		repo.accumulate(1, REPO, "f.ts", week2, 5, 5, 1).await.unwrap();
		repo.accumulate(1, REPO, "f.ts", monday(), 10, 3, 1).await.unwrap();

		let trend = repo.find_file_trend(1, REPO, "f.ts", since).await.unwrap();
		assert_eq!(trend.len(), 2);
		assert_eq!(trend[0].week_start, monday());
		assert_eq!(trend[1].week_start, week2);
	}

	#[tokio::test]
	async fn test_set_churn_rate_overrides_heuristic() {
		let pool = create_test_pool().await;
		let repo = FileChurnStatRepository::new(pool);

		repo.accumulate(1, REPO, "f.ts", monday(), 10, 3, 1).await.unwrap();
		repo
			.set_churn_rate(1, REPO, "f.ts", monday(), 6.5)
			.await
			.unwrap();

		let bucket = repo.get_bucket(1, REPO, "f.ts", monday()).await.unwrap().unwrap();
		assert_eq!(bucket.churn_rate, 6.5);
	}
}
