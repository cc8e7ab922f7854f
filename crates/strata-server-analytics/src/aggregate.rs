// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Weekly churn aggregation.
//!
//! The churn denominator is a heuristic: lines added stand in for file
//! size, floored at 50 to keep brand-new files from blowing the rate up.
//! A `FileSizeHint` can supply a real line count instead; the stored
//! shapes do not change.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Weekday};
use tracing::{info, instrument};

use strata_server_db::{ChurnStore, CommitFileDiff};

use crate::error::Result;

/// Denominator floor for the churn-rate heuristic.
const CHURN_SIZE_FLOOR: i64 = 50;

/// Monday of the ISO week containing `date`.
pub fn monday_of_iso_week(date: NaiveDate) -> NaiveDate {
	date.week(Weekday::Mon).first_day()
}

fn round2(value: f64) -> f64 {
	(value * 100.0).round() / 100.0
}

/// Optional source of accurate per-file line counts, replacing the
/// lines-added proxy in the churn-rate denominator.
pub trait FileSizeHint: Send + Sync {
	fn line_count(&self, file_path: &str) -> Option<i64>;
}

#[derive(Default)]
struct WeekAccumulator {
	lines_added: i64,
	lines_deleted: i64,
	commit_count: i64,
}

pub struct ChurnAggregator {
	churn: Arc<dyn ChurnStore>,
	size_hint: Option<Arc<dyn FileSizeHint>>,
}

impl ChurnAggregator {
	pub fn new(churn: Arc<dyn ChurnStore>) -> Self {
		Self {
			churn,
			size_hint: None,
		}
	}

	pub fn with_size_hint(mut self, hint: Arc<dyn FileSizeHint>) -> Self {
		self.size_hint = Some(hint);
		self
	}

	/// Fold mined diffs into `(file, ISO-week Monday)` buckets and add each
	/// bucket to the stored weekly row. Additive and commutative: feeding
	/// the same stream in chunks lands on the same totals as one pass.
	#[instrument(skip(self, diffs), fields(repo_url = %repo_url, records = diffs.len()))]
	pub async fn aggregate(
		&self,
		user_id: i64,
		repo_url: &str,
		diffs: &[CommitFileDiff],
	) -> Result<usize> {
		let mut buckets: HashMap<(String, NaiveDate), WeekAccumulator> = HashMap::new();
		for diff in diffs {
			let week_start = monday_of_iso_week(diff.authored_at.date_naive());
			let acc = buckets
				.entry((diff.file_path.clone(), week_start))
				.or_default();
			acc.lines_added += diff.lines_added;
			acc.lines_deleted += diff.lines_deleted;
			acc.commit_count += 1;
		}

		let bucket_count = buckets.len();
		for ((file_path, week_start), acc) in buckets {
			self
				.churn
				.accumulate(
					user_id,
					repo_url,
					&file_path,
					week_start,
					acc.lines_added,
					acc.lines_deleted,
					acc.commit_count,
				)
				.await?;

			if let Some(hint) = &self.size_hint {
				if let Some(line_count) = hint.line_count(&file_path) {
					if let Some(stored) = self
						.churn
						.get_bucket(user_id, repo_url, &file_path, week_start)
						.await?
					{
						let changed = (stored.lines_added + stored.lines_deleted) as f64;
						let denominator = line_count.max(CHURN_SIZE_FLOOR) as f64;
						let rate = round2(changed * 100.0 / denominator);
						self
							.churn
							.set_churn_rate(user_id, repo_url, &file_path, week_start, rate)
							.await?;
					}
				}
			}
		}

		info!(buckets = bucket_count, "churn aggregated");
		Ok(bucket_count)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{DateTime, Utc};
	use strata_server_db::{testing::create_test_pool, FileChurnStatRepository};

	const REPO: &str = "https://example.com/r.git";

	fn diff(file: &str, authored_at: &str, added: i64, deleted: i64) -> CommitFileDiff {
		CommitFileDiff {
			commit_hash: format!("{file}-{authored_at}-{added}-{deleted}"),
			file_path: file.to_string(),
			authored_at: authored_at.parse::<DateTime<Utc>>().unwrap(),
			author_email: "dev@example.com".to_string(),
			lines_added: added,
			lines_deleted: deleted,
		}
	}

	#[test]
	fn test_monday_of_iso_week() {
		// 2024-03-20 is a Wednesday; its ISO week starts Monday 2024-03-18.
		let wednesday = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
		assert_eq!(
			monday_of_iso_week(wednesday),
			NaiveDate::from_ymd_opt(2024, 3, 18).unwrap()
		);

		// Sunday belongs to the week of the preceding Monday.
		let sunday = NaiveDate::from_ymd_opt(2024, 3, 24).unwrap();
		assert_eq!(
			monday_of_iso_week(sunday),
			NaiveDate::from_ymd_opt(2024, 3, 18).unwrap()
		);

		let monday = NaiveDate::from_ymd_opt(2024, 3, 18).unwrap();
		assert_eq!(monday_of_iso_week(monday), monday);
	}

	#[tokio::test]
	async fn test_weekly_bucket_and_churn_rate() {
		let pool = create_test_pool().await;
		let store = Arc::new(FileChurnStatRepository::new(pool));
		let aggregator = ChurnAggregator::new(store.clone());

		let buckets = aggregator
			.aggregate(1, REPO, &[diff("f.ts", "2024-03-20T10:00:00Z", 10, 3)])
			.await
			.unwrap();
		assert_eq!(buckets, 1);

		let week = NaiveDate::from_ymd_opt(2024, 3, 18).unwrap();
		let stored = store.get_bucket(1, REPO, "f.ts", week).await.unwrap().unwrap();
		assert_eq!(stored.lines_added, 10);
		assert_eq!(stored.lines_deleted, 3);
		assert_eq!(stored.commit_count, 1);
		// (10 + 3) * 100 / max(10, 50) = 26.00
		assert_eq!(stored.churn_rate, 26.00);
	}

	#[tokio::test]
	async fn test_same_week_diffs_fold_into_one_bucket() {
		let pool = create_test_pool().await;
		let store = Arc::new(FileChurnStatRepository::new(pool));
		let aggregator = ChurnAggregator::new(store.clone());

		aggregator
			.aggregate(
				1,
				REPO,
				&[
					diff("f.ts", "2024-03-18T09:00:00Z", 5, 1),
					diff("f.ts", "2024-03-22T18:00:00Z", 7, 2),
					diff("g.ts", "2024-03-20T12:00:00Z", 1, 1),
				],
			)
			.await
			.unwrap();

		let week = NaiveDate::from_ymd_opt(2024, 3, 18).unwrap();
		let stored = store.get_bucket(1, REPO, "f.ts", week).await.unwrap().unwrap();
		assert_eq!(stored.lines_added, 12);
		assert_eq!(stored.lines_deleted, 3);
		assert_eq!(stored.commit_count, 2);
	}

	#[tokio::test]
	async fn test_chunked_aggregation_matches_single_pass() {
		let stream = vec![
			diff("f.ts", "2024-03-18T09:00:00Z", 5, 1),
			diff("f.ts", "2024-03-22T18:00:00Z", 7, 2),
			diff("f.ts", "2024-03-26T10:00:00Z", 30, 4),
			diff("g.ts", "2024-03-20T12:00:00Z", 1, 1),
		];

		let single_pool = create_test_pool().await;
		let single_store = Arc::new(FileChurnStatRepository::new(single_pool));
		ChurnAggregator::new(single_store.clone())
			.aggregate(1, REPO, &stream)
			.await
			.unwrap();

		let chunked_pool = create_test_pool().await;
		let chunked_store = Arc::new(FileChurnStatRepository::new(chunked_pool));
		let chunked = ChurnAggregator::new(chunked_store.clone());
		chunked.aggregate(1, REPO, &stream[..2]).await.unwrap();
		chunked.aggregate(1, REPO, &stream[2..]).await.unwrap();

		let since = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
		for file in ["f.ts", "g.ts"] {
			let single = single_store.find_file_trend(1, REPO, file, since).await.unwrap();
			let chunked = chunked_store.find_file_trend(1, REPO, file, since).await.unwrap();
			assert_eq!(single.len(), chunked.len());
			for (a, b) in single.iter().zip(chunked.iter()) {
				assert_eq!(a.week_start, b.week_start);
				assert_eq!(a.lines_added, b.lines_added);
				assert_eq!(a.lines_deleted, b.lines_deleted);
				assert_eq!(a.commit_count, b.commit_count);
				assert_eq!(a.churn_rate, b.churn_rate);
			}
		}
	}

	struct FixedSize(i64);

	impl FileSizeHint for FixedSize {
		fn line_count(&self, _file_path: &str) -> Option<i64> {
			Some(self.0)
		}
	}

	#[tokio::test]
	async fn test_size_hint_overrides_denominator() {
		let pool = create_test_pool().await;
		let store = Arc::new(FileChurnStatRepository::new(pool));
		let aggregator = ChurnAggregator::new(store.clone()).with_size_hint(Arc::new(FixedSize(200)));

		aggregator
			.aggregate(1, REPO, &[diff("f.ts", "2024-03-20T10:00:00Z", 10, 3)])
			.await
			.unwrap();

		let week = NaiveDate::from_ymd_opt(2024, 3, 18).unwrap();
		let stored = store.get_bucket(1, REPO, "f.ts", week).await.unwrap().unwrap();
		// 13 * 100 / max(200, 50) = 6.5 instead of the 26.00 proxy figure.
		assert_eq!(stored.churn_rate, 6.5);
	}
}
