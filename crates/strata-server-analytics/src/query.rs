// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Hotspot and file-trend queries over the weekly churn buckets.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use strata_server_db::{ChurnStore, FileChurnStat};

use crate::error::Result;

pub const DEFAULT_WINDOW_WEEKS: i64 = 12;
pub const DEFAULT_CHURN_THRESHOLD: f64 = 25.0;
const HOTSPOT_LIMIT: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekPoint {
	pub week_start: NaiveDate,
	pub churn_rate: f64,
	pub commit_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotspot {
	pub file_path: String,
	pub avg_churn_rate: f64,
	pub total_commits: i64,
	pub total_lines_added: i64,
	pub total_lines_deleted: i64,
	pub trend: Vec<WeekPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyChurn {
	pub week_start: NaiveDate,
	pub lines_added: i64,
	pub lines_deleted: i64,
	pub commit_count: i64,
	pub churn_rate: f64,
}

fn round2(value: f64) -> f64 {
	(value * 100.0).round() / 100.0
}

pub struct AnalyticsQuery {
	churn: Arc<dyn ChurnStore>,
}

impl AnalyticsQuery {
	pub fn new(churn: Arc<dyn ChurnStore>) -> Self {
		Self { churn }
	}

	/// Files whose weekly churn exceeded the threshold inside the window,
	/// grouped per file with totals and the matching weeks as a trend,
	/// sorted by average churn, capped at twenty.
	#[instrument(skip(self), fields(repo_url = %repo_url))]
	pub async fn hotspots(
		&self,
		user_id: i64,
		repo_url: &str,
		weeks: i64,
		threshold: f64,
	) -> Result<Vec<Hotspot>> {
		let since = Utc::now().date_naive() - Duration::weeks(weeks);
		let rows = self
			.churn
			.find_hotspots(user_id, repo_url, since, threshold)
			.await?;

		let mut by_file: HashMap<String, Vec<FileChurnStat>> = HashMap::new();
		for row in rows {
			by_file.entry(row.file_path.clone()).or_default().push(row);
		}

		let mut hotspots: Vec<Hotspot> = by_file
			.into_iter()
			.map(|(file_path, stats)| build_hotspot(file_path, stats))
			.collect();

		hotspots.sort_by(|a, b| {
			b.avg_churn_rate
				.partial_cmp(&a.avg_churn_rate)
				.unwrap_or(Ordering::Equal)
				.then_with(|| a.file_path.cmp(&b.file_path))
		});
		hotspots.truncate(HOTSPOT_LIMIT);

		info!(hotspots = hotspots.len(), "hotspots computed");
		Ok(hotspots)
	}

	/// Week-by-week churn for one file inside the window, oldest first.
	#[instrument(skip(self), fields(repo_url = %repo_url, file = %file_path))]
	pub async fn file_trend(
		&self,
		user_id: i64,
		repo_url: &str,
		file_path: &str,
		weeks: i64,
	) -> Result<Vec<WeeklyChurn>> {
		let since = Utc::now().date_naive() - Duration::weeks(weeks);
		let rows = self
			.churn
			.find_file_trend(user_id, repo_url, file_path, since)
			.await?;

		Ok(
			rows
				.into_iter()
				.map(|row| WeeklyChurn {
					week_start: row.week_start,
					lines_added: row.lines_added,
					lines_deleted: row.lines_deleted,
					commit_count: row.commit_count,
					churn_rate: row.churn_rate,
				})
				.collect(),
		)
	}
}

fn build_hotspot(file_path: String, mut stats: Vec<FileChurnStat>) -> Hotspot {
	stats.sort_by_key(|s| s.week_start);

	let total_commits = stats.iter().map(|s| s.commit_count).sum();
	let total_lines_added = stats.iter().map(|s| s.lines_added).sum();
	let total_lines_deleted = stats.iter().map(|s| s.lines_deleted).sum();
	let avg_churn_rate = round2(
		stats.iter().map(|s| s.churn_rate).sum::<f64>() / stats.len().max(1) as f64,
	);

	let trend = stats
		.iter()
		.map(|s| WeekPoint {
			week_start: s.week_start,
			churn_rate: s.churn_rate,
			commit_count: s.commit_count,
		})
		.collect();

	Hotspot {
		file_path,
		avg_churn_rate,
		total_commits,
		total_lines_added,
		total_lines_deleted,
		trend,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use strata_server_db::{testing::create_test_pool, FileChurnStatRepository};

	const REPO: &str = "https://example.com/r.git";

	/// Recent Mondays, newest window first, so fixtures stay inside the
	/// query window regardless of the current date.
	fn recent_monday(weeks_ago: i64) -> NaiveDate {
		crate::aggregate::monday_of_iso_week(Utc::now().date_naive()) - Duration::weeks(weeks_ago)
	}

	async fn store() -> Arc<FileChurnStatRepository> {
		Arc::new(FileChurnStatRepository::new(create_test_pool().await))
	}

	async fn seed_week(
		store: &FileChurnStatRepository,
		file: &str,
		week: NaiveDate,
		commits: i64,
		rate: f64,
	) {
		store.accumulate(1, REPO, file, week, 10, 5, commits).await.unwrap();
		store.set_churn_rate(1, REPO, file, week, rate).await.unwrap();
	}

	#[tokio::test]
	async fn test_hotspot_threshold_and_average() {
		let store = store().await;

		// Three weeks of churn: 30, 40, 10. Threshold 25 keeps two.
		seed_week(&store, "f.ts", recent_monday(3), 2, 30.0).await;
		seed_week(&store, "f.ts", recent_monday(2), 3, 40.0).await;
		seed_week(&store, "f.ts", recent_monday(1), 9, 10.0).await;

		let query = AnalyticsQuery::new(store);
		let hotspots = query
			.hotspots(1, REPO, DEFAULT_WINDOW_WEEKS, DEFAULT_CHURN_THRESHOLD)
			.await
			.unwrap();

		assert_eq!(hotspots.len(), 1);
		let hotspot = &hotspots[0];
		assert_eq!(hotspot.file_path, "f.ts");
		assert_eq!(hotspot.avg_churn_rate, 35.00);
		assert_eq!(hotspot.trend.len(), 2);
		assert_eq!(hotspot.total_commits, 5);
		assert!(hotspot.trend[0].week_start < hotspot.trend[1].week_start);
	}

	#[tokio::test]
	async fn test_hotspots_sorted_by_average_descending() {
		let store = store().await;

		seed_week(&store, "warm.ts", recent_monday(1), 1, 30.0).await;
		seed_week(&store, "hot.ts", recent_monday(1), 1, 90.0).await;

		let query = AnalyticsQuery::new(store);
		let hotspots = query.hotspots(1, REPO, 12, 25.0).await.unwrap();

		let files: Vec<&str> = hotspots.iter().map(|h| h.file_path.as_str()).collect();
		assert_eq!(files, vec!["hot.ts", "warm.ts"]);
	}

	#[tokio::test]
	async fn test_hotspots_capped_at_twenty_files() {
		let store = store().await;

		for i in 0..25 {
			seed_week(&store, &format!("f{i:02}.ts"), recent_monday(1), 1, 50.0 + i as f64).await;
		}

		let query = AnalyticsQuery::new(store);
		let hotspots = query.hotspots(1, REPO, 12, 25.0).await.unwrap();
		assert_eq!(hotspots.len(), 20);
		// Lowest-churn files fall off the end.
		assert!(hotspots.iter().all(|h| h.avg_churn_rate >= 55.0));
	}

	#[tokio::test]
	async fn test_hotspots_window_excludes_old_weeks() {
		let store = store().await;

		seed_week(&store, "f.ts", recent_monday(30), 1, 80.0).await;

		let query = AnalyticsQuery::new(store);
		let hotspots = query.hotspots(1, REPO, 12, 25.0).await.unwrap();
		assert!(hotspots.is_empty());
	}

	#[tokio::test]
	async fn test_file_trend_in_window_order() {
		let store = store().await;

		seed_week(&store, "f.ts", recent_monday(2), 1, 20.0).await;
		seed_week(&store, "f.ts", recent_monday(1), 2, 40.0).await;
		seed_week(&store, "f.ts", recent_monday(30), 5, 99.0).await;
		seed_week(&store, "other.ts", recent_monday(1), 1, 10.0).await;

		let query = AnalyticsQuery::new(store);
		let trend = query.file_trend(1, REPO, "f.ts", 12).await.unwrap();

		assert_eq!(trend.len(), 2);
		assert!(trend[0].week_start < trend[1].week_start);
		assert_eq!(trend[0].churn_rate, 20.0);
		assert_eq!(trend[1].commit_count, 2);
	}
}
