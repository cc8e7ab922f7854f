// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::instrument;

use strata_server_analytics::ChurnAggregator;
use strata_server_db::IndexJob;
use strata_server_git::{AccessTokenProvider, Credential, HistoryMiner};
use strata_server_jobs::{JobError, JobHandler, JobOutcome, Result};

/// Runs history mining plus churn aggregation for `git_mine` jobs. The job
/// payload may carry `{"days": N}` to size the mining window.
pub struct GitMineHandler {
	miner: Arc<HistoryMiner>,
	aggregator: Arc<ChurnAggregator>,
	tokens: Arc<dyn AccessTokenProvider>,
	default_days: i64,
}

impl GitMineHandler {
	pub fn new(
		miner: Arc<HistoryMiner>,
		aggregator: Arc<ChurnAggregator>,
		tokens: Arc<dyn AccessTokenProvider>,
		default_days: i64,
	) -> Self {
		Self {
			miner,
			aggregator,
			tokens,
			default_days,
		}
	}
}

/// Window length in days from an optional `{"days": N}` payload.
fn mine_days(payload: Option<&str>, default_days: i64) -> i64 {
	payload
		.and_then(|p| serde_json::from_str::<serde_json::Value>(p).ok())
		.and_then(|v| v.get("days").and_then(|d| d.as_i64()))
		.unwrap_or(default_days)
}

#[async_trait]
impl JobHandler for GitMineHandler {
	#[instrument(skip(self, job), fields(job_id = job.id, repo_url = %job.repo_url))]
	async fn run(&self, job: &IndexJob) -> Result<JobOutcome> {
		let days = mine_days(job.payload.as_deref(), self.default_days);
		if days <= 0 {
			return Err(JobError::Failed(format!("days must be positive, got {days}")));
		}
		let since = Utc::now() - Duration::days(days);

		let credential = self
			.tokens
			.token_for(job.user_id)
			.await
			.map(Credential::oauth2);

		let diffs = self
			.miner
			.mine(job.user_id, &job.repo_url, credential, Some(since))
			.await
			.map_err(JobError::failed)?;

		let buckets = self
			.aggregator
			.aggregate(job.user_id, &job.repo_url, &diffs)
			.await
			.map_err(JobError::failed)?;

		Ok(JobOutcome::message(format!(
			"mined {} file diffs into {} weekly buckets over {} days",
			diffs.len(),
			buckets,
			days
		)))
	}
}
