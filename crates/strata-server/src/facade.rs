// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The one handle the HTTP surface talks to: enqueue operations on the job
//! queue plus the read-only queries over what the workers produced. Every
//! method takes the caller's `user_id` first; rows belonging to other users
//! are unreachable by construction.

use std::sync::Arc;

use sqlx::SqlitePool;

use strata_server_analytics::{
	AnalyticsQuery, Hotspot, WeeklyChurn, DEFAULT_CHURN_THRESHOLD, DEFAULT_WINDOW_WEEKS,
};
use strata_server_db::{
	DbError, FileChurnStatRepository, FileDependencyRepository, IndexJob, JobKind, JobRepository,
	Result as DbResult, ScipRepository,
};
use strata_server_git::{BlameLine, BlameProvider, RepoCache, Result as GitResult};
use strata_server_graph::{DependencyGraph, GraphQuery, DEFAULT_TRAVERSAL_DEPTH};
use strata_server_scip::{Hover, Reference, Result as ScipResult, ScipQuery};

pub struct QueryFacade {
	jobs: Arc<JobRepository>,
	graph: GraphQuery,
	scip: ScipQuery,
	analytics: AnalyticsQuery,
	blame: BlameProvider,
}

impl QueryFacade {
	pub fn new(pool: SqlitePool, cache: Arc<RepoCache>) -> Self {
		Self {
			jobs: Arc::new(JobRepository::new(pool.clone())),
			graph: GraphQuery::new(Arc::new(FileDependencyRepository::new(pool.clone()))),
			scip: ScipQuery::new(Arc::new(ScipRepository::new(pool.clone()))),
			analytics: AnalyticsQuery::new(Arc::new(FileChurnStatRepository::new(pool))),
			blame: BlameProvider::new(cache),
		}
	}

	// ── Enqueue ──

	pub async fn enqueue_graph_build(&self, user_id: i64, repo_url: &str) -> DbResult<i64> {
		self
			.jobs
			.enqueue(user_id, repo_url, JobKind::GraphBuild, None, None)
			.await
	}

	pub async fn enqueue_git_mine(
		&self,
		user_id: i64,
		repo_url: &str,
		days: Option<i64>,
	) -> DbResult<i64> {
		if let Some(days) = days {
			if days <= 0 {
				return Err(DbError::InvalidInput(format!(
					"days must be positive, got {days}"
				)));
			}
		}
		let payload = days.map(|d| format!("{{\"days\":{d}}}"));
		self
			.jobs
			.enqueue(user_id, repo_url, JobKind::GitMine, payload.as_deref(), None)
			.await
	}

	pub async fn enqueue_scip_index(
		&self,
		user_id: i64,
		repo_url: &str,
		payload_path: &str,
	) -> DbResult<i64> {
		if payload_path.is_empty() {
			return Err(DbError::InvalidInput("payload path must not be empty".to_string()));
		}
		self
			.jobs
			.enqueue(user_id, repo_url, JobKind::ScipIndex, None, Some(payload_path))
			.await
	}

	pub async fn job_status(&self, user_id: i64, job_id: i64) -> DbResult<Option<IndexJob>> {
		self.jobs.get(user_id, job_id).await
	}

	// ── Read queries ──

	pub async fn hover(
		&self,
		user_id: i64,
		repo_url: &str,
		file_path: &str,
		line: i64,
		character: i64,
	) -> ScipResult<Option<Hover>> {
		self.scip.hover(user_id, repo_url, file_path, line, character).await
	}

	pub async fn references(
		&self,
		user_id: i64,
		repo_url: &str,
		symbol: &str,
	) -> ScipResult<Vec<Reference>> {
		self.scip.references(user_id, repo_url, symbol).await
	}

	pub async fn dependency_graph(
		&self,
		user_id: i64,
		repo_url: &str,
		root_file: Option<&str>,
		depth: Option<usize>,
	) -> strata_server_graph::Result<DependencyGraph> {
		self
			.graph
			.graph(
				user_id,
				repo_url,
				root_file,
				depth.unwrap_or(DEFAULT_TRAVERSAL_DEPTH),
			)
			.await
	}

	pub async fn hotspots(
		&self,
		user_id: i64,
		repo_url: &str,
		weeks: Option<i64>,
		threshold: Option<f64>,
	) -> strata_server_analytics::Result<Vec<Hotspot>> {
		self
			.analytics
			.hotspots(
				user_id,
				repo_url,
				weeks.unwrap_or(DEFAULT_WINDOW_WEEKS),
				threshold.unwrap_or(DEFAULT_CHURN_THRESHOLD),
			)
			.await
	}

	pub async fn file_trend(
		&self,
		user_id: i64,
		repo_url: &str,
		file_path: &str,
		weeks: Option<i64>,
	) -> strata_server_analytics::Result<Vec<WeeklyChurn>> {
		self
			.analytics
			.file_trend(user_id, repo_url, file_path, weeks.unwrap_or(DEFAULT_WINDOW_WEEKS))
			.await
	}

	pub async fn blame(
		&self,
		user_id: i64,
		repo_url: &str,
		file_path: &str,
	) -> GitResult<Vec<BlameLine>> {
		self.blame.blame(user_id, repo_url, file_path).await
	}
}
