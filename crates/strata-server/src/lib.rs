// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Server wiring: configuration, engine construction, and the job handler
//! implementations behind each job kind.

pub mod config;
pub mod facade;
pub mod jobs;

pub use facade::QueryFacade;

use std::sync::Arc;

use sqlx::SqlitePool;

use strata_server_analytics::ChurnAggregator;
use strata_server_db::{
	CommitStatRepository, FileChurnStatRepository, FileDependencyRepository, JobRepository,
	ScipRepository,
};
use strata_server_git::{AccessTokenProvider, HistoryMiner, NoAccessTokens, RepoCache};
use strata_server_graph::DependencyExtractor;
use strata_server_jobs::{WorkerHandlers, WorkerPool};
use strata_server_scip::IndexIngestor;

use crate::config::ServerConfig;
use crate::jobs::{GitMineHandler, GraphBuildHandler, ScipIndexHandler};

/// Build the worker pool with every engine wired to the shared pool and
/// repository cache. Access tokens come from the external identity
/// collaborator; without one, only public repositories are reachable.
pub fn build_worker_pool(
	pool: SqlitePool,
	config: &ServerConfig,
	tokens: Option<Arc<dyn AccessTokenProvider>>,
) -> WorkerPool {
	let tokens = tokens.unwrap_or_else(|| Arc::new(NoAccessTokens));

	let cache = Arc::new(RepoCache::new(config.repo_base_dir.clone()));
	let commits = Arc::new(CommitStatRepository::new(pool.clone()));
	let churn = Arc::new(FileChurnStatRepository::new(pool.clone()));
	let deps = Arc::new(FileDependencyRepository::new(pool.clone()));
	let scip = Arc::new(ScipRepository::new(pool.clone()));

	let handlers = WorkerHandlers {
		graph_build: Arc::new(GraphBuildHandler::new(
			Arc::new(DependencyExtractor::new(deps)),
			tokens.clone(),
		)),
		git_mine: Arc::new(GitMineHandler::new(
			Arc::new(HistoryMiner::new(cache.clone(), commits)),
			Arc::new(ChurnAggregator::new(churn)),
			tokens,
			config.mine_default_days,
		)),
		scip_index: Arc::new(ScipIndexHandler::new(Arc::new(IndexIngestor::new(scip)))),
	};

	WorkerPool::new(
		Arc::new(JobRepository::new(pool)),
		handlers,
		config.worker_config(),
	)
}
