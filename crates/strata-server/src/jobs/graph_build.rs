// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use strata_server_db::IndexJob;
use strata_server_git::{AccessTokenProvider, Credential};
use strata_server_graph::DependencyExtractor;
use strata_server_jobs::{JobError, JobHandler, JobOutcome, Result};

/// Runs the import extractor for `graph_build` jobs and records the edge
/// count on the job row.
pub struct GraphBuildHandler {
	extractor: Arc<DependencyExtractor>,
	tokens: Arc<dyn AccessTokenProvider>,
}

impl GraphBuildHandler {
	pub fn new(extractor: Arc<DependencyExtractor>, tokens: Arc<dyn AccessTokenProvider>) -> Self {
		Self { extractor, tokens }
	}
}

#[async_trait]
impl JobHandler for GraphBuildHandler {
	#[instrument(skip(self, job), fields(job_id = job.id, repo_url = %job.repo_url))]
	async fn run(&self, job: &IndexJob) -> Result<JobOutcome> {
		let credential = self
			.tokens
			.token_for(job.user_id)
			.await
			.map(Credential::oauth2);

		let edges = self
			.extractor
			.extract(job.user_id, &job.repo_url, credential)
			.await
			.map_err(JobError::failed)?;

		Ok(JobOutcome {
			message: format!("extracted {edges} dependency edges"),
			result_payload: Some(serde_json::json!({ "edges": edges })),
		})
	}
}
