// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use strata_server_db::IndexJob;
use strata_server_jobs::{JobError, JobHandler, JobOutcome, Result};
use strata_server_scip::IndexIngestor;

/// Reads the uploaded binary index from the job's payload path and ingests
/// it. The worker deletes the payload file on success and keeps it on
/// failure.
pub struct ScipIndexHandler {
	ingester: Arc<IndexIngestor>,
}

impl ScipIndexHandler {
	pub fn new(ingester: Arc<IndexIngestor>) -> Self {
		Self { ingester }
	}
}

#[async_trait]
impl JobHandler for ScipIndexHandler {
	#[instrument(skip(self, job), fields(job_id = job.id, repo_url = %job.repo_url))]
	async fn run(&self, job: &IndexJob) -> Result<JobOutcome> {
		let Some(path) = &job.payload_path else {
			return Err(JobError::Failed("scip_index job has no payload path".to_string()));
		};

		let bytes = tokio::fs::read(path)
			.await
			.map_err(|e| JobError::Failed(format!("failed to read payload {path}: {e}")))?;

		let summary = self
			.ingester
			.ingest(job.user_id, &job.repo_url, &bytes)
			.await
			.map_err(JobError::failed)?;

		Ok(JobOutcome::message(format!(
			"ingested {} documents, {} occurrences, {} external symbols ({} skipped)",
			summary.documents, summary.occurrences, summary.external_symbols, summary.skipped_documents
		)))
	}
}
