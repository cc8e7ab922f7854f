// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use strata_server_db::{IndexJob, JobKind, JobStatus, JobStore};

use crate::error::JobError;
use crate::handler::JobHandler;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
	pub worker_count: usize,
	pub poll_interval: Duration,
	pub stale_threshold: Duration,
}

impl Default for WorkerConfig {
	fn default() -> Self {
		Self {
			worker_count: 2,
			poll_interval: Duration::from_secs(5),
			stale_threshold: Duration::from_secs(30 * 60),
		}
	}
}

/// One handler per job kind; dispatch is an exhaustive match, so adding a
/// kind forces a wiring decision here.
pub struct WorkerHandlers {
	pub graph_build: Arc<dyn JobHandler>,
	pub git_mine: Arc<dyn JobHandler>,
	pub scip_index: Arc<dyn JobHandler>,
}

pub struct WorkerPool {
	jobs: Arc<dyn JobStore>,
	handlers: Arc<WorkerHandlers>,
	config: WorkerConfig,
	shutdown_tx: broadcast::Sender<()>,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
	pub fn new(jobs: Arc<dyn JobStore>, handlers: WorkerHandlers, config: WorkerConfig) -> Self {
		let (shutdown_tx, _) = broadcast::channel(1);
		Self {
			jobs,
			handlers: Arc::new(handlers),
			config,
			shutdown_tx,
			handles: Mutex::new(Vec::new()),
		}
	}

	/// Sweep stale claims once, then start the periodic workers.
	#[instrument(skip(self))]
	pub async fn start(&self) -> crate::error::Result<()> {
		let stale_cutoff = Utc::now()
			- chrono::Duration::from_std(self.config.stale_threshold)
				.unwrap_or_else(|_| chrono::Duration::minutes(30));
		self.jobs.release_stale(stale_cutoff).await?;

		let mut handles = self.handles.lock().await;
		for worker_id in 0..self.config.worker_count {
			let jobs = Arc::clone(&self.jobs);
			let handlers = Arc::clone(&self.handlers);
			let interval = self.config.poll_interval;
			let mut shutdown_rx = self.shutdown_tx.subscribe();

			let handle = tokio::spawn(async move {
				loop {
					tokio::select! {
						_ = tokio::time::sleep(interval) => {
							if let Err(e) = run_tick(&jobs, &handlers).await {
								warn!(worker_id, error = %e, "worker tick failed");
							}
						}
						_ = shutdown_rx.recv() => {
							info!(worker_id, "worker shutting down");
							break;
						}
					}
				}
			});
			handles.push(handle);
		}

		info!(workers = handles.len(), "worker pool started");
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		let _ = self.shutdown_tx.send(());

		let mut handles = self.handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}

		info!("worker pool shut down");
	}
}

/// Claim at most one pending job and run it to a terminal status.
/// Returns whether a job was claimed.
pub async fn run_tick(
	jobs: &Arc<dyn JobStore>,
	handlers: &WorkerHandlers,
) -> crate::error::Result<bool> {
	let Some(job) = jobs.claim_next(&[]).await? else {
		return Ok(false);
	};

	info!(job_id = job.id, kind = %job.kind.as_str(), repo_url = %job.repo_url, "processing job");

	let handler = match &job.kind {
		JobKind::GraphBuild => Some(&handlers.graph_build),
		JobKind::GitMine => Some(&handlers.git_mine),
		JobKind::ScipIndex => Some(&handlers.scip_index),
		JobKind::Unsupported(_) => None,
	};

	let result = match handler {
		Some(handler) => handler.run(&job).await,
		None => Err(JobError::Unsupported(job.kind.as_str().to_string())),
	};

	match result {
		Ok(outcome) => {
			if let Some(payload) = &outcome.result_payload {
				jobs.set_result_payload(job.id, &payload.to_string()).await?;
			}
			remove_payload_file(&job).await;
			jobs.complete(job.id, JobStatus::Done, None).await?;
			info!(job_id = job.id, message = %outcome.message, "job done");
		}
		Err(e) => {
			// Payload files are kept on failure for diagnostics.
			let message = e.to_string();
			jobs.complete(job.id, JobStatus::Failed, Some(&message)).await?;
			warn!(job_id = job.id, error = %message, "job failed");
		}
	}

	Ok(true)
}

async fn remove_payload_file(job: &IndexJob) {
	if let Some(path) = &job.payload_path {
		if let Err(e) = tokio::fs::remove_file(path).await {
			warn!(job_id = job.id, path = %path, error = %e, "failed to remove payload file");
		}
	}
}
