// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use strata_server_db::IndexJob;

use crate::error::Result;

/// Result of a successful job run.
#[derive(Debug, Clone, Default)]
pub struct JobOutcome {
	pub message: String,
	/// Stored back onto the job row, e.g. `{"edges": 42}` after a graph build.
	pub result_payload: Option<serde_json::Value>,
}

impl JobOutcome {
	pub fn message(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			result_payload: None,
		}
	}
}

/// One engine behind one job kind. The worker owns status transitions;
/// handlers only do the work.
#[async_trait]
pub trait JobHandler: Send + Sync {
	async fn run(&self, job: &IndexJob) -> Result<JobOutcome>;
}
