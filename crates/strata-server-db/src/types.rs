// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One file touched by one commit, as mined from the repository history.
///
/// These records are transient: the history miner emits them and the churn
/// aggregator folds them into weekly buckets. They are never stored as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitFileDiff {
	pub commit_hash: String,
	pub file_path: String,
	pub authored_at: DateTime<Utc>,
	pub author_email: String,
	pub lines_added: i64,
	pub lines_deleted: i64,
}
