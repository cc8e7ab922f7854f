// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Per-line attribution over the cached repository's head revision.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::cache::RepoCache;
use crate::error::{GitError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlameLine {
	pub line_no: usize,
	pub commit_hash: String,
	pub author_email: String,
	pub committed_at: Option<DateTime<Utc>>,
	pub content: String,
}

pub struct BlameProvider {
	cache: Arc<RepoCache>,
}

impl BlameProvider {
	pub fn new(cache: Arc<RepoCache>) -> Self {
		Self { cache }
	}

	/// Annotate every line of `file_path` at the current head revision.
	///
	/// Requires the repository to be cached already (a prior mining run);
	/// a missing cache entry is a typed error, a missing file an empty
	/// result.
	#[instrument(skip(self), fields(repo_url = %repo_url, file = %file_path))]
	pub async fn blame(
		&self,
		user_id: i64,
		repo_url: &str,
		file_path: &str,
	) -> Result<Vec<BlameLine>> {
		let dir = self.cache.entry_path(repo_url);
		if !dir.join("HEAD").exists() {
			return Err(GitError::NotCached(repo_url.to_string()));
		}

		let file = file_path.to_string();
		let lines = tokio::task::spawn_blocking(move || blame_file(&dir, &file))
			.await
			.map_err(|e| GitError::Join(e.to_string()))??;

		info!(lines = lines.len(), "computed blame");
		Ok(lines)
	}
}

fn blame_file(dir: &Path, file_path: &str) -> Result<Vec<BlameLine>> {
	let repo = git2::Repository::open(dir)?;
	let head = repo.head()?.peel_to_commit()?;
	let tree = head.tree()?;

	let entry = match tree.get_path(Path::new(file_path)) {
		Ok(entry) => entry,
		Err(_) => return Ok(Vec::new()),
	};
	let blob = repo.find_blob(entry.id())?;
	let content = String::from_utf8_lossy(blob.content()).into_owned();

	let mut opts = git2::BlameOptions::new();
	let blame = repo.blame_file(Path::new(file_path), Some(&mut opts))?;

	let mut lines = Vec::new();
	for (idx, line) in content.lines().enumerate() {
		let line_no = idx + 1;
		let (commit_hash, author_email, committed_at) = match blame.get_line(line_no) {
			Some(hunk) => {
				let oid = hunk.final_commit_id();
				match repo.find_commit(oid) {
					Ok(commit) => (
						oid.to_string(),
						commit.author().email().unwrap_or("").to_string(),
						DateTime::from_timestamp(commit.author().when().seconds(), 0),
					),
					Err(_) => (oid.to_string(), String::new(), None),
				}
			}
			None => ("unknown".to_string(), String::new(), None),
		};

		lines.push(BlameLine {
			line_no,
			commit_hash,
			author_email,
			committed_at,
			content: line.to_string(),
		});
	}

	Ok(lines)
}
