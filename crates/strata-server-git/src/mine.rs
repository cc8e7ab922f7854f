// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Commit-history miner: walks the cached repository from HEAD and turns
//! every in-window commit into per-file line-change records plus a commit
//! summary row.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use strata_server_db::{CommitFileDiff, CommitStore, NewCommitStat};

use crate::cache::{CloneDepth, Credential, RepoCache};
use crate::error::{GitError, Result};

/// One commit with its per-file diffs, before persistence.
#[derive(Debug, Clone)]
pub struct MinedCommit {
	pub commit_hash: String,
	pub author_email: String,
	pub message: String,
	pub authored_at: DateTime<Utc>,
	pub files: Vec<CommitFileDiff>,
}

pub struct HistoryMiner {
	cache: Arc<RepoCache>,
	commits: Arc<dyn CommitStore>,
}

impl HistoryMiner {
	pub fn new(cache: Arc<RepoCache>, commits: Arc<dyn CommitStore>) -> Self {
		Self { cache, commits }
	}

	/// Mine commits authored within `[since, now]` (all history when `since`
	/// is `None`), record one summary per new commit, and return the
	/// per-file diffs of those new commits for churn aggregation.
	///
	/// Commits whose hash is already recorded for `(user_id, repo_url)` are
	/// skipped wholesale, so overlapping windows never double-count.
	#[instrument(skip(self, credential), fields(repo_url = %repo_url))]
	pub async fn mine(
		&self,
		user_id: i64,
		repo_url: &str,
		credential: Option<Credential>,
		since: Option<DateTime<Utc>>,
	) -> Result<Vec<CommitFileDiff>> {
		let handle = self.cache.open(repo_url, credential, CloneDepth::Full).await?;

		let path = handle.path().to_path_buf();
		let mined = tokio::task::spawn_blocking(move || walk_history(&path, since))
			.await
			.map_err(|e| GitError::Join(e.to_string()))??;

		let mut diffs = Vec::new();
		let mut recorded = 0usize;
		for commit in mined {
			let stat = NewCommitStat {
				commit_hash: commit.commit_hash.clone(),
				author_email: commit.author_email.clone(),
				message: commit.message.clone(),
				committed_at: commit.authored_at,
				files_changed: commit.files.len() as i64,
				insertions: commit.files.iter().map(|f| f.lines_added).sum(),
				deletions: commit.files.iter().map(|f| f.lines_deleted).sum(),
			};
			if self.commits.insert(user_id, repo_url, &stat).await? {
				recorded += 1;
				diffs.extend(commit.files);
			}
		}

		info!(commits = recorded, file_diffs = diffs.len(), "mined history");
		Ok(diffs)
	}
}

/// Walk from HEAD and diff every in-window commit against its first parent.
fn walk_history(path: &Path, since: Option<DateTime<Utc>>) -> Result<Vec<MinedCommit>> {
	let repo = git2::Repository::open(path)?;
	let mut walk = repo.revwalk()?;
	walk.push_head()?;
	walk.set_sorting(git2::Sort::TIME)?;

	let mut out = Vec::new();
	for oid in walk {
		let commit = repo.find_commit(oid?)?;

		let Some(authored_at) = DateTime::from_timestamp(commit.author().when().seconds(), 0) else {
			continue;
		};
		if let Some(since) = since {
			if authored_at < since {
				continue;
			}
		}

		let files = diff_commit(&repo, &commit, authored_at)?;
		out.push(MinedCommit {
			commit_hash: commit.id().to_string(),
			author_email: commit.author().email().unwrap_or("").to_string(),
			message: commit.summary().unwrap_or("").to_string(),
			authored_at,
			files,
		});
	}

	Ok(out)
}

fn diff_commit(
	repo: &git2::Repository,
	commit: &git2::Commit<'_>,
	authored_at: DateTime<Utc>,
) -> Result<Vec<CommitFileDiff>> {
	let new_tree = commit.tree()?;
	// Root commits diff against the empty tree.
	let old_tree = if commit.parent_count() > 0 {
		Some(commit.parent(0)?.tree()?)
	} else {
		None
	};

	let mut opts = git2::DiffOptions::new();
	opts.ignore_whitespace(true);
	let mut diff = repo.diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), Some(&mut opts))?;

	let mut find = git2::DiffFindOptions::new();
	find.renames(true);
	diff.find_similar(Some(&mut find))?;

	let author_email = commit.author().email().unwrap_or("").to_string();
	let commit_hash = commit.id().to_string();

	let mut results = Vec::new();
	for idx in 0..diff.deltas().len() {
		let Some(patch) = git2::Patch::from_diff(&diff, idx)? else {
			continue;
		};
		let (_context, additions, deletions) = patch.line_stats()?;
		if additions + deletions == 0 {
			continue;
		}

		let Some(delta) = diff.get_delta(idx) else {
			continue;
		};
		// Deletions keep the pre-image path; everything else (including
		// renames) uses the post-image path.
		let path = if delta.status() == git2::Delta::Deleted {
			delta.old_file().path()
		} else {
			delta.new_file().path()
		};
		let Some(path) = path else {
			continue;
		};

		results.push(CommitFileDiff {
			commit_hash: commit_hash.clone(),
			file_path: path.to_string_lossy().replace('\\', "/"),
			authored_at,
			author_email: author_email.clone(),
			lines_added: additions as i64,
			lines_deleted: deletions as i64,
		});
	}

	Ok(results)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::testsupport::{commit as git_commit, git, init_repo};
	use async_trait::async_trait;
	use std::sync::Mutex;
	use strata_server_db::Result as DbResult;

	struct MockCommitStore {
		recorded: Mutex<Vec<NewCommitStat>>,
	}

	impl MockCommitStore {
		fn new() -> Self {
			Self {
				recorded: Mutex::new(Vec::new()),
			}
		}

		fn hashes(&self) -> Vec<String> {
			self
				.recorded
				.lock()
				.unwrap()
				.iter()
				.map(|s| s.commit_hash.clone())
				.collect()
		}
	}

	#[async_trait]
	impl CommitStore for MockCommitStore {
		async fn exists(&self, _user_id: i64, _repo_url: &str, commit_hash: &str) -> DbResult<bool> {
			Ok(self.hashes().iter().any(|h| h == commit_hash))
		}

		async fn insert(&self, _user_id: i64, _repo_url: &str, stat: &NewCommitStat) -> DbResult<bool> {
			let mut recorded = self.recorded.lock().unwrap();
			if recorded.iter().any(|s| s.commit_hash == stat.commit_hash) {
				return Ok(false);
			}
			recorded.push(stat.clone());
			Ok(true)
		}
	}

	fn setup() -> (tempfile::TempDir, String) {
		let temp = tempfile::tempdir().unwrap();
		let source = temp.path().join("source");
		std::fs::create_dir_all(&source).unwrap();
		let url = init_repo(&source);
		(temp, url)
	}

	fn miner(temp: &tempfile::TempDir, commits: Arc<MockCommitStore>) -> HistoryMiner {
		let cache = Arc::new(RepoCache::new(temp.path().join("cache")));
		HistoryMiner::new(cache, commits)
	}

	#[tokio::test]
	async fn test_mine_counts_added_and_deleted_lines() {
		let (temp, url) = setup();
		let source = temp.path().join("source");

		std::fs::write(source.join("f.ts"), "one\ntwo\nthree\n").unwrap();
		git_commit(&source, "add f.ts");
		std::fs::write(source.join("f.ts"), "one\nthree\nfour\nfive\n").unwrap();
		git_commit(&source, "edit f.ts");

		let commits = Arc::new(MockCommitStore::new());
		let diffs = miner(&temp, commits.clone())
			.mine(1, &url, None, None)
			.await
			.unwrap();

		let for_file: Vec<&CommitFileDiff> =
			diffs.iter().filter(|d| d.file_path == "f.ts").collect();
		assert_eq!(for_file.len(), 2);

		let total_added: i64 = for_file.iter().map(|d| d.lines_added).sum();
		let total_deleted: i64 = for_file.iter().map(|d| d.lines_deleted).sum();
		// add: +3/-0, edit: +2/-1 ("two" dropped, "four"/"five" appended)
		assert_eq!(total_added, 5);
		assert_eq!(total_deleted, 1);

		// One summary per commit: initial README commit + two f.ts commits.
		assert_eq!(commits.hashes().len(), 3);
	}

	#[tokio::test]
	async fn test_mine_ignores_whitespace_only_edits() {
		let (temp, url) = setup();
		let source = temp.path().join("source");

		std::fs::write(source.join("f.ts"), "let x = 1;\n").unwrap();
		git_commit(&source, "add f.ts");
		std::fs::write(source.join("f.ts"), "let  x  =  1;\n").unwrap();
		git_commit(&source, "reindent");

		let commits = Arc::new(MockCommitStore::new());
		let diffs = miner(&temp, commits)
			.mine(1, &url, None, None)
			.await
			.unwrap();

		let edits: Vec<&CommitFileDiff> = diffs.iter().filter(|d| d.file_path == "f.ts").collect();
		assert_eq!(edits.len(), 1, "whitespace-only commit must contribute nothing");
	}

	#[tokio::test]
	async fn test_mine_window_filters_old_commits() {
		let (temp, url) = setup();
		let source = temp.path().join("source");

		std::fs::write(source.join("old.ts"), "old\n").unwrap();
		git(&source, &["add", "."]);
		let output = std::process::Command::new("git")
			.args([
				"-c",
				"user.email=dev@example.com",
				"-c",
				"user.name=Dev",
				"commit",
				"-m",
				"ancient",
			])
			.env("GIT_AUTHOR_DATE", "2020-01-01T00:00:00Z")
			.env("GIT_COMMITTER_DATE", "2020-01-01T00:00:00Z")
			.current_dir(&source)
			.output()
			.unwrap();
		assert!(output.status.success());

		std::fs::write(source.join("new.ts"), "new\n").unwrap();
		git_commit(&source, "recent");

		let commits = Arc::new(MockCommitStore::new());
		let since = Utc::now() - chrono::Duration::days(1);
		let diffs = miner(&temp, commits.clone())
			.mine(1, &url, None, Some(since))
			.await
			.unwrap();

		assert!(diffs.iter().any(|d| d.file_path == "new.ts"));
		assert!(!diffs.iter().any(|d| d.file_path == "old.ts"));
	}

	#[tokio::test]
	async fn test_remine_skips_recorded_commits() {
		let (temp, url) = setup();
		let source = temp.path().join("source");

		std::fs::write(source.join("f.ts"), "one\n").unwrap();
		git_commit(&source, "add f.ts");

		let commits = Arc::new(MockCommitStore::new());
		let miner = miner(&temp, commits.clone());

		let first = miner.mine(1, &url, None, None).await.unwrap();
		assert!(!first.is_empty());

		// Overlapping re-mine: every commit already recorded, nothing to count.
		let second = miner.mine(1, &url, None, None).await.unwrap();
		assert!(second.is_empty());
	}

	#[tokio::test]
	async fn test_rename_uses_post_rename_path() {
		let (temp, url) = setup();
		let source = temp.path().join("source");

		let body: String = (0..20).map(|i| format!("line {i}\n")).collect();
		std::fs::write(source.join("before.ts"), &body).unwrap();
		git_commit(&source, "add before.ts");

		git(&source, &["mv", "before.ts", "after.ts"]);
		std::fs::write(source.join("after.ts"), body + "line 20\n").unwrap();
		git_commit(&source, "rename and extend");

		let commits = Arc::new(MockCommitStore::new());
		let diffs = miner(&temp, commits)
			.mine(1, &url, None, None)
			.await
			.unwrap();

		let rename_edit: Vec<&CommitFileDiff> =
			diffs.iter().filter(|d| d.file_path == "after.ts").collect();
		assert_eq!(rename_edit.len(), 1);
		assert_eq!(rename_edit[0].lines_added, 1);
		assert!(!diffs.iter().any(|d| d.file_path == "before.ts" && d.lines_deleted >= 20));
	}

	#[tokio::test]
	async fn test_deleted_file_keeps_preimage_path() {
		let (temp, url) = setup();
		let source = temp.path().join("source");

		std::fs::write(source.join("doomed.ts"), "a\nb\nc\n").unwrap();
		git_commit(&source, "add doomed.ts");
		std::fs::remove_file(source.join("doomed.ts")).unwrap();
		git(&source, &["add", "-A"]);
		git(
			&source,
			&[
				"-c",
				"user.email=dev@example.com",
				"-c",
				"user.name=Dev",
				"commit",
				"-m",
				"remove doomed.ts",
			],
		);

		let commits = Arc::new(MockCommitStore::new());
		let diffs = miner(&temp, commits)
			.mine(1, &url, None, None)
			.await
			.unwrap();

		let deletion = diffs
			.iter()
			.find(|d| d.file_path == "doomed.ts" && d.lines_deleted == 3)
			.expect("deletion should be attributed to the pre-image path");
		assert_eq!(deletion.lines_added, 0);
	}
}
